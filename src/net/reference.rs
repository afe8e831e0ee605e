//! # Session References
//!
//! The HTTP-delivered documents describing joinable game sessions.
//!
//! A master server answers reference requests with an INI document holding
//! one `[Reference]` section per session. The documents come from the
//! network and from older engine versions, so parsing is best-effort: a
//! reference that fails to decode is logged and skipped, unknown keys only
//! warn, and absent keys fall back to their defaults.

use tracing::warn;

use crate::error::Result;
use crate::net::addr::EndpointAddr;
use crate::serial::{adapt, Codec, IniReader, Sep, Serial};

/// What a referenced session is currently doing.
pub const SESSION_STATES: &[(i32, &str)] = &[
    (0, "Lobby"),
    (1, "Running"),
    (2, "Paused"),
    (3, "Over"),
];

pub const STATE_LOBBY: i32 = 0;
pub const STATE_RUNNING: i32 = 1;

/// Symbolic flags of a reference.
pub const SESSION_FLAGS: &[(u32, &str)] = &[
    (0x1, "PasswordNeeded"),
    (0x2, "OfficialServer"),
    (0x4, "RuntimeJoin"),
];

/// One joinable session as advertised by a master server.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SessionRef {
    pub title: String,
    pub game_id: u64,
    pub state: i32,
    pub flags: u32,
    pub players: u32,
    pub max_players: u32,
    /// Candidate endpoints, best first.
    pub addrs: Vec<EndpointAddr>,
    pub comment: String,
}

impl Serial for SessionRef {
    fn serial(&mut self, codec: &mut dyn Codec) -> Result<()> {
        adapt::named_default(codec, "Title", &mut self.title, String::new())?;
        adapt::named_default(codec, "GameID", &mut self.game_id, 0)?;
        if codec.is_reading() {
            self.state = STATE_LOBBY;
            self.flags = 0;
        }
        let omit = self.state == STATE_LOBBY;
        adapt::named_opt(codec, "State", omit, |c| {
            adapt::enum_text(c, &mut self.state, SESSION_STATES)
        })?;
        let omit = self.flags == 0;
        adapt::named_opt(codec, "Flags", omit, |c| {
            adapt::bitfield_text(c, &mut self.flags, SESSION_FLAGS)
        })?;
        adapt::named_default(codec, "Players", &mut self.players, 0)?;
        adapt::named_default(codec, "MaxPlayers", &mut self.max_players, 0)?;
        if codec.is_reading() {
            self.addrs.clear();
        }
        let omit = self.addrs.is_empty();
        adapt::named_opt(codec, "Address", omit, |c| {
            adapt::list(c, Sep::Semicolon, &mut self.addrs)
        })?;
        adapt::named_default(codec, "Comment", &mut self.comment, String::new())
    }
}

/// Decode a fetched reference document, best-effort.
///
/// A reference whose body fails to decode is dropped with a warning; the
/// rest of the document is still used. Never fails as a whole.
pub fn parse_references(text: &str) -> Vec<SessionRef> {
    let mut reader = IniReader::parse(text);
    if reader.begin().is_err() {
        return Vec::new();
    }
    let mut refs = Vec::new();
    while reader.name("Reference") {
        let mut reference = SessionRef::default();
        match reference.serial(&mut reader) {
            Ok(()) => {
                reader.name_end(false);
                refs.push(reference);
            }
            Err(err) => {
                reader.name_end(true);
                warn!(error = %err, "skipping undecodable reference");
            }
        }
    }
    let _ = reader.end();
    refs
}

// ==========================================
// TESTS
// ==========================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::serial::{ini_decode, ini_encode};

    fn sample() -> SessionRef {
        SessionRef {
            title: "Western Frontier".to_owned(),
            game_id: 0x1122_3344_5566,
            state: STATE_RUNNING,
            flags: 0x1 | 0x4,
            players: 3,
            max_players: 8,
            addrs: vec![
                "192.0.2.1:11113".parse().unwrap(),
                "[2001:db8::7]:11113".parse().unwrap(),
            ],
            comment: "no griefing".to_owned(),
        }
    }

    #[test]
    fn reference_round_trips_through_text() {
        let mut value = sample();
        let text = ini_encode(&mut value).unwrap();
        assert!(text.contains("State=Running"), "{text}");
        assert!(text.contains("Flags=PasswordNeeded|RuntimeJoin"), "{text}");
        let back: SessionRef = ini_decode(&text).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn document_with_several_references() {
        let mut doc = String::new();
        for title in ["a", "b"] {
            let mut reference = SessionRef {
                title: title.to_owned(),
                ..SessionRef::default()
            };
            doc.push_str("[Reference]\r\n");
            for line in ini_encode(&mut reference).unwrap().lines() {
                doc.push_str("  ");
                doc.push_str(line);
                doc.push_str("\r\n");
            }
        }
        let refs = parse_references(&doc);
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].title, "a");
        assert_eq!(refs[1].title, "b");
    }

    #[test]
    fn broken_reference_is_skipped_not_fatal() {
        let doc = "[Reference]\r\n  Title=\"good\"\r\n[Reference]\r\n  Title=unquoted bad\r\n";
        let refs = parse_references(doc);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].title, "good");
    }

    #[test]
    fn unknown_keys_only_warn() {
        let doc = "[Reference]\r\n  Title=\"x\"\r\n  League=\"future\"\r\n";
        let refs = parse_references(doc);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].title, "x");
    }

    #[test]
    fn empty_document_yields_no_references() {
        assert!(parse_references("").is_empty());
        assert!(parse_references("; nothing here\r\n").is_empty());
    }
}
