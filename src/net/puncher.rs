//! # NAT-Traversal Protocol
//!
//! The tiny hole-punching sub-protocol spoken with the rendezvous relay.
//!
//! This protocol is deliberately independent of the main packet registry:
//! relays are simpler software, deployed on their own schedule, and must
//! stay able to parse these packets without the engine's serialization
//! framework. The wire format is therefore a fixed layout with no framing
//! beyond the datagram itself:
//!
//! ```text
//! [Tag(1)] [Version(1)] [Payload(fixed per tag)]
//! ```
//!
//! ## Sniffing Safety
//! These packets share a socket with unrelated traffic, so [`parse`] is a
//! sniffer, not a decoder: a short buffer, a wrong version or an unknown
//! tag yields `None` and nothing else. It cannot error, panic or read out
//! of bounds on any input. Trailing bytes beyond a tag's fixed payload are
//! tolerated.

use bytes::{BufMut, Bytes, BytesMut};

use crate::net::addr::{EndpointAddr, HostAddr};

/// Protocol version; bumped whenever the payload layouts change.
pub const PUNCHER_VERSION: u8 = 1;

const TAG_ASSIGN_ID: u8 = 0x51;
const TAG_SERVICE_REQ: u8 = 0x52;
const TAG_CONNECT_REQ: u8 = 0x53;
const TAG_ID_REQ: u8 = 0x54;

const HEADER_LEN: usize = 2;
const ID_LEN: usize = 4;
const ADDR_LEN: usize = 2 + 16;

/// One packet of the hole-punching conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PuncherPacket {
    /// Relay to host: "you are registered under this id".
    AssignId(u32),
    /// Peer to relay: "help me get punched through to this id".
    ServiceReq(u32),
    /// Relay to peer: "attempt a connection to this endpoint now".
    ConnectReq(EndpointAddr),
    /// Peer to relay: "give me an id".
    IdReq,
}

impl PuncherPacket {
    /// The wire tag of this variant.
    pub fn tag(&self) -> u8 {
        match self {
            Self::AssignId(_) => TAG_ASSIGN_ID,
            Self::ServiceReq(_) => TAG_SERVICE_REQ,
            Self::ConnectReq(_) => TAG_CONNECT_REQ,
            Self::IdReq => TAG_ID_REQ,
        }
    }

    /// Encode into one datagram's worth of bytes.
    ///
    /// The `ConnectReq` payload is a 2-byte network-order port followed by
    /// the 16 raw octets of the IPv6-mapped address: raw rather than text
    /// to stay tiny and layout-stable for independently-built relays.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HEADER_LEN + ADDR_LEN);
        buf.put_u8(self.tag());
        buf.put_u8(PUNCHER_VERSION);
        match self {
            Self::AssignId(id) | Self::ServiceReq(id) => buf.put_u32_le(*id),
            Self::ConnectReq(endpoint) => {
                buf.put_u16(endpoint.port);
                let host = endpoint
                    .host
                    .unwrap_or(HostAddr::V4(std::net::Ipv4Addr::UNSPECIFIED));
                buf.put_slice(&host.v6_octets());
            }
            Self::IdReq => {}
        }
        buf.freeze()
    }
}

/// Sniff a datagram for a puncher packet.
///
/// Returns `None` for anything that is not one: too short, wrong version,
/// unknown tag or a payload shorter than the tag's fixed minimum.
pub fn parse(data: &[u8]) -> Option<PuncherPacket> {
    if data.len() < HEADER_LEN || data[1] != PUNCHER_VERSION {
        return None;
    }
    let payload = &data[HEADER_LEN..];
    match data[0] {
        TAG_ASSIGN_ID | TAG_SERVICE_REQ => {
            let id = u32::from_le_bytes(payload.get(..ID_LEN)?.try_into().ok()?);
            Some(match data[0] {
                TAG_ASSIGN_ID => PuncherPacket::AssignId(id),
                _ => PuncherPacket::ServiceReq(id),
            })
        }
        TAG_CONNECT_REQ => {
            let bytes = payload.get(..ADDR_LEN)?;
            let port = u16::from_be_bytes([bytes[0], bytes[1]]);
            let octets: [u8; 16] = bytes[2..].try_into().ok()?;
            let host = HostAddr::V6 {
                addr: octets.into(),
                scope: 0,
            }
            .as_v4();
            Some(PuncherPacket::ConnectReq(EndpointAddr::new(host, port)))
        }
        TAG_ID_REQ => Some(PuncherPacket::IdReq),
        _ => None,
    }
}

// ==========================================
// TESTS
// ==========================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn round_trips_every_variant() {
        let packets = [
            PuncherPacket::AssignId(0xDEAD_BEEF),
            PuncherPacket::ServiceReq(7),
            PuncherPacket::ConnectReq("[2001:db8::1]:11115".parse().unwrap()),
            PuncherPacket::ConnectReq("192.0.2.9:11113".parse().unwrap()),
            PuncherPacket::IdReq,
        ];
        for packet in packets {
            let bytes = packet.to_bytes();
            assert_eq!(parse(&bytes), Some(packet));
        }
    }

    #[test]
    fn connect_req_layout_is_fixed() {
        let bytes = PuncherPacket::ConnectReq("[2001:db8::1]:11115".parse().unwrap()).to_bytes();
        assert_eq!(bytes.len(), 2 + 2 + 16);
        assert_eq!(bytes[0], 0x53);
        assert_eq!(bytes[1], PUNCHER_VERSION);
        assert_eq!(u16::from_be_bytes([bytes[2], bytes[3]]), 11115);
    }

    #[test]
    fn v4_endpoints_travel_mapped_and_come_back_v4() {
        let bytes = PuncherPacket::ConnectReq("192.0.2.9:80".parse().unwrap()).to_bytes();
        match parse(&bytes) {
            Some(PuncherPacket::ConnectReq(ep)) => {
                assert!(matches!(ep.host, Some(HostAddr::V4(_))));
                assert_eq!(ep.port, 80);
            }
            other => panic!("got {other:?}"),
        }
    }

    #[test]
    fn short_buffers_are_not_recognized() {
        assert_eq!(parse(&[]), None);
        assert_eq!(parse(&[TAG_ID_REQ]), None);
        assert_eq!(parse(&[TAG_ASSIGN_ID, PUNCHER_VERSION, 1, 2]), None);
        assert_eq!(parse(&[TAG_CONNECT_REQ, PUNCHER_VERSION, 0, 80]), None);
    }

    #[test]
    fn wrong_version_is_not_recognized() {
        let mut bytes = PuncherPacket::IdReq.to_bytes().to_vec();
        bytes[1] = PUNCHER_VERSION + 1;
        assert_eq!(parse(&bytes), None);
    }

    #[test]
    fn unknown_tag_is_not_recognized() {
        assert_eq!(parse(&[0x7F, PUNCHER_VERSION, 0, 0, 0, 0]), None);
    }

    #[test]
    fn trailing_bytes_are_tolerated() {
        let mut bytes = PuncherPacket::AssignId(3).to_bytes().to_vec();
        bytes.extend_from_slice(b"junk");
        assert_eq!(parse(&bytes), Some(PuncherPacket::AssignId(3)));
    }
}
