//! # Packet Registry
//!
//! The process-wide table of packet types and their routing metadata.
//!
//! The table is built once behind a [`Lazy`] and never changes afterward,
//! so concurrent lookups from any thread need no synchronization. Each row
//! ties a wire id to a display name, a protocol class, handshake and
//! reliability flags, the thread that owns the decoded packet and a factory
//! producing an empty body for the decoder to fill.
//!
//! Id `0` is reserved as the empty-envelope marker and is deliberately not
//! a row; an envelope with id 0 carries no body and terminates binary
//! packet lists.

use once_cell::sync::Lazy;

use crate::net::packet::{
    Activate, Bundle, ClientUpdate, Close, Conn, ConnRe, GameData, PacketBody, Ping, Pong, Status,
    StatusAck,
};

/// Where a packet travels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolClass {
    /// Crosses the network between peers.
    Transport,
    /// Stays inside the process, between subsystems.
    Control,
}

/// Which thread's inbox a decoded packet belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerThread {
    /// The network I/O thread.
    Net,
    /// The main simulation thread.
    Main,
}

/// One packet type and its routing metadata.
#[derive(Debug, Clone, Copy)]
pub struct PacketDef {
    /// Wire id; nonzero and unique.
    pub id: u8,
    /// Display name, used as the section header in text dumps.
    pub name: &'static str,
    pub class: ProtocolClass,
    /// True if the packet may arrive before the handshake completes.
    pub pre_handshake: bool,
    /// True if the transport must deliver the packet reliably and in order.
    pub reliable: bool,
    /// The thread whose inbox receives the decoded packet.
    pub thread: HandlerThread,
    /// Produces an empty body for the decoder to fill.
    pub factory: fn() -> PacketBody,
}

/// The packet table plus its lookup indexes.
#[derive(Debug)]
pub struct Registry {
    defs: &'static [PacketDef],
    by_id: [Option<u8>; 256],
    names: Vec<(i32, &'static str)>,
}

impl Registry {
    fn build(defs: &'static [PacketDef]) -> Self {
        let mut by_id = [None; 256];
        for (index, def) in defs.iter().enumerate() {
            assert_ne!(def.id, 0, "id 0 is the empty-envelope marker");
            assert!(
                by_id[usize::from(def.id)].is_none(),
                "duplicate packet id {:#04x}",
                def.id
            );
            by_id[usize::from(def.id)] = Some(index as u8);
        }
        let names = defs
            .iter()
            .map(|def| (i32::from(def.id), def.name))
            .collect();
        Self { defs, by_id, names }
    }

    /// Look up a row by wire id.
    pub fn by_id(&self, id: u8) -> Option<&PacketDef> {
        self.by_id[usize::from(id)].map(|index| &self.defs[usize::from(index)])
    }

    /// Look up a row by display name.
    pub fn by_name(&self, name: &str) -> Option<&PacketDef> {
        self.defs.iter().find(|def| def.name == name)
    }

    /// All rows, in registration order.
    pub fn defs(&self) -> &'static [PacketDef] {
        self.defs
    }

    /// The id/name table for the enum-as-text adaptor.
    pub fn name_table(&self) -> &[(i32, &str)] {
        &self.names
    }
}

const DEFS: &[PacketDef] = &[
    PacketDef {
        id: 0x01,
        name: "Conn",
        class: ProtocolClass::Transport,
        pre_handshake: true,
        reliable: true,
        thread: HandlerThread::Net,
        factory: || PacketBody::Conn(Conn::default()),
    },
    PacketDef {
        id: 0x02,
        name: "ConnRe",
        class: ProtocolClass::Transport,
        pre_handshake: true,
        reliable: true,
        thread: HandlerThread::Net,
        factory: || PacketBody::ConnRe(ConnRe::default()),
    },
    PacketDef {
        id: 0x10,
        name: "Ping",
        class: ProtocolClass::Transport,
        pre_handshake: true,
        reliable: false,
        thread: HandlerThread::Net,
        factory: || PacketBody::Ping(Ping::default()),
    },
    PacketDef {
        id: 0x11,
        name: "Pong",
        class: ProtocolClass::Transport,
        pre_handshake: true,
        reliable: false,
        thread: HandlerThread::Net,
        factory: || PacketBody::Pong(Pong::default()),
    },
    PacketDef {
        id: 0x12,
        name: "Close",
        class: ProtocolClass::Transport,
        pre_handshake: true,
        reliable: true,
        thread: HandlerThread::Net,
        factory: || PacketBody::Close(Close::default()),
    },
    PacketDef {
        id: 0x20,
        name: "GameData",
        class: ProtocolClass::Transport,
        pre_handshake: false,
        reliable: true,
        thread: HandlerThread::Main,
        factory: || PacketBody::GameData(GameData::default()),
    },
    PacketDef {
        id: 0x21,
        name: "ClientUpdate",
        class: ProtocolClass::Transport,
        pre_handshake: false,
        reliable: true,
        thread: HandlerThread::Main,
        factory: || PacketBody::ClientUpdate(ClientUpdate::default()),
    },
    PacketDef {
        id: 0x22,
        name: "Activate",
        class: ProtocolClass::Transport,
        pre_handshake: false,
        reliable: true,
        thread: HandlerThread::Main,
        factory: || PacketBody::Activate(Activate::default()),
    },
    PacketDef {
        id: 0x30,
        name: "Status",
        class: ProtocolClass::Control,
        pre_handshake: false,
        reliable: true,
        thread: HandlerThread::Main,
        factory: || PacketBody::Status(Status::default()),
    },
    PacketDef {
        id: 0x31,
        name: "StatusAck",
        class: ProtocolClass::Control,
        pre_handshake: false,
        reliable: true,
        thread: HandlerThread::Main,
        factory: || PacketBody::StatusAck(StatusAck::default()),
    },
    PacketDef {
        id: 0x40,
        name: "Bundle",
        class: ProtocolClass::Transport,
        pre_handshake: false,
        reliable: true,
        thread: HandlerThread::Main,
        factory: || PacketBody::Bundle(Bundle::default()),
    },
];

/// The registry. Built on first use, immutable afterward.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| Registry::build(DEFS));

// ==========================================
// TESTS
// ==========================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn every_row_resolves_by_id_and_name() {
        for def in REGISTRY.defs() {
            assert_eq!(REGISTRY.by_id(def.id).unwrap().name, def.name);
            assert_eq!(REGISTRY.by_name(def.name).unwrap().id, def.id);
        }
    }

    #[test]
    fn id_zero_is_never_registered() {
        assert!(REGISTRY.by_id(0).is_none());
    }

    #[test]
    fn factories_match_their_row() {
        for def in REGISTRY.defs() {
            assert_eq!((def.factory)().id(), def.id, "factory for {}", def.name);
        }
    }

    #[test]
    fn name_table_covers_every_row() {
        assert_eq!(REGISTRY.name_table().len(), REGISTRY.defs().len());
    }
}
