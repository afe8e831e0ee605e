//! # Packet Envelope & Dispatch
//!
//! The typed packet bodies, the envelope that carries one of them across
//! the wire, and the router that hands decoded packets to the right thread.
//!
//! ## Wire Format
//! ```text
//! [Id(1)] [Status(1)] [Payload(N)]
//! ```
//! The destination address travels alongside the bytes as routing metadata
//! and is never serialized. Only the id is transmitted; the concrete body
//! type is resolved from the [`registry`] at decode time. An unknown id is
//! [`WireError::Corrupt`] and a truncated payload is [`WireError::Eof`];
//! both abort the whole packet, nothing is ever partially applied.
//!
//! ## Trust Boundary
//! [`PacketRouter::receive`] is the place where network input meets game
//! state. It catches every decode failure, logs it and reports a drop;
//! decoding can never panic or leak a half-read packet inward.

use std::cell::Cell;
use std::collections::HashSet;

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::error::{Result, WireError};
use crate::net::addr::EndpointAddr;
use crate::net::registry::{HandlerThread, ProtocolClass, REGISTRY};
use crate::serial::{adapt, bin_encode, ini_encode, BinReader, Codec, Fixed, Sep, Serial};

// ==========================================
// PACKET BODIES
// ==========================================

/// Connection request: the opening packet of a handshake.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Conn {
    pub client_id: u32,
    pub name: String,
    pub engine_version: u32,
    pub flags: u32,
}

/// Symbolic spellings for [`Conn::flags`] in text dumps.
const CONN_FLAGS: &[(u32, &str)] = &[
    (0x1, "Observer"),
    (0x2, "RuntimeJoin"),
    (0x4, "Relay"),
];

impl Serial for Conn {
    fn serial(&mut self, codec: &mut dyn Codec) -> Result<()> {
        adapt::named_default(codec, "ClientID", &mut self.client_id, 0)?;
        adapt::named_default(codec, "Name", &mut self.name, String::new())?;
        adapt::named_default(codec, "Version", &mut self.engine_version, 0)?;
        if codec.is_reading() {
            self.flags = 0;
        }
        let omit = self.flags == 0;
        adapt::named_opt(codec, "Flags", omit, |c| {
            adapt::bitfield_text(c, &mut self.flags, CONN_FLAGS)
        })
    }
}

/// Connection reply.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ConnRe {
    pub accepted: bool,
    pub message: String,
}

impl Serial for ConnRe {
    fn serial(&mut self, codec: &mut dyn Codec) -> Result<()> {
        adapt::named_default(codec, "Accepted", &mut self.accepted, false)?;
        adapt::named_default(codec, "Message", &mut self.message, String::new())
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Ping {
    pub tick: u32,
}

impl Serial for Ping {
    fn serial(&mut self, codec: &mut dyn Codec) -> Result<()> {
        adapt::named_default(codec, "Tick", &mut self.tick, 0)
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Pong {
    pub tick: u32,
}

impl Serial for Pong {
    fn serial(&mut self, codec: &mut dyn Codec) -> Result<()> {
        adapt::named_default(codec, "Tick", &mut self.tick, 0)
    }
}

/// Reasons a peer closes a connection.
const CLOSE_REASONS: &[(i32, &str)] = &[
    (0, "Regular"),
    (1, "Timeout"),
    (2, "Kicked"),
    (3, "VersionMismatch"),
];

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Close {
    pub reason: i32,
}

impl Serial for Close {
    fn serial(&mut self, codec: &mut dyn Codec) -> Result<()> {
        if codec.is_reading() {
            self.reason = 0;
        }
        let omit = self.reason == 0;
        adapt::named_opt(codec, "Reason", omit, |c| {
            adapt::enum_text(c, &mut self.reason, CLOSE_REASONS)
        })
    }
}

/// One tick's worth of simulation input.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct GameData {
    pub tick: u32,
    pub control: Vec<u8>,
}

impl Serial for GameData {
    fn serial(&mut self, codec: &mut dyn Codec) -> Result<()> {
        adapt::named_default(codec, "Tick", &mut self.tick, 0)?;
        if codec.is_reading() {
            self.control.clear();
        }
        let omit = self.control.is_empty();
        adapt::named_opt(codec, "Control", omit, |c| {
            adapt::list(c, Sep::Comma, &mut self.control)
        })
    }
}

/// Session status snapshot, exchanged between subsystems.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Status {
    pub tick: u32,
    pub clients: u32,
    pub paused: bool,
}

impl Serial for Status {
    fn serial(&mut self, codec: &mut dyn Codec) -> Result<()> {
        adapt::named_default(codec, "Tick", &mut self.tick, 0)?;
        adapt::named_default(codec, "Clients", &mut self.clients, 0)?;
        adapt::named_default(codec, "Paused", &mut self.paused, false)
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct StatusAck {
    pub tick: u32,
}

impl Serial for StatusAck {
    fn serial(&mut self, codec: &mut dyn Codec) -> Result<()> {
        adapt::named_default(codec, "Tick", &mut self.tick, 0)
    }
}

/// Activation change for a client.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Activate {
    pub active: bool,
}

impl Serial for Activate {
    fn serial(&mut self, codec: &mut dyn Codec) -> Result<()> {
        adapt::named_default(codec, "Active", &mut self.active, false)
    }
}

/// Position and state update for one client's cursor.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ClientUpdate {
    pub client_id: u32,
    pub x: Fixed,
    pub y: Fixed,
    pub target: Option<Box<EndpointAddr>>,
}

impl Serial for ClientUpdate {
    fn serial(&mut self, codec: &mut dyn Codec) -> Result<()> {
        adapt::named_default(codec, "ClientID", &mut self.client_id, 0)?;
        adapt::named_default(codec, "X", &mut self.x, Fixed::ZERO)?;
        adapt::named_default(codec, "Y", &mut self.y, Fixed::ZERO)?;
        adapt::owned(codec, "Target", &mut self.target, true)
    }
}

/// Several envelopes delivered as one message.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Bundle {
    pub packets: PacketList,
}

impl Serial for Bundle {
    fn serial(&mut self, codec: &mut dyn Codec) -> Result<()> {
        self.packets.serial(codec)
    }
}

/// Every packet type the engine speaks, as one closed sum.
///
/// The registry maps wire ids onto these variants; because the set is
/// closed, dispatch code can match exhaustively and an unregistered variant
/// cannot exist.
#[derive(Debug, Clone, PartialEq)]
pub enum PacketBody {
    Conn(Conn),
    ConnRe(ConnRe),
    Ping(Ping),
    Pong(Pong),
    Close(Close),
    GameData(GameData),
    ClientUpdate(ClientUpdate),
    Activate(Activate),
    Status(Status),
    StatusAck(StatusAck),
    Bundle(Bundle),
}

impl PacketBody {
    /// The wire id of this body's type.
    pub fn id(&self) -> u8 {
        match self {
            Self::Conn(_) => 0x01,
            Self::ConnRe(_) => 0x02,
            Self::Ping(_) => 0x10,
            Self::Pong(_) => 0x11,
            Self::Close(_) => 0x12,
            Self::GameData(_) => 0x20,
            Self::ClientUpdate(_) => 0x21,
            Self::Activate(_) => 0x22,
            Self::Status(_) => 0x30,
            Self::StatusAck(_) => 0x31,
            Self::Bundle(_) => 0x40,
        }
    }

    /// The registry display name of this body's type.
    pub fn name(&self) -> &'static str {
        match REGISTRY.by_id(self.id()) {
            Some(def) => def.name,
            None => "?",
        }
    }

    /// Drive the concrete body through one serialization pass.
    pub fn serial_body(&mut self, codec: &mut dyn Codec) -> Result<()> {
        match self {
            Self::Conn(p) => p.serial(codec),
            Self::ConnRe(p) => p.serial(codec),
            Self::Ping(p) => p.serial(codec),
            Self::Pong(p) => p.serial(codec),
            Self::Close(p) => p.serial(codec),
            Self::GameData(p) => p.serial(codec),
            Self::ClientUpdate(p) => p.serial(codec),
            Self::Activate(p) => p.serial(codec),
            Self::Status(p) => p.serial(codec),
            Self::StatusAck(p) => p.serial(codec),
            Self::Bundle(p) => p.serial(codec),
        }
    }
}

// ==========================================
// ENVELOPE & LIST
// ==========================================

/// Bundles may carry bundles, so decoding recurses; past this depth the
/// input is rejected as corrupt instead of exhausting the stack.
const MAX_PACKET_NESTING: usize = 16;

thread_local! {
    static DECODE_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Tracks how deep the current decode has recursed. Dropping the guard
/// unwinds one level, on the error path included.
struct NestingGuard;

impl NestingGuard {
    fn enter(position: String) -> Result<Self> {
        DECODE_DEPTH.with(|depth| {
            if depth.get() >= MAX_PACKET_NESTING {
                return Err(WireError::corrupt(position, "packet nesting too deep"));
            }
            depth.set(depth.get() + 1);
            Ok(Self)
        })
    }
}

impl Drop for NestingGuard {
    fn drop(&mut self) {
        DECODE_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// A type-erased packet: an id plus the body it tags.
///
/// The tag and the concrete variant are consistent by construction; an
/// empty envelope (no body, id 0) exists as the explicit terminator of
/// binary packet lists.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Envelope {
    pub body: Option<PacketBody>,
}

impl Envelope {
    pub fn new(body: PacketBody) -> Self {
        Self { body: Some(body) }
    }

    /// The wire id; 0 for the empty envelope.
    pub fn id(&self) -> u8 {
        self.body.as_ref().map_or(0, PacketBody::id)
    }
}

impl Serial for Envelope {
    fn serial(&mut self, codec: &mut dyn Codec) -> Result<()> {
        let mut id = i32::from(self.id());

        // The id itself: a raw byte in binary, a symbolic name in text.
        if codec.has_naming() {
            if codec.is_reading() {
                id = 0;
                if codec.name("Type") {
                    let result = adapt::enum_text(codec, &mut id, REGISTRY.name_table());
                    codec.name_end(result.is_err());
                    result?;
                }
            } else if id != 0 {
                adapt::named(codec, "Type", |c| {
                    adapt::enum_text(c, &mut id, REGISTRY.name_table())
                })?;
            }
        } else {
            let mut byte = id as u8;
            codec.u8(&mut byte)?;
            id = i32::from(byte);
        }

        if codec.is_reading() {
            if id == 0 {
                self.body = None;
                return Ok(());
            }
            let def = REGISTRY.by_id(id as u8).ok_or_else(|| {
                WireError::corrupt(codec.position(), format!("unknown packet id {id:#04x}"))
            })?;
            let _guard = NestingGuard::enter(codec.position())?;
            let mut body = (def.factory)();
            if codec.name(def.name) {
                let result = body.serial_body(codec);
                codec.name_end(result.is_err());
                result?;
            }
            // A missing section on a naming read is an all-default body.
            self.body = Some(body);
        } else if let Some(body) = &mut self.body {
            let name = body.name();
            adapt::named(codec, name, |c| body.serial_body(c))?;
        }
        Ok(())
    }
}

/// A sequence of envelopes.
///
/// Text form: repeated `[Packet]` sections, count implicit. Binary form:
/// the envelopes back to back, closed by an explicit id-0 terminator,
/// because a positional format has no "no more sections" signal.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PacketList {
    pub packets: Vec<Envelope>,
}

impl PacketList {
    pub fn push(&mut self, body: PacketBody) {
        self.packets.push(Envelope::new(body));
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }
}

impl Serial for PacketList {
    fn serial(&mut self, codec: &mut dyn Codec) -> Result<()> {
        if codec.is_reading() {
            self.packets.clear();
            if codec.has_naming() {
                while codec.name("Packet") {
                    let mut envelope = Envelope::default();
                    let result = envelope.serial(codec);
                    codec.name_end(result.is_err());
                    result?;
                    self.packets.push(envelope);
                }
            } else {
                loop {
                    let mut envelope = Envelope::default();
                    envelope.serial(codec)?;
                    if envelope.body.is_none() {
                        break;
                    }
                    self.packets.push(envelope);
                }
            }
        } else {
            for envelope in &mut self.packets {
                adapt::named(codec, "Packet", |c| envelope.serial(c))?;
            }
            if !codec.has_naming() {
                Envelope::default().serial(codec)?;
            }
        }
        Ok(())
    }
}

// ==========================================
// PACK / UNPACK
// ==========================================

/// One packet as it crosses the transport: wire bytes plus the peer
/// address they are bound to or came from. The address is routing
/// metadata only and never part of the bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPacket {
    pub addr: EndpointAddr,
    pub data: Bytes,
}

struct WireShape<'a> {
    id: u8,
    status: u8,
    body: &'a mut PacketBody,
}

impl Serial for WireShape<'_> {
    fn serial(&mut self, codec: &mut dyn Codec) -> Result<()> {
        codec.u8(&mut self.id)?;
        codec.u8(&mut self.status)?;
        self.body.serial_body(codec)
    }
}

/// Serialize `(id, status, body)` into wire bytes bound for `addr`.
///
/// # Errors
/// Returns any error raised by the body's own serialization logic.
pub fn pack(body: &mut PacketBody, status: u8, addr: EndpointAddr) -> Result<RawPacket> {
    let mut shape = WireShape {
        id: body.id(),
        status,
        body,
    };
    let data = bin_encode(&mut shape)?;
    Ok(RawPacket { addr, data })
}

/// Decode wire bytes back into a typed body and status.
///
/// # Errors
/// [`WireError::Corrupt`] for an unknown id or invalid payload,
/// [`WireError::Eof`] for a truncated one. Either way the whole packet is
/// rejected; no partial result escapes.
pub fn unpack(raw: &RawPacket) -> Result<(PacketBody, u8)> {
    let mut reader = BinReader::new(&raw.data);
    reader.begin()?;
    let mut id = 0u8;
    reader.u8(&mut id)?;
    let mut status = 0u8;
    reader.u8(&mut status)?;
    let def = REGISTRY.by_id(id).ok_or_else(|| {
        WireError::corrupt(reader.position(), format!("unknown packet id {id:#04x}"))
    })?;
    let mut body = (def.factory)();
    body.serial_body(&mut reader)?;
    reader.end()?;
    Ok((body, status))
}

// ==========================================
// ROUTER
// ==========================================

/// A decoded packet on its way to the owning thread.
#[derive(Debug)]
pub struct RoutedPacket {
    pub body: PacketBody,
    pub status: u8,
    pub from: EndpointAddr,
}

/// What [`PacketRouter::receive`] did with a raw packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// Decoded and queued on the given thread's inbox.
    Delivered(HandlerThread),
    /// Rejected; the reason went to the log.
    Dropped,
}

/// The inbox receivers, one per handler thread.
///
/// Each thread drains only its own receiver; there is no way to pull
/// another thread's packets, which is what makes the registry's thread
/// affinity an enforced property rather than a convention.
#[derive(Debug)]
pub struct RouterInboxes {
    pub net: mpsc::UnboundedReceiver<RoutedPacket>,
    pub main: mpsc::UnboundedReceiver<RoutedPacket>,
}

/// The receive boundary between the transport and the simulation.
///
/// Decodes raw packets, enforces the registry's pre-handshake and class
/// rules, and delivers survivors to the owning thread's inbox. Decode
/// failures are logged and dropped here and never travel further.
#[derive(Debug)]
pub struct PacketRouter {
    net_tx: mpsc::UnboundedSender<RoutedPacket>,
    main_tx: mpsc::UnboundedSender<RoutedPacket>,
    handshaken: HashSet<EndpointAddr>,
}

impl PacketRouter {
    /// A router plus the inboxes it delivers into.
    pub fn new() -> (Self, RouterInboxes) {
        let (net_tx, net) = mpsc::unbounded_channel();
        let (main_tx, main) = mpsc::unbounded_channel();
        (
            Self {
                net_tx,
                main_tx,
                handshaken: HashSet::new(),
            },
            RouterInboxes { net, main },
        )
    }

    /// Record that the handshake with `peer` completed.
    pub fn mark_handshaken(&mut self, peer: EndpointAddr) {
        self.handshaken.insert(peer);
    }

    /// Forget a departed peer.
    pub fn forget_peer(&mut self, peer: &EndpointAddr) {
        self.handshaken.remove(peer);
    }

    /// Decode one raw packet and deliver it to the owning thread.
    ///
    /// Never fails and never panics: anything wrong with the packet turns
    /// into [`ReceiveOutcome::Dropped`] plus a log line.
    pub fn receive(&mut self, raw: &RawPacket) -> ReceiveOutcome {
        let (body, status) = match unpack(raw) {
            Ok(decoded) => decoded,
            Err(err) => {
                warn!(peer = %raw.addr, error = %err, "dropping undecodable packet");
                return ReceiveOutcome::Dropped;
            }
        };
        let Some(def) = REGISTRY.by_id(body.id()) else {
            // unpack only succeeds for registered ids.
            return ReceiveOutcome::Dropped;
        };
        if def.class == ProtocolClass::Control {
            warn!(peer = %raw.addr, packet = def.name, "control packet from the wire dropped");
            return ReceiveOutcome::Dropped;
        }
        if !def.pre_handshake && !self.handshaken.contains(&raw.addr) {
            warn!(peer = %raw.addr, packet = def.name, "packet before handshake dropped");
            return ReceiveOutcome::Dropped;
        }
        if tracing::enabled!(tracing::Level::TRACE) {
            if let Ok(dump) = ini_encode(&mut Envelope::new(body.clone())) {
                trace!(peer = %raw.addr, packet = def.name, "received:\n{dump}");
            }
        }
        let thread = def.thread;
        let routed = RoutedPacket {
            body,
            status,
            from: raw.addr,
        };
        let tx = match thread {
            HandlerThread::Net => &self.net_tx,
            HandlerThread::Main => &self.main_tx,
        };
        if tx.send(routed).is_err() {
            warn!(packet = def.name, "inbox closed, packet dropped");
            return ReceiveOutcome::Dropped;
        }
        debug!(peer = %raw.addr, packet = def.name, ?thread, "packet delivered");
        ReceiveOutcome::Delivered(thread)
    }
}
