//! # wirepack
//!
//! Bidirectional serialization core and wire protocol for real-time
//! multiplayer sessions.
//!
//! ## Features
//! - **One code path per type**: a value describes its layout once and the
//!   same traversal drives binary writing, binary reading, text writing,
//!   text reading and defaulting
//! - **Compact binary wire format**: two-pass encoding into exactly-sized
//!   buffers, positioned `Eof`/`Corrupt` errors on the way back
//! - **Human-editable text format**: an INI dialect with order-independent
//!   keys, warnings for unknown input and clamping instead of rejection
//! - **Typed packets**: a static registry resolves wire ids to a closed
//!   set of packet bodies; a router enforces handshake and thread-affinity
//!   rules at the receive boundary
//! - **Dual-stack addresses**: family-transparent IPv4/IPv6 host and
//!   endpoint types with lossless canonical mapping
//! - **NAT traversal**: the minimal hole-punching protocol spoken with
//!   rendezvous relays, parseable by much simpler software
//!
//! ## Safety at the Trust Boundary
//! Everything arriving from the network is treated as adversarial.
//! Truncated input is `Eof`, malformed input is `Corrupt`, and both are
//! caught at the one-packet boundary and turned into a logged drop.
//! Unknown-but-well-formed input (keys, names, ids in text documents) only
//! warns, which is what keeps old and new engine versions talking to each
//! other.
//!
//! ## Example
//! ```rust
//! use wirepack::net::packet::{pack, unpack, PacketBody, Ping};
//!
//! # fn main() -> wirepack::error::Result<()> {
//! let mut body = PacketBody::Ping(Ping { tick: 42 });
//! let raw = pack(&mut body, 0, "127.0.0.1:11113".parse()?)?;
//! let (decoded, status) = unpack(&raw)?;
//! assert_eq!(decoded, body);
//! assert_eq!(status, 0);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod net;
pub mod serial;

pub use error::{Result, WireError};
