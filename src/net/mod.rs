//! # Wire Protocol Components
//!
//! Everything that turns serialized values into addressed network traffic.
//!
//! ## Components
//! - **Address**: family-transparent IPv4/IPv6 host and endpoint types
//! - **Registry**: the static packet-type table with routing metadata
//! - **Packet**: the typed packet bodies, the envelope and the router
//! - **Puncher**: the tiny NAT hole-punching sub-protocol
//! - **Frame**: length-prefix framing for stream transports
//! - **Client**: the asynchronous request client boundary
//! - **Reference**: HTTP-delivered session reference documents
//!
//! ## Trust Boundary
//! Every decoder in this tree treats its input as adversarial. Malformed
//! packets are dropped with a log line, never propagated into game state;
//! the puncher parser cannot fail at all, it only declines.

pub mod addr;
pub mod client;
pub mod frame;
pub mod packet;
pub mod puncher;
pub mod reference;
pub mod registry;
