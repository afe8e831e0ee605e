//! # Address Model
//!
//! Family-transparent IPv4/IPv6 host and endpoint addresses.
//!
//! A [`HostAddr`] holds exactly one of the two low-level families, plus a
//! zone/scope id for IPv6. Callers that do not care about families work
//! with the canonical forms: [`HostAddr::as_v6`] maps IPv4 into the
//! `::ffff:0:0/96` range and [`HostAddr::as_v4`] undoes exactly that
//! mapping, so the pair is lossless for genuinely dual-stack values.
//!
//! Equality follows the same rule: an IPv4 address equals its IPv6-mapped
//! form, and the scope id participates only when both sides are IPv6.
//!
//! On the wire an address is always its canonical text (`ip:port` or
//! `[ipv6]:port`), binary backends included. That costs a few bytes and
//! buys one shared code path that survives address-family changes.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};
use std::str::FromStr;

use crate::error::{
    constants::{ERR_EMPTY_PORT, ERR_HOST_NOT_LITERAL, ERR_ZONE_NOT_NUMERIC},
    Result, WireError,
};
use crate::serial::{Codec, Serial, StrStyle};

/// One IPv4 or IPv6 host address, tagged by family.
#[derive(Debug, Clone, Copy, Eq)]
pub enum HostAddr {
    V4(Ipv4Addr),
    V6 {
        addr: Ipv6Addr,
        /// Zone/scope id; meaningful for link-local addresses, 0 otherwise.
        scope: u32,
    },
}

impl HostAddr {
    /// Canonicalize toward IPv4: an IPv6-mapped IPv4 address becomes the
    /// IPv4 it maps, anything else is returned unchanged.
    pub fn as_v4(self) -> Self {
        match self {
            Self::V6 { addr, .. } => match addr.to_ipv4_mapped() {
                Some(v4) => Self::V4(v4),
                None => self,
            },
            v4 => v4,
        }
    }

    /// Canonicalize toward IPv6: an IPv4 address becomes its IPv6-mapped
    /// form, an IPv6 address is returned unchanged.
    pub fn as_v6(self) -> Self {
        match self {
            Self::V4(addr) => Self::V6 {
                addr: addr.to_ipv6_mapped(),
                scope: 0,
            },
            v6 => v6,
        }
    }

    /// True for an IPv6 address that is not merely a mapped IPv4 one.
    pub fn is_native_v6(self) -> bool {
        matches!(self, Self::V6 { addr, .. } if addr.to_ipv4_mapped().is_none())
    }

    /// The 16 raw octets of the IPv6-mapped form.
    pub fn v6_octets(self) -> [u8; 16] {
        match self.as_v6() {
            Self::V6 { addr, .. } => addr.octets(),
            Self::V4(_) => unreachable!("as_v6 always yields a V6 value"),
        }
    }

    pub fn is_loopback(self) -> bool {
        match self.as_v4() {
            Self::V4(addr) => addr.is_loopback(),
            Self::V6 { addr, .. } => addr.is_loopback(),
        }
    }

    /// True for 169.254/16 and fe80::/10.
    pub fn is_link_local(self) -> bool {
        match self.as_v4() {
            Self::V4(addr) => addr.is_link_local(),
            Self::V6 { addr, .. } => addr.segments()[0] & 0xFFC0 == 0xFE80,
        }
    }

    /// True for the private IPv4 ranges (10/8, 172.16/12, 192.168/16) and
    /// IPv6 unique-local addresses (fc00::/7).
    pub fn is_private(self) -> bool {
        match self.as_v4() {
            Self::V4(addr) => addr.is_private(),
            Self::V6 { addr, .. } => addr.segments()[0] & 0xFE00 == 0xFC00,
        }
    }

    pub fn is_multicast(self) -> bool {
        match self.as_v4() {
            Self::V4(addr) => addr.is_multicast(),
            Self::V6 { addr, .. } => addr.segments()[0] & 0xFF00 == 0xFF00,
        }
    }
}

impl PartialEq for HostAddr {
    fn eq(&self, other: &Self) -> bool {
        match (*self, *other) {
            (Self::V4(a), Self::V4(b)) => a == b,
            (Self::V6 { addr: a, scope: sa }, Self::V6 { addr: b, scope: sb }) => {
                a == b && sa == sb
            }
            (Self::V4(v4), Self::V6 { addr: v6, .. })
            | (Self::V6 { addr: v6, .. }, Self::V4(v4)) => v6.to_ipv4_mapped() == Some(v4),
        }
    }
}

impl Hash for HostAddr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Matches the mapped-equality rule: an IPv4 address hashes like its
        // IPv6-mapped form with scope 0.
        match self.as_v6() {
            Self::V6 { addr, scope } => {
                addr.octets().hash(state);
                let scope = match *self {
                    Self::V4(_) => 0,
                    Self::V6 { .. } => scope,
                };
                scope.hash(state);
            }
            Self::V4(_) => unreachable!("as_v6 always yields a V6 value"),
        }
    }
}

impl fmt::Display for HostAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V4(addr) => write!(f, "{addr}"),
            Self::V6 { addr, scope: 0 } => write!(f, "{addr}"),
            Self::V6 { addr, scope } => write!(f, "{addr}%{scope}"),
        }
    }
}

impl From<IpAddr> for HostAddr {
    fn from(value: IpAddr) -> Self {
        match value {
            IpAddr::V4(addr) => Self::V4(addr),
            IpAddr::V6(addr) => Self::V6 { addr, scope: 0 },
        }
    }
}

impl From<HostAddr> for IpAddr {
    fn from(value: HostAddr) -> Self {
        match value {
            HostAddr::V4(addr) => IpAddr::V4(addr),
            HostAddr::V6 { addr, .. } => IpAddr::V6(addr),
        }
    }
}

impl FromStr for HostAddr {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self> {
        let (body, scope) = match s.split_once('%') {
            Some((body, zone)) => {
                let scope = zone
                    .parse()
                    .map_err(|_| WireError::corrupt(format!("'{s}'"), ERR_ZONE_NOT_NUMERIC))?;
                (body, scope)
            }
            None => (s, 0),
        };
        if let Ok(v4) = body.parse::<Ipv4Addr>() {
            return Ok(Self::V4(v4));
        }
        match body.parse::<Ipv6Addr>() {
            Ok(addr) => Ok(Self::V6 { addr, scope }),
            Err(_) => Err(WireError::corrupt(format!("'{s}'"), ERR_HOST_NOT_LITERAL)),
        }
    }
}

/// A host address plus port.
///
/// The null endpoint (no host, port 0) is the "not set" state used by
/// defaults and routing metadata before a peer is known.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EndpointAddr {
    pub host: Option<HostAddr>,
    pub port: u16,
}

impl EndpointAddr {
    pub fn new(host: HostAddr, port: u16) -> Self {
        Self {
            host: Some(host),
            port,
        }
    }

    /// True only when both host and port are unset.
    pub fn is_null(self) -> bool {
        self.host.is_none() && self.port == 0
    }

    /// Canonicalize the host toward IPv4; see [`HostAddr::as_v4`].
    pub fn as_v4(self) -> Self {
        Self {
            host: self.host.map(HostAddr::as_v4),
            port: self.port,
        }
    }

    /// Canonicalize the host toward IPv6; see [`HostAddr::as_v6`].
    pub fn as_v6(self) -> Self {
        Self {
            host: self.host.map(HostAddr::as_v6),
            port: self.port,
        }
    }
}

impl fmt::Display for EndpointAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.host {
            None => write!(f, ":{}", self.port),
            Some(host @ HostAddr::V4(_)) => write!(f, "{host}:{}", self.port),
            Some(host) => write!(f, "[{host}]:{}", self.port),
        }
    }
}

impl From<SocketAddr> for EndpointAddr {
    fn from(value: SocketAddr) -> Self {
        let host = match value {
            SocketAddr::V4(v4) => HostAddr::V4(*v4.ip()),
            SocketAddr::V6(v6) => HostAddr::V6 {
                addr: *v6.ip(),
                scope: v6.scope_id(),
            },
        };
        Self::new(host, value.port())
    }
}

impl TryFrom<EndpointAddr> for SocketAddr {
    type Error = WireError;

    fn try_from(value: EndpointAddr) -> Result<Self> {
        match value.host {
            Some(HostAddr::V4(addr)) => {
                Ok(SocketAddr::V4(SocketAddrV4::new(addr, value.port)))
            }
            Some(HostAddr::V6 { addr, scope }) => Ok(SocketAddr::V6(SocketAddrV6::new(
                addr, value.port, 0, scope,
            ))),
            None => Err(WireError::corrupt(
                "endpoint address",
                "null endpoint has no socket form",
            )),
        }
    }
}

impl FromStr for EndpointAddr {
    type Err = WireError;

    /// Parse `ip:port`, `[ipv6]:port`, a bare address of either family, or
    /// the empty string (the null endpoint).
    ///
    /// IPv6 is recognized by a leading `[` or by more than one `:`;
    /// otherwise one optional trailing `:port` applies. A trailing colon
    /// with nothing after it is an error. Hostnames are not resolved here;
    /// a non-literal host is rejected and resolution is the caller's job.
    fn from_str(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Ok(Self::default());
        }
        if let Some(rest) = s.strip_prefix('[') {
            let Some((host, after)) = rest.split_once(']') else {
                return Err(WireError::corrupt(format!("'{s}'"), "missing ']'"));
            };
            let host: HostAddr = host.parse()?;
            let port = match after {
                "" => 0,
                ":" => return Err(WireError::corrupt(format!("'{s}'"), ERR_EMPTY_PORT)),
                _ => match after.strip_prefix(':') {
                    Some(port) => parse_port(s, port)?,
                    None => {
                        return Err(WireError::corrupt(
                            format!("'{s}'"),
                            "unexpected content after ']'",
                        ))
                    }
                },
            };
            return Ok(Self::new(host, port));
        }
        if s.bytes().filter(|&b| b == b':').count() > 1 {
            // More than one colon and no brackets: a bare IPv6 literal.
            return Ok(Self::new(s.parse()?, 0));
        }
        match s.split_once(':') {
            None => Ok(Self::new(s.parse()?, 0)),
            Some((_, "")) => Err(WireError::corrupt(format!("'{s}'"), ERR_EMPTY_PORT)),
            // A leading colon is the host-less form `:port`.
            Some(("", port)) => Ok(Self {
                host: None,
                port: parse_port(s, port)?,
            }),
            Some((host, port)) => Ok(Self::new(host.parse()?, parse_port(s, port)?)),
        }
    }
}

fn parse_port(whole: &str, port: &str) -> Result<u16> {
    port.parse()
        .map_err(|_| WireError::corrupt(format!("'{whole}'"), "port is not a number"))
}

impl Serial for EndpointAddr {
    fn serial(&mut self, codec: &mut dyn Codec) -> Result<()> {
        if codec.is_reading() {
            let mut text = String::new();
            codec.string(&mut text, StrStyle::Escaped)?;
            *self = text
                .parse()
                .map_err(|err: WireError| WireError::corrupt(codec.position(), err.to_string()))?;
            Ok(())
        } else {
            codec.string(&mut self.to_string(), StrStyle::Escaped)
        }
    }
}

// ==========================================
// TESTS
// ==========================================
