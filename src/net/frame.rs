//! # Stream Framing
//!
//! Length-prefix framing for running packets over a byte stream.
//!
//! Datagram transports deliver one packet per datagram and skip this
//! module entirely. Stream transports (TCP tunnels, local IPC) need frame
//! boundaries restored, which [`FrameCodec`] does with a 4-byte big-endian
//! length prefix and a configurable size cap:
//!
//! ```text
//! [Length(4, BE)] [Packet bytes(Length)]
//! ```
//!
//! The cap bounds allocation before any buffer is reserved, so a forged
//! length cannot exhaust memory.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::WireError;

/// Default upper bound on one frame's payload.
pub const DEFAULT_MAX_FRAME: usize = 64 * 1024;

/// Tokio codec carrying raw packet bytes over a stream.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_frame: usize,
}

impl FrameCodec {
    /// A codec with the given per-frame size cap.
    pub fn with_max_frame(max_frame: usize) -> Self {
        Self { max_frame }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::with_max_frame(DEFAULT_MAX_FRAME)
    }
}

impl Decoder for FrameCodec {
    type Item = Bytes;
    type Error = WireError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>, WireError> {
        if src.len() < 4 {
            return Ok(None);
        }
        let len = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;
        if len > self.max_frame {
            return Err(WireError::Oversized(len));
        }
        if src.len() < 4 + len {
            src.reserve(4 + len - src.len());
            return Ok(None);
        }
        src.advance(4);
        Ok(Some(src.split_to(len).freeze()))
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = WireError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), WireError> {
        if item.len() > self.max_frame {
            return Err(WireError::Oversized(item.len()));
        }
        dst.reserve(4 + item.len());
        dst.put_u32(item.len() as u32);
        dst.put_slice(&item);
        Ok(())
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
    fn frames_round_trip() {
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::new();
        codec.encode(Bytes::from_static(b"one"), &mut buf).unwrap();
        codec.encode(Bytes::from_static(b"two!"), &mut buf).unwrap();
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap(), &b"one"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap(), &b"two!"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn partial_frames_wait_for_more_input() {
        let mut codec = FrameCodec::default();
        let mut full = BytesMut::new();
        codec
            .encode(Bytes::from_static(b"payload"), &mut full)
            .unwrap();
        for cut in 0..full.len() {
            let mut partial = BytesMut::from(&full[..cut]);
            assert_eq!(codec.decode(&mut partial).unwrap(), None, "cut at {cut}");
        }
    }

    #[test]
    fn oversized_length_is_rejected_before_allocation() {
        let mut codec = FrameCodec::with_max_frame(8);
        let mut buf = BytesMut::from(&u32::MAX.to_be_bytes()[..]);
        let err = codec.decode(&mut buf).unwrap_err();
        assert!(matches!(err, WireError::Oversized(_)), "got {err:?}");
    }

    #[test]
    fn oversized_payload_is_rejected_on_encode() {
        let mut codec = FrameCodec::with_max_frame(4);
        let err = codec
            .encode(Bytes::from_static(b"too long"), &mut BytesMut::new())
            .unwrap_err();
        assert!(matches!(err, WireError::Oversized(_)), "got {err:?}");
    }
}
