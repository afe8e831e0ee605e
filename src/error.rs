//! # Error Types
//!
//! Comprehensive error handling for the wire core.
//!
//! This module defines all error variants that can occur while moving values
//! between memory and the wire, from truncated buffers to malformed text
//! documents and misused request clients.
//!
//! ## Error Categories
//! - **Decode Errors**: `NotFound`, `Eof` and `Corrupt` carry the reader
//!   position at which decoding stopped
//! - **Frame Errors**: Oversized frames on length-prefixed streams
//! - **Client Errors**: Busy, canceled or failed asynchronous requests
//! - **I/O and Configuration**: Underlying socket/file failures and bad
//!   configuration values
//!
//! `NotFound` is the only *recoverable* decode error: adaptors catch it to
//! substitute default values. `Eof` and `Corrupt` abort the current decode
//! and callers are expected to drop the offending packet.
//!
//! ## Example Usage
//! ```rust
//! use wirepack::error::{Result, WireError};
//!
//! fn read_flag(input: &[u8]) -> Result<bool> {
//!     match input.first() {
//!         Some(0) => Ok(false),
//!         Some(1) => Ok(true),
//!         Some(_) => Err(WireError::corrupt("byte 0", "flag must be 0 or 1")),
//!         None => Err(WireError::eof("byte 0")),
//!     }
//! }
//!
//! assert_eq!(read_flag(&[1]).unwrap(), true);
//! assert!(read_flag(&[]).is_err());
//! ```

use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
/// Static strings are borrowed, avoiding heap allocations for common error cases.
pub mod constants {
    /// Serialization errors
    pub const ERR_EXPECTED_QUOTE: &str = "Expected opening quote";
    pub const ERR_UNTERMINATED_STRING: &str = "Unterminated string";
    pub const ERR_BAD_BOOL: &str = "Boolean must be true, false, 0 or 1";
    pub const ERR_NON_ASCII_CHAR: &str = "Character is outside the single-byte range";
    pub const ERR_OVERLONG_VARINT: &str = "Packed integer exceeds 32 bits";
    pub const ERR_LIST_TOO_LONG: &str = "Element count exceeds limit";

    /// Address parsing errors
    pub const ERR_EMPTY_PORT: &str = "Empty port after colon";
    pub const ERR_ZONE_NOT_NUMERIC: &str = "Zone id must be numeric";
    pub const ERR_HOST_NOT_LITERAL: &str = "Host is not an address literal";
}

// WireError is the primary error type for all serialization and wire operations
#[derive(Error, Debug)]
pub enum WireError {
    #[error("value not found at {position}")]
    NotFound { position: String },

    #[error("unexpected end of input at {position}")]
    Eof { position: String },

    #[error("corrupt input at {position}: {message}")]
    Corrupt { position: String, message: String },

    #[error("frame too large: {0} bytes")]
    Oversized(usize),

    #[error("a request is already pending")]
    Busy,

    #[error("request canceled")]
    Canceled,

    #[error("request failed: {0}")]
    Request(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl WireError {
    /// A value was absent at `position`. Recoverable through default adaptors.
    pub fn not_found(position: impl Into<String>) -> Self {
        Self::NotFound {
            position: position.into(),
        }
    }

    /// Input ended before the value at `position` was complete.
    pub fn eof(position: impl Into<String>) -> Self {
        Self::Eof {
            position: position.into(),
        }
    }

    /// Input at `position` was present but structurally invalid.
    pub fn corrupt(position: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Corrupt {
            position: position.into(),
            message: message.into(),
        }
    }

    /// True for the recoverable absence marker.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// True for decode failures that should drop the packet (`Eof`, `Corrupt`).
    pub fn is_decode_failure(&self) -> bool {
        matches!(self, Self::Eof { .. } | Self::Corrupt { .. })
    }
}

/// Type alias for Results using WireError
pub type Result<T> = std::result::Result<T, WireError>;
