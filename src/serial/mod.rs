//! # Serialization Core
//!
//! Bidirectional serialization over interchangeable backends.
//!
//! A type describes its wire layout once, in [`Serial::serial`], and the same
//! code path drives every direction and format: binary writing, binary
//! reading, text writing, text reading and default initialization. Because
//! there is only one traversal per type, the read and write sides cannot
//! drift apart.
//!
//! ## Backends
//! - [`BinSizer`] + [`BinWriter`]: two-pass binary encoding (measure, then
//!   fill a pre-sized buffer)
//! - [`BinReader`]: binary decoding with positioned `Eof`/`Corrupt` errors
//! - [`IniWriter`] + [`IniReader`]: a human-editable INI dialect with
//!   sections, `Key=Value` lines and order-independent reading
//! - [`NullCodec`]: a reading backend that finds nothing, used to reset
//!   values to their declared defaults
//!
//! ## Traversal Model
//! Values always pass as `&mut` so one signature serves both directions:
//! writers inspect the value, readers overwrite it. Structure is expressed
//! through *names* (sections or keys in text, no-ops in binary) and
//! *separators* (single punctuation characters in text, no-ops in binary).
//! Loops driven by [`Codec::separator`] or repeated [`Codec::name`] probes
//! must be guarded by [`Codec::has_naming`]; binary backends encode element
//! counts instead.
//!
//! ## Usage
//! ```rust
//! use wirepack::error::Result;
//! use wirepack::serial::{adapt, bin_decode, bin_encode, ini_encode, Codec, Serial};
//!
//! #[derive(Debug, Default, PartialEq)]
//! struct Greeting {
//!     count: u32,
//!     text: String,
//! }
//!
//! impl Serial for Greeting {
//!     fn serial(&mut self, codec: &mut dyn Codec) -> Result<()> {
//!         adapt::named_default(codec, "Count", &mut self.count, 0)?;
//!         adapt::named(codec, "Text", |c| self.text.serial(c))
//!     }
//! }
//!
//! # fn main() -> Result<()> {
//! let mut value = Greeting { count: 3, text: "hello".into() };
//! let bytes = bin_encode(&mut value)?;
//! let back: Greeting = bin_decode(&bytes)?;
//! assert_eq!(back, value);
//!
//! let text = ini_encode(&mut value)?;
//! assert!(text.contains("Count=3"));
//! # Ok(())
//! # }
//! ```

pub mod adapt;
pub mod binary;
pub mod fixed;
pub mod ini;
pub mod null;

pub use binary::{bin_decode, bin_decode_into, bin_encode, bin_size, BinReader, BinSizer, BinWriter};
pub use fixed::Fixed;
pub use ini::{ini_decode, ini_decode_into, ini_encode, IniReader, IniWriter};
pub use null::{apply_defaults, NullCodec};

use crate::error::Result;

/// Upper bound on decoded element counts.
///
/// Counted containers refuse to decode more elements than this, so a forged
/// count cannot drive an unbounded loop before the input runs dry.
pub const MAX_ELEMENTS: u32 = 65_536;

/// Punctuation roles used between values in text form.
///
/// Text backends write and match the corresponding character; binary
/// backends ignore separators entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sep {
    /// `,` between list elements
    Comma,
    /// `;` between larger list elements, e.g. addresses
    Semicolon,
    /// `=` inside composite tokens
    Equals,
    /// `.` between integer and fraction parts
    Part,
    /// `:` inside endpoint-like tokens
    Colon,
    /// `|` between combined flag names
    Pipe,
    /// `+` between additive tokens
    Plus,
    /// `-` between range bounds
    Dash,
}

impl Sep {
    /// The single character written or matched in text form.
    pub fn glyph(self) -> char {
        match self {
            Sep::Comma => ',',
            Sep::Semicolon => ';',
            Sep::Equals => '=',
            Sep::Part => '.',
            Sep::Colon => ':',
            Sep::Pipe => '|',
            Sep::Plus => '+',
            Sep::Dash => '-',
        }
    }
}

/// How a string is rendered in text form.
///
/// Binary backends ignore the style and always emit the raw bytes followed
/// by a NUL terminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrStyle {
    /// Double-quoted with C-style escapes. Safe for arbitrary content.
    #[default]
    Escaped,
    /// The remainder of the current value, verbatim. No quoting, so the
    /// content must not contain line breaks.
    Plain,
    /// A bare run of `[A-Za-z0-9_.+-]`, stopping at the first other
    /// character. Used for symbolic names and numeric tokens.
    Token,
}

impl StrStyle {
    /// True if `ch` may appear in a [`StrStyle::Token`] string.
    pub fn is_token_char(ch: char) -> bool {
        ch.is_ascii_alphanumeric() || matches!(ch, '_' | '.' | '+' | '-')
    }
}

/// The backend-facing side of a serialization pass.
///
/// One implementation exists per direction and format. Application types
/// never interact with a concrete backend; they describe themselves against
/// `&mut dyn Codec` and the calling side picks the backend.
///
/// All value accessors take `&mut` references: writing backends read from
/// the value, reading backends store into it.
pub trait Codec {
    /// True if this backend moves data *into* the value.
    fn is_reading(&self) -> bool;

    /// True if this backend understands names and separators.
    ///
    /// Binary backends return false: their layout is fixed by traversal
    /// order and they encode counts instead of punctuation.
    fn has_naming(&self) -> bool;

    /// Called once before the outermost value of a pass.
    fn begin(&mut self) -> Result<()> {
        Ok(())
    }

    /// Called once after the outermost value of a pass.
    fn end(&mut self) -> Result<()> {
        Ok(())
    }

    /// Enter the named scope `key`.
    ///
    /// Naming writers create the scope and return true. Naming readers
    /// return whether the scope exists; on false the cursor is unchanged
    /// and no [`Codec::name_end`] must follow. Non-naming backends treat
    /// this as a successful no-op.
    fn name(&mut self, _key: &str) -> bool {
        true
    }

    /// Leave the innermost named scope.
    ///
    /// Must balance a successful [`Codec::name`]. `abort` marks an exit on
    /// the error path; readers then skip their leftover-content warnings.
    fn name_end(&mut self, _abort: bool) {}

    /// Write or match a punctuation character.
    ///
    /// Naming readers return whether the separator was present, consuming
    /// it if so. Non-naming backends treat this as a successful no-op, so
    /// separator-driven loops must be guarded by [`Codec::has_naming`].
    fn separator(&mut self, _sep: Sep) -> bool {
        true
    }

    /// Process a boolean value.
    fn bool(&mut self, value: &mut bool) -> Result<()>;

    /// Process an unsigned byte.
    fn u8(&mut self, value: &mut u8) -> Result<()>;

    /// Process a signed byte.
    fn i8(&mut self, value: &mut i8) -> Result<()>;

    /// Process an unsigned 16-bit integer.
    fn u16(&mut self, value: &mut u16) -> Result<()>;

    /// Process a signed 16-bit integer.
    fn i16(&mut self, value: &mut i16) -> Result<()>;

    /// Process an unsigned 32-bit integer.
    fn u32(&mut self, value: &mut u32) -> Result<()>;

    /// Process a signed 32-bit integer.
    fn i32(&mut self, value: &mut i32) -> Result<()>;

    /// Process an unsigned 64-bit integer.
    fn u64(&mut self, value: &mut u64) -> Result<()>;

    /// Process a signed 64-bit integer.
    fn i64(&mut self, value: &mut i64) -> Result<()>;

    /// Process a single-byte character. Values outside the ASCII range are
    /// replaced with `?` on write and rejected as corrupt on read.
    fn character(&mut self, value: &mut char) -> Result<()>;

    /// Process a fixed-length run of raw bytes. The length is taken from
    /// the slice and never encoded.
    fn raw(&mut self, value: &mut [u8]) -> Result<()>;

    /// Process a string in the given text style.
    fn string(&mut self, value: &mut String, style: StrStyle) -> Result<()>;

    /// Human-readable description of the current position, for diagnostics
    /// and error messages.
    fn position(&self) -> String;

    /// Emit a non-fatal diagnostic tied to the current position.
    fn warn(&mut self, message: &str) {
        tracing::warn!(position = %self.position(), message, "serialization warning");
    }
}

/// A value with a self-describing wire layout.
///
/// The single [`Serial::serial`] method is invoked for reading and writing
/// alike; implementations hand each field to the codec in wire order,
/// usually through the combinators in [`adapt`].
pub trait Serial {
    /// Drive this value through one serialization pass.
    fn serial(&mut self, codec: &mut dyn Codec) -> Result<()>;
}

impl Serial for bool {
    fn serial(&mut self, codec: &mut dyn Codec) -> Result<()> {
        codec.bool(self)
    }
}

impl Serial for u8 {
    fn serial(&mut self, codec: &mut dyn Codec) -> Result<()> {
        codec.u8(self)
    }
}

impl Serial for i8 {
    fn serial(&mut self, codec: &mut dyn Codec) -> Result<()> {
        codec.i8(self)
    }
}

impl Serial for u16 {
    fn serial(&mut self, codec: &mut dyn Codec) -> Result<()> {
        codec.u16(self)
    }
}

impl Serial for i16 {
    fn serial(&mut self, codec: &mut dyn Codec) -> Result<()> {
        codec.i16(self)
    }
}

impl Serial for u32 {
    fn serial(&mut self, codec: &mut dyn Codec) -> Result<()> {
        codec.u32(self)
    }
}

impl Serial for i32 {
    fn serial(&mut self, codec: &mut dyn Codec) -> Result<()> {
        codec.i32(self)
    }
}

impl Serial for u64 {
    fn serial(&mut self, codec: &mut dyn Codec) -> Result<()> {
        codec.u64(self)
    }
}

impl Serial for i64 {
    fn serial(&mut self, codec: &mut dyn Codec) -> Result<()> {
        codec.i64(self)
    }
}

impl Serial for char {
    fn serial(&mut self, codec: &mut dyn Codec) -> Result<()> {
        codec.character(self)
    }
}

impl Serial for String {
    fn serial(&mut self, codec: &mut dyn Codec) -> Result<()> {
        codec.string(self, StrStyle::Escaped)
    }
}

impl Serial for [u8] {
    fn serial(&mut self, codec: &mut dyn Codec) -> Result<()> {
        codec.raw(self)
    }
}
