//! # Binary Backend
//!
//! Compact little-endian serialization without any framing of its own.
//!
//! Writing is a two-pass affair: [`BinSizer`] walks the value and only
//! counts bytes, then [`BinWriter`] walks it again into a buffer reserved at
//! exactly that size. Both passes run the same [`Serial::serial`] code, so
//! the measured and written layouts cannot disagree.
//!
//! Reading borrows the input slice and never copies it. Truncated input
//! surfaces as [`WireError::Eof`] and structurally invalid bytes as
//! [`WireError::Corrupt`], both carrying the byte offset at which decoding
//! stopped.
//!
//! ## Wire Layout
//! - Integers: fixed-width little-endian
//! - Booleans: one byte, `0` or `1`
//! - Strings: raw UTF-8 bytes plus a NUL terminator
//! - Raw runs: exactly the bytes of the slice, no length
//!
//! Names and separators do not exist in this format; structure comes from
//! traversal order alone.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{constants::ERR_NON_ASCII_CHAR, Result, WireError};
use crate::serial::{Codec, Serial, StrStyle};

/// First pass of binary writing: measures the encoded size of a value.
#[derive(Debug, Default)]
pub struct BinSizer {
    len: usize,
}

impl BinSizer {
    /// A sizer with no bytes counted yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes the measured value will occupy.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if nothing has been measured.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Codec for BinSizer {
    fn is_reading(&self) -> bool {
        false
    }

    fn has_naming(&self) -> bool {
        false
    }

    fn bool(&mut self, _value: &mut bool) -> Result<()> {
        self.len += 1;
        Ok(())
    }

    fn u8(&mut self, _value: &mut u8) -> Result<()> {
        self.len += 1;
        Ok(())
    }

    fn i8(&mut self, _value: &mut i8) -> Result<()> {
        self.len += 1;
        Ok(())
    }

    fn u16(&mut self, _value: &mut u16) -> Result<()> {
        self.len += 2;
        Ok(())
    }

    fn i16(&mut self, _value: &mut i16) -> Result<()> {
        self.len += 2;
        Ok(())
    }

    fn u32(&mut self, _value: &mut u32) -> Result<()> {
        self.len += 4;
        Ok(())
    }

    fn i32(&mut self, _value: &mut i32) -> Result<()> {
        self.len += 4;
        Ok(())
    }

    fn u64(&mut self, _value: &mut u64) -> Result<()> {
        self.len += 8;
        Ok(())
    }

    fn i64(&mut self, _value: &mut i64) -> Result<()> {
        self.len += 8;
        Ok(())
    }

    fn character(&mut self, _value: &mut char) -> Result<()> {
        self.len += 1;
        Ok(())
    }

    fn raw(&mut self, value: &mut [u8]) -> Result<()> {
        self.len += value.len();
        Ok(())
    }

    fn string(&mut self, value: &mut String, _style: StrStyle) -> Result<()> {
        self.len += value.len() + 1;
        Ok(())
    }

    fn position(&self) -> String {
        format!("byte {}", self.len)
    }
}

/// Second pass of binary writing: fills a buffer reserved by [`BinSizer`].
#[derive(Debug)]
pub struct BinWriter {
    buf: BytesMut,
}

impl BinWriter {
    /// A writer with `capacity` bytes reserved up front.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Freeze the buffer into the finished encoding.
    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}

impl Codec for BinWriter {
    fn is_reading(&self) -> bool {
        false
    }

    fn has_naming(&self) -> bool {
        false
    }

    fn bool(&mut self, value: &mut bool) -> Result<()> {
        self.buf.put_u8(u8::from(*value));
        Ok(())
    }

    fn u8(&mut self, value: &mut u8) -> Result<()> {
        self.buf.put_u8(*value);
        Ok(())
    }

    fn i8(&mut self, value: &mut i8) -> Result<()> {
        self.buf.put_i8(*value);
        Ok(())
    }

    fn u16(&mut self, value: &mut u16) -> Result<()> {
        self.buf.put_u16_le(*value);
        Ok(())
    }

    fn i16(&mut self, value: &mut i16) -> Result<()> {
        self.buf.put_i16_le(*value);
        Ok(())
    }

    fn u32(&mut self, value: &mut u32) -> Result<()> {
        self.buf.put_u32_le(*value);
        Ok(())
    }

    fn i32(&mut self, value: &mut i32) -> Result<()> {
        self.buf.put_i32_le(*value);
        Ok(())
    }

    fn u64(&mut self, value: &mut u64) -> Result<()> {
        self.buf.put_u64_le(*value);
        Ok(())
    }

    fn i64(&mut self, value: &mut i64) -> Result<()> {
        self.buf.put_i64_le(*value);
        Ok(())
    }

    fn character(&mut self, value: &mut char) -> Result<()> {
        let byte = if value.is_ascii() { *value as u8 } else { b'?' };
        self.buf.put_u8(byte);
        Ok(())
    }

    fn raw(&mut self, value: &mut [u8]) -> Result<()> {
        self.buf.put_slice(value);
        Ok(())
    }

    fn string(&mut self, value: &mut String, _style: StrStyle) -> Result<()> {
        debug_assert!(
            !value.as_bytes().contains(&0),
            "interior NUL cannot survive a binary round trip"
        );
        self.buf.put_slice(value.as_bytes());
        self.buf.put_u8(0);
        Ok(())
    }

    fn position(&self) -> String {
        format!("byte {}", self.buf.len())
    }
}

/// Binary reading backend over a borrowed input slice.
#[derive(Debug)]
pub struct BinReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BinReader<'a> {
    /// A reader positioned at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(WireError::eof(self.position()));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn take_arr<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }
}

impl Codec for BinReader<'_> {
    fn is_reading(&self) -> bool {
        true
    }

    fn has_naming(&self) -> bool {
        false
    }

    fn end(&mut self) -> Result<()> {
        if self.remaining() > 0 {
            tracing::warn!(
                trailing = self.remaining(),
                position = %self.position(),
                "unconsumed bytes after decode"
            );
        }
        Ok(())
    }

    fn bool(&mut self, value: &mut bool) -> Result<()> {
        let pos = self.position();
        match self.take(1)?[0] {
            0 => *value = false,
            1 => *value = true,
            other => {
                return Err(WireError::corrupt(
                    pos,
                    format!("flag byte must be 0 or 1, got {other}"),
                ))
            }
        }
        Ok(())
    }

    fn u8(&mut self, value: &mut u8) -> Result<()> {
        *value = self.take(1)?[0];
        Ok(())
    }

    fn i8(&mut self, value: &mut i8) -> Result<()> {
        *value = self.take(1)?[0] as i8;
        Ok(())
    }

    fn u16(&mut self, value: &mut u16) -> Result<()> {
        *value = u16::from_le_bytes(self.take_arr()?);
        Ok(())
    }

    fn i16(&mut self, value: &mut i16) -> Result<()> {
        *value = i16::from_le_bytes(self.take_arr()?);
        Ok(())
    }

    fn u32(&mut self, value: &mut u32) -> Result<()> {
        *value = u32::from_le_bytes(self.take_arr()?);
        Ok(())
    }

    fn i32(&mut self, value: &mut i32) -> Result<()> {
        *value = i32::from_le_bytes(self.take_arr()?);
        Ok(())
    }

    fn u64(&mut self, value: &mut u64) -> Result<()> {
        *value = u64::from_le_bytes(self.take_arr()?);
        Ok(())
    }

    fn i64(&mut self, value: &mut i64) -> Result<()> {
        *value = i64::from_le_bytes(self.take_arr()?);
        Ok(())
    }

    fn character(&mut self, value: &mut char) -> Result<()> {
        let pos = self.position();
        let byte = self.take(1)?[0];
        if !byte.is_ascii() {
            return Err(WireError::corrupt(pos, ERR_NON_ASCII_CHAR));
        }
        *value = byte as char;
        Ok(())
    }

    fn raw(&mut self, value: &mut [u8]) -> Result<()> {
        value.copy_from_slice(self.take(value.len())?);
        Ok(())
    }

    fn string(&mut self, value: &mut String, _style: StrStyle) -> Result<()> {
        let pos = self.position();
        let rest = &self.data[self.pos..];
        let Some(nul) = rest.iter().position(|&b| b == 0) else {
            // No terminator before the buffer ends: the input is truncated.
            self.pos = self.data.len();
            return Err(WireError::eof(pos));
        };
        let bytes = &rest[..nul];
        self.pos += nul + 1;
        match std::str::from_utf8(bytes) {
            Ok(s) => {
                value.clear();
                value.push_str(s);
                Ok(())
            }
            Err(_) => Err(WireError::corrupt(pos, "string is not valid UTF-8")),
        }
    }

    fn position(&self) -> String {
        format!("byte {}", self.pos)
    }
}

/// Encode `value` to its binary form.
///
/// Runs the sizing pass, reserves the buffer, then runs the writing pass.
///
/// # Errors
/// Returns any error raised by the value's own [`Serial::serial`] logic;
/// the backend itself cannot fail on write.
pub fn bin_encode<T: Serial + ?Sized>(value: &mut T) -> Result<Bytes> {
    let mut sizer = BinSizer::new();
    sizer.begin()?;
    value.serial(&mut sizer)?;
    sizer.end()?;

    let mut writer = BinWriter::with_capacity(sizer.len());
    writer.begin()?;
    value.serial(&mut writer)?;
    writer.end()?;
    debug_assert_eq!(writer.len(), sizer.len(), "sizing and writing passes disagree");
    Ok(writer.finish())
}

/// Measure the binary encoding of `value` without producing it.
///
/// # Errors
/// Returns any error raised by the value's own [`Serial::serial`] logic.
pub fn bin_size<T: Serial + ?Sized>(value: &mut T) -> Result<usize> {
    let mut sizer = BinSizer::new();
    sizer.begin()?;
    value.serial(&mut sizer)?;
    sizer.end()?;
    Ok(sizer.len())
}

/// Decode a `T` from its binary form.
///
/// # Errors
/// [`WireError::Eof`] if `data` is truncated, [`WireError::Corrupt`] if it
/// is structurally invalid.
pub fn bin_decode<T: Serial + Default>(data: &[u8]) -> Result<T> {
    let mut value = T::default();
    bin_decode_into(&mut value, data)?;
    Ok(value)
}

/// Decode from binary form into an existing value.
///
/// Useful when the target was produced by a factory and cannot be named as
/// a type parameter. Trailing bytes are tolerated with a warning.
///
/// # Errors
/// [`WireError::Eof`] if `data` is truncated, [`WireError::Corrupt`] if it
/// is structurally invalid.
pub fn bin_decode_into<T: Serial + ?Sized>(value: &mut T, data: &[u8]) -> Result<()> {
    let mut reader = BinReader::new(data);
    reader.begin()?;
    value.serial(&mut reader)?;
    reader.end()?;
    Ok(())
}

// ==========================================
// TESTS
// ==========================================
