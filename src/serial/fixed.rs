//! # Fixed-Point Numbers
//!
//! Q16.16 fixed-point scalar used by deterministic game state.
//!
//! Simulation numbers must be bit-identical on every machine, so they are
//! stored as a scaled 32-bit integer rather than a float. On the binary
//! wire a [`Fixed`] is its raw `i32`; in text it is an exact decimal such
//! as `-3.25` (the fractional part of a power-of-two scale always has a
//! finite decimal form, so text round trips losslessly too).

use std::fmt;
use std::str::FromStr;

use crate::error::{Result, WireError};
use crate::serial::{Codec, Serial, StrStyle};

/// Fractional bits of the representation.
const FRAC_BITS: u32 = 16;
const FRAC_ONE: i64 = 1 << FRAC_BITS;
/// `5^16`; multiplying a 16-bit fraction by this yields its exact 16-digit
/// decimal expansion.
const FRAC_SCALE: u64 = 152_587_890_625;
const FRAC_DIGITS: usize = 16;

/// Q16.16 fixed-point number.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fixed(i32);

impl Fixed {
    pub const ZERO: Self = Self(0);
    pub const ONE: Self = Self(1 << FRAC_BITS);

    /// The value `whole`, exactly.
    pub fn from_int(whole: i16) -> Self {
        Self(i32::from(whole) << FRAC_BITS)
    }

    /// The nearest representable value to `value`.
    pub fn from_f32(value: f32) -> Self {
        Self((f64::from(value) * FRAC_ONE as f64).round() as i32)
    }

    /// Raw scaled representation, as stored on the binary wire.
    pub fn raw(self) -> i32 {
        self.0
    }

    /// A value from its raw scaled representation.
    pub fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    /// Whole part, truncated toward zero.
    pub fn to_int(self) -> i32 {
        self.0 / FRAC_ONE as i32
    }

    pub fn to_f32(self) -> f32 {
        (f64::from(self.0) / FRAC_ONE as f64) as f32
    }
}

impl fmt::Display for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let magnitude = i64::from(self.0).unsigned_abs();
        let whole = magnitude >> FRAC_BITS;
        let frac = magnitude & (FRAC_ONE as u64 - 1);
        if self.0 < 0 {
            write!(f, "-")?;
        }
        if frac == 0 {
            return write!(f, "{whole}");
        }
        let digits = format!("{:0width$}", frac * FRAC_SCALE, width = FRAC_DIGITS);
        write!(f, "{whole}.{}", digits.trim_end_matches('0'))
    }
}

impl FromStr for Fixed {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, ()> {
        let (negative, body) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s.strip_prefix('+').unwrap_or(s)),
        };
        if body.is_empty() {
            return Err(());
        }
        let (whole_digits, frac_digits) = match body.split_once('.') {
            Some((w, f)) => (w, f),
            None => (body, ""),
        };
        if whole_digits.is_empty() && frac_digits.is_empty() {
            return Err(());
        }
        let digits_ok =
            |d: &str| !d.is_empty() && d.bytes().all(|b| b.is_ascii_digit());
        if !whole_digits.is_empty() && !digits_ok(whole_digits) {
            return Err(());
        }
        if !frac_digits.is_empty() && !digits_ok(frac_digits) {
            return Err(());
        }

        let whole: i64 = if whole_digits.is_empty() {
            0
        } else {
            whole_digits.parse().map_err(|_| ())?
        };

        // frac / 10^k scaled to 16 fractional bits, rounded to nearest.
        let mut numerator: u128 = 0;
        let mut denominator: u128 = 1;
        for byte in frac_digits.bytes().take(FRAC_DIGITS + 2) {
            numerator = numerator * 10 + u128::from(byte - b'0');
            denominator *= 10;
        }
        let frac =
            ((numerator << FRAC_BITS) + denominator / 2) / denominator;

        let magnitude = whole
            .checked_mul(FRAC_ONE)
            .and_then(|w| w.checked_add(frac as i64))
            .ok_or(())?;
        let raw = if negative { -magnitude } else { magnitude };
        i32::try_from(raw).map(Self).map_err(|_| ())
    }
}

impl Serial for Fixed {
    fn serial(&mut self, codec: &mut dyn Codec) -> Result<()> {
        if !codec.has_naming() {
            return codec.i32(&mut self.0);
        }
        if codec.is_reading() {
            let mut token = String::new();
            codec.string(&mut token, StrStyle::Token)?;
            *self = token
                .parse()
                .map_err(|()| WireError::corrupt(codec.position(), "expected a decimal number"))?;
            Ok(())
        } else {
            codec.string(&mut self.to_string(), StrStyle::Token)
        }
    }
}

// ==========================================
// TESTS
// ==========================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::serial::{bin_decode, bin_encode, ini_decode, ini_encode};

    #[test]
    fn display_is_exact_decimal() {
        assert_eq!(Fixed::from_raw(0).to_string(), "0");
        assert_eq!(Fixed::from_int(5).to_string(), "5");
        assert_eq!(Fixed::from_f32(-3.25).to_string(), "-3.25");
        assert_eq!(Fixed::from_raw(1).to_string(), "0.0000152587890625");
    }

    #[test]
    fn parse_inverts_display() {
        for raw in [0, 1, -1, 65536, -65536, 0x0001_8000, i32::MAX, i32::MIN + 1] {
            let value = Fixed::from_raw(raw);
            let back: Fixed = value.to_string().parse().unwrap();
            assert_eq!(back, value, "raw {raw}");
        }
    }

    #[test]
    fn parse_rounds_loose_input() {
        let third: Fixed = "0.333333333333333333333".parse().unwrap();
        assert!((third.to_f32() - 1.0 / 3.0).abs() < 1e-4);
        assert_eq!("2.".parse::<Fixed>().unwrap(), Fixed::from_int(2));
        assert_eq!(".5".parse::<Fixed>().unwrap(), Fixed::from_f32(0.5));
    }

    #[test]
    fn garbage_does_not_parse() {
        for input in ["", "-", ".", "1.2.3", "abc", "1e3"] {
            assert!(input.parse::<Fixed>().is_err(), "parsed {input:?}");
        }
    }

    #[test]
    fn binary_form_is_the_raw_integer() {
        let mut value = Fixed::from_f32(1.5);
        let bytes = bin_encode(&mut value).unwrap();
        assert_eq!(&bytes[..], &0x0001_8000_i32.to_le_bytes());
        let back: Fixed = bin_decode(&bytes).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn text_form_round_trips() {
        let mut value = Fixed::from_raw(-12_345_678);
        let text = ini_encode(&mut value).unwrap();
        let back: Fixed = ini_decode(&text).unwrap();
        assert_eq!(back, value);
    }
}
