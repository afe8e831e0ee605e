//! # Defaulting Backend
//!
//! A reading backend over no input at all.
//!
//! Every named scope is absent and every primitive reports
//! [`WireError::NotFound`], so a pass through [`NullCodec`] drives each
//! default adaptor to its fallback. [`apply_defaults`] is the reset button
//! for any structure whose layout is fully defaulted.

use crate::error::{Result, WireError};
use crate::serial::{Codec, Sep, Serial, StrStyle};

/// Reading backend that finds nothing.
#[derive(Debug, Default)]
pub struct NullCodec;

impl NullCodec {
    pub fn new() -> Self {
        Self
    }

    fn absent<T>(&self) -> Result<T> {
        Err(WireError::not_found(self.position()))
    }
}

impl Codec for NullCodec {
    fn is_reading(&self) -> bool {
        true
    }

    fn has_naming(&self) -> bool {
        true
    }

    fn name(&mut self, _key: &str) -> bool {
        false
    }

    fn separator(&mut self, _sep: Sep) -> bool {
        false
    }

    fn bool(&mut self, _value: &mut bool) -> Result<()> {
        self.absent()
    }

    fn u8(&mut self, _value: &mut u8) -> Result<()> {
        self.absent()
    }

    fn i8(&mut self, _value: &mut i8) -> Result<()> {
        self.absent()
    }

    fn u16(&mut self, _value: &mut u16) -> Result<()> {
        self.absent()
    }

    fn i16(&mut self, _value: &mut i16) -> Result<()> {
        self.absent()
    }

    fn u32(&mut self, _value: &mut u32) -> Result<()> {
        self.absent()
    }

    fn i32(&mut self, _value: &mut i32) -> Result<()> {
        self.absent()
    }

    fn u64(&mut self, _value: &mut u64) -> Result<()> {
        self.absent()
    }

    fn i64(&mut self, _value: &mut i64) -> Result<()> {
        self.absent()
    }

    fn character(&mut self, _value: &mut char) -> Result<()> {
        self.absent()
    }

    fn raw(&mut self, _value: &mut [u8]) -> Result<()> {
        self.absent()
    }

    fn string(&mut self, _value: &mut String, _style: StrStyle) -> Result<()> {
        self.absent()
    }

    fn position(&self) -> String {
        "defaulting pass".to_owned()
    }
}

/// Reset `value` to its declared defaults.
///
/// # Errors
/// [`WireError::NotFound`] if the layout contains a value with no default
/// adaptor around it; such a value cannot be reset.
pub fn apply_defaults<T: Serial + ?Sized>(value: &mut T) -> Result<()> {
    let mut codec = NullCodec::new();
    codec.begin()?;
    value.serial(&mut codec)?;
    codec.end()?;
    Ok(())
}

// ==========================================
// TESTS
// ==========================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::serial::adapt;

    #[derive(Debug, PartialEq)]
    struct Settings {
        volume: u32,
        muted: bool,
        theme: String,
    }

    impl Default for Settings {
        fn default() -> Self {
            Self {
                volume: 80,
                muted: false,
                theme: "dark".to_owned(),
            }
        }
    }

    impl Serial for Settings {
        fn serial(&mut self, codec: &mut dyn Codec) -> Result<()> {
            adapt::named_default(codec, "Volume", &mut self.volume, 80)?;
            adapt::named_default(codec, "Muted", &mut self.muted, false)?;
            adapt::named_default(codec, "Theme", &mut self.theme, "dark".to_owned())
        }
    }

    #[test]
    fn resets_to_declared_defaults() {
        let mut settings = Settings {
            volume: 3,
            muted: true,
            theme: "light".to_owned(),
        };
        apply_defaults(&mut settings).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn undefaulted_value_is_reported() {
        struct Bare(u32);
        impl Serial for Bare {
            fn serial(&mut self, codec: &mut dyn Codec) -> Result<()> {
                codec.u32(&mut self.0)
            }
        }
        let err = apply_defaults(&mut Bare(1)).unwrap_err();
        assert!(err.is_not_found(), "got {err:?}");
    }
}
