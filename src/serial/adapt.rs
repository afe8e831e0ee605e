//! # Value Adaptors
//!
//! Combinators that put structure around plain [`Serial`] values: names,
//! defaults, containers, symbolic enums and owned pointers.
//!
//! Adaptors never touch a representation themselves; every effect goes
//! through the [`Codec`] they are handed. That keeps them valid for every
//! backend at once, which is the whole point: a type composes its layout out
//! of adaptors exactly once and gets binary writing, binary reading, text
//! writing, text reading and defaulting for free.
//!
//! ## Composition Rules
//! - [`named`] and [`named_default`] balance their scope on every path,
//!   passing `abort = true` to [`Codec::name_end`] when the inner call
//!   failed so readers suppress their leftover-key warnings
//! - [`default`]-style adaptors are what make a value *optional*: they turn
//!   [`WireError::NotFound`] into the declared fallback on read and omit
//!   the value on naming writers when it equals the fallback
//! - Containers encode an explicit count on binary backends and punctuation
//!   on text backends, so element types never need to know the difference

use crate::error::{
    constants::{ERR_LIST_TOO_LONG, ERR_OVERLONG_VARINT},
    Result, WireError,
};
use crate::serial::{Codec, Sep, Serial, StrStyle, MAX_ELEMENTS};

/// Make `value` optional with `fallback` as its resting state.
///
/// Read: an absent value ([`WireError::NotFound`]) becomes `fallback`
/// instead of an error. Write: naming backends omit the value entirely when
/// it equals `fallback`; binary backends always write it, since a positional
/// format has no way to express absence.
pub fn default<T>(codec: &mut dyn Codec, value: &mut T, fallback: T) -> Result<()>
where
    T: Serial + PartialEq,
{
    if codec.is_reading() {
        match value.serial(codec) {
            Err(err) if err.is_not_found() => {
                *value = fallback;
                Ok(())
            }
            other => other,
        }
    } else {
        if codec.has_naming() && *value == fallback {
            return Ok(());
        }
        value.serial(codec)
    }
}

/// Run `f` inside the named scope `key`.
///
/// The scope is closed on every path; an error inside `f` closes it with
/// `abort = true` before propagating. A naming reader that cannot find
/// `key` reports [`WireError::NotFound`] without entering the scope, which
/// the `*_default` variants below recover from.
pub fn named<F>(codec: &mut dyn Codec, key: &str, f: F) -> Result<()>
where
    F: FnOnce(&mut dyn Codec) -> Result<()>,
{
    if !codec.name(key) {
        return Err(WireError::not_found(format!(
            "'{key}' at {}",
            codec.position()
        )));
    }
    let result = f(codec);
    codec.name_end(result.is_err());
    result
}

/// [`named`] with default-style omission around an arbitrary body.
///
/// `omit` skips the scope entirely on naming writers. An absent key on a
/// naming reader leaves the value untouched, so callers reset it to the
/// declared default before calling. Binary backends always run `f`.
pub fn named_opt<F>(codec: &mut dyn Codec, key: &str, omit: bool, f: F) -> Result<()>
where
    F: FnOnce(&mut dyn Codec) -> Result<()>,
{
    if !codec.is_reading() && codec.has_naming() && omit {
        return Ok(());
    }
    if !codec.name(key) {
        // Only naming readers can get here; the key is simply not present.
        return Ok(());
    }
    let result = f(codec);
    codec.name_end(result.is_err());
    result
}

/// The everyday field adaptor: [`named`] composed with [`default`].
///
/// Reads an absent key or empty value as `fallback`; omits the key on
/// naming writers when `value == fallback`.
pub fn named_default<T>(codec: &mut dyn Codec, key: &str, value: &mut T, fallback: T) -> Result<()>
where
    T: Serial + PartialEq,
{
    if codec.is_reading() {
        if !codec.name(key) {
            *value = fallback;
            return Ok(());
        }
        let result = default(codec, value, fallback);
        codec.name_end(result.is_err());
        result
    } else {
        if codec.has_naming() && *value == fallback {
            return Ok(());
        }
        named(codec, key, |c| value.serial(c))
    }
}

/// Process a growable container of values.
///
/// Binary: a `u32` element count followed by the elements in order; counts
/// above [`MAX_ELEMENTS`] are rejected as corrupt before any allocation.
/// Text: elements separated by `sep`, count implicit; reading stops at the
/// first missing separator, an empty value yields an empty container, and
/// a trailing separator is a warning, not an error.
pub fn list<T>(codec: &mut dyn Codec, sep: Sep, items: &mut Vec<T>) -> Result<()>
where
    T: Serial + Default,
{
    if !codec.has_naming() {
        let mut count = items.len() as u32;
        codec.u32(&mut count)?;
        if codec.is_reading() {
            if count > MAX_ELEMENTS {
                return Err(WireError::corrupt(codec.position(), ERR_LIST_TOO_LONG));
            }
            items.clear();
            for _ in 0..count {
                let mut item = T::default();
                item.serial(codec)?;
                items.push(item);
            }
        } else {
            for item in items.iter_mut() {
                item.serial(codec)?;
            }
        }
        return Ok(());
    }

    if codec.is_reading() {
        items.clear();
        loop {
            if !items.is_empty() && !codec.separator(sep) {
                break;
            }
            let mut item = T::default();
            match item.serial(codec) {
                Ok(()) => items.push(item),
                Err(err) if err.is_not_found() => {
                    // Nothing after a consumed separator: a hand-edited
                    // trailing separator, not a broken document.
                    if !items.is_empty() {
                        codec.warn("trailing separator ignored");
                    }
                    break;
                }
                Err(err) => return Err(err),
            }
        }
    } else {
        for (index, item) in items.iter_mut().enumerate() {
            if index > 0 {
                codec.separator(sep);
            }
            item.serial(codec)?;
        }
    }
    Ok(())
}

/// Process a fixed-size run of values.
///
/// The length comes from the slice and is never encoded; text backends put
/// `sep` between the elements.
pub fn list_fixed<T>(codec: &mut dyn Codec, sep: Sep, items: &mut [T]) -> Result<()>
where
    T: Serial,
{
    for (index, item) in items.iter_mut().enumerate() {
        if index > 0 && codec.has_naming() {
            codec.separator(sep);
        }
        item.serial(codec)?;
    }
    Ok(())
}

/// Process an integer with a symbolic spelling in text form.
///
/// Naming writers emit the name from `table` when the value has one, the
/// raw integer otherwise. Naming readers accept either; an unknown name is
/// a warning and the current value stays. Binary backends always use the
/// raw integer.
pub fn enum_text(codec: &mut dyn Codec, value: &mut i32, table: &[(i32, &str)]) -> Result<()> {
    if !codec.has_naming() {
        return codec.i32(value);
    }
    if codec.is_reading() {
        match codec.i32(value) {
            Ok(()) => return Ok(()),
            Err(err) if err.is_not_found() => return Err(err),
            // Not an integer; fall through to the symbolic form.
            Err(_) => {}
        }
        let mut token = String::new();
        codec.string(&mut token, StrStyle::Token)?;
        match table.iter().find(|(_, name)| *name == token) {
            Some(&(id, _)) => *value = id,
            None => codec.warn(&format!("unknown name '{token}', keeping current value")),
        }
        Ok(())
    } else {
        match table.iter().find(|&&(id, _)| id == *value) {
            Some(&(_, name)) => codec.string(&mut name.to_owned(), StrStyle::Token),
            None => codec.i32(value),
        }
    }
}

/// Process a bit set with symbolic flag names in text form.
///
/// Naming writers decompose the value into `|`-joined names from `table`,
/// with any unmatched bits trailing as a raw integer. Naming readers accept
/// names and integers in any mix; an unknown name is a warning. Binary
/// backends always use the raw integer.
pub fn bitfield_text(codec: &mut dyn Codec, value: &mut u32, table: &[(u32, &str)]) -> Result<()> {
    if !codec.has_naming() {
        return codec.u32(value);
    }
    if codec.is_reading() {
        let mut bits = 0u32;
        let mut first = true;
        loop {
            if !first && !codec.separator(Sep::Pipe) {
                break;
            }
            // Try a raw integer part first, then a symbolic name.
            let mut part = 0u32;
            match codec.u32(&mut part) {
                Ok(()) => bits |= part,
                Err(err) if err.is_not_found() => {
                    if first {
                        return Err(err);
                    }
                    break;
                }
                Err(_) => {
                    let mut token = String::new();
                    codec.string(&mut token, StrStyle::Token)?;
                    match table.iter().find(|(_, name)| *name == token) {
                        Some(&(flag, _)) => bits |= flag,
                        None => codec.warn(&format!("unknown flag '{token}' ignored")),
                    }
                }
            }
            first = false;
        }
        *value = bits;
        Ok(())
    } else {
        let mut remainder = *value;
        let mut first = true;
        for &(flag, name) in table {
            if flag != 0 && remainder & flag == flag {
                if !first {
                    codec.separator(Sep::Pipe);
                }
                codec.string(&mut name.to_owned(), StrStyle::Token)?;
                remainder &= !flag;
                first = false;
            }
        }
        if remainder != 0 || first {
            if !first {
                codec.separator(Sep::Pipe);
            }
            codec.u32(&mut remainder)?;
        }
        Ok(())
    }
}

/// Process an owned, optionally null, boxed value under the key `key`.
///
/// Read: any currently owned value is dropped first; then, unless null is
/// permitted and indicated, a fresh default instance is built and filled in
/// place. Write: a `None` slot is an error unless `allow_null` is set.
/// Null is an omitted scope on naming backends and a leading presence flag
/// on binary ones.
pub fn owned<T>(
    codec: &mut dyn Codec,
    key: &str,
    slot: &mut Option<Box<T>>,
    allow_null: bool,
) -> Result<()>
where
    T: Serial + Default,
{
    if codec.has_naming() {
        if codec.is_reading() {
            *slot = None;
            if codec.name(key) {
                let mut value = Box::<T>::default();
                let result = value.serial(codec);
                codec.name_end(result.is_err());
                result?;
                *slot = Some(value);
            } else if !allow_null {
                return Err(WireError::not_found(format!(
                    "'{key}' at {}",
                    codec.position()
                )));
            }
        } else {
            match slot {
                Some(value) => named(codec, key, |c| value.serial(c))?,
                None if allow_null => {}
                None => {
                    return Err(WireError::corrupt(
                        codec.position(),
                        format!("'{key}' must not be null"),
                    ))
                }
            }
        }
        return Ok(());
    }

    let mut present = slot.is_some();
    if allow_null {
        codec.bool(&mut present)?;
    } else if !present && !codec.is_reading() {
        return Err(WireError::corrupt(
            codec.position(),
            format!("'{key}' must not be null"),
        ));
    }
    if codec.is_reading() {
        *slot = None;
        if present || !allow_null {
            let mut value = Box::<T>::default();
            value.serial(codec)?;
            *slot = Some(value);
        }
    } else if let Some(value) = slot {
        value.serial(codec)?;
    }
    Ok(())
}

/// Process an integer in a variable-width binary form.
///
/// Binary backends use LEB128, seven value bits per byte, at most five
/// bytes. Text backends use the plain decimal integer.
pub fn packed(codec: &mut dyn Codec, value: &mut u32) -> Result<()> {
    if codec.has_naming() {
        return codec.u32(value);
    }
    if codec.is_reading() {
        let mut out = 0u32;
        for shift in (0..).step_by(7) {
            if shift >= 35 {
                return Err(WireError::corrupt(codec.position(), ERR_OVERLONG_VARINT));
            }
            let mut byte = 0u8;
            codec.u8(&mut byte)?;
            out |= u32::from(byte & 0x7F) << shift;
            if byte & 0x80 == 0 {
                break;
            }
        }
        *value = out;
    } else {
        let mut rest = *value;
        loop {
            let mut byte = (rest & 0x7F) as u8;
            rest >>= 7;
            if rest != 0 {
                byte |= 0x80;
            }
            codec.u8(&mut byte)?;
            if rest == 0 {
                break;
            }
        }
    }
    Ok(())
}

// ==========================================
// TESTS
// ==========================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::serial::{bin_decode, bin_encode, ini_decode, ini_encode};

    #[derive(Debug, Default, PartialEq)]
    struct Flags(u32);

    impl Serial for Flags {
        fn serial(&mut self, codec: &mut dyn Codec) -> Result<()> {
            bitfield_text(codec, &mut self.0, &[(0x1, "Melee"), (0x2, "Ranged"), (0x4, "Fly")])
        }
    }

    #[test]
    fn default_substitutes_on_missing_key() {
        #[derive(Debug, Default, PartialEq)]
        struct Counter {
            count: u32,
        }
        impl Serial for Counter {
            fn serial(&mut self, codec: &mut dyn Codec) -> Result<()> {
                named_default(codec, "Count", &mut self.count, 11)
            }
        }
        let counter: Counter = ini_decode("").unwrap();
        assert_eq!(counter.count, 11);
    }

    #[test]
    fn default_omits_matching_value_in_text() {
        let mut value = 11u32;
        let mut writer = crate::serial::IniWriter::new();
        named_default(&mut writer, "Count", &mut value, 11).unwrap();
        assert_eq!(writer.finish(), "");
    }

    #[test]
    fn default_still_written_in_binary() {
        #[derive(Debug, Default, PartialEq)]
        struct Counter {
            count: u32,
        }
        impl Serial for Counter {
            fn serial(&mut self, codec: &mut dyn Codec) -> Result<()> {
                named_default(codec, "Count", &mut self.count, 11)
            }
        }
        let bytes = bin_encode(&mut Counter { count: 11 }).unwrap();
        assert_eq!(bytes.len(), 4);
    }

    #[test]
    fn list_binary_has_explicit_count() {
        let mut items = vec![5u16, 6, 7];
        let mut wrap = |codec: &mut dyn Codec| list(codec, Sep::Comma, &mut items);
        struct Adhoc<'a>(&'a mut dyn FnMut(&mut dyn Codec) -> Result<()>);
        impl Serial for Adhoc<'_> {
            fn serial(&mut self, codec: &mut dyn Codec) -> Result<()> {
                (self.0)(codec)
            }
        }
        let bytes = bin_encode(&mut Adhoc(&mut wrap)).unwrap();
        assert_eq!(bytes.len(), 4 + 3 * 2);
        assert_eq!(&bytes[..4], &[3, 0, 0, 0]);
    }

    #[test]
    fn list_text_is_separated_and_unsized() {
        #[derive(Debug, Default, PartialEq)]
        struct Bag {
            items: Vec<u32>,
        }
        impl Serial for Bag {
            fn serial(&mut self, codec: &mut dyn Codec) -> Result<()> {
                named(codec, "Items", |c| list(c, Sep::Comma, &mut self.items))
            }
        }
        let mut bag = Bag { items: vec![1, 2, 3] };
        let text = ini_encode(&mut bag).unwrap();
        assert_eq!(text, "Items=1,2,3\r\n");
        let back: Bag = ini_decode(&text).unwrap();
        assert_eq!(back, bag);
    }

    #[test]
    fn list_text_tolerates_a_trailing_separator() {
        #[derive(Debug, Default, PartialEq)]
        struct Bag {
            items: Vec<u32>,
        }
        impl Serial for Bag {
            fn serial(&mut self, codec: &mut dyn Codec) -> Result<()> {
                named(codec, "Items", |c| list(c, Sep::Comma, &mut self.items))
            }
        }
        let bag: Bag = ini_decode("Items=1,2,\r\n").unwrap();
        assert_eq!(bag.items, vec![1, 2]);
    }

    #[test]
    fn forged_binary_count_is_rejected() {
        // Count says four billion elements; the decode must fail fast.
        let bytes = [0xFF, 0xFF, 0xFF, 0xFF];
        #[derive(Debug, Default)]
        struct Bag {
            items: Vec<u8>,
        }
        impl Serial for Bag {
            fn serial(&mut self, codec: &mut dyn Codec) -> Result<()> {
                list(codec, Sep::Comma, &mut self.items)
            }
        }
        let err = bin_decode::<Bag>(&bytes).map(|b| b.items.len()).unwrap_err();
        assert!(matches!(err, WireError::Corrupt { .. }), "got {err:?}");
    }

    #[test]
    fn enum_writes_symbolic_name() {
        const TABLE: &[(i32, &str)] = &[(0, "Lobby"), (1, "Running")];
        #[derive(Debug, Default, PartialEq)]
        struct State(i32);
        impl Serial for State {
            fn serial(&mut self, codec: &mut dyn Codec) -> Result<()> {
                named(codec, "State", |c| enum_text(c, &mut self.0, TABLE))
            }
        }
        let text = ini_encode(&mut State(1)).unwrap();
        assert_eq!(text, "State=Running\r\n");
        let back: State = ini_decode(&text).unwrap();
        assert_eq!(back.0, 1);
    }

    #[test]
    fn enum_without_table_entry_uses_raw_integer() {
        const TABLE: &[(i32, &str)] = &[(0, "Lobby")];
        #[derive(Debug, Default, PartialEq)]
        struct State(i32);
        impl Serial for State {
            fn serial(&mut self, codec: &mut dyn Codec) -> Result<()> {
                named(codec, "State", |c| enum_text(c, &mut self.0, TABLE))
            }
        }
        let text = ini_encode(&mut State(9)).unwrap();
        assert_eq!(text, "State=9\r\n");
        let back: State = ini_decode(&text).unwrap();
        assert_eq!(back.0, 9);
    }

    #[test]
    fn unknown_enum_name_keeps_current_value() {
        const TABLE: &[(i32, &str)] = &[(0, "Lobby")];
        #[derive(Debug, PartialEq)]
        struct State(i32);
        impl Default for State {
            fn default() -> Self {
                Self(7)
            }
        }
        impl Serial for State {
            fn serial(&mut self, codec: &mut dyn Codec) -> Result<()> {
                named(codec, "State", |c| enum_text(c, &mut self.0, TABLE))
            }
        }
        let back: State = ini_decode("State=Futuristic\r\n").unwrap();
        assert_eq!(back.0, 7);
    }

    #[test]
    fn bitfield_text_round_trip() {
        let text = ini_encode(&mut Flags(0x3)).unwrap();
        assert_eq!(text.trim_end(), "Melee|Ranged");
        let back: Flags = ini_decode(&text).unwrap();
        assert_eq!(back, Flags(0x3));
    }

    #[test]
    fn bitfield_keeps_unmatched_bits_as_integer() {
        let text = ini_encode(&mut Flags(0x1 | 0x40)).unwrap();
        assert_eq!(text.trim_end(), "Melee|64");
        let back: Flags = ini_decode(&text).unwrap();
        assert_eq!(back, Flags(0x41));
    }

    #[test]
    fn bitfield_zero_is_plain_zero() {
        let text = ini_encode(&mut Flags(0)).unwrap();
        assert_eq!(text.trim_end(), "0");
        let back: Flags = ini_decode(&text).unwrap();
        assert_eq!(back, Flags(0));
    }

    #[derive(Debug, Default, PartialEq)]
    struct Slot {
        inner: Option<Box<u32>>,
    }

    impl Serial for Slot {
        fn serial(&mut self, codec: &mut dyn Codec) -> Result<()> {
            owned(codec, "Inner", &mut self.inner, true)
        }
    }

    #[test]
    fn nullable_pointer_round_trips_both_states() {
        for slot in [Slot { inner: None }, Slot { inner: Some(Box::new(99)) }] {
            let mut value = Slot {
                inner: slot.inner.clone(),
            };
            let bytes = bin_encode(&mut value).unwrap();
            let back: Slot = bin_decode(&bytes).unwrap();
            assert_eq!(back, value);

            let text = ini_encode(&mut value).unwrap();
            let back: Slot = ini_decode(&text).unwrap();
            assert_eq!(back, value);
        }
    }

    #[test]
    fn null_is_an_omitted_scope_in_text() {
        let text = ini_encode(&mut Slot { inner: None }).unwrap();
        assert_eq!(text, "");
    }

    #[test]
    fn non_nullable_none_fails_to_write() {
        let mut value: Option<Box<u32>> = None;
        let mut writer = crate::serial::IniWriter::new();
        let err = owned(&mut writer, "Inner", &mut value, false).unwrap_err();
        assert!(matches!(err, WireError::Corrupt { .. }), "got {err:?}");
    }

    #[test]
    fn packed_integers_shrink_small_values() {
        #[derive(Debug, Default, PartialEq)]
        struct Packed(u32);
        impl Serial for Packed {
            fn serial(&mut self, codec: &mut dyn Codec) -> Result<()> {
                packed(codec, &mut self.0)
            }
        }
        let small = bin_encode(&mut Packed(5)).unwrap();
        assert_eq!(small.len(), 1);
        let large = bin_encode(&mut Packed(u32::MAX)).unwrap();
        assert_eq!(large.len(), 5);
        for value in [0u32, 127, 128, 300, 1 << 21, u32::MAX] {
            let bytes = bin_encode(&mut Packed(value)).unwrap();
            let back: Packed = bin_decode(&bytes).unwrap();
            assert_eq!(back.0, value);
        }
    }

    #[test]
    fn overlong_varint_is_corrupt() {
        #[derive(Debug, Default)]
        struct Packed(u32);
        impl Serial for Packed {
            fn serial(&mut self, codec: &mut dyn Codec) -> Result<()> {
                packed(codec, &mut self.0)
            }
        }
        let err = bin_decode::<Packed>(&[0x80, 0x80, 0x80, 0x80, 0x80, 0x01])
            .map(|p| p.0)
            .unwrap_err();
        assert!(matches!(err, WireError::Corrupt { .. }), "got {err:?}");
    }
}
