//! Round-trip tests across both serialization backends
//!
//! Every supported value shape must decode back to exactly what was
//! encoded, on the binary and the text backend alike, and the binary
//! decoder must degrade safely on truncated or random input.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use proptest::prelude::*;
use wirepack::error::{Result, WireError};
use wirepack::net::addr::EndpointAddr;
use wirepack::serial::{
    adapt, apply_defaults, bin_decode, bin_encode, ini_decode, ini_encode, Codec, Fixed, Sep,
    Serial,
};

// ============================================================================
// A VALUE EXERCISING EVERY SHAPE
// ============================================================================

const KIND_TABLE: &[(i32, &str)] = &[(0, "Neutral"), (1, "Hostile"), (2, "Friendly")];
const TRAIT_TABLE: &[(u32, &str)] = &[(0x1, "Armed"), (0x2, "Armored"), (0x4, "Flying")];

#[derive(Debug, Default, Clone, PartialEq)]
struct Creature {
    name: String,
    kind: i32,
    traits: u32,
    health: u32,
    x: Fixed,
    y: Fixed,
    inventory: Vec<u32>,
    home: Option<Box<EndpointAddr>>,
}

impl Serial for Creature {
    fn serial(&mut self, codec: &mut dyn Codec) -> Result<()> {
        adapt::named_default(codec, "Name", &mut self.name, String::new())?;
        if codec.is_reading() {
            self.kind = 0;
            self.traits = 0;
        }
        let omit = self.kind == 0;
        adapt::named_opt(codec, "Kind", omit, |c| {
            adapt::enum_text(c, &mut self.kind, KIND_TABLE)
        })?;
        let omit = self.traits == 0;
        adapt::named_opt(codec, "Traits", omit, |c| {
            adapt::bitfield_text(c, &mut self.traits, TRAIT_TABLE)
        })?;
        adapt::named_default(codec, "Health", &mut self.health, 0)?;
        adapt::named_default(codec, "X", &mut self.x, Fixed::ZERO)?;
        adapt::named_default(codec, "Y", &mut self.y, Fixed::ZERO)?;
        if codec.is_reading() {
            self.inventory.clear();
        }
        let omit = self.inventory.is_empty();
        adapt::named_opt(codec, "Inventory", omit, |c| {
            adapt::list(c, Sep::Comma, &mut self.inventory)
        })?;
        adapt::owned(codec, "Home", &mut self.home, true)
    }
}

fn specimen() -> Creature {
    Creature {
        name: "Wipf".to_owned(),
        kind: 2,
        traits: 0x1 | 0x4,
        health: 250,
        x: Fixed::from_f32(13.5),
        y: Fixed::from_f32(-2.25),
        inventory: vec![7, 7, 19],
        home: Some(Box::new("[2001:db8::5]:11113".parse().unwrap())),
    }
}

fn variants() -> Vec<Creature> {
    vec![
        Creature::default(),
        specimen(),
        Creature {
            home: None,
            kind: 9, // no table entry, falls back to the raw integer
            traits: 0x80,
            ..specimen()
        },
        Creature {
            inventory: Vec::new(),
            name: "esc \"quotes\"\nand\tcontrol \x02 bytes".to_owned(),
            ..specimen()
        },
    ]
}

// ============================================================================
// ROUND TRIPS
// ============================================================================

#[test]
fn binary_round_trip_for_every_shape() {
    for mut value in variants() {
        let bytes = bin_encode(&mut value).unwrap();
        let back: Creature = bin_decode(&bytes).unwrap();
        assert_eq!(back, value);
    }
}

#[test]
fn text_round_trip_for_every_shape() {
    for mut value in variants() {
        let text = ini_encode(&mut value).unwrap();
        let back: Creature = ini_decode(&text).unwrap();
        assert_eq!(back, value, "document:\n{text}");
    }
}

#[test]
fn binary_encoding_is_deterministic() {
    let mut value = specimen();
    let first = bin_encode(&mut value).unwrap();
    let second = bin_encode(&mut value).unwrap();
    assert_eq!(first, second);
}

// ============================================================================
// DEFAULTING
// ============================================================================

#[test]
fn defaulted_value_is_omitted_from_text_entirely() {
    let text = ini_encode(&mut Creature::default()).unwrap();
    assert_eq!(text, "");
    let back: Creature = ini_decode(&text).unwrap();
    assert_eq!(back, Creature::default());
}

#[test]
fn defaulting_is_idempotent() {
    // A value equal to its declared default survives encode/decode even
    // though nothing about it reaches the document.
    let mut value = Creature {
        health: 0,
        ..specimen()
    };
    let text = ini_encode(&mut value).unwrap();
    assert!(!text.contains("Health"), "{text}");
    let back: Creature = ini_decode(&text).unwrap();
    assert_eq!(back.health, 0);

    let bytes = bin_encode(&mut value).unwrap();
    let back: Creature = bin_decode(&bytes).unwrap();
    assert_eq!(back, value);
}

#[test]
fn apply_defaults_resets_a_dirty_value() {
    let mut value = specimen();
    apply_defaults(&mut value).unwrap();
    assert_eq!(value, Creature::default());
}

// ============================================================================
// TRUNCATION SAFETY
// ============================================================================

#[test]
fn truncation_at_every_offset_is_eof_or_corrupt() {
    let bytes = bin_encode(&mut specimen()).unwrap();
    for cut in 0..bytes.len() {
        match bin_decode::<Creature>(&bytes[..cut]) {
            Err(WireError::Eof { .. } | WireError::Corrupt { .. }) => {}
            Err(other) => panic!("cut at {cut}: unexpected error {other:?}"),
            Ok(_) => panic!("cut at {cut}: decode succeeded on truncated input"),
        }
    }
}

proptest! {
    // Random bytes never panic the decoder; they decode or they fail
    // with a positioned error.
    #[test]
    fn prop_random_bytes_never_panic(data in prop::collection::vec(any::<u8>(), 0..512)) {
        let _ = bin_decode::<Creature>(&data);
    }

    #[test]
    fn prop_integer_round_trip(value in any::<i64>()) {
        let mut v = value;
        let bytes = bin_encode(&mut v).unwrap();
        prop_assert_eq!(bin_decode::<i64>(&bytes).unwrap(), value);
        let text = ini_encode(&mut v).unwrap();
        prop_assert_eq!(ini_decode::<i64>(&text).unwrap(), value);
    }

    #[test]
    fn prop_string_round_trip(value in "\\PC*") {
        let mut v = value.clone();
        prop_assume!(!v.as_bytes().contains(&0));
        let bytes = bin_encode(&mut v).unwrap();
        prop_assert_eq!(bin_decode::<String>(&bytes).unwrap(), value.clone());
        let text = ini_encode(&mut v).unwrap();
        prop_assert_eq!(ini_decode::<String>(&text).unwrap(), value);
    }

    #[test]
    fn prop_fixed_round_trip(raw in any::<i32>()) {
        prop_assume!(raw != i32::MIN);
        let mut value = Fixed::from_raw(raw);
        let bytes = bin_encode(&mut value).unwrap();
        prop_assert_eq!(bin_decode::<Fixed>(&bytes).unwrap(), value);
        let text = ini_encode(&mut value).unwrap();
        prop_assert_eq!(ini_decode::<Fixed>(&text).unwrap(), value);
    }
}
