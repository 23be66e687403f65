//! Deterministic hashing for desync detection
//!
//! Input payloads are hashed on every peer and the hashes compared when
//! real remote input replaces a prediction, so every function here must
//! produce the same output for the same input across runs and platforms.
//! `std::collections::hash_map::DefaultHasher` is randomly keyed and is
//! never used.
//!
//! # Example
//!
//! ```
//! use rewind_core::hash::{hash_bytes_with_seed, hash_value_with_seed};
//! use rewind_core::{Value, DEFAULT_HASH_SEED};
//!
//! let h1 = hash_bytes_with_seed(b"hello", DEFAULT_HASH_SEED);
//! let h2 = hash_bytes_with_seed(b"hello", DEFAULT_HASH_SEED);
//! assert_eq!(h1, h2);
//!
//! let v = Value::Float(0.5);
//! assert_eq!(
//!     hash_value_with_seed(&v, DEFAULT_HASH_SEED),
//!     hash_value_with_seed(&Value::Float(0.5), DEFAULT_HASH_SEED)
//! );
//! ```

use crate::input::{InputMap, InputPayload};
use crate::value::{Value, ValueMap};

/// Seed used for all input hashes exchanged between peers
pub const DEFAULT_HASH_SEED: u64 = 0x7265_7769_6e64_0001;

// Type discriminators for Value hashing.
const TYPE_NULL: u64 = 0;
const TYPE_BOOL: u64 = 1;
const TYPE_INT: u64 = 2;
const TYPE_FLOAT: u64 = 3;
const TYPE_STRING: u64 = 4;

/// Mix a seed with two words (splitmix64 finalizer)
pub fn hash_seed(seed: u64, a: u64, b: u64) -> u64 {
    let mut z = seed
        ^ a.wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ b.rotate_left(32).wrapping_mul(0xC2B2_AE3D_27D4_EB4F);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Hash a u64 value with a seed
pub fn hash_u64_with_seed(value: u64, seed: u64) -> u64 {
    hash_seed(seed, value, 0)
}

/// Hash a byte slice with a seed
///
/// FNV-1a over the bytes, periodically re-mixed through [`hash_seed`].
pub fn hash_bytes_with_seed(bytes: &[u8], seed: u64) -> u64 {
    const FNV_PRIME: u64 = 0x100000001b3;

    let mut h = seed;
    for (i, &b) in bytes.iter().enumerate() {
        h ^= b as u64;
        h = h.wrapping_mul(FNV_PRIME);
        if i % 8 == 7 {
            h = hash_seed(seed, h, i as u64);
        }
    }
    hash_seed(seed, h, bytes.len() as u64)
}

/// Hash a [`Value`] with a seed
///
/// Each variant is tagged with a discriminator, so `Int(0)` and
/// `Bool(false)` hash differently.
pub fn hash_value_with_seed(value: &Value, seed: u64) -> u64 {
    match value {
        Value::Null => hash_seed(seed, TYPE_NULL, 0),
        Value::Bool(b) => {
            let h = hash_seed(seed, TYPE_BOOL, 0);
            hash_seed(h, u64::from(*b), 1)
        }
        Value::Int(i) => {
            let h = hash_seed(seed, TYPE_INT, 0);
            hash_seed(h, *i as u64, 1)
        }
        Value::Float(f) => {
            let h = hash_seed(seed, TYPE_FLOAT, 0);
            hash_seed(h, f.to_bits(), 1)
        }
        Value::String(s) => {
            let h = hash_seed(seed, TYPE_STRING, 0);
            let string_hash = hash_bytes_with_seed(s.as_bytes(), h);
            hash_seed(h, string_hash, 1)
        }
    }
}

/// Hash the non-reserved slots of one object's input
///
/// Returns `None` when the object has no non-reserved slots, so that an
/// object carrying only metadata hashes the same as an absent one.
pub fn hash_input_map(input: &InputMap, seed: u64) -> Option<u64> {
    let mut h = seed;
    let mut count = 0u64;
    for (slot, value) in input.iter().filter(|(slot, _)| !slot.is_reserved()) {
        count += 1;
        h = hash_seed(h, slot.0 as u64, count * 2);
        h = hash_seed(h, hash_value_with_seed(value, h), count * 2 + 1);
    }
    (count > 0).then_some(h)
}

/// Hash everything in a payload except its stored hash and reserved slots
///
/// Object paths are visited in sorted order (the payload is a `BTreeMap`).
pub fn hash_input_payload(payload: &InputPayload, seed: u64) -> u64 {
    let mut h = hash_seed(seed, payload.version() as u64, 0);
    let mut index = 0u64;
    for (path, input) in payload.iter() {
        if let Some(input_hash) = hash_input_map(input, h) {
            index += 1;
            let path_hash = hash_bytes_with_seed(path.as_str().as_bytes(), h);
            h = hash_seed(h, path_hash, index * 2);
            h = hash_seed(h, input_hash, index * 2 + 1);
        }
    }
    h
}

/// Hash a saved object state, independent of key insertion order
pub fn hash_state(state: &ValueMap, seed: u64) -> u64 {
    let mut h = seed;
    let mut keys: Vec<_> = state.keys().collect();
    keys.sort();
    for (i, key) in keys.into_iter().enumerate() {
        let key_hash = hash_bytes_with_seed(key.as_bytes(), h);
        let val_hash = state
            .get(key)
            .map(|v| hash_value_with_seed(v, h))
            .unwrap_or_default();
        h = hash_seed(h, key_hash, i as u64 * 2 + 1);
        h = hash_seed(h, val_hash, i as u64 * 2 + 2);
    }
    h
}
