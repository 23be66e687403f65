//! Typed per-tick input payloads
//!
//! One `InputPayload` holds everything a single peer contributed for one
//! tick: an `InputMap` per simulation object it owns, plus the payload hash
//! used for desync comparison.
//!
//! Slots with a negative tag are *reserved*: they may carry metadata through
//! the wire, but they never take part in hashing or prediction.

use crate::error::{Error, Result};
use crate::hash::{hash_input_payload, DEFAULT_HASH_SEED};
use crate::identity::ObjectPath;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Current schema version of [`InputPayload`]
pub const INPUT_SCHEMA_VERSION: u16 = 1;

/// A small integer naming one input of an object (e.g. 0 = move axis, 1 = jump)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InputSlot(pub i32);

impl InputSlot {
    /// Create a new slot
    pub fn new(slot: i32) -> Self {
        Self(slot)
    }

    /// Reserved slots carry metadata and are excluded from hashing and prediction
    pub fn is_reserved(&self) -> bool {
        self.0 < 0
    }
}

impl From<i32> for InputSlot {
    fn from(slot: i32) -> Self {
        Self(slot)
    }
}

/// Inputs of one object for one tick, ordered by slot
pub type InputMap = BTreeMap<InputSlot, Value>;

/// Hash of an input payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InputHash(pub u64);

impl fmt::Display for InputHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Everything one peer contributed for one tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputPayload {
    version: u16,
    objects: BTreeMap<ObjectPath, InputMap>,
    hash: InputHash,
}

impl InputPayload {
    /// Create an empty payload at the current schema version
    pub fn new() -> Self {
        Self {
            version: INPUT_SCHEMA_VERSION,
            objects: BTreeMap::new(),
            hash: InputHash::default(),
        }
    }

    /// Schema version this payload was written with
    pub fn version(&self) -> u16 {
        self.version
    }

    /// Reject payloads written with another schema version
    pub fn check_version(&self) -> Result<()> {
        if self.version != INPUT_SCHEMA_VERSION {
            return Err(Error::SchemaMismatch {
                expected: INPUT_SCHEMA_VERSION,
                found: self.version,
            });
        }
        Ok(())
    }

    /// Set the inputs of an object
    ///
    /// The stored hash is stale until [`seal`](Self::seal) is called again.
    pub fn insert(&mut self, path: ObjectPath, input: InputMap) {
        self.objects.insert(path, input);
    }

    /// Get the inputs of an object
    pub fn get(&self, path: &ObjectPath) -> Option<&InputMap> {
        self.objects.get(path)
    }

    /// Check whether the payload has inputs for an object
    pub fn contains(&self, path: &ObjectPath) -> bool {
        self.objects.contains_key(path)
    }

    /// Iterate over objects and their inputs in path order
    pub fn iter(&self) -> impl Iterator<Item = (&ObjectPath, &InputMap)> {
        self.objects.iter()
    }

    /// Number of objects with inputs
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Check if no object has inputs
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// The hash recorded by the last [`seal`](Self::seal)
    pub fn hash(&self) -> InputHash {
        self.hash
    }

    /// Recompute and store the payload hash
    pub fn seal(&mut self) -> InputHash {
        self.hash = InputHash(hash_input_payload(self, DEFAULT_HASH_SEED));
        self.hash
    }

    /// Consume and return the payload with its hash recomputed
    pub fn sealed(mut self) -> Self {
        self.seal();
        self
    }

    /// Inputs of an object with reserved slots removed
    pub fn public_input(&self, path: &ObjectPath) -> Option<InputMap> {
        self.objects.get(path).map(|input| {
            input
                .iter()
                .filter(|(slot, _)| !slot.is_reserved())
                .map(|(slot, value)| (*slot, value.clone()))
                .collect()
        })
    }
}

impl Default for InputPayload {
    fn default() -> Self {
        Self::new()
    }
}
