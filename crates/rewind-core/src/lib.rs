//! Rewind Core - Shared vocabulary for rollback synchronization
//!
//! This crate provides the leaf types every other rewind crate builds on:
//! - Tick numbering and timing (`Tick`, `TickRate`, wall `Clock`s)
//! - Participant and object identifiers (`PeerId`, `ObjectPath`)
//! - Dynamic value types for saved state (`Value`, `ValueMap`)
//! - Typed per-tick input payloads (`InputSlot`, `InputMap`, `InputPayload`)
//! - Deterministic hashing used for desync detection
//!
//! Nothing in here touches the network or owns simulation objects; see
//! `rewind-netcode` for the scheduler.

mod error;
pub mod hash;
mod identity;
mod input;
pub mod time;
mod value;

pub use error::{Error, Result};
pub use hash::{hash_input_payload, hash_state, DEFAULT_HASH_SEED};
pub use identity::{ObjectPath, PeerId};
pub use input::{InputHash, InputMap, InputPayload, InputSlot, INPUT_SCHEMA_VERSION};
pub use time::{Clock, ManualClock, SystemClock, Tick, TickRate};
pub use value::{Value, ValueMap};

// Re-export IndexMap so downstream crates build ValueMaps without a direct dependency
pub use indexmap::IndexMap;
