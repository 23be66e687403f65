//! Wire messages exchanged between peers
//!
//! All messages are JSON. Input payloads inside an input message are
//! bincode-encoded and hex-armoured so the outer message stays plain text:
//!
//! ```text
//! {"1": "42", "2": {"40": "0100…", "41": "0100…"}}
//!   │            └─ tick → hex(bincode(InputPayload))
//!   └─ next tick the sender still needs from the receiver
//! ```

use crate::error::{Error, Result};
use crate::send_queue::InputBatch;
use rewind_core::{InputPayload, Tick};
use rewind_rollback_buffer::StateMap;
use serde::{Deserialize, Serialize};

/// A batch of input ticks plus the sender's acknowledgement cursor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputMessage {
    /// Oldest tick of the receiver's input the sender has not seen yet
    #[serde(rename = "1", with = "decimal_tick")]
    pub next_tick_requested: Tick,
    /// Encoded payloads by tick
    #[serde(rename = "2")]
    pub input: InputBatch,
}

impl InputMessage {
    /// Create a message
    pub fn new(next_tick_requested: Tick, input: InputBatch) -> Self {
        Self {
            next_tick_requested,
            input,
        }
    }

    /// Serialize to JSON bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parse from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let msg: InputMessage = serde_json::from_slice(bytes)?;
        if msg.input.is_empty() {
            return Err(Error::Malformed("input message without ticks".into()));
        }
        Ok(msg)
    }

    /// Oldest carried tick
    pub fn first_tick(&self) -> Option<Tick> {
        self.input.keys().next().copied()
    }

    /// Decode every carried payload in tick order
    pub fn decode(&self) -> Result<Vec<(Tick, InputPayload)>> {
        self.input
            .iter()
            .map(|(tick, blob)| Ok((*tick, decode_payload(blob)?)))
            .collect()
    }
}

/// Encode a payload into the hex blob carried by input messages
pub fn encode_payload(payload: &InputPayload) -> Result<String> {
    Ok(hex::encode(bincode::serialize(payload)?))
}

/// Decode a hex blob, rejecting unknown schema versions
pub fn decode_payload(blob: &str) -> Result<InputPayload> {
    let bytes = hex::decode(blob)?;
    let payload: InputPayload = bincode::deserialize(&bytes)?;
    payload.check_version()?;
    Ok(payload)
}

/// Ping, or the ping-back answering it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingMessage {
    /// Sender's clock when the ping left
    pub local_time: u64,
    /// Answering peer's clock, set on ping-back
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_time: Option<u64>,
}

impl PingMessage {
    /// Create a ping stamped with `local_time`
    pub fn ping(local_time: u64) -> Self {
        Self {
            local_time,
            remote_time: None,
        }
    }

    /// Answer this ping at `remote_time`
    pub fn answer(self, remote_time: u64) -> Self {
        Self {
            local_time: self.local_time,
            remote_time: Some(remote_time),
        }
    }

    /// Serialize to JSON bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parse from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// A peer's saved state for one tick, forwarded to the host for auditing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateMessage {
    /// Tick the state was saved after
    pub tick: Tick,
    /// Saved state per object
    pub state: StateMap,
}

impl StateMessage {
    /// Serialize to JSON bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parse from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

mod decimal_tick {
    use rewind_core::Tick;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(tick: &Tick, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(tick)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Tick, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(de::Error::custom)
    }
}
