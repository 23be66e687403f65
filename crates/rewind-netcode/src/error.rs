//! Error types for rewind-netcode

use rewind_core::{PeerId, Tick};
use thiserror::Error;

/// Netcode error type
#[derive(Debug, Error)]
pub enum Error {
    /// Not enough saved state to roll back the requested number of ticks
    #[error("Can't rollback {requested} ticks on tick {tick}, available state: {available}")]
    RollbackTooFar {
        requested: usize,
        tick: Tick,
        available: usize,
    },

    /// An input frame below the retained window was requested
    #[error("Requested input frame {tick} not found in buffer (window starts at {start})")]
    InputFrameUnavailable { tick: Tick, start: Tick },

    /// Lost synchronization for too many consecutive steps
    #[error("Unable to regain synchronization after {underruns} steps")]
    SyncUnrecoverable { underruns: u32 },

    /// Message from a peer that is not part of the session
    #[error("Unknown peer {0}")]
    UnknownPeer(PeerId),

    /// Peer already registered
    #[error("Peer {0} already exists")]
    DuplicatePeer(PeerId),

    /// Tried to register the local peer as a remote one
    #[error("Cannot add the local peer {0} as a remote peer")]
    SelfPeer(PeerId),

    /// Object already registered under this path
    #[error("Object already registered at {0}")]
    DuplicateObject(String),

    /// Malformed or unsupported wire message
    #[error("Malformed message: {0}")]
    Malformed(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Core error
    #[error("core error: {0}")]
    Core(#[from] rewind_core::Error),

    /// Buffer error
    #[error("buffer error: {0}")]
    Buffer(#[from] rewind_rollback_buffer::Error),
}

impl Error {
    /// Whether this error ends the session
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::RollbackTooFar { .. }
                | Error::InputFrameUnavailable { .. }
                | Error::SyncUnrecoverable { .. }
                | Error::Buffer(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Malformed(err.to_string())
    }
}

impl From<hex::FromHexError> for Error {
    fn from(err: hex::FromHexError) -> Self {
        Error::Malformed(err.to_string())
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<ron::error::SpannedError> for Error {
    fn from(err: ron::error::SpannedError) -> Self {
        Error::Config(err.to_string())
    }
}

/// Result type for netcode operations
pub type Result<T> = std::result::Result<T, Error>;
