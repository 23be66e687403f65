//! Error types for rewind-rollback-buffer

use rewind_core::Tick;
use thiserror::Error;

/// Buffer error type
#[derive(Debug, Error)]
pub enum Error {
    /// Requested tick has already been retired from the window
    #[error("Tick {tick} is below the retained window starting at {start}")]
    BelowWindow { tick: Tick, start: Tick },

    /// A pushed frame does not continue the window
    #[error("Frame for tick {found} does not continue the window (expected {expected})")]
    NonContiguous { expected: Tick, found: Tick },
}

/// Result type for buffer operations
pub type Result<T> = std::result::Result<T, Error>;
