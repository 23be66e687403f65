//! Error types for rewind-core

use thiserror::Error;

/// Core error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("Input schema mismatch: expected version {expected}, got {found}")]
    SchemaMismatch { expected: u16, found: u16 },

    #[error("Type error: expected {expected}, got {got}")]
    TypeError { expected: String, got: String },

    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
