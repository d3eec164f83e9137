//! Error types for the core crate.

use thiserror::Error;

/// Errors raised while decoding persisted codes into core types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("unknown decision byte: {0}")]
    UnknownDecision(u8),

    #[error("unknown actor kind code: {0:?}")]
    UnknownActorKind(String),

    #[error("unknown access level code: {0:?}")]
    UnknownAccessLevel(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
