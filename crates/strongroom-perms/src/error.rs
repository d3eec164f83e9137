//! Error types for the permissions crate.

use thiserror::Error;

/// Errors that can occur while wrapping, unwrapping or sealing.
#[derive(Debug, Error)]
pub enum PermsError {
    /// Material cannot be opened with the given key or credential.
    ///
    /// Covers the wrong actor, tampered ciphertext and stale key material.
    #[error("decryption failure: {0}")]
    Decryption(String),

    /// Stored bytes cannot be decoded before any cryptographic operation.
    #[error("encoding failure: {0}")]
    Encoding(String),

    /// Encryption error.
    #[error("encryption failure: {0}")]
    Encryption(String),

    /// The operation needs the modify half of an item key pair.
    #[error("modify key required: {0}")]
    MissingModifyKey(String),
}

/// Result type for permission operations.
pub type Result<T> = std::result::Result<T, PermsError>;
