//! Error types for the vault.

use strongroom_perms::PermsError;
use strongroom_store::StoreError;
use thiserror::Error;

/// Errors that can occur during vault operations.
///
/// None of these are retried internally. Callers translate
/// [`is_not_authorized`](VaultError::is_not_authorized) kinds into "not
/// authorized" and [`is_operational`](VaultError::is_operational) kinds into a
/// hard failure needing operator attention.
#[derive(Debug, Error)]
pub enum VaultError {
    /// No binding or capability for the requested actor and item.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// An entry already exists for the item and actor.
    #[error("duplicate binding: {0}")]
    DuplicateBinding(String),

    /// The exact (item, actor, role) grant already exists.
    #[error("duplicate grant: {0}")]
    DuplicateGrant(String),

    /// Wrapped material cannot be opened with the given credential.
    #[error("decryption failure: {0}")]
    DecryptionFailure(String),

    /// Stored bytes cannot be decoded before any cryptographic operation.
    #[error("encoding failure: {0}")]
    EncodingFailure(String),

    /// A stored invariant is violated: missing parent, cycle, mixed rotation.
    #[error("integrity failure: {0}")]
    IntegrityFailure(String),

    /// Opaque failure from the persistence collaborator.
    #[error("storage failure: {0}")]
    StorageFailure(#[source] StoreError),
}

impl VaultError {
    /// Whether the caller should report "not authorized".
    pub fn is_not_authorized(&self) -> bool {
        matches!(
            self,
            VaultError::AccessDenied(_) | VaultError::DecryptionFailure(_)
        )
    }

    /// Whether this is an operational failure rather than a policy outcome.
    pub fn is_operational(&self) -> bool {
        matches!(
            self,
            VaultError::IntegrityFailure(_) | VaultError::StorageFailure(_)
        )
    }
}

impl From<PermsError> for VaultError {
    fn from(err: PermsError) -> Self {
        match err {
            PermsError::Decryption(msg) => VaultError::DecryptionFailure(msg),
            PermsError::Encryption(msg) => {
                VaultError::DecryptionFailure(format!("cannot seal: {}", msg))
            }
            PermsError::Encoding(msg) => VaultError::EncodingFailure(msg),
            PermsError::MissingModifyKey(op) => {
                VaultError::AccessDenied(format!("{} needs modify access", op))
            }
        }
    }
}

impl From<StoreError> for VaultError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Integrity(msg) => VaultError::IntegrityFailure(msg),
            other => VaultError::StorageFailure(other),
        }
    }
}

/// Result type for vault operations.
pub type Result<T> = std::result::Result<T, VaultError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perms_errors_map_to_kinds() {
        let err: VaultError = PermsError::Decryption("tag".into()).into();
        assert!(matches!(err, VaultError::DecryptionFailure(_)));
        assert!(err.is_not_authorized());

        let err: VaultError = PermsError::Encoding("cbor".into()).into();
        assert!(matches!(err, VaultError::EncodingFailure(_)));

        let err: VaultError = PermsError::MissingModifyKey("archive".into()).into();
        assert!(matches!(err, VaultError::AccessDenied(_)));
    }

    #[test]
    fn test_store_errors_map_to_kinds() {
        let err: VaultError = StoreError::Integrity("stale epoch".into()).into();
        assert!(matches!(err, VaultError::IntegrityFailure(_)));
        assert!(err.is_operational());

        let err: VaultError = StoreError::Backend("gone".into()).into();
        assert!(matches!(err, VaultError::StorageFailure(_)));
        assert!(err.is_operational());
        assert!(!err.is_not_authorized());
    }
}
