//! Item key pairs.
//!
//! Every protected item has one current key pair:
//!
//! - the **read** half is a ChaCha20-Poly1305 content key that opens payloads;
//! - the **modify** half is an Ed25519 signing key that authenticates new
//!   payloads. Its verifying key is registered with the item so readers can
//!   check payloads without holding the modify half.
//!
//! Key pairs only exist unwrapped in memory during an authorized operation.

use std::fmt;

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::RngCore;

use strongroom_core::AccessLevel;

use crate::crypto::{EncryptionKey, EncryptionNonce};
use crate::error::{PermsError, Result};

/// The read half of an item key pair.
#[derive(Clone, PartialEq, Eq)]
pub struct ItemReadKey(EncryptionKey);

impl ItemReadKey {
    /// Generate a new random read key.
    pub fn generate() -> Self {
        Self(EncryptionKey::generate())
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(EncryptionKey::from_bytes(bytes))
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_bytes()
    }

    pub(crate) fn encrypt(
        &self,
        plaintext: &[u8],
        aad: &[u8],
        nonce: &EncryptionNonce,
    ) -> Result<Vec<u8>> {
        self.0.encrypt(plaintext, aad, nonce)
    }

    pub(crate) fn decrypt(
        &self,
        ciphertext: &[u8],
        aad: &[u8],
        nonce: &EncryptionNonce,
    ) -> Result<Vec<u8>> {
        self.0.decrypt(ciphertext, aad, nonce)
    }
}

impl fmt::Debug for ItemReadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemReadKey").finish_non_exhaustive()
    }
}

/// The modify half of an item key pair.
#[derive(Clone)]
pub struct ItemModifyKey(SigningKey);

impl ItemModifyKey {
    /// Generate a new random modify key.
    pub fn generate() -> Self {
        let mut seed = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut seed);
        Self(SigningKey::from_bytes(&seed))
    }

    /// Create from the 32-byte seed.
    pub fn from_bytes(seed: [u8; 32]) -> Self {
        Self(SigningKey::from_bytes(&seed))
    }

    /// Get the 32-byte seed.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    /// The verifying key registered with the item.
    pub fn verifying_key(&self) -> [u8; 32] {
        self.0.verifying_key().to_bytes()
    }

    pub(crate) fn sign(&self, message: &[u8]) -> Signature {
        self.0.sign(message)
    }
}

impl PartialEq for ItemModifyKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bytes() == other.0.to_bytes()
    }
}

impl Eq for ItemModifyKey {}

impl fmt::Debug for ItemModifyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemModifyKey")
            .field("verifying_key", &hex::encode(self.verifying_key()))
            .finish_non_exhaustive()
    }
}

/// Verify a payload signature against a registered verifying key.
pub(crate) fn verify_signature(
    verifying_key: &[u8; 32],
    message: &[u8],
    signature: &Signature,
) -> Result<()> {
    let key = VerifyingKey::from_bytes(verifying_key)
        .map_err(|e| PermsError::Decryption(format!("invalid verifying key: {}", e)))?;
    key.verify(message, signature)
        .map_err(|_| PermsError::Decryption("payload signature mismatch".into()))
}

/// An item's key pair, possibly without its modify half.
#[derive(Clone, PartialEq, Eq)]
pub struct ItemKeyPair {
    read: ItemReadKey,
    modify: Option<ItemModifyKey>,
}

impl ItemKeyPair {
    /// Generate a complete key pair for a new item or a rotation.
    pub fn generate() -> Self {
        Self {
            read: ItemReadKey::generate(),
            modify: Some(ItemModifyKey::generate()),
        }
    }

    /// Assemble from unwrapped halves.
    pub fn from_parts(read: ItemReadKey, modify: Option<ItemModifyKey>) -> Self {
        Self { read, modify }
    }

    pub fn read_key(&self) -> &ItemReadKey {
        &self.read
    }

    pub fn modify_key(&self) -> Option<&ItemModifyKey> {
        self.modify.as_ref()
    }

    /// The modify half, or an error naming the attempted operation.
    pub fn require_modify_key(&self, operation: &str) -> Result<&ItemModifyKey> {
        self.modify
            .as_ref()
            .ok_or_else(|| PermsError::MissingModifyKey(operation.to_owned()))
    }

    /// A copy holding only the read half.
    pub fn read_only(&self) -> Self {
        Self {
            read: self.read.clone(),
            modify: None,
        }
    }

    /// Access level this key pair can confer.
    pub fn access_level(&self) -> AccessLevel {
        if self.modify.is_some() {
            AccessLevel::Modify
        } else {
            AccessLevel::Read
        }
    }
}

impl fmt::Debug for ItemKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemKeyPair")
            .field("access_level", &self.access_level())
            .finish_non_exhaustive()
    }
}
