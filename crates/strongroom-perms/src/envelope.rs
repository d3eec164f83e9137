//! Envelopes sealed for a single actor.
//!
//! An envelope carries bytes that only the holder of one actor credential can
//! open. The sender performs an ephemeral X25519 agreement with the actor's
//! public key, derives a wrapping key bound to a caller-supplied context, and
//! encrypts with ChaCha20-Poly1305. Opening with any other credential, or
//! under any other context, fails authentication.

use serde::{Deserialize, Serialize};

use crate::crypto::{ActorCredential, ActorPublicKey, EncryptionNonce, EphemeralKeyPair};
use crate::error::{PermsError, Result};

/// Format identifier for envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum EnvelopeFormat {
    /// X25519 agreement, BLAKE3 key derivation, ChaCha20-Poly1305.
    X25519ChaCha20Poly1305 = 1,
}

/// Bytes sealed for one actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Sealing scheme.
    pub format: EnvelopeFormat,

    /// Ephemeral X25519 public key (sender's side of the agreement).
    pub ephemeral_public: ActorPublicKey,

    /// Nonce used for encryption.
    pub nonce: EncryptionNonce,

    /// The sealed bytes (includes authentication tag).
    pub ciphertext: Vec<u8>,
}

impl Envelope {
    /// Seal `plaintext` for the holder of `recipient`'s credential.
    pub fn seal(plaintext: &[u8], recipient: &ActorPublicKey, context: &[u8]) -> Result<Self> {
        let ephemeral = EphemeralKeyPair::generate();
        let ephemeral_public = ephemeral.public_key();

        let wrap_key = ephemeral
            .diffie_hellman(recipient)
            .derive_encryption_key(context);

        let nonce = EncryptionNonce::generate();
        let ciphertext = wrap_key.encrypt(plaintext, &[], &nonce)?;

        Ok(Self {
            format: EnvelopeFormat::X25519ChaCha20Poly1305,
            ephemeral_public,
            nonce,
            ciphertext,
        })
    }

    /// Open with the recipient's credential.
    pub fn open(&self, credential: &ActorCredential, context: &[u8]) -> Result<Vec<u8>> {
        match self.format {
            EnvelopeFormat::X25519ChaCha20Poly1305 => {
                let wrap_key = credential
                    .diffie_hellman(&self.ephemeral_public)
                    .derive_encryption_key(context);
                wrap_key.decrypt(&self.ciphertext, &[], &self.nonce)
            }
        }
    }

    /// Serialize to CBOR bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf).map_err(|e| PermsError::Encoding(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize from CBOR bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes).map_err(|e| PermsError::Encoding(e.to_string()))
    }
}

/// Build an unambiguous key-derivation context from labelled parts.
///
/// Each part is length-prefixed so that ("ab", "c") and ("a", "bc") differ.
pub(crate) fn derivation_context(label: &[u8], parts: &[&[u8]]) -> Vec<u8> {
    let mut context = Vec::with_capacity(label.len() + parts.iter().map(|p| p.len() + 4).sum::<usize>());
    context.extend_from_slice(label);
    for part in parts {
        context.extend_from_slice(&(part.len() as u32).to_be_bytes());
        context.extend_from_slice(part);
    }
    context
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_open_roundtrip() {
        let recipient = ActorCredential::generate();
        let envelope = Envelope::seal(b"content key", &recipient.public_key(), b"ctx").unwrap();

        let opened = envelope.open(&recipient, b"ctx").unwrap();
        assert_eq!(opened, b"content key");
    }

    #[test]
    fn test_wrong_recipient_fails() {
        let recipient = ActorCredential::generate();
        let intruder = ActorCredential::generate();
        let envelope = Envelope::seal(b"secret", &recipient.public_key(), b"ctx").unwrap();

        let err = envelope.open(&intruder, b"ctx").unwrap_err();
        assert!(matches!(err, PermsError::Decryption(_)));
    }

    #[test]
    fn test_wrong_context_fails() {
        let recipient = ActorCredential::generate();
        let envelope = Envelope::seal(b"secret", &recipient.public_key(), b"ctx-a").unwrap();

        assert!(envelope.open(&recipient, b"ctx-b").is_err());
    }

    #[test]
    fn test_serialization() {
        let recipient = ActorCredential::generate();
        let envelope = Envelope::seal(b"secret", &recipient.public_key(), b"ctx").unwrap();

        let bytes = envelope.to_bytes().unwrap();
        assert!(bytes.len() > 1);
        assert_eq!(Envelope::from_bytes(&bytes).unwrap(), envelope);
    }

    #[test]
    fn test_garbage_bytes_are_encoding_failure() {
        let err = Envelope::from_bytes(&[0xff, 0x00, 0x13]).unwrap_err();
        assert!(matches!(err, PermsError::Encoding(_)));
    }

    #[test]
    fn test_context_parts_are_length_prefixed() {
        let a = derivation_context(b"x", &[b"ab", b"c"]);
        let b = derivation_context(b"x", &[b"a", b"bc"]);
        assert_ne!(a, b);
    }
}
