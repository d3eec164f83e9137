//! Payloads sealed under an item key pair.
//!
//! Sealing needs both halves: the read half encrypts, the modify half signs.
//! Opening needs the read half plus the verifying key registered for the
//! epoch the payload was sealed under. A holder of only the read half can
//! therefore read archived payloads but cannot forge new ones.

use bytes::Bytes;
use ed25519_dalek::Signature;
use serde::{Deserialize, Serialize};

use strongroom_core::ItemId;

use crate::crypto::EncryptionNonce;
use crate::error::{PermsError, Result};
use crate::keys::{verify_signature, ItemKeyPair, ItemReadKey};

/// An encrypted, signed payload as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedPayload {
    pub nonce: EncryptionNonce,
    pub ciphertext: Vec<u8>,
    /// Ed25519 signature over nonce, ciphertext and associated data.
    pub signature: Signature,
}

fn associated_data(item_id: &ItemId, timestamp: i64) -> Vec<u8> {
    let mut aad = Vec::with_capacity(item_id.as_bytes().len() + 8);
    aad.extend_from_slice(item_id.as_bytes());
    aad.extend_from_slice(&timestamp.to_be_bytes());
    aad
}

fn signed_message(nonce: &EncryptionNonce, ciphertext: &[u8], aad: &[u8]) -> Vec<u8> {
    let mut message = Vec::with_capacity(12 + ciphertext.len() + aad.len());
    message.extend_from_slice(nonce.as_bytes());
    message.extend_from_slice(ciphertext);
    message.extend_from_slice(aad);
    message
}

/// Seal `plaintext` as the payload of `item_id` at `timestamp`.
pub fn seal_payload(
    item_id: &ItemId,
    timestamp: i64,
    keys: &ItemKeyPair,
    plaintext: &[u8],
) -> Result<Bytes> {
    let modify = keys.require_modify_key("seal payload")?;

    let aad = associated_data(item_id, timestamp);
    let nonce = EncryptionNonce::generate();
    let ciphertext = keys.read_key().encrypt(plaintext, &aad, &nonce)?;
    let signature = modify.sign(&signed_message(&nonce, &ciphertext, &aad));

    let sealed = SealedPayload {
        nonce,
        ciphertext,
        signature,
    };

    let mut buf = Vec::new();
    ciborium::into_writer(&sealed, &mut buf).map_err(|e| PermsError::Encoding(e.to_string()))?;
    Ok(Bytes::from(buf))
}

/// Verify and decrypt a sealed payload.
pub fn open_payload(
    item_id: &ItemId,
    timestamp: i64,
    read_key: &ItemReadKey,
    verifying_key: &[u8; 32],
    sealed: &[u8],
) -> Result<Vec<u8>> {
    let sealed: SealedPayload =
        ciborium::from_reader(sealed).map_err(|e| PermsError::Encoding(e.to_string()))?;

    let aad = associated_data(item_id, timestamp);
    verify_signature(
        verifying_key,
        &signed_message(&sealed.nonce, &sealed.ciphertext, &aad),
        &sealed.signature,
    )?;

    read_key.decrypt(&sealed.ciphertext, &aad, &sealed.nonce)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_open_roundtrip() {
        let keys = ItemKeyPair::generate();
        let item = ItemId::new("pw");
        let verifying_key = keys.modify_key().unwrap().verifying_key();

        let sealed = seal_payload(&item, 1_700_000_000_000, &keys, b"old-password").unwrap();
        let opened =
            open_payload(&item, 1_700_000_000_000, keys.read_key(), &verifying_key, &sealed)
                .unwrap();
        assert_eq!(opened, b"old-password");
    }

    #[test]
    fn test_read_only_cannot_seal() {
        let keys = ItemKeyPair::generate().read_only();
        let err = seal_payload(&ItemId::new("pw"), 0, &keys, b"x").unwrap_err();
        assert!(matches!(err, PermsError::MissingModifyKey(_)));
    }

    #[test]
    fn test_bound_to_item_and_timestamp() {
        let keys = ItemKeyPair::generate();
        let verifying_key = keys.modify_key().unwrap().verifying_key();
        let sealed = seal_payload(&ItemId::new("pw"), 10, &keys, b"secret").unwrap();

        assert!(open_payload(&ItemId::new("pw"), 11, keys.read_key(), &verifying_key, &sealed)
            .is_err());
        assert!(
            open_payload(&ItemId::new("other"), 10, keys.read_key(), &verifying_key, &sealed)
                .is_err()
        );
    }

    #[test]
    fn test_forged_payload_rejected() {
        let keys = ItemKeyPair::generate();
        let verifying_key = keys.modify_key().unwrap().verifying_key();

        // Same read half, attacker-chosen modify half.
        let forger = ItemKeyPair::from_parts(
            keys.read_key().clone(),
            ItemKeyPair::generate().modify_key().cloned(),
        );
        let forged = seal_payload(&ItemId::new("pw"), 10, &forger, b"evil").unwrap();

        let err = open_payload(&ItemId::new("pw"), 10, keys.read_key(), &verifying_key, &forged)
            .unwrap_err();
        assert!(matches!(err, PermsError::Decryption(_)));
    }

    #[test]
    fn test_garbage_is_encoding_failure() {
        let keys = ItemKeyPair::generate();
        let verifying_key = keys.modify_key().unwrap().verifying_key();
        let err = open_payload(&ItemId::new("pw"), 0, keys.read_key(), &verifying_key, b"")
            .unwrap_err();
        assert!(matches!(err, PermsError::Encoding(_)));
    }

    proptest::proptest! {
        #![proptest_config(proptest::prelude::ProptestConfig::with_cases(32))]

        #[test]
        fn test_sealed_payload_bound_to_timestamp(
            sealed_at in proptest::prelude::any::<i64>(),
            opened_at in proptest::prelude::any::<i64>(),
            payload in proptest::collection::vec(proptest::prelude::any::<u8>(), 0..64),
        ) {
            proptest::prop_assume!(sealed_at != opened_at);
            let keys = ItemKeyPair::generate();
            let verifying_key = keys.modify_key().unwrap().verifying_key();
            let item = ItemId::new("pw");

            let sealed = seal_payload(&item, sealed_at, &keys, &payload).unwrap();
            proptest::prop_assert_eq!(
                open_payload(&item, sealed_at, keys.read_key(), &verifying_key, &sealed).unwrap(),
                payload
            );
            proptest::prop_assert!(
                open_payload(&item, opened_at, keys.read_key(), &verifying_key, &sealed).is_err()
            );
        }
    }
}
