//! Wrapping item key pairs for actors.
//!
//! Each half of an item key pair is sealed in its own [`Envelope`] for the
//! actor's public key. The derivation context binds the envelope to the item,
//! the actor, the key epoch and the half it carries, so an envelope lifted
//! into another entry row no longer opens.

use bytes::Bytes;

use strongroom_core::{AccessControlEntry, AccessLevel, Actor, ItemId};

use crate::crypto::{ActorCredential, ActorPublicKey};
use crate::envelope::{derivation_context, Envelope};
use crate::error::{PermsError, Result};
use crate::keys::{ItemKeyPair, ItemModifyKey, ItemReadKey};

const ITEM_KEY_LABEL: &[u8] = b"strongroom item key";
const READ_HALF: &[u8] = b"read";
const MODIFY_HALF: &[u8] = b"modify";

fn half_context(item_id: &ItemId, actor: &Actor, epoch: u64, half: &[u8]) -> Vec<u8> {
    derivation_context(
        ITEM_KEY_LABEL,
        &[
            item_id.as_bytes(),
            actor.kind().code().as_bytes(),
            actor.id().as_bytes(),
            &epoch.to_be_bytes(),
            half,
        ],
    )
}

/// Seal raw bytes for `recipient` and encode them for storage.
pub fn wrap_for(plaintext: &[u8], recipient: &ActorPublicKey, context: &[u8]) -> Result<Bytes> {
    let envelope = Envelope::seal(plaintext, recipient, context)?;
    Ok(Bytes::from(envelope.to_bytes()?))
}

/// Decode stored bytes and open them with `credential`.
pub fn unwrap_with(wrapped: &[u8], credential: &ActorCredential, context: &[u8]) -> Result<Vec<u8>> {
    Envelope::from_bytes(wrapped)?.open(credential, context)
}

fn to_key_bytes(bytes: Vec<u8>, half: &str) -> Result<[u8; 32]> {
    <[u8; 32]>::try_from(bytes.as_slice())
        .map_err(|_| PermsError::Encoding(format!("{} half has length {}", half, bytes.len())))
}

/// Build the entry that grants `actor` the requested level on an item.
///
/// Modify access needs the modify half in `keys`.
pub fn wrap_entry(
    item_id: &ItemId,
    actor: &Actor,
    recipient: &ActorPublicKey,
    keys: &ItemKeyPair,
    level: AccessLevel,
    epoch: u64,
) -> Result<AccessControlEntry> {
    let wrapped_read_key = wrap_for(
        keys.read_key().as_bytes(),
        recipient,
        &half_context(item_id, actor, epoch, READ_HALF),
    )?;

    let wrapped_modify_key = match level {
        AccessLevel::Read => None,
        AccessLevel::Modify => {
            let modify = keys.require_modify_key("grant modify access")?;
            Some(wrap_for(
                &modify.to_bytes(),
                recipient,
                &half_context(item_id, actor, epoch, MODIFY_HALF),
            )?)
        }
    };

    Ok(AccessControlEntry::new(
        item_id.clone(),
        actor.clone(),
        wrapped_read_key,
        wrapped_modify_key,
        epoch,
    ))
}

/// Recover the key pair halves an entry carries.
pub fn unwrap_entry(entry: &AccessControlEntry, credential: &ActorCredential) -> Result<ItemKeyPair> {
    let read = unwrap_with(
        &entry.wrapped_read_key,
        credential,
        &half_context(&entry.item_id, &entry.actor, entry.key_epoch, READ_HALF),
    )?;
    let read = ItemReadKey::from_bytes(to_key_bytes(read, "read")?);

    let modify = match &entry.wrapped_modify_key {
        None => None,
        Some(wrapped) => {
            let seed = unwrap_with(
                wrapped,
                credential,
                &half_context(&entry.item_id, &entry.actor, entry.key_epoch, MODIFY_HALF),
            )?;
            Some(ItemModifyKey::from_bytes(to_key_bytes(seed, "modify")?))
        }
    };

    Ok(ItemKeyPair::from_parts(read, modify))
}
