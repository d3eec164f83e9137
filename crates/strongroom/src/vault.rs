//! The Vault: unified API for the access-control core.
//!
//! The Vault brings together storage, membership, configuration and the
//! envelope cryptography into one service. It is constructed once and
//! shared by handle; it caches nothing between calls.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use strongroom_core::{
    AccessControlEntry, AccessLevel, Actor, ActorId, Configuration, HistoricalRecord, ItemId,
    ItemKeyRecord,
};
use strongroom_perms::{
    open_payload, seal_payload, unwrap_entry, wrap_entry, ActorCredential, ActorPublicKey,
    ItemKeyPair,
};
use strongroom_store::{InsertResult, KeyRotation, Membership, Store};

use crate::error::{Result, VaultError};

/// Configuration for the Vault.
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Longest ancestor chain hierarchy resolution will walk before
    /// reporting an integrity failure.
    pub max_hierarchy_depth: usize,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            max_hierarchy_depth: 256,
        }
    }
}

/// The main Vault struct.
///
/// Provides a unified API for:
/// - Registering items and wrapping their keys for actors
/// - Resolving folder-level access
/// - Managing role grants
/// - Archiving and reading history
pub struct Vault<S: Store, M: Membership> {
    pub(crate) store: Arc<S>,
    pub(crate) membership: Arc<M>,
    pub(crate) configuration: Arc<dyn Configuration>,
    pub(crate) config: VaultConfig,
}

impl<S: Store, M: Membership> Vault<S, M> {
    /// Create a new vault.
    ///
    /// `store` and `membership` may be the same backend behind two `Arc`s.
    pub fn new(
        store: Arc<S>,
        membership: Arc<M>,
        configuration: Arc<dyn Configuration>,
        config: VaultConfig,
    ) -> Self {
        Self {
            store,
            membership,
            configuration,
            config,
        }
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get the membership reference.
    pub fn membership(&self) -> &M {
        &self.membership
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Items
    // ─────────────────────────────────────────────────────────────────────────

    /// Register a new item and return its freshly generated key pair.
    ///
    /// The key pair is not bound to anyone yet; wrap it for at least one
    /// actor before dropping it.
    pub async fn register_item(&self, item_id: &ItemId) -> Result<ItemKeyPair> {
        let keys = ItemKeyPair::generate();
        let verifying_key = keys.require_modify_key("register item")?.verifying_key();

        match self.store.insert_item(item_id, verifying_key).await? {
            InsertResult::Inserted => {
                info!(item = %item_id, "registered item");
                Ok(keys)
            }
            InsertResult::AlreadyExists => Err(VaultError::DuplicateBinding(format!(
                "item {} already registered",
                item_id
            ))),
        }
    }

    /// The item's current key epoch record.
    pub(crate) async fn current_key(&self, item_id: &ItemId) -> Result<ItemKeyRecord> {
        self.store
            .current_item_key(item_id)
            .await?
            .ok_or_else(|| VaultError::AccessDenied(format!("unknown item {}", item_id)))
    }

    /// Check that `keys` carries the item's current modify half.
    pub(crate) fn require_current_modify(
        keys: &ItemKeyPair,
        current: &ItemKeyRecord,
        operation: &str,
    ) -> Result<()> {
        let modify = keys.require_modify_key(operation)?;
        if modify.verifying_key() != current.verifying_key {
            return Err(VaultError::AccessDenied(format!(
                "{} on {} with keys from another epoch",
                operation, current.item_id
            )));
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Access control entries
    // ─────────────────────────────────────────────────────────────────────────

    /// Wrap an item's key pair for an actor and persist the binding.
    ///
    /// `level` selects whether the modify half is wrapped too.
    pub async fn wrap_item_key_for_actor(
        &self,
        item_id: &ItemId,
        actor: &Actor,
        actor_public: &ActorPublicKey,
        keys: &ItemKeyPair,
        level: AccessLevel,
    ) -> Result<AccessControlEntry> {
        let current = self.current_key(item_id).await?;
        if level == AccessLevel::Modify || keys.modify_key().is_some() {
            Self::require_current_modify(keys, &current, "grant access")?;
        }

        let entry = wrap_entry(item_id, actor, actor_public, keys, level, current.epoch)?;

        match self.store.insert_entry(&entry).await? {
            InsertResult::Inserted => {
                info!(
                    item = %item_id,
                    actor = %actor,
                    level = level.code(),
                    epoch = current.epoch,
                    "granted access"
                );
                Ok(entry)
            }
            InsertResult::AlreadyExists => Err(VaultError::DuplicateBinding(format!(
                "{} already bound to {}",
                actor, item_id
            ))),
        }
    }

    /// The binding between an item and an actor, if any.
    pub async fn access_entry(
        &self,
        item_id: &ItemId,
        actor_id: &ActorId,
    ) -> Result<Option<AccessControlEntry>> {
        Ok(self.store.get_entry(item_id, actor_id).await?)
    }

    /// Recover an item's key pair with an actor's credential.
    ///
    /// Fails with `AccessDenied` when no binding exists and with
    /// `IntegrityFailure` when the binding predates the item's current key.
    pub async fn unwrap_item_key_for_actor(
        &self,
        item_id: &ItemId,
        actor_id: &ActorId,
        credential: &ActorCredential,
    ) -> Result<ItemKeyPair> {
        let entry = self
            .store
            .get_entry(item_id, actor_id)
            .await?
            .ok_or_else(|| {
                VaultError::AccessDenied(format!("{} has no access to {}", actor_id, item_id))
            })?;

        let current = self.store.current_item_key(item_id).await?.ok_or_else(|| {
            VaultError::IntegrityFailure(format!("entry for unregistered item {}", item_id))
        })?;
        if entry.key_epoch != current.epoch {
            warn!(
                item = %item_id,
                actor = %actor_id,
                entry_epoch = entry.key_epoch,
                item_epoch = current.epoch,
                "entry wrapped under a stale key epoch"
            );
            return Err(VaultError::IntegrityFailure(format!(
                "entry for {} on {} is at epoch {}, item at {}",
                actor_id, item_id, entry.key_epoch, current.epoch
            )));
        }

        let keys = unwrap_entry(&entry, credential)?;
        if let Some(modify) = keys.modify_key() {
            if modify.verifying_key() != current.verifying_key {
                warn!(item = %item_id, actor = %actor_id, "modify half does not match item");
                return Err(VaultError::IntegrityFailure(format!(
                    "modify half for {} on {} does not match the registered key",
                    actor_id, item_id
                )));
            }
        }

        debug!(item = %item_id, actor = %actor_id, level = keys.access_level().code(), "unwrapped item key");
        Ok(keys)
    }

    /// Delete a binding. The actor loses the ability to unwrap the item's key
    /// immediately.
    pub async fn revoke_access(&self, item_id: &ItemId, actor_id: &ActorId) -> Result<()> {
        let existed = self.store.delete_entry(item_id, actor_id).await?;
        info!(item = %item_id, actor = %actor_id, existed, "revoked access");
        Ok(())
    }

    /// Replace an item's key pair and re-wrap every binding under it.
    ///
    /// `recipients` must hold the public key of every actor currently bound
    /// to the item. History is re-sealed under the new pair in the same
    /// commit. Either everything moves to the new epoch or nothing does.
    pub async fn rotate_item_keys(
        &self,
        item_id: &ItemId,
        current_keys: &ItemKeyPair,
        recipients: &BTreeMap<ActorId, ActorPublicKey>,
    ) -> Result<ItemKeyPair> {
        let current = self.current_key(item_id).await?;
        Self::require_current_modify(current_keys, &current, "rotate keys")?;

        let new_keys = ItemKeyPair::generate();
        let new_epoch = current.epoch + 1;
        let verifying_key = new_keys.require_modify_key("rotate keys")?.verifying_key();

        let mut entries = Vec::new();
        for entry in self.store.entries_for_item(item_id).await? {
            let recipient = recipients.get(entry.actor.id()).ok_or_else(|| {
                VaultError::IntegrityFailure(format!(
                    "no public key to re-wrap {} for {}",
                    item_id, entry.actor
                ))
            })?;
            entries.push(wrap_entry(
                item_id,
                &entry.actor,
                recipient,
                &new_keys,
                entry.access_level(),
                new_epoch,
            )?);
        }

        let mut history = Vec::new();
        for record in self.store.history_for_item(item_id).await? {
            let payload = self.open_sealed(&record, current_keys).await?;
            let sealed = seal_payload(item_id, record.timestamp, &new_keys, &payload)?;
            history.push(HistoricalRecord::new(
                item_id.clone(),
                record.timestamp,
                new_epoch,
                sealed,
            ));
        }

        let rotation = KeyRotation {
            item_id: item_id.clone(),
            expected_epoch: current.epoch,
            verifying_key,
            entries,
            history,
        };
        let committed = self.store.rotate_item_keys(&rotation).await.map_err(|e| {
            warn!(item = %item_id, error = %e, "key rotation rejected");
            VaultError::from(e)
        })?;

        info!(
            item = %item_id,
            epoch = committed,
            entries = rotation.entries.len(),
            history = rotation.history.len(),
            "rotated item keys"
        );
        Ok(new_keys)
    }

    /// Verify and decrypt a historical record's payload.
    pub(crate) async fn open_sealed(
        &self,
        record: &HistoricalRecord,
        keys: &ItemKeyPair,
    ) -> Result<Vec<u8>> {
        let epoch_key = self
            .store
            .item_key_at(&record.item_id, record.key_epoch)
            .await?
            .ok_or_else(|| {
                VaultError::IntegrityFailure(format!(
                    "history of {} at {} refers to unknown epoch {}",
                    record.item_id, record.timestamp, record.key_epoch
                ))
            })?;

        Ok(open_payload(
            &record.item_id,
            record.timestamp,
            keys.read_key(),
            &epoch_key.verifying_key,
            &record.sealed_payload,
        )?)
    }
}
