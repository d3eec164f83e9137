//! Store traits: the abstract persistence collaborators of the vault.
//!
//! The vault is storage-agnostic. Implementations include SQLite (primary)
//! and in-memory (for tests).

use std::collections::BTreeSet;

use async_trait::async_trait;
use strongroom_core::{
    AccessControlEntry, AccessRule, ActorId, HierarchyNode, HistoricalRecord, ItemId,
    ItemKeyRecord, NodeId, RoleGrant,
};

use crate::error::{Result, StoreError};

/// Result of inserting a uniquely keyed row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertResult {
    /// The row was inserted.
    Inserted,
    /// A row with the same key already exists. Nothing was written.
    AlreadyExists,
}

impl InsertResult {
    pub fn is_inserted(self) -> bool {
        matches!(self, InsertResult::Inserted)
    }
}

/// Everything a key rotation replaces, committed as one unit.
#[derive(Debug, Clone)]
pub struct KeyRotation {
    pub item_id: ItemId,
    /// The epoch the caller rotated from. The rotation is rejected if the
    /// item has moved on.
    pub expected_epoch: u64,
    /// Verifying key of the new modify half.
    pub verifying_key: [u8; 32],
    /// Re-wrapped entries, one per actor currently holding an entry.
    pub entries: Vec<AccessControlEntry>,
    /// Re-sealed history, one per archived timestamp.
    pub history: Vec<HistoricalRecord>,
}

impl KeyRotation {
    /// The epoch the rotation moves the item to.
    pub fn new_epoch(&self) -> u64 {
        self.expected_epoch + 1
    }

    /// Entries must replace exactly the stored set, each wrapped at the new
    /// epoch.
    pub fn check_entries(&self, stored_actors: &BTreeSet<String>) -> Result<()> {
        let new_epoch = self.new_epoch();
        let mut supplied = BTreeSet::new();

        for entry in &self.entries {
            if entry.item_id != self.item_id || entry.key_epoch != new_epoch {
                return Err(StoreError::Integrity(format!(
                    "entry for {} is not wrapped for {} at epoch {}",
                    entry.actor, self.item_id, new_epoch
                )));
            }
            supplied.insert(entry.actor.id().as_str().to_owned());
        }

        if &supplied != stored_actors || supplied.len() != self.entries.len() {
            return Err(StoreError::Integrity(format!(
                "rotation of {} covers {} entries, {} stored",
                self.item_id,
                self.entries.len(),
                stored_actors.len()
            )));
        }
        Ok(())
    }

    /// History must replace exactly the stored set, each sealed at the new
    /// epoch.
    pub fn check_history(&self, stored_timestamps: &BTreeSet<i64>) -> Result<()> {
        let new_epoch = self.new_epoch();
        let mut supplied = BTreeSet::new();

        for record in &self.history {
            if record.item_id != self.item_id || record.key_epoch != new_epoch {
                return Err(StoreError::Integrity(format!(
                    "history at {} is not sealed for {} at epoch {}",
                    record.timestamp, self.item_id, new_epoch
                )));
            }
            supplied.insert(record.timestamp);
        }

        if &supplied != stored_timestamps || supplied.len() != self.history.len() {
            return Err(StoreError::Integrity(format!(
                "rotation of {} covers {} history rows, {} stored",
                self.item_id,
                self.history.len(),
                stored_timestamps.len()
            )));
        }
        Ok(())
    }
}

/// The Store trait: async interface for vault persistence.
///
/// All methods are async to support both sync (SQLite) and async backends.
/// For SQLite, `spawn_blocking` keeps the runtime free.
///
/// # Design Notes
///
/// - **Uniqueness**: one entry per (item, actor), one rule per (node, actor),
///   one grant per (item, actor, role), one history row per (item, timestamp).
///   Inserting a duplicate returns `AlreadyExists` rather than overwriting.
/// - **Atomic rotation**: [`Store::rotate_item_keys`] replaces every entry,
///   every history row and the item's key epoch together or not at all.
#[async_trait]
pub trait Store: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Items and key epochs
    // ─────────────────────────────────────────────────────────────────────────

    /// Register an item at epoch 1 with its verifying key.
    async fn insert_item(&self, item_id: &ItemId, verifying_key: [u8; 32])
        -> Result<InsertResult>;

    /// The item's current key epoch.
    async fn current_item_key(&self, item_id: &ItemId) -> Result<Option<ItemKeyRecord>>;

    /// The item's key record at a past or current epoch.
    async fn item_key_at(&self, item_id: &ItemId, epoch: u64) -> Result<Option<ItemKeyRecord>>;

    /// Replace all wrapped material of an item and advance its epoch.
    ///
    /// Fails with [`StoreError::Integrity`](crate::StoreError::Integrity) if the
    /// item is not at `expected_epoch`, or if the supplied entries and history
    /// do not cover exactly the rows currently stored. Returns the new epoch.
    async fn rotate_item_keys(&self, rotation: &KeyRotation) -> Result<u64>;

    // ─────────────────────────────────────────────────────────────────────────
    // Access control entries
    // ─────────────────────────────────────────────────────────────────────────

    async fn insert_entry(&self, entry: &AccessControlEntry) -> Result<InsertResult>;

    async fn get_entry(
        &self,
        item_id: &ItemId,
        actor_id: &ActorId,
    ) -> Result<Option<AccessControlEntry>>;

    /// Delete an entry. Returns whether one existed.
    async fn delete_entry(&self, item_id: &ItemId, actor_id: &ActorId) -> Result<bool>;

    /// All entries of an item, ordered by actor ID.
    async fn entries_for_item(&self, item_id: &ItemId) -> Result<Vec<AccessControlEntry>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Hierarchy
    // ─────────────────────────────────────────────────────────────────────────

    async fn insert_node(&self, node: &HierarchyNode) -> Result<InsertResult>;

    async fn get_node(&self, node_id: &NodeId) -> Result<Option<HierarchyNode>>;

    /// Insert or replace the rule for (node, actor).
    async fn put_rule(&self, rule: &AccessRule) -> Result<()>;

    async fn get_rule(&self, node_id: &NodeId, actor_id: &ActorId) -> Result<Option<AccessRule>>;

    /// Rules on a node held by any of `actor_ids`, in one lookup.
    async fn rules_for_actors(
        &self,
        node_id: &NodeId,
        actor_ids: &[ActorId],
    ) -> Result<Vec<AccessRule>>;

    /// Delete a rule. Returns whether one existed.
    async fn delete_rule(&self, node_id: &NodeId, actor_id: &ActorId) -> Result<bool>;

    // ─────────────────────────────────────────────────────────────────────────
    // Role grants
    // ─────────────────────────────────────────────────────────────────────────

    async fn insert_role_grant(&self, grant: &RoleGrant) -> Result<InsertResult>;

    /// Delete a grant. Returns whether one existed.
    async fn delete_role_grant(&self, grant: &RoleGrant) -> Result<bool>;

    /// All decodable grants on an item.
    async fn role_grants_for_item(&self, item_id: &ItemId) -> Result<Vec<RoleGrant>>;

    /// Raw role cells on an item for any of `actor_ids`, in one lookup.
    ///
    /// Cells are returned as stored: `None` for NULL, unknown codes verbatim.
    async fn role_codes_for(
        &self,
        item_id: &ItemId,
        actor_ids: &[ActorId],
    ) -> Result<Vec<Option<String>>>;

    // ─────────────────────────────────────────────────────────────────────────
    // History
    // ─────────────────────────────────────────────────────────────────────────

    /// Append a historical record. Existing records are never overwritten.
    async fn append_history(&self, record: &HistoricalRecord) -> Result<InsertResult>;

    /// All historical records of an item, oldest first.
    async fn history_for_item(&self, item_id: &ItemId) -> Result<Vec<HistoricalRecord>>;
}

/// Group membership lookup.
///
/// Membership is owned outside the access-control core; the vault only
/// expands it.
#[async_trait]
pub trait Membership: Send + Sync {
    /// Groups a user belongs to.
    async fn groups_of(&self, user_id: &ActorId) -> Result<BTreeSet<ActorId>>;

    /// Users belonging to a group.
    async fn members_of(&self, group_id: &ActorId) -> Result<BTreeSet<ActorId>>;

    async fn add_membership(&self, group_id: &ActorId, user_id: &ActorId) -> Result<()>;

    /// Returns whether the membership existed.
    async fn remove_membership(&self, group_id: &ActorId, user_id: &ActorId) -> Result<bool>;
}
