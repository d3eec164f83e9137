//! In-memory implementation of the store traits.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use strongroom_core::{
    AccessControlEntry, AccessRule, ActorId, HierarchyNode, HistoricalRecord, ItemId,
    ItemKeyRecord, NodeId, Role, RoleGrant,
};

use crate::error::{Result, StoreError};
use crate::traits::{InsertResult, KeyRotation, Membership, Store};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Current epoch per item.
    items: BTreeMap<ItemId, u64>,

    /// Verifying keys: (item, epoch) -> key.
    item_keys: BTreeMap<(ItemId, u64), [u8; 32]>,

    /// Entries: (item, actor) -> entry.
    entries: BTreeMap<(ItemId, ActorId), AccessControlEntry>,

    nodes: BTreeMap<NodeId, HierarchyNode>,

    /// Rules: (node, actor) -> rule.
    rules: BTreeMap<(NodeId, ActorId), AccessRule>,

    /// Raw role cells, kept as stored so NULL and unknown codes survive.
    role_grants: Vec<StoredRoleGrant>,

    /// History: (item, timestamp) -> record.
    history: BTreeMap<(ItemId, i64), HistoricalRecord>,

    /// Group -> members.
    memberships: BTreeMap<ActorId, BTreeSet<ActorId>>,
}

#[derive(Clone, PartialEq, Eq)]
struct StoredRoleGrant {
    item_id: ItemId,
    actor: strongroom_core::Actor,
    role: Option<String>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Backend(format!("store lock poisoned: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Backend(format!("store lock poisoned: {}", e)))
    }

    /// Store a role cell verbatim, bypassing role validation.
    #[doc(hidden)]
    pub fn insert_raw_role_code(
        &self,
        item_id: &ItemId,
        actor: &strongroom_core::Actor,
        role: Option<&str>,
    ) -> Result<()> {
        self.write()?.role_grants.push(StoredRoleGrant {
            item_id: item_id.clone(),
            actor: actor.clone(),
            role: role.map(str::to_owned),
        });
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_item(
        &self,
        item_id: &ItemId,
        verifying_key: [u8; 32],
    ) -> Result<InsertResult> {
        let mut inner = self.write()?;

        if inner.items.contains_key(item_id) {
            return Ok(InsertResult::AlreadyExists);
        }
        inner.items.insert(item_id.clone(), 1);
        inner.item_keys.insert((item_id.clone(), 1), verifying_key);

        Ok(InsertResult::Inserted)
    }

    async fn current_item_key(&self, item_id: &ItemId) -> Result<Option<ItemKeyRecord>> {
        let inner = self.read()?;

        let Some(&epoch) = inner.items.get(item_id) else {
            return Ok(None);
        };
        Ok(inner
            .item_keys
            .get(&(item_id.clone(), epoch))
            .map(|key| ItemKeyRecord {
                item_id: item_id.clone(),
                epoch,
                verifying_key: *key,
            }))
    }

    async fn item_key_at(&self, item_id: &ItemId, epoch: u64) -> Result<Option<ItemKeyRecord>> {
        let inner = self.read()?;
        Ok(inner
            .item_keys
            .get(&(item_id.clone(), epoch))
            .map(|key| ItemKeyRecord {
                item_id: item_id.clone(),
                epoch,
                verifying_key: *key,
            }))
    }

    async fn rotate_item_keys(&self, rotation: &KeyRotation) -> Result<u64> {
        let mut inner = self.write()?;
        let item_id = &rotation.item_id;

        match inner.items.get(item_id) {
            None => {
                return Err(StoreError::Integrity(format!("unknown item {}", item_id)));
            }
            Some(&epoch) if epoch != rotation.expected_epoch => {
                return Err(StoreError::Integrity(format!(
                    "item {} is at epoch {}, rotation expected {}",
                    item_id, epoch, rotation.expected_epoch
                )));
            }
            Some(_) => {}
        }

        let stored_actors: BTreeSet<String> = inner
            .entries
            .keys()
            .filter(|(item, _)| item == item_id)
            .map(|(_, actor)| actor.as_str().to_owned())
            .collect();
        rotation.check_entries(&stored_actors)?;

        let stored_timestamps: BTreeSet<i64> = inner
            .history
            .keys()
            .filter(|(item, _)| item == item_id)
            .map(|(_, ts)| *ts)
            .collect();
        rotation.check_history(&stored_timestamps)?;

        let new_epoch = rotation.new_epoch();
        inner.items.insert(item_id.clone(), new_epoch);
        inner
            .item_keys
            .insert((item_id.clone(), new_epoch), rotation.verifying_key);
        for entry in &rotation.entries {
            inner
                .entries
                .insert((item_id.clone(), entry.actor.id().clone()), entry.clone());
        }
        for record in &rotation.history {
            inner
                .history
                .insert((item_id.clone(), record.timestamp), record.clone());
        }

        Ok(new_epoch)
    }

    async fn insert_entry(&self, entry: &AccessControlEntry) -> Result<InsertResult> {
        let mut inner = self.write()?;
        let key = (entry.item_id.clone(), entry.actor.id().clone());

        if inner.entries.contains_key(&key) {
            return Ok(InsertResult::AlreadyExists);
        }
        inner.entries.insert(key, entry.clone());
        Ok(InsertResult::Inserted)
    }

    async fn get_entry(
        &self,
        item_id: &ItemId,
        actor_id: &ActorId,
    ) -> Result<Option<AccessControlEntry>> {
        let inner = self.read()?;
        Ok(inner
            .entries
            .get(&(item_id.clone(), actor_id.clone()))
            .cloned())
    }

    async fn delete_entry(&self, item_id: &ItemId, actor_id: &ActorId) -> Result<bool> {
        let mut inner = self.write()?;
        Ok(inner
            .entries
            .remove(&(item_id.clone(), actor_id.clone()))
            .is_some())
    }

    async fn entries_for_item(&self, item_id: &ItemId) -> Result<Vec<AccessControlEntry>> {
        let inner = self.read()?;
        Ok(inner
            .entries
            .iter()
            .filter(|((item, _), _)| item == item_id)
            .map(|(_, entry)| entry.clone())
            .collect())
    }

    async fn insert_node(&self, node: &HierarchyNode) -> Result<InsertResult> {
        let mut inner = self.write()?;

        if inner.nodes.contains_key(&node.node_id) {
            return Ok(InsertResult::AlreadyExists);
        }
        inner.nodes.insert(node.node_id.clone(), node.clone());
        Ok(InsertResult::Inserted)
    }

    async fn get_node(&self, node_id: &NodeId) -> Result<Option<HierarchyNode>> {
        Ok(self.read()?.nodes.get(node_id).cloned())
    }

    async fn put_rule(&self, rule: &AccessRule) -> Result<()> {
        let mut inner = self.write()?;
        inner.rules.insert(
            (rule.node_id.clone(), rule.actor.id().clone()),
            rule.clone(),
        );
        Ok(())
    }

    async fn get_rule(&self, node_id: &NodeId, actor_id: &ActorId) -> Result<Option<AccessRule>> {
        let inner = self.read()?;
        Ok(inner
            .rules
            .get(&(node_id.clone(), actor_id.clone()))
            .cloned())
    }

    async fn rules_for_actors(
        &self,
        node_id: &NodeId,
        actor_ids: &[ActorId],
    ) -> Result<Vec<AccessRule>> {
        let inner = self.read()?;
        let wanted: BTreeSet<&ActorId> = actor_ids.iter().collect();

        Ok(inner
            .rules
            .iter()
            .filter(|((node, actor), _)| node == node_id && wanted.contains(actor))
            .map(|(_, rule)| rule.clone())
            .collect())
    }

    async fn delete_rule(&self, node_id: &NodeId, actor_id: &ActorId) -> Result<bool> {
        let mut inner = self.write()?;
        Ok(inner
            .rules
            .remove(&(node_id.clone(), actor_id.clone()))
            .is_some())
    }

    async fn insert_role_grant(&self, grant: &RoleGrant) -> Result<InsertResult> {
        let mut inner = self.write()?;
        let stored = StoredRoleGrant {
            item_id: grant.item_id.clone(),
            actor: grant.actor.clone(),
            role: Some(grant.role.code().to_owned()),
        };

        let duplicate = inner.role_grants.iter().any(|g| {
            g.item_id == stored.item_id
                && g.actor.id() == stored.actor.id()
                && g.role == stored.role
        });
        if duplicate {
            return Ok(InsertResult::AlreadyExists);
        }
        inner.role_grants.push(stored);
        Ok(InsertResult::Inserted)
    }

    async fn delete_role_grant(&self, grant: &RoleGrant) -> Result<bool> {
        let mut inner = self.write()?;
        let code = grant.role.code();
        let before = inner.role_grants.len();

        inner.role_grants.retain(|g| {
            !(g.item_id == grant.item_id
                && g.actor.id() == grant.actor.id()
                && g.role.as_deref() == Some(code))
        });
        Ok(inner.role_grants.len() != before)
    }

    async fn role_grants_for_item(&self, item_id: &ItemId) -> Result<Vec<RoleGrant>> {
        let inner = self.read()?;
        let mut grants: Vec<RoleGrant> = inner
            .role_grants
            .iter()
            .filter(|g| &g.item_id == item_id)
            .filter_map(|g| {
                let role = Role::from_code(g.role.as_deref()?)?;
                Some(RoleGrant::new(g.item_id.clone(), g.actor.clone(), role))
            })
            .collect();
        grants.sort();
        Ok(grants)
    }

    async fn role_codes_for(
        &self,
        item_id: &ItemId,
        actor_ids: &[ActorId],
    ) -> Result<Vec<Option<String>>> {
        let inner = self.read()?;
        let wanted: BTreeSet<&ActorId> = actor_ids.iter().collect();

        Ok(inner
            .role_grants
            .iter()
            .filter(|g| &g.item_id == item_id && wanted.contains(g.actor.id()))
            .map(|g| g.role.clone())
            .collect())
    }

    async fn append_history(&self, record: &HistoricalRecord) -> Result<InsertResult> {
        let mut inner = self.write()?;
        let key = (record.item_id.clone(), record.timestamp);

        if inner.history.contains_key(&key) {
            return Ok(InsertResult::AlreadyExists);
        }
        inner.history.insert(key, record.clone());
        Ok(InsertResult::Inserted)
    }

    async fn history_for_item(&self, item_id: &ItemId) -> Result<Vec<HistoricalRecord>> {
        let inner = self.read()?;
        // BTreeMap order is (item, timestamp), so records come out oldest first.
        Ok(inner
            .history
            .iter()
            .filter(|((item, _), _)| item == item_id)
            .map(|(_, record)| record.clone())
            .collect())
    }
}

#[async_trait]
impl Membership for MemoryStore {
    async fn groups_of(&self, user_id: &ActorId) -> Result<BTreeSet<ActorId>> {
        let inner = self.read()?;
        Ok(inner
            .memberships
            .iter()
            .filter(|(_, members)| members.contains(user_id))
            .map(|(group, _)| group.clone())
            .collect())
    }

    async fn members_of(&self, group_id: &ActorId) -> Result<BTreeSet<ActorId>> {
        let inner = self.read()?;
        Ok(inner
            .memberships
            .get(group_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn add_membership(&self, group_id: &ActorId, user_id: &ActorId) -> Result<()> {
        let mut inner = self.write()?;
        inner
            .memberships
            .entry(group_id.clone())
            .or_default()
            .insert(user_id.clone());
        Ok(())
    }

    async fn remove_membership(&self, group_id: &ActorId, user_id: &ActorId) -> Result<bool> {
        let mut inner = self.write()?;
        Ok(inner
            .memberships
            .get_mut(group_id)
            .map(|members| members.remove(user_id))
            .unwrap_or(false))
    }
}
