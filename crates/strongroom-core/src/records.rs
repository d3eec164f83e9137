//! Persisted row shapes.
//!
//! These are fully-initialized value objects built by constructors. Wrapped
//! key material and rule payloads are opaque bytes here; `strongroom-perms`
//! knows how to open them.

use bytes::Bytes;

use crate::role::Role;
use crate::types::{AccessLevel, Actor, ItemId, NodeId};

/// The binding between one actor and one protected item.
///
/// Holds the actor's wrapped copy of the item's key pair. At most one entry
/// exists per (item, actor).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessControlEntry {
    pub item_id: ItemId,
    pub actor: Actor,
    /// Read half, wrapped for the actor.
    pub wrapped_read_key: Bytes,
    /// Modify half, wrapped for the actor. Absent for read-only entries.
    pub wrapped_modify_key: Option<Bytes>,
    /// Key epoch of the item the halves were wrapped under.
    pub key_epoch: u64,
}

impl AccessControlEntry {
    pub fn new(
        item_id: ItemId,
        actor: Actor,
        wrapped_read_key: impl Into<Bytes>,
        wrapped_modify_key: Option<Bytes>,
        key_epoch: u64,
    ) -> Self {
        Self {
            item_id,
            actor,
            wrapped_read_key: wrapped_read_key.into(),
            wrapped_modify_key,
            key_epoch,
        }
    }

    /// Access level implied by which halves are present.
    pub fn access_level(&self) -> AccessLevel {
        if self.wrapped_modify_key.is_some() {
            AccessLevel::Modify
        } else {
            AccessLevel::Read
        }
    }
}

/// The registered key state of an item at one epoch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemKeyRecord {
    pub item_id: ItemId,
    /// Starts at 1 and increments on every rotation.
    pub epoch: u64,
    /// Ed25519 verifying key matching the epoch's modify half.
    pub verifying_key: [u8; 32],
}

/// A folder in the containment tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchyNode {
    pub node_id: NodeId,
    /// The root sentinel for top-level folders.
    pub parent_id: NodeId,
}

impl HierarchyNode {
    pub fn new(node_id: impl Into<NodeId>, parent_id: impl Into<NodeId>) -> Self {
        Self {
            node_id: node_id.into(),
            parent_id: parent_id.into(),
        }
    }
}

/// A folder-level rule for one actor.
///
/// The payload is either a single cleartext decision byte or a sealed
/// envelope readable only by the user it names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRule {
    pub node_id: NodeId,
    pub actor: Actor,
    pub payload: Bytes,
}

impl AccessRule {
    pub fn new(node_id: NodeId, actor: Actor, payload: impl Into<Bytes>) -> Self {
        Self {
            node_id,
            actor,
            payload: payload.into(),
        }
    }
}

/// An RBAC capability grant.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RoleGrant {
    pub item_id: ItemId,
    pub actor: Actor,
    pub role: Role,
}

impl RoleGrant {
    pub fn new(item_id: ItemId, actor: Actor, role: Role) -> Self {
        Self {
            item_id,
            actor,
            role,
        }
    }
}

/// An archived prior version of an item's payload.
///
/// Append-only. The payload is sealed under the key pair of `key_epoch`.
/// Key rotation re-seals every record under the new pair, which changes only
/// `sealed_payload` and `key_epoch`. The `timestamp` and the plaintext stay as
/// archived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoricalRecord {
    pub item_id: ItemId,
    /// When the archived payload was current (Unix ms).
    pub timestamp: i64,
    pub key_epoch: u64,
    pub sealed_payload: Bytes,
}

impl HistoricalRecord {
    pub fn new(
        item_id: ItemId,
        timestamp: i64,
        key_epoch: u64,
        sealed_payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            item_id,
            timestamp,
            key_epoch,
            sealed_payload: sealed_payload.into(),
        }
    }

    /// Every read of a historical record is audited. Not configurable.
    pub const fn is_loggable(&self) -> bool {
        true
    }
}
