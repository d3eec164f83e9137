//! SQLite implementation of the store traits.
//!
//! This is the primary storage backend for the vault. It uses rusqlite with
//! bundled SQLite, wrapped in async via `tokio::task::spawn_blocking`. Rows
//! are decoded by column name, never by position.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use strongroom_core::{
    AccessControlEntry, AccessRule, Actor, ActorId, ActorKind, HierarchyNode, HistoricalRecord,
    ItemId, ItemKeyRecord, NodeId, Role, RoleGrant,
};

use crate::error::{Result, StoreError};
use crate::migration::{self, now_millis};
use crate::traits::{InsertResult, KeyRotation, Membership, Store};

/// SQLite-based store implementation.
///
/// Thread-safe via an internal Mutex. Every operation runs on the blocking
/// pool so the async runtime is never stalled on disk I/O.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a closure against the connection on the blocking pool.
    async fn run_blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::Backend(format!("connection mutex poisoned: {}", e)))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Backend(format!("spawn_blocking failed: {}", e)))?
    }

    /// Execute raw SQL. Intended for tests that need rows the typed API
    /// refuses to write.
    #[doc(hidden)]
    pub async fn execute_raw(&self, sql: &'static str) -> Result<usize> {
        self.run_blocking(move |conn| Ok(conn.execute(sql, [])?))
            .await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Row decoding
// ─────────────────────────────────────────────────────────────────────────────

fn conversion_error<E>(row: &Row<'_>, column: &str, ty: Type, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    let index = row.as_ref().column_index(column).unwrap_or(0);
    rusqlite::Error::FromSqlConversionFailure(index, ty, Box::new(err))
}

fn actor_from_row(row: &Row<'_>) -> rusqlite::Result<Actor> {
    let kind: String = row.get("actor_kind")?;
    let id: String = row.get("actor_id")?;
    let kind = ActorKind::from_code(&kind)
        .map_err(|e| conversion_error(row, "actor_kind", Type::Text, e))?;
    Ok(Actor::from_parts(kind, ActorId::new(id)))
}

fn key_from_row(row: &Row<'_>, column: &str) -> rusqlite::Result<[u8; 32]> {
    let bytes: Vec<u8> = row.get(column)?;
    <[u8; 32]>::try_from(bytes.as_slice()).map_err(|_| {
        conversion_error(
            row,
            column,
            Type::Blob,
            StoreError::InvalidData(format!("{} has length {}", column, bytes.len())),
        )
    })
}

fn row_to_item_key(row: &Row<'_>) -> rusqlite::Result<ItemKeyRecord> {
    Ok(ItemKeyRecord {
        item_id: ItemId::new(row.get::<_, String>("item_id")?),
        epoch: row.get::<_, i64>("epoch")? as u64,
        verifying_key: key_from_row(row, "verifying_key")?,
    })
}

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<AccessControlEntry> {
    let wrapped_read_key: Vec<u8> = row.get("wrapped_read_key")?;
    let wrapped_modify_key: Option<Vec<u8>> = row.get("wrapped_modify_key")?;

    Ok(AccessControlEntry::new(
        ItemId::new(row.get::<_, String>("item_id")?),
        actor_from_row(row)?,
        wrapped_read_key,
        wrapped_modify_key.map(Bytes::from),
        row.get::<_, i64>("key_epoch")? as u64,
    ))
}

fn row_to_rule(row: &Row<'_>) -> rusqlite::Result<AccessRule> {
    Ok(AccessRule::new(
        NodeId::new(row.get::<_, String>("node_id")?),
        actor_from_row(row)?,
        row.get::<_, Vec<u8>>("payload")?,
    ))
}

fn row_to_history(row: &Row<'_>) -> rusqlite::Result<HistoricalRecord> {
    Ok(HistoricalRecord::new(
        ItemId::new(row.get::<_, String>("item_id")?),
        row.get("timestamp")?,
        row.get::<_, i64>("key_epoch")? as u64,
        row.get::<_, Vec<u8>>("sealed_payload")?,
    ))
}

fn placeholders(start: usize, count: usize) -> String {
    (start..start + count)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

fn ids_to_strings(ids: &[ActorId]) -> Vec<String> {
    ids.iter().map(|id| id.as_str().to_owned()).collect()
}

fn insert_result(changed: usize) -> InsertResult {
    if changed == 0 {
        InsertResult::AlreadyExists
    } else {
        InsertResult::Inserted
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Store
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl Store for SqliteStore {
    async fn insert_item(
        &self,
        item_id: &ItemId,
        verifying_key: [u8; 32],
    ) -> Result<InsertResult> {
        let item_id = item_id.clone();

        self.run_blocking(move |conn| {
            let tx = conn.transaction()?;
            let now = now_millis();

            let changed = tx.execute(
                "INSERT OR IGNORE INTO items (item_id, current_epoch, created_at)
                 VALUES (?1, 1, ?2)",
                params![item_id.as_str(), now],
            )?;
            if changed == 0 {
                return Ok(InsertResult::AlreadyExists);
            }

            tx.execute(
                "INSERT INTO item_keys (item_id, epoch, verifying_key, created_at)
                 VALUES (?1, 1, ?2, ?3)",
                params![item_id.as_str(), verifying_key.as_slice(), now],
            )?;

            tx.commit()?;
            Ok(InsertResult::Inserted)
        })
        .await
    }

    async fn current_item_key(&self, item_id: &ItemId) -> Result<Option<ItemKeyRecord>> {
        let item_id = item_id.clone();

        self.run_blocking(move |conn| {
            conn.query_row(
                "SELECT k.item_id, k.epoch, k.verifying_key
                 FROM items i
                 JOIN item_keys k ON k.item_id = i.item_id AND k.epoch = i.current_epoch
                 WHERE i.item_id = ?1",
                params![item_id.as_str()],
                row_to_item_key,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn item_key_at(&self, item_id: &ItemId, epoch: u64) -> Result<Option<ItemKeyRecord>> {
        let item_id = item_id.clone();

        self.run_blocking(move |conn| {
            conn.query_row(
                "SELECT item_id, epoch, verifying_key FROM item_keys
                 WHERE item_id = ?1 AND epoch = ?2",
                params![item_id.as_str(), epoch as i64],
                row_to_item_key,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn rotate_item_keys(&self, rotation: &KeyRotation) -> Result<u64> {
        let rotation = rotation.clone();

        self.run_blocking(move |conn| {
            let tx = conn.transaction()?;
            let item = rotation.item_id.as_str();
            let new_epoch = rotation.new_epoch();

            let current: Option<i64> = tx
                .query_row(
                    "SELECT current_epoch FROM items WHERE item_id = ?1",
                    params![item],
                    |row| row.get("current_epoch"),
                )
                .optional()?;
            match current {
                None => {
                    return Err(StoreError::Integrity(format!("unknown item {}", item)));
                }
                Some(epoch) if epoch as u64 != rotation.expected_epoch => {
                    return Err(StoreError::Integrity(format!(
                        "item {} is at epoch {}, rotation expected {}",
                        item, epoch, rotation.expected_epoch
                    )));
                }
                Some(_) => {}
            }

            let stored_actors: BTreeSet<String> = tx
                .prepare("SELECT actor_id FROM entries WHERE item_id = ?1")?
                .query_map(params![item], |row| row.get("actor_id"))?
                .collect::<rusqlite::Result<_>>()?;
            rotation.check_entries(&stored_actors)?;

            let stored_timestamps: BTreeSet<i64> = tx
                .prepare("SELECT timestamp FROM history WHERE item_id = ?1")?
                .query_map(params![item], |row| row.get("timestamp"))?
                .collect::<rusqlite::Result<_>>()?;
            rotation.check_history(&stored_timestamps)?;

            tx.execute(
                "INSERT INTO item_keys (item_id, epoch, verifying_key, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    item,
                    new_epoch as i64,
                    rotation.verifying_key.as_slice(),
                    now_millis()
                ],
            )?;
            tx.execute(
                "UPDATE items SET current_epoch = ?2 WHERE item_id = ?1",
                params![item, new_epoch as i64],
            )?;

            for entry in &rotation.entries {
                tx.execute(
                    "UPDATE entries
                     SET actor_kind = ?3, wrapped_read_key = ?4, wrapped_modify_key = ?5,
                         key_epoch = ?6
                     WHERE item_id = ?1 AND actor_id = ?2",
                    params![
                        item,
                        entry.actor.id().as_str(),
                        entry.actor.kind().code(),
                        &entry.wrapped_read_key[..],
                        entry.wrapped_modify_key.as_deref(),
                        entry.key_epoch as i64,
                    ],
                )?;
            }

            for record in &rotation.history {
                tx.execute(
                    "UPDATE history SET key_epoch = ?3, sealed_payload = ?4
                     WHERE item_id = ?1 AND timestamp = ?2",
                    params![
                        item,
                        record.timestamp,
                        record.key_epoch as i64,
                        &record.sealed_payload[..],
                    ],
                )?;
            }

            tx.commit()?;
            Ok(new_epoch)
        })
        .await
    }

    async fn insert_entry(&self, entry: &AccessControlEntry) -> Result<InsertResult> {
        let entry = entry.clone();

        self.run_blocking(move |conn| {
            let changed = conn.execute(
                "INSERT OR IGNORE INTO entries (
                    item_id, actor_id, actor_kind, wrapped_read_key, wrapped_modify_key, key_epoch
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    entry.item_id.as_str(),
                    entry.actor.id().as_str(),
                    entry.actor.kind().code(),
                    &entry.wrapped_read_key[..],
                    entry.wrapped_modify_key.as_deref(),
                    entry.key_epoch as i64,
                ],
            )?;
            Ok(insert_result(changed))
        })
        .await
    }

    async fn get_entry(
        &self,
        item_id: &ItemId,
        actor_id: &ActorId,
    ) -> Result<Option<AccessControlEntry>> {
        let item_id = item_id.clone();
        let actor_id = actor_id.clone();

        self.run_blocking(move |conn| {
            conn.query_row(
                "SELECT item_id, actor_id, actor_kind, wrapped_read_key, wrapped_modify_key,
                        key_epoch
                 FROM entries WHERE item_id = ?1 AND actor_id = ?2",
                params![item_id.as_str(), actor_id.as_str()],
                row_to_entry,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn delete_entry(&self, item_id: &ItemId, actor_id: &ActorId) -> Result<bool> {
        let item_id = item_id.clone();
        let actor_id = actor_id.clone();

        self.run_blocking(move |conn| {
            let changed = conn.execute(
                "DELETE FROM entries WHERE item_id = ?1 AND actor_id = ?2",
                params![item_id.as_str(), actor_id.as_str()],
            )?;
            Ok(changed > 0)
        })
        .await
    }

    async fn entries_for_item(&self, item_id: &ItemId) -> Result<Vec<AccessControlEntry>> {
        let item_id = item_id.clone();

        self.run_blocking(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT item_id, actor_id, actor_kind, wrapped_read_key, wrapped_modify_key,
                        key_epoch
                 FROM entries WHERE item_id = ?1
                 ORDER BY actor_id",
            )?;
            let entries = stmt
                .query_map(params![item_id.as_str()], row_to_entry)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(entries)
        })
        .await
    }

    async fn insert_node(&self, node: &HierarchyNode) -> Result<InsertResult> {
        let node = node.clone();

        self.run_blocking(move |conn| {
            let changed = conn.execute(
                "INSERT OR IGNORE INTO nodes (node_id, parent_id) VALUES (?1, ?2)",
                params![node.node_id.as_str(), node.parent_id.as_str()],
            )?;
            Ok(insert_result(changed))
        })
        .await
    }

    async fn get_node(&self, node_id: &NodeId) -> Result<Option<HierarchyNode>> {
        let node_id = node_id.clone();

        self.run_blocking(move |conn| {
            conn.query_row(
                "SELECT node_id, parent_id FROM nodes WHERE node_id = ?1",
                params![node_id.as_str()],
                |row| {
                    Ok(HierarchyNode::new(
                        row.get::<_, String>("node_id")?,
                        row.get::<_, String>("parent_id")?,
                    ))
                },
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn put_rule(&self, rule: &AccessRule) -> Result<()> {
        let rule = rule.clone();

        self.run_blocking(move |conn| {
            conn.execute(
                "INSERT INTO rules (node_id, actor_id, actor_kind, payload)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (node_id, actor_id)
                 DO UPDATE SET actor_kind = excluded.actor_kind, payload = excluded.payload",
                params![
                    rule.node_id.as_str(),
                    rule.actor.id().as_str(),
                    rule.actor.kind().code(),
                    &rule.payload[..],
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_rule(&self, node_id: &NodeId, actor_id: &ActorId) -> Result<Option<AccessRule>> {
        let node_id = node_id.clone();
        let actor_id = actor_id.clone();

        self.run_blocking(move |conn| {
            conn.query_row(
                "SELECT node_id, actor_id, actor_kind, payload FROM rules
                 WHERE node_id = ?1 AND actor_id = ?2",
                params![node_id.as_str(), actor_id.as_str()],
                row_to_rule,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn rules_for_actors(
        &self,
        node_id: &NodeId,
        actor_ids: &[ActorId],
    ) -> Result<Vec<AccessRule>> {
        if actor_ids.is_empty() {
            return Ok(Vec::new());
        }
        let node_id = node_id.as_str().to_owned();
        let actor_ids = ids_to_strings(actor_ids);

        self.run_blocking(move |conn| {
            let sql = format!(
                "SELECT node_id, actor_id, actor_kind, payload FROM rules
                 WHERE node_id = ?1 AND actor_id IN ({})
                 ORDER BY actor_id",
                placeholders(2, actor_ids.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let rules = stmt
                .query_map(
                    params_from_iter(std::iter::once(&node_id).chain(actor_ids.iter())),
                    row_to_rule,
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rules)
        })
        .await
    }

    async fn delete_rule(&self, node_id: &NodeId, actor_id: &ActorId) -> Result<bool> {
        let node_id = node_id.clone();
        let actor_id = actor_id.clone();

        self.run_blocking(move |conn| {
            let changed = conn.execute(
                "DELETE FROM rules WHERE node_id = ?1 AND actor_id = ?2",
                params![node_id.as_str(), actor_id.as_str()],
            )?;
            Ok(changed > 0)
        })
        .await
    }

    async fn insert_role_grant(&self, grant: &RoleGrant) -> Result<InsertResult> {
        let grant = grant.clone();

        self.run_blocking(move |conn| {
            let changed = conn.execute(
                "INSERT OR IGNORE INTO role_grants (item_id, actor_id, actor_kind, role)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    grant.item_id.as_str(),
                    grant.actor.id().as_str(),
                    grant.actor.kind().code(),
                    grant.role.code(),
                ],
            )?;
            Ok(insert_result(changed))
        })
        .await
    }

    async fn delete_role_grant(&self, grant: &RoleGrant) -> Result<bool> {
        let grant = grant.clone();

        self.run_blocking(move |conn| {
            let changed = conn.execute(
                "DELETE FROM role_grants WHERE item_id = ?1 AND actor_id = ?2 AND role = ?3",
                params![
                    grant.item_id.as_str(),
                    grant.actor.id().as_str(),
                    grant.role.code(),
                ],
            )?;
            Ok(changed > 0)
        })
        .await
    }

    async fn role_grants_for_item(&self, item_id: &ItemId) -> Result<Vec<RoleGrant>> {
        let item_id = item_id.clone();

        self.run_blocking(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT item_id, actor_id, actor_kind, role FROM role_grants
                 WHERE item_id = ?1 AND role IS NOT NULL
                 ORDER BY actor_id, role",
            )?;
            let rows = stmt
                .query_map(params![item_id.as_str()], |row| {
                    let role: String = row.get("role")?;
                    Ok((
                        ItemId::new(row.get::<_, String>("item_id")?),
                        actor_from_row(row)?,
                        role,
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(rows
                .into_iter()
                .filter_map(|(item, actor, code)| {
                    Role::from_code(&code).map(|role| RoleGrant::new(item, actor, role))
                })
                .collect())
        })
        .await
    }

    async fn role_codes_for(
        &self,
        item_id: &ItemId,
        actor_ids: &[ActorId],
    ) -> Result<Vec<Option<String>>> {
        if actor_ids.is_empty() {
            return Ok(Vec::new());
        }
        let item_id = item_id.as_str().to_owned();
        let actor_ids = ids_to_strings(actor_ids);

        self.run_blocking(move |conn| {
            let sql = format!(
                "SELECT role FROM role_grants WHERE item_id = ?1 AND actor_id IN ({})",
                placeholders(2, actor_ids.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let codes = stmt
                .query_map(
                    params_from_iter(std::iter::once(&item_id).chain(actor_ids.iter())),
                    |row| row.get::<_, Option<String>>("role"),
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(codes)
        })
        .await
    }

    async fn append_history(&self, record: &HistoricalRecord) -> Result<InsertResult> {
        let record = record.clone();

        self.run_blocking(move |conn| {
            let changed = conn.execute(
                "INSERT OR IGNORE INTO history (item_id, timestamp, key_epoch, sealed_payload)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    record.item_id.as_str(),
                    record.timestamp,
                    record.key_epoch as i64,
                    &record.sealed_payload[..],
                ],
            )?;
            Ok(insert_result(changed))
        })
        .await
    }

    async fn history_for_item(&self, item_id: &ItemId) -> Result<Vec<HistoricalRecord>> {
        let item_id = item_id.clone();

        self.run_blocking(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT item_id, timestamp, key_epoch, sealed_payload FROM history
                 WHERE item_id = ?1
                 ORDER BY timestamp",
            )?;
            let records = stmt
                .query_map(params![item_id.as_str()], row_to_history)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(records)
        })
        .await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Membership
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl Membership for SqliteStore {
    async fn groups_of(&self, user_id: &ActorId) -> Result<BTreeSet<ActorId>> {
        let user_id = user_id.clone();

        self.run_blocking(move |conn| {
            let mut stmt =
                conn.prepare("SELECT group_id FROM memberships WHERE user_id = ?1")?;
            let groups = stmt
                .query_map(params![user_id.as_str()], |row| {
                    row.get::<_, String>("group_id").map(ActorId::new)
                })?
                .collect::<rusqlite::Result<BTreeSet<_>>>()?;
            Ok(groups)
        })
        .await
    }

    async fn members_of(&self, group_id: &ActorId) -> Result<BTreeSet<ActorId>> {
        let group_id = group_id.clone();

        self.run_blocking(move |conn| {
            let mut stmt =
                conn.prepare("SELECT user_id FROM memberships WHERE group_id = ?1")?;
            let members = stmt
                .query_map(params![group_id.as_str()], |row| {
                    row.get::<_, String>("user_id").map(ActorId::new)
                })?
                .collect::<rusqlite::Result<BTreeSet<_>>>()?;
            Ok(members)
        })
        .await
    }

    async fn add_membership(&self, group_id: &ActorId, user_id: &ActorId) -> Result<()> {
        let group_id = group_id.clone();
        let user_id = user_id.clone();

        self.run_blocking(move |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO memberships (group_id, user_id) VALUES (?1, ?2)",
                params![group_id.as_str(), user_id.as_str()],
            )?;
            Ok(())
        })
        .await
    }

    async fn remove_membership(&self, group_id: &ActorId, user_id: &ActorId) -> Result<bool> {
        let group_id = group_id.clone();
        let user_id = user_id.clone();

        self.run_blocking(move |conn| {
            let changed = conn.execute(
                "DELETE FROM memberships WHERE group_id = ?1 AND user_id = ?2",
                params![group_id.as_str(), user_id.as_str()],
            )?;
            Ok(changed > 0)
        })
        .await
    }
}
