//! Database schema migrations for SQLite.
//!
//! A simple versioned migration system. Each migration is a SQL batch that
//! transforms the schema from version N to N+1.

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// Idempotent: it can be called multiple times safely.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current < CURRENT_VERSION {
        tracing::info!(from = current, to = CURRENT_VERSION, "migrating vault schema");
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
        }

        tx.commit()?;
    }

    Ok(())
}

fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Protected items and their current key epoch
        CREATE TABLE items (
            item_id TEXT PRIMARY KEY,
            current_epoch INTEGER NOT NULL,
            created_at INTEGER NOT NULL           -- Unix ms
        );

        -- Verifying key of every epoch an item has had
        CREATE TABLE item_keys (
            item_id TEXT NOT NULL,
            epoch INTEGER NOT NULL,
            verifying_key BLOB NOT NULL,          -- 32 bytes, Ed25519
            created_at INTEGER NOT NULL,
            PRIMARY KEY (item_id, epoch)
        );

        -- One wrapped copy of an item's key pair per actor
        CREATE TABLE entries (
            item_id TEXT NOT NULL,
            actor_id TEXT NOT NULL,
            actor_kind TEXT NOT NULL,             -- 'U' or 'G'
            wrapped_read_key BLOB NOT NULL,       -- CBOR envelope
            wrapped_modify_key BLOB,              -- CBOR envelope, NULL for read-only
            key_epoch INTEGER NOT NULL,
            PRIMARY KEY (item_id, actor_id)
        );

        -- Folder tree; root is the sentinel '0'
        CREATE TABLE nodes (
            node_id TEXT PRIMARY KEY,
            parent_id TEXT NOT NULL
        );

        -- Folder-level rules
        CREATE TABLE rules (
            node_id TEXT NOT NULL,
            actor_id TEXT NOT NULL,
            actor_kind TEXT NOT NULL,
            payload BLOB NOT NULL,                -- decision byte or CBOR envelope
            PRIMARY KEY (node_id, actor_id)
        );

        -- RBAC grants
        CREATE TABLE role_grants (
            item_id TEXT NOT NULL,
            actor_id TEXT NOT NULL,
            actor_kind TEXT NOT NULL,
            role TEXT,                            -- single-letter code, nullable
            UNIQUE (item_id, actor_id, role)
        );

        -- Archived payloads, append-only
        CREATE TABLE history (
            item_id TEXT NOT NULL,
            timestamp INTEGER NOT NULL,           -- Unix ms
            key_epoch INTEGER NOT NULL,
            sealed_payload BLOB NOT NULL,         -- CBOR sealed payload
            PRIMARY KEY (item_id, timestamp)
        );

        -- Group membership
        CREATE TABLE memberships (
            group_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            PRIMARY KEY (group_id, user_id)
        );

        CREATE INDEX idx_role_grants_item ON role_grants(item_id, actor_id);
        CREATE INDEX idx_memberships_user ON memberships(user_id);
        "#,
    )?;

    Ok(())
}

/// Current time in milliseconds.
pub(crate) fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
