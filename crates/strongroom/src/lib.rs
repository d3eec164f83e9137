//! # Strongroom
//!
//! The unified API for the Strongroom vault's access-control core.
//!
//! ## Overview
//!
//! Strongroom decides who may read or change a protected item and keeps the
//! item's key material out of reach of everyone else:
//!
//! - **Envelopes**: every item has a key pair, wrapped once per actor under
//!   that actor's public key
//! - **Hierarchy rules**: folder-level ALLOW/DENY resolved from a node to the
//!   root, with group DENY taking precedence
//! - **Roles**: coarse RBAC grants (approver, history viewer) per item
//! - **History**: append-only archive of prior payloads, sealed under the
//!   item's key pair
//!
//! ## Key Concepts
//!
//! - **Entry**: an actor's wrapped copy of an item's key pair. No entry, no
//!   access.
//! - **Epoch**: the generation of an item's key pair. Rotation moves every
//!   entry and all history to the next epoch in one commit.
//! - **Default rule**: the configured decision where no rule bears on a node.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use strongroom::{Vault, VaultConfig};
//! use strongroom::core::{AccessLevel, Actor, ItemId, StaticConfiguration};
//! use strongroom::perms::ActorCredential;
//! use strongroom::store::SqliteStore;
//!
//! async fn example() {
//!     let store = Arc::new(SqliteStore::open("vault.db").unwrap());
//!     let vault = Vault::new(
//!         store.clone(),
//!         store,
//!         Arc::new(StaticConfiguration::new()),
//!         VaultConfig::default(),
//!     );
//!
//!     let alice = ActorCredential::generate();
//!     let item = ItemId::new("db-password");
//!     let keys = vault.register_item(&item).await.unwrap();
//!     vault
//!         .wrap_item_key_for_actor(
//!             &item,
//!             &Actor::user("alice"),
//!             &alice.public_key(),
//!             &keys,
//!             AccessLevel::Modify,
//!         )
//!         .await
//!         .unwrap();
//!
//!     let unwrapped = vault
//!         .unwrap_item_key_for_actor(&item, &"alice".into(), &alice)
//!         .await
//!         .unwrap();
//!     assert_eq!(unwrapped.access_level(), AccessLevel::Modify);
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `strongroom::core` - Identifiers, actors, decisions, roles, rows
//! - `strongroom::perms` - Envelope cryptography
//! - `strongroom::store` - Storage abstraction, SQLite and in-memory

pub mod error;
pub mod hierarchy;
pub mod history;
pub mod roles;
pub mod vault;

// Re-export component crates
pub use strongroom_core as core;
pub use strongroom_perms as perms;
pub use strongroom_store as store;

// Re-export main types for convenience
pub use error::{Result, VaultError};
pub use history::HistoricalPayload;
pub use vault::{Vault, VaultConfig};

// Re-export commonly used types
pub use strongroom_core::{
    AccessControlEntry, AccessLevel, Actor, ActorId, Decision, HistoricalRecord, ItemId, NodeId,
    Role, RoleGrant, RolePermissions,
};
pub use strongroom_perms::{ActorCredential, ActorPublicKey, ItemKeyPair};
