//! # Strongroom Store
//!
//! Storage abstraction for the Strongroom vault. Provides trait-based
//! interfaces for persistence and group membership with SQLite and in-memory
//! implementations.
//!
//! ## Overview
//!
//! The vault reaches storage only through the [`Store`] and [`Membership`]
//! traits, so it is storage-agnostic. The primary implementation is
//! [`SqliteStore`], with [`MemoryStore`] for testing.
//!
//! ## Key Types
//!
//! - [`Store`] - Items, entries, hierarchy, role grants and history
//! - [`Membership`] - Group membership expansion
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`KeyRotation`] - Everything one key rotation replaces
//!
//! ## Usage
//!
//! ```rust,no_run
//! use strongroom_core::ItemId;
//! use strongroom_store::{SqliteStore, Store};
//!
//! async fn example() {
//!     let store = SqliteStore::open("vault.db").unwrap();
//!
//!     let key = store.current_item_key(&ItemId::new("db-password")).await.unwrap();
//!     assert!(key.is_none());
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **No overwrites**: inserting a duplicate row returns `AlreadyExists`
//! - **Atomic rotation**: one transaction per rotation, guarded by the
//!   expected key epoch
//! - **Raw role cells**: NULL or unknown role codes are returned as stored;
//!   interpreting them is the caller's concern

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{InsertResult, KeyRotation, Membership, Store};
