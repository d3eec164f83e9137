//! # Strongroom Testkit
//!
//! Testing utilities for Strongroom.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: actors with credentials, ready-made vaults over either
//!   backend, and folder chains
//! - **Generators**: Proptest strategies for property-based testing
//!
//! ## Test Fixtures
//!
//! Quickly set up test scenarios:
//!
//! ```rust,no_run
//! use strongroom::core::StaticConfiguration;
//! use strongroom_testkit::fixtures::{memory_vault, TestActor};
//!
//! async fn example() {
//!     let vault = memory_vault(StaticConfiguration::new());
//!     let alice = TestActor::user("alice");
//!     let item = strongroom::ItemId::new("pw");
//!
//!     let keys = vault.register_item(&item).await.unwrap();
//!     alice.grant(&vault, &item, &keys).await.unwrap();
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use strongroom_testkit::generators::{decision, node_chain};
//!
//! proptest! {
//!     #[test]
//!     fn chain_has_no_root(chain in node_chain(8)) {
//!         prop_assert!(chain.iter().all(|n| !n.is_root()));
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{
    build_chain, memory_vault, multi_party_actors, recipients, sqlite_vault, MemoryVault,
    SqliteVault, TestActor,
};
pub use generators::{decision, item_id, node_chain, role, role_code, RuleLayout};
