//! # Strongroom Core
//!
//! Pure types for the Strongroom access-control core: identifiers, the actor
//! variant, access decisions, RBAC roles, configuration options and the shapes
//! of persisted rows.
//!
//! This crate contains no I/O and no cryptography. Key material only appears
//! here as opaque wrapped bytes.
//!
//! ## Key Types
//!
//! - [`ItemId`], [`ActorId`], [`NodeId`] - Opaque identifiers
//! - [`Actor`] - A user or a group
//! - [`Decision`] - The outcome of a hierarchy rule or resolution
//! - [`Role`] / [`RolePermissions`] - Coarse RBAC capabilities
//! - [`AccessControlEntry`] - An actor's wrapped copy of an item's key pair
//! - [`HistoricalRecord`] - An archived, sealed prior payload

pub mod config;
pub mod decision;
pub mod error;
pub mod records;
pub mod role;
pub mod types;

pub use config::{Configuration, ConfigurationOption, StaticConfiguration};
pub use decision::Decision;
pub use error::{CoreError, Result};
pub use records::{
    AccessControlEntry, AccessRule, HierarchyNode, HistoricalRecord, ItemKeyRecord, RoleGrant,
};
pub use role::{Role, RolePermissions};
pub use types::{AccessLevel, Actor, ActorId, ActorKind, ItemId, NodeId};
