//! # Strongroom Permissions
//!
//! Envelope encryption for the Strongroom vault.
//!
//! ## Overview
//!
//! Every protected item has one key pair. Instead of storing that key pair
//! once, it is wrapped separately for each authorized actor, so only that
//! actor's credential can recover it. This crate holds the cryptography; it
//! performs no I/O.
//!
//! ## Key Concepts
//!
//! - **ActorCredential**: an actor's X25519 private capability
//! - **ItemKeyPair**: a read half (content key) and a modify half (signing key)
//! - **Envelope**: bytes sealed for one actor's public key
//! - **SealedPayload**: a payload encrypted with the read half and signed with
//!   the modify half
//! - **Rule payloads**: a cleartext decision byte, or an envelope readable
//!   only by the user the rule names
//!
//! ## Usage
//!
//! ```rust,no_run
//! use strongroom_core::{AccessLevel, Actor, ItemId};
//! use strongroom_perms::{unwrap_entry, wrap_entry, ActorCredential, ItemKeyPair};
//!
//! let alice = ActorCredential::generate();
//! let keys = ItemKeyPair::generate();
//! let item = ItemId::new("db-password");
//!
//! let entry = wrap_entry(
//!     &item,
//!     &Actor::user("alice"),
//!     &alice.public_key(),
//!     &keys,
//!     AccessLevel::Read,
//!     1,
//! )
//! .unwrap();
//! let recovered = unwrap_entry(&entry, &alice).unwrap();
//! assert_eq!(recovered, keys.read_only());
//! ```

pub mod crypto;
pub mod envelope;
pub mod error;
pub mod keys;
pub mod rule;
pub mod sealed;
pub mod wrap;

pub use crypto::{ActorCredential, ActorPublicKey, EncryptionKey, EncryptionNonce};
pub use envelope::{Envelope, EnvelopeFormat};
pub use error::{PermsError, Result};
pub use keys::{ItemKeyPair, ItemModifyKey, ItemReadKey};
pub use rule::{decode_rule, encode_rule};
pub use sealed::{open_payload, seal_payload, SealedPayload};
pub use wrap::{unwrap_entry, unwrap_with, wrap_entry, wrap_for};
