//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::collections::BTreeMap;
use std::sync::Arc;

use strongroom::{Result, Vault, VaultConfig};
use strongroom_core::{
    AccessControlEntry, AccessLevel, Actor, ActorId, ItemId, NodeId, StaticConfiguration,
};
use strongroom_perms::{ActorCredential, ActorPublicKey, ItemKeyPair};
use strongroom_store::{Membership, MemoryStore, SqliteStore, Store};

/// A vault over one in-memory backend.
pub type MemoryVault = Vault<MemoryStore, MemoryStore>;

/// A vault over one SQLite backend.
pub type SqliteVault = Vault<SqliteStore, SqliteStore>;

/// An actor together with its private credential.
#[derive(Debug, Clone)]
pub struct TestActor {
    pub actor: Actor,
    pub credential: ActorCredential,
}

impl TestActor {
    /// A user with a random credential.
    pub fn user(id: &str) -> Self {
        Self {
            actor: Actor::user(id),
            credential: ActorCredential::generate(),
        }
    }

    /// A group with a random credential.
    pub fn group(id: &str) -> Self {
        Self {
            actor: Actor::group(id),
            credential: ActorCredential::generate(),
        }
    }

    /// An actor with a deterministic credential.
    pub fn with_seed(actor: Actor, seed: [u8; 32]) -> Self {
        Self {
            actor,
            credential: ActorCredential::from_bytes(seed),
        }
    }

    pub fn id(&self) -> &ActorId {
        self.actor.id()
    }

    pub fn public_key(&self) -> ActorPublicKey {
        self.credential.public_key()
    }

    /// Wrap `keys` for this actor at the level `keys` carries.
    pub async fn grant<S: Store, M: Membership>(
        &self,
        vault: &Vault<S, M>,
        item_id: &ItemId,
        keys: &ItemKeyPair,
    ) -> Result<AccessControlEntry> {
        vault
            .wrap_item_key_for_actor(
                item_id,
                &self.actor,
                &self.public_key(),
                keys,
                keys.access_level(),
            )
            .await
    }

    /// Wrap only the read half of `keys` for this actor.
    pub async fn grant_read<S: Store, M: Membership>(
        &self,
        vault: &Vault<S, M>,
        item_id: &ItemId,
        keys: &ItemKeyPair,
    ) -> Result<AccessControlEntry> {
        vault
            .wrap_item_key_for_actor(
                item_id,
                &self.actor,
                &self.public_key(),
                &keys.read_only(),
                AccessLevel::Read,
            )
            .await
    }

    /// Recover the item's key pair with this actor's credential.
    pub async fn unwrap<S: Store, M: Membership>(
        &self,
        vault: &Vault<S, M>,
        item_id: &ItemId,
    ) -> Result<ItemKeyPair> {
        vault
            .unwrap_item_key_for_actor(item_id, self.id(), &self.credential)
            .await
    }
}

/// A vault over a fresh in-memory store.
pub fn memory_vault(configuration: StaticConfiguration) -> MemoryVault {
    let store = Arc::new(MemoryStore::new());
    Vault::new(
        store.clone(),
        store,
        Arc::new(configuration),
        VaultConfig::default(),
    )
}

/// A vault over a fresh in-memory SQLite database.
pub fn sqlite_vault(configuration: StaticConfiguration) -> strongroom_store::Result<SqliteVault> {
    let store = Arc::new(SqliteStore::open_memory()?);
    Ok(Vault::new(
        store.clone(),
        store,
        Arc::new(configuration),
        VaultConfig::default(),
    ))
}

/// Create a chain of folders under the root, each the child of the one
/// before. Returns the node IDs in creation order.
pub async fn build_chain<S: Store, M: Membership>(
    vault: &Vault<S, M>,
    names: &[&str],
) -> Result<Vec<NodeId>> {
    let mut parent = NodeId::root();
    let mut chain = Vec::with_capacity(names.len());
    for name in names {
        let node = vault.create_node(&NodeId::new(*name), &parent).await?;
        parent = node.node_id.clone();
        chain.push(node.node_id);
    }
    Ok(chain)
}

/// Public keys of `actors`, keyed by ID, as rotation expects them.
pub fn recipients(actors: &[&TestActor]) -> BTreeMap<ActorId, ActorPublicKey> {
    actors
        .iter()
        .map(|a| (a.id().clone(), a.public_key()))
        .collect()
}

/// Create users with distinct deterministic credentials.
pub fn multi_party_actors(count: usize) -> Vec<TestActor> {
    (0..count)
        .map(|i| {
            let mut seed = [0u8; 32];
            seed[0] = i as u8;
            seed[31] = 0x5a;
            TestActor::with_seed(Actor::user(format!("user-{}", i)), seed)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixture_grant_and_unwrap() {
        let vault = memory_vault(StaticConfiguration::new());
        let alice = TestActor::user("alice");
        let item = ItemId::new("pw");

        let keys = vault.register_item(&item).await.unwrap();
        alice.grant(&vault, &item, &keys).await.unwrap();

        assert_eq!(alice.unwrap(&vault, &item).await.unwrap(), keys);
    }

    #[tokio::test]
    async fn test_build_chain() {
        let vault = sqlite_vault(StaticConfiguration::new()).unwrap();
        let chain = build_chain(&vault, &["a", "b", "c"]).await.unwrap();

        assert_eq!(chain.len(), 3);
        let c = vault.store().get_node(&chain[2]).await.unwrap().unwrap();
        assert_eq!(c.parent_id, chain[1]);
    }

    #[tokio::test]
    async fn test_multi_party() {
        let parties = multi_party_actors(3);

        // Each party has unique keys
        let pks: Vec<_> = parties.iter().map(|p| p.public_key()).collect();
        assert_ne!(pks[0], pks[1]);
        assert_ne!(pks[1], pks[2]);
        assert_ne!(pks[0], pks[2]);
    }
}
