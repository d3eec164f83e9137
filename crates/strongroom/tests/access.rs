//! Key wrapping, revocation and rotation against both backends.

mod common;

use common::on_both_backends;

use strongroom::core::StaticConfiguration;
use strongroom::store::{Membership, Store};
use strongroom::{AccessLevel, ActorId, ItemId, Vault, VaultError};
use strongroom_testkit::{recipients, TestActor};

async fn modify_round_trip<S, M>(
    make: impl Fn(StaticConfiguration) -> Vault<S, M>,
) -> anyhow::Result<()>
where
    S: Store,
    M: Membership,
{
    let vault = make(StaticConfiguration::new());
    let alice = TestActor::user("alice");
    let item = ItemId::new("db-password");

    let keys = vault.register_item(&item).await?;
    let entry = alice.grant(&vault, &item, &keys).await?;
    assert_eq!(entry.access_level(), AccessLevel::Modify);
    assert_eq!(entry.key_epoch, 1);

    let recovered = alice.unwrap(&vault, &item).await?;
    assert_eq!(recovered, keys);
    assert_eq!(recovered.access_level(), AccessLevel::Modify);
    Ok(())
}

async fn read_only_round_trip<S, M>(
    make: impl Fn(StaticConfiguration) -> Vault<S, M>,
) -> anyhow::Result<()>
where
    S: Store,
    M: Membership,
{
    let vault = make(StaticConfiguration::new());
    let bob = TestActor::user("bob");
    let item = ItemId::new("db-password");

    let keys = vault.register_item(&item).await?;
    let entry = bob.grant_read(&vault, &item, &keys).await?;
    assert!(entry.wrapped_modify_key.is_none());

    let recovered = bob.unwrap(&vault, &item).await?;
    assert_eq!(recovered.access_level(), AccessLevel::Read);
    assert_eq!(recovered, keys.read_only());
    Ok(())
}

async fn wrong_credential_cannot_unwrap<S, M>(
    make: impl Fn(StaticConfiguration) -> Vault<S, M>,
) -> anyhow::Result<()>
where
    S: Store,
    M: Membership,
{
    let vault = make(StaticConfiguration::new());
    let alice = TestActor::user("alice");
    let mallory = TestActor::user("mallory");
    let item = ItemId::new("db-password");

    let keys = vault.register_item(&item).await?;
    alice.grant(&vault, &item, &keys).await?;

    let err = vault
        .unwrap_item_key_for_actor(&item, alice.id(), &mallory.credential)
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::DecryptionFailure(_)), "{err}");
    assert!(err.is_not_authorized());

    // No entry exists for mallory at all.
    let err = mallory.unwrap(&vault, &item).await.unwrap_err();
    assert!(matches!(err, VaultError::AccessDenied(_)), "{err}");
    Ok(())
}

async fn revoke_then_recreate<S, M>(
    make: impl Fn(StaticConfiguration) -> Vault<S, M>,
) -> anyhow::Result<()>
where
    S: Store,
    M: Membership,
{
    let vault = make(StaticConfiguration::new());
    let alice = TestActor::user("alice");
    let item = ItemId::new("db-password");

    let keys = vault.register_item(&item).await?;
    alice.grant(&vault, &item, &keys).await?;

    vault.revoke_access(&item, alice.id()).await?;
    let err = alice.unwrap(&vault, &item).await.unwrap_err();
    assert!(matches!(err, VaultError::AccessDenied(_)), "{err}");
    assert!(vault.access_entry(&item, alice.id()).await?.is_none());

    // Revoking again is a no-op.
    vault.revoke_access(&item, alice.id()).await?;

    alice.grant(&vault, &item, &keys).await?;
    assert_eq!(alice.unwrap(&vault, &item).await?, keys);
    Ok(())
}

async fn duplicates_rejected<S, M>(
    make: impl Fn(StaticConfiguration) -> Vault<S, M>,
) -> anyhow::Result<()>
where
    S: Store,
    M: Membership,
{
    let vault = make(StaticConfiguration::new());
    let alice = TestActor::user("alice");
    let item = ItemId::new("db-password");

    let keys = vault.register_item(&item).await?;
    let err = vault.register_item(&item).await.unwrap_err();
    assert!(matches!(err, VaultError::DuplicateBinding(_)), "{err}");

    alice.grant(&vault, &item, &keys).await?;
    let err = alice.grant_read(&vault, &item, &keys).await.unwrap_err();
    assert!(matches!(err, VaultError::DuplicateBinding(_)), "{err}");

    // The first binding is untouched.
    assert_eq!(alice.unwrap(&vault, &item).await?, keys);
    Ok(())
}

async fn read_only_keys_cannot_grant_modify<S, M>(
    make: impl Fn(StaticConfiguration) -> Vault<S, M>,
) -> anyhow::Result<()>
where
    S: Store,
    M: Membership,
{
    let vault = make(StaticConfiguration::new());
    let alice = TestActor::user("alice");
    let item = ItemId::new("db-password");

    let keys = vault.register_item(&item).await?;
    let err = vault
        .wrap_item_key_for_actor(
            &item,
            &alice.actor,
            &alice.public_key(),
            &keys.read_only(),
            AccessLevel::Modify,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::AccessDenied(_)), "{err}");
    Ok(())
}

async fn unknown_item_denied<S, M>(
    make: impl Fn(StaticConfiguration) -> Vault<S, M>,
) -> anyhow::Result<()>
where
    S: Store,
    M: Membership,
{
    let vault = make(StaticConfiguration::new());
    let alice = TestActor::user("alice");
    let keys = strongroom::ItemKeyPair::generate();
    let item = ItemId::new("never-registered");

    let err = alice.grant(&vault, &item, &keys).await.unwrap_err();
    assert!(matches!(err, VaultError::AccessDenied(_)), "{err}");

    let err = alice.unwrap(&vault, &item).await.unwrap_err();
    assert!(matches!(err, VaultError::AccessDenied(_)), "{err}");
    Ok(())
}

async fn group_entry_unwraps_with_group_credential<S, M>(
    make: impl Fn(StaticConfiguration) -> Vault<S, M>,
) -> anyhow::Result<()>
where
    S: Store,
    M: Membership,
{
    let vault = make(StaticConfiguration::new());
    let ops = TestActor::group("ops");
    let item = ItemId::new("db-password");

    let keys = vault.register_item(&item).await?;
    let entry = ops.grant_read(&vault, &item, &keys).await?;
    assert!(entry.actor.is_group());

    assert_eq!(ops.unwrap(&vault, &item).await?, keys.read_only());
    Ok(())
}

async fn rotation_rewraps_every_entry<S, M>(
    make: impl Fn(StaticConfiguration) -> Vault<S, M>,
) -> anyhow::Result<()>
where
    S: Store,
    M: Membership,
{
    let vault = make(StaticConfiguration::new());
    let alice = TestActor::user("alice");
    let bob = TestActor::user("bob");
    let ops = TestActor::group("ops");
    let item = ItemId::new("db-password");

    let keys = vault.register_item(&item).await?;
    alice.grant(&vault, &item, &keys).await?;
    bob.grant_read(&vault, &item, &keys).await?;
    ops.grant_read(&vault, &item, &keys).await?;

    let new_keys = vault
        .rotate_item_keys(&item, &keys, &recipients(&[&alice, &bob, &ops]))
        .await?;
    assert_ne!(new_keys, keys);

    assert_eq!(alice.unwrap(&vault, &item).await?, new_keys);
    assert_eq!(bob.unwrap(&vault, &item).await?, new_keys.read_only());
    assert_eq!(ops.unwrap(&vault, &item).await?, new_keys.read_only());

    for entry in vault.store().entries_for_item(&item).await? {
        assert_eq!(entry.key_epoch, 2);
    }

    // The retired pair no longer authorizes writes.
    let err = vault
        .rotate_item_keys(&item, &keys, &recipients(&[&alice, &bob, &ops]))
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::AccessDenied(_)), "{err}");
    Ok(())
}

async fn rotation_missing_recipient_changes_nothing<S, M>(
    make: impl Fn(StaticConfiguration) -> Vault<S, M>,
) -> anyhow::Result<()>
where
    S: Store,
    M: Membership,
{
    let vault = make(StaticConfiguration::new());
    let alice = TestActor::user("alice");
    let bob = TestActor::user("bob");
    let item = ItemId::new("db-password");

    let keys = vault.register_item(&item).await?;
    alice.grant(&vault, &item, &keys).await?;
    bob.grant_read(&vault, &item, &keys).await?;

    let err = vault
        .rotate_item_keys(&item, &keys, &recipients(&[&alice]))
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::IntegrityFailure(_)), "{err}");
    assert!(err.is_operational());

    // Both actors still hold the epoch-1 pair.
    assert_eq!(alice.unwrap(&vault, &item).await?, keys);
    assert_eq!(bob.unwrap(&vault, &item).await?, keys.read_only());
    let current = vault
        .store()
        .current_item_key(&item)
        .await?
        .expect("item registered");
    assert_eq!(current.epoch, 1);
    Ok(())
}

async fn rotation_needs_modify_half<S, M>(
    make: impl Fn(StaticConfiguration) -> Vault<S, M>,
) -> anyhow::Result<()>
where
    S: Store,
    M: Membership,
{
    let vault = make(StaticConfiguration::new());
    let bob = TestActor::user("bob");
    let item = ItemId::new("db-password");

    let keys = vault.register_item(&item).await?;
    bob.grant_read(&vault, &item, &keys).await?;

    let read_only = bob.unwrap(&vault, &item).await?;
    let err = vault
        .rotate_item_keys(&item, &read_only, &recipients(&[&bob]))
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::AccessDenied(_)), "{err}");
    Ok(())
}

async fn stale_entry_is_an_integrity_failure<S, M>(
    make: impl Fn(StaticConfiguration) -> Vault<S, M>,
) -> anyhow::Result<()>
where
    S: Store,
    M: Membership,
{
    let vault = make(StaticConfiguration::new());
    let alice = TestActor::user("alice");
    let item = ItemId::new("db-password");

    let keys = vault.register_item(&item).await?;
    let entry = alice.grant(&vault, &item, &keys).await?;
    vault.rotate_item_keys(&item, &keys, &recipients(&[&alice])).await?;

    // Put the epoch-1 entry back behind the vault's back.
    assert!(vault.store().delete_entry(&item, alice.id()).await?);
    assert!(vault.store().insert_entry(&entry).await?.is_inserted());

    let err = alice.unwrap(&vault, &item).await.unwrap_err();
    assert!(matches!(err, VaultError::IntegrityFailure(_)), "{err}");
    Ok(())
}

async fn access_entry_reports_binding<S, M>(
    make: impl Fn(StaticConfiguration) -> Vault<S, M>,
) -> anyhow::Result<()>
where
    S: Store,
    M: Membership,
{
    let vault = make(StaticConfiguration::new());
    let alice = TestActor::user("alice");
    let item = ItemId::new("db-password");

    let keys = vault.register_item(&item).await?;
    assert!(vault.access_entry(&item, alice.id()).await?.is_none());

    let entry = alice.grant(&vault, &item, &keys).await?;
    assert_eq!(vault.access_entry(&item, alice.id()).await?, Some(entry));
    assert!(vault
        .access_entry(&item, &ActorId::new("nobody"))
        .await?
        .is_none());
    Ok(())
}

on_both_backends!(
    modify_round_trip,
    read_only_round_trip,
    wrong_credential_cannot_unwrap,
    revoke_then_recreate,
    duplicates_rejected,
    read_only_keys_cannot_grant_modify,
    unknown_item_denied,
    group_entry_unwraps_with_group_credential,
    rotation_rewraps_every_entry,
    rotation_missing_recipient_changes_nothing,
    rotation_needs_modify_half,
    stale_entry_is_an_integrity_failure,
    access_entry_reports_binding,
);

#[tokio::test]
async fn test_sqlite_bindings_survive_reopen() -> anyhow::Result<()> {
    use std::sync::Arc;

    use strongroom::store::SqliteStore;
    use strongroom::VaultConfig;

    common::init_tracing();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("vault.db");
    let alice = TestActor::user("alice");
    let item = ItemId::new("db-password");

    let open = |path: &std::path::Path| -> anyhow::Result<Vault<SqliteStore, SqliteStore>> {
        let store = Arc::new(SqliteStore::open(path)?);
        Ok(Vault::new(
            store.clone(),
            store,
            Arc::new(StaticConfiguration::new()),
            VaultConfig::default(),
        ))
    };

    let keys = {
        let vault = open(&path)?;
        let keys = vault.register_item(&item).await?;
        alice.grant(&vault, &item, &keys).await?;
        keys
    };

    let vault = open(&path)?;
    assert_eq!(alice.unwrap(&vault, &item).await?, keys);
    Ok(())
}
