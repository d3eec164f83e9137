//! Folder-level access resolution.

mod common;

use std::sync::Arc;

use common::{on_both_backends, with_default};
use proptest::prelude::*;

use strongroom::core::{HierarchyNode, StaticConfiguration};
use strongroom::store::{Membership, MemoryStore, Store};
use strongroom::{Actor, ActorId, Decision, NodeId, Vault, VaultConfig, VaultError};
use strongroom_testkit::{build_chain, memory_vault, RuleLayout, TestActor};

async fn root_and_none_always_allow<S, M>(
    make: impl Fn(StaticConfiguration) -> Vault<S, M>,
) -> anyhow::Result<()>
where
    S: Store,
    M: Membership,
{
    let vault = make(with_default(Decision::Denied));
    let user = ActorId::new("alice");

    vault
        .set_hierarchy_rule(&NodeId::root(), &Actor::group("ops"), Decision::Denied, None)
        .await?;
    vault.membership().add_membership(&"ops".into(), &user).await?;

    for recurse in [false, true] {
        assert_eq!(
            vault.resolve_hierarchy_access(None, &user, None, recurse).await?,
            Decision::Allowed
        );
        assert_eq!(
            vault
                .resolve_hierarchy_access(Some(&NodeId::root()), &user, None, recurse)
                .await?,
            Decision::Allowed
        );
    }
    Ok(())
}

async fn no_rules_fall_back_to_default<S, M>(
    make: impl Fn(StaticConfiguration) -> Vault<S, M>,
) -> anyhow::Result<()>
where
    S: Store,
    M: Membership,
{
    let user = ActorId::new("alice");

    for default in [Decision::Allowed, Decision::Denied] {
        let vault = make(with_default(default));
        let chain = build_chain(&vault, &["a", "b", "c"]).await?;

        for recurse in [false, true] {
            assert_eq!(
                vault
                    .resolve_hierarchy_access(Some(&chain[2]), &user, None, recurse)
                    .await?,
                default
            );
        }
    }

    // Unset and unrecognized values both mean ALLOW.
    let vault = make(StaticConfiguration::new());
    let chain = build_chain(&vault, &["a"]).await?;
    assert_eq!(vault.default_decision(), Decision::Allowed);
    assert_eq!(
        vault
            .resolve_hierarchy_access(Some(&chain[0]), &user, None, true)
            .await?,
        Decision::Allowed
    );

    let vault = make(StaticConfiguration::new().with(
        strongroom::core::ConfigurationOption::DefaultHierarchyAccessRule,
        "maybe",
    ));
    assert_eq!(vault.default_decision(), Decision::Allowed);
    Ok(())
}

async fn group_deny_beats_direct_allow<S, M>(
    make: impl Fn(StaticConfiguration) -> Vault<S, M>,
) -> anyhow::Result<()>
where
    S: Store,
    M: Membership,
{
    let vault = make(with_default(Decision::Allowed));
    let user = ActorId::new("alice");
    let chain = build_chain(&vault, &["a"]).await?;

    vault.membership().add_membership(&"ops".into(), &user).await?;
    vault.membership().add_membership(&"dev".into(), &user).await?;
    vault
        .set_hierarchy_rule(&chain[0], &Actor::group("dev"), Decision::Allowed, None)
        .await?;
    vault
        .set_hierarchy_rule(&chain[0], &Actor::group("ops"), Decision::Denied, None)
        .await?;
    vault
        .set_hierarchy_rule(&chain[0], &Actor::user("alice"), Decision::Allowed, None)
        .await?;

    for recurse in [false, true] {
        assert_eq!(
            vault
                .resolve_hierarchy_access(Some(&chain[0]), &user, None, recurse)
                .await?,
            Decision::Denied
        );
    }
    Ok(())
}

async fn direct_allow_overrides_default_deny<S, M>(
    make: impl Fn(StaticConfiguration) -> Vault<S, M>,
) -> anyhow::Result<()>
where
    S: Store,
    M: Membership,
{
    let vault = make(with_default(Decision::Denied));
    let user = ActorId::new("alice");
    let chain = build_chain(&vault, &["a", "b"]).await?;

    vault
        .set_hierarchy_rule(&chain[1], &Actor::user("alice"), Decision::Allowed, None)
        .await?;

    for recurse in [false, true] {
        assert_eq!(
            vault
                .resolve_hierarchy_access(Some(&chain[1]), &user, None, recurse)
                .await?,
            Decision::Allowed
        );
    }

    // Another user's rule does not apply.
    assert_eq!(
        vault
            .resolve_hierarchy_access(Some(&chain[1]), &"bob".into(), None, true)
            .await?,
        Decision::Denied
    );
    Ok(())
}

async fn direct_deny_below_group_allow<S, M>(
    make: impl Fn(StaticConfiguration) -> Vault<S, M>,
) -> anyhow::Result<()>
where
    S: Store,
    M: Membership,
{
    // root -> A -> B -> C; G1 allows A; the user denies themself B.
    let vault = make(with_default(Decision::Allowed));
    let user = ActorId::new("alice");
    let chain = build_chain(&vault, &["A", "B", "C"]).await?;

    vault.membership().add_membership(&"G1".into(), &user).await?;
    vault
        .set_hierarchy_rule(&chain[0], &Actor::group("G1"), Decision::Allowed, None)
        .await?;
    vault
        .set_hierarchy_rule(&chain[1], &Actor::user("alice"), Decision::Denied, None)
        .await?;

    assert_eq!(
        vault
            .resolve_hierarchy_access(Some(&chain[2]), &user, None, true)
            .await?,
        Decision::Denied
    );

    // Without recursion only C itself is consulted.
    assert_eq!(
        vault
            .resolve_hierarchy_access(Some(&chain[2]), &user, None, false)
            .await?,
        Decision::Allowed
    );
    Ok(())
}

async fn group_allow_checks_ancestors<S, M>(
    make: impl Fn(StaticConfiguration) -> Vault<S, M>,
) -> anyhow::Result<()>
where
    S: Store,
    M: Membership,
{
    let vault = make(with_default(Decision::Denied));
    let user = ActorId::new("alice");
    let chain = build_chain(&vault, &["a", "b"]).await?;

    vault.membership().add_membership(&"ops".into(), &user).await?;
    vault
        .set_hierarchy_rule(&chain[1], &Actor::group("ops"), Decision::Allowed, None)
        .await?;

    // b is no more reachable than a, which falls to the default DENY.
    let parent = vault
        .resolve_hierarchy_access(Some(&chain[0]), &user, None, true)
        .await?;
    let child = vault
        .resolve_hierarchy_access(Some(&chain[1]), &user, None, true)
        .await?;
    assert_eq!(parent, Decision::Denied);
    assert_eq!(child, Decision::Denied);
    assert_eq!(
        vault
            .resolve_hierarchy_access(Some(&chain[1]), &user, None, false)
            .await?,
        Decision::Allowed
    );

    // Once a is allowed too, b follows.
    vault
        .set_hierarchy_rule(&chain[0], &Actor::group("ops"), Decision::Allowed, None)
        .await?;
    assert_eq!(
        vault
            .resolve_hierarchy_access(Some(&chain[1]), &user, None, true)
            .await?,
        Decision::Allowed
    );
    vault.remove_hierarchy_rule(&chain[0], &"ops".into()).await?;
    vault
        .set_hierarchy_rule(&chain[0], &Actor::user("alice"), Decision::Allowed, None)
        .await?;
    assert_eq!(
        vault
            .resolve_hierarchy_access(Some(&chain[1]), &user, None, true)
            .await?,
        Decision::Allowed
    );
    vault.remove_hierarchy_rule(&chain[0], &user).await?;

    vault
        .set_hierarchy_rule(&chain[0], &Actor::group("ops"), Decision::Denied, None)
        .await?;
    assert_eq!(
        vault
            .resolve_hierarchy_access(Some(&chain[1]), &user, None, true)
            .await?,
        Decision::Denied
    );
    assert_eq!(
        vault
            .resolve_hierarchy_access(Some(&chain[1]), &user, None, false)
            .await?,
        Decision::Allowed
    );

    // Leaving the group leaves the user with the default.
    vault.membership().remove_membership(&"ops".into(), &user).await?;
    assert_eq!(
        vault
            .resolve_hierarchy_access(Some(&chain[1]), &user, None, true)
            .await?,
        Decision::Denied
    );
    Ok(())
}

async fn sealed_user_rule_needs_its_credential<S, M>(
    make: impl Fn(StaticConfiguration) -> Vault<S, M>,
) -> anyhow::Result<()>
where
    S: Store,
    M: Membership,
{
    let vault = make(with_default(Decision::Allowed));
    let alice = TestActor::user("alice");
    let bob = TestActor::user("bob");
    let chain = build_chain(&vault, &["a"]).await?;

    vault
        .set_hierarchy_rule(
            &chain[0],
            &alice.actor,
            Decision::Denied,
            Some(&alice.public_key()),
        )
        .await?;

    assert_eq!(
        vault
            .resolve_hierarchy_access(Some(&chain[0]), alice.id(), Some(&alice.credential), true)
            .await?,
        Decision::Denied
    );

    let err = vault
        .resolve_hierarchy_access(Some(&chain[0]), alice.id(), None, true)
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::DecryptionFailure(_)), "{err}");

    let err = vault
        .resolve_hierarchy_access(Some(&chain[0]), alice.id(), Some(&bob.credential), true)
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::DecryptionFailure(_)), "{err}");
    Ok(())
}

async fn no_opinion_rule_counts_as_no_rule<S, M>(
    make: impl Fn(StaticConfiguration) -> Vault<S, M>,
) -> anyhow::Result<()>
where
    S: Store,
    M: Membership,
{
    let vault = make(with_default(Decision::Denied));
    let user = ActorId::new("alice");
    let chain = build_chain(&vault, &["a", "b"]).await?;

    vault
        .set_hierarchy_rule(&chain[0], &Actor::user("alice"), Decision::Allowed, None)
        .await?;
    vault
        .store()
        .put_rule(&strongroom::core::AccessRule::new(
            chain[1].clone(),
            Actor::user("alice"),
            vec![Decision::NO_OPINION_BYTE],
        ))
        .await?;

    assert_eq!(
        vault
            .resolve_hierarchy_access(Some(&chain[1]), &user, None, true)
            .await?,
        Decision::Allowed
    );
    assert_eq!(
        vault
            .resolve_hierarchy_access(Some(&chain[1]), &user, None, false)
            .await?,
        Decision::Denied
    );
    Ok(())
}

async fn malformed_rule_byte_is_an_encoding_failure<S, M>(
    make: impl Fn(StaticConfiguration) -> Vault<S, M>,
) -> anyhow::Result<()>
where
    S: Store,
    M: Membership,
{
    let vault = make(StaticConfiguration::new());
    let user = ActorId::new("alice");
    let chain = build_chain(&vault, &["a"]).await?;

    vault
        .store()
        .put_rule(&strongroom::core::AccessRule::new(
            chain[0].clone(),
            Actor::user("alice"),
            vec![0x7f],
        ))
        .await?;

    let err = vault
        .resolve_hierarchy_access(Some(&chain[0]), &user, None, false)
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::EncodingFailure(_)), "{err}");
    Ok(())
}

async fn removing_a_rule_restores_default<S, M>(
    make: impl Fn(StaticConfiguration) -> Vault<S, M>,
) -> anyhow::Result<()>
where
    S: Store,
    M: Membership,
{
    let vault = make(with_default(Decision::Allowed));
    let user = ActorId::new("alice");
    let chain = build_chain(&vault, &["a"]).await?;

    vault
        .set_hierarchy_rule(&chain[0], &Actor::user("alice"), Decision::Denied, None)
        .await?;
    assert_eq!(
        vault
            .resolve_hierarchy_access(Some(&chain[0]), &user, None, true)
            .await?,
        Decision::Denied
    );

    // Setting again replaces.
    vault
        .set_hierarchy_rule(&chain[0], &Actor::user("alice"), Decision::Allowed, None)
        .await?;
    assert_eq!(
        vault
            .resolve_hierarchy_access(Some(&chain[0]), &user, None, true)
            .await?,
        Decision::Allowed
    );

    vault
        .set_hierarchy_rule(&chain[0], &Actor::user("alice"), Decision::Denied, None)
        .await?;
    vault.remove_hierarchy_rule(&chain[0], &user).await?;
    vault.remove_hierarchy_rule(&chain[0], &user).await?;
    assert_eq!(
        vault
            .resolve_hierarchy_access(Some(&chain[0]), &user, None, true)
            .await?,
        Decision::Allowed
    );
    Ok(())
}

async fn broken_chains_are_integrity_failures<S, M>(
    make: impl Fn(StaticConfiguration) -> Vault<S, M>,
) -> anyhow::Result<()>
where
    S: Store,
    M: Membership,
{
    let vault = make(StaticConfiguration::new());
    let user = ActorId::new("alice");

    let err = vault
        .resolve_hierarchy_access(Some(&NodeId::new("ghost")), &user, None, true)
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::IntegrityFailure(_)), "{err}");

    // A parent pointing at a node that was never created.
    vault
        .store()
        .insert_node(&HierarchyNode::new("orphan", "missing"))
        .await?;
    let err = vault
        .resolve_hierarchy_access(Some(&NodeId::new("orphan")), &user, None, true)
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::IntegrityFailure(_)), "{err}");

    // x -> y -> x
    vault.store().insert_node(&HierarchyNode::new("x", "y")).await?;
    vault.store().insert_node(&HierarchyNode::new("y", "x")).await?;
    let err = vault
        .resolve_hierarchy_access(Some(&NodeId::new("x")), &user, None, true)
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::IntegrityFailure(_)), "{err}");
    Ok(())
}

async fn node_creation_is_checked<S, M>(
    make: impl Fn(StaticConfiguration) -> Vault<S, M>,
) -> anyhow::Result<()>
where
    S: Store,
    M: Membership,
{
    let vault = make(StaticConfiguration::new());
    let chain = build_chain(&vault, &["a", "b"]).await?;

    // Same parent is a no-op, a different parent is refused.
    vault.create_node(&chain[1], &chain[0]).await?;
    let err = vault.create_node(&chain[1], &NodeId::root()).await.unwrap_err();
    assert!(matches!(err, VaultError::IntegrityFailure(_)), "{err}");

    let err = vault
        .create_node(&NodeId::new("c"), &NodeId::new("missing"))
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::IntegrityFailure(_)), "{err}");

    let err = vault
        .create_node(&NodeId::root(), &chain[0])
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::IntegrityFailure(_)), "{err}");

    let err = vault
        .set_hierarchy_rule(&NodeId::new("missing"), &Actor::user("alice"), Decision::Allowed, None)
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::IntegrityFailure(_)), "{err}");
    Ok(())
}

on_both_backends!(
    root_and_none_always_allow,
    no_rules_fall_back_to_default,
    group_deny_beats_direct_allow,
    direct_allow_overrides_default_deny,
    direct_deny_below_group_allow,
    group_allow_checks_ancestors,
    sealed_user_rule_needs_its_credential,
    no_opinion_rule_counts_as_no_rule,
    malformed_rule_byte_is_an_encoding_failure,
    removing_a_rule_restores_default,
    broken_chains_are_integrity_failures,
    node_creation_is_checked,
);

#[tokio::test]
async fn test_depth_guard() -> anyhow::Result<()> {
    common::init_tracing();
    let store = Arc::new(MemoryStore::new());
    let vault = Vault::new(
        store.clone(),
        store,
        Arc::new(StaticConfiguration::new()),
        VaultConfig {
            max_hierarchy_depth: 2,
        },
    );
    let chain = build_chain(&vault, &["a", "b", "c"]).await?;
    let user = ActorId::new("alice");

    let err = vault
        .resolve_hierarchy_access(Some(&chain[2]), &user, None, true)
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::IntegrityFailure(_)), "{err}");

    assert_eq!(
        vault
            .resolve_hierarchy_access(Some(&chain[1]), &user, None, true)
            .await?,
        Decision::Allowed
    );
    Ok(())
}

async fn resolve_layout(layout: &RuleLayout) -> strongroom::Result<Decision> {
    let vault = memory_vault(with_default(layout.default));
    let user = ActorId::new("u");
    vault.membership().add_membership(&"g".into(), &user).await?;

    let names: Vec<String> = (0..layout.group.len()).map(|i| format!("n{}", i)).collect();
    let names: Vec<&str> = names.iter().map(String::as_str).collect();
    let chain = build_chain(&vault, &names).await?;

    for (level, node) in chain.iter().enumerate() {
        if let Some(decision) = layout.group[level] {
            vault
                .set_hierarchy_rule(node, &Actor::group("g"), decision, None)
                .await?;
        }
        if let Some(decision) = layout.user[level] {
            vault
                .set_hierarchy_rule(node, &Actor::user("u"), decision, None)
                .await?;
        }
    }

    vault
        .resolve_hierarchy_access(chain.last(), &user, None, true)
        .await
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_resolution_matches_rule_layout(layout: RuleLayout) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let resolved = runtime.block_on(resolve_layout(&layout)).unwrap();
        prop_assert_eq!(resolved, layout.expected());
    }
}
