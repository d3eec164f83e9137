//! Folder-level access resolution.
//!
//! Resolution walks from a node towards the root. At each node:
//!
//! 1. any group DENY held by one of the user's groups denies outright;
//! 2. otherwise any group ALLOW allows this level, and with `recurse` the walk
//!    continues at the parent;
//! 3. otherwise the user's own rule decides, with no further walking;
//! 4. otherwise there is no rule here. With `recurse` the walk continues at
//!    the parent, without it the configured default decides.
//!
//! Starting at the root always allows. A group ALLOW only holds if the parent
//! resolves to ALLOWED on its own, so a walk that climbs to the root allows
//! when the level just below the root was allowed by a group, and falls back
//! to the configured default when it had no rule. A rule byte of "no opinion"
//! counts as no rule.

use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use strongroom_core::{
    AccessRule, Actor, ActorId, ConfigurationOption, Decision, HierarchyNode, NodeId,
};
use strongroom_perms::{decode_rule, encode_rule, ActorCredential, ActorPublicKey};
use strongroom_store::{InsertResult, Membership, Store};

use crate::error::{Result, VaultError};
use crate::vault::Vault;

/// Outcome of evaluating the rules on a single node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeStep {
    /// Resolution ends here.
    Decided(Decision),
    /// A group allows this level; ancestors may still deny.
    GroupAllowed,
    /// Nothing bears on this level.
    NoRule,
}

impl<S: Store, M: Membership> Vault<S, M> {
    /// Create a folder under `parent`.
    ///
    /// Re-creating an existing node under the same parent is a no-op.
    pub async fn create_node(&self, node_id: &NodeId, parent: &NodeId) -> Result<HierarchyNode> {
        if node_id.is_root() {
            return Err(VaultError::IntegrityFailure(
                "the root node cannot be created".into(),
            ));
        }
        if !parent.is_root() && self.store.get_node(parent).await?.is_none() {
            return Err(VaultError::IntegrityFailure(format!(
                "parent {} of {} does not exist",
                parent, node_id
            )));
        }

        let node = HierarchyNode::new(node_id.clone(), parent.clone());
        match self.store.insert_node(&node).await? {
            InsertResult::Inserted => {
                debug!(node = %node_id, parent = %parent, "created node");
                Ok(node)
            }
            InsertResult::AlreadyExists => {
                let existing = self.store.get_node(node_id).await?.ok_or_else(|| {
                    VaultError::IntegrityFailure(format!("node {} vanished", node_id))
                })?;
                if existing.parent_id != node.parent_id {
                    return Err(VaultError::IntegrityFailure(format!(
                        "node {} already exists under {}",
                        node_id, existing.parent_id
                    )));
                }
                Ok(existing)
            }
        }
    }

    /// Set the rule an actor holds on a node, replacing any previous one.
    ///
    /// With `sealed_for`, a user rule is stored so that only that user's
    /// credential can read it. Group rules are always stored in the clear.
    pub async fn set_hierarchy_rule(
        &self,
        node_id: &NodeId,
        actor: &Actor,
        decision: Decision,
        sealed_for: Option<&ActorPublicKey>,
    ) -> Result<()> {
        if !node_id.is_root() && self.store.get_node(node_id).await?.is_none() {
            return Err(VaultError::IntegrityFailure(format!(
                "rule on unknown node {}",
                node_id
            )));
        }

        let payload = encode_rule(node_id, actor, decision, sealed_for)?;
        self.store
            .put_rule(&AccessRule::new(node_id.clone(), actor.clone(), payload))
            .await?;

        info!(node = %node_id, actor = %actor, ?decision, "set hierarchy rule");
        Ok(())
    }

    /// Remove an actor's rule on a node. No-op if absent.
    pub async fn remove_hierarchy_rule(&self, node_id: &NodeId, actor_id: &ActorId) -> Result<()> {
        let existed = self.store.delete_rule(node_id, actor_id).await?;
        info!(node = %node_id, actor = %actor_id, existed, "removed hierarchy rule");
        Ok(())
    }

    /// Decide whether `user_id` may reach `node_id`.
    ///
    /// `None` and the root sentinel always resolve to ALLOWED. `credential`
    /// is the user's own credential, needed only to read sealed user rules.
    pub async fn resolve_hierarchy_access(
        &self,
        node_id: Option<&NodeId>,
        user_id: &ActorId,
        credential: Option<&ActorCredential>,
        recurse: bool,
    ) -> Result<Decision> {
        let Some(start) = node_id else {
            return Ok(Decision::Allowed);
        };

        let groups: Vec<ActorId> = self
            .membership
            .groups_of(user_id)
            .await?
            .into_iter()
            .collect();

        let mut visited = BTreeSet::new();
        let mut current = start.clone();
        // Whether the most recently visited level was allowed by a group.
        let mut group_allowed_below = false;

        loop {
            if current.is_root() {
                let decision = if group_allowed_below || visited.is_empty() {
                    Decision::Allowed
                } else {
                    self.default_decision()
                };
                debug!(node = %start, user = %user_id, ?decision, "reached root");
                return Ok(decision);
            }
            if visited.len() >= self.config.max_hierarchy_depth {
                warn!(node = %start, depth = visited.len(), "hierarchy too deep");
                return Err(VaultError::IntegrityFailure(format!(
                    "ancestors of {} exceed depth {}",
                    start, self.config.max_hierarchy_depth
                )));
            }
            if !visited.insert(current.clone()) {
                warn!(node = %start, at = %current, "hierarchy cycle");
                return Err(VaultError::IntegrityFailure(format!(
                    "cycle through {} above {}",
                    current, start
                )));
            }

            // Walking needs the parent link, so a missing node is a broken chain.
            let parent = if recurse {
                let node = self.store.get_node(&current).await?.ok_or_else(|| {
                    warn!(node = %current, "broken parent chain");
                    VaultError::IntegrityFailure(format!("node {} does not exist", current))
                })?;
                Some(node.parent_id)
            } else {
                None
            };

            let step = self
                .evaluate_node(&current, user_id, credential, &groups)
                .await?;
            match (step, parent) {
                (NodeStep::Decided(decision), _) => {
                    debug!(node = %current, user = %user_id, ?decision, "resolved");
                    return Ok(decision);
                }
                (NodeStep::GroupAllowed, Some(parent)) => {
                    debug!(node = %current, parent = %parent, "group allows, checking parent");
                    group_allowed_below = true;
                    current = parent;
                }
                (NodeStep::NoRule, Some(parent)) => {
                    debug!(node = %current, parent = %parent, "no rule, checking parent");
                    group_allowed_below = false;
                    current = parent;
                }
                (NodeStep::GroupAllowed, None) => return Ok(Decision::Allowed),
                (NodeStep::NoRule, None) => return Ok(self.default_decision()),
            }
        }
    }

    async fn evaluate_node(
        &self,
        node_id: &NodeId,
        user_id: &ActorId,
        credential: Option<&ActorCredential>,
        groups: &[ActorId],
    ) -> Result<NodeStep> {
        let mut group_allowed = false;
        for rule in self.store.rules_for_actors(node_id, groups).await? {
            if !rule.actor.is_group() {
                continue;
            }
            match decode_rule(node_id, &rule.actor, &rule.payload, None)? {
                Some(Decision::Denied) => {
                    debug!(node = %node_id, group = %rule.actor.id(), "group denies");
                    return Ok(NodeStep::Decided(Decision::Denied));
                }
                Some(Decision::Allowed) => group_allowed = true,
                None => {}
            }
        }
        if group_allowed {
            return Ok(NodeStep::GroupAllowed);
        }

        if let Some(rule) = self.store.get_rule(node_id, user_id).await? {
            if !rule.actor.is_group() {
                if let Some(decision) =
                    decode_rule(node_id, &rule.actor, &rule.payload, credential)?
                {
                    return Ok(NodeStep::Decided(decision));
                }
            }
        }

        Ok(NodeStep::NoRule)
    }

    /// The configured decision when no rule bears on a node.
    pub fn default_decision(&self) -> Decision {
        let value = self
            .configuration
            .value_or_default(ConfigurationOption::DefaultHierarchyAccessRule);
        Decision::from_config_value(Some(&value))
    }
}
