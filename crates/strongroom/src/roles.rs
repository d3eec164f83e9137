//! RBAC grants on items.
//!
//! Grants are plain rows with no cryptography behind them. The store never
//! expands group membership; [`Vault::effective_permissions`] does that for
//! callers asking about a single user.

use std::collections::BTreeSet;

use tracing::{debug, info};

use strongroom_core::{Actor, ActorId, ItemId, Role, RoleGrant, RolePermissions};
use strongroom_store::{InsertResult, Membership, Store};

use crate::error::{Result, VaultError};
use crate::vault::Vault;

impl<S: Store, M: Membership> Vault<S, M> {
    /// Grant `role` on an item to an actor.
    pub async fn grant_role(&self, item_id: &ItemId, actor: &Actor, role: Role) -> Result<RoleGrant> {
        let grant = RoleGrant::new(item_id.clone(), actor.clone(), role);

        match self.store.insert_role_grant(&grant).await? {
            InsertResult::Inserted => {
                info!(item = %item_id, actor = %actor, role = role.code(), "granted role");
                Ok(grant)
            }
            InsertResult::AlreadyExists => Err(VaultError::DuplicateGrant(format!(
                "{} already holds {} on {}",
                actor,
                role.code(),
                item_id
            ))),
        }
    }

    /// Revoke a grant. No-op if absent.
    pub async fn revoke_role(&self, item_id: &ItemId, actor: &Actor, role: Role) -> Result<()> {
        let grant = RoleGrant::new(item_id.clone(), actor.clone(), role);
        let existed = self.store.delete_role_grant(&grant).await?;
        info!(item = %item_id, actor = %actor, role = role.code(), existed, "revoked role");
        Ok(())
    }

    /// Every grant on an item. Rows with unknown role codes are not listed.
    pub async fn list_roles_for_item(&self, item_id: &ItemId) -> Result<BTreeSet<RoleGrant>> {
        Ok(self
            .store
            .role_grants_for_item(item_id)
            .await?
            .into_iter()
            .collect())
    }

    /// Aggregate the capabilities the given actors hold on an item.
    ///
    /// The actor set is taken as is. An empty set holds nothing.
    pub async fn get_permissions(
        &self,
        item_id: &ItemId,
        actor_ids: &BTreeSet<ActorId>,
    ) -> Result<RolePermissions> {
        if actor_ids.is_empty() {
            return Ok(RolePermissions::NONE);
        }
        let actor_ids: Vec<ActorId> = actor_ids.iter().cloned().collect();
        let codes = self.store.role_codes_for(item_id, &actor_ids).await?;
        let permissions = RolePermissions::from_role_codes(codes);

        debug!(
            item = %item_id,
            actors = actor_ids.len(),
            can_approve = permissions.can_approve,
            can_view_history = permissions.can_view_history,
            "collected role permissions"
        );
        Ok(permissions)
    }

    /// Capabilities of a user through their own grants and those of every
    /// group they belong to.
    pub async fn effective_permissions(
        &self,
        item_id: &ItemId,
        user_id: &ActorId,
    ) -> Result<RolePermissions> {
        let mut actors = self.membership.groups_of(user_id).await?;
        actors.insert(user_id.clone());
        self.get_permissions(item_id, &actors).await
    }

    /// Users able to approve restricted access to an item, directly or as a
    /// member of an approver group.
    pub async fn approvers_for(&self, item_id: &ItemId) -> Result<BTreeSet<ActorId>> {
        let mut approvers = BTreeSet::new();
        for grant in self.store.role_grants_for_item(item_id).await? {
            if grant.role != Role::Approver {
                continue;
            }
            match &grant.actor {
                Actor::User(id) => {
                    approvers.insert(id.clone());
                }
                Actor::Group(id) => {
                    approvers.extend(self.membership.members_of(id).await?);
                }
            }
        }
        Ok(approvers)
    }
}
