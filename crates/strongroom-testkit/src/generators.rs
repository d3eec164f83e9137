//! Proptest generators for property-based testing.

use proptest::prelude::*;

use strongroom_core::{Decision, ItemId, NodeId, Role};

/// Generate an item ID.
pub fn item_id() -> impl Strategy<Value = ItemId> {
    "[a-z][a-z0-9-]{0,15}".prop_map(ItemId::new)
}

/// Generate a decision.
pub fn decision() -> impl Strategy<Value = Decision> {
    prop_oneof![Just(Decision::Allowed), Just(Decision::Denied)]
}

/// Generate a known role.
pub fn role() -> impl Strategy<Value = Role> {
    prop_oneof![
        Just(Role::Requester),
        Just(Role::Approver),
        Just(Role::HistoryViewer),
    ]
}

/// Generate a raw role cell as a store might hold it: NULL, a known code, or
/// junk.
pub fn role_code() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(None),
        role().prop_map(|r| Some(r.code().to_owned())),
        "[B-GI-QS-Z]{0,2}".prop_map(Some),
    ]
}

/// Generate a chain of distinct, non-root node IDs of length 1..=max_len.
pub fn node_chain(max_len: usize) -> impl Strategy<Value = Vec<NodeId>> {
    (1..=max_len.max(1)).prop_map(|len| {
        (0..len)
            .map(|depth| NodeId::new(format!("n{}", depth + 1)))
            .collect()
    })
}

/// Rules placed along a chain of folders, one slot per level from the top.
#[derive(Debug, Clone)]
pub struct RuleLayout {
    /// Rule held by the user's group at each level.
    pub group: Vec<Option<Decision>>,
    /// The user's own rule at each level.
    pub user: Vec<Option<Decision>>,
    /// The configured default.
    pub default: Decision,
}

impl Arbitrary for RuleLayout {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (1usize..=5)
            .prop_flat_map(|len| {
                (
                    prop::collection::vec(proptest::option::of(decision()), len),
                    prop::collection::vec(proptest::option::of(decision()), len),
                    decision(),
                )
            })
            .prop_map(|(group, user, default)| RuleLayout {
                group,
                user,
                default,
            })
            .boxed()
    }
}

impl RuleLayout {
    /// The decision resolution should reach when walking from the deepest
    /// level to the root.
    ///
    /// A group ALLOW defers to its parent, so it only counts at the root when
    /// it sits on the top level.
    pub fn expected(&self) -> Decision {
        let mut group_allowed_below = false;
        for level in (0..self.group.len()).rev() {
            match self.group[level] {
                Some(Decision::Denied) => return Decision::Denied,
                Some(Decision::Allowed) => {
                    group_allowed_below = true;
                    continue;
                }
                None => {}
            }
            if let Some(decision) = self.user[level] {
                return decision;
            }
            group_allowed_below = false;
        }
        if group_allowed_below {
            Decision::Allowed
        } else {
            self.default
        }
    }
}
