//! RBAC roles layered over the cryptographic access layer.

use serde::{Deserialize, Serialize};

/// A named coarse capability on an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    /// May request restricted access. Carries no derived permission.
    Requester,
    /// May approve restricted access requests.
    Approver,
    /// May view an item's history.
    HistoryViewer,
}

impl Role {
    /// Persisted single-letter code.
    pub const fn code(&self) -> &'static str {
        match self {
            Role::Requester => "R",
            Role::Approver => "A",
            Role::HistoryViewer => "H",
        }
    }

    /// Parse a persisted code. Unknown codes yield `None`.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "R" => Some(Role::Requester),
            "A" => Some(Role::Approver),
            "H" => Some(Role::HistoryViewer),
            _ => None,
        }
    }
}

/// Capabilities derived from the role grants of an actor set on one item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolePermissions {
    pub can_approve: bool,
    pub can_view_history: bool,
}

impl RolePermissions {
    /// No capabilities.
    pub const NONE: Self = Self {
        can_approve: false,
        can_view_history: false,
    };

    /// OR a single role into these permissions.
    pub fn absorb(&mut self, role: Role) {
        match role {
            Role::Approver => self.can_approve = true,
            Role::HistoryViewer => self.can_view_history = true,
            Role::Requester => {}
        }
    }

    /// Aggregate raw role cells.
    ///
    /// NULL cells and codes outside the known set are skipped.
    pub fn from_role_codes<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: AsRef<str>,
    {
        let mut permissions = Self::NONE;
        for role in codes
            .into_iter()
            .flatten()
            .filter_map(|code| Role::from_code(code.as_ref()))
        {
            permissions.absorb(role);
        }
        permissions
    }
}
