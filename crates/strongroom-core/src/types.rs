//! Strong type definitions for the vault.
//!
//! Identifiers are opaque strings assigned by the surrounding system. They are
//! newtypes so an item ID can never be passed where an actor ID is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, Result};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create from any string-like value.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the raw string.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Get the raw bytes, used as key-derivation context.
            pub fn as_bytes(&self) -> &[u8] {
                self.0.as_bytes()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Identifier of a protected item (a password or other secret).
    ItemId
);

string_id!(
    /// Identifier of an actor, user or group.
    ActorId
);

string_id!(
    /// Identifier of a folder in the containment hierarchy.
    NodeId
);

impl NodeId {
    /// The sentinel ID of the hierarchy root.
    pub const ROOT_ID: &'static str = "0";

    /// The root node.
    pub fn root() -> Self {
        Self(Self::ROOT_ID.to_owned())
    }

    /// Whether this is the root sentinel.
    pub fn is_root(&self) -> bool {
        self.0 == Self::ROOT_ID
    }
}

/// Discriminator stored alongside actor IDs in persisted rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ActorKind {
    User,
    Group,
}

impl ActorKind {
    /// Persisted single-letter code.
    pub const fn code(&self) -> &'static str {
        match self {
            ActorKind::User => "U",
            ActorKind::Group => "G",
        }
    }

    /// Parse a persisted code.
    pub fn from_code(code: &str) -> Result<Self> {
        match code {
            "U" => Ok(ActorKind::User),
            "G" => Ok(ActorKind::Group),
            other => Err(CoreError::UnknownActorKind(other.to_owned())),
        }
    }
}

/// An actor subject to access decisions.
///
/// Users and groups share one capability surface (an ID and a credential).
/// Group membership is owned by an external collaborator and is looked up
/// rather than carried here.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Actor {
    User(ActorId),
    Group(ActorId),
}

impl Actor {
    /// A user actor.
    pub fn user(id: impl Into<ActorId>) -> Self {
        Actor::User(id.into())
    }

    /// A group actor.
    pub fn group(id: impl Into<ActorId>) -> Self {
        Actor::Group(id.into())
    }

    /// Rebuild an actor from its persisted parts.
    pub fn from_parts(kind: ActorKind, id: ActorId) -> Self {
        match kind {
            ActorKind::User => Actor::User(id),
            ActorKind::Group => Actor::Group(id),
        }
    }

    /// The actor's ID.
    pub fn id(&self) -> &ActorId {
        match self {
            Actor::User(id) | Actor::Group(id) => id,
        }
    }

    /// The actor's kind.
    pub fn kind(&self) -> ActorKind {
        match self {
            Actor::User(_) => ActorKind::User,
            Actor::Group(_) => ActorKind::Group,
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self, Actor::Group(_))
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actor::User(id) => write!(f, "user:{}", id),
            Actor::Group(id) => write!(f, "group:{}", id),
        }
    }
}

/// How much of an item's key pair an entry carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessLevel {
    /// Only the read half is wrapped.
    Read,
    /// Both halves are wrapped.
    Modify,
}

impl AccessLevel {
    /// Persisted code.
    pub const fn code(&self) -> &'static str {
        match self {
            AccessLevel::Read => "R",
            AccessLevel::Modify => "RM",
        }
    }

    /// Parse a persisted code.
    pub fn from_code(code: &str) -> Result<Self> {
        match code {
            "R" => Ok(AccessLevel::Read),
            "RM" => Ok(AccessLevel::Modify),
            other => Err(CoreError::UnknownAccessLevel(other.to_owned())),
        }
    }
}
