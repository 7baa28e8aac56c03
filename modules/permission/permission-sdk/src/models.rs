//! Authorization data model.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Scope required to grant or revoke roles on a resource.
pub const MANAGE_SCOPE: &str = "manage";

/// A protected resource. `parent_id` links it into the resource hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    pub resource_type: String,
    pub parent_id: Option<String>,
}

impl Resource {
    pub fn root(id: impl Into<String>, resource_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            resource_type: resource_type.into(),
            parent_id: None,
        }
    }

    pub fn child(
        id: impl Into<String>,
        resource_type: impl Into<String>,
        parent_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            resource_type: resource_type.into(),
            parent_id: Some(parent_id.into()),
        }
    }
}

/// A named bundle of scopes, defined for one resource type.
///
/// Unique by `(name, resource_type)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub resource_type: String,
    pub scopes: BTreeSet<String>,
}

impl Role {
    /// Exact, case-sensitive scope membership.
    #[must_use]
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.contains(scope)
    }
}

/// Grant of a role to an identity (user or group) on a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRole {
    pub id: Uuid,
    pub identity_id: Uuid,
    pub role_id: Uuid,
    pub resource_id: String,
}

/// Translates a role on an ancestor resource type into a role on a descendant
/// resource type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleMapping {
    pub id: Uuid,
    pub from_role_id: Uuid,
    pub to_role_id: Uuid,
}

/// `member_id` belongs to `group_id`. Members may themselves be groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Membership {
    pub member_id: Uuid,
    pub group_id: Uuid,
}

/// Role assignment request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRoleAssignment {
    pub identity_id: Uuid,
    pub resource_id: String,
    pub role_name: String,
}
