//! Public API trait for the permission module.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::PermissionError;
use crate::models::{IdentityRole, NewRoleAssignment};

/// Public API of the permission module.
///
/// Every call runs as its own unit of work and observes a consistent snapshot
/// of roles, grants and memberships.
#[async_trait]
pub trait PermissionClient: Send + Sync {
    /// Whether `identity_id` holds `scope` on `resource_id`, directly, through
    /// group membership, or inherited from an ancestor resource.
    ///
    /// # Errors
    ///
    /// - `Internal` if the decision could not be made (the answer is unknown, not `false`)
    /// - `Timeout` if the lookup exceeded the transaction timeout
    async fn has_scope(
        &self,
        identity_id: Uuid,
        resource_id: &str,
        scope: &str,
    ) -> Result<bool, PermissionError>;

    /// Like [`has_scope`](Self::has_scope) but turns denial into an error.
    ///
    /// # Errors
    ///
    /// - `Forbidden` if the scope is not held
    /// - `Internal` / `Timeout` as for `has_scope`
    async fn require_scope(
        &self,
        identity_id: Uuid,
        resource_id: &str,
        scope: &str,
    ) -> Result<(), PermissionError>;

    /// Grants a role on a resource. The assigner needs the `manage` scope there.
    ///
    /// # Errors
    ///
    /// - `Validation` on empty fields
    /// - `Forbidden` if the assigner lacks `manage`
    /// - `NotFound` if the resource or the role does not exist
    async fn assign_role(
        &self,
        assigner_id: Uuid,
        assignment: NewRoleAssignment,
    ) -> Result<IdentityRole, PermissionError>;

    /// Removes an identity's direct grants of a role on a resource and returns
    /// how many grants were removed.
    ///
    /// # Errors
    ///
    /// Same as [`assign_role`](Self::assign_role).
    async fn revoke_role(
        &self,
        assigner_id: Uuid,
        identity_id: Uuid,
        resource_id: &str,
        role_name: &str,
    ) -> Result<u64, PermissionError>;
}
