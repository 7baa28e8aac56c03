//! Repository access surface.
//!
//! A [`Repositories`] value is either bound to committed state or to one open
//! transaction; callers cannot tell which and must not care. Sub-repositories
//! are plain lookups; the one composite query, [`Repositories::find_permissions`],
//! defaults to the generic walk in [`resolver`](crate::domain::resolver).

use async_trait::async_trait;
use permission_sdk::{IdentityRole, Membership, Resource, Role, RoleMapping};
use uuid::Uuid;

use crate::domain::resolver::{self, PermissionQuery, TraversalLimits};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("transaction is already committed or rolled back")]
    TransactionClosed,

    #[error("{entity} '{id}' already exists")]
    Conflict { entity: &'static str, id: String },

    #[error("malformed resource hierarchy at '{resource_id}': {reason}")]
    MalformedHierarchy { resource_id: String, reason: String },

    #[error("role {0} is referenced but does not exist")]
    DanglingRole(Uuid),
}

impl RepositoryError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    pub fn conflict(entity: &'static str, id: impl Into<String>) -> Self {
        Self::Conflict {
            entity,
            id: id.into(),
        }
    }

    pub fn malformed_hierarchy(resource_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedHierarchy {
            resource_id: resource_id.into(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
pub trait ResourceRepository: Send + Sync {
    async fn create(&self, resource: &Resource) -> Result<(), RepositoryError>;

    async fn load(&self, id: &str) -> Result<Option<Resource>, RepositoryError>;
}

#[async_trait]
pub trait RoleRepository: Send + Sync {
    async fn create(&self, role: &Role) -> Result<(), RepositoryError>;

    async fn load(&self, id: Uuid) -> Result<Option<Role>, RepositoryError>;

    async fn find_by_name(
        &self,
        name: &str,
        resource_type: &str,
    ) -> Result<Option<Role>, RepositoryError>;
}

#[async_trait]
pub trait IdentityRoleRepository: Send + Sync {
    async fn create(&self, grant: &IdentityRole) -> Result<(), RepositoryError>;

    /// Returns `false` if no grant with that id existed.
    async fn delete(&self, id: Uuid) -> Result<bool, RepositoryError>;

    /// Grants held by any of `identity_ids` on any of `resource_ids`.
    async fn find_for_principals(
        &self,
        identity_ids: &[Uuid],
        resource_ids: &[String],
    ) -> Result<Vec<IdentityRole>, RepositoryError>;
}

#[async_trait]
pub trait RoleMappingRepository: Send + Sync {
    async fn create(&self, mapping: &RoleMapping) -> Result<(), RepositoryError>;

    async fn find_by_source_role(
        &self,
        from_role_id: Uuid,
    ) -> Result<Vec<RoleMapping>, RepositoryError>;
}

#[async_trait]
pub trait MembershipRepository: Send + Sync {
    /// Idempotent.
    async fn add(&self, membership: Membership) -> Result<(), RepositoryError>;

    /// Returns `false` if the membership did not exist.
    async fn remove(&self, membership: Membership) -> Result<bool, RepositoryError>;

    /// Groups `member_id` belongs to directly.
    async fn find_group_ids(&self, member_id: Uuid) -> Result<Vec<Uuid>, RepositoryError>;
}

#[async_trait]
pub trait Repositories: Send + Sync {
    fn resources(&self) -> &dyn ResourceRepository;

    fn roles(&self) -> &dyn RoleRepository;

    fn identity_roles(&self) -> &dyn IdentityRoleRepository;

    fn role_mappings(&self) -> &dyn RoleMappingRepository;

    fn memberships(&self) -> &dyn MembershipRepository;

    /// Effective grants carrying `query.scope` for `query.identity_id` on
    /// `query.resource_id`. Empty means denied.
    async fn find_permissions(
        &self,
        query: &PermissionQuery<'_>,
        limits: &TraversalLimits,
    ) -> Result<Vec<IdentityRole>, RepositoryError> {
        resolver::find_permissions(self, query, limits).await
    }
}
