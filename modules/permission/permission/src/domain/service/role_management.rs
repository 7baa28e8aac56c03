use std::sync::Arc;

use permission_sdk::{IdentityRole, MANAGE_SCOPE, NewRoleAssignment, Resource, Role};
use tracing::instrument;
use uuid::Uuid;

use crate::domain::error::DomainError;
use crate::domain::ports::{NotificationPort, RoleChange};
use crate::domain::repos::Repositories;

use super::{PermissionContext, PermissionService};

/// Grants and revokes roles.
///
/// Each operation checks [`MANAGE_SCOPE`] for the assigner and mutates within
/// one transaction; when called inside a caller's transaction it joins it.
/// Notifications are released only once the outermost transaction commits.
pub struct RoleManagementService {
    permissions: Arc<PermissionService>,
    notifications: Arc<dyn NotificationPort>,
}

impl RoleManagementService {
    pub fn new(
        permissions: Arc<PermissionService>,
        notifications: Arc<dyn NotificationPort>,
    ) -> Self {
        Self {
            permissions,
            notifications,
        }
    }

    /// # Errors
    ///
    /// - [`DomainError::Validation`] on empty fields
    /// - [`DomainError::Forbidden`] if the assigner lacks `manage` on the resource
    /// - [`DomainError::NotFound`] if the resource or role does not exist
    /// - [`DomainError::Timeout`] / [`DomainError::Internal`] from the transaction
    #[instrument(
        skip(self, ctx, assignment),
        fields(
            %assigner_id,
            identity_id = %assignment.identity_id,
            resource_id = %assignment.resource_id,
            role = %assignment.role_name
        )
    )]
    pub async fn assign_role(
        &self,
        ctx: &PermissionContext,
        assigner_id: Uuid,
        assignment: NewRoleAssignment,
    ) -> Result<IdentityRole, DomainError> {
        require_non_empty("resource_id", &assignment.resource_id)?;
        require_non_empty("role_name", &assignment.role_name)?;

        let permissions = Arc::clone(&self.permissions);
        let notifications = Arc::clone(&self.notifications);

        let grant = ctx
            .execute_in_transaction(move |tx| async move {
                permissions
                    .require_scope(&tx, assigner_id, &assignment.resource_id, MANAGE_SCOPE)
                    .await?;

                let repos = tx.repositories();
                let (resource, role) =
                    resolve_role(repos.as_ref(), &assignment.resource_id, &assignment.role_name)
                        .await?;

                let grant = IdentityRole {
                    id: Uuid::new_v4(),
                    identity_id: assignment.identity_id,
                    role_id: role.id,
                    resource_id: resource.id,
                };
                repos.identity_roles().create(&grant).await?;

                let change = RoleChange::Assigned {
                    assigner_id,
                    identity_id: grant.identity_id,
                    resource_id: grant.resource_id.clone(),
                    role_name: role.name,
                };
                tx.after_commit(notify(notifications, change)).await;
                Ok::<_, DomainError>(grant)
            })
            .await?;

        tracing::debug!(grant_id = %grant.id, "role assignment stored");
        Ok(grant)
    }

    /// Removes `identity_id`'s direct grants of `role_name` on `resource_id`.
    ///
    /// # Errors
    ///
    /// Same as [`assign_role`](Self::assign_role).
    #[instrument(skip(self, ctx), fields(%assigner_id, %identity_id))]
    pub async fn revoke_role(
        &self,
        ctx: &PermissionContext,
        assigner_id: Uuid,
        identity_id: Uuid,
        resource_id: &str,
        role_name: &str,
    ) -> Result<u64, DomainError> {
        require_non_empty("resource_id", resource_id)?;
        require_non_empty("role_name", role_name)?;

        let permissions = Arc::clone(&self.permissions);
        let notifications = Arc::clone(&self.notifications);
        let resource_id = resource_id.to_owned();
        let role_name = role_name.to_owned();

        let removed = ctx
            .execute_in_transaction(move |tx| async move {
                permissions
                    .require_scope(&tx, assigner_id, &resource_id, MANAGE_SCOPE)
                    .await?;

                let repos = tx.repositories();
                let (resource, role) = resolve_role(repos.as_ref(), &resource_id, &role_name).await?;

                let grants = repos
                    .identity_roles()
                    .find_for_principals(&[identity_id], std::slice::from_ref(&resource.id))
                    .await?;

                let mut removed = 0u64;
                for grant in grants.iter().filter(|g| g.role_id == role.id) {
                    if repos.identity_roles().delete(grant.id).await? {
                        removed += 1;
                    }
                }

                if removed > 0 {
                    let change = RoleChange::Revoked {
                        assigner_id,
                        identity_id,
                        resource_id: resource.id,
                        role_name: role.name,
                        removed,
                    };
                    tx.after_commit(notify(notifications, change)).await;
                }
                Ok::<_, DomainError>(removed)
            })
            .await?;

        tracing::debug!(removed, "role grants revoked");
        Ok(removed)
    }
}

fn require_non_empty(field: &str, value: &str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        return Err(DomainError::validation(field, "must not be empty"));
    }
    Ok(())
}

async fn resolve_role(
    repos: &dyn Repositories,
    resource_id: &str,
    role_name: &str,
) -> Result<(Resource, Role), DomainError> {
    let resource = repos
        .resources()
        .load(resource_id)
        .await?
        .ok_or_else(|| DomainError::not_found("resource", resource_id))?;

    let role = repos
        .roles()
        .find_by_name(role_name, &resource.resource_type)
        .await?
        .ok_or_else(|| {
            DomainError::not_found("role", format!("{role_name}@{}", resource.resource_type))
        })?;

    Ok((resource, role))
}

async fn notify(notifications: Arc<dyn NotificationPort>, change: RoleChange) {
    if let Err(e) = notifications.role_changed(&change).await {
        tracing::warn!(error = %e, "role change notification failed");
    }
}
