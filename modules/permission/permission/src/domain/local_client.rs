use std::sync::Arc;

use async_trait::async_trait;
use permission_sdk::{IdentityRole, NewRoleAssignment, PermissionClient, PermissionError};
use uuid::Uuid;

use crate::domain::error::DomainError;
use crate::domain::service::Services;

/// In-process [`PermissionClient`]. Every call is its own outermost transaction.
pub struct PermissionLocalClient {
    services: Arc<Services>,
}

impl PermissionLocalClient {
    #[must_use]
    pub fn new(services: Arc<Services>) -> Self {
        Self { services }
    }
}

#[async_trait]
impl PermissionClient for PermissionLocalClient {
    async fn has_scope(
        &self,
        identity_id: Uuid,
        resource_id: &str,
        scope: &str,
    ) -> Result<bool, PermissionError> {
        let permissions = self.services.permissions();
        let resource_id = resource_id.to_owned();
        let scope = scope.to_owned();

        let granted = self
            .services
            .context()
            .execute_in_transaction(move |tx| async move {
                permissions
                    .has_scope(&tx, identity_id, &resource_id, &scope)
                    .await
            })
            .await
            .map_err(DomainError::from)?;
        Ok(granted)
    }

    async fn require_scope(
        &self,
        identity_id: Uuid,
        resource_id: &str,
        scope: &str,
    ) -> Result<(), PermissionError> {
        let permissions = self.services.permissions();
        let resource_id = resource_id.to_owned();
        let scope = scope.to_owned();

        self.services
            .context()
            .execute_in_transaction(move |tx| async move {
                permissions
                    .require_scope(&tx, identity_id, &resource_id, &scope)
                    .await
            })
            .await
            .map_err(|e| DomainError::from(e).into())
    }

    async fn assign_role(
        &self,
        assigner_id: Uuid,
        assignment: NewRoleAssignment,
    ) -> Result<IdentityRole, PermissionError> {
        self.services
            .role_management()
            .assign_role(self.services.context(), assigner_id, assignment)
            .await
            .map_err(Into::into)
    }

    async fn revoke_role(
        &self,
        assigner_id: Uuid,
        identity_id: Uuid,
        resource_id: &str,
        role_name: &str,
    ) -> Result<u64, PermissionError> {
        self.services
            .role_management()
            .revoke_role(
                self.services.context(),
                assigner_id,
                identity_id,
                resource_id,
                role_name,
            )
            .await
            .map_err(Into::into)
    }
}
