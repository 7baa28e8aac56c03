use tracing::instrument;
use uuid::Uuid;

use crate::domain::error::DomainError;
use crate::domain::resolver::{PermissionQuery, TraversalLimits};

use super::PermissionContext;

/// Scope checks.
///
/// Read-only: works on whatever handle the context routes to, so it can run
/// inside a caller's transaction or on its own.
pub struct PermissionService {
    limits: TraversalLimits,
}

impl PermissionService {
    #[must_use]
    pub fn new(limits: TraversalLimits) -> Self {
        Self { limits }
    }

    #[must_use]
    pub fn limits(&self) -> &TraversalLimits {
        &self.limits
    }

    /// # Errors
    ///
    /// Returns [`DomainError::Repository`] when the decision cannot be made.
    #[instrument(skip(self, ctx), fields(in_transaction = ctx.in_transaction()))]
    pub async fn has_scope(
        &self,
        ctx: &PermissionContext,
        identity_id: Uuid,
        resource_id: &str,
        scope: &str,
    ) -> Result<bool, DomainError> {
        let query = PermissionQuery::new(identity_id, resource_id, scope);
        let grants = ctx
            .repositories()
            .find_permissions(&query, &self.limits)
            .await?;

        let granted = !grants.is_empty();
        tracing::debug!(granted, grants = grants.len(), "scope check");
        Ok(granted)
    }

    /// Enforcement point for mutating operations.
    ///
    /// # Errors
    ///
    /// - [`DomainError::Forbidden`] if the scope is not held
    /// - [`DomainError::Internal`] if the check itself failed
    pub async fn require_scope(
        &self,
        ctx: &PermissionContext,
        identity_id: Uuid,
        resource_id: &str,
        scope: &str,
    ) -> Result<(), DomainError> {
        match self.has_scope(ctx, identity_id, resource_id, scope).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(DomainError::forbidden(identity_id, resource_id, scope)),
            Err(e) => {
                tracing::error!(error = %e, %identity_id, resource_id, scope, "scope check failed");
                Err(DomainError::internal(format!(
                    "failed to check scope {scope} for identity {identity_id} on resource {resource_id}: {e}"
                )))
            }
        }
    }
}
