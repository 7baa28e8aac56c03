//! Domain services and their container.
//!
//! [`Services`] is the service factory: it owns the shared
//! [`ServiceContext`] and hands out services built on first use. Every
//! collaborator is supplied through [`ServicesBuilder`] up front; services
//! never reach for globals.
//!
//! Service methods take the caller's [`PermissionContext`] explicitly. Passing
//! the root context reads committed state; passing a transactional context
//! (from `execute_in_transaction`) joins that transaction.

use std::sync::{Arc, OnceLock};

use tx_context::{ExecutionContext, ServiceContext};

use crate::domain::ports::{NotificationPort, TracingNotifier};
use crate::domain::repos::Repositories;
use crate::domain::resolver::TraversalLimits;

mod permissions;
mod role_management;

pub use permissions::PermissionService;
pub use role_management::RoleManagementService;

/// Execution context over the permission repositories.
pub type PermissionContext = ExecutionContext<dyn Repositories>;

#[cfg(test)]
mod tests_permissions;

#[cfg(test)]
mod tests_role_management;

#[cfg(test)]
mod tests_services;

pub struct ServicesBuilder {
    context: Arc<ServiceContext<dyn Repositories>>,
    limits: TraversalLimits,
    notifications: Option<Arc<dyn NotificationPort>>,
}

impl ServicesBuilder {
    #[must_use]
    pub fn traversal_limits(mut self, limits: TraversalLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Replaces the default [`TracingNotifier`].
    #[must_use]
    pub fn notifications(mut self, port: Arc<dyn NotificationPort>) -> Self {
        self.notifications = Some(port);
        self
    }

    #[must_use]
    pub fn build(self) -> Services {
        Services {
            context: ExecutionContext::new(self.context),
            limits: self.limits,
            notifications: self
                .notifications
                .unwrap_or_else(|| Arc::new(TracingNotifier)),
            permissions: OnceLock::new(),
            role_management: OnceLock::new(),
        }
    }
}

/// Service factory. Services are created lazily and all share one context.
pub struct Services {
    context: PermissionContext,
    limits: TraversalLimits,
    notifications: Arc<dyn NotificationPort>,
    permissions: OnceLock<Arc<PermissionService>>,
    role_management: OnceLock<Arc<RoleManagementService>>,
}

impl Services {
    #[must_use]
    pub fn builder(context: Arc<ServiceContext<dyn Repositories>>) -> ServicesBuilder {
        ServicesBuilder {
            context,
            limits: TraversalLimits::default(),
            notifications: None,
        }
    }

    /// Root context: outside any transaction.
    #[must_use]
    pub fn context(&self) -> &PermissionContext {
        &self.context
    }

    #[must_use]
    pub fn notifications(&self) -> Arc<dyn NotificationPort> {
        Arc::clone(&self.notifications)
    }

    #[must_use]
    pub fn permissions(&self) -> Arc<PermissionService> {
        Arc::clone(self.permissions.get_or_init(|| {
            tracing::debug!("creating permission service");
            Arc::new(PermissionService::new(self.limits))
        }))
    }

    #[must_use]
    pub fn role_management(&self) -> Arc<RoleManagementService> {
        Arc::clone(self.role_management.get_or_init(|| {
            tracing::debug!("creating role management service");
            Arc::new(RoleManagementService::new(
                self.permissions(),
                self.notifications(),
            ))
        }))
    }
}
