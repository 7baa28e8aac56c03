use async_trait::async_trait;
use uuid::Uuid;

/// Role change announced to the outside world after it has been committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleChange {
    Assigned {
        assigner_id: Uuid,
        identity_id: Uuid,
        resource_id: String,
        role_name: String,
    },
    Revoked {
        assigner_id: Uuid,
        identity_id: Uuid,
        resource_id: String,
        role_name: String,
        removed: u64,
    },
}

/// Outbound notification channel (mail, webhooks, ...). Delivery is best effort.
#[async_trait]
pub trait NotificationPort: Send + Sync {
    async fn role_changed(&self, change: &RoleChange) -> anyhow::Result<()>;
}

/// Default port: records the change in the trace log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

#[async_trait]
impl NotificationPort for TracingNotifier {
    async fn role_changed(&self, change: &RoleChange) -> anyhow::Result<()> {
        match change {
            RoleChange::Assigned {
                identity_id,
                resource_id,
                role_name,
                ..
            } => tracing::info!(%identity_id, %resource_id, %role_name, "role assigned"),
            RoleChange::Revoked {
                identity_id,
                resource_id,
                role_name,
                removed,
                ..
            } => tracing::info!(%identity_id, %resource_id, %role_name, removed, "role revoked"),
        }
        Ok(())
    }
}
