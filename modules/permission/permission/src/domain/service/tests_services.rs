#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use permission_sdk::NewRoleAssignment;
use uuid::Uuid;

use crate::domain::ports::NotificationPort;
use crate::domain::resolver::TraversalLimits;
use crate::test_support::{Fixture, RecordingNotifier};

#[test]
fn services_are_created_once_and_shared() {
    let f = Fixture::new();

    assert!(Arc::ptr_eq(
        &f.services.permissions(),
        &f.services.permissions()
    ));
    assert!(Arc::ptr_eq(
        &f.services.role_management(),
        &f.services.role_management()
    ));
}

#[test]
fn root_context_is_outside_any_transaction() {
    let f = Fixture::new();

    assert!(!f.services.context().in_transaction());
}

#[test]
fn traversal_limits_reach_the_permission_service() {
    let limits = TraversalLimits {
        max_membership_depth: 2,
        max_hierarchy_depth: 4,
    };
    let f = Fixture::with(|builder| builder.traversal_limits(limits));

    assert_eq!(f.services.permissions().limits(), &limits);
}

#[tokio::test]
async fn notification_port_override_is_used_by_role_management() {
    let notifier = Arc::new(RecordingNotifier::default());
    let port: Arc<dyn NotificationPort> = notifier.clone();
    let f = Fixture::with(|builder| builder.notifications(port));
    let admin_id = Uuid::new_v4();
    f.resource("proj-1", "project", None).await;
    let admin = f.role("admin", "project", &["manage"]).await;
    f.role("viewer", "project", &["read"]).await;
    f.grant(admin_id, &admin, "proj-1").await;

    f.services
        .role_management()
        .assign_role(
            f.ctx(),
            admin_id,
            NewRoleAssignment {
                identity_id: Uuid::new_v4(),
                resource_id: "proj-1".to_owned(),
                role_name: "viewer".to_owned(),
            },
        )
        .await
        .unwrap();

    assert_eq!(notifier.recorded().len(), 1);
}

#[tokio::test]
async fn services_observe_the_same_committed_state() {
    let f = Fixture::new();
    let alice = Uuid::new_v4();
    f.resource("doc-1", "document", None).await;
    let reader = f.role("reader", "document", &["read"]).await;

    let permissions = f.services.permissions();
    assert!(
        !permissions
            .has_scope(f.ctx(), alice, "doc-1", "read")
            .await
            .unwrap()
    );

    f.grant(alice, &reader, "doc-1").await;
    assert!(
        permissions
            .has_scope(f.ctx(), alice, "doc-1", "read")
            .await
            .unwrap()
    );
}
