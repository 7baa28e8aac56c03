#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use permission_sdk::{NewRoleAssignment, Role};
use tracing_test::traced_test;
use uuid::Uuid;

use crate::domain::error::DomainError;
use crate::domain::ports::{NotificationPort, RoleChange};
use crate::test_support::{Fixture, RecordingNotifier};

struct Setup {
    f: Fixture,
    notifier: Arc<RecordingNotifier>,
    admin_id: Uuid,
    viewer: Role,
}

async fn setup_with(notifier: RecordingNotifier) -> Setup {
    let notifier = Arc::new(notifier);
    let port: Arc<dyn NotificationPort> = notifier.clone();
    let f = Fixture::with(|builder| builder.notifications(port));

    let admin_id = Uuid::new_v4();
    f.resource("proj-1", "project", None).await;
    let admin = f.role("admin", "project", &["manage", "read"]).await;
    let viewer = f.role("viewer", "project", &["read"]).await;
    f.grant(admin_id, &admin, "proj-1").await;

    Setup {
        f,
        notifier,
        admin_id,
        viewer,
    }
}

async fn setup() -> Setup {
    setup_with(RecordingNotifier::default()).await
}

fn viewer_on_project(identity_id: Uuid) -> NewRoleAssignment {
    NewRoleAssignment {
        identity_id,
        resource_id: "proj-1".to_owned(),
        role_name: "viewer".to_owned(),
    }
}

#[tokio::test]
async fn assign_grants_scope_and_notifies_after_commit() {
    let s = setup().await;
    let bob = Uuid::new_v4();

    let grant = s
        .f
        .services
        .role_management()
        .assign_role(s.f.ctx(), s.admin_id, viewer_on_project(bob))
        .await
        .unwrap();

    assert_eq!(grant.identity_id, bob);
    assert_eq!(grant.role_id, s.viewer.id);
    assert!(s.f.has_scope(bob, "proj-1", "read").await);
    assert_eq!(
        s.notifier.recorded(),
        vec![RoleChange::Assigned {
            assigner_id: s.admin_id,
            identity_id: bob,
            resource_id: "proj-1".to_owned(),
            role_name: "viewer".to_owned(),
        }]
    );
}

#[tokio::test]
async fn assign_requires_manage_scope() {
    let s = setup().await;
    let mallory = Uuid::new_v4();

    let err = s
        .f
        .services
        .role_management()
        .assign_role(s.f.ctx(), mallory, viewer_on_project(mallory))
        .await
        .unwrap_err();

    assert!(matches!(err, DomainError::Forbidden { ref scope, .. } if scope == "manage"));
    assert!(!s.f.has_scope(mallory, "proj-1", "read").await);
    assert!(s.notifier.recorded().is_empty());
}

#[tokio::test]
async fn assign_rejects_unknown_role() {
    let s = setup().await;
    let mut assignment = viewer_on_project(Uuid::new_v4());
    assignment.role_name = "ghost".to_owned();

    let err = s
        .f
        .services
        .role_management()
        .assign_role(s.f.ctx(), s.admin_id, assignment)
        .await
        .unwrap_err();

    assert!(
        matches!(err, DomainError::NotFound { entity: "role", ref id } if id == "ghost@project"),
        "{err}"
    );
}

#[tokio::test]
async fn assign_rejects_empty_fields() {
    let s = setup().await;
    let mut assignment = viewer_on_project(Uuid::new_v4());
    assignment.role_name = "  ".to_owned();

    let err = s
        .f
        .services
        .role_management()
        .assign_role(s.f.ctx(), s.admin_id, assignment)
        .await
        .unwrap_err();

    assert!(matches!(err, DomainError::Validation { ref field, .. } if field == "role_name"));
}

#[tokio::test]
async fn assign_joins_caller_transaction_and_waits_for_its_commit() {
    let s = setup().await;
    let bob = Uuid::new_v4();
    let roles = s.f.services.role_management();
    let notifier = Arc::clone(&s.notifier);
    let admin_id = s.admin_id;

    s.f.ctx()
        .execute_in_transaction(move |tx| async move {
            roles.assign_role(&tx, admin_id, viewer_on_project(bob)).await?;
            assert!(notifier.recorded().is_empty());
            Ok::<_, DomainError>(())
        })
        .await
        .unwrap();

    assert_eq!(s.notifier.recorded().len(), 1);
    assert!(s.f.has_scope(bob, "proj-1", "read").await);
}

#[tokio::test]
async fn failing_caller_transaction_undoes_assignment_silently() {
    let s = setup().await;
    let bob = Uuid::new_v4();
    let roles = s.f.services.role_management();
    let admin_id = s.admin_id;

    let err = s
        .f
        .ctx()
        .execute_in_transaction(move |tx| async move {
            roles.assign_role(&tx, admin_id, viewer_on_project(bob)).await?;
            Err::<(), _>(DomainError::internal("audit log unavailable"))
        })
        .await
        .unwrap_err();

    assert!(err.to_string().contains("audit log unavailable"));
    assert!(!s.f.has_scope(bob, "proj-1", "read").await);
    assert!(s.notifier.recorded().is_empty());
}

#[tokio::test]
#[traced_test]
async fn notification_failure_does_not_fail_assignment() {
    let s = setup_with(RecordingNotifier::failing()).await;
    let bob = Uuid::new_v4();

    s.f.services
        .role_management()
        .assign_role(s.f.ctx(), s.admin_id, viewer_on_project(bob))
        .await
        .unwrap();

    assert!(s.f.has_scope(bob, "proj-1", "read").await);
    assert!(logs_contain("role change notification failed"));
}

#[tokio::test]
async fn revoke_removes_every_matching_direct_grant() {
    let s = setup().await;
    let bob = Uuid::new_v4();
    let roles = s.f.services.role_management();
    roles
        .assign_role(s.f.ctx(), s.admin_id, viewer_on_project(bob))
        .await
        .unwrap();
    roles
        .assign_role(s.f.ctx(), s.admin_id, viewer_on_project(bob))
        .await
        .unwrap();

    let removed = roles
        .revoke_role(s.f.ctx(), s.admin_id, bob, "proj-1", "viewer")
        .await
        .unwrap();
    assert_eq!(removed, 2);
    assert!(!s.f.has_scope(bob, "proj-1", "read").await);

    let removed = roles
        .revoke_role(s.f.ctx(), s.admin_id, bob, "proj-1", "viewer")
        .await
        .unwrap();
    assert_eq!(removed, 0);

    let revocations = s
        .notifier
        .recorded()
        .into_iter()
        .filter(|c| matches!(c, RoleChange::Revoked { .. }))
        .count();
    assert_eq!(revocations, 1);
}

#[tokio::test]
async fn revoke_leaves_other_roles_alone() {
    let s = setup().await;
    let bob = Uuid::new_v4();
    let editor = s.f.role("editor", "project", &["read", "write"]).await;
    s.f.grant(bob, &editor, "proj-1").await;

    let removed = s
        .f
        .services
        .role_management()
        .revoke_role(s.f.ctx(), s.admin_id, bob, "proj-1", "viewer")
        .await
        .unwrap();

    assert_eq!(removed, 0);
    assert!(s.f.has_scope(bob, "proj-1", "write").await);
}
