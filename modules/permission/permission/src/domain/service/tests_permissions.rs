#![allow(clippy::unwrap_used, clippy::expect_used)]

use tracing_test::traced_test;
use uuid::Uuid;

use crate::domain::error::DomainError;
use crate::test_support::{Fixture, broken_services};

#[tokio::test]
async fn group_member_inherits_project_read() {
    let f = Fixture::new();
    let alice = Uuid::new_v4();
    let engineers = Uuid::new_v4();
    f.resource("proj-1", "project", None).await;
    let viewer = f.role("viewer", "project", &["read"]).await;
    f.grant(engineers, &viewer, "proj-1").await;

    assert!(!f.has_scope(alice, "proj-1", "read").await);
    f.join(alice, engineers).await;
    assert!(f.has_scope(alice, "proj-1", "read").await);
}

#[tokio::test]
async fn require_scope_passes_when_held() {
    let f = Fixture::new();
    let alice = Uuid::new_v4();
    f.resource("proj-1", "project", None).await;
    let editor = f.role("editor", "project", &["read", "write"]).await;
    f.grant(alice, &editor, "proj-1").await;

    f.services
        .permissions()
        .require_scope(f.ctx(), alice, "proj-1", "write")
        .await
        .unwrap();
}

#[tokio::test]
async fn require_scope_names_identity_scope_and_resource() {
    let f = Fixture::new();
    let alice = Uuid::new_v4();
    f.resource("proj-1", "project", None).await;

    let err = f
        .services
        .permissions()
        .require_scope(f.ctx(), alice, "proj-1", "write")
        .await
        .unwrap_err();

    assert!(matches!(err, DomainError::Forbidden { .. }), "{err}");
    let message = err.to_string();
    assert!(message.contains(&alice.to_string()));
    assert!(message.contains("write"));
    assert!(message.contains("proj-1"));
}

#[tokio::test]
async fn has_scope_surfaces_storage_failures() {
    let services = broken_services();

    let err = services
        .permissions()
        .has_scope(services.context(), Uuid::new_v4(), "proj-1", "read")
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Repository(_)), "{err}");
}

#[tokio::test]
#[traced_test]
async fn require_scope_reports_failed_check_as_internal() {
    let services = broken_services();

    let err = services
        .permissions()
        .require_scope(services.context(), Uuid::new_v4(), "proj-1", "read")
        .await
        .unwrap_err();

    let DomainError::Internal(message) = err else {
        panic!("expected internal error, got {err}");
    };
    assert!(message.contains("failed to check scope read"));
    assert!(message.contains("connection reset"));
    assert!(logs_contain("scope check failed"));
}

#[tokio::test]
async fn check_inside_transaction_sees_uncommitted_grant() {
    let f = Fixture::new();
    let alice = Uuid::new_v4();
    f.resource("proj-1", "project", None).await;
    let viewer = f.role("viewer", "project", &["read"]).await;
    let permissions = f.services.permissions();
    let root = f.ctx().clone();

    let seen = f
        .ctx()
        .execute_in_transaction(move |tx| async move {
            tx.repositories()
                .identity_roles()
                .create(&permission_sdk::IdentityRole {
                    id: Uuid::new_v4(),
                    identity_id: alice,
                    role_id: viewer.id,
                    resource_id: "proj-1".to_owned(),
                })
                .await?;
            let inside = permissions.has_scope(&tx, alice, "proj-1", "read").await?;
            let outside = permissions.has_scope(&root, alice, "proj-1", "read").await?;
            Ok::<_, DomainError>((inside, outside))
        })
        .await
        .unwrap();

    assert_eq!(seen, (true, false));
    assert!(f.has_scope(alice, "proj-1", "read").await);
}
