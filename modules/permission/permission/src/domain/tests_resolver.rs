#![allow(clippy::unwrap_used, clippy::expect_used)]

use uuid::Uuid;

use super::{PermissionQuery, TraversalLimits, find_permissions};
use crate::domain::repos::RepositoryError;
use crate::test_support::Fixture;

async fn resolve(
    fixture: &Fixture,
    identity_id: Uuid,
    resource_id: &str,
    scope: &str,
    limits: &TraversalLimits,
) -> Result<usize, RepositoryError> {
    let query = PermissionQuery::new(identity_id, resource_id, scope);
    find_permissions(fixture.repos.as_ref(), &query, limits)
        .await
        .map(|grants| grants.len())
}

async fn granted(fixture: &Fixture, identity_id: Uuid, resource_id: &str, scope: &str) -> bool {
    resolve(fixture, identity_id, resource_id, scope, &TraversalLimits::default())
        .await
        .unwrap()
        > 0
}

#[tokio::test]
async fn direct_grant_on_target() {
    let f = Fixture::new();
    let alice = Uuid::new_v4();
    f.resource("doc-1", "document", None).await;
    let reader = f.role("reader", "document", &["read"]).await;
    f.grant(alice, &reader, "doc-1").await;

    assert!(granted(&f, alice, "doc-1", "read").await);
    assert!(!granted(&f, alice, "doc-1", "write").await);
    assert!(!granted(&f, Uuid::new_v4(), "doc-1", "read").await);
}

#[tokio::test]
async fn scope_names_match_exactly() {
    let f = Fixture::new();
    let alice = Uuid::new_v4();
    f.resource("doc-1", "document", None).await;
    let auditor = f.role("auditor", "document", &["read_all"]).await;
    f.grant(alice, &auditor, "doc-1").await;

    assert!(granted(&f, alice, "doc-1", "read_all").await);
    assert!(!granted(&f, alice, "doc-1", "read").await);
    assert!(!granted(&f, alice, "doc-1", "READ_ALL").await);
}

#[tokio::test]
async fn grants_are_inherited_through_nested_groups() {
    let f = Fixture::new();
    let alice = Uuid::new_v4();
    let team = Uuid::new_v4();
    let department = Uuid::new_v4();
    f.resource("doc-1", "document", None).await;
    let reader = f.role("reader", "document", &["read"]).await;
    f.grant(department, &reader, "doc-1").await;

    assert!(!granted(&f, alice, "doc-1", "read").await);

    f.join(alice, team).await;
    f.join(team, department).await;

    assert!(granted(&f, alice, "doc-1", "read").await);
    assert!(granted(&f, team, "doc-1", "read").await);
}

#[tokio::test]
async fn membership_diamonds_and_loops_are_walked_once() {
    let f = Fixture::new();
    let alice = Uuid::new_v4();
    let left = Uuid::new_v4();
    let right = Uuid::new_v4();
    let top = Uuid::new_v4();
    f.resource("doc-1", "document", None).await;
    let reader = f.role("reader", "document", &["read"]).await;
    f.grant(top, &reader, "doc-1").await;

    f.join(alice, left).await;
    f.join(alice, right).await;
    f.join(left, top).await;
    f.join(right, top).await;
    f.join(top, left).await;

    let found = resolve(&f, alice, "doc-1", "read", &TraversalLimits::default())
        .await
        .unwrap();
    assert_eq!(found, 1);
}

#[tokio::test]
async fn membership_walk_stops_at_depth_bound() {
    let f = Fixture::new();
    let alice = Uuid::new_v4();
    let g1 = Uuid::new_v4();
    let g2 = Uuid::new_v4();
    let g3 = Uuid::new_v4();
    f.resource("doc-1", "document", None).await;
    let reader = f.role("reader", "document", &["read"]).await;
    f.grant(g3, &reader, "doc-1").await;
    f.join(alice, g1).await;
    f.join(g1, g2).await;
    f.join(g2, g3).await;

    let shallow = TraversalLimits {
        max_membership_depth: 2,
        ..TraversalLimits::default()
    };
    let deep = TraversalLimits {
        max_membership_depth: 3,
        ..TraversalLimits::default()
    };
    assert_eq!(resolve(&f, alice, "doc-1", "read", &shallow).await.unwrap(), 0);
    assert_eq!(resolve(&f, alice, "doc-1", "read", &deep).await.unwrap(), 1);
}

#[tokio::test]
async fn ancestor_grant_applies_through_role_mapping() {
    let f = Fixture::new();
    let alice = Uuid::new_v4();
    f.resource("team-1", "team", None).await;
    f.resource("proj-1", "project", Some("team-1")).await;
    let team_admin = f.role("admin", "team", &["manage"]).await;
    let project_admin = f.role("admin", "project", &["manage", "read"]).await;
    f.grant(alice, &team_admin, "team-1").await;

    assert!(!granted(&f, alice, "proj-1", "read").await);

    f.map_role(&team_admin, &project_admin).await;

    assert!(granted(&f, alice, "proj-1", "read").await);
    assert!(granted(&f, alice, "proj-1", "manage").await);
    assert!(!granted(&f, alice, "team-1", "read").await);
}

#[tokio::test]
async fn mappings_chain_across_several_levels() {
    let f = Fixture::new();
    let alice = Uuid::new_v4();
    f.resource("org", "organization", None).await;
    f.resource("team", "team", Some("org")).await;
    f.resource("proj", "project", Some("team")).await;
    let org_owner = f.role("owner", "organization", &["manage"]).await;
    let team_lead = f.role("lead", "team", &["manage"]).await;
    let project_editor = f.role("editor", "project", &["write"]).await;
    f.map_role(&org_owner, &team_lead).await;
    f.map_role(&team_lead, &project_editor).await;
    f.grant(alice, &org_owner, "org").await;

    assert!(granted(&f, alice, "proj", "write").await);
    assert!(granted(&f, alice, "team", "manage").await);
    assert!(!granted(&f, alice, "proj", "manage").await);
}

#[tokio::test]
async fn mapping_may_skip_intermediate_levels() {
    let f = Fixture::new();
    let alice = Uuid::new_v4();
    f.resource("org", "organization", None).await;
    f.resource("team", "team", Some("org")).await;
    f.resource("proj", "project", Some("team")).await;
    let org_owner = f.role("owner", "organization", &["manage"]).await;
    let project_viewer = f.role("viewer", "project", &["read"]).await;
    f.map_role(&org_owner, &project_viewer).await;
    f.grant(alice, &org_owner, "org").await;

    assert!(granted(&f, alice, "proj", "read").await);
}

#[tokio::test]
async fn ancestor_grant_of_wrong_type_is_ignored() {
    let f = Fixture::new();
    let alice = Uuid::new_v4();
    f.resource("team-1", "team", None).await;
    f.resource("proj-1", "project", Some("team-1")).await;
    // Granted on a team resource but the role is a project role.
    let project_admin = f.role("admin", "project", &["read"]).await;
    let project_viewer = f.role("viewer", "project", &["read"]).await;
    f.map_role(&project_admin, &project_viewer).await;
    f.grant(alice, &project_admin, "team-1").await;

    assert!(!granted(&f, alice, "proj-1", "read").await);
}

#[tokio::test]
async fn same_type_ancestors_still_need_a_mapping() {
    let f = Fixture::new();
    let alice = Uuid::new_v4();
    f.resource("folder-a", "folder", None).await;
    f.resource("folder-b", "folder", Some("folder-a")).await;
    let owner = f.role("owner", "folder", &["read"]).await;
    f.grant(alice, &owner, "folder-a").await;

    assert!(!granted(&f, alice, "folder-b", "read").await);

    f.map_role(&owner, &owner).await;

    assert!(granted(&f, alice, "folder-b", "read").await);
}

#[tokio::test]
async fn unknown_resource_is_denied() {
    let f = Fixture::new();
    let alice = Uuid::new_v4();

    assert_eq!(
        resolve(&f, alice, "missing", "read", &TraversalLimits::default())
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn hierarchy_cycle_is_reported() {
    let f = Fixture::new();
    let alice = Uuid::new_v4();
    f.resource("a", "folder", Some("b")).await;
    f.resource("b", "folder", Some("a")).await;

    let err = resolve(&f, alice, "a", "read", &TraversalLimits::default())
        .await
        .unwrap_err();
    assert!(
        matches!(err, RepositoryError::MalformedHierarchy { ref reason, .. } if reason.contains("loops back")),
        "unexpected error: {err}"
    );
}

#[tokio::test]
async fn missing_parent_is_reported() {
    let f = Fixture::new();
    let alice = Uuid::new_v4();
    f.resource("orphan", "folder", Some("gone")).await;

    let err = resolve(&f, alice, "orphan", "read", &TraversalLimits::default())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        RepositoryError::malformed_hierarchy("orphan", "parent 'gone' does not exist")
    );
}

#[tokio::test]
async fn hierarchy_walk_stops_at_depth_bound() {
    let f = Fixture::new();
    let alice = Uuid::new_v4();
    f.resource("l0", "folder", None).await;
    f.resource("l1", "folder", Some("l0")).await;
    f.resource("l2", "folder", Some("l1")).await;
    let owner = f.role("owner", "folder", &["read"]).await;
    f.map_role(&owner, &owner).await;
    f.grant(alice, &owner, "l0").await;

    let shallow = TraversalLimits {
        max_hierarchy_depth: 1,
        ..TraversalLimits::default()
    };
    let deep = TraversalLimits {
        max_hierarchy_depth: 2,
        ..TraversalLimits::default()
    };
    assert_eq!(resolve(&f, alice, "l2", "read", &shallow).await.unwrap(), 0);
    assert_eq!(resolve(&f, alice, "l2", "read", &deep).await.unwrap(), 1);
}

#[tokio::test]
async fn grant_for_missing_role_is_reported() {
    let f = Fixture::new();
    let alice = Uuid::new_v4();
    f.resource("doc-1", "document", None).await;
    let ghost = permission_sdk::Role {
        id: Uuid::new_v4(),
        name: "ghost".to_owned(),
        resource_type: "document".to_owned(),
        scopes: std::collections::BTreeSet::new(),
    };
    f.grant(alice, &ghost, "doc-1").await;

    let err = resolve(&f, alice, "doc-1", "read", &TraversalLimits::default())
        .await
        .unwrap_err();
    assert_eq!(err, RepositoryError::DanglingRole(ghost.id));
}
