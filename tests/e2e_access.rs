//! End-to-end tests for memberships, permissions, and the audit trail.
//!
//! These tests drive the public API against the in-memory store.
//! Run with: `cargo test --features mocks --test e2e_access`

#![cfg(feature = "mocks")]
#![allow(clippy::unwrap_used, clippy::expect_used)]

use parapet::{
    AccessError, AddMemberAction, AddMemberInput, AuditQuery, JoinMethod, ListMembersOptions,
    MemberJoinLogRepository, MembershipRepository, MockStore, NewMembership, PermissionService,
    ProjectRole, RoleChangeLogRepository, TransferOwnershipAction,
};

async fn bootstrap_project(store: &MockStore, project: &str, owner: &str) {
    store
        .create(NewMembership {
            project_id: project.to_owned(),
            user_id: owner.to_owned(),
            role: ProjectRole::Owner,
        })
        .await
        .unwrap();
}

async fn add(store: &MockStore, project: &str, user: &str, role: ProjectRole) {
    store
        .create(NewMembership {
            project_id: project.to_owned(),
            user_id: user.to_owned(),
            role,
        })
        .await
        .unwrap();
}

// Scenario: create project -> owner membership exists and passes the
// lowest-bar permission check.
#[tokio::test]
async fn test_project_bootstrap_grants_owner() {
    let store = MockStore::new();
    bootstrap_project(&store, "proj", "alice").await;

    let membership = store.find("proj", "alice").await.unwrap().unwrap();
    assert_eq!(membership.role, ProjectRole::Owner);
    assert_eq!(membership.role.level(), 4);

    let permissions = PermissionService::new(store);
    assert!(permissions
        .has_permission("proj", "alice", ProjectRole::Viewer)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_single_owner_invariant_held_across_projects() {
    let store = MockStore::new();
    bootstrap_project(&store, "p1", "alice").await;
    bootstrap_project(&store, "p2", "bob").await;

    let result = store
        .create(NewMembership {
            project_id: "p1".to_owned(),
            user_id: "mallory".to_owned(),
            role: ProjectRole::Owner,
        })
        .await;
    assert!(matches!(result, Err(AccessError::OwnerConflict)));

    for project in ["p1", "p2"] {
        let counts = store.count_by_role(project).await.unwrap();
        assert_eq!(counts.owners, 1);
    }
}

#[tokio::test]
async fn test_member_listing_owners_first_contract() {
    let store = MockStore::new();
    bootstrap_project(&store, "proj", "owner").await;
    add(&store, "proj", "viewer-1", ProjectRole::Viewer).await;
    add(&store, "proj", "admin-1", ProjectRole::Admin).await;
    add(&store, "proj", "member-1", ProjectRole::Member).await;
    add(&store, "proj", "member-2", ProjectRole::Member).await;

    let members = store
        .list_by_project("proj", ListMembersOptions::default())
        .await
        .unwrap();
    let users: Vec<&str> = members.iter().map(|m| m.user_id.as_str()).collect();
    assert_eq!(
        users,
        vec!["owner", "admin-1", "member-1", "member-2", "viewer-1"]
    );
}

// Scenario: owner downgrades a member; the membership mutates and exactly
// one audit row records old role, new role, and reason.
#[tokio::test]
async fn test_role_downgrade_with_audit_trail() {
    let store = MockStore::new();
    bootstrap_project(&store, "proj", "owner").await;
    add(&store, "proj", "carol", ProjectRole::Member).await;

    let permissions = PermissionService::new(store.clone());
    let membership = permissions
        .change_role(
            "proj",
            "carol",
            ProjectRole::Viewer,
            "owner",
            Some("downgrade".to_owned()),
        )
        .await
        .unwrap();
    assert_eq!(membership.role, ProjectRole::Viewer);

    let changes = RoleChangeLogRepository::by_project(&store, "proj", AuditQuery::default())
        .await
        .unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].old_role, ProjectRole::Member);
    assert_eq!(changes[0].new_role, ProjectRole::Viewer);
    assert_eq!(changes[0].changed_by, "owner");
    assert_eq!(changes[0].reason.as_deref(), Some("downgrade"));
}

#[tokio::test]
async fn test_noop_role_change_rejected_without_audit_row() {
    let store = MockStore::new();
    bootstrap_project(&store, "proj", "owner").await;
    add(&store, "proj", "carol", ProjectRole::Member).await;

    let permissions = PermissionService::new(store.clone());
    let result = permissions
        .change_role("proj", "carol", ProjectRole::Member, "owner", None)
        .await;
    assert!(matches!(result, Err(AccessError::InvalidInput(_))));

    let changes = RoleChangeLogRepository::by_project(&store, "proj", AuditQuery::default())
        .await
        .unwrap();
    assert!(changes.is_empty());
}

#[tokio::test]
async fn test_owner_removal_blocked_until_transfer() {
    let store = MockStore::new();
    bootstrap_project(&store, "proj", "alice").await;
    add(&store, "proj", "bob", ProjectRole::Member).await;

    assert!(matches!(
        store.remove("proj", "alice").await,
        Err(AccessError::CannotRemoveOwner)
    ));

    let transfer = TransferOwnershipAction::new(store.clone());
    transfer.execute("proj", "bob", "alice").await.unwrap();

    // the demoted previous owner can leave now
    store.remove("proj", "alice").await.unwrap();
    let counts = store.count_by_role("proj").await.unwrap();
    assert_eq!(counts.owners, 1);
    assert_eq!(counts.total(), 1);
}

#[tokio::test]
async fn test_direct_add_flow_and_join_log_queries() {
    let store = MockStore::new();
    bootstrap_project(&store, "proj", "owner").await;

    let action = AddMemberAction::new(store.clone(), store.clone());
    action
        .execute(AddMemberInput {
            project_id: "proj".to_owned(),
            user_id: "dave".to_owned(),
            role: ProjectRole::Viewer,
            added_by: "owner".to_owned(),
        })
        .await
        .unwrap();

    let by_user = MemberJoinLogRepository::by_user(&store, "dave", AuditQuery::default())
        .await
        .unwrap();
    assert_eq!(by_user.len(), 1);
    assert_eq!(by_user[0].join_method, JoinMethod::AdminAdded);
    assert_eq!(by_user[0].project_id, "proj");
}

#[tokio::test]
async fn test_project_deletion_cascades_all_state() {
    let store = MockStore::new();
    bootstrap_project(&store, "proj", "owner").await;
    add(&store, "proj", "erin", ProjectRole::Member).await;

    let permissions = PermissionService::new(store.clone());
    permissions
        .change_role("proj", "erin", ProjectRole::Viewer, "owner", None)
        .await
        .unwrap();

    let removed = store.remove_project("proj").await.unwrap();
    assert_eq!(removed, 2);

    assert!(store.find("proj", "owner").await.unwrap().is_none());
    let changes = RoleChangeLogRepository::by_project(&store, "proj", AuditQuery::default())
        .await
        .unwrap();
    assert!(changes.is_empty());
}

#[tokio::test]
async fn test_permission_checks_always_read_current_state() {
    let store = MockStore::new();
    bootstrap_project(&store, "proj", "owner").await;
    add(&store, "proj", "frank", ProjectRole::Admin).await;

    let permissions = PermissionService::new(store.clone());
    assert!(permissions
        .has_permission("proj", "frank", ProjectRole::Admin)
        .await
        .unwrap());

    permissions
        .change_role("proj", "frank", ProjectRole::Viewer, "owner", None)
        .await
        .unwrap();

    // the demotion is visible on the very next check
    assert!(!permissions
        .has_permission("proj", "frank", ProjectRole::Admin)
        .await
        .unwrap());

    store.remove("proj", "frank").await.unwrap();
    assert!(!permissions
        .has_permission("proj", "frank", ProjectRole::Viewer)
        .await
        .unwrap());
}
