//! In-memory store for testing without a database.
//!
//! One `RwLock` guards all four tables, so the composite operations
//! (`change_role_logged`, `transfer_ownership`, `redeem`) are atomic under
//! the lock - the same contract the transactional backends provide. The
//! store is `Clone` over shared state so concurrent tasks can race against
//! the same data in tests.

#![allow(clippy::significant_drop_tightening)]

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;

use crate::audit::{
    AuditQuery, JoinMethod, MemberJoinLog, MemberJoinLogRepository, NewMemberJoin, NewRoleChange,
    RoleChangeLog, RoleChangeLogRepository,
};
use crate::invite::{InviteLink, InviteLinkRepository, NewInviteLink, RedeemContext};
use crate::membership::{
    ListMembersOptions, Membership, MembershipRepository, NewMembership, OwnershipTransfer,
    RoleChange, RoleCounts,
};
use crate::roles::ProjectRole;
use crate::AccessError;

#[derive(Default)]
struct State {
    memberships: Vec<Membership>,
    links: Vec<InviteLink>,
    role_changes: Vec<RoleChangeLog>,
    join_logs: Vec<MemberJoinLog>,
    next_membership_id: i64,
    next_link_id: i64,
    next_role_change_id: i64,
    next_join_log_id: i64,
}

impl State {
    fn insert_membership(&mut self, data: NewMembership) -> Result<Membership, AccessError> {
        let exists = self
            .memberships
            .iter()
            .any(|m| m.project_id == data.project_id && m.user_id == data.user_id);
        if exists {
            return Err(AccessError::DuplicateMembership);
        }
        if data.role == ProjectRole::Owner
            && self
                .memberships
                .iter()
                .any(|m| m.project_id == data.project_id && m.role == ProjectRole::Owner)
        {
            return Err(AccessError::OwnerConflict);
        }

        self.next_membership_id += 1;
        let now = Utc::now();
        let membership = Membership {
            id: self.next_membership_id,
            project_id: data.project_id,
            user_id: data.user_id,
            role: data.role,
            joined_at: now,
            updated_at: now,
        };
        self.memberships.push(membership.clone());
        Ok(membership)
    }

    fn insert_role_change(&mut self, entry: NewRoleChange) -> Result<RoleChangeLog, AccessError> {
        if entry.old_role == entry.new_role {
            return Err(AccessError::InvalidInput(
                "old and new role are identical".to_owned(),
            ));
        }
        self.next_role_change_id += 1;
        let log = RoleChangeLog {
            id: self.next_role_change_id,
            project_id: entry.project_id,
            user_id: entry.user_id,
            changed_by: entry.changed_by,
            old_role: entry.old_role,
            new_role: entry.new_role,
            reason: entry.reason,
            changed_at: Utc::now(),
        };
        self.role_changes.push(log.clone());
        Ok(log)
    }

    fn insert_join_log(&mut self, entry: NewMemberJoin) -> MemberJoinLog {
        self.next_join_log_id += 1;
        let log = MemberJoinLog {
            id: self.next_join_log_id,
            project_id: entry.project_id,
            user_id: entry.user_id,
            join_method: entry.join_method,
            invite_token_hash: entry.invite_token_hash,
            ip_address: entry.ip_address,
            user_agent: entry.user_agent,
            joined_at: Utc::now(),
        };
        self.join_logs.push(log.clone());
        log
    }
}

/// In-memory implementation of every repository trait.
#[derive(Clone, Default)]
pub struct MockStore {
    inner: Arc<RwLock<State>>,
}

impl MockStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, AccessError> {
        self.inner
            .read()
            .map_err(|_| AccessError::DatabaseError("lock poisoned".to_owned()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, AccessError> {
        self.inner
            .write()
            .map_err(|_| AccessError::DatabaseError("lock poisoned".to_owned()))
    }
}

#[async_trait]
impl MembershipRepository for MockStore {
    async fn create(&self, data: NewMembership) -> Result<Membership, AccessError> {
        self.write()?.insert_membership(data)
    }

    async fn find(
        &self,
        project_id: &str,
        user_id: &str,
    ) -> Result<Option<Membership>, AccessError> {
        let state = self.read()?;
        Ok(state
            .memberships
            .iter()
            .find(|m| m.project_id == project_id && m.user_id == user_id)
            .cloned())
    }

    async fn list_by_project(
        &self,
        project_id: &str,
        options: ListMembersOptions,
    ) -> Result<Vec<Membership>, AccessError> {
        let state = self.read()?;
        let mut members: Vec<Membership> = state
            .memberships
            .iter()
            .filter(|m| m.project_id == project_id)
            .filter(|m| options.role.is_none_or(|r| m.role == r))
            .cloned()
            .collect();
        members.sort_by(|a, b| {
            b.role
                .level()
                .cmp(&a.role.level())
                .then(a.joined_at.cmp(&b.joined_at))
        });
        if let Some(limit) = options.limit {
            members.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        }
        Ok(members)
    }

    async fn update_role(
        &self,
        project_id: &str,
        user_id: &str,
        role: ProjectRole,
    ) -> Result<Membership, AccessError> {
        let mut state = self.write()?;
        let membership = state
            .memberships
            .iter_mut()
            .find(|m| m.project_id == project_id && m.user_id == user_id)
            .ok_or(AccessError::NotAMember)?;
        membership.role = role;
        membership.updated_at = Utc::now();
        Ok(membership.clone())
    }

    async fn change_role_logged(&self, change: RoleChange) -> Result<Membership, AccessError> {
        let mut state = self.write()?;

        let old_role = state
            .memberships
            .iter()
            .find(|m| m.project_id == change.project_id && m.user_id == change.user_id)
            .map(|m| m.role)
            .ok_or(AccessError::NotAMember)?;
        if old_role == change.new_role {
            return Err(AccessError::InvalidInput(
                "role is unchanged".to_owned(),
            ));
        }

        state.insert_role_change(NewRoleChange {
            project_id: change.project_id.clone(),
            user_id: change.user_id.clone(),
            changed_by: change.changed_by,
            old_role,
            new_role: change.new_role,
            reason: change.reason,
        })?;

        let membership = state
            .memberships
            .iter_mut()
            .find(|m| m.project_id == change.project_id && m.user_id == change.user_id)
            .expect("membership present under lock");
        membership.role = change.new_role;
        membership.updated_at = Utc::now();
        Ok(membership.clone())
    }

    async fn remove(&self, project_id: &str, user_id: &str) -> Result<(), AccessError> {
        let mut state = self.write()?;
        let index = state
            .memberships
            .iter()
            .position(|m| m.project_id == project_id && m.user_id == user_id)
            .ok_or(AccessError::NotAMember)?;
        if state.memberships[index].role == ProjectRole::Owner {
            return Err(AccessError::CannotRemoveOwner);
        }
        state.memberships.remove(index);
        Ok(())
    }

    async fn remove_project(&self, project_id: &str) -> Result<u64, AccessError> {
        let mut state = self.write()?;
        let before = state.memberships.len();
        state.memberships.retain(|m| m.project_id != project_id);
        let removed = before - state.memberships.len();
        state.links.retain(|l| l.project_id != project_id);
        state.role_changes.retain(|l| l.project_id != project_id);
        state.join_logs.retain(|l| l.project_id != project_id);
        Ok(removed as u64)
    }

    async fn count_by_role(&self, project_id: &str) -> Result<RoleCounts, AccessError> {
        let state = self.read()?;
        let mut counts = RoleCounts::default();
        for membership in state.memberships.iter().filter(|m| m.project_id == project_id) {
            counts.add(membership.role, 1);
        }
        Ok(counts)
    }

    async fn transfer_ownership(
        &self,
        transfer: OwnershipTransfer,
    ) -> Result<Membership, AccessError> {
        let mut state = self.write()?;

        let owner_id = state
            .memberships
            .iter()
            .find(|m| m.project_id == transfer.project_id && m.role == ProjectRole::Owner)
            .map(|m| m.user_id.clone())
            .ok_or(AccessError::NotFound)?;
        if owner_id == transfer.new_owner_id {
            return Err(AccessError::InvalidInput(
                "user already owns this project".to_owned(),
            ));
        }
        let target_role = state
            .memberships
            .iter()
            .find(|m| m.project_id == transfer.project_id && m.user_id == transfer.new_owner_id)
            .map(|m| m.role)
            .ok_or(AccessError::NotAMember)?;

        let now = Utc::now();
        for membership in &mut state.memberships {
            if membership.project_id != transfer.project_id {
                continue;
            }
            if membership.user_id == owner_id {
                membership.role = ProjectRole::Admin;
                membership.updated_at = now;
            } else if membership.user_id == transfer.new_owner_id {
                membership.role = ProjectRole::Owner;
                membership.updated_at = now;
            }
        }

        state.insert_role_change(NewRoleChange {
            project_id: transfer.project_id.clone(),
            user_id: owner_id.clone(),
            changed_by: transfer.initiated_by.clone(),
            old_role: ProjectRole::Owner,
            new_role: ProjectRole::Admin,
            reason: Some("ownership transferred".to_owned()),
        })?;
        state.insert_role_change(NewRoleChange {
            project_id: transfer.project_id.clone(),
            user_id: transfer.new_owner_id.clone(),
            changed_by: transfer.initiated_by,
            old_role: target_role,
            new_role: ProjectRole::Owner,
            reason: Some("ownership transferred".to_owned()),
        })?;

        let membership = state
            .memberships
            .iter()
            .find(|m| m.project_id == transfer.project_id && m.user_id == transfer.new_owner_id)
            .expect("new owner present under lock");
        Ok(membership.clone())
    }
}

#[async_trait]
impl InviteLinkRepository for MockStore {
    async fn insert(&self, data: NewInviteLink) -> Result<InviteLink, AccessError> {
        let mut state = self.write()?;
        for link in &mut state.links {
            if link.project_id == data.project_id {
                link.is_active = false;
            }
        }
        state.next_link_id += 1;
        let link = InviteLink {
            id: state.next_link_id,
            project_id: data.project_id,
            created_by: data.created_by,
            token_hash: data.token_hash,
            join_role: data.join_role,
            is_active: true,
            max_uses: data.max_uses,
            current_uses: 0,
            expires_at: data.expires_at,
            created_at: Utc::now(),
        };
        state.links.push(link.clone());
        Ok(link)
    }

    async fn find_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<InviteLink>, AccessError> {
        let state = self.read()?;
        Ok(state
            .links
            .iter()
            .find(|l| l.token_hash == token_hash)
            .cloned())
    }

    async fn find_active_by_project(
        &self,
        project_id: &str,
    ) -> Result<Option<InviteLink>, AccessError> {
        let state = self.read()?;
        Ok(state
            .links
            .iter()
            .find(|l| l.project_id == project_id && l.is_active)
            .cloned())
    }

    async fn deactivate_for_project(&self, project_id: &str) -> Result<u64, AccessError> {
        let mut state = self.write()?;
        let mut deactivated = 0;
        for link in &mut state.links {
            if link.project_id == project_id && link.is_active {
                link.is_active = false;
                deactivated += 1;
            }
        }
        Ok(deactivated)
    }

    async fn redeem(
        &self,
        token_hash: &str,
        user_id: &str,
        context: RedeemContext,
    ) -> Result<Membership, AccessError> {
        // one write lock across the whole composite: the in-memory
        // equivalent of the backends' transaction
        let mut state = self.write()?;

        let (project_id, join_role) = {
            let link = state
                .links
                .iter()
                .find(|l| l.token_hash == token_hash)
                .ok_or(AccessError::InvalidOrExpiredToken)?;
            if !link.is_usable(Utc::now()) {
                return Err(AccessError::InvalidOrExpiredToken);
            }
            (link.project_id.clone(), link.join_role)
        };

        let membership = state
            .insert_membership(NewMembership {
                project_id: project_id.clone(),
                user_id: user_id.to_owned(),
                role: join_role.into(),
            })
            .map_err(|e| match e {
                AccessError::DuplicateMembership => AccessError::AlreadyMember,
                other => other,
            })?;

        state.insert_join_log(NewMemberJoin {
            project_id,
            user_id: user_id.to_owned(),
            join_method: JoinMethod::InviteLink,
            invite_token_hash: Some(token_hash.to_owned()),
            ip_address: context.ip_address,
            user_agent: context.user_agent,
        });

        let link = state
            .links
            .iter_mut()
            .find(|l| l.token_hash == token_hash)
            .expect("link present under lock");
        link.current_uses += 1;

        Ok(membership)
    }
}

#[async_trait]
impl RoleChangeLogRepository for MockStore {
    async fn append(&self, entry: NewRoleChange) -> Result<RoleChangeLog, AccessError> {
        self.write()?.insert_role_change(entry)
    }

    async fn by_project(
        &self,
        project_id: &str,
        query: AuditQuery,
    ) -> Result<Vec<RoleChangeLog>, AccessError> {
        let state = self.read()?;
        let mut entries: Vec<RoleChangeLog> = state
            .role_changes
            .iter()
            .filter(|l| l.project_id == project_id)
            .filter(|l| query.before.is_none_or(|at| l.changed_at < at))
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.changed_at.cmp(&a.changed_at).then(b.id.cmp(&a.id)));
        entries.truncate(usize::try_from(query.effective_limit()).unwrap_or(usize::MAX));
        Ok(entries)
    }

    async fn by_user(
        &self,
        user_id: &str,
        query: AuditQuery,
    ) -> Result<Vec<RoleChangeLog>, AccessError> {
        let state = self.read()?;
        let mut entries: Vec<RoleChangeLog> = state
            .role_changes
            .iter()
            .filter(|l| l.user_id == user_id)
            .filter(|l| query.before.is_none_or(|at| l.changed_at < at))
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.changed_at.cmp(&a.changed_at).then(b.id.cmp(&a.id)));
        entries.truncate(usize::try_from(query.effective_limit()).unwrap_or(usize::MAX));
        Ok(entries)
    }
}

#[async_trait]
impl MemberJoinLogRepository for MockStore {
    async fn append(&self, entry: NewMemberJoin) -> Result<MemberJoinLog, AccessError> {
        Ok(self.write()?.insert_join_log(entry))
    }

    async fn by_project(
        &self,
        project_id: &str,
        query: AuditQuery,
    ) -> Result<Vec<MemberJoinLog>, AccessError> {
        let state = self.read()?;
        let mut entries: Vec<MemberJoinLog> = state
            .join_logs
            .iter()
            .filter(|l| l.project_id == project_id)
            .filter(|l| query.before.is_none_or(|at| l.joined_at < at))
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.joined_at.cmp(&a.joined_at).then(b.id.cmp(&a.id)));
        entries.truncate(usize::try_from(query.effective_limit()).unwrap_or(usize::MAX));
        Ok(entries)
    }

    async fn by_user(
        &self,
        user_id: &str,
        query: AuditQuery,
    ) -> Result<Vec<MemberJoinLog>, AccessError> {
        let state = self.read()?;
        let mut entries: Vec<MemberJoinLog> = state
            .join_logs
            .iter()
            .filter(|l| l.user_id == user_id)
            .filter(|l| query.before.is_none_or(|at| l.joined_at < at))
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.joined_at.cmp(&a.joined_at).then(b.id.cmp(&a.id)));
        entries.truncate(usize::try_from(query.effective_limit()).unwrap_or(usize::MAX));
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_membership(project: &str, user: &str, role: ProjectRole) -> NewMembership {
        NewMembership {
            project_id: project.to_owned(),
            user_id: user.to_owned(),
            role,
        }
    }

    #[tokio::test]
    async fn test_duplicate_membership_rejected() {
        let store = MockStore::new();
        store
            .create(new_membership("p1", "u1", ProjectRole::Member))
            .await
            .unwrap();
        let result = store
            .create(new_membership("p1", "u1", ProjectRole::Viewer))
            .await;
        assert!(matches!(result, Err(AccessError::DuplicateMembership)));
    }

    #[tokio::test]
    async fn test_second_owner_rejected() {
        let store = MockStore::new();
        store
            .create(new_membership("p1", "u1", ProjectRole::Owner))
            .await
            .unwrap();
        let result = store
            .create(new_membership("p1", "u2", ProjectRole::Owner))
            .await;
        assert!(matches!(result, Err(AccessError::OwnerConflict)));

        // a different project bootstraps its own owner fine
        store
            .create(new_membership("p2", "u2", ProjectRole::Owner))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_list_by_project_orders_owners_first() {
        let store = MockStore::new();
        store
            .create(new_membership("p1", "viewer", ProjectRole::Viewer))
            .await
            .unwrap();
        store
            .create(new_membership("p1", "member", ProjectRole::Member))
            .await
            .unwrap();
        store
            .create(new_membership("p1", "owner", ProjectRole::Owner))
            .await
            .unwrap();

        let members = store
            .list_by_project("p1", ListMembersOptions::default())
            .await
            .unwrap();
        let users: Vec<&str> = members.iter().map(|m| m.user_id.as_str()).collect();
        assert_eq!(users, vec!["owner", "member", "viewer"]);
    }

    #[tokio::test]
    async fn test_list_by_project_role_filter_and_limit() {
        let store = MockStore::new();
        store
            .create(new_membership("p1", "owner", ProjectRole::Owner))
            .await
            .unwrap();
        for user in ["a", "b", "c"] {
            store
                .create(new_membership("p1", user, ProjectRole::Member))
                .await
                .unwrap();
        }

        let members = store
            .list_by_project(
                "p1",
                ListMembersOptions {
                    role: Some(ProjectRole::Member),
                    limit: Some(2),
                },
            )
            .await
            .unwrap();
        assert_eq!(members.len(), 2);
        assert!(members.iter().all(|m| m.role == ProjectRole::Member));
    }

    #[tokio::test]
    async fn test_remove_owner_fails() {
        let store = MockStore::new();
        store
            .create(new_membership("p1", "owner", ProjectRole::Owner))
            .await
            .unwrap();
        store
            .create(new_membership("p1", "member", ProjectRole::Member))
            .await
            .unwrap();

        let result = store.remove("p1", "owner").await;
        assert!(matches!(result, Err(AccessError::CannotRemoveOwner)));

        store.remove("p1", "member").await.unwrap();
        assert!(store.find("p1", "member").await.unwrap().is_none());
        assert!(matches!(
            store.remove("p1", "member").await,
            Err(AccessError::NotAMember)
        ));
    }

    #[tokio::test]
    async fn test_count_by_role() {
        let store = MockStore::new();
        store
            .create(new_membership("p1", "owner", ProjectRole::Owner))
            .await
            .unwrap();
        store
            .create(new_membership("p1", "m1", ProjectRole::Member))
            .await
            .unwrap();
        store
            .create(new_membership("p1", "m2", ProjectRole::Member))
            .await
            .unwrap();

        let counts = store.count_by_role("p1").await.unwrap();
        assert_eq!(counts.owners, 1);
        assert_eq!(counts.members, 2);
        assert_eq!(counts.total(), 3);
    }

    #[tokio::test]
    async fn test_remove_project_cascades() {
        let store = MockStore::new();
        store
            .create(new_membership("p1", "owner", ProjectRole::Owner))
            .await
            .unwrap();
        store
            .insert(crate::invite::NewInviteLink {
                project_id: "p1".to_owned(),
                created_by: "owner".to_owned(),
                token_hash: "h1".to_owned(),
                join_role: crate::roles::JoinRole::Member,
                max_uses: None,
                expires_at: None,
            })
            .await
            .unwrap();
        store.redeem("h1", "joiner", RedeemContext::default()).await.unwrap();

        let removed = store.remove_project("p1").await.unwrap();
        assert_eq!(removed, 2);
        assert!(store.find_by_token_hash("h1").await.unwrap().is_none());
        let joins = MemberJoinLogRepository::by_project(&store, "p1", AuditQuery::default())
            .await
            .unwrap();
        assert!(joins.is_empty());
    }

    #[tokio::test]
    async fn test_update_role_without_audit() {
        let store = MockStore::new();
        store
            .create(new_membership("p1", "u1", ProjectRole::Member))
            .await
            .unwrap();

        let membership = store
            .update_role("p1", "u1", ProjectRole::Viewer)
            .await
            .unwrap();
        assert_eq!(membership.role, ProjectRole::Viewer);
        assert!(membership.updated_at >= membership.joined_at);

        let changes = RoleChangeLogRepository::by_project(&store, "p1", AuditQuery::default())
            .await
            .unwrap();
        assert!(changes.is_empty());

        assert!(matches!(
            store.update_role("p1", "ghost", ProjectRole::Viewer).await,
            Err(AccessError::NotAMember)
        ));
    }

    #[tokio::test]
    async fn test_change_role_logged_is_atomic_on_noop() {
        let store = MockStore::new();
        store
            .create(new_membership("p1", "u1", ProjectRole::Member))
            .await
            .unwrap();

        let result = store
            .change_role_logged(RoleChange {
                project_id: "p1".to_owned(),
                user_id: "u1".to_owned(),
                new_role: ProjectRole::Member,
                changed_by: "owner".to_owned(),
                reason: None,
            })
            .await;
        assert!(matches!(result, Err(AccessError::InvalidInput(_))));

        let changes = RoleChangeLogRepository::by_project(&store, "p1", AuditQuery::default())
            .await
            .unwrap();
        assert!(changes.is_empty());
    }

    #[tokio::test]
    async fn test_audit_query_pagination() {
        let store = MockStore::new();
        store
            .create(new_membership("p1", "u1", ProjectRole::Member))
            .await
            .unwrap();
        for role in [ProjectRole::Viewer, ProjectRole::Member, ProjectRole::Viewer] {
            store
                .change_role_logged(RoleChange {
                    project_id: "p1".to_owned(),
                    user_id: "u1".to_owned(),
                    new_role: role,
                    changed_by: "owner".to_owned(),
                    reason: None,
                })
                .await
                .unwrap();
        }

        let page = RoleChangeLogRepository::by_project(
            &store,
            "p1",
            AuditQuery {
                limit: Some(2),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(page.len(), 2);
        // recent first
        assert!(page[0].changed_at >= page[1].changed_at);

        let next = RoleChangeLogRepository::by_project(
            &store,
            "p1",
            AuditQuery {
                before: Some(page[1].changed_at),
                limit: Some(10),
            },
        )
        .await
        .unwrap();
        assert!(next.len() <= 1);
    }
}
