//! Project access control for multi-tenant collaboration platforms.
//!
//! `parapet` answers one question - "may this user do that to this project?" -
//! and manages the state behind the answer: per-project memberships with a
//! role hierarchy, shareable invitation links with expiry and usage bounds,
//! and an append-only audit trail of privilege changes and joins.
//!
//! The crate is a library consumed by route handlers. It never authenticates
//! anyone; it takes opaque project and user identifiers from the caller and
//! returns typed results or typed failures. Mapping failures to transport
//! responses is the caller's job.
//!
//! Storage is pluggable through repository traits, with `PostgreSQL`
//! (`sqlx_postgres`), `SQLite` (`sqlx_sqlite`), and in-memory mock (`mocks`)
//! implementations.

pub mod audit;
pub mod crypto;
pub mod invite;
pub mod membership;
pub mod permissions;
pub mod roles;

#[cfg(feature = "mocks")]
pub mod mocks;

#[cfg(feature = "sqlx_postgres")]
pub mod postgres;

#[cfg(feature = "sqlx_sqlite")]
pub mod sqlite;

pub use audit::{
    AuditQuery, JoinMethod, MemberJoinLog, MemberJoinLogRepository, NewMemberJoin, NewRoleChange,
    RoleChangeLog, RoleChangeLogRepository,
};
pub use crypto::SecretString;
pub use invite::{
    CreateInviteLinkAction, CreateInviteLinkInput, CreateInviteLinkOutput,
    DeactivateInviteLinksAction, InviteLink, InviteLinkConfig, InviteLinkRepository, NewInviteLink,
    RedeemContext, RedeemInviteLinkAction, ValidateInviteTokenAction,
};
pub use membership::{
    AddMemberAction, AddMemberInput, ListMembersOptions, Membership, MembershipRepository,
    NewMembership, OwnershipTransfer, RoleChange, RoleCounts, TransferOwnershipAction,
};
pub use permissions::PermissionService;
pub use roles::{JoinRole, ProjectRole};

#[cfg(feature = "mocks")]
pub use mocks::MockStore;

use std::fmt;

/// Errors returned by access-control operations.
///
/// All variants except `DatabaseError` are expected, recoverable outcomes
/// that the calling route handler translates into a user-facing response.
/// `DatabaseError` signals a persistence-layer fault and should surface as a
/// generic failure without leaking internals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    /// Referenced project, link, or record does not exist.
    NotFound,
    /// The user has no membership in the project.
    NotAMember,
    /// The actor lacks the role level required for the action.
    Forbidden,
    /// A membership for this (project, user) pair already exists.
    DuplicateMembership,
    /// The redeeming user is already a member of the project.
    AlreadyMember,
    /// The project already has an owner.
    OwnerConflict,
    /// The target is the project owner; ownership must be transferred first.
    CannotRemoveOwner,
    /// Invitation token absent, inactive, expired, or usage-exhausted.
    InvalidOrExpiredToken,
    /// Malformed or rejected input (bad role, non-positive max uses,
    /// past expiry, no-op role change).
    InvalidInput(String),
    /// Unexpected persistence-layer failure.
    DatabaseError(String),
}

impl std::error::Error for AccessError {}

impl fmt::Display for AccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessError::NotFound => write!(f, "Not found"),
            AccessError::NotAMember => write!(f, "User is not a member of this project"),
            AccessError::Forbidden => write!(f, "Insufficient role for this action"),
            AccessError::DuplicateMembership => write!(f, "Membership already exists"),
            AccessError::AlreadyMember => write!(f, "User is already a member of this project"),
            AccessError::OwnerConflict => write!(f, "Project already has an owner"),
            AccessError::CannotRemoveOwner => {
                write!(f, "Cannot remove the project owner; transfer ownership first")
            }
            AccessError::InvalidOrExpiredToken => write!(f, "Invitation link is invalid or expired"),
            AccessError::InvalidInput(msg) => write!(f, "Invalid input: {msg}"),
            AccessError::DatabaseError(msg) => write!(f, "Database error: {msg}"),
        }
    }
}
