//! Shareable, revocable invitation links.
//!
//! A link grants join rights to a project under constraints: an optional
//! expiry, an optional maximum use count, and a default join role. A project
//! has at most one active link at a time - creating a new link supersedes
//! the previous one. Tokens are stored hashed; the plain token is returned
//! exactly once at creation.

mod actions;
mod repository;
mod types;

pub use actions::{
    CreateInviteLinkAction, CreateInviteLinkInput, CreateInviteLinkOutput,
    DeactivateInviteLinksAction, RedeemInviteLinkAction, ValidateInviteTokenAction,
};
pub use repository::{InviteLinkRepository, NewInviteLink};
pub use types::{InviteLink, InviteLinkConfig, RedeemContext};
