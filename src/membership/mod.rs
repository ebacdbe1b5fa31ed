//! Project memberships: the record binding a user to a project with a role.

mod actions;
mod repository;
mod types;

pub use actions::{AddMemberAction, AddMemberInput, TransferOwnershipAction};
pub use repository::{
    MembershipRepository, NewMembership, OwnershipTransfer, RoleChange,
};
pub use types::{ListMembersOptions, Membership, RoleCounts};
