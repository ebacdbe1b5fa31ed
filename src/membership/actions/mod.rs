mod add_member;
mod transfer_ownership;

pub use add_member::{AddMemberAction, AddMemberInput};
pub use transfer_ownership::TransferOwnershipAction;
