mod create;
mod deactivate;
mod redeem;
mod validate;

pub use create::{CreateInviteLinkAction, CreateInviteLinkInput, CreateInviteLinkOutput};
pub use deactivate::DeactivateInviteLinksAction;
pub use redeem::RedeemInviteLinkAction;
pub use validate::ValidateInviteTokenAction;
