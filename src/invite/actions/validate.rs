use chrono::Utc;

use crate::crypto::hash_token;
use crate::invite::{InviteLink, InviteLinkRepository};
use crate::{AccessError, SecretString};

/// Action to check an invitation token before redeeming it.
///
/// Route handlers use this on the `/join/{token}` landing page to show the
/// invitee what they are joining. The answer is advisory: a concurrent
/// redemption can exhaust the link between this check and
/// [`RedeemInviteLinkAction`](crate::RedeemInviteLinkAction), which re-checks
/// inside its transaction.
pub struct ValidateInviteTokenAction<L>
where
    L: InviteLinkRepository,
{
    links: L,
}

impl<L> ValidateInviteTokenAction<L>
where
    L: InviteLinkRepository,
{
    /// Creates a new `ValidateInviteTokenAction`.
    pub fn new(links: L) -> Self {
        Self { links }
    }

    /// Looks up the token and checks usability.
    ///
    /// # Errors
    ///
    /// - `InvalidOrExpiredToken` - unknown token, or the link is inactive,
    ///   expired, or usage-exhausted. Unknown and unusable are deliberately
    ///   indistinguishable to the caller.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "validate_invite_token", skip_all, err)
    )]
    pub async fn execute(&self, token: &SecretString) -> Result<InviteLink, AccessError> {
        let token_hash = hash_token(token.expose_secret());

        let link = self
            .links
            .find_by_token_hash(&token_hash)
            .await?
            .ok_or(AccessError::InvalidOrExpiredToken)?;

        if !link.is_usable(Utc::now()) {
            return Err(AccessError::InvalidOrExpiredToken);
        }

        Ok(link)
    }
}
