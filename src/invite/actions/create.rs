use chrono::{DateTime, Utc};

use crate::crypto::{generate_invite_token, hash_token};
use crate::invite::{InviteLink, InviteLinkConfig, InviteLinkRepository, NewInviteLink};
use crate::membership::MembershipRepository;
use crate::permissions::PermissionService;
use crate::roles::{JoinRole, ProjectRole};
use crate::{AccessError, SecretString};

/// Input for creating an invitation link.
#[derive(Debug, Clone)]
pub struct CreateInviteLinkInput {
    pub project_id: String,
    pub created_by: String,
    /// Role granted on join. Defaults to `Member`.
    pub join_role: JoinRole,
    /// Maximum successful redemptions; `None` is unlimited. Zero is
    /// rejected, not treated as unlimited.
    pub max_uses: Option<i32>,
    /// Explicit expiry; when `None` the config default applies.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Output from creating an invitation link.
#[derive(Debug)]
pub struct CreateInviteLinkOutput {
    /// The created link record (token stored hashed).
    pub link: InviteLink,
    /// The plain token for the `/join/{token}` URL. Not stored and only
    /// returned once.
    pub token: SecretString,
}

/// Action to create a project invitation link.
///
/// This action:
/// 1. Verifies the creator holds at least `Admin` on the project
/// 2. Validates the usage bound and expiry
/// 3. Generates a high-entropy token and stores its hash
/// 4. Persists the link, superseding any previously active link
pub struct CreateInviteLinkAction<M, L>
where
    M: MembershipRepository,
    L: InviteLinkRepository,
{
    permissions: PermissionService<M>,
    links: L,
    config: InviteLinkConfig,
}

impl<M, L> CreateInviteLinkAction<M, L>
where
    M: MembershipRepository,
    L: InviteLinkRepository,
{
    /// Creates a new `CreateInviteLinkAction` with default configuration.
    pub fn new(memberships: M, links: L) -> Self {
        Self::with_config(memberships, links, InviteLinkConfig::default())
    }

    /// Creates a new `CreateInviteLinkAction` with custom configuration.
    pub fn with_config(memberships: M, links: L, config: InviteLinkConfig) -> Self {
        Self {
            permissions: PermissionService::new(memberships),
            links,
            config,
        }
    }

    /// Creates the link and returns it with the plain token.
    ///
    /// # Errors
    ///
    /// - `Forbidden` - creator is not at least `Admin` on the project
    /// - `InvalidInput` - `max_uses` is zero or negative, or `expires_at`
    ///   is not in the future
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "create_invite_link", skip_all, err)
    )]
    pub async fn execute(
        &self,
        input: CreateInviteLinkInput,
    ) -> Result<CreateInviteLinkOutput, AccessError> {
        self.permissions
            .require(&input.project_id, &input.created_by, ProjectRole::Admin)
            .await?;

        let now = Utc::now();
        if let Some(max) = input.max_uses {
            if max <= 0 {
                return Err(AccessError::InvalidInput(
                    "max_uses must be positive".to_owned(),
                ));
            }
        }
        if let Some(at) = input.expires_at {
            if at <= now {
                return Err(AccessError::InvalidInput(
                    "expires_at must be in the future".to_owned(),
                ));
            }
        }

        let expires_at = input
            .expires_at
            .or_else(|| self.config.default_expiry.map(|d| now + d));

        let token = generate_invite_token(self.config.token_random_len);
        let token_hash = hash_token(&token);

        let link = self
            .links
            .insert(NewInviteLink {
                project_id: input.project_id,
                created_by: input.created_by,
                token_hash,
                join_role: input.join_role,
                max_uses: input.max_uses,
                expires_at,
            })
            .await?;

        log::info!(
            target: "parapet",
            "msg=\"invite link created\", project_id=\"{}\", link_id={}, created_by=\"{}\", join_role=\"{}\"",
            link.project_id,
            link.id,
            link.created_by,
            link.join_role.as_str()
        );

        Ok(CreateInviteLinkOutput {
            link,
            token: SecretString::new(token),
        })
    }
}

#[cfg(all(test, feature = "mocks"))]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::membership::NewMembership;
    use crate::mocks::MockStore;

    async fn seed_admin(store: &MockStore) {
        store
            .create(NewMembership {
                project_id: "p1".to_owned(),
                user_id: "owner".to_owned(),
                role: ProjectRole::Owner,
            })
            .await
            .unwrap();
        store
            .create(NewMembership {
                project_id: "p1".to_owned(),
                user_id: "admin".to_owned(),
                role: ProjectRole::Admin,
            })
            .await
            .unwrap();
    }

    fn input(created_by: &str) -> CreateInviteLinkInput {
        CreateInviteLinkInput {
            project_id: "p1".to_owned(),
            created_by: created_by.to_owned(),
            join_role: JoinRole::default(),
            max_uses: None,
            expires_at: None,
        }
    }

    #[tokio::test]
    async fn test_create_success_returns_plain_token() {
        let store = MockStore::new();
        seed_admin(&store).await;

        let action = CreateInviteLinkAction::new(store.clone(), store.clone());
        let output = action.execute(input("admin")).await.unwrap();

        assert!(output.link.is_active);
        assert_eq!(output.link.current_uses, 0);
        assert!(!output.token.expose_secret().is_empty());
        // stored hash matches the returned token
        assert_eq!(
            output.link.token_hash,
            hash_token(output.token.expose_secret())
        );
    }

    #[tokio::test]
    async fn test_create_applies_default_expiry() {
        let store = MockStore::new();
        seed_admin(&store).await;

        let action = CreateInviteLinkAction::new(store.clone(), store.clone());
        let output = action.execute(input("owner")).await.unwrap();

        let expires_at = output.link.expires_at.expect("default expiry applied");
        let diff = (expires_at - (Utc::now() + Duration::days(7)))
            .num_seconds()
            .abs();
        assert!(diff < 5, "expiry should be ~7 days from now");
    }

    #[tokio::test]
    async fn test_create_requires_admin() {
        let store = MockStore::new();
        seed_admin(&store).await;
        store
            .create(NewMembership {
                project_id: "p1".to_owned(),
                user_id: "member".to_owned(),
                role: ProjectRole::Member,
            })
            .await
            .unwrap();

        let action = CreateInviteLinkAction::new(store.clone(), store.clone());
        let result = action.execute(input("member")).await;
        assert!(matches!(result, Err(AccessError::Forbidden)));

        let result = action.execute(input("stranger")).await;
        assert!(matches!(result, Err(AccessError::Forbidden)));
    }

    #[tokio::test]
    async fn test_create_rejects_zero_max_uses() {
        let store = MockStore::new();
        seed_admin(&store).await;

        let action = CreateInviteLinkAction::new(store.clone(), store.clone());
        let result = action
            .execute(CreateInviteLinkInput {
                max_uses: Some(0),
                ..input("admin")
            })
            .await;
        assert!(matches!(result, Err(AccessError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_create_rejects_past_expiry() {
        let store = MockStore::new();
        seed_admin(&store).await;

        let action = CreateInviteLinkAction::new(store.clone(), store.clone());
        let result = action
            .execute(CreateInviteLinkInput {
                expires_at: Some(Utc::now() - Duration::hours(1)),
                ..input("admin")
            })
            .await;
        assert!(matches!(result, Err(AccessError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_create_supersedes_previous_link() {
        let store = MockStore::new();
        seed_admin(&store).await;

        let action = CreateInviteLinkAction::new(store.clone(), store.clone());
        let first = action.execute(input("admin")).await.unwrap();
        let second = action.execute(input("admin")).await.unwrap();

        let old = store
            .find_by_token_hash(&first.link.token_hash)
            .await
            .unwrap()
            .unwrap();
        assert!(!old.is_active);

        let active = store.find_active_by_project("p1").await.unwrap().unwrap();
        assert_eq!(active.id, second.link.id);
    }
}
