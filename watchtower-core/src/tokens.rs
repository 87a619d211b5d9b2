use std::sync::Arc;

use chrono::Duration;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;
use watchtower_common::helpers::clock::Clock;
use watchtower_common::helpers::hash::{generate_token_secret, token_digest};
use watchtower_common::{is_unique_violation, Secret, TokenConfig, WatchtowerError};
use watchtower_db_entities::{AccessToken, User};

const MAX_LABEL_LEN: usize = 80;

/// Returned by [`TokenAuthority::issue`]. This is the only place the
/// plaintext secret ever exists.
#[derive(Clone, Debug)]
pub struct IssuedToken {
    pub token: AccessToken::Model,
    pub secret: Secret<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AuthenticatedToken {
    pub user: User::Model,
    pub token: AccessToken::Model,
}

/// Issues bearer tokens, stores only their digests, and checks presented
/// secrets against expiry and revocation.
pub struct TokenAuthority {
    db: Arc<Mutex<DatabaseConnection>>,
    clock: Arc<dyn Clock>,
    config: TokenConfig,
    new_secret: Arc<dyn Fn() -> Secret<String> + Send + Sync>,
}

impl TokenAuthority {
    pub fn new(
        db: Arc<Mutex<DatabaseConnection>>,
        clock: Arc<dyn Clock>,
        config: TokenConfig,
    ) -> Self {
        Self {
            db,
            clock,
            config,
            new_secret: Arc::new(generate_token_secret),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_secret_source(
        mut self,
        source: impl Fn() -> Secret<String> + Send + Sync + 'static,
    ) -> Self {
        self.new_secret = Arc::new(source);
        self
    }

    pub async fn issue(
        &self,
        user_id: Uuid,
        label: &str,
        ttl: Option<Duration>,
    ) -> Result<IssuedToken, WatchtowerError> {
        let label = label.trim();
        if label.is_empty() {
            return Err(WatchtowerError::invalid_argument("label is required"));
        }
        if label.chars().count() > MAX_LABEL_LEN {
            return Err(WatchtowerError::invalid_argument(format!(
                "label must be at most {MAX_LABEL_LEN} characters"
            )));
        }

        let ttl = match ttl {
            Some(ttl) => Some(ttl),
            None => self
                .config
                .default_ttl
                .map(Duration::from_std)
                .transpose()
                .map_err(|_| {
                    WatchtowerError::invalid_argument("tokens.default_ttl is too large")
                })?,
        };
        if ttl.is_some_and(|ttl| ttl <= Duration::zero()) {
            return Err(WatchtowerError::invalid_argument("ttl must be a positive duration"));
        }

        let db = self.db.lock().await;
        if User::Entity::find_by_id(user_id).one(&*db).await?.is_none() {
            return Err(WatchtowerError::UserNotFound(user_id.to_string()));
        }

        for attempt in 1..=self.config.issue_attempts {
            let secret = (self.new_secret)();
            let now = self.clock.now();
            let expires_at = match ttl {
                Some(ttl) => Some(now.checked_add_signed(ttl).ok_or_else(|| {
                    WatchtowerError::invalid_argument("ttl is out of range")
                })?),
                None => None,
            };

            let inserted = AccessToken::ActiveModel {
                id: Set(Uuid::new_v4()),
                user_id: Set(user_id),
                label: Set(label.to_owned()),
                token_hash: Set(token_digest(secret.expose_secret())),
                created_at: Set(now),
                expires_at: Set(expires_at),
                revoked_at: Set(None),
                last_used_at: Set(None),
            }
            .insert(&*db)
            .await;

            match inserted {
                Ok(token) => {
                    info!(
                        token_id = %token.id,
                        %user_id,
                        label = %token.label,
                        expires_at = ?token.expires_at,
                        "Access token issued"
                    );
                    return Ok(IssuedToken { token, secret });
                }
                Err(e) if is_unique_violation(&e) => {
                    warn!(attempt, "Token digest collision, generating a new secret");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(WatchtowerError::Conflict(
            "could not allocate a unique access token".into(),
        ))
    }

    /// Resolves a presented bearer secret to its owner. Every failure mode
    /// yields the same `Unauthenticated` error.
    pub async fn authenticate(
        &self,
        raw_secret: &str,
    ) -> Result<AuthenticatedToken, WatchtowerError> {
        let digest = token_digest(raw_secret);
        let now = self.clock.now();
        let db = self.db.lock().await;

        let found = AccessToken::Entity::find()
            .filter(AccessToken::Column::TokenHash.eq(digest))
            .find_also_related(User::Entity)
            .one(&*db)
            .await?;

        let Some((token, Some(user))) = found.filter(|(token, _)| token.is_active_at(now)) else {
            debug!("Token authentication failed");
            return Err(WatchtowerError::Unauthenticated);
        };

        let mut model: AccessToken::ActiveModel = token.clone().into();
        model.last_used_at = Set(Some(now));
        let token = match model.update(&*db).await {
            Ok(updated) => updated,
            Err(error) => {
                warn!(token_id = %token.id, ?error, "Failed to record token use");
                token
            }
        };

        debug!(token_id = %token.id, user_id = %user.id, "Token authenticated");
        Ok(AuthenticatedToken { user, token })
    }

    /// Marks a token revoked. Revoking twice keeps the first revocation time.
    pub async fn revoke(&self, token_id: Uuid) -> Result<AccessToken::Model, WatchtowerError> {
        let db = self.db.lock().await;

        let result = AccessToken::Entity::update_many()
            .col_expr(AccessToken::Column::RevokedAt, Expr::value(Some(self.clock.now())))
            .filter(AccessToken::Column::Id.eq(token_id))
            .filter(AccessToken::Column::RevokedAt.is_null())
            .exec(&*db)
            .await?;

        let token = AccessToken::Entity::find_by_id(token_id)
            .one(&*db)
            .await?
            .ok_or(WatchtowerError::TokenNotFound(token_id))?;

        if result.rows_affected > 0 {
            info!(%token_id, user_id = %token.user_id, "Access token revoked");
        } else {
            debug!(%token_id, "Access token was already revoked");
        }
        Ok(token)
    }

    pub async fn get_token(&self, token_id: Uuid) -> Result<AccessToken::Model, WatchtowerError> {
        let db = self.db.lock().await;
        AccessToken::Entity::find_by_id(token_id)
            .one(&*db)
            .await?
            .ok_or(WatchtowerError::TokenNotFound(token_id))
    }

    /// A user's tokens, newest first, including revoked and expired ones.
    pub async fn list_tokens(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<AccessToken::Model>, WatchtowerError> {
        let db = self.db.lock().await;
        Ok(AccessToken::Entity::find()
            .filter(AccessToken::Column::UserId.eq(user_id))
            .order_by_desc(AccessToken::Column::CreatedAt)
            .all(&*db)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use watchtower_common::helpers::hash::TOKEN_DIGEST_LEN;

    use super::*;
    use crate::test_support::{fixture, fixture_with, TestBed};

    fn authority_with_secrets(
        bed: &TestBed,
        source: impl Fn() -> Secret<String> + Send + Sync + 'static,
    ) -> TokenAuthority {
        TokenAuthority::new(
            bed.services.db.clone(),
            Arc::new(bed.clock.clone()),
            bed.services.config.store.tokens.clone(),
        )
        .with_secret_source(source)
    }

    #[tokio::test]
    async fn issued_secret_authenticates_its_owner() {
        let bed = fixture().await;
        let bob = bed.user("bob").await;
        let tokens = &bed.services.tokens;

        let issued = tokens
            .issue(bob.id, "script", Some(Duration::hours(24)))
            .await
            .unwrap();
        assert_eq!(issued.token.label, "script");
        assert_eq!(issued.token.created_at, bed.clock.now());
        assert_eq!(
            issued.token.expires_at,
            Some(bed.clock.now() + Duration::hours(24))
        );

        bed.clock.advance(Duration::minutes(3));
        let auth = tokens
            .authenticate(issued.secret.expose_secret())
            .await
            .unwrap();
        assert_eq!(auth.user, bob);
        assert_eq!(auth.token.id, issued.token.id);
        assert_eq!(auth.token.last_used_at, Some(bed.clock.now()));
        assert_eq!(
            tokens.get_token(issued.token.id).await.unwrap().last_used_at,
            Some(bed.clock.now())
        );
    }

    #[tokio::test]
    async fn only_the_digest_is_stored() {
        let bed = fixture().await;
        let bob = bed.user("bob").await;
        let issued = bed
            .services
            .tokens
            .issue(bob.id, "script", None)
            .await
            .unwrap();

        let stored = bed.services.tokens.get_token(issued.token.id).await.unwrap();
        assert_eq!(stored.token_hash.len(), TOKEN_DIGEST_LEN);
        assert_eq!(stored.token_hash, token_digest(issued.secret.expose_secret()));
        assert_ne!(&stored.token_hash, issued.secret.expose_secret());
        assert!(!format!("{issued:?}").contains(issued.secret.expose_secret().as_str()));

        // presenting the digest itself does not authenticate
        assert!(matches!(
            bed.services.tokens.authenticate(&stored.token_hash).await,
            Err(WatchtowerError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn token_expires_at_its_deadline() {
        let bed = fixture().await;
        let bob = bed.user("bob").await;
        let tokens = &bed.services.tokens;
        let issued = tokens
            .issue(bob.id, "script", Some(Duration::hours(24)))
            .await
            .unwrap();
        let secret = issued.secret.expose_secret();

        bed.clock.advance(Duration::hours(24) - Duration::seconds(1));
        assert!(tokens.authenticate(secret).await.is_ok());

        bed.clock.advance(Duration::seconds(1));
        assert!(matches!(
            tokens.authenticate(secret).await,
            Err(WatchtowerError::Unauthenticated)
        ));

        bed.clock.advance(Duration::hours(1));
        assert!(matches!(
            tokens.authenticate(secret).await,
            Err(WatchtowerError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn revocation_is_permanent_and_idempotent() {
        let bed = fixture().await;
        let bob = bed.user("bob").await;
        let tokens = &bed.services.tokens;
        let issued = tokens
            .issue(bob.id, "script", Some(Duration::hours(24)))
            .await
            .unwrap();
        let secret = issued.secret.expose_secret();

        let revoked = tokens.revoke(issued.token.id).await.unwrap();
        let revoked_at = revoked.revoked_at.unwrap();
        assert!(matches!(
            tokens.authenticate(secret).await,
            Err(WatchtowerError::Unauthenticated)
        ));

        bed.clock.advance(Duration::minutes(10));
        let again = tokens.revoke(issued.token.id).await.unwrap();
        assert_eq!(again.revoked_at, Some(revoked_at));
        assert!(tokens.authenticate(secret).await.is_err());

        // still rejected if the clock is wound back before revocation
        bed.clock.advance(Duration::hours(-1));
        assert!(tokens.authenticate(secret).await.is_err());
    }

    #[tokio::test]
    async fn unknown_secrets_and_tokens() {
        let bed = fixture().await;
        let tokens = &bed.services.tokens;

        for secret in ["", "not-a-token", &"x".repeat(4096)] {
            assert!(matches!(
                tokens.authenticate(secret).await,
                Err(WatchtowerError::Unauthenticated)
            ));
        }
        assert!(matches!(
            tokens.revoke(Uuid::new_v4()).await,
            Err(WatchtowerError::TokenNotFound(_))
        ));
    }

    #[tokio::test]
    async fn issue_validates_arguments() {
        let bed = fixture().await;
        let bob = bed.user("bob").await;
        let tokens = &bed.services.tokens;

        for (label, ttl) in [
            ("", None),
            ("   ", None),
            ("script", Some(Duration::zero())),
            ("script", Some(Duration::hours(-1))),
        ] {
            assert!(matches!(
                tokens.issue(bob.id, label, ttl).await,
                Err(WatchtowerError::InvalidArgument(_))
            ));
        }
        assert!(matches!(
            tokens.issue(bob.id, &"l".repeat(81), None).await,
            Err(WatchtowerError::InvalidArgument(_))
        ));
        assert!(matches!(
            tokens.issue(Uuid::new_v4(), "script", None).await,
            Err(WatchtowerError::UserNotFound(_))
        ));
        assert!(tokens.list_tokens(bob.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn tokens_without_ttl_never_expire() {
        let bed = fixture().await;
        let bob = bed.user("bob").await;
        let issued = bed
            .services
            .tokens
            .issue(bob.id, "forever", None)
            .await
            .unwrap();
        assert!(issued.token.expires_at.is_none());

        bed.clock.advance(Duration::days(3650));
        assert!(bed
            .services
            .tokens
            .authenticate(issued.secret.expose_secret())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn configured_default_ttl_applies() {
        let bed = fixture_with(|config| {
            config.store.tokens.default_ttl = Some(std::time::Duration::from_secs(3600));
        })
        .await;
        let bob = bed.user("bob").await;
        let issued = bed
            .services
            .tokens
            .issue(bob.id, "hourly", None)
            .await
            .unwrap();
        assert_eq!(
            issued.token.expires_at,
            Some(bed.clock.now() + Duration::hours(1))
        );
    }

    #[tokio::test]
    async fn listing_is_per_user_and_newest_first() {
        let bed = fixture().await;
        let alice = bed.user("alice").await;
        let bob = bed.user("bob").await;
        let tokens = &bed.services.tokens;

        let first = tokens.issue(bob.id, "first", None).await.unwrap();
        bed.clock.advance(Duration::seconds(1));
        let second = tokens.issue(bob.id, "second", None).await.unwrap();
        tokens.issue(alice.id, "other", None).await.unwrap();
        assert_ne!(first.secret, second.secret);

        let listed = tokens.list_tokens(bob.id).await.unwrap();
        assert_eq!(
            listed.iter().map(|t| t.id).collect::<Vec<_>>(),
            [second.token.id, first.token.id]
        );
    }

    #[tokio::test]
    async fn storage_rejects_duplicate_digests() {
        let bed = fixture().await;
        let bob = bed.user("bob").await;
        let issued = bed
            .services
            .tokens
            .issue(bob.id, "script", None)
            .await
            .unwrap();

        let db = bed.services.db.lock().await;
        let err = AccessToken::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(bob.id),
            label: Set("copy".into()),
            token_hash: Set(issued.token.token_hash.clone()),
            created_at: Set(bed.clock.now()),
            expires_at: Set(None),
            revoked_at: Set(None),
            last_used_at: Set(None),
        }
        .insert(&*db)
        .await
        .unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[tokio::test]
    async fn digest_collision_is_retried_with_a_fresh_secret() {
        let bed = fixture().await;
        let bob = bed.user("bob").await;
        let first = bed
            .services
            .tokens
            .issue(bob.id, "first", None)
            .await
            .unwrap();

        let calls = Arc::new(AtomicU32::new(0));
        let tokens = authority_with_secrets(&bed, {
            let calls = calls.clone();
            let taken = first.secret.clone();
            move || {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    taken.clone()
                } else {
                    generate_token_secret()
                }
            }
        });

        let second = tokens.issue(bob.id, "second", None).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_ne!(second.secret, first.secret);
        assert_ne!(second.token.token_hash, first.token.token_hash);

        let auth = tokens
            .authenticate(first.secret.expose_secret())
            .await
            .unwrap();
        assert_eq!(auth.token.id, first.token.id);
        let auth = tokens
            .authenticate(second.secret.expose_secret())
            .await
            .unwrap();
        assert_eq!(auth.token.id, second.token.id);
    }

    #[tokio::test]
    async fn persistent_collisions_end_in_conflict() {
        let bed = fixture().await;
        let bob = bed.user("bob").await;
        let first = bed
            .services
            .tokens
            .issue(bob.id, "first", None)
            .await
            .unwrap();

        let calls = Arc::new(AtomicU32::new(0));
        let tokens = authority_with_secrets(&bed, {
            let calls = calls.clone();
            let taken = first.secret.clone();
            move || {
                calls.fetch_add(1, Ordering::SeqCst);
                taken.clone()
            }
        });

        assert!(matches!(
            tokens.issue(bob.id, "second", None).await,
            Err(WatchtowerError::Conflict(_))
        ));
        assert_eq!(
            calls.load(Ordering::SeqCst),
            bed.services.config.store.tokens.issue_attempts
        );
        assert_eq!(tokens.list_tokens(bob.id).await.unwrap().len(), 1);
    }
}
