//! Authentication service.
//!
//! Orchestrates registration, login, password reset and request
//! authentication on top of the three stores. Holds no state of its own
//! beyond its collaborators.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::AuthError;
use super::jwt::{generate_access_token, verify_access_token};
use crate::clock::{Clock, SystemClock};
use crate::config::AuthConfig;
use crate::mail::{Mailer, reset_password_message};
use crate::models::auth::{AuthSession, Credentials, NewUser, User};
use crate::store::{Stores, find_by_credentials, normalize_email};

/// Counts from one purge pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PurgeStats {
    pub refresh_tokens: u64,
    pub reset_tokens: u64,
}

pub struct AuthService {
    config: AuthConfig,
    stores: Stores,
    mailer: Arc<dyn Mailer>,
    clock: Arc<dyn Clock>,
}

impl AuthService {
    pub fn new(config: AuthConfig, stores: Stores, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            config,
            stores,
            mailer,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    /// Issue a fresh JWT and refresh token for `user`.
    async fn issue_session(&self, user: User) -> Result<AuthSession, AuthError> {
        let now = self.clock.now();
        let access_token = generate_access_token(
            user.id,
            self.config.jwt_secret.as_bytes(),
            self.config.jwt_expiry,
            now,
        )?;
        let refresh_token = self.stores.refresh_tokens.issue(&user, now).await?;
        Ok(AuthSession {
            user,
            access_token,
            refresh_token,
        })
    }

    /// Create a user and log them in.
    ///
    /// A uniqueness collision comes back as `Conflict` naming the field,
    /// email taking precedence over display name.
    pub async fn register(&self, new_user: NewUser) -> Result<AuthSession, AuthError> {
        let user = self
            .stores
            .users
            .create(&new_user, self.clock.now())
            .await
            .inspect_err(|e| match e {
                AuthError::Conflict(field) => debug!(%field, "registration conflict"),
                other => warn!(error = %other, "registration failed"),
            })?;
        info!(user_id = %user.id, "user registered");
        self.issue_session(user).await
    }

    /// Log in with email or display name plus password or refresh token.
    ///
    /// Unknown users, wrong passwords and dead refresh tokens are all
    /// `CredentialError`.
    pub async fn login(&self, credentials: Credentials) -> Result<AuthSession, AuthError> {
        let user = find_by_credentials(
            self.stores.users.as_ref(),
            self.stores.refresh_tokens.as_ref(),
            &credentials,
            self.clock.now(),
        )
        .await?
        .ok_or(AuthError::CredentialError)?;
        debug!(user_id = %user.id, "login succeeded");
        self.issue_session(user).await
    }

    /// Issue a reset token for `email` and mail it. One delivery attempt.
    pub async fn request_password_reset(&self, email: &str) -> Result<(), AuthError> {
        let user = self
            .stores
            .users
            .find_by_email(&normalize_email(email))
            .await?
            .ok_or_else(|| AuthError::NotFound("Email not found.".into()))?;

        let token = self
            .stores
            .reset_tokens
            .issue(&user, self.clock.now())
            .await?;

        let message = reset_password_message(&user.email, &token.token);
        self.mailer.send(&message).await.inspect_err(|e| {
            warn!(user_id = %user.id, error = %e, "failed to send reset email");
        })?;
        info!(user_id = %user.id, "password reset email sent");
        Ok(())
    }

    /// Consume a reset token and set a new password.
    ///
    /// Unknown, expired and already-consumed tokens are `Gone`.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), AuthError> {
        let now = self.clock.now();
        let user_id = self
            .stores
            .reset_tokens
            .consume(token, now)
            .await?
            .ok_or(AuthError::Gone)?;

        if !self
            .stores
            .users
            .update_password(user_id, new_password, now)
            .await?
        {
            return Err(AuthError::Gone);
        }
        info!(%user_id, "password reset");
        Ok(())
    }

    /// Resolve a bearer JWT to a live user, stamping `last_active`.
    pub async fn authenticate(&self, jwt: &str) -> Result<User, AuthError> {
        let now = self.clock.now();
        let claims = verify_access_token(jwt, self.config.jwt_secret.as_bytes(), now)
            .ok_or(AuthError::CredentialError)?;
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::CredentialError)?;

        self.stores
            .users
            .touch_last_active(user_id, now)
            .await?
            .ok_or_else(|| {
                debug!(%user_id, "token subject no longer exists");
                AuthError::CredentialError
            })
    }

    /// Delete expired and spent tokens.
    pub async fn purge_expired(&self) -> Result<PurgeStats, AuthError> {
        let now = self.clock.now();
        Ok(PurgeStats {
            refresh_tokens: self.stores.refresh_tokens.purge_expired(now).await?,
            reset_tokens: self.stores.reset_tokens.purge_expired(now).await?,
        })
    }
}
