//! Persistence for users, refresh tokens and reset tokens.
//!
//! Each entity has its own store trait; every store owns its invariants
//! (uniqueness, expiry). `postgres` is the production backend, `memory`
//! mirrors it for tests and database-less runs.

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::AuthError;
use crate::auth::password::{hash_password, verify_password};
use crate::auth::slug::kebab_case;
use crate::config::AuthConfig;
use crate::models::auth::{Credentials, Identifier, IssuedToken, NewUser, Secret, User};

/// User records.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Normalise and insert a new user. Fails with `Conflict` when the email
    /// or the derived slug is taken; email is reported first.
    async fn create(&self, new_user: &NewUser, now: DateTime<Utc>) -> Result<User, AuthError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AuthError>;

    /// Lookup by (normalised) email.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError>;

    /// Lookup by slug name.
    async fn find_by_name(&self, name: &str) -> Result<Option<User>, AuthError>;

    /// Re-hash with a fresh salt and persist. Returns `false` if the user is gone.
    async fn update_password(
        &self,
        id: Uuid,
        new_password: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, AuthError>;

    /// Set `last_active` without touching `updated_at`, returning the user.
    async fn touch_last_active(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, AuthError>;

    /// Remove a user and, with it, every token they own.
    async fn delete(&self, id: Uuid) -> Result<bool, AuthError>;
}

/// Refresh tokens: `Issued → Used (grace window) → Purged`.
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// Generate, persist and return a new token for `user`.
    async fn issue(&self, user: &User, now: DateTime<Utc>) -> Result<IssuedToken, AuthError>;

    /// `true` if `token` belongs to `email`, has not expired and is either
    /// unused or still inside its grace window. Marks it used on first success.
    async fn validate(&self, email: &str, token: &str, now: DateTime<Utc>)
    -> Result<bool, AuthError>;

    /// Delete expired tokens and used tokens past their grace window.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, AuthError>;
}

/// Single-use password reset tokens.
#[async_trait]
pub trait ResetTokenStore: Send + Sync {
    async fn issue(&self, user: &User, now: DateTime<Utc>) -> Result<IssuedToken, AuthError>;

    /// Look up an unexpired token; if found delete every reset token of its
    /// owner and return the owner id.
    async fn consume(&self, token: &str, now: DateTime<Utc>) -> Result<Option<Uuid>, AuthError>;

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, AuthError>;
}

/// The three stores the service composes.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn CredentialStore>,
    pub refresh_tokens: Arc<dyn RefreshTokenStore>,
    pub reset_tokens: Arc<dyn ResetTokenStore>,
}

impl Stores {
    /// PostgreSQL-backed stores sharing one pool.
    pub fn postgres(pool: PgPool, config: &AuthConfig) -> Self {
        Self {
            users: Arc::new(postgres::PgCredentialStore::new(
                pool.clone(),
                config.bcrypt_cost,
            )),
            refresh_tokens: Arc::new(postgres::PgRefreshTokenStore::new(
                pool.clone(),
                config.refresh_token_ttl,
                config.refresh_grace,
            )),
            reset_tokens: Arc::new(postgres::PgResetTokenStore::new(
                pool,
                config.reset_token_ttl,
            )),
        }
    }

    /// In-process stores. Deleting a user here does not cascade to tokens;
    /// orphaned tokens stop resolving to a user and are purged on expiry.
    pub fn in_memory(config: &AuthConfig) -> Self {
        Self {
            users: Arc::new(memory::MemoryCredentialStore::new(config.bcrypt_cost)),
            refresh_tokens: Arc::new(memory::MemoryRefreshTokenStore::new(
                config.refresh_token_ttl,
                config.refresh_grace,
            )),
            reset_tokens: Arc::new(memory::MemoryResetTokenStore::new(config.reset_token_ttl)),
        }
    }
}

/// User fields as they are written, derived from raw input.
#[derive(Clone)]
pub struct NormalizedUser {
    pub email: String,
    pub display_name: String,
    pub name: String,
    pub password_hash: String,
}

/// Trimmed, lowercased email.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Normalise a new user before it is persisted: email trimmed and lowercased,
/// display name trimmed, slug derived from the display name, password hashed.
pub fn normalize_before_persist(new_user: &NewUser, cost: u32) -> Result<NormalizedUser, AuthError> {
    let display_name = new_user.display_name.trim().to_string();
    let name = kebab_case(&display_name);
    if name.is_empty() {
        return Err(AuthError::ValidationError(
            "Display name must contain letters or digits".into(),
        ));
    }
    Ok(NormalizedUser {
        email: normalize_email(&new_user.email),
        display_name,
        name,
        password_hash: hash_password(&new_user.password, cost)?,
    })
}

/// Resolve login credentials to a user.
///
/// Looks the user up by email or by the slug of the display name, then checks
/// the password or validates the refresh token. Every mismatch, including an
/// unknown user, is `None`.
pub async fn find_by_credentials(
    users: &dyn CredentialStore,
    refresh_tokens: &dyn RefreshTokenStore,
    credentials: &Credentials,
    now: DateTime<Utc>,
) -> Result<Option<User>, AuthError> {
    let user = match &credentials.identifier {
        Identifier::Email(email) => users.find_by_email(&normalize_email(email)).await?,
        Identifier::DisplayName(display_name) => {
            let name = kebab_case(display_name);
            if name.is_empty() {
                return Ok(None);
            }
            users.find_by_name(&name).await?
        }
    };
    let Some(user) = user else {
        return Ok(None);
    };

    let matches = match &credentials.secret {
        Secret::Password(password) => verify_password(password, &user.password_hash)?,
        Secret::RefreshToken(token) => refresh_tokens.validate(&user.email, token, now).await?,
    };

    Ok(matches.then_some(user))
}
