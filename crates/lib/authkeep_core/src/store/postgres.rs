//! PostgreSQL stores.
//!
//! Uniqueness is enforced by the `users` constraints and surfaced as
//! `Conflict`. Expiry is enforced on every read; `purge_expired` removes the
//! dead rows.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{CredentialStore, RefreshTokenStore, ResetTokenStore, normalize_before_persist};
use crate::auth::password::hash_password;
use crate::auth::tokens::{generate_refresh_token, generate_reset_token, hash_token};
use crate::auth::{AuthError, ConflictField};
use crate::models::auth::{IssuedToken, NewUser, Role, User};

const USER_COLUMNS: &str = "id, email, display_name, name, password_hash, role, \
     created_at, updated_at, last_active";

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    display_name: String,
    name: String,
    password_hash: String,
    role: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    last_active: Option<DateTime<Utc>>,
}

impl TryFrom<UserRow> for User {
    type Error = AuthError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: row.id,
            email: row.email,
            display_name: row.display_name,
            name: row.name,
            password_hash: row.password_hash,
            role: row.role.parse::<Role>().map_err(AuthError::Internal)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
            last_active: row.last_active,
        })
    }
}

fn into_user(row: Option<UserRow>) -> Result<Option<User>, AuthError> {
    row.map(User::try_from).transpose()
}

/// Users in the `users` table.
pub struct PgCredentialStore {
    pool: PgPool,
    bcrypt_cost: u32,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool, bcrypt_cost: u32) -> Self {
        Self { pool, bcrypt_cost }
    }

    async fn email_exists(&self, email: &str) -> Result<bool, AuthError> {
        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
                .bind(email)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn find_one(&self, filter: &str, value: &str) -> Result<Option<User>, AuthError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {filter} = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;
        into_user(row)
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn create(&self, new_user: &NewUser, now: DateTime<Utc>) -> Result<User, AuthError> {
        let normalized = normalize_before_persist(new_user, self.bcrypt_cost)?;

        let sql = format!(
            "INSERT INTO users (id, email, display_name, name, password_hash, role, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $7) \
             RETURNING {USER_COLUMNS}"
        );
        let result = sqlx::query_as::<_, UserRow>(&sql)
            .bind(Uuid::now_v7())
            .bind(&normalized.email)
            .bind(&normalized.display_name)
            .bind(&normalized.name)
            .bind(&normalized.password_hash)
            .bind(Role::User.as_str())
            .bind(now)
            .fetch_one(&self.pool)
            .await;

        match result {
            Ok(row) => User::try_from(row),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                // Report email first regardless of which constraint fired.
                if self.email_exists(&normalized.email).await? {
                    Err(AuthError::Conflict(ConflictField::Email))
                } else {
                    Err(AuthError::Conflict(ConflictField::DisplayName))
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AuthError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        into_user(row)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        self.find_one("email", email).await
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<User>, AuthError> {
        self.find_one("name", name).await
    }

    async fn update_password(
        &self,
        id: Uuid,
        new_password: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, AuthError> {
        let password_hash = hash_password(new_password, self.bcrypt_cost)?;
        let result =
            sqlx::query("UPDATE users SET password_hash = $2, updated_at = $3 WHERE id = $1")
                .bind(id)
                .bind(&password_hash)
                .bind(now)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn touch_last_active(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, AuthError> {
        let sql = format!("UPDATE users SET last_active = $2 WHERE id = $1 RETURNING {USER_COLUMNS}");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;
        into_user(row)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AuthError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Refresh tokens in the `refresh_tokens` table.
pub struct PgRefreshTokenStore {
    pool: PgPool,
    ttl: Duration,
    grace: Duration,
}

impl PgRefreshTokenStore {
    pub fn new(pool: PgPool, ttl: Duration, grace: Duration) -> Self {
        Self { pool, ttl, grace }
    }
}

#[async_trait]
impl RefreshTokenStore for PgRefreshTokenStore {
    async fn issue(&self, user: &User, now: DateTime<Utc>) -> Result<IssuedToken, AuthError> {
        let token = generate_refresh_token(user.id);
        let expires_at = now + self.ttl;
        sqlx::query(
            "INSERT INTO refresh_tokens (id, user_id, email, token_hash, expires_at, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(Uuid::now_v7())
        .bind(user.id)
        .bind(&user.email)
        .bind(hash_token(&token))
        .bind(expires_at)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(IssuedToken { token, expires_at })
    }

    async fn validate(
        &self,
        email: &str,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, AuthError> {
        // First use stamps used_at; later uses inside the window keep the stamp.
        let row = sqlx::query_scalar::<_, Uuid>(
            "UPDATE refresh_tokens SET used_at = COALESCE(used_at, $3) \
             WHERE email = $1 AND token_hash = $2 \
               AND expires_at > $3 \
               AND (used_at IS NULL OR used_at > $4) \
             RETURNING id",
        )
        .bind(email)
        .bind(hash_token(token))
        .bind(now)
        .bind(now - self.grace)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, AuthError> {
        let result =
            sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= $1 OR used_at <= $2")
                .bind(now)
                .bind(now - self.grace)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }
}

/// Password reset tokens in the `reset_tokens` table.
pub struct PgResetTokenStore {
    pool: PgPool,
    ttl: Duration,
}

impl PgResetTokenStore {
    pub fn new(pool: PgPool, ttl: Duration) -> Self {
        Self { pool, ttl }
    }
}

#[async_trait]
impl ResetTokenStore for PgResetTokenStore {
    async fn issue(&self, user: &User, now: DateTime<Utc>) -> Result<IssuedToken, AuthError> {
        let token = generate_reset_token(user.id);
        let expires_at = now + self.ttl;
        sqlx::query(
            "INSERT INTO reset_tokens (id, user_id, token_hash, expires_at, created_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(Uuid::now_v7())
        .bind(user.id)
        .bind(hash_token(&token))
        .bind(expires_at)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(IssuedToken { token, expires_at })
    }

    async fn consume(&self, token: &str, now: DateTime<Utc>) -> Result<Option<Uuid>, AuthError> {
        let owners = sqlx::query_scalar::<_, Uuid>(
            "DELETE FROM reset_tokens \
             WHERE user_id = ( \
                 SELECT user_id FROM reset_tokens \
                 WHERE token_hash = $1 AND expires_at > $2 \
             ) \
             RETURNING user_id",
        )
        .bind(hash_token(token))
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(owners.into_iter().next())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, AuthError> {
        let result = sqlx::query("DELETE FROM reset_tokens WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
