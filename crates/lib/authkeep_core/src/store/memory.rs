//! In-memory stores.
//!
//! Same contracts as the PostgreSQL stores. Users sit behind a single lock so
//! the uniqueness check and the insert are one step; tokens are keyed by
//! their hash in a `DashMap`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{CredentialStore, RefreshTokenStore, ResetTokenStore, normalize_before_persist};
use crate::auth::password::hash_password;
use crate::auth::tokens::{generate_refresh_token, generate_reset_token, hash_token};
use crate::auth::{AuthError, ConflictField};
use crate::models::auth::{
    IssuedToken, NewUser, RefreshTokenRecord, ResetTokenRecord, Role, User,
};

/// Users held in a map keyed by id.
pub struct MemoryCredentialStore {
    bcrypt_cost: u32,
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryCredentialStore {
    pub fn new(bcrypt_cost: u32) -> Self {
        Self {
            bcrypt_cost,
            users: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn create(&self, new_user: &NewUser, now: DateTime<Utc>) -> Result<User, AuthError> {
        let normalized = normalize_before_persist(new_user, self.bcrypt_cost)?;

        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == normalized.email) {
            return Err(AuthError::Conflict(ConflictField::Email));
        }
        if users
            .values()
            .any(|u| u.name == normalized.name || u.display_name == normalized.display_name)
        {
            return Err(AuthError::Conflict(ConflictField::DisplayName));
        }

        let user = User {
            id: Uuid::now_v7(),
            email: normalized.email,
            display_name: normalized.display_name,
            name: normalized.name,
            password_hash: normalized.password_hash,
            role: Role::User,
            created_at: now,
            updated_at: now,
            last_active: None,
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AuthError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<User>, AuthError> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.name == name).cloned())
    }

    async fn update_password(
        &self,
        id: Uuid,
        new_password: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, AuthError> {
        let password_hash = hash_password(new_password, self.bcrypt_cost)?;
        let mut users = self.users.write().await;
        match users.get_mut(&id) {
            Some(user) => {
                user.password_hash = password_hash;
                user.updated_at = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn touch_last_active(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, AuthError> {
        let mut users = self.users.write().await;
        Ok(users.get_mut(&id).map(|user| {
            user.last_active = Some(now);
            user.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AuthError> {
        Ok(self.users.write().await.remove(&id).is_some())
    }
}

/// Refresh tokens keyed by token hash.
pub struct MemoryRefreshTokenStore {
    ttl: Duration,
    grace: Duration,
    tokens: DashMap<String, RefreshTokenRecord>,
}

impl MemoryRefreshTokenStore {
    pub fn new(ttl: Duration, grace: Duration) -> Self {
        Self {
            ttl,
            grace,
            tokens: DashMap::new(),
        }
    }

    fn is_live(&self, record: &RefreshTokenRecord, now: DateTime<Utc>) -> bool {
        now < record.expires_at && record.used_at.is_none_or(|used| now < used + self.grace)
    }

    /// Number of stored tokens, live or not.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryRefreshTokenStore {
    async fn issue(&self, user: &User, now: DateTime<Utc>) -> Result<IssuedToken, AuthError> {
        let token = generate_refresh_token(user.id);
        let record = RefreshTokenRecord {
            id: Uuid::now_v7(),
            user_id: user.id,
            email: user.email.clone(),
            token_hash: hash_token(&token),
            expires_at: now + self.ttl,
            used_at: None,
        };
        let expires_at = record.expires_at;
        self.tokens.insert(record.token_hash.clone(), record);
        Ok(IssuedToken { token, expires_at })
    }

    async fn validate(
        &self,
        email: &str,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, AuthError> {
        let Some(mut record) = self.tokens.get_mut(&hash_token(token)) else {
            return Ok(false);
        };
        if record.email != email || !self.is_live(&record, now) {
            return Ok(false);
        }
        if record.used_at.is_none() {
            record.used_at = Some(now);
        }
        Ok(true)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, AuthError> {
        let before = self.tokens.len();
        self.tokens.retain(|_, record| self.is_live(record, now));
        Ok(before.saturating_sub(self.tokens.len()) as u64)
    }
}

/// Reset tokens keyed by token hash.
pub struct MemoryResetTokenStore {
    ttl: Duration,
    tokens: DashMap<String, ResetTokenRecord>,
}

impl MemoryResetTokenStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            tokens: DashMap::new(),
        }
    }

    /// Number of stored tokens, live or not.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl ResetTokenStore for MemoryResetTokenStore {
    async fn issue(&self, user: &User, now: DateTime<Utc>) -> Result<IssuedToken, AuthError> {
        let token = generate_reset_token(user.id);
        let record = ResetTokenRecord {
            id: Uuid::now_v7(),
            user_id: user.id,
            token_hash: hash_token(&token),
            expires_at: now + self.ttl,
            created_at: now,
        };
        let expires_at = record.expires_at;
        self.tokens.insert(record.token_hash.clone(), record);
        Ok(IssuedToken { token, expires_at })
    }

    async fn consume(&self, token: &str, now: DateTime<Utc>) -> Result<Option<Uuid>, AuthError> {
        // Copy the owner out before `retain`; holding the entry would deadlock.
        let owner = self
            .tokens
            .get(&hash_token(token))
            .filter(|record| now < record.expires_at)
            .map(|record| record.user_id);
        let Some(user_id) = owner else {
            return Ok(None);
        };
        self.tokens.retain(|_, record| record.user_id != user_id);
        Ok(Some(user_id))
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, AuthError> {
        let before = self.tokens.len();
        self.tokens.retain(|_, record| now < record.expires_at);
        Ok(before.saturating_sub(self.tokens.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COST: u32 = 4;

    fn new_user(email: &str, display_name: &str) -> NewUser {
        NewUser {
            email: email.into(),
            display_name: display_name.into(),
            password: "sample-password!".into(),
        }
    }

    async fn seeded_user(store: &MemoryCredentialStore) -> User {
        store
            .create(&new_user("ada@example.com", "Ada Lovelace"), Utc::now())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn duplicate_email_conflicts_before_display_name() {
        let store = MemoryCredentialStore::new(COST);
        seeded_user(&store).await;

        let err = store
            .create(&new_user("ADA@example.com ", "Ada Lovelace"), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Conflict(ConflictField::Email)));

        let err = store
            .create(&new_user("other@example.com", "ada  lovelace"), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AuthError::Conflict(ConflictField::DisplayName)
        ));
    }

    #[tokio::test]
    async fn lookups_by_email_name_and_id() {
        let store = MemoryCredentialStore::new(COST);
        let user = seeded_user(&store).await;

        assert_eq!(
            store.find_by_email("ada@example.com").await.unwrap().unwrap().id,
            user.id
        );
        assert_eq!(
            store.find_by_name("ada-lovelace").await.unwrap().unwrap().id,
            user.id
        );
        assert!(store.find_by_id(user.id).await.unwrap().is_some());
        assert!(store.find_by_id(Uuid::now_v7()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn password_update_rehashes() {
        let store = MemoryCredentialStore::new(COST);
        let user = seeded_user(&store).await;
        let later = Utc::now() + Duration::minutes(1);

        assert!(store.update_password(user.id, "new-password#", later).await.unwrap());
        let updated = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_ne!(updated.password_hash, user.password_hash);
        assert_eq!(updated.updated_at, later);
        assert!(!store.update_password(Uuid::now_v7(), "x!xxxxxx", later).await.unwrap());
    }

    #[tokio::test]
    async fn touching_last_active_keeps_updated_at() {
        let store = MemoryCredentialStore::new(COST);
        let user = seeded_user(&store).await;
        let later = Utc::now() + Duration::minutes(5);

        let touched = store.touch_last_active(user.id, later).await.unwrap().unwrap();
        assert_eq!(touched.last_active, Some(later));
        assert_eq!(touched.updated_at, user.updated_at);

        assert!(store.delete(user.id).await.unwrap());
        assert!(store.touch_last_active(user.id, later).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn refresh_token_grace_window() {
        let users = MemoryCredentialStore::new(COST);
        let user = seeded_user(&users).await;
        let store = MemoryRefreshTokenStore::new(Duration::days(7), Duration::minutes(3));
        let now = Utc::now();

        let issued = store.issue(&user, now).await.unwrap();
        assert_eq!(issued.expires_at, now + Duration::days(7));

        assert!(store.validate(&user.email, &issued.token, now).await.unwrap());
        // Re-use within the window neither fails nor extends it.
        let inside = now + Duration::minutes(2);
        assert!(store.validate(&user.email, &issued.token, inside).await.unwrap());
        let past = now + Duration::minutes(3);
        assert!(!store.validate(&user.email, &issued.token, past).await.unwrap());
    }

    #[tokio::test]
    async fn refresh_token_checks_owner_and_expiry() {
        let users = MemoryCredentialStore::new(COST);
        let user = seeded_user(&users).await;
        let store = MemoryRefreshTokenStore::new(Duration::days(7), Duration::minutes(3));
        let now = Utc::now();
        let issued = store.issue(&user, now).await.unwrap();

        assert!(!store.validate("eve@example.com", &issued.token, now).await.unwrap());
        assert!(!store.validate(&user.email, "bogus", now).await.unwrap());
        let expired = now + Duration::days(7);
        assert!(!store.validate(&user.email, &issued.token, expired).await.unwrap());

        assert_eq!(store.purge_expired(expired).await.unwrap(), 1);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn consuming_reset_token_removes_all_of_owners_tokens() {
        let users = MemoryCredentialStore::new(COST);
        let ada = seeded_user(&users).await;
        let bob = users
            .create(&new_user("bob@example.com", "Bob Smith"), Utc::now())
            .await
            .unwrap();
        let store = MemoryResetTokenStore::new(Duration::hours(6));
        let now = Utc::now();

        let first = store.issue(&ada, now).await.unwrap();
        let second = store.issue(&ada, now).await.unwrap();
        store.issue(&bob, now).await.unwrap();
        assert_eq!(store.len(), 3);

        assert_eq!(store.consume(&first.token, now).await.unwrap(), Some(ada.id));
        assert_eq!(store.len(), 1);
        assert_eq!(store.consume(&second.token, now).await.unwrap(), None);
        assert_eq!(store.consume(&first.token, now).await.unwrap(), None);
    }

    #[tokio::test]
    async fn reset_token_expires_after_ttl() {
        let users = MemoryCredentialStore::new(COST);
        let user = seeded_user(&users).await;
        let store = MemoryResetTokenStore::new(Duration::hours(6));
        let now = Utc::now();
        let issued = store.issue(&user, now).await.unwrap();

        let later = now + Duration::hours(6);
        assert_eq!(store.consume(&issued.token, later).await.unwrap(), None);
        assert_eq!(store.purge_expired(later).await.unwrap(), 1);
        assert!(store.is_empty());
    }
}
