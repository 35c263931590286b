//! JWT token generation and verification.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use tracing::{info, warn};
use uuid::Uuid;

use super::AuthError;
use crate::models::auth::{IssuedToken, TokenClaims};

/// Generate a signed JWT access token (HS256) for `user_id`, valid for `ttl` from `now`.
pub fn generate_access_token(
    user_id: Uuid,
    secret: &[u8],
    ttl: Duration,
    now: DateTime<Utc>,
) -> Result<IssuedToken, AuthError> {
    let expires_at = now + ttl;
    let claims = TokenClaims {
        sub: user_id.to_string(),
        exp: expires_at.timestamp(),
        iat: now.timestamp(),
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|e| AuthError::Internal(format!("jwt encode: {e}")))?;
    Ok(IssuedToken { token, expires_at })
}

/// Verify a JWT access token, returning the claims if the signature holds and
/// `exp` is after `now`.
pub fn verify_access_token(token: &str, secret: &[u8], now: DateTime<Utc>) -> Option<TokenClaims> {
    let key = DecodingKey::from_secret(secret);
    // Expiry is checked against the caller's clock, not the system time.
    let mut validation = Validation::default();
    validation.validate_exp = false;
    decode::<TokenClaims>(token, &key, &validation)
        .ok()
        .map(|data| data.claims)
        .filter(|claims| claims.exp > now.timestamp())
}

/// Environment variables consulted for the signing secret, in order.
const SECRET_ENV_VARS: [&str; 2] = ["JWT_SECRET", "AUTH_SECRET"];

/// Resolve the JWT secret from `JWT_SECRET`, then `AUTH_SECRET`, then a secret
/// persisted under the user data dir (generated on first use).
pub fn resolve_jwt_secret() -> String {
    SECRET_ENV_VARS
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|secret| !secret.is_empty())
        .unwrap_or_else(|| load_or_create_secret(&jwt_secret_path()))
}

/// Read a non-empty secret from `path`, or generate one and try to persist it.
/// A secret that cannot be written is still returned; it lasts for this process.
fn load_or_create_secret(path: &Path) -> String {
    match std::fs::read_to_string(path) {
        Ok(existing) if !existing.trim().is_empty() => return existing.trim().to_string(),
        _ => {}
    }

    let secret: String = rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect();
    let written = path
        .parent()
        .map_or(Ok(()), std::fs::create_dir_all)
        .and_then(|()| std::fs::write(path, &secret));
    match written {
        Ok(()) => info!(path = %path.display(), "generated new JWT secret"),
        Err(e) => warn!(path = %path.display(), error = %e, "could not persist JWT secret"),
    }
    secret
}

fn jwt_secret_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("authkeep")
        .join("jwt-secret")
}
