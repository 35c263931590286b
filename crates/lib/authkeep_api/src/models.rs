//! Request and response bodies (camelCase JSON).

use authkeep_core::models::auth::{AuthSession, AuthedUser};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Error body returned for every failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Plain confirmation body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// `POST /v1/auth/register`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegisterRequest {
    pub email: String,
    pub display_name: String,
    pub password: String,
    pub password2: String,
}

/// `POST /v1/auth/login`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub password: Option<String>,
    pub refresh_token: Option<String>,
}

/// `POST /v1/auth/request-reset-password`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RequestResetPasswordRequest {
    pub email: String,
}

/// `POST /v1/auth/reset-password`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
    pub password2: String,
}

/// Login and registration response: the user plus both tokens.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    #[serde(flatten)]
    pub user: AuthedUser,
    pub token: String,
    pub token_expires: DateTime<Utc>,
    pub refresh_token: String,
    pub refresh_token_expires: DateTime<Utc>,
}

impl From<AuthSession> for AuthResponse {
    fn from(session: AuthSession) -> Self {
        Self {
            user: session.user.to_authed(),
            token: session.access_token.token,
            token_expires: session.access_token.expires_at,
            refresh_token: session.refresh_token.token,
            refresh_token_expires: session.refresh_token.expires_at,
        }
    }
}
