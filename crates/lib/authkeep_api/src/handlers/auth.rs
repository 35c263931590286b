//! Authentication request handlers.
//!
//! Each handler validates its payload, delegates to `AuthService` and shapes
//! the response.

use authkeep_core::auth::validation;
use authkeep_core::models::auth::{PublicUser, Role};
use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};

use crate::AppState;
use crate::error::AppResult;
use crate::extractors::AppJson;
use crate::middleware::auth::{AuthenticatedUser, ensure_role};
use crate::models::{
    AuthResponse, LoginRequest, MessageResponse, RegisterRequest, RequestResetPasswordRequest,
    ResetPasswordRequest,
};

/// `POST /v1/auth/register`: create a user and return it with fresh tokens.
pub async fn register_handler(
    State(state): State<AppState>,
    AppJson(body): AppJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let new_user = validation::validate_registration(
        &body.email,
        &body.display_name,
        &body.password,
        &body.password2,
    )?;
    let session = state.auth.register(new_user).await?;
    Ok((StatusCode::CREATED, Json(session.into())))
}

/// `POST /v1/auth/login`: email or display name, with password or refresh token.
pub async fn login_handler(
    State(state): State<AppState>,
    AppJson(body): AppJson<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let credentials = validation::validate_login(
        body.email.as_deref(),
        body.display_name.as_deref(),
        body.password.as_deref(),
        body.refresh_token.as_deref(),
    )?;
    let session = state.auth.login(credentials).await?;
    Ok(Json(session.into()))
}

/// `GET /v1/auth/me`: the authenticated user's public profile. Open to every role.
pub async fn me_handler(
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
) -> AppResult<Json<PublicUser>> {
    ensure_role(&user, &Role::all())?;
    Ok(Json(user.to_public()))
}

/// `POST /v1/auth/request-reset-password`: mail a reset token.
pub async fn request_reset_password_handler(
    State(state): State<AppState>,
    AppJson(body): AppJson<RequestResetPasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    validation::validate_email(&body.email)?;
    state.auth.request_password_reset(&body.email).await?;
    Ok(Json(MessageResponse::new(
        "Successfully sent password reset email.",
    )))
}

/// `POST /v1/auth/reset-password`: set a new password with a reset token.
pub async fn reset_password_handler(
    State(state): State<AppState>,
    AppJson(body): AppJson<ResetPasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    validation::validate_password_reset(&body.token, &body.password, &body.password2)?;
    state.auth.reset_password(&body.token, &body.password).await?;
    Ok(Json(MessageResponse::new("Password successfully updated.")))
}
