//! Authentication middleware: Bearer token extraction and user resolution.

use authkeep_core::auth::AuthError;
use authkeep_core::models::auth::{Role, User};
use axum::http::header::AUTHORIZATION;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::AppState;
use crate::error::AppError;

/// The user behind a verified bearer token, stored in request extensions.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

/// Axum middleware: extracts `Authorization: Bearer <token>`, verifies the JWT,
/// confirms the user still exists and injects `AuthenticatedUser` into request
/// extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing authorization header".into()))?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Unauthorized("Invalid authorization scheme".into()))?;

    let user = state.auth.authenticate(token).await.map_err(|e| match e {
        AuthError::CredentialError => AppError::Unauthorized("Invalid or expired token".into()),
        other => AppError::from(other),
    })?;

    request.extensions_mut().insert(AuthenticatedUser(user));

    Ok(next.run(request).await)
}

/// Reject `user` unless their role is one of `allowed`.
pub fn ensure_role(user: &User, allowed: &[Role]) -> Result<(), AppError> {
    if allowed.contains(&user.role) {
        Ok(())
    } else {
        Err(AppError::Unauthorized("Insufficient role".into()))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;

    fn user_with(role: Role) -> User {
        let now = Utc::now();
        User {
            id: Uuid::now_v7(),
            email: "ada@example.com".into(),
            display_name: "Ada Lovelace".into(),
            name: "ada-lovelace".into(),
            password_hash: String::new(),
            role,
            created_at: now,
            updated_at: now,
            last_active: None,
        }
    }

    #[test]
    fn role_gate() {
        assert!(ensure_role(&user_with(Role::User), &Role::all()).is_ok());
        assert!(ensure_role(&user_with(Role::Admin), &Role::all()).is_ok());
        assert!(matches!(
            ensure_role(&user_with(Role::User), &[Role::Admin]),
            Err(AppError::Unauthorized(_))
        ));
    }
}
