//! # authkeep_api
//!
//! HTTP API library for Authkeep.

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod models;

use std::sync::Arc;

use authkeep_core::auth::service::AuthService;
use axum::Router;
use axum::routing::{get, post};
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers::{auth, status};

/// Route paths.
pub mod routes {
    pub const GET_STATUS: &str = "/status";
    pub const POST_AUTH_REGISTER: &str = "/v1/auth/register";
    pub const POST_AUTH_LOGIN: &str = "/v1/auth/login";
    pub const GET_AUTH_ME: &str = "/v1/auth/me";
    pub const POST_AUTH_REQUEST_RESET_PASSWORD: &str = "/v1/auth/request-reset-password";
    pub const POST_AUTH_RESET_PASSWORD: &str = "/v1/auth/reset-password";
}

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Authentication service over the configured stores.
    pub auth: Arc<AuthService>,
}

/// Run embedded database migrations.
///
/// Delegates to `authkeep_core::migrate::migrate()` which owns the migration files.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    authkeep_core::migrate::migrate(pool).await
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (no auth required)
    let public = Router::new()
        .route(routes::GET_STATUS, get(status::status_handler))
        .route(routes::POST_AUTH_REGISTER, post(auth::register_handler))
        .route(routes::POST_AUTH_LOGIN, post(auth::login_handler))
        .route(
            routes::POST_AUTH_REQUEST_RESET_PASSWORD,
            post(auth::request_reset_password_handler),
        )
        .route(
            routes::POST_AUTH_RESET_PASSWORD,
            post(auth::reset_password_handler),
        );

    // Protected routes (require auth)
    let protected = Router::new()
        .route(routes::GET_AUTH_ME, get(auth::me_handler))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
