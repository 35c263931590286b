//! API server configuration.

use authkeep_core::auth::jwt::resolve_jwt_secret;
use authkeep_core::config::{AuthConfig, DEFAULT_JWT_EXPIRY_MINUTES, MailConfig};

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3100").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub pg_connection_url: String,
    /// Token lifetimes and signing secret.
    pub auth: AuthConfig,
    /// Outgoing mail.
    pub mail: MailConfig,
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable                     | Default                               |
    /// |------------------------------|---------------------------------------|
    /// | `BIND_ADDR`                  | `127.0.0.1:3100`                      |
    /// | `DATABASE_URL`               | `postgres://localhost:5432/authkeep`  |
    /// | `JWT_SECRET` / `AUTH_SECRET` | generated & persisted to file         |
    /// | `JWT_EXPIRATION_MINUTES`     | `15`                                  |
    /// | `EMAIL_SERVER`               | unset (mail is logged, not sent)      |
    /// | `EMAIL_FROM`                 | `Authkeep <no-reply@localhost>`       |
    pub fn from_env() -> Self {
        let jwt_expiry_minutes = std::env::var("JWT_EXPIRATION_MINUTES")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|m| *m > 0)
            .unwrap_or(DEFAULT_JWT_EXPIRY_MINUTES);

        let defaults = MailConfig::default();
        let mail = MailConfig {
            smtp_url: std::env::var("EMAIL_SERVER").ok().filter(|v| !v.is_empty()),
            from: std::env::var("EMAIL_FROM")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.from),
        };

        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3100".into()),
            pg_connection_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost:5432/authkeep".into()),
            auth: AuthConfig::new(resolve_jwt_secret()).with_jwt_expiry_minutes(jwt_expiry_minutes),
            mail,
        }
    }
}
