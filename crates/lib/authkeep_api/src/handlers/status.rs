//! Readiness check.

/// `GET /status`: plain-text "ok" once the server is accepting requests.
pub async fn status_handler() -> &'static str {
    "ok"
}
