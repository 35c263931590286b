//! Route tests: in-memory stores, manual clock, recording mailer.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use authkeep_api::{AppState, router};
use authkeep_core::auth::service::AuthService;
use authkeep_core::clock::ManualClock;
use authkeep_core::config::AuthConfig;
use authkeep_core::mail::{MailError, MailMessage, Mailer};
use authkeep_core::store::Stores;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;

#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<MailMessage>>,
    fail: bool,
}

impl RecordingMailer {
    fn last_token(&self) -> String {
        let sent = self.sent.lock().unwrap();
        let html = &sent.last().expect("a message was sent").html;
        html.rsplit("<p>")
            .next()
            .and_then(|p| p.strip_suffix("</p>"))
            .expect("token paragraph")
            .to_string()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        if self.fail {
            return Err(MailError::Transport("connection refused".into()));
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

struct TestApp {
    router: Router,
    clock: Arc<ManualClock>,
    mailer: Arc<RecordingMailer>,
}

fn app_with(mailer: RecordingMailer) -> TestApp {
    let auth = AuthConfig::new("test-secret").with_bcrypt_cost(4);
    let clock = Arc::new(ManualClock::new());
    let mailer = Arc::new(mailer);
    let service = AuthService::new(auth.clone(), Stores::in_memory(&auth), mailer.clone())
        .with_clock(clock.clone());
    let state = AppState {
        auth: Arc::new(service),
    };
    TestApp {
        router: router(state),
        clock,
        mailer,
    }
}

fn app() -> TestApp {
    app_with(RecordingMailer::default())
}

async fn send(router: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = router.clone().oneshot(req).await.expect("request");
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

async fn post(router: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let req = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(router, req).await
}

async fn me(router: &Router, token: &str) -> (StatusCode, Value) {
    let req = Request::builder()
        .uri("/v1/auth/me")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    send(router, req).await
}

fn registration() -> Value {
    json!({
        "email": "Ada@Example.com",
        "displayName": "Ada Lovelace",
        "password": "sample-password!",
        "password2": "sample-password!",
    })
}

async fn register(router: &Router) -> Value {
    let (status, body) = post(router, "/v1/auth/register", registration()).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body
}

#[tokio::test]
async fn status_is_ok() {
    let app = app();
    let req = Request::builder()
        .uri("/status")
        .body(Body::empty())
        .unwrap();
    let resp = app.router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], b"ok");
}

#[tokio::test]
async fn register_returns_user_and_tokens() {
    let app = app();
    let body = register(&app.router).await;

    assert_eq!(body["email"], "ada@example.com");
    assert_eq!(body["displayName"], "Ada Lovelace");
    assert_eq!(body["name"], "ada-lovelace");
    assert_eq!(body["role"], "user");
    assert!(body["token"].as_str().is_some_and(|t| !t.is_empty()));
    assert!(body["refreshToken"].as_str().is_some_and(|t| !t.is_empty()));
    assert!(body.get("passwordHash").is_none());
    assert!(body.get("password_hash").is_none());
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let app = app();
    register(&app.router).await;

    let (status, body) = post(&app.router, "/v1/auth/register", registration()).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "Email is already registered.");

    let mut other_email = registration();
    other_email["email"] = json!("someone-else@example.com");
    other_email["displayName"] = json!("ada lovelace");
    let (status, body) = post(&app.router, "/v1/auth/register", other_email).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "Username is already taken.");
}

#[tokio::test]
async fn register_rejects_invalid_input() {
    let app = app();

    let (status, body) = post(
        &app.router,
        "/v1/auth/register",
        json!({ "displayName": "Ada Lovelace", "password": "sample-password!" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let mut short_after_trim = registration();
    short_after_trim["displayName"] = json!("Abc ");
    let (status, body) = post(&app.router, "/v1/auth/register", short_after_trim).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid username spacing.");

    let mut mismatch = registration();
    mismatch["password2"] = json!("other-password!");
    let (status, body) = post(&app.router, "/v1/auth/register", mismatch).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Passwords do not match");
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let app = app();
    let req = Request::builder()
        .method("POST")
        .uri("/v1/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(&app.router, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn login_by_email_or_display_name() {
    let app = app();
    register(&app.router).await;

    let (status, body) = post(
        &app.router,
        "/v1/auth/login",
        json!({ "email": "ada@example.com", "password": "sample-password!" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["name"], "ada-lovelace");

    let (status, body) = post(
        &app.router,
        "/v1/auth/login",
        json!({ "displayName": "ADA LOVELACE", "password": "sample-password!" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["email"], "ada@example.com");
}

#[tokio::test]
async fn login_failures_are_indistinguishable() {
    let app = app();
    register(&app.router).await;

    let (wrong_status, wrong_body) = post(
        &app.router,
        "/v1/auth/login",
        json!({ "email": "ada@example.com", "password": "wrong-password!" }),
    )
    .await;
    let (unknown_status, unknown_body) = post(
        &app.router,
        "/v1/auth/login",
        json!({ "email": "nobody@example.com", "password": "sample-password!" }),
    )
    .await;

    assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_body, unknown_body);
}

#[tokio::test]
async fn login_requires_exactly_one_identifier_and_secret() {
    let app = app();
    let (status, _) = post(
        &app.router,
        "/v1/auth/login",
        json!({
            "email": "ada@example.com",
            "displayName": "Ada Lovelace",
            "password": "sample-password!",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = post(&app.router, "/v1/auth/login", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Email and password required.");
}

#[tokio::test]
async fn refresh_token_login_honours_grace_window() {
    let app = app();
    let registered = register(&app.router).await;
    let refresh = registered["refreshToken"].as_str().unwrap().to_string();
    let login = json!({ "email": "ada@example.com", "refreshToken": refresh });

    let (status, body) = post(&app.router, "/v1/auth/login", login.clone()).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_ne!(body["refreshToken"], json!(refresh));

    app.clock.advance(chrono::Duration::minutes(2));
    let (status, _) = post(&app.router, "/v1/auth/login", login.clone()).await;
    assert_eq!(status, StatusCode::OK);

    app.clock.advance(chrono::Duration::minutes(2));
    let (status, _) = post(&app.router, "/v1/auth/login", login).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn me_requires_a_valid_token() {
    let app = app();
    let registered = register(&app.router).await;
    let token = registered["token"].as_str().unwrap();

    let (status, body) = me(&app.router, token).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["name"], "ada-lovelace");
    assert!(body.get("email").is_none());

    let (status, _) = me(&app.router, "not-a-jwt").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = Request::builder()
        .uri("/v1/auth/me")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app.router, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn expired_access_token_is_rejected() {
    let app = app();
    let registered = register(&app.router).await;
    let token = registered["token"].as_str().unwrap();

    app.clock.advance(chrono::Duration::minutes(16));
    let (status, _) = me(&app.router, token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn password_reset_flow() {
    let app = app();
    register(&app.router).await;

    let (status, body) = post(
        &app.router,
        "/v1/auth/request-reset-password",
        json!({ "email": "ada@example.com" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let token = app.mailer.last_token();

    let reset = json!({
        "token": token,
        "password": "fresh-password#",
        "password2": "fresh-password#",
    });
    let (status, body) = post(&app.router, "/v1/auth/reset-password", reset.clone()).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["message"], "Password successfully updated.");

    let (status, body) = post(&app.router, "/v1/auth/reset-password", reset).await;
    assert_eq!(status, StatusCode::GONE);
    assert_eq!(body["message"], "Reset password token has expired.");

    let (status, _) = post(
        &app.router,
        "/v1/auth/login",
        json!({ "email": "ada@example.com", "password": "sample-password!" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = post(
        &app.router,
        "/v1/auth/login",
        json!({ "email": "ada@example.com", "password": "fresh-password#" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn reset_request_for_unknown_email() {
    let app = app();
    let (status, body) = post(
        &app.router,
        "/v1/auth/request-reset-password",
        json!({ "email": "nobody@example.com" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Email not found.");
}

#[tokio::test]
async fn reset_request_mail_failure_is_a_server_error() {
    let app = app_with(RecordingMailer {
        fail: true,
        ..RecordingMailer::default()
    });
    register(&app.router).await;

    let (status, body) = post(
        &app.router,
        "/v1/auth/request-reset-password",
        json!({ "email": "ada@example.com" }),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Internal server error");
}

#[tokio::test]
async fn expired_reset_token_is_gone() {
    let app = app();
    register(&app.router).await;
    post(
        &app.router,
        "/v1/auth/request-reset-password",
        json!({ "email": "ada@example.com" }),
    )
    .await;
    let token = app.mailer.last_token();

    app.clock.advance(chrono::Duration::hours(7));
    let (status, _) = post(
        &app.router,
        "/v1/auth/reset-password",
        json!({
            "token": token,
            "password": "fresh-password#",
            "password2": "fresh-password#",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::GONE);
}
