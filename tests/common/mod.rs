// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use account_service::config::Config;
use account_service::db::SqliteDb;
use account_service::models::VerificationAction;
use account_service::routes::create_router;
use account_service::services::{Mailer, TokenCodec};
use account_service::AppState;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request};
use axum::response::Response;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const PRIVATE_KEY: &[u8] = include_bytes!("../fixtures/jwt_private.pem");
pub const PUBLIC_KEY: &[u8] = include_bytes!("../fixtures/jwt_public.pem");
/// A key pair the service does not trust.
#[allow(dead_code)]
pub const OTHER_PRIVATE_KEY: &[u8] = include_bytes!("../fixtures/other_private.pem");

/// A password that satisfies every rule.
#[allow(dead_code)]
pub const PASSWORD: &str = "Sup3r$ecret";

#[derive(Debug, Clone)]
#[allow(dead_code)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Mailer that keeps every message in memory.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<SentMail>>,
}

#[allow(dead_code)]
impl RecordingMailer {
    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().unwrap().clone()
    }

    /// Mail goes out on a spawned task; wait until `count` have arrived.
    pub async fn wait_for(&self, count: usize) -> Vec<SentMail> {
        for _ in 0..100 {
            let sent = self.sent();
            if sent.len() >= count {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("expected {count} emails, got {:?}", self.sent());
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(SentMail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: html_body.to_string(),
        });
        Ok(())
    }
}

pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub db: SqliteDb,
    pub mailer: Arc<RecordingMailer>,
}

pub fn test_tokens() -> TokenCodec {
    TokenCodec::from_pem(PRIVATE_KEY, PUBLIC_KEY).unwrap()
}

/// Create a test app over an in-memory database. The front end's API
/// calls go to a closed port.
#[allow(dead_code)]
pub async fn create_test_app() -> TestApp {
    create_test_app_with_config(Config::test_default()).await
}

#[allow(dead_code)]
pub async fn create_test_app_with_config(config: Config) -> TestApp {
    let db = SqliteDb::new_in_memory().await.unwrap();
    let mailer = Arc::new(RecordingMailer::default());
    let state = Arc::new(
        AppState::new(config, db.clone(), test_tokens(), mailer.clone()).unwrap(),
    );

    TestApp {
        router: create_router(state.clone()),
        state,
        db,
        mailer,
    }
}

/// Serve the app on a local port so the front end can reach its own API.
#[allow(dead_code)]
pub async fn spawn_live_app() -> TestApp {
    spawn_live_app_with_config(Config::test_default()).await
}

/// Like [`spawn_live_app`]; `api_url` is replaced with the bound address.
#[allow(dead_code)]
pub async fn spawn_live_app_with_config(config: Config) -> TestApp {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let config = Config {
        api_url: format!("http://{addr}"),
        ..config
    };
    let app = create_test_app_with_config(config).await;

    let router = app.router.clone();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    app
}

#[allow(dead_code)]
pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[allow(dead_code)]
pub fn authed_request(
    method: &str,
    uri: &str,
    token: &str,
    body: serde_json::Value,
) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[allow(dead_code)]
pub fn form_request(uri: &str, form: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(form.to_string())).unwrap()
}

#[allow(dead_code)]
pub fn page_request(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

#[allow(dead_code)]
pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[allow(dead_code)]
pub fn set_cookie_headers(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|value| value.to_str().unwrap().to_string())
        .collect()
}

#[allow(dead_code)]
pub fn find_cookie(headers: &[String], name: &str) -> Option<String> {
    headers
        .iter()
        .find(|value| value.starts_with(&format!("{name}=")))
        .cloned()
}

/// Value part of a `Set-Cookie` header.
#[allow(dead_code)]
pub fn cookie_value(set_cookie: &str) -> String {
    let pair = set_cookie.split(';').next().unwrap();
    pair.split_once('=').unwrap().1.to_string()
}

/// Sign up through the API and return the response body.
#[allow(dead_code)]
pub async fn sign_up(app: &TestApp, email: &str) -> serde_json::Value {
    use tower::ServiceExt;

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/user/sign-up/email",
            serde_json::json!({
                "full_name": "Ada Lovelace",
                "email": email,
                "password": PASSWORD,
                "confirm_password": PASSWORD,
            }),
        ))
        .await
        .unwrap();
    body_json(response).await
}

/// The code currently active for `(action, email)`.
#[allow(dead_code)]
pub async fn active_code(app: &TestApp, action: VerificationAction, email: &str) -> String {
    app.db
        .find_active_code_by_email(action, email, chrono::Utc::now())
        .await
        .unwrap()
        .expect("no active verification code")
        .verification_code
}
