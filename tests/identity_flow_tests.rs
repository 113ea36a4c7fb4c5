// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! End-to-end account flows through the JSON API.
//!
//! Each test drives the router with `oneshot` against a fresh in-memory
//! database and checks both the response and what landed in the store.

use account_service::models::VerificationAction;
use axum::http::StatusCode;
use serde_json::{json, Value};
use tower::ServiceExt;

mod common;

use common::{TestApp, PASSWORD};

async fn post(app: &TestApp, uri: &str, body: Value) -> Value {
    let response = app
        .router
        .clone()
        .oneshot(common::json_request("POST", uri, body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    common::body_json(response).await
}

async fn authed(app: &TestApp, method: &str, uri: &str, token: &str, body: Value) -> Value {
    let response = app
        .router
        .clone()
        .oneshot(common::authed_request(method, uri, token, body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    common::body_json(response).await
}

async fn login(app: &TestApp, email: &str, password: &str) -> Value {
    post(
        app,
        "/api/user/login",
        json!({ "email": email, "password": password }),
    )
    .await
}

fn token(body: &Value) -> String {
    body["token"]
        .as_str()
        .unwrap_or_else(|| panic!("no token in {body}"))
        .to_string()
}

// ─── Sign-up & Login ─────────────────────────────────────────────

#[tokio::test]
async fn sign_up_then_login_yields_same_user() {
    let app = common::create_test_app().await;

    let signed_up = common::sign_up(&app, "ada@example.com").await;
    let user_id = signed_up["payload"]["user_id"].as_i64().unwrap();
    assert!(signed_up["payload"]["date_verified"].is_null());
    assert_eq!(signed_up["payload"]["display_name"], "Ada Lovelace");
    assert!(!signed_up["session_id"].as_str().unwrap().is_empty());

    let logged_in = login(&app, "ada@example.com", PASSWORD).await;
    let claims = app
        .state
        .identity
        .tokens()
        .verify(&token(&logged_in))
        .unwrap();
    assert_eq!(claims.payload.user_id, user_id);
}

#[tokio::test]
async fn sign_up_mails_registration_link() {
    let app = common::create_test_app().await;
    common::sign_up(&app, "ada@example.com").await;

    let code =
        common::active_code(&app, VerificationAction::RegisterVerification, "ada@example.com")
            .await;
    let sent = app.mailer.wait_for(1).await;
    assert_eq!(sent[0].to, "ada@example.com");
    assert_eq!(sent[0].subject, "Account verification");
    assert_eq!(
        sent[0].body,
        format!(
            "<h1>Account verification</h1>Please click this link: \
             http://localhost:3000/user/register-verification/{code}"
        )
    );
}

#[tokio::test]
async fn duplicate_email_is_rejected() {
    let app = common::create_test_app().await;
    common::sign_up(&app, "ada@example.com").await;

    let body = common::sign_up(&app, "ada@example.com").await;
    assert_eq!(
        body,
        json!({ "message": "Your email address has already been registered." })
    );
}

#[tokio::test]
async fn email_addresses_match_regardless_of_case() {
    let app = common::create_test_app().await;
    let signed_up = common::sign_up(&app, "Ada@Example.com").await;
    let user_id = signed_up["payload"]["user_id"].as_i64().unwrap();

    let logged_in = login(&app, "ada@example.com", PASSWORD).await;
    assert_eq!(logged_in["payload"]["user_id"].as_i64(), Some(user_id));

    let body = common::sign_up(&app, "ada@example.com").await;
    assert_eq!(
        body,
        json!({ "message": "Your email address has already been registered." })
    );

    let body = post(
        &app,
        "/api/user/reset-password",
        json!({ "email": "ADA@EXAMPLE.COM" }),
    )
    .await;
    assert_eq!(body, json!({ "success": true }));
}

#[tokio::test]
async fn sign_up_succeeds_when_code_cannot_be_stored() {
    let app = common::create_test_app().await;
    sqlx::query("DROP TABLE user_verification_code")
        .execute(app.db.pool())
        .await
        .unwrap();

    let signed_up = common::sign_up(&app, "ada@example.com").await;
    assert!(signed_up["token"].is_string());
    assert!(app.mailer.sent().is_empty());

    let logged_in = login(&app, "ada@example.com", PASSWORD).await;
    assert_eq!(logged_in["payload"]["user_id"], signed_up["payload"]["user_id"]);
}

#[tokio::test]
async fn wrong_password_is_rejected() {
    let app = common::create_test_app().await;
    common::sign_up(&app, "ada@example.com").await;

    let body = login(&app, "ada@example.com", "Wr0ng$password").await;
    assert_eq!(body, json!({ "message": "Email or Password is incorrect" }));

    let body = login(&app, "nobody@example.com", PASSWORD).await;
    assert_eq!(body, json!({ "message": "Email or Password is incorrect" }));
}

#[tokio::test]
async fn validation_reports_first_failing_field() {
    let app = common::create_test_app().await;

    let body = post(
        &app,
        "/api/user/sign-up/email",
        json!({ "email": "bad", "password": "weak" }),
    )
    .await;
    assert_eq!(body, json!({ "message": "\"Full name\" is required" }));

    let body = post(&app, "/api/user/login", json!({ "password": PASSWORD })).await;
    assert_eq!(body, json!({ "message": "\"Email\" is required" }));
}

#[tokio::test]
async fn login_keeps_one_live_access_token() {
    let app = common::create_test_app().await;
    let signed_up = common::sign_up(&app, "ada@example.com").await;
    let user_id = signed_up["payload"]["user_id"].as_i64().unwrap();

    login(&app, "ada@example.com", PASSWORD).await;
    let last = login(&app, "ada@example.com", PASSWORD).await;

    let live = app
        .state
        .identity
        .access_tokens()
        .live_tokens(user_id)
        .await
        .unwrap();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].access_token, token(&last));
}

#[tokio::test]
async fn login_threads_the_callers_session_id() {
    let app = common::create_test_app().await;
    common::sign_up(&app, "ada@example.com").await;

    let body = post(
        &app,
        "/api/user/login",
        json!({ "email": "ada@example.com", "password": PASSWORD, "session_id": "device-1" }),
    )
    .await;
    assert_eq!(body["session_id"], "device-1");
}

#[tokio::test]
async fn disabled_user_cannot_log_in_and_is_hidden() {
    let app = common::create_test_app().await;
    let signed_up = common::sign_up(&app, "ada@example.com").await;
    let user_id = signed_up["payload"]["user_id"].as_i64().unwrap();

    sqlx::query("UPDATE user SET is_disabled = 1 WHERE id = ?")
        .bind(user_id)
        .execute(app.db.pool())
        .await
        .unwrap();

    let body = login(&app, "ada@example.com", PASSWORD).await;
    assert_eq!(body, json!({ "message": "Email or Password is incorrect" }));

    let dashboard = authed(&app, "GET", "/api/user/dashboard", &token(&signed_up), json!({})).await;
    assert_eq!(dashboard["users"], json!([]));
    assert_eq!(dashboard["dashboard"]["total_user"], 0);
}

// ─── OAuth ───────────────────────────────────────────────────────

#[tokio::test]
async fn google_sign_up_is_idempotent_and_links_email_accounts() {
    let app = common::create_test_app().await;
    let email_account = common::sign_up(&app, "ada@example.com").await;
    let user_id = email_account["payload"]["user_id"].as_i64().unwrap();

    let google = json!({
        "full_name": "Ada L",
        "email": "ada@example.com",
        "google_id": "g-123",
    });
    let first = post(&app, "/api/user/sign-up/google", google.clone()).await;
    let second = post(&app, "/api/user/sign-up/google", google).await;

    assert_eq!(first["payload"]["user_id"].as_i64(), Some(user_id));
    assert_eq!(second["payload"]["user_id"].as_i64(), Some(user_id));

    let user = app.db.get_user(user_id).await.unwrap().unwrap();
    assert_eq!(user.google_id.as_deref(), Some("g-123"));
}

#[tokio::test]
async fn google_sign_up_creates_verified_account() {
    let app = common::create_test_app().await;

    let body = post(
        &app,
        "/api/user/sign-up/google",
        json!({ "full_name": "Grace Hopper", "email": "grace@example.com", "google_id": "g-9" }),
    )
    .await;
    assert!(body["payload"]["date_verified"].is_string());

    // The generated password is never usable.
    let body = login(&app, "grace@example.com", PASSWORD).await;
    assert_eq!(body, json!({ "message": "Email or Password is incorrect" }));
}

#[tokio::test]
async fn facebook_sign_up_without_email() {
    let app = common::create_test_app().await;
    let request = json!({ "full_name": "Alan Turing", "facebook_id": "fb-42" });

    let first = post(&app, "/api/user/sign-up/facebook", request.clone()).await;
    let second = post(&app, "/api/user/sign-up/facebook", request).await;

    assert!(first["payload"]["email"].is_null());
    assert!(first["payload"]["date_verified"].is_string());
    assert_eq!(first["payload"]["user_id"], second["payload"]["user_id"]);
}

// ─── Password reset ──────────────────────────────────────────────

#[tokio::test]
async fn reset_for_unknown_email_is_rejected() {
    let app = common::create_test_app().await;

    let body = post(
        &app,
        "/api/user/reset-password",
        json!({ "email": "nobody@example.com" }),
    )
    .await;
    assert_eq!(
        body,
        json!({ "message": "This email address is not registered with us." })
    );
}

#[tokio::test]
async fn password_reset_round_trip() {
    let app = common::create_test_app().await;
    common::sign_up(&app, "ada@example.com").await;

    let body = post(
        &app,
        "/api/user/reset-password",
        json!({ "email": "ada@example.com" }),
    )
    .await;
    assert_eq!(body, json!({ "success": true }));

    let code = common::active_code(&app, VerificationAction::ResetPassword, "ada@example.com").await;
    let sent = app.mailer.wait_for(2).await;
    assert!(sent
        .iter()
        .any(|m| m.subject == "Reset password"
            && m.body.ends_with(&format!("/user/new-password/{code}"))));

    let body = post(
        &app,
        "/api/user/verification/code",
        json!({ "action": "reset-password", "verification_code": code }),
    )
    .await;
    assert_eq!(body, json!({ "success": true }));

    let new_password = "N3w$ecret";
    let wrong_old = post(
        &app,
        "/api/user/new-password",
        json!({
            "verification_code": code,
            "old_password": "N0t$theOld",
            "password": new_password,
            "confirm_password": new_password,
        }),
    )
    .await;
    assert_eq!(wrong_old, json!({ "message": "Old password is not valid" }));

    let reset = post(
        &app,
        "/api/user/new-password",
        json!({
            "verification_code": code,
            "old_password": PASSWORD,
            "password": new_password,
            "confirm_password": new_password,
        }),
    )
    .await;
    assert!(reset["token"].is_string());

    let body = login(&app, "ada@example.com", new_password).await;
    assert!(body["token"].is_string());
    let body = login(&app, "ada@example.com", PASSWORD).await;
    assert_eq!(body, json!({ "message": "Email or Password is incorrect" }));

    // Consumed.
    let body = post(
        &app,
        "/api/user/verification/code",
        json!({ "action": "reset-password", "verification_code": code }),
    )
    .await;
    assert_eq!(body, json!({ "message": "Verification code is not valid" }));
}

#[tokio::test]
async fn new_password_with_unknown_code_is_rejected() {
    let app = common::create_test_app().await;
    common::sign_up(&app, "ada@example.com").await;

    let body = post(
        &app,
        "/api/user/new-password",
        json!({
            "verification_code": "NOPE99",
            "old_password": PASSWORD,
            "password": "N3w$ecret",
            "confirm_password": "N3w$ecret",
        }),
    )
    .await;
    assert_eq!(body, json!({ "message": "Verification code is not valid" }));

    // The old password still works.
    let body = login(&app, "ada@example.com", PASSWORD).await;
    assert!(body["token"].is_string());
}

// ─── Registration verification ───────────────────────────────────

#[tokio::test]
async fn resend_extends_the_active_code() {
    let app = common::create_test_app().await;
    common::sign_up(&app, "ada@example.com").await;
    let first = app
        .db
        .find_active_code_by_email(
            VerificationAction::RegisterVerification,
            "ada@example.com",
            chrono::Utc::now(),
        )
        .await
        .unwrap()
        .unwrap();

    let body = post(
        &app,
        "/api/user/register-verification-resend",
        json!({ "email": "ada@example.com" }),
    )
    .await;
    assert_eq!(body, json!({ "success": true }));

    let second = app
        .db
        .find_active_code_by_email(
            VerificationAction::RegisterVerification,
            "ada@example.com",
            chrono::Utc::now(),
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second.id, first.id);
    assert_eq!(second.verification_code, first.verification_code);
    assert_eq!(second.resend_count, 1);
    assert!(second.date_expired >= first.date_expired);

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_verification_code")
        .fetch_one(app.db.pool())
        .await
        .unwrap();
    assert_eq!(rows, 1);
    app.mailer.wait_for(2).await;
}

#[tokio::test]
async fn registration_verification_marks_user_verified() {
    let app = common::create_test_app().await;
    common::sign_up(&app, "ada@example.com").await;
    let code =
        common::active_code(&app, VerificationAction::RegisterVerification, "ada@example.com")
            .await;

    let body = post(
        &app,
        "/api/user/register-verification",
        json!({ "verification_code": code, "session_id": "device-1" }),
    )
    .await;
    assert!(body["payload"]["date_verified"].is_string());
    assert_eq!(body["session_id"], "device-1");

    let again = post(
        &app,
        "/api/user/register-verification",
        json!({ "verification_code": code }),
    )
    .await;
    assert_eq!(again, json!({ "message": "Verification code is not valid" }));
}

#[tokio::test]
async fn verification_check_rejects_unknown_action_and_wrong_code() {
    let app = common::create_test_app().await;
    common::sign_up(&app, "ada@example.com").await;
    let code =
        common::active_code(&app, VerificationAction::RegisterVerification, "ada@example.com")
            .await;

    for body in [
        json!({ "action": "launch-rockets", "verification_code": code }),
        json!({ "action": "reset-password", "verification_code": code }),
        json!({ "action": "register-verification", "verification_code": "ZZZZZZ" }),
    ] {
        let reply = post(&app, "/api/user/verification/code", body).await;
        assert_eq!(reply, json!({ "message": "Verification code is not valid" }));
    }
}

// ─── Sessions ────────────────────────────────────────────────────

#[tokio::test]
async fn session_refresh_touches_one_row_per_device() {
    let app = common::create_test_app().await;
    let signed_up = common::sign_up(&app, "ada@example.com").await;
    let token = token(&signed_up);

    let first = authed(
        &app,
        "POST",
        "/api/user/session",
        &token,
        json!({ "session_id": "device-9" }),
    )
    .await;
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let second = authed(
        &app,
        "POST",
        "/api/user/session",
        &token,
        json!({ "session_id": "device-9" }),
    )
    .await;

    assert_eq!(first["current"]["id"], second["current"]["id"]);
    let updated = |snapshot: &Value| {
        serde_json::from_value::<chrono::DateTime<chrono::Utc>>(
            snapshot["current"]["date_updated"].clone(),
        )
        .unwrap()
    };
    assert!(updated(&second) > updated(&first));
    assert!(second["refresh_token"].is_string());
}

#[tokio::test]
async fn session_refresh_reports_previous_session() {
    let app = common::create_test_app().await;
    let signed_up = common::sign_up(&app, "ada@example.com").await;
    let token = token(&signed_up);
    let sign_up_session = signed_up["session_id"].as_str().unwrap().to_string();

    // Sign-up already recorded one session today.
    let snapshot = authed(
        &app,
        "POST",
        "/api/user/session",
        &token,
        json!({ "session_id": sign_up_session }),
    )
    .await;
    assert!(snapshot.get("previous").is_none());

    let snapshot = authed(
        &app,
        "POST",
        "/api/user/session",
        &token,
        json!({ "session_id": "second-device" }),
    )
    .await;
    assert_eq!(snapshot["previous"]["session_id"], sign_up_session.as_str());
}

#[tokio::test]
async fn session_refresh_without_session_id_fails() {
    let app = common::create_test_app().await;
    let signed_up = common::sign_up(&app, "ada@example.com").await;

    let body = authed(&app, "POST", "/api/user/session", &token(&signed_up), json!({})).await;
    assert_eq!(body, json!({ "message": "There was an error occur" }));
}

// ─── Display name & Logout ───────────────────────────────────────

#[tokio::test]
async fn display_name_update_and_reset() {
    let app = common::create_test_app().await;
    let signed_up = common::sign_up(&app, "ada@example.com").await;
    let token = token(&signed_up);

    let body = authed(
        &app,
        "PATCH",
        "/api/user/display-name/reset",
        &token,
        json!({}),
    )
    .await;
    assert_eq!(body, json!({ "message": "Nothing change" }));

    let body = authed(
        &app,
        "PATCH",
        "/api/user/display-name",
        &token,
        json!({ "display_name": "Countess" }),
    )
    .await;
    assert_eq!(body["payload"]["display_name"], "Countess");
    assert_eq!(body["payload"]["full_name"], "Ada Lovelace");

    let body = authed(
        &app,
        "PATCH",
        "/api/user/display-name/reset",
        &token,
        json!({}),
    )
    .await;
    assert_eq!(body["payload"]["display_name"], "Ada Lovelace");
}

#[tokio::test]
async fn logout_revokes_live_tokens() {
    let app = common::create_test_app().await;
    let signed_up = common::sign_up(&app, "ada@example.com").await;
    let user_id = signed_up["payload"]["user_id"].as_i64().unwrap();

    let body = authed(&app, "GET", "/api/user/logout", &token(&signed_up), json!({})).await;
    assert_eq!(body, json!({ "success": true }));

    let live = app
        .state
        .identity
        .access_tokens()
        .live_tokens(user_id)
        .await
        .unwrap();
    assert!(live.is_empty());
}

#[tokio::test]
async fn dashboard_counts_logins_and_sessions() {
    let app = common::create_test_app().await;
    let signed_up = common::sign_up(&app, "ada@example.com").await;
    login(&app, "ada@example.com", PASSWORD).await;

    let body = authed(&app, "GET", "/api/user/dashboard", &token(&signed_up), json!({})).await;
    assert_eq!(body["users"].as_array().unwrap().len(), 1);
    assert_eq!(body["users"][0]["login_count"], 2);
    assert!(body["users"][0]["last_session"].is_string());
    assert_eq!(body["dashboard"]["total_user"], 1);
    assert_eq!(body["dashboard"]["total_user_active_today"], 1);
}
