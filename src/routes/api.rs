// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! JSON API routes under `/api`.
//!
//! Logical failures answer 200 with `{"message": …}`; success is told apart
//! by payload shape.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    middleware,
    routing::{get, patch, post},
    Extension, Json, Router,
};
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::middleware::auth::{authorize_api, ApiGate, Identity};
use crate::services::identity::{AuthSuccess, Dashboard, SessionSnapshot};
use crate::validation::{
    DisplayNameRequest, EmailRequest, LoginRequest, NewPasswordRequest,
    RegisterVerificationRequest, SessionRequest, SignUpEmailRequest, SignUpFacebookRequest,
    SignUpGoogleRequest, VerificationCodeCheckRequest,
};
use crate::AppState;

/// Access types required for the API. None are defined yet.
const API_ACCESS_TYPES: &[&str] = &[];

/// Create API routes, all behind [`authorize_api`].
pub fn routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let gate = ApiGate::new(state, API_ACCESS_TYPES);

    Router::new()
        .route("/api", get(index))
        .route("/api/", get(index))
        .route("/api/user/login", post(login))
        .route("/api/user/sign-up/email", post(sign_up_email))
        .route("/api/user/sign-up/google", post(sign_up_google))
        .route("/api/user/sign-up/facebook", post(sign_up_facebook))
        .route("/api/user/reset-password", post(reset_password))
        .route("/api/user/new-password", post(new_password))
        .route("/api/user/register-verification", post(register_verification))
        .route(
            "/api/user/register-verification-resend",
            post(register_verification_resend),
        )
        .route("/api/user/verification/code", post(verification_code))
        .route("/api/user/session", post(session))
        .route("/api/user/display-name", patch(update_display_name))
        .route("/api/user/display-name/reset", patch(reset_display_name))
        .route("/api/user/logout", get(logout))
        .route("/api/user/dashboard", get(dashboard))
        .route_layer(middleware::from_fn_with_state(gate, authorize_api))
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

fn success() -> Json<SuccessResponse> {
    Json(SuccessResponse { success: true })
}

/// Unreadable bodies are reported like any other validation failure.
fn body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| AppError::Validation(rejection.body_text()))
}

async fn index() -> Json<SuccessResponse> {
    success()
}

// ─── Login & Sign-up ─────────────────────────────────────────────

async fn login(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthSuccess>> {
    Ok(Json(state.identity.login(body(payload)?).await?))
}

async fn sign_up_email(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<SignUpEmailRequest>, JsonRejection>,
) -> Result<Json<AuthSuccess>> {
    Ok(Json(state.identity.sign_up_email(body(payload)?).await?))
}

async fn sign_up_google(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<SignUpGoogleRequest>, JsonRejection>,
) -> Result<Json<AuthSuccess>> {
    Ok(Json(state.identity.sign_up_google(body(payload)?).await?))
}

async fn sign_up_facebook(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<SignUpFacebookRequest>, JsonRejection>,
) -> Result<Json<AuthSuccess>> {
    Ok(Json(state.identity.sign_up_facebook(body(payload)?).await?))
}

// ─── Password reset & Verification ───────────────────────────────

async fn reset_password(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<EmailRequest>, JsonRejection>,
) -> Result<Json<SuccessResponse>> {
    state
        .identity
        .request_password_reset(body(payload)?)
        .await?;
    Ok(success())
}

async fn new_password(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<NewPasswordRequest>, JsonRejection>,
) -> Result<Json<AuthSuccess>> {
    Ok(Json(
        state
            .identity
            .complete_password_reset(body(payload)?)
            .await?,
    ))
}

async fn register_verification(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<RegisterVerificationRequest>, JsonRejection>,
) -> Result<Json<AuthSuccess>> {
    Ok(Json(
        state
            .identity
            .complete_registration_verification(body(payload)?)
            .await?,
    ))
}

async fn register_verification_resend(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<EmailRequest>, JsonRejection>,
) -> Result<Json<SuccessResponse>> {
    state
        .identity
        .resend_registration_verification(body(payload)?)
        .await?;
    Ok(success())
}

async fn verification_code(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<VerificationCodeCheckRequest>, JsonRejection>,
) -> Result<Json<SuccessResponse>> {
    state
        .identity
        .check_verification_code(body(payload)?)
        .await?;
    Ok(success())
}

// ─── Authenticated ───────────────────────────────────────────────

async fn session(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    payload: std::result::Result<Json<SessionRequest>, JsonRejection>,
) -> Result<Json<SessionSnapshot>> {
    let req = payload.map(|Json(r)| r).unwrap_or_default();
    Ok(Json(
        state
            .identity
            .refresh_session(&identity.payload, req.session_id)
            .await?,
    ))
}

async fn update_display_name(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    payload: std::result::Result<Json<DisplayNameRequest>, JsonRejection>,
) -> Result<Json<AuthSuccess>> {
    Ok(Json(
        state
            .identity
            .update_display_name(&identity.payload, body(payload)?)
            .await?,
    ))
}

async fn reset_display_name(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    payload: std::result::Result<Json<SessionRequest>, JsonRejection>,
) -> Result<Json<AuthSuccess>> {
    let req = payload.map(|Json(r)| r).unwrap_or_default();
    Ok(Json(
        state
            .identity
            .reset_display_name(&identity.payload, req.session_id)
            .await?,
    ))
}

async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<SuccessResponse>> {
    state.identity.logout(&identity.payload).await?;
    tracing::info!(user_id = identity.user_id(), "User logged out");
    Ok(success())
}

async fn dashboard(State(state): State<Arc<AppState>>) -> Result<Json<Dashboard>> {
    Ok(Json(state.identity.dashboard().await?))
}
