// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Front-end routes.
//!
//! Pages answer with a JSON [`PageView`]: the values a template would be
//! rendered with. Every mutation goes through the JSON API over HTTP using
//! [`ApiClient`](crate::services::ApiClient), forwarding the `userSave`
//! token.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Extension, Form, Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::GENERIC_ERROR;
use crate::middleware::auth::{
    authorize, client_redirect, is_authorized, session_cookie, user_cookie, Identity,
    SessionContext, HOME_PATH, LOGIN_PATH, SESSION_COOKIE, USER_COOKIE,
};
use crate::models::{UserSession, VerificationAction};
use crate::services::identity::MSG_CODE_INVALID;
use crate::services::TokenPayload;
use crate::validation::{
    check, DisplayNameRequest, EmailRequest, LoginRequest, NewPasswordRequest, SignUpEmailRequest,
};
use crate::AppState;

const PROFILE_PATH: &str = "/user/profile";

const MSG_CHECK_EMAIL: &str = "Please check your email for verification link";
const MSG_PASSWORD_UPDATED: &str = "Your new password has been updated";
const MSG_ACCOUNT_ACTIVATED: &str = "Your account has been activated";
const MSG_PROFILE_UPDATED: &str = "Your profile has been updated";

pub fn routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let signed_in = middleware::from_fn_with_state(state.clone(), authorize);
    let guest = middleware::from_fn_with_state(state, is_authorized);

    Router::new()
        .route("/", get(index).route_layer(signed_in.clone()))
        .route(
            "/user/profile",
            get(profile)
                .post(update_profile)
                .route_layer(signed_in.clone()),
        )
        .route(
            "/user/display-name/reset",
            get(display_name_reset).route_layer(signed_in),
        )
        .route(
            "/user/login",
            get(login_page).route_layer(guest.clone()).post(login),
        )
        .route(
            "/user/sign-up",
            get(sign_up_page).route_layer(guest.clone()).post(sign_up),
        )
        .route(
            "/user/reset-password",
            get(reset_password_page)
                .route_layer(guest.clone())
                .post(reset_password),
        )
        .route(
            "/user/new-password/{key}",
            get(new_password_page)
                .route_layer(guest.clone())
                .post(new_password),
        )
        .route(
            "/user/register-verification/{key}",
            get(register_verification)
                .route_layer(guest.clone())
                .post(register_verification),
        )
        .route(
            "/user/register-verification-resend",
            get(register_verification_resend_page)
                .route_layer(guest)
                .post(register_verification_resend),
        )
        .route("/user/logout", get(logout))
}

/// Data handed to the client in place of a rendered page.
#[derive(Debug, Default, Serialize)]
pub struct PageView {
    pub title: &'static str,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub success: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<TokenPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dashboard: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_session: Option<UserSession>,
}

impl PageView {
    fn new(title: &'static str) -> Self {
        Self {
            title,
            ..Self::default()
        }
    }

    fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// The parts of an API answer the front end reads.
#[derive(Debug, Default, Deserialize)]
pub(super) struct ApiReply {
    pub(super) token: Option<String>,
    pub(super) session_id: Option<String>,
    payload: Option<TokenPayload>,
    #[serde(default)]
    success: bool,
    message: Option<String>,
}

impl ApiReply {
    /// An unreachable API reads as a generic failure.
    pub(super) fn from_response(value: Option<Value>) -> Self {
        match value.map(serde_json::from_value::<ApiReply>) {
            Some(Ok(reply)) => reply,
            Some(Err(e)) => {
                tracing::warn!(error = %e, "Unexpected API reply");
                Self::failed()
            }
            None => Self::failed(),
        }
    }

    fn failed() -> Self {
        Self {
            message: Some(GENERIC_ERROR.to_string()),
            ..Self::default()
        }
    }

    pub(super) fn message(self) -> String {
        self.message.unwrap_or_else(|| GENERIC_ERROR.to_string())
    }
}

pub(super) fn sid(jar: &CookieJar) -> Option<String> {
    jar.get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

fn token(jar: &CookieJar) -> Option<String> {
    jar.get(USER_COOKIE).map(|c| c.value().to_string())
}

/// Store a fresh token (and the session id it was issued for) in cookies.
pub(super) fn sign_in(
    state: &AppState,
    jar: CookieJar,
    token: String,
    session_id: Option<String>,
) -> CookieJar {
    let jar = jar.add(user_cookie(&state.config, token));
    match session_id {
        Some(sid) => jar.add(session_cookie(sid)),
        None => jar,
    }
}

async fn code_is_valid(state: &AppState, action: VerificationAction, code: &str) -> bool {
    let reply = state
        .api_client
        .post(
            None,
            "/user/verification/code",
            &json!({ "action": action.as_str(), "verification_code": code }),
        )
        .await;
    ApiReply::from_response(reply).success
}

// ─── Signed-in pages ─────────────────────────────────────────────

async fn index(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Extension(context): Extension<SessionContext>,
) -> Json<PageView> {
    let results = state
        .api_client
        .get(Some(&identity.token), "/user/dashboard")
        .await
        .unwrap_or(Value::Null);

    Json(PageView {
        user: Some(identity.payload),
        items: results.get("users").cloned(),
        dashboard: results.get("dashboard").cloned(),
        previous_session: context.previous,
        ..PageView::new("Dashboard")
    })
}

fn profile_view(identity: Identity, context: SessionContext) -> PageView {
    PageView {
        user: Some(identity.payload),
        previous_session: context.previous,
        ..PageView::new("Profile")
    }
    .with_data(json!({ "display_name": "" }))
}

async fn profile(
    Extension(identity): Extension<Identity>,
    Extension(context): Extension<SessionContext>,
) -> Json<PageView> {
    Json(profile_view(identity, context))
}

async fn update_profile(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Extension(identity): Extension<Identity>,
    Extension(context): Extension<SessionContext>,
    Form(mut form): Form<DisplayNameRequest>,
) -> Response {
    let token = identity.token.clone();
    let mut view = profile_view(identity, context.clone())
        .with_data(json!({ "display_name": form.display_name }));

    if let Err(e) = check(&form) {
        view.message = e.public_message().to_string();
        return Json(view).into_response();
    }

    form.session_id = Some(context.session_id);
    let reply = ApiReply::from_response(
        state
            .api_client
            .patch(Some(&token), "/user/display-name", &form)
            .await,
    );

    match reply.token {
        Some(token) => {
            view.user = reply.payload;
            view.success = MSG_PROFILE_UPDATED.to_string();
            let jar = jar.add(user_cookie(&state.config, token));
            (jar, Json(view)).into_response()
        }
        None => {
            view.message = reply.message();
            Json(view).into_response()
        }
    }
}

async fn display_name_reset(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Extension(identity): Extension<Identity>,
    Extension(context): Extension<SessionContext>,
) -> Response {
    let reply = ApiReply::from_response(
        state
            .api_client
            .patch(
                Some(&identity.token),
                "/user/display-name/reset",
                &json!({ "session_id": context.session_id }),
            )
            .await,
    );

    match reply.token {
        Some(token) => (
            jar.add(user_cookie(&state.config, token)),
            client_redirect(PROFILE_PATH),
        )
            .into_response(),
        None => client_redirect(PROFILE_PATH),
    }
}

// ─── Login & Sign-up ─────────────────────────────────────────────

async fn login_page() -> Json<PageView> {
    Json(PageView::new("Login").with_data(json!({ "email": "" })))
}

async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(mut form): Form<LoginRequest>,
) -> Response {
    let mut view = PageView::new("Login").with_data(json!({ "email": form.email }));

    if let Err(e) = check(&form) {
        view.message = e.public_message().to_string();
        return Json(view).into_response();
    }

    form.session_id = form.session_id.or_else(|| sid(&jar));
    let reply =
        ApiReply::from_response(state.api_client.post(None, "/user/login", &form).await);

    match reply.token {
        Some(token) => {
            let jar = sign_in(&state, jar, token, reply.session_id);
            (jar, client_redirect(HOME_PATH)).into_response()
        }
        None => {
            view.message = reply.message();
            Json(view).into_response()
        }
    }
}

async fn sign_up_page() -> Json<PageView> {
    Json(PageView::new("Sign up").with_data(json!({ "full_name": "", "email": "" })))
}

async fn sign_up(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(mut form): Form<SignUpEmailRequest>,
) -> Response {
    let mut view = PageView::new("Sign up")
        .with_data(json!({ "full_name": form.full_name, "email": form.email }));

    if let Err(e) = check(&form) {
        view.message = e.public_message().to_string();
        return Json(view).into_response();
    }

    form.session_id = form.session_id.or_else(|| sid(&jar));
    let reply = ApiReply::from_response(
        state
            .api_client
            .post(None, "/user/sign-up/email", &form)
            .await,
    );

    match reply.token {
        Some(token) => {
            let jar = sign_in(&state, jar, token, reply.session_id);
            (jar, client_redirect(HOME_PATH)).into_response()
        }
        None => {
            view.message = reply.message();
            Json(view).into_response()
        }
    }
}

// ─── Password reset ──────────────────────────────────────────────

async fn reset_password_page() -> Json<PageView> {
    Json(PageView::new("Reset password").with_data(json!({ "email": "" })))
}

/// Shared by password reset and registration resend: post an email
/// address and report whether a link went out.
async fn request_link(
    state: &AppState,
    title: &'static str,
    api_path: &str,
    form: EmailRequest,
) -> PageView {
    let mut view = PageView::new(title).with_data(json!({ "email": form.email }));

    if let Err(e) = check(&form) {
        view.message = e.public_message().to_string();
        return view;
    }

    let reply = ApiReply::from_response(state.api_client.post(None, api_path, &form).await);
    if reply.success {
        view.success = MSG_CHECK_EMAIL.to_string();
    } else {
        view.message = reply.message();
    }
    view
}

async fn reset_password(
    State(state): State<Arc<AppState>>,
    Form(form): Form<EmailRequest>,
) -> Json<PageView> {
    Json(request_link(&state, "Reset password", "/user/reset-password", form).await)
}

async fn new_password_page(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Json<PageView> {
    let mut view = PageView::new("New password");
    if !code_is_valid(&state, VerificationAction::ResetPassword, &key).await {
        view.error = MSG_CODE_INVALID.to_string();
    }
    Json(view)
}

async fn new_password(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(key): Path<String>,
    Form(mut form): Form<NewPasswordRequest>,
) -> Response {
    let mut view = PageView::new("New password");

    if !code_is_valid(&state, VerificationAction::ResetPassword, &key).await {
        view.error = MSG_CODE_INVALID.to_string();
        return Json(view).into_response();
    }

    form.verification_code = key;
    if let Err(e) = check(&form) {
        view.message = e.public_message().to_string();
        return Json(view).into_response();
    }

    form.session_id = form.session_id.or_else(|| sid(&jar));
    let reply = ApiReply::from_response(
        state
            .api_client
            .post(None, "/user/new-password", &form)
            .await,
    );

    match reply.token {
        Some(token) => {
            view.success = MSG_PASSWORD_UPDATED.to_string();
            let jar = sign_in(&state, jar, token, reply.session_id);
            (jar, Json(view)).into_response()
        }
        None => {
            view.message = reply.message();
            Json(view).into_response()
        }
    }
}

// ─── Registration verification ───────────────────────────────────

async fn register_verification(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(key): Path<String>,
) -> Response {
    let mut view = PageView::new("Account verification");

    if !code_is_valid(&state, VerificationAction::RegisterVerification, &key).await {
        view.error = MSG_CODE_INVALID.to_string();
        return Json(view).into_response();
    }

    let reply = ApiReply::from_response(
        state
            .api_client
            .post(
                None,
                "/user/register-verification",
                &json!({ "verification_code": key, "session_id": sid(&jar) }),
            )
            .await,
    );

    match reply.token {
        Some(token) => {
            view.success = MSG_ACCOUNT_ACTIVATED.to_string();
            let jar = sign_in(&state, jar, token, reply.session_id);
            (jar, Json(view)).into_response()
        }
        None => {
            view.message = reply.message();
            Json(view).into_response()
        }
    }
}

async fn register_verification_resend_page(
    identity: Option<Extension<Identity>>,
) -> Json<PageView> {
    let email = identity.and_then(|Extension(i)| i.payload.email);
    Json(PageView::new("Account verification").with_data(json!({ "email": email })))
}

async fn register_verification_resend(
    State(state): State<Arc<AppState>>,
    Form(form): Form<EmailRequest>,
) -> Json<PageView> {
    Json(
        request_link(
            &state,
            "Account verification",
            "/user/register-verification-resend",
            form,
        )
        .await,
    )
}

// ─── Logout ──────────────────────────────────────────────────────

async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    if let Some(token) = token(&jar) {
        if state
            .api_client
            .get(Some(&token), "/user/logout")
            .await
            .is_none()
        {
            tracing::warn!("Logout did not reach the API; clearing cookie anyway");
        }
    }

    // A fresh device session starts with the next login.
    let jar = jar
        .remove(Cookie::build(USER_COOKIE).path("/"))
        .remove(Cookie::build(SESSION_COOKIE).path("/"));
    (jar, client_redirect(LOGIN_PATH)).into_response()
}
