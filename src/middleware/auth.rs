// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Authentication gates.
//!
//! - [`authorize_api`]: bearer token in the `Authorization` header, 401 on
//!   failure. Used by the JSON API.
//! - [`authorize`]: `userSave` cookie, refreshes session bookkeeping through
//!   the API and redirects anonymous or unverified callers.
//! - [`is_authorized`]: inverse guard for login-type pages.
//!
//! Front-end redirects are HTTP 200 with a `Refresh` header and a
//! `{"redirect": …}` body, so browsers navigate client-side.

use std::sync::Arc;

use axum::{
    extract::{MatchedPath, Request, State},
    http::{header, HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::Deserialize;
use serde_json::json;

use crate::config::Config;
use crate::error::AppError;
use crate::models::UserSession;
use crate::services::token::{TokenPayload, TOKEN_LIFETIME_DAYS};
use crate::AppState;

/// Cookie carrying the signed token.
pub const USER_COOKIE: &str = "userSave";
/// Cookie carrying the device session id.
pub const SESSION_COOKIE: &str = "sid";

pub const LOGIN_PATH: &str = "/user/login";
pub const VERIFICATION_RESEND_PATH: &str = "/user/register-verification-resend";
pub const HOME_PATH: &str = "/";

const REFRESH: HeaderName = HeaderName::from_static("refresh");

/// Reachable without authentication. Matched against the request path and
/// the matched route pattern.
pub const BYPASS_PATHS: &[&str] = &[
    "/api/user/login",
    "/api/user/sign-up/email",
    "/api/user/sign-up/google",
    "/api/user/sign-up/facebook",
    "/api/user/reset-password",
    "/api/user/new-password",
    "/api/user/verification/code",
    "/api/user/register-verification",
    "/api/user/register-verification-resend",
    "/user/login",
    "/user/sign-up",
    "/user/sign-up/google",
    "/user/sign-up/facebook",
    "/user/reset-password",
    "/user/register-verification",
    "/user/register-verification-resend",
    "/user/register-verification/{key}",
];

/// Authenticated caller, inserted into request extensions by the gates.
#[derive(Debug, Clone)]
pub struct Identity {
    pub payload: TokenPayload,
    /// The token as presented, for forwarding to the API.
    pub token: String,
}

impl Identity {
    pub fn user_id(&self) -> i64 {
        self.payload.user_id
    }
}

/// Session bookkeeping attached by [`authorize`].
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    pub session_id: String,
    pub current: Option<UserSession>,
    pub previous: Option<UserSession>,
}

pub fn is_bypassed(request: &Request) -> bool {
    let path = request.uri().path();
    let matched = request
        .extensions()
        .get::<MatchedPath>()
        .map(MatchedPath::as_str);

    BYPASS_PATHS.contains(&path) || matched.is_some_and(|m| BYPASS_PATHS.contains(&m))
}

// ─── API surface ─────────────────────────────────────────────────

/// State for [`authorize_api`].
#[derive(Clone)]
pub struct ApiGate {
    pub app: Arc<AppState>,
    /// Capability tags a caller needs. Accepted and logged, not enforced:
    /// no access-type policy has been defined yet.
    pub allowed_access_types: Arc<[String]>,
}

impl ApiGate {
    pub fn new(app: Arc<AppState>, allowed_access_types: &[&str]) -> Self {
        Self {
            app,
            allowed_access_types: allowed_access_types
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Middleware that requires a valid bearer token unless the path is
/// bypassed.
pub async fn authorize_api(
    State(gate): State<ApiGate>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if is_bypassed(&request) {
        return Ok(next.run(request).await);
    }

    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .filter(|h| !h.trim().is_empty())
        .ok_or(AppError::Unauthorized)?
        .to_string();

    let claims = gate
        .app
        .identity
        .tokens()
        .verify(&token)
        .map_err(|_| AppError::Unauthorized)?;

    tracing::debug!(
        user_id = claims.payload.user_id,
        required_access_types = ?gate.allowed_access_types,
        "API request authenticated"
    );

    request.extensions_mut().insert(Identity {
        payload: claims.payload,
        token,
    });

    Ok(next.run(request).await)
}

// ─── Front-end surface ───────────────────────────────────────────

/// Fields of the `/api/user/session` response the gate cares about.
#[derive(Debug, Deserialize)]
struct SessionRefresh {
    refresh_token: Option<String>,
    current: Option<UserSession>,
    previous: Option<UserSession>,
}

/// Middleware for pages that need a signed-in, verified user.
pub async fn authorize(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    if is_bypassed(&request) {
        return next.run(request).await;
    }

    let Some(identity) = cookie_identity(&state, &jar) else {
        return client_redirect(LOGIN_PATH);
    };

    let mut cookies = Vec::new();
    let session_id = match jar.get(SESSION_COOKIE) {
        Some(c) if !c.value().is_empty() => c.value().to_string(),
        _ => {
            let sid = uuid::Uuid::new_v4().to_string();
            cookies.push(session_cookie(sid.clone()));
            sid
        }
    };

    let mut context = SessionContext {
        session_id: session_id.clone(),
        ..SessionContext::default()
    };

    let refreshed = state
        .api_client
        .post(
            Some(&identity.token),
            "/user/session",
            &json!({ "session_id": session_id }),
        )
        .await
        .and_then(|v| serde_json::from_value::<SessionRefresh>(v).ok());

    if let Some(refresh) = refreshed {
        context.current = refresh.current;
        context.previous = refresh.previous;
        if let Some(token) = refresh.refresh_token {
            cookies.push(user_cookie(&state.config, token));
        }
    }

    if !identity.payload.is_verified() {
        return with_cookies(client_redirect(VERIFICATION_RESEND_PATH), cookies);
    }

    request.extensions_mut().insert(identity);
    request.extensions_mut().insert(context);

    with_cookies(next.run(request).await, cookies)
}

/// Middleware for login-type pages: signed-in users are sent on.
pub async fn is_authorized(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    match cookie_identity(&state, &jar) {
        Some(identity) if identity.payload.is_verified() => client_redirect(HOME_PATH),
        Some(_) if !is_bypassed(&request) => client_redirect(VERIFICATION_RESEND_PATH),
        Some(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        None => next.run(request).await,
    }
}

fn cookie_identity(state: &AppState, jar: &CookieJar) -> Option<Identity> {
    let token = jar.get(USER_COOKIE)?.value().to_string();
    match state.identity.tokens().verify(&token) {
        Ok(claims) => Some(Identity {
            payload: claims.payload,
            token,
        }),
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring unusable userSave cookie");
            None
        }
    }
}

/// Client-side redirect: 200, `Refresh` header, `{"redirect": to}`.
pub fn client_redirect(to: &str) -> Response {
    (
        StatusCode::OK,
        [(REFRESH, format!("0; url={to}"))],
        Json(json!({ "redirect": to })),
    )
        .into_response()
}

/// The `userSave` cookie: 30 days, HttpOnly, site-wide.
pub fn user_cookie(config: &Config, token: String) -> Cookie<'static> {
    Cookie::build((USER_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(config.cookie_secure)
        .max_age(time::Duration::days(TOKEN_LIFETIME_DAYS))
        .build()
}

/// The device session cookie; lives for the browser session.
pub fn session_cookie(session_id: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, session_id))
        .path("/")
        .http_only(true)
        .build()
}

/// Append `Set-Cookie` headers, leaving alone any cookie the handler
/// already set.
fn with_cookies(mut response: Response, cookies: Vec<Cookie<'static>>) -> Response {
    for cookie in cookies {
        let prefix = format!("{}=", cookie.name());
        let already_set = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .any(|v| v.starts_with(&prefix));
        if already_set {
            continue;
        }

        match HeaderValue::from_str(&cookie.to_string()) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => tracing::warn!(error = %e, cookie = cookie.name(), "Unencodable cookie"),
        }
    }
    response
}
