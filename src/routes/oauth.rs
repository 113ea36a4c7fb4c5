// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google and Facebook sign-in routes.
//!
//! `/oauth/{provider}` sends the browser to the provider. The callback
//! exchanges the code, signs the profile up through the JSON API and stores
//! the returned token and session id in cookies.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use std::sync::Arc;

use super::web::{sid, sign_in, ApiReply};
use crate::error::Result;
use crate::middleware::auth::{client_redirect, is_authorized, HOME_PATH, LOGIN_PATH};
use crate::services::OAuthProvider;
use crate::validation::{SignUpFacebookRequest, SignUpGoogleRequest};
use crate::AppState;

pub fn routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let guest = middleware::from_fn_with_state(state, is_authorized);

    Router::new()
        .route("/oauth/{provider}", get(auth_start))
        .route("/oauth/{provider}/callback", get(auth_callback))
        .route_layer(guest)
}

/// Start OAuth flow - redirect to the provider's consent page.
async fn auth_start(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
) -> Result<Response> {
    let Ok(provider) = provider.parse::<OAuthProvider>() else {
        return Ok(StatusCode::NOT_FOUND.into_response());
    };

    match state.oauth.authorization_url(provider)? {
        Some(url) => {
            tracing::info!(provider = provider.as_str(), "Starting OAuth flow");
            Ok(Redirect::temporary(&url).into_response())
        }
        None => {
            tracing::warn!(provider = provider.as_str(), "OAuth provider not configured");
            Ok(client_redirect(LOGIN_PATH))
        }
    }
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// What a completed flow hands back to the handler.
struct OAuthSignIn {
    token: String,
    session_id: Option<String>,
}

/// OAuth callback - sign the profile in, or send the browser to login.
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(provider): Path<String>,
    Query(params): Query<CallbackParams>,
) -> Response {
    let Ok(provider) = provider.parse::<OAuthProvider>() else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let session_id = sid(&jar);
    match complete_sign_in(&state, provider, params, session_id).await {
        Some(signed_in) => {
            let jar = sign_in(&state, jar, signed_in.token, signed_in.session_id);
            (jar, client_redirect(HOME_PATH)).into_response()
        }
        None => client_redirect(LOGIN_PATH),
    }
}

async fn complete_sign_in(
    state: &AppState,
    provider: OAuthProvider,
    params: CallbackParams,
    session_id: Option<String>,
) -> Option<OAuthSignIn> {
    if let Some(error) = params.error {
        tracing::warn!(provider = provider.as_str(), error = %error, "OAuth error from provider");
        return None;
    }

    let issued_for = params
        .state
        .as_deref()
        .and_then(|s| state.oauth.check_state(s));
    if issued_for != Some(provider) {
        tracing::warn!(provider = provider.as_str(), "Invalid or tampered OAuth state");
        return None;
    }

    let code = params.code.filter(|c| !c.is_empty())?;
    let profile = match state.oauth.fetch_profile(provider, &code).await {
        Ok(profile) => profile,
        Err(e) => {
            tracing::warn!(provider = provider.as_str(), error = %e, "OAuth exchange failed");
            return None;
        }
    };

    let reply = match provider {
        OAuthProvider::Google => {
            let Some(email) = profile.email else {
                tracing::warn!("Google profile has no email");
                return None;
            };
            let request = SignUpGoogleRequest {
                full_name: profile.name,
                email,
                google_id: profile.id,
                session_id,
            };
            state
                .api_client
                .post(None, "/user/sign-up/google", &request)
                .await
        }
        OAuthProvider::Facebook => {
            let request = SignUpFacebookRequest {
                full_name: profile.name,
                facebook_id: profile.id,
                session_id,
            };
            state
                .api_client
                .post(None, "/user/sign-up/facebook", &request)
                .await
        }
    };

    let reply = ApiReply::from_response(reply);
    match reply.token {
        Some(token) => Some(OAuthSignIn {
            token,
            session_id: reply.session_id,
        }),
        None => {
            tracing::warn!(
                provider = provider.as_str(),
                message = %reply.message(),
                "OAuth sign-up refused"
            );
            None
        }
    }
}
