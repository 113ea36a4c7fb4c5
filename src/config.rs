// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! A `.env` file is honoured for local development.

use std::env;
use std::path::PathBuf;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,
    /// sqlx connection string for the relational store
    pub database_url: String,
    /// Base URL of the JSON API as seen by the front-end tier (without `/api`)
    pub api_url: String,
    /// Public URL used in emailed links
    pub frontend_url: String,
    /// PEM-encoded RSA private key used to sign tokens
    pub jwt_private_key_path: PathBuf,
    /// PEM-encoded RSA public key used to verify tokens
    pub jwt_public_key_path: PathBuf,
    /// Transactional mail API; `None` logs mail instead of sending it
    pub mail: Option<MailConfig>,
    /// Mark cookies `Secure` (HTTPS deployments)
    pub cookie_secure: bool,
    /// Browser sign-in through Google and Facebook
    pub oauth: OAuthConfig,
}

/// Credentials for the transactional mail HTTP API.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub api_url: String,
    pub api_key: String,
    pub sender_email: String,
    pub sender_name: Option<String>,
}

/// OAuth providers for the front end. A provider without credentials is
/// disabled.
#[derive(Debug, Clone, Default)]
pub struct OAuthConfig {
    /// HMAC-SHA256 key signing the `state` round trip.
    pub state_key: Vec<u8>,
    pub google: Option<OAuthClientConfig>,
    pub facebook: Option<OAuthClientConfig>,
}

/// One provider's app credentials and endpoints.
#[derive(Debug, Clone)]
pub struct OAuthClientConfig {
    pub client_id: String,
    pub client_secret: String,
    pub authorize_url: String,
    pub token_url: String,
    pub profile_url: String,
}

impl OAuthClientConfig {
    pub fn google(client_id: String, client_secret: String) -> Self {
        Self {
            client_id,
            client_secret,
            authorize_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            profile_url: "https://openidconnect.googleapis.com/v1/userinfo".to_string(),
        }
    }

    pub fn facebook(app_id: String, app_secret: String) -> Self {
        Self {
            client_id: app_id,
            client_secret: app_secret,
            authorize_url: "https://www.facebook.com/v19.0/dialog/oauth".to_string(),
            token_url: "https://graph.facebook.com/v19.0/oauth/access_token".to_string(),
            profile_url: "https://graph.facebook.com/me?fields=id,name".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        Ok(Self {
            port,
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://account.db?mode=rwc".to_string()),
            api_url: env::var("API_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| format!("http://127.0.0.1:{port}")),
            frontend_url: env::var("FRONTEND_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| format!("http://localhost:{port}")),
            jwt_private_key_path: env::var("JWT_PRIVATE_KEY_PATH")
                .map(PathBuf::from)
                .map_err(|_| ConfigError::Missing("JWT_PRIVATE_KEY_PATH"))?,
            jwt_public_key_path: env::var("JWT_PUBLIC_KEY_PATH")
                .map(PathBuf::from)
                .map_err(|_| ConfigError::Missing("JWT_PUBLIC_KEY_PATH"))?,
            mail: mail_from_env()?,
            cookie_secure: env::var("COOKIE_SECURE")
                .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
                .unwrap_or(false),
            oauth: oauth_from_env()?,
        })
    }

    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            port: 3000,
            database_url: "sqlite::memory:".to_string(),
            api_url: "http://127.0.0.1:9".to_string(),
            frontend_url: "http://localhost:3000".to_string(),
            jwt_private_key_path: PathBuf::from("tests/fixtures/jwt_private.pem"),
            jwt_public_key_path: PathBuf::from("tests/fixtures/jwt_public.pem"),
            mail: None,
            cookie_secure: false,
            oauth: OAuthConfig {
                state_key: b"test-oauth-state-key".to_vec(),
                ..OAuthConfig::default()
            },
        }
    }
}

/// Mail settings are all-or-nothing: a key without a sender is a mistake.
fn mail_from_env() -> Result<Option<MailConfig>, ConfigError> {
    let Ok(api_key) = env::var("MAIL_API_KEY") else {
        return Ok(None);
    };
    let api_key = api_key.trim().to_string();
    if api_key.is_empty() {
        return Ok(None);
    }

    Ok(Some(MailConfig {
        api_url: env::var("MAIL_API_URL")
            .unwrap_or_else(|_| "https://api.brevo.com/v3/smtp/email".to_string()),
        api_key,
        sender_email: env::var("MAIL_SENDER_EMAIL")
            .map(|v| v.trim().to_string())
            .map_err(|_| ConfigError::Missing("MAIL_SENDER_EMAIL"))?,
        sender_name: env::var("MAIL_SENDER_NAME").ok(),
    }))
}

fn oauth_from_env() -> Result<OAuthConfig, ConfigError> {
    let credentials = |id_var: &str, secret_var: &str| {
        let id = env::var(id_var).ok().filter(|v| !v.trim().is_empty())?;
        let secret = env::var(secret_var).ok().filter(|v| !v.trim().is_empty())?;
        Some((id.trim().to_string(), secret.trim().to_string()))
    };

    let google = credentials("OAUTH_GOOGLE_CLIENT_ID", "OAUTH_GOOGLE_CLIENT_SECRET")
        .map(|(id, secret)| OAuthClientConfig::google(id, secret));
    let facebook = credentials("OAUTH_FACEBOOK_APP_ID", "OAUTH_FACEBOOK_APP_SECRET")
        .map(|(id, secret)| OAuthClientConfig::facebook(id, secret));

    if google.is_none() && facebook.is_none() {
        return Ok(OAuthConfig::default());
    }

    let state_key = env::var("OAUTH_STATE_KEY")
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing("OAUTH_STATE_KEY"))?
        .into_bytes();

    Ok(OAuthConfig {
        state_key,
        google,
        facebook,
    })
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}
