// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google and Facebook sign-in for the front end (authorization-code flow).
//!
//! The `state` parameter is `provider|issued_at_hex|signature_hex`, signed
//! with HMAC-SHA256 and base64url-encoded. A callback only completes a flow
//! this service started, for the same provider, within [`STATE_MAX_AGE`].

use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::Context;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use crate::config::{OAuthClientConfig, OAuthConfig};
use crate::error::AppError;
use crate::models::UnknownVariant;

type HmacSha256 = Hmac<Sha256>;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// How long a started flow may take to come back.
pub const STATE_MAX_AGE: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuthProvider {
    Google,
    Facebook,
}

impl OAuthProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            OAuthProvider::Google => "google",
            OAuthProvider::Facebook => "facebook",
        }
    }

    fn scope(self) -> Option<&'static str> {
        match self {
            OAuthProvider::Google => Some("openid profile email"),
            OAuthProvider::Facebook => None,
        }
    }
}

impl FromStr for OAuthProvider {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google" => Ok(OAuthProvider::Google),
            "facebook" => Ok(OAuthProvider::Facebook),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// The profile fields sign-up needs. Google names the id `sub`.
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthProfile {
    #[serde(alias = "sub")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Clone)]
pub struct OAuthClient {
    http_client: reqwest::Client,
    config: OAuthConfig,
    /// Callbacks land on `{frontend_url}/oauth/{provider}/callback`.
    frontend_url: String,
}

impl OAuthClient {
    pub fn new(config: OAuthConfig, frontend_url: &str) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("failed building OAuth HTTP client")?;

        Ok(Self {
            http_client,
            config,
            frontend_url: frontend_url.trim_end_matches('/').to_string(),
        })
    }

    fn provider_config(&self, provider: OAuthProvider) -> Option<&OAuthClientConfig> {
        match provider {
            OAuthProvider::Google => self.config.google.as_ref(),
            OAuthProvider::Facebook => self.config.facebook.as_ref(),
        }
    }

    pub fn callback_url(&self, provider: OAuthProvider) -> String {
        format!("{}/oauth/{}/callback", self.frontend_url, provider.as_str())
    }

    /// The provider's consent page for a new flow, or `None` when the
    /// provider has no credentials.
    pub fn authorization_url(&self, provider: OAuthProvider) -> Result<Option<String>, AppError> {
        let Some(client) = self.provider_config(provider) else {
            return Ok(None);
        };

        let state = sign_state(provider, &self.config.state_key, now_millis()?)?;
        let separator = if client.authorize_url.contains('?') { '&' } else { '?' };

        let mut url = format!(
            "{}{}client_id={}&redirect_uri={}&response_type=code&state={}",
            client.authorize_url,
            separator,
            urlencoding::encode(&client.client_id),
            urlencoding::encode(&self.callback_url(provider)),
            state
        );
        if let Some(scope) = provider.scope() {
            url.push_str("&scope=");
            url.push_str(&urlencoding::encode(scope));
        }

        Ok(Some(url))
    }

    /// The provider `state` was issued for, if it is genuine and fresh.
    pub fn check_state(&self, state: &str) -> Option<OAuthProvider> {
        verify_state(state, &self.config.state_key, now_millis().ok()?)
    }

    /// Exchange an authorization code and read the caller's profile.
    pub async fn fetch_profile(
        &self,
        provider: OAuthProvider,
        code: &str,
    ) -> Result<OAuthProfile, AppError> {
        let client = self
            .provider_config(provider)
            .ok_or_else(|| anyhow::anyhow!("{} sign-in is not configured", provider.as_str()))?;
        let callback_url = self.callback_url(provider);

        let token: TokenResponse = self
            .http_client
            .post(&client.token_url)
            .form(&[
                ("client_id", client.client_id.as_str()),
                ("client_secret", client.client_secret.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
                ("redirect_uri", callback_url.as_str()),
            ])
            .send()
            .await
            .context("token exchange request failed")?
            .error_for_status()
            .context("token exchange rejected")?
            .json()
            .await
            .context("failed to parse token response")?;

        let profile: OAuthProfile = self
            .http_client
            .get(&client.profile_url)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .context("profile request failed")?
            .error_for_status()
            .context("profile request rejected")?
            .json()
            .await
            .context("failed to parse profile")?;

        tracing::info!(provider = provider.as_str(), "OAuth profile fetched");
        Ok(profile)
    }
}

pub fn now_millis() -> Result<u128, AppError> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| anyhow::anyhow!("System time error: {e}"))?
        .as_millis())
}

/// Signed, URL-safe `state` for a flow started at `issued_at_ms`.
pub fn sign_state(
    provider: OAuthProvider,
    key: &[u8],
    issued_at_ms: u128,
) -> Result<String, AppError> {
    let payload = format!("{}|{:x}", provider.as_str(), issued_at_ms);

    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| anyhow::anyhow!("HMAC init failed: {e}"))?;
    mac.update(payload.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());

    Ok(URL_SAFE_NO_PAD.encode(format!("{payload}|{signature}")))
}

/// Check a `state` at `now_ms` and return the provider it names.
pub fn verify_state(state: &str, key: &[u8], now_ms: u128) -> Option<OAuthProvider> {
    let bytes = URL_SAFE_NO_PAD.decode(state).ok()?;
    let decoded = String::from_utf8(bytes).ok()?;

    let (payload, signature_hex) = decoded.rsplit_once('|')?;
    let signature = hex::decode(signature_hex).ok()?;

    let mut mac = HmacSha256::new_from_slice(key).ok()?;
    mac.update(payload.as_bytes());
    if mac.verify_slice(&signature).is_err() {
        tracing::warn!("OAuth state signature mismatch");
        return None;
    }

    let (provider, issued_hex) = payload.split_once('|')?;
    let issued_at = u128::from_str_radix(issued_hex, 16).ok()?;
    if now_ms.saturating_sub(issued_at) > STATE_MAX_AGE.as_millis() {
        tracing::info!(provider, "OAuth state expired");
        return None;
    }

    provider.parse().ok()
}
