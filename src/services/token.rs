// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Signed identity tokens (RS256).
//!
//! The same token travels as the API bearer credential and inside the
//! front-end `userSave` cookie.

use std::path::Path;

use chrono::{DateTime, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};

use crate::models::User;

/// Tokens and their ledger rows live this long.
pub const TOKEN_LIFETIME_DAYS: i64 = 30;

pub fn token_lifetime() -> chrono::Duration {
    chrono::Duration::days(TOKEN_LIFETIME_DAYS)
}

/// Token codec failures.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("signing key unavailable: {0}")]
    Signing(String),
    #[error("invalid token")]
    Invalid,
    #[error("token expired")]
    Expired,
}

/// Identity claims carried by a token. No secrets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenPayload {
    /// Capability tags. Always empty today; see `middleware::auth::ApiGate`.
    pub access_types: Vec<String>,
    pub full_name: String,
    pub display_name: String,
    pub email: Option<String>,
    pub user_id: i64,
    pub date_verified: Option<DateTime<Utc>>,
}

impl TokenPayload {
    pub fn from_user(user: &User) -> Self {
        Self {
            access_types: Vec::new(),
            full_name: user.full_name.clone(),
            display_name: user.display_name.clone(),
            email: user.email.clone(),
            user_id: user.id,
            date_verified: user.date_verified,
        }
    }

    pub fn is_verified(&self) -> bool {
        self.date_verified.is_some()
    }
}

/// Signed claims: the payload plus registered time claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    #[serde(flatten)]
    pub payload: TokenPayload,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

/// Issues and verifies tokens with an RSA key pair.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    /// Build a codec from PEM-encoded private and public keys.
    pub fn from_pem(private_pem: &[u8], public_pem: &[u8]) -> Result<Self, TokenError> {
        let encoding_key = EncodingKey::from_rsa_pem(private_pem)
            .map_err(|e| TokenError::Signing(format!("private key: {e}")))?;
        let decoding_key = DecodingKey::from_rsa_pem(public_pem)
            .map_err(|e| TokenError::Signing(format!("public key: {e}")))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_required_spec_claims(&["exp"]);

        Ok(Self {
            encoding_key,
            decoding_key,
            validation,
        })
    }

    /// Load both keys from disk.
    pub fn from_pem_files(private_path: &Path, public_path: &Path) -> Result<Self, TokenError> {
        let read = |path: &Path| {
            std::fs::read(path)
                .map_err(|e| TokenError::Signing(format!("{}: {e}", path.display())))
        };
        Self::from_pem(&read(private_path)?, &read(public_path)?)
    }

    /// Sign `payload` with a fresh 30-day expiry.
    pub fn issue(&self, payload: &TokenPayload) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = Claims {
            payload: payload.clone(),
            iat: now.timestamp(),
            exp: (now + token_lifetime()).timestamp(),
        };
        self.sign(&claims)
    }

    fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::RS256), claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Verify signature and expiry. Accepts an optional `Bearer` prefix in
    /// any case.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let token = strip_bearer(token);
        if token.is_empty() {
            return Err(TokenError::Invalid);
        }

        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => {
                    tracing::debug!("Rejected expired token");
                    TokenError::Expired
                }
                kind => {
                    tracing::debug!(reason = ?kind, "Rejected invalid token");
                    TokenError::Invalid
                }
            })
    }
}

/// Drop a leading `bearer` (case-insensitive) and surrounding whitespace.
fn strip_bearer(raw: &str) -> &str {
    let raw = raw.trim();
    match raw.get(..6) {
        Some(prefix) if prefix.eq_ignore_ascii_case("bearer") => raw[6..].trim(),
        _ => raw,
    }
}
