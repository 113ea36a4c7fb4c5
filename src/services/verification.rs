// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Single-use verification codes for password reset and registration.
//!
//! At most one code per (action, email) is treated as active. Asking again
//! extends that code rather than rotating it: the same string stays valid
//! until the pushed-out expiry.

use std::sync::Arc;

use chrono::Utc;
use ring::rand::{SecureRandom, SystemRandom};

use crate::db::SqliteDb;
use crate::error::AppError;
use crate::models::{VerificationAction, VerificationCode};
use crate::services::mailer::Mailer;

pub const CODE_LENGTH: usize = 6;
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Subject, link and HTML body for a code email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailContent {
    pub subject: &'static str,
    pub link: String,
    pub html: String,
}

impl EmailContent {
    pub fn new(action: VerificationAction, frontend_url: &str, code: &str) -> Self {
        let (subject, path) = match action {
            VerificationAction::ResetPassword => ("Reset password", "/user/new-password/"),
            VerificationAction::RegisterVerification => {
                ("Account verification", "/user/register-verification/")
            }
        };
        let link = format!("{frontend_url}{path}{code}");
        let html = format!("<h1>{subject}</h1>Please click this link: {link}");
        Self {
            subject,
            link,
            html,
        }
    }
}

#[derive(Clone)]
pub struct VerificationCodeStore {
    db: SqliteDb,
    mailer: Arc<dyn Mailer>,
    frontend_url: String,
}

impl VerificationCodeStore {
    pub fn new(db: SqliteDb, mailer: Arc<dyn Mailer>, frontend_url: impl Into<String>) -> Self {
        Self {
            db,
            mailer,
            frontend_url: frontend_url.into(),
        }
    }

    /// Extend the active code for `(action, email)` or create one, then mail
    /// it. Mail failures are logged only.
    ///
    /// Lookup and write are separate statements; two concurrent calls can
    /// both insert. The loser is never consumed and simply expires.
    pub async fn issue_or_extend(
        &self,
        action: VerificationAction,
        email: &str,
        user_id: i64,
    ) -> Result<VerificationCode, AppError> {
        let now = Utc::now();
        let expires_at = now + action.window();

        let code = match self.db.find_active_code_by_email(action, email, now).await? {
            Some(active) => self
                .db
                .extend_verification_code(active.id, expires_at, now)
                .await?
                .ok_or_else(|| anyhow::anyhow!("verification code {} vanished", active.id))?,
            None => {
                let secret = random_string(CODE_LENGTH, CODE_ALPHABET)?;
                self.db
                    .insert_verification_code(user_id, action, email, &secret, expires_at, now)
                    .await?
            }
        };

        tracing::info!(
            user_id,
            action = action.as_str(),
            code_id = code.id,
            resend_count = code.resend_count,
            "Verification code issued"
        );

        self.send_email(&code);
        Ok(code)
    }

    /// The active record carrying `code` for `action`, if any.
    pub async fn validate(
        &self,
        action: VerificationAction,
        code: &str,
    ) -> Result<Option<VerificationCode>, AppError> {
        self.db
            .find_active_code_by_code(action, code.trim(), Utc::now())
            .await
    }

    /// Mark a code used. False if it was already consumed.
    pub async fn consume(&self, id: i64) -> Result<bool, AppError> {
        self.db.mark_code_verified(id, Utc::now()).await
    }

    fn send_email(&self, code: &VerificationCode) {
        let content = EmailContent::new(code.action, &self.frontend_url, &code.verification_code);
        let mailer = Arc::clone(&self.mailer);
        let to = code.email.clone();

        tokio::spawn(async move {
            if let Err(e) = mailer.send(&to, content.subject, &content.html).await {
                tracing::warn!(to = %to, subject = content.subject, error = %e, "Failed to send email");
            }
        });
    }
}

/// Uniformly random string over `alphabet` from the system CSPRNG.
pub fn random_string(len: usize, alphabet: &[u8]) -> Result<String, AppError> {
    let rng = SystemRandom::new();
    // Largest multiple of the alphabet size that fits in a byte; bytes at or
    // above it are redrawn to avoid modulo bias.
    let limit = 256 - (256 % alphabet.len());

    let mut out = String::with_capacity(len);
    let mut buf = [0u8; 32];
    while out.len() < len {
        rng.fill(&mut buf)
            .map_err(|_| anyhow::anyhow!("system RNG failure"))?;
        for &byte in buf.iter() {
            if out.len() == len {
                break;
            }
            if (byte as usize) < limit {
                out.push(alphabet[byte as usize % alphabet.len()] as char);
            }
        }
    }
    Ok(out)
}
