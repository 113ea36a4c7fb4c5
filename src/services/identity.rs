// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Account flows: sign-up, login, password reset, verification and
//! display-name changes.
//!
//! Every successful authentication signs a fresh token and records it with
//! [`AccessTokenLedger::record_login`].

use chrono::Utc;
use serde::Serialize;

use crate::db::SqliteDb;
use crate::error::{AppError, AUTH_FAILED, GENERIC_ERROR};
use crate::models::{
    DashboardStats, NewUser, Provider, User, UserListing, UserSession, VerificationAction,
};
use crate::services::access_token::AccessTokenLedger;
use crate::services::session::SessionLedger;
use crate::services::token::{TokenCodec, TokenPayload};
use crate::services::verification::{random_string, VerificationCodeStore};
use crate::validation::{
    check, DisplayNameRequest, EmailRequest, LoginRequest, NewPasswordRequest,
    RegisterVerificationRequest, SignUpEmailRequest, SignUpFacebookRequest, SignUpGoogleRequest,
    VerificationCodeCheckRequest,
};

pub const BCRYPT_COST: u32 = 8;
const OAUTH_PASSWORD_LENGTH: usize = 16;
const OAUTH_PASSWORD_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

pub const MSG_BAD_CREDENTIALS: &str = "Email or Password is incorrect";
pub const MSG_EMAIL_TAKEN: &str = "Your email address has already been registered.";
pub const MSG_EMAIL_UNKNOWN: &str = "This email address is not registered with us.";
pub const MSG_CODE_INVALID: &str = "Verification code is not valid";
pub const MSG_OLD_PASSWORD_INVALID: &str = "Old password is not valid";
pub const MSG_NOTHING_CHANGED: &str = "Nothing change";

/// Result of any flow that authenticates the caller.
#[derive(Debug, Clone, Serialize)]
pub struct AuthSuccess {
    pub payload: TokenPayload,
    pub token: String,
    pub session_id: String,
}

/// Result of a session refresh.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub refresh_token: String,
    pub current: UserSession,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous: Option<UserSession>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub users: Vec<UserListing>,
    pub dashboard: DashboardStats,
}

#[derive(Clone)]
pub struct IdentityService {
    db: SqliteDb,
    tokens: TokenCodec,
    codes: VerificationCodeStore,
    sessions: SessionLedger,
    access_tokens: AccessTokenLedger,
}

impl IdentityService {
    pub fn new(db: SqliteDb, tokens: TokenCodec, codes: VerificationCodeStore) -> Self {
        Self {
            sessions: SessionLedger::new(db.clone()),
            access_tokens: AccessTokenLedger::new(db.clone()),
            db,
            tokens,
            codes,
        }
    }

    pub fn tokens(&self) -> &TokenCodec {
        &self.tokens
    }

    pub fn access_tokens(&self) -> &AccessTokenLedger {
        &self.access_tokens
    }

    // ─── Login & Sign-up ─────────────────────────────────────────

    pub async fn login(&self, req: LoginRequest) -> Result<AuthSuccess, AppError> {
        check(&req)?;

        let user = match self.db.get_user_by_email(req.email.trim()).await? {
            Some(user) if !user.is_disabled => user,
            _ => return Err(AppError::Authentication(MSG_BAD_CREDENTIALS.to_string())),
        };

        if !verify_password(&req.password, &user.password) {
            tracing::info!(user_id = user.id, "Login rejected: wrong password");
            return Err(AppError::Authentication(MSG_BAD_CREDENTIALS.to_string()));
        }

        self.establish(&user, req.session_id).await
    }

    /// Create an email account, mail a registration code and log in.
    pub async fn sign_up_email(&self, req: SignUpEmailRequest) -> Result<AuthSuccess, AppError> {
        check(&req)?;
        let email = req.email.trim();

        if self.db.get_user_by_email(email).await?.is_some() {
            return Err(AppError::Validation(MSG_EMAIL_TAKEN.to_string()));
        }

        let user = self
            .db
            .insert_user(
                &NewUser {
                    provider: Provider::Email,
                    full_name: req.full_name.trim().to_string(),
                    email: Some(email.to_string()),
                    password_hash: hash_password(&req.password)?,
                    google_id: None,
                    facebook_id: None,
                    date_verified: None,
                },
                Utc::now(),
            )
            .await?;
        tracing::info!(user_id = user.id, provider = "email", "User signed up");

        // The account exists now; a missing code can be re-requested.
        if let Err(e) = self
            .codes
            .issue_or_extend(VerificationAction::RegisterVerification, email, user.id)
            .await
        {
            tracing::error!(user_id = user.id, error = %e, "Registration code not issued");
        }

        self.establish(&user, req.session_id).await
    }

    /// Log in with Google, creating the account on first use. An existing
    /// email account gets the Google id attached.
    pub async fn sign_up_google(&self, req: SignUpGoogleRequest) -> Result<AuthSuccess, AppError> {
        check(&req)?;
        let email = req.email.trim();

        let user = match self.db.get_user_by_email(email).await? {
            Some(user) => {
                if user.google_id.is_none() {
                    self.db.set_google_id(user.id, &req.google_id).await?;
                    tracing::info!(user_id = user.id, "Google id linked");
                }
                user
            }
            None => {
                let now = Utc::now();
                let user = self
                    .db
                    .insert_user(
                        &NewUser {
                            provider: Provider::Google,
                            full_name: req.full_name.trim().to_string(),
                            email: Some(email.to_string()),
                            password_hash: random_password_hash()?,
                            google_id: Some(req.google_id.clone()),
                            facebook_id: None,
                            date_verified: Some(now),
                        },
                        now,
                    )
                    .await?;
                tracing::info!(user_id = user.id, provider = "google", "User signed up");
                user
            }
        };

        self.establish(&user, req.session_id).await
    }

    /// Log in with Facebook, creating the account on first use.
    pub async fn sign_up_facebook(
        &self,
        req: SignUpFacebookRequest,
    ) -> Result<AuthSuccess, AppError> {
        check(&req)?;

        let user = match self.db.get_user_by_identity(&req.facebook_id).await? {
            Some(user) => {
                if user.facebook_id.is_none() {
                    self.db.set_facebook_id(user.id, &req.facebook_id).await?;
                    tracing::info!(user_id = user.id, "Facebook id linked");
                }
                user
            }
            None => {
                let now = Utc::now();
                let user = self
                    .db
                    .insert_user(
                        &NewUser {
                            provider: Provider::Facebook,
                            full_name: req.full_name.trim().to_string(),
                            email: None,
                            password_hash: random_password_hash()?,
                            google_id: None,
                            facebook_id: Some(req.facebook_id.clone()),
                            date_verified: Some(now),
                        },
                        now,
                    )
                    .await?;
                tracing::info!(user_id = user.id, provider = "facebook", "User signed up");
                user
            }
        };

        self.establish(&user, req.session_id).await
    }

    // ─── Password reset ──────────────────────────────────────────

    pub async fn request_password_reset(&self, req: EmailRequest) -> Result<(), AppError> {
        self.send_code(req, VerificationAction::ResetPassword).await
    }

    pub async fn complete_password_reset(
        &self,
        req: NewPasswordRequest,
    ) -> Result<AuthSuccess, AppError> {
        check(&req)?;

        let code = self
            .codes
            .validate(VerificationAction::ResetPassword, &req.verification_code)
            .await?
            .ok_or_else(|| AppError::Authentication(MSG_CODE_INVALID.to_string()))?;

        let user = self.require_user(code.user_id).await?;
        if !verify_password(&req.old_password, &user.password) {
            return Err(AppError::Authentication(
                MSG_OLD_PASSWORD_INVALID.to_string(),
            ));
        }

        if !self.codes.consume(code.id).await? {
            return Err(AppError::Authentication(MSG_CODE_INVALID.to_string()));
        }
        self.db
            .set_password(user.id, &hash_password(&req.password)?)
            .await?;
        tracing::info!(user_id = user.id, "Password reset");

        let user = self.require_user(user.id).await?;
        self.establish(&user, req.session_id).await
    }

    // ─── Registration verification ───────────────────────────────

    pub async fn resend_registration_verification(
        &self,
        req: EmailRequest,
    ) -> Result<(), AppError> {
        self.send_code(req, VerificationAction::RegisterVerification)
            .await
    }

    pub async fn complete_registration_verification(
        &self,
        req: RegisterVerificationRequest,
    ) -> Result<AuthSuccess, AppError> {
        check(&req)?;

        let code = self
            .codes
            .validate(
                VerificationAction::RegisterVerification,
                &req.verification_code,
            )
            .await?
            .ok_or_else(|| AppError::Authentication(MSG_CODE_INVALID.to_string()))?;

        if !self.codes.consume(code.id).await? {
            return Err(AppError::Authentication(MSG_CODE_INVALID.to_string()));
        }
        self.db.mark_user_verified(code.user_id, Utc::now()).await?;
        tracing::info!(user_id = code.user_id, "Email verified");

        let user = self.require_user(code.user_id).await?;
        self.establish(&user, req.session_id).await
    }

    /// Whether `code` is currently usable for `action`. Unknown actions
    /// never match.
    pub async fn check_verification_code(
        &self,
        req: VerificationCodeCheckRequest,
    ) -> Result<(), AppError> {
        check(&req)?;

        let invalid = || AppError::Authentication(MSG_CODE_INVALID.to_string());
        let action: VerificationAction = req.action.parse().map_err(|_| invalid())?;

        match self.codes.validate(action, &req.verification_code).await? {
            Some(_) => Ok(()),
            None => Err(invalid()),
        }
    }

    // ─── Authenticated operations ────────────────────────────────

    /// Touch the caller's device session and re-sign their token from the
    /// stored account.
    pub async fn refresh_session(
        &self,
        identity: &TokenPayload,
        session_id: Option<String>,
    ) -> Result<SessionSnapshot, AppError> {
        let session_id = session_id
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::Validation(GENERIC_ERROR.to_string()))?;

        let user = self.require_active_user(identity.user_id).await?;

        let current = self.sessions.touch(user.id, None, &session_id).await?;
        let previous = self.sessions.previous(user.id).await?;
        let refresh_token = self.tokens.issue(&TokenPayload::from_user(&user))?;

        Ok(SessionSnapshot {
            refresh_token,
            current,
            previous,
        })
    }

    pub async fn update_display_name(
        &self,
        identity: &TokenPayload,
        req: DisplayNameRequest,
    ) -> Result<AuthSuccess, AppError> {
        check(&req)?;

        let user = self.require_active_user(identity.user_id).await?;
        self.db
            .set_display_name(user.id, req.display_name.trim())
            .await?;

        let user = self.require_user(user.id).await?;
        self.reissue(&user, req.session_id)
    }

    /// Set the display name back to the full name.
    pub async fn reset_display_name(
        &self,
        identity: &TokenPayload,
        session_id: Option<String>,
    ) -> Result<AuthSuccess, AppError> {
        let user = self.require_active_user(identity.user_id).await?;
        if user.display_name == user.full_name {
            return Err(AppError::Validation(MSG_NOTHING_CHANGED.to_string()));
        }

        self.db.set_display_name(user.id, &user.full_name).await?;

        let user = self.require_user(user.id).await?;
        self.reissue(&user, session_id)
    }

    pub async fn logout(&self, identity: &TokenPayload) -> Result<(), AppError> {
        self.access_tokens.revoke_all(identity.user_id).await?;
        Ok(())
    }

    pub async fn dashboard(&self) -> Result<Dashboard, AppError> {
        Ok(Dashboard {
            users: self.db.list_active_users().await?,
            dashboard: self.db.dashboard_stats(Utc::now().date_naive()).await?,
        })
    }

    // ─── Helpers ─────────────────────────────────────────────────

    async fn send_code(
        &self,
        req: EmailRequest,
        action: VerificationAction,
    ) -> Result<(), AppError> {
        check(&req)?;

        let user = self
            .db
            .get_user_by_email(req.email.trim())
            .await?
            .ok_or_else(|| AppError::NotFound(MSG_EMAIL_UNKNOWN.to_string()))?;
        let email = user
            .email
            .as_deref()
            .ok_or_else(|| AppError::NotFound(MSG_EMAIL_UNKNOWN.to_string()))?;

        self.codes.issue_or_extend(action, email, user.id).await?;
        Ok(())
    }

    /// Sign a token for `user` and record the login.
    async fn establish(
        &self,
        user: &User,
        session_id: Option<String>,
    ) -> Result<AuthSuccess, AppError> {
        if user.is_disabled {
            return Err(AppError::Authentication(AUTH_FAILED.to_string()));
        }
        let success = self.reissue(user, session_id)?;
        self.access_tokens
            .record_login(user.id, &success.token, &success.session_id)
            .await?;
        tracing::info!(user_id = user.id, "User authenticated");
        Ok(success)
    }

    /// Sign a token for `user` without touching the ledgers.
    fn reissue(&self, user: &User, session_id: Option<String>) -> Result<AuthSuccess, AppError> {
        let payload = TokenPayload::from_user(user);
        let token = self.tokens.issue(&payload)?;
        Ok(AuthSuccess {
            payload,
            token,
            session_id: session_id_or_new(session_id),
        })
    }

    async fn require_user(&self, id: i64) -> Result<User, AppError> {
        self.db
            .get_user(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("user {id} not found").into())
    }

    async fn require_active_user(&self, id: i64) -> Result<User, AppError> {
        match self.db.get_user(id).await? {
            Some(user) if !user.is_disabled => Ok(user),
            _ => Err(AppError::Authentication(AUTH_FAILED.to_string())),
        }
    }
}

/// Use the caller's device session id, or mint one.
pub fn session_id_or_new(session_id: Option<String>) -> String {
    session_id
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

fn hash_password(password: &str) -> Result<String, AppError> {
    Ok(bcrypt::hash(password, BCRYPT_COST).map_err(anyhow::Error::from)?)
}

/// A malformed stored hash counts as a mismatch.
fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Stored password hash could not be checked");
        false
    })
}

/// OAuth accounts get a random password nobody knows.
fn random_password_hash() -> Result<String, AppError> {
    hash_password(&random_string(
        OAUTH_PASSWORD_LENGTH,
        OAUTH_PASSWORD_ALPHABET,
    )?)
}
