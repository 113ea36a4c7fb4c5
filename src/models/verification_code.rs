// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Single-use verification codes (password reset, registration).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::UnknownVariant;

/// What a verification code authorizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VerificationAction {
    ResetPassword,
    RegisterVerification,
}

impl VerificationAction {
    pub fn as_str(self) -> &'static str {
        match self {
            VerificationAction::ResetPassword => "reset-password",
            VerificationAction::RegisterVerification => "register-verification",
        }
    }

    /// How long a freshly issued (or resent) code stays valid.
    pub fn window(self) -> Duration {
        match self {
            VerificationAction::ResetPassword => Duration::minutes(5),
            VerificationAction::RegisterVerification => Duration::minutes(60 * 24 * 365),
        }
    }
}

impl TryFrom<String> for VerificationAction {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "reset-password" => Ok(VerificationAction::ResetPassword),
            "register-verification" => Ok(VerificationAction::RegisterVerification),
            _ => Err(UnknownVariant(value)),
        }
    }
}

impl std::str::FromStr for VerificationAction {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s.to_string())
    }
}

/// Row of `user_verification_code`.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct VerificationCode {
    pub id: i64,
    pub user_id: i64,
    #[sqlx(try_from = "String")]
    pub action: VerificationAction,
    pub email: String,
    pub verification_code: String,
    pub resend_count: i64,
    pub date_expired: DateTime<Utc>,
    /// Set once the code is consumed.
    pub date_verified: Option<DateTime<Utc>>,
    pub date_updated: Option<DateTime<Utc>>,
    pub date_created: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_round_trips_through_wire_names() {
        for action in [
            VerificationAction::ResetPassword,
            VerificationAction::RegisterVerification,
        ] {
            let parsed: VerificationAction = action.as_str().parse().unwrap();
            assert_eq!(parsed, action);
            let json = serde_json::to_string(&action).unwrap();
            assert_eq!(json, format!("\"{}\"", action.as_str()));
        }
        assert!("delete-account".parse::<VerificationAction>().is_err());
    }

    #[test]
    fn reset_window_is_short_and_registration_window_is_a_year() {
        assert_eq!(VerificationAction::ResetPassword.window(), Duration::minutes(5));
        assert_eq!(
            VerificationAction::RegisterVerification.window(),
            Duration::days(365)
        );
    }
}
