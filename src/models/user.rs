// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User account model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::UnknownVariant;

/// How an account was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Email,
    Google,
    Facebook,
}

impl Provider {
    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Email => "email",
            Provider::Google => "google",
            Provider::Facebook => "facebook",
        }
    }
}

impl TryFrom<String> for Provider {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "email" => Ok(Provider::Email),
            "google" => Ok(Provider::Google),
            "facebook" => Ok(Provider::Facebook),
            _ => Err(UnknownVariant(value)),
        }
    }
}

/// User row as stored in the `user` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    #[sqlx(try_from = "String")]
    pub provider: Provider,
    pub full_name: String,
    pub display_name: String,
    /// Facebook sign-ups may not share an address.
    pub email: Option<String>,
    /// bcrypt hash
    pub password: String,
    pub google_id: Option<String>,
    pub facebook_id: Option<String>,
    pub is_disabled: bool,
    pub date_verified: Option<DateTime<Utc>>,
    pub date_created: DateTime<Utc>,
}

impl User {
    pub fn is_verified(&self) -> bool {
        self.date_verified.is_some()
    }
}

/// Fields needed to insert a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub provider: Provider,
    pub full_name: String,
    pub email: Option<String>,
    pub password_hash: String,
    pub google_id: Option<String>,
    pub facebook_id: Option<String>,
    /// OAuth providers vouch for the address, so they start verified.
    pub date_verified: Option<DateTime<Utc>>,
}

/// Dashboard listing row: an active user plus login/session aggregates.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UserListing {
    pub id: i64,
    pub full_name: String,
    pub display_name: String,
    pub email: Option<String>,
    pub is_disabled: bool,
    pub login_count: i64,
    pub last_session: Option<DateTime<Utc>>,
    pub date_verified: Option<DateTime<Utc>>,
    pub date_created: DateTime<Utc>,
}

/// Dashboard totals.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DashboardStats {
    pub total_user: i64,
    pub total_user_active_today: i64,
    pub avg_user_active_7_days: f64,
}
