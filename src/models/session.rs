// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Access token and per-day session records.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Server-side record of an issued signed token.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AccessToken {
    pub id: i64,
    pub user_id: i64,
    pub access_token: String,
    pub date_expired: DateTime<Utc>,
    /// Soft revoke marker; `None` means live.
    pub date_deleted: Option<DateTime<Utc>>,
    pub date_created: DateTime<Utc>,
}

/// One row per (user, device session, calendar day).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserSession {
    pub id: i64,
    pub user_id: i64,
    pub user_access_token_id: Option<i64>,
    pub session_id: String,
    pub date: NaiveDate,
    pub date_updated: Option<DateTime<Utc>>,
    pub date_created: DateTime<Utc>,
}
