// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-day device session bookkeeping.
//!
//! One row per (user, session id, UTC day). Repeat activity on the same day
//! only moves `date_updated`.

use chrono::Utc;

use crate::db::SqliteDb;
use crate::error::AppError;
use crate::models::UserSession;

#[derive(Clone)]
pub struct SessionLedger {
    db: SqliteDb,
}

impl SessionLedger {
    pub fn new(db: SqliteDb) -> Self {
        Self { db }
    }

    /// Record activity for `session_id` today.
    pub async fn touch(
        &self,
        user_id: i64,
        access_token_id: Option<i64>,
        session_id: &str,
    ) -> Result<UserSession, AppError> {
        let session = self
            .db
            .upsert_session(user_id, access_token_id, session_id, Utc::now())
            .await?;
        tracing::debug!(user_id, session_row = session.id, "Session touched");
        Ok(session)
    }

    /// The session touched before the most recent one, today only.
    pub async fn previous(&self, user_id: i64) -> Result<Option<UserSession>, AppError> {
        self.db
            .previous_session(user_id, Utc::now().date_naive())
            .await
    }
}
