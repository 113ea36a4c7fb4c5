// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Server-side record of issued tokens. Each login revokes the previous
//! token so at most one stays live per user.

use chrono::Utc;

use crate::db::SqliteDb;
use crate::error::AppError;
use crate::models::{AccessToken, UserSession};
use crate::services::token::token_lifetime;

#[derive(Clone)]
pub struct AccessTokenLedger {
    db: SqliteDb,
}

impl AccessTokenLedger {
    pub fn new(db: SqliteDb) -> Self {
        Self { db }
    }

    /// Establish a new authenticated identity: revoke live tokens, store
    /// `token` and touch today's session for `session_id`, atomically.
    pub async fn record_login(
        &self,
        user_id: i64,
        token: &str,
        session_id: &str,
    ) -> Result<(AccessToken, UserSession), AppError> {
        self.db
            .record_login(user_id, token, token_lifetime(), session_id, Utc::now())
            .await
    }

    /// Revoke every live token (logout).
    pub async fn revoke_all(&self, user_id: i64) -> Result<u64, AppError> {
        let revoked = self.db.revoke_access_tokens(user_id, Utc::now()).await?;
        tracing::info!(user_id, revoked, "Access tokens revoked");
        Ok(revoked)
    }

    pub async fn live_tokens(&self, user_id: i64) -> Result<Vec<AccessToken>, AppError> {
        self.db.live_access_tokens(user_id).await
    }
}
