// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer (SQLite).

pub mod sqlite;

pub use sqlite::SqliteDb;

/// Table names as constants.
pub mod tables {
    pub const USERS: &str = "user";
    pub const VERIFICATION_CODES: &str = "user_verification_code";
    pub const ACCESS_TOKENS: &str = "user_access_token";
    pub const SESSIONS: &str = "user_session";
}
