// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! SQLite client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (accounts and provider ids)
//! - Verification codes (reset / registration)
//! - Access tokens (one live token per user)
//! - Sessions (one row per user, device session and day)
//!
//! Timestamps are always passed in by the caller so the service layer owns
//! the clock.

use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Executor, Sqlite};

use crate::db::tables;
use crate::error::AppError;
use crate::models::{
    AccessToken, DashboardStats, NewUser, User, UserListing, UserSession, VerificationAction,
    VerificationCode,
};

const MAX_CONNECTIONS: u32 = 8;

const USER_COLUMNS: &str = "id, provider, full_name, display_name, email, password, \
     google_id, facebook_id, is_disabled, date_verified, date_created";

const CODE_COLUMNS: &str = "id, user_id, action, email, verification_code, resend_count, \
     date_expired, date_verified, date_updated, date_created";

const TOKEN_COLUMNS: &str = "id, user_id, access_token, date_expired, date_deleted, date_created";

const SESSION_COLUMNS: &str =
    "id, user_id, user_access_token_id, session_id, date, date_updated, date_created";

/// SQLite database client.
#[derive(Clone)]
pub struct SqliteDb {
    pool: SqlitePool,
}

impl SqliteDb {
    /// Connect to the database and apply pending migrations.
    pub async fn connect(database_url: &str) -> Result<Self, AppError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.migrate().await?;

        tracing::info!(url = database_url, "Connected to SQLite");
        Ok(db)
    }

    /// Private in-memory database for tests and local experiments.
    ///
    /// Pinned to a single connection that never idles out, since every
    /// SQLite connection to `:memory:` is its own database.
    pub async fn new_in_memory() -> Result<Self, AppError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> Result<(), AppError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(sqlx::Error::from)?;
        Ok(())
    }

    /// Underlying pool, for ad-hoc queries.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ─── User Operations ─────────────────────────────────────────

    /// Get a user by id.
    pub async fn get_user(&self, id: i64) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM {} WHERE id = ?", tables::USERS);
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Get a user by email address.
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM {} WHERE email = ?", tables::USERS);
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Get a user whose email, Google id or Facebook id equals `identity`.
    pub async fn get_user_by_identity(&self, identity: &str) -> Result<Option<User>, AppError> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM {} \
             WHERE email = ?1 OR google_id = ?1 OR facebook_id = ?1 \
             ORDER BY id LIMIT 1",
            tables::USERS
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(identity)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Insert a user; the display name starts out as the full name.
    pub async fn insert_user(&self, user: &NewUser, now: DateTime<Utc>) -> Result<User, AppError> {
        let sql = format!(
            "INSERT INTO {} \
             (provider, full_name, display_name, email, password, google_id, facebook_id, \
              is_disabled, date_verified, date_created) \
             VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?, ?) \
             RETURNING {USER_COLUMNS}",
            tables::USERS
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(user.provider.as_str())
            .bind(&user.full_name)
            .bind(&user.full_name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.google_id)
            .bind(&user.facebook_id)
            .bind(user.date_verified)
            .bind(now)
            .fetch_one(&self.pool)
            .await?)
    }

    pub async fn set_google_id(&self, id: i64, google_id: &str) -> Result<bool, AppError> {
        self.update_user_column(id, "google_id", google_id).await
    }

    pub async fn set_facebook_id(&self, id: i64, facebook_id: &str) -> Result<bool, AppError> {
        self.update_user_column(id, "facebook_id", facebook_id).await
    }

    pub async fn set_display_name(&self, id: i64, display_name: &str) -> Result<bool, AppError> {
        self.update_user_column(id, "display_name", display_name)
            .await
    }

    pub async fn set_password(&self, id: i64, password_hash: &str) -> Result<bool, AppError> {
        self.update_user_column(id, "password", password_hash).await
    }

    /// `column` is always one of the literals above, never caller input.
    async fn update_user_column(
        &self,
        id: i64,
        column: &'static str,
        value: &str,
    ) -> Result<bool, AppError> {
        let sql = format!("UPDATE {} SET {column} = ? WHERE id = ?", tables::USERS);
        let result = sqlx::query(&sql)
            .bind(value)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark a user's email as verified.
    pub async fn mark_user_verified(&self, id: i64, now: DateTime<Utc>) -> Result<bool, AppError> {
        let sql = format!("UPDATE {} SET date_verified = ? WHERE id = ?", tables::USERS);
        let result = sqlx::query(&sql)
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ─── Verification Code Operations ────────────────────────────

    /// Most recent unconsumed, unexpired code for `(action, email)`.
    pub async fn find_active_code_by_email(
        &self,
        action: VerificationAction,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<VerificationCode>, AppError> {
        let sql = format!(
            "SELECT {CODE_COLUMNS} FROM {} \
             WHERE action = ? AND email = ? AND date_verified IS NULL AND date_expired > ? \
             ORDER BY id DESC LIMIT 1",
            tables::VERIFICATION_CODES
        );
        Ok(sqlx::query_as::<_, VerificationCode>(&sql)
            .bind(action.as_str())
            .bind(email)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Most recent unconsumed, unexpired row carrying `code` for `action`.
    pub async fn find_active_code_by_code(
        &self,
        action: VerificationAction,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<VerificationCode>, AppError> {
        let sql = format!(
            "SELECT {CODE_COLUMNS} FROM {} \
             WHERE action = ? AND verification_code = ? AND date_verified IS NULL \
               AND date_expired > ? \
             ORDER BY id DESC LIMIT 1",
            tables::VERIFICATION_CODES
        );
        Ok(sqlx::query_as::<_, VerificationCode>(&sql)
            .bind(action.as_str())
            .bind(code)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Insert a fresh code with a zero resend count.
    pub async fn insert_verification_code(
        &self,
        user_id: i64,
        action: VerificationAction,
        email: &str,
        code: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<VerificationCode, AppError> {
        let sql = format!(
            "INSERT INTO {} \
             (user_id, action, email, verification_code, resend_count, date_expired, date_created) \
             VALUES (?, ?, ?, ?, 0, ?, ?) \
             RETURNING {CODE_COLUMNS}",
            tables::VERIFICATION_CODES
        );
        Ok(sqlx::query_as::<_, VerificationCode>(&sql)
            .bind(user_id)
            .bind(action.as_str())
            .bind(email)
            .bind(code)
            .bind(expires_at)
            .bind(now)
            .fetch_one(&self.pool)
            .await?)
    }

    /// Bump the resend counter and push the expiry out. The code value stays.
    pub async fn extend_verification_code(
        &self,
        id: i64,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Option<VerificationCode>, AppError> {
        let sql = format!(
            "UPDATE {} \
             SET resend_count = resend_count + 1, date_expired = ?, date_updated = ? \
             WHERE id = ? \
             RETURNING {CODE_COLUMNS}",
            tables::VERIFICATION_CODES
        );
        Ok(sqlx::query_as::<_, VerificationCode>(&sql)
            .bind(expires_at)
            .bind(now)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Consume a code. Returns false if it was already consumed or missing.
    pub async fn mark_code_verified(&self, id: i64, now: DateTime<Utc>) -> Result<bool, AppError> {
        let sql = format!(
            "UPDATE {} SET date_verified = ?, date_updated = ? \
             WHERE id = ? AND date_verified IS NULL",
            tables::VERIFICATION_CODES
        );
        let result = sqlx::query(&sql)
            .bind(now)
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ─── Access Token Operations ─────────────────────────────────

    /// Tokens that have not been revoked.
    pub async fn live_access_tokens(&self, user_id: i64) -> Result<Vec<AccessToken>, AppError> {
        let sql = format!(
            "SELECT {TOKEN_COLUMNS} FROM {} WHERE user_id = ? AND date_deleted IS NULL \
             ORDER BY id",
            tables::ACCESS_TOKENS
        );
        Ok(sqlx::query_as::<_, AccessToken>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?)
    }

    /// Soft-revoke every live token for a user.
    pub async fn revoke_access_tokens(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        revoke_access_tokens(&self.pool, user_id, now).await
    }

    /// Revoke old tokens, store the new one and touch the session, in one
    /// transaction. Revocation happens first so the new token is never
    /// visible alongside an older live one.
    pub async fn record_login(
        &self,
        user_id: i64,
        token: &str,
        token_lifetime: Duration,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(AccessToken, UserSession), AppError> {
        let mut tx = self.pool.begin().await?;

        let revoked = revoke_access_tokens(&mut *tx, user_id, now).await?;
        let access_token =
            insert_access_token(&mut *tx, user_id, token, now + token_lifetime, now).await?;
        let session =
            upsert_session(&mut *tx, user_id, None, session_id, now.date_naive(), now).await?;

        tx.commit().await?;

        tracing::debug!(
            user_id,
            revoked,
            access_token_id = access_token.id,
            session_row = session.id,
            "Login recorded"
        );

        Ok((access_token, session))
    }

    // ─── Session Operations ──────────────────────────────────────

    /// Insert today's row for `(user_id, session_id)` or bump its
    /// `date_updated`.
    pub async fn upsert_session(
        &self,
        user_id: i64,
        access_token_id: Option<i64>,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<UserSession, AppError> {
        upsert_session(
            &self.pool,
            user_id,
            access_token_id,
            session_id,
            now.date_naive(),
            now,
        )
        .await
    }

    /// Second most recent session row for `date`.
    pub async fn previous_session(
        &self,
        user_id: i64,
        date: NaiveDate,
    ) -> Result<Option<UserSession>, AppError> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM {} WHERE user_id = ? AND date = ? \
             ORDER BY id DESC LIMIT 1 OFFSET 1",
            tables::SESSIONS
        );
        Ok(sqlx::query_as::<_, UserSession>(&sql)
            .bind(user_id)
            .bind(date)
            .fetch_optional(&self.pool)
            .await?)
    }

    // ─── Dashboard ───────────────────────────────────────────────

    /// Active (not disabled) users, newest first, with login and session
    /// aggregates.
    pub async fn list_active_users(&self) -> Result<Vec<UserListing>, AppError> {
        let sql = format!(
            "SELECT u.id, u.full_name, u.display_name, u.email, u.is_disabled, \
                    (SELECT COUNT(*) FROM {tokens} t WHERE t.user_id = u.id) AS login_count, \
                    (SELECT MAX(COALESCE(s.date_updated, s.date_created)) \
                       FROM {sessions} s WHERE s.user_id = u.id) AS last_session, \
                    u.date_verified, u.date_created \
             FROM {users} u \
             WHERE u.is_disabled = 0 \
             ORDER BY u.id DESC",
            users = tables::USERS,
            tokens = tables::ACCESS_TOKENS,
            sessions = tables::SESSIONS,
        );
        Ok(sqlx::query_as::<_, UserListing>(&sql)
            .fetch_all(&self.pool)
            .await?)
    }

    /// Totals for the dashboard header. A user counts as active on a day if
    /// a session row was created for them that day.
    pub async fn dashboard_stats(&self, today: NaiveDate) -> Result<DashboardStats, AppError> {
        let week_start = today - Duration::days(7);

        let total_sql = format!(
            "SELECT COUNT(*) FROM {} WHERE is_disabled = 0",
            tables::USERS
        );
        let total_user: i64 = sqlx::query_scalar(&total_sql)
            .fetch_one(&self.pool)
            .await?;

        let today_sql = format!(
            "SELECT COUNT(DISTINCT user_id) FROM {} WHERE date = ?",
            tables::SESSIONS
        );
        let total_user_active_today: i64 = sqlx::query_scalar(&today_sql)
            .bind(today)
            .fetch_one(&self.pool)
            .await?;

        let avg_sql = format!(
            "SELECT AVG(active) FROM ( \
                 SELECT COUNT(DISTINCT user_id) AS active FROM {} \
                 WHERE date BETWEEN ? AND ? GROUP BY date \
             )",
            tables::SESSIONS
        );
        let avg_user_active_7_days: Option<f64> = sqlx::query_scalar(&avg_sql)
            .bind(week_start)
            .bind(today)
            .fetch_one(&self.pool)
            .await?;

        Ok(DashboardStats {
            total_user,
            total_user_active_today,
            avg_user_active_7_days: avg_user_active_7_days.unwrap_or(0.0),
        })
    }
}

// ─── Executor-generic helpers (shared by pool and transaction paths) ───

async fn revoke_access_tokens<'e, E>(
    executor: E,
    user_id: i64,
    now: DateTime<Utc>,
) -> Result<u64, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "UPDATE {} SET date_deleted = ? WHERE user_id = ? AND date_deleted IS NULL",
        tables::ACCESS_TOKENS
    );
    let result = sqlx::query(&sql)
        .bind(now)
        .bind(user_id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}

async fn insert_access_token<'e, E>(
    executor: E,
    user_id: i64,
    token: &str,
    expires_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<AccessToken, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "INSERT INTO {} (user_id, access_token, date_expired, date_created) \
         VALUES (?, ?, ?, ?) \
         RETURNING {TOKEN_COLUMNS}",
        tables::ACCESS_TOKENS
    );
    Ok(sqlx::query_as::<_, AccessToken>(&sql)
        .bind(user_id)
        .bind(token)
        .bind(expires_at)
        .bind(now)
        .fetch_one(executor)
        .await?)
}

async fn upsert_session<'e, E>(
    executor: E,
    user_id: i64,
    access_token_id: Option<i64>,
    session_id: &str,
    date: NaiveDate,
    now: DateTime<Utc>,
) -> Result<UserSession, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "INSERT INTO {} \
         (user_id, user_access_token_id, session_id, date, date_updated, date_created) \
         VALUES (?, ?, ?, ?, ?, ?) \
         ON CONFLICT (user_id, session_id, date) DO UPDATE SET date_updated = excluded.date_updated \
         RETURNING {SESSION_COLUMNS}",
        tables::SESSIONS
    );
    Ok(sqlx::query_as::<_, UserSession>(&sql)
        .bind(user_id)
        .bind(access_token_id)
        .bind(session_id)
        .bind(date)
        .bind(now)
        .bind(now)
        .fetch_one(executor)
        .await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Provider;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            provider: Provider::Email,
            full_name: "Ada Lovelace".to_string(),
            email: Some(email.to_string()),
            password_hash: "hash".to_string(),
            google_id: None,
            facebook_id: None,
            date_verified: None,
        }
    }

    #[tokio::test]
    async fn insert_user_defaults_display_name_to_full_name() {
        let db = SqliteDb::new_in_memory().await.unwrap();
        let user = db.insert_user(&new_user("ada@x.io"), Utc::now()).await.unwrap();

        assert_eq!(user.display_name, "Ada Lovelace");
        assert!(!user.is_disabled);
        assert!(!user.is_verified());

        let by_email = db.get_user_by_email("ada@x.io").await.unwrap().unwrap();
        assert_eq!(by_email.id, user.id);
    }

    #[tokio::test]
    async fn email_matching_ignores_case() {
        let db = SqliteDb::new_in_memory().await.unwrap();
        let user = db
            .insert_user(&new_user("Ada@Example.com"), Utc::now())
            .await
            .unwrap();

        let found = db.get_user_by_email("ada@example.com").await.unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert_eq!(found.email.as_deref(), Some("Ada@Example.com"));

        // The unique index folds case too.
        assert!(db
            .insert_user(&new_user("ADA@EXAMPLE.COM"), Utc::now())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn identity_lookup_matches_any_provider_id() {
        let db = SqliteDb::new_in_memory().await.unwrap();
        let user = db.insert_user(&new_user("ada@x.io"), Utc::now()).await.unwrap();
        db.set_facebook_id(user.id, "fb-42").await.unwrap();

        let found = db.get_user_by_identity("fb-42").await.unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert!(db.get_user_by_identity("gg-42").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_codes_are_not_active() {
        let db = SqliteDb::new_in_memory().await.unwrap();
        let user = db.insert_user(&new_user("ada@x.io"), Utc::now()).await.unwrap();
        let issued = Utc::now() - Duration::minutes(10);
        db.insert_verification_code(
            user.id,
            VerificationAction::ResetPassword,
            "ada@x.io",
            "ABC123",
            issued + Duration::minutes(5),
            issued,
        )
        .await
        .unwrap();

        let now = Utc::now();
        assert!(db
            .find_active_code_by_code(VerificationAction::ResetPassword, "ABC123", now)
            .await
            .unwrap()
            .is_none());
        assert!(db
            .find_active_code_by_email(VerificationAction::ResetPassword, "ada@x.io", now)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn codes_are_scoped_to_their_action() {
        let db = SqliteDb::new_in_memory().await.unwrap();
        let user = db.insert_user(&new_user("ada@x.io"), Utc::now()).await.unwrap();
        let now = Utc::now();
        db.insert_verification_code(
            user.id,
            VerificationAction::RegisterVerification,
            "ada@x.io",
            "ZZZ999",
            now + Duration::days(1),
            now,
        )
        .await
        .unwrap();

        assert!(db
            .find_active_code_by_code(VerificationAction::ResetPassword, "ZZZ999", now)
            .await
            .unwrap()
            .is_none());
        assert!(db
            .find_active_code_by_code(VerificationAction::RegisterVerification, "ZZZ999", now)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn dashboard_counts_only_enabled_users() {
        let db = SqliteDb::new_in_memory().await.unwrap();
        let now = Utc::now();
        let ada = db.insert_user(&new_user("ada@x.io"), now).await.unwrap();
        let bob = db.insert_user(&new_user("bob@x.io"), now).await.unwrap();
        sqlx::query("UPDATE user SET is_disabled = 1 WHERE id = ?")
            .bind(bob.id)
            .execute(db.pool())
            .await
            .unwrap();
        db.record_login(ada.id, "tok", Duration::days(30), "sid-1", now)
            .await
            .unwrap();

        let users = db.list_active_users().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].id, ada.id);
        assert_eq!(users[0].login_count, 1);
        assert!(users[0].last_session.is_some());

        let stats = db.dashboard_stats(now.date_naive()).await.unwrap();
        assert_eq!(stats.total_user, 1);
        assert_eq!(stats.total_user_active_today, 1);
        assert!((stats.avg_user_active_7_days - 1.0).abs() < f64::EPSILON);
    }
}
