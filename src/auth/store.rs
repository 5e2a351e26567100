//! Token store
//!
//! Persistence for refresh tokens and purpose-scoped one-time codes. Code
//! rows only ever hold a hash of the secret. Replacing a code is
//! delete-then-insert on a single connection so the at-most-one-live-code
//! invariant holds even under concurrent resends.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};

use super::models::OtpPurpose;

#[derive(FromRow, Debug, Clone)]
pub struct StoredRefreshToken {
    pub id: i64,
    pub user_id: i64,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(FromRow, Debug, Clone)]
pub struct StoredOtpCode {
    pub id: i64,
    pub user_id: i64,
    pub purpose: String,
    pub code_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl StoredOtpCode {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

impl StoredRefreshToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

pub struct RefreshTokenRepository {
    pool: SqlitePool,
}

impl RefreshTokenRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        user_id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO refresh_tokens (user_id, token, expires_at, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(token)
        .bind(expires_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn find_by_token(
        &self,
        token: &str,
    ) -> Result<Option<StoredRefreshToken>, sqlx::Error> {
        sqlx::query_as::<_, StoredRefreshToken>("SELECT * FROM refresh_tokens WHERE token = ?")
            .bind(token)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn delete_by_token(&self, token: &str) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM refresh_tokens WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Bulk revocation: sign-out-everywhere and password reset.
    pub async fn delete_by_user(&self, user_id: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Opportunistic sweep of stale rows.
    pub async fn delete_expired(&self) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at < ?")
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

pub struct OtpCodeRepository {
    pool: SqlitePool,
}

impl OtpCodeRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Replace the live code for (user, purpose): the prior code, if any, is
    /// deleted in the same transaction as the insert.
    pub async fn replace(
        &self,
        user_id: i64,
        purpose: OtpPurpose,
        code_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        Self::replace_on(&mut *tx, user_id, purpose, code_hash, expires_at).await?;
        tx.commit().await
    }

    /// Same as [`replace`](Self::replace) but on a caller-owned connection,
    /// for callers that scope it inside a larger transaction.
    pub async fn replace_on(
        conn: &mut SqliteConnection,
        user_id: i64,
        purpose: OtpPurpose,
        code_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM otp_codes WHERE user_id = ? AND purpose = ?")
            .bind(user_id)
            .bind(purpose.as_str())
            .execute(&mut *conn)
            .await?;

        sqlx::query(
            "INSERT INTO otp_codes (user_id, purpose, code_hash, expires_at, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(purpose.as_str())
        .bind(code_hash)
        .bind(expires_at)
        .bind(Utc::now())
        .execute(conn)
        .await?;

        Ok(())
    }

    pub async fn find_by_user_and_purpose(
        &self,
        user_id: i64,
        purpose: OtpPurpose,
    ) -> Result<Option<StoredOtpCode>, sqlx::Error> {
        sqlx::query_as::<_, StoredOtpCode>(
            "SELECT * FROM otp_codes WHERE user_id = ? AND purpose = ?",
        )
        .bind(user_id)
        .bind(purpose.as_str())
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn delete_by_user_and_purpose(
        &self,
        user_id: i64,
        purpose: OtpPurpose,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM otp_codes WHERE user_id = ? AND purpose = ?")
            .bind(user_id)
            .bind(purpose.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
