//! User persistence operations
//!
//! Live-account lookups always filter `deleted_at IS NULL`; the
//! `*_with_deleted` variants include soft-deleted rows and back the
//! identifier-reservation rule for sign-up collision checks.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};

use super::models::{NewUser, User};

pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ? AND deleted_at IS NULL")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ? AND deleted_at IS NULL")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn find_by_google_id(&self, google_id: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE google_id = ? AND deleted_at IS NULL")
            .bind(google_id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn email_taken_with_deleted(&self, email: &str) -> Result<bool, sqlx::Error> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    pub async fn username_taken_with_deleted(&self, username: &str) -> Result<bool, sqlx::Error> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    pub async fn create(&self, new_user: NewUser) -> Result<User, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        Self::insert(&mut conn, new_user).await
    }

    /// Insert on a caller-owned connection so sign-up can scope the insert
    /// inside a transaction together with the verification code.
    pub async fn insert(
        conn: &mut SqliteConnection,
        new_user: NewUser,
    ) -> Result<User, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (name, username, email, password_hash, google_id, avatar_url, email_verified)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&new_user.name)
        .bind(&new_user.username)
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(&new_user.google_id)
        .bind(&new_user.avatar_url)
        .bind(new_user.email_verified)
        .execute(&mut *conn)
        .await?;

        let id = result.last_insert_rowid();

        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_one(conn)
            .await
    }

    pub async fn set_email_verified(&self, id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET email_verified = 1, updated_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Attach a Google identity to an existing account. Linking marks the
    /// email verified since the address came from a trusted provider.
    pub async fn link_google(
        &self,
        id: i64,
        google_id: &str,
        avatar_url: Option<&str>,
    ) -> Result<User, sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE users
            SET google_id = ?, avatar_url = COALESCE(?, avatar_url), email_verified = 1, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(google_id)
        .bind(avatar_url)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await
    }

    pub async fn update_password_hash(
        &self,
        id: i64,
        password_hash: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
            .bind(password_hash)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Soft delete: the row stays so the email/username remain reserved.
    pub async fn soft_delete(&self, id: i64) -> Result<(), sqlx::Error> {
        let now = Utc::now();
        sqlx::query("UPDATE users SET deleted_at = ?, updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
