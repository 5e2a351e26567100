//! User data models

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// User database model
///
/// Invariant: every row has a `password_hash` or a `google_id` (or both once a
/// password account links Google). Rows are soft-deleted; a deleted account's
/// email and username stay reserved.
#[derive(FromRow, Serialize, Debug, Clone)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub google_id: Option<String>,
    pub email_verified: bool,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Fields needed to insert a new user row.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub username: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub google_id: Option<String>,
    pub avatar_url: Option<String>,
    /// Google identities arrive pre-verified; password accounts start false.
    pub email_verified: bool,
}
