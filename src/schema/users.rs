//! Accounts, the follow graph, and profiles.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::FromRow;

#[derive(Clone, Debug, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    /// Argon2 PHC string; never serialised.
    pub password_hash: String,
    pub bio: String,
    pub avatar: Option<String>,
    pub date_joined: DateTime<Utc>,
}

/// Edge `follower_id -> followee_id` in `user_follows`.
#[derive(Clone, Debug, FromRow)]
pub struct UserFollow {
    pub id: i64,
    pub follower_id: i64,
    pub followee_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, FromRow)]
pub struct Profile {
    pub id: i64,
    pub user_id: i64,
    pub picture: Option<String>,
    pub bio: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub location: Option<String>,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
