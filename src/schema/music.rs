//! Tracks and everything hanging off them.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

pub const TRACK_TITLE_MAX: usize = 100;

#[derive(Clone, Debug, FromRow)]
pub struct Track {
    pub id: i64,
    pub title: String,
    pub artist_id: i64,
    pub album: Option<String>,
    pub audio_file: String,
    pub cover_image: Option<String>,
    pub lyrics: Option<String>,
    pub slug: String,
    pub views: i64,
    pub downloads: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, FromRow)]
pub struct Playlist {
    pub id: i64,
    pub name: String,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, FromRow)]
pub struct Comment {
    pub id: i64,
    pub content: String,
    pub track_id: i64,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// At most one per (track, user).
#[derive(Clone, Debug, FromRow)]
pub struct Like {
    pub id: i64,
    pub track_id: i64,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
