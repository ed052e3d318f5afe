//! Short-form social posts, their engagement rows, and notifications.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Video,
    Image,
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::Video => "video",
            ContentType::Image => "image",
        }
    }
}

impl FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "video" => Ok(ContentType::Video),
            "image" => Ok(ContentType::Image),
            other => Err(format!("'{}' is not a valid choice (video, image)", other)),
        }
    }
}

#[derive(Clone, Debug, FromRow)]
pub struct SocialPost {
    pub id: i64,
    pub user_id: i64,
    pub content_type: String,
    pub media_file: String,
    /// Nulled when the track is deleted.
    pub song_id: Option<i64>,
    pub caption: String,
    pub tags: String,
    pub location: String,
    pub duration_seconds: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, FromRow)]
pub struct PostLike {
    pub id: i64,
    pub post_id: i64,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, FromRow)]
pub struct PostComment {
    pub id: i64,
    pub post_id: i64,
    pub user_id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, FromRow)]
pub struct PostSave {
    pub id: i64,
    pub post_id: i64,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotificationType {
    Like,
    Comment,
    Follow,
    Save,
}

impl NotificationType {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationType::Like => "like",
            NotificationType::Comment => "comment",
            NotificationType::Follow => "follow",
            NotificationType::Save => "save",
        }
    }
}

#[derive(Clone, Debug, FromRow)]
pub struct Notification {
    pub id: i64,
    pub recipient_id: i64,
    pub sender_id: i64,
    pub message: String,
    pub read: bool,
    pub notification_type: String,
    pub post_id: Option<i64>,
    pub track_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}
