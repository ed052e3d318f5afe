//! Groups, membership, join requests, and group posts.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use std::str::FromStr;

#[derive(Clone, Debug, FromRow)]
pub struct Group {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub cover_image: Option<String>,
    pub creator_id: i64,
    pub is_private: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, FromRow)]
pub struct GroupMember {
    pub id: i64,
    pub group_id: i64,
    pub user_id: i64,
    pub is_admin: bool,
    pub joined_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinStatus {
    Pending,
    Approved,
    Rejected,
}

impl JoinStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JoinStatus::Pending => "pending",
            JoinStatus::Approved => "approved",
            JoinStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for JoinStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JoinStatus::Pending),
            "approved" => Ok(JoinStatus::Approved),
            "rejected" => Ok(JoinStatus::Rejected),
            other => Err(format!("unknown join status '{}'", other)),
        }
    }
}

#[derive(Clone, Debug, FromRow)]
pub struct GroupJoinRequest {
    pub id: i64,
    pub group_id: i64,
    pub user_id: i64,
    pub message: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, FromRow)]
pub struct GroupPost {
    pub id: i64,
    pub group_id: i64,
    pub user_id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttachmentKind {
    Image,
    Video,
    Audio,
    Document,
}

impl AttachmentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AttachmentKind::Image => "image",
            AttachmentKind::Video => "video",
            AttachmentKind::Audio => "audio",
            AttachmentKind::Document => "document",
        }
    }

    /// Classifies an upload by its extension.
    pub fn from_extension(ext: Option<&str>) -> Self {
        match ext {
            Some("jpg" | "jpeg" | "png" | "gif" | "webp" | "heic") => AttachmentKind::Image,
            Some("mp4" | "mov" | "avi" | "mkv" | "webm") => AttachmentKind::Video,
            Some("mp3" | "wav" | "ogg" | "m4a" | "aac" | "flac") => AttachmentKind::Audio,
            _ => AttachmentKind::Document,
        }
    }
}

#[derive(Clone, Debug, FromRow)]
pub struct GroupPostAttachment {
    pub id: i64,
    pub post_id: i64,
    pub file: String,
    pub file_type: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachments_classified_by_extension() {
        assert_eq!(AttachmentKind::from_extension(Some("jpeg")), AttachmentKind::Image);
        assert_eq!(AttachmentKind::from_extension(Some("m4a")), AttachmentKind::Audio);
        assert_eq!(AttachmentKind::from_extension(Some("pdf")), AttachmentKind::Document);
        assert_eq!(AttachmentKind::from_extension(None), AttachmentKind::Document);
    }

    #[test]
    fn unknown_join_status_is_rejected() {
        assert_eq!("approved".parse::<JoinStatus>(), Ok(JoinStatus::Approved));
        assert!("maybe".parse::<JoinStatus>().is_err());
    }
}
