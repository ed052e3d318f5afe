//! Community directories (churches, choirs, video studios) and live events.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::FromRow;
use std::str::FromStr;

#[derive(Clone, Debug, FromRow)]
pub struct Church {
    pub id: i64,
    pub name: String,
    pub continent: String,
    pub country: String,
    pub county: String,
    pub conference: String,
    pub district: String,
    pub location: String,
    pub members: i32,
    pub pastor: String,
    pub contact: String,
    pub image: Option<String>,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, FromRow)]
pub struct Choir {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub location: String,
    pub contact_phone: String,
    pub contact_email: String,
    pub genre: String,
    pub youtube_link: String,
    pub founded_date: Option<NaiveDate>,
    pub profile_image: Option<String>,
    pub cover_image: Option<String>,
    pub members_count: i32,
    pub is_active: bool,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServiceType {
    MusicVideo,
    Audio,
    Documentary,
    LiveEvent,
    Editing,
    Other,
}

impl ServiceType {
    pub fn as_str(self) -> &'static str {
        match self {
            ServiceType::MusicVideo => "music_video",
            ServiceType::Audio => "audio",
            ServiceType::Documentary => "documentary",
            ServiceType::LiveEvent => "live_event",
            ServiceType::Editing => "editing",
            ServiceType::Other => "other",
        }
    }
}

impl FromStr for ServiceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "music_video" => Ok(ServiceType::MusicVideo),
            "audio" => Ok(ServiceType::Audio),
            "documentary" => Ok(ServiceType::Documentary),
            "live_event" => Ok(ServiceType::LiveEvent),
            "editing" => Ok(ServiceType::Editing),
            "other" => Ok(ServiceType::Other),
            other => Err(format!("'{}' is not a valid service type", other)),
        }
    }
}

#[derive(Clone, Debug, FromRow)]
pub struct VideoStudio {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub location: String,
    pub contact_phone: String,
    pub contact_email: String,
    pub website: String,
    pub service_types: Vec<String>,
    pub logo: Option<String>,
    pub cover_image: Option<String>,
    pub is_verified: bool,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, FromRow)]
pub struct LiveEvent {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub youtube_url: String,
    pub thumbnail: Option<String>,
    pub is_live: bool,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub viewers_count: i64,
}
