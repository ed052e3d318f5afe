//! Directory listings (churches, choirs, studios) and live events.

use super::{unique_ids, users::user_map, UserView};
use crate::error::AppError;
use crate::extractors::ViewContext;
use crate::schema::{Choir, Church, LiveEvent, VideoStudio};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::PgPool;
use std::collections::HashMap;

/// Username and profile picture of a directory entry's creator.
#[derive(Clone, Debug, Default, sqlx::FromRow)]
pub struct CreatorSummary {
    pub id: i64,
    pub username: String,
    pub picture: Option<String>,
}

async fn creator_summaries(pool: &PgPool, ids: &[i64]) -> Result<HashMap<i64, CreatorSummary>, AppError> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows: Vec<CreatorSummary> = sqlx::query_as(
        "SELECT u.id, u.username, p.picture FROM users u LEFT JOIN profiles p ON p.user_id = u.id WHERE u.id = ANY($1)",
    )
    .bind(ids)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|c| (c.id, c)).collect())
}

#[derive(Clone, Debug, Serialize)]
pub struct ChurchView {
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
    pub created_by_username: String,
    pub created_by_picture: Option<String>,
    pub is_owner: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChurchView {
    pub fn build(ctx: &ViewContext, c: Church, creator: &CreatorSummary) -> Self {
        ChurchView {
            image: ctx.media_url(c.image.as_deref()),
            created_by_username: creator.username.clone(),
            created_by_picture: ctx.media_url(creator.picture.as_deref()),
            is_owner: ctx.is_viewer(c.created_by),
            id: c.id,
            name: c.name,
            continent: c.continent,
            country: c.country,
            county: c.county,
            conference: c.conference,
            district: c.district,
            location: c.location,
            members: c.members,
            pastor: c.pastor,
            contact: c.contact,
            created_by: c.created_by,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

pub async fn church_views(pool: &PgPool, ctx: &ViewContext, rows: Vec<Church>) -> Result<Vec<ChurchView>, AppError> {
    let creators = creator_summaries(pool, &unique_ids(rows.iter().map(|c| c.created_by))).await?;
    Ok(rows
        .into_iter()
        .filter_map(|c| {
            let creator = creators.get(&c.created_by)?;
            Some(ChurchView::build(ctx, c, creator))
        })
        .collect())
}

pub async fn church_view(pool: &PgPool, ctx: &ViewContext, row: Church) -> Result<ChurchView, AppError> {
    super::single(church_views(pool, ctx, vec![row]).await?, "church")
}

#[derive(Clone, Debug, Serialize)]
pub struct ChoirView {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub location: String,
    pub contact_phone: String,
    pub contact_email: String,
    pub genre: String,
    pub youtube_link: String,
    pub founded_date: Option<NaiveDate>,
    pub profile_image_url: Option<String>,
    pub cover_image_url: Option<String>,
    pub members_count: i32,
    pub is_active: bool,
    pub created_by: UserView,
    pub is_owner: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub async fn choir_views(pool: &PgPool, ctx: &ViewContext, rows: Vec<Choir>) -> Result<Vec<ChoirView>, AppError> {
    let creators = user_map(pool, ctx, &unique_ids(rows.iter().map(|c| c.created_by))).await?;
    Ok(rows
        .into_iter()
        .filter_map(|c| {
            Some(ChoirView {
                created_by: creators.get(&c.created_by)?.clone(),
                profile_image_url: ctx.media_url(c.profile_image.as_deref()),
                cover_image_url: ctx.media_url(c.cover_image.as_deref()),
                is_owner: ctx.is_viewer(c.created_by),
                id: c.id,
                name: c.name,
                description: c.description,
                location: c.location,
                contact_phone: c.contact_phone,
                contact_email: c.contact_email,
                genre: c.genre,
                youtube_link: c.youtube_link,
                founded_date: c.founded_date,
                members_count: c.members_count,
                is_active: c.is_active,
                created_at: c.created_at,
                updated_at: c.updated_at,
            })
        })
        .collect())
}

pub async fn choir_view(pool: &PgPool, ctx: &ViewContext, row: Choir) -> Result<ChoirView, AppError> {
    super::single(choir_views(pool, ctx, vec![row]).await?, "choir")
}

#[derive(Clone, Debug, Serialize)]
pub struct VideoStudioView {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub location: String,
    pub contact_phone: String,
    pub contact_email: String,
    pub website: String,
    pub service_types: Vec<String>,
    pub logo_url: Option<String>,
    pub cover_image_url: Option<String>,
    pub is_verified: bool,
    pub created_by: UserView,
    pub created_by_username: String,
    pub created_by_picture: Option<String>,
    pub is_owner: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub async fn studio_views(pool: &PgPool, ctx: &ViewContext, rows: Vec<VideoStudio>) -> Result<Vec<VideoStudioView>, AppError> {
    let creators = user_map(pool, ctx, &unique_ids(rows.iter().map(|s| s.created_by))).await?;
    Ok(rows
        .into_iter()
        .filter_map(|s| {
            let created_by = creators.get(&s.created_by)?.clone();
            Some(VideoStudioView {
                created_by_username: created_by.username.clone(),
                created_by_picture: created_by.profile.as_ref().and_then(|p| p.picture.clone()),
                created_by,
                logo_url: ctx.media_url(s.logo.as_deref()),
                cover_image_url: ctx.media_url(s.cover_image.as_deref()),
                is_owner: ctx.is_viewer(s.created_by),
                id: s.id,
                name: s.name,
                description: s.description,
                location: s.location,
                contact_phone: s.contact_phone,
                contact_email: s.contact_email,
                website: s.website,
                service_types: s.service_types,
                is_verified: s.is_verified,
                created_at: s.created_at,
                updated_at: s.updated_at,
            })
        })
        .collect())
}

pub async fn studio_view(pool: &PgPool, ctx: &ViewContext, row: VideoStudio) -> Result<VideoStudioView, AppError> {
    super::single(studio_views(pool, ctx, vec![row]).await?, "video studio")
}

#[derive(Clone, Debug, Serialize)]
pub struct LiveEventView {
    pub id: i64,
    pub user: UserView,
    pub title: String,
    pub description: Option<String>,
    pub youtube_url: String,
    pub thumbnail: Option<String>,
    pub is_live: bool,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub viewers_count: i64,
    pub is_owner: bool,
}

pub async fn live_event_views(pool: &PgPool, ctx: &ViewContext, rows: Vec<LiveEvent>) -> Result<Vec<LiveEventView>, AppError> {
    let users = user_map(pool, ctx, &unique_ids(rows.iter().map(|e| e.user_id))).await?;
    Ok(rows
        .into_iter()
        .filter_map(|e| {
            Some(LiveEventView {
                user: users.get(&e.user_id)?.clone(),
                is_owner: ctx.is_viewer(e.user_id),
                id: e.id,
                title: e.title,
                description: e.description,
                youtube_url: e.youtube_url,
                thumbnail: e.thumbnail,
                is_live: e.is_live,
                start_time: e.start_time,
                end_time: e.end_time,
                viewers_count: e.viewers_count,
            })
        })
        .collect())
}

pub async fn live_event_view(pool: &PgPool, ctx: &ViewContext, row: LiveEvent) -> Result<LiveEventView, AppError> {
    super::single(live_event_views(pool, ctx, vec![row]).await?, "live event")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn church_carries_creator_summary() {
        let ctx = ViewContext::new(Some(5), Some("https://advent.test".into()));
        let church = Church {
            id: 1,
            name: "Central".into(),
            continent: "Africa".into(),
            country: "Kenya".into(),
            county: "Nairobi".into(),
            conference: "Central Kenya".into(),
            district: String::new(),
            location: String::new(),
            members: 120,
            pastor: String::new(),
            contact: String::new(),
            image: None,
            created_by: 5,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let creator = CreatorSummary { id: 5, username: "elder".into(), picture: Some("profiles/e.jpg".into()) };
        let view = ChurchView::build(&ctx, church, &creator);
        assert!(view.is_owner);
        assert_eq!(view.created_by_username, "elder");
        assert_eq!(view.created_by_picture.as_deref(), Some("https://advent.test/media/profiles/e.jpg"));
        assert_eq!(view.image, None);
    }
}
