//! Community directories (churches, choirs, video studios) and live events.
//!
//! Directory entries belong to the user who created them; only that user may
//! change or remove them.

use super::{discard_uploads, ensure_owner, like_pattern, Page, RequestValidator, StagedUploads};
use crate::error::AppError;
use crate::extractors::FormData;
use crate::media::{dirs, MediaStore};
use crate::schema::{Choir, Church, LiveEvent, ServiceType, VideoStudio};
use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::PgPool;

const NAME_MAX: usize = 200;
const REGION_MAX: usize = 100;
const PHONE_MAX: usize = 50;
const GENRE_MAX: usize = 100;
pub const EVENT_TITLE_MAX: usize = 200;
pub const YOUTUBE_URL_MAX: usize = 500;

/// `?search=` plus `?mine=` style scoping shared by the directory listings.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct DirectoryFilter {
    pub search: Option<String>,
    #[serde(skip)]
    pub created_by: Option<i64>,
}

impl DirectoryFilter {
    pub fn mine(viewer: i64) -> Self {
        DirectoryFilter { search: None, created_by: Some(viewer) }
    }

    fn pattern(&self) -> Option<String> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(like_pattern)
    }
}

fn counter(form: &FormData, field: &str, v: &mut RequestValidator) -> Result<Option<i32>, AppError> {
    let value = form.parse::<i32>(field)?;
    v.minimum(field, value.map(i64::from), 0);
    Ok(value)
}

// Churches

pub async fn list_churches(pool: &PgPool, filter: &DirectoryFilter, page: Page) -> Result<Vec<Church>, AppError> {
    let rows = sqlx::query_as(
        "SELECT * FROM churches WHERE ($1::bigint IS NULL OR created_by = $1) \
         AND ($2::text IS NULL OR name ILIKE $2 OR country ILIKE $2 OR conference ILIKE $2 OR location ILIKE $2) \
         ORDER BY name, id LIMIT $3 OFFSET $4",
    )
    .bind(filter.created_by)
    .bind(filter.pattern())
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn get_church(pool: &PgPool, id: i64) -> Result<Church, AppError> {
    sqlx::query_as("SELECT * FROM churches WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("church {}", id)))
}

struct ChurchFields {
    name: Option<String>,
    continent: Option<String>,
    country: Option<String>,
    county: Option<String>,
    conference: Option<String>,
    district: Option<String>,
    location: Option<String>,
    members: Option<i32>,
    pastor: Option<String>,
    contact: Option<String>,
}

impl ChurchFields {
    /// `creating` makes name, country and conference mandatory.
    fn from_form(form: &FormData, creating: bool) -> Result<Self, AppError> {
        let mut v = RequestValidator::new();
        let f = ChurchFields {
            name: form.trimmed("name"),
            continent: form.trimmed("continent"),
            country: form.trimmed("country"),
            county: form.trimmed("county"),
            conference: form.trimmed("conference"),
            district: form.trimmed("district"),
            location: form.trimmed("location"),
            members: counter(form, "members", &mut v)?,
            pastor: form.trimmed("pastor"),
            contact: form.trimmed("contact"),
        };
        if creating {
            v.required("name", f.name.as_deref())
                .required("country", f.country.as_deref())
                .required("conference", f.conference.as_deref());
        }
        v.max_length("name", f.name.as_deref(), NAME_MAX)
            .max_length("continent", f.continent.as_deref(), REGION_MAX)
            .max_length("country", f.country.as_deref(), REGION_MAX)
            .max_length("county", f.county.as_deref(), REGION_MAX)
            .max_length("conference", f.conference.as_deref(), NAME_MAX)
            .max_length("district", f.district.as_deref(), NAME_MAX)
            .max_length("location", f.location.as_deref(), NAME_MAX)
            .max_length("pastor", f.pastor.as_deref(), NAME_MAX)
            .max_length("contact", f.contact.as_deref(), NAME_MAX)
            .finish()?;
        Ok(f)
    }
}

pub async fn create_church(pool: &PgPool, media: &dyn MediaStore, viewer: i64, form: &FormData) -> Result<Church, AppError> {
    let f = ChurchFields::from_form(form, true)?;
    let mut uploads = StagedUploads::new(media);
    let written = async {
        let image = uploads.store(dirs::CHURCHES, form.file("image")).await?;
        let church: Church = sqlx::query_as(
            "INSERT INTO churches (name, continent, country, county, conference, district, location, members, pastor, contact, image, created_by) \
             VALUES ($1, COALESCE($2, ''), $3, COALESCE($4, ''), $5, COALESCE($6, ''), COALESCE($7, ''), COALESCE($8, 0), \
             COALESCE($9, ''), COALESCE($10, ''), $11, $12) RETURNING *",
        )
        .bind(f.name)
        .bind(f.continent)
        .bind(f.country)
        .bind(f.county)
        .bind(f.conference)
        .bind(f.district)
        .bind(f.location)
        .bind(f.members)
        .bind(f.pastor)
        .bind(f.contact)
        .bind(image)
        .bind(viewer)
        .fetch_one(pool)
        .await?;
        Ok::<_, AppError>(church)
    }
    .await;
    let church = uploads.settle(written).await?;
    tracing::info!(church_id = church.id, created_by = viewer, "church created");
    Ok(church)
}

pub async fn update_church(
    pool: &PgPool,
    media: &dyn MediaStore,
    viewer: i64,
    id: i64,
    form: &FormData,
) -> Result<Church, AppError> {
    let current = get_church(pool, id).await?;
    ensure_owner(current.created_by, viewer, "church")?;
    let f = ChurchFields::from_form(form, false)?;
    let mut uploads = StagedUploads::new(media);
    let written = async {
        let image = uploads.store(dirs::CHURCHES, form.file("image")).await?;
        let church: Church = sqlx::query_as(
            "UPDATE churches SET name = COALESCE($2, name), continent = COALESCE($3, continent), country = COALESCE($4, country), \
             county = COALESCE($5, county), conference = COALESCE($6, conference), district = COALESCE($7, district), \
             location = COALESCE($8, location), members = COALESCE($9, members), pastor = COALESCE($10, pastor), \
             contact = COALESCE($11, contact), image = COALESCE($12, image), updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(f.name)
        .bind(f.continent)
        .bind(f.country)
        .bind(f.county)
        .bind(f.conference)
        .bind(f.district)
        .bind(f.location)
        .bind(f.members)
        .bind(f.pastor)
        .bind(f.contact)
        .bind(&image)
        .fetch_one(pool)
        .await?;
        Ok::<_, AppError>((church, image.is_some()))
    }
    .await;
    let (church, replaced) = uploads.settle(written).await?;
    if replaced {
        discard_uploads(media, [current.image]).await;
    }
    Ok(church)
}

pub async fn delete_church(pool: &PgPool, media: &dyn MediaStore, viewer: i64, id: i64) -> Result<(), AppError> {
    let current = get_church(pool, id).await?;
    ensure_owner(current.created_by, viewer, "church")?;
    sqlx::query("DELETE FROM churches WHERE id = $1").bind(id).execute(pool).await?;
    discard_uploads(media, [current.image]).await;
    Ok(())
}

// Choirs

pub async fn list_choirs(pool: &PgPool, filter: &DirectoryFilter, page: Page) -> Result<Vec<Choir>, AppError> {
    let rows = sqlx::query_as(
        "SELECT * FROM choirs WHERE ($1::bigint IS NULL OR created_by = $1) \
         AND ($2::text IS NULL OR name ILIKE $2 OR genre ILIKE $2 OR location ILIKE $2) \
         ORDER BY name, id LIMIT $3 OFFSET $4",
    )
    .bind(filter.created_by)
    .bind(filter.pattern())
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn get_choir(pool: &PgPool, id: i64) -> Result<Choir, AppError> {
    sqlx::query_as("SELECT * FROM choirs WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("choir {}", id)))
}

struct ChoirFields {
    name: Option<String>,
    description: Option<String>,
    location: Option<String>,
    contact_phone: Option<String>,
    contact_email: Option<String>,
    genre: Option<String>,
    youtube_link: Option<String>,
    founded_date: Option<NaiveDate>,
    members_count: Option<i32>,
    is_active: Option<bool>,
}

impl ChoirFields {
    fn from_form(form: &FormData, creating: bool) -> Result<Self, AppError> {
        let mut v = RequestValidator::new();
        let f = ChoirFields {
            name: form.trimmed("name"),
            description: form.text("description").map(str::to_string),
            location: form.trimmed("location"),
            contact_phone: form.trimmed("contact_phone"),
            contact_email: form.trimmed("contact_email"),
            genre: form.trimmed("genre"),
            youtube_link: form.trimmed("youtube_link"),
            founded_date: form.parse::<NaiveDate>("founded_date")?,
            members_count: counter(form, "members_count", &mut v)?,
            is_active: form.bool("is_active")?,
        };
        if creating {
            v.required("name", f.name.as_deref());
        }
        v.max_length("name", f.name.as_deref(), NAME_MAX)
            .max_length("location", f.location.as_deref(), NAME_MAX)
            .max_length("contact_phone", f.contact_phone.as_deref(), PHONE_MAX)
            .max_length("genre", f.genre.as_deref(), GENRE_MAX)
            .email("contact_email", f.contact_email.as_deref())
            .finish()?;
        Ok(f)
    }
}

pub async fn create_choir(pool: &PgPool, media: &dyn MediaStore, viewer: i64, form: &FormData) -> Result<Choir, AppError> {
    let f = ChoirFields::from_form(form, true)?;
    let mut uploads = StagedUploads::new(media);
    let written = async {
        let profile_image = uploads.store(dirs::CHOIRS, form.file("profile_image")).await?;
        let cover_image = uploads.store(dirs::CHOIRS, form.file("cover_image")).await?;
        let choir: Choir = sqlx::query_as(
            "INSERT INTO choirs (name, description, location, contact_phone, contact_email, genre, youtube_link, founded_date, \
             profile_image, cover_image, members_count, is_active, created_by) \
             VALUES ($1, COALESCE($2, ''), COALESCE($3, ''), COALESCE($4, ''), COALESCE($5, ''), COALESCE($6, ''), COALESCE($7, ''), \
             $8, $9, $10, COALESCE($11, 0), COALESCE($12, TRUE), $13) RETURNING *",
        )
        .bind(f.name)
        .bind(f.description)
        .bind(f.location)
        .bind(f.contact_phone)
        .bind(f.contact_email)
        .bind(f.genre)
        .bind(f.youtube_link)
        .bind(f.founded_date)
        .bind(profile_image)
        .bind(cover_image)
        .bind(f.members_count)
        .bind(f.is_active)
        .bind(viewer)
        .fetch_one(pool)
        .await?;
        Ok::<_, AppError>(choir)
    }
    .await;
    let choir = uploads.settle(written).await?;
    tracing::info!(choir_id = choir.id, created_by = viewer, "choir created");
    Ok(choir)
}

pub async fn update_choir(
    pool: &PgPool,
    media: &dyn MediaStore,
    viewer: i64,
    id: i64,
    form: &FormData,
) -> Result<Choir, AppError> {
    let current = get_choir(pool, id).await?;
    ensure_owner(current.created_by, viewer, "choir")?;
    let f = ChoirFields::from_form(form, false)?;
    let mut uploads = StagedUploads::new(media);
    let written = async {
        let profile_image = uploads.store(dirs::CHOIRS, form.file("profile_image")).await?;
        let cover_image = uploads.store(dirs::CHOIRS, form.file("cover_image")).await?;
        let choir: Choir = sqlx::query_as(
            "UPDATE choirs SET name = COALESCE($2, name), description = COALESCE($3, description), location = COALESCE($4, location), \
             contact_phone = COALESCE($5, contact_phone), contact_email = COALESCE($6, contact_email), genre = COALESCE($7, genre), \
             youtube_link = COALESCE($8, youtube_link), founded_date = COALESCE($9, founded_date), \
             profile_image = COALESCE($10, profile_image), cover_image = COALESCE($11, cover_image), \
             members_count = COALESCE($12, members_count), is_active = COALESCE($13, is_active), updated_at = NOW() \
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(f.name)
        .bind(f.description)
        .bind(f.location)
        .bind(f.contact_phone)
        .bind(f.contact_email)
        .bind(f.genre)
        .bind(f.youtube_link)
        .bind(f.founded_date)
        .bind(&profile_image)
        .bind(&cover_image)
        .bind(f.members_count)
        .bind(f.is_active)
        .fetch_one(pool)
        .await?;
        Ok::<_, AppError>((choir, profile_image.is_some(), cover_image.is_some()))
    }
    .await;
    let (choir, new_profile, new_cover) = uploads.settle(written).await?;
    let replaced = [
        current.profile_image.filter(|_| new_profile),
        current.cover_image.filter(|_| new_cover),
    ];
    discard_uploads(media, replaced).await;
    Ok(choir)
}

pub async fn delete_choir(pool: &PgPool, media: &dyn MediaStore, viewer: i64, id: i64) -> Result<(), AppError> {
    let current = get_choir(pool, id).await?;
    ensure_owner(current.created_by, viewer, "choir")?;
    sqlx::query("DELETE FROM choirs WHERE id = $1").bind(id).execute(pool).await?;
    discard_uploads(media, [current.profile_image, current.cover_image]).await;
    Ok(())
}

pub async fn toggle_choir_active(pool: &PgPool, viewer: i64, id: i64) -> Result<Choir, AppError> {
    let current = get_choir(pool, id).await?;
    ensure_owner(current.created_by, viewer, "choir")?;
    let choir = sqlx::query_as("UPDATE choirs SET is_active = NOT is_active, updated_at = NOW() WHERE id = $1 RETURNING *")
        .bind(id)
        .fetch_one(pool)
        .await?;
    Ok(choir)
}

/// Sets the member count from `{count}`.
pub async fn update_choir_members(pool: &PgPool, viewer: i64, id: i64, form: &FormData) -> Result<Choir, AppError> {
    let current = get_choir(pool, id).await?;
    ensure_owner(current.created_by, viewer, "choir")?;
    let mut v = RequestValidator::new();
    let count = counter(form, "count", &mut v)?;
    v.required("count", count).finish()?;
    let choir = sqlx::query_as("UPDATE choirs SET members_count = $2, updated_at = NOW() WHERE id = $1 RETURNING *")
        .bind(id)
        .bind(count)
        .fetch_one(pool)
        .await?;
    Ok(choir)
}

// Video studios

/// Reads `service_types` from repeated or comma-separated values. Unknown names are field errors.
fn service_types(form: &FormData, v: &mut RequestValidator) -> Option<Vec<String>> {
    if !form.contains("service_types") {
        return None;
    }
    let mut out: Vec<String> = Vec::new();
    for raw in form.values("service_types").iter().flat_map(|s| s.split(',')) {
        let raw = raw.trim().trim_matches(|c| matches!(c, '[' | ']' | '"'));
        if raw.is_empty() {
            continue;
        }
        match raw.parse::<ServiceType>() {
            Ok(t) if !out.iter().any(|o| o == t.as_str()) => out.push(t.as_str().to_string()),
            Ok(_) => {}
            Err(e) => {
                v.fail("service_types", e);
            }
        }
    }
    Some(out)
}

struct StudioFields {
    name: Option<String>,
    description: Option<String>,
    location: Option<String>,
    contact_phone: Option<String>,
    contact_email: Option<String>,
    website: Option<String>,
    service_types: Option<Vec<String>>,
}

impl StudioFields {
    fn from_form(form: &FormData, creating: bool) -> Result<Self, AppError> {
        let mut v = RequestValidator::new();
        let f = StudioFields {
            name: form.trimmed("name"),
            description: form.text("description").map(str::to_string),
            location: form.trimmed("location"),
            contact_phone: form.trimmed("contact_phone"),
            contact_email: form.trimmed("contact_email"),
            website: form.trimmed("website"),
            service_types: service_types(form, &mut v),
        };
        if creating {
            v.required("name", f.name.as_deref())
                .required("location", f.location.as_deref());
        }
        let provided = f.service_types.as_ref().map(Vec::len);
        if (creating && provided.is_none()) || provided == Some(0) {
            v.fail("service_types", "Select at least one service type.");
        }
        v.max_length("name", f.name.as_deref(), NAME_MAX)
            .max_length("location", f.location.as_deref(), NAME_MAX)
            .max_length("contact_phone", f.contact_phone.as_deref(), PHONE_MAX)
            .email("contact_email", f.contact_email.as_deref())
            .finish()?;
        Ok(f)
    }
}

pub async fn list_studios(pool: &PgPool, filter: &DirectoryFilter, page: Page) -> Result<Vec<VideoStudio>, AppError> {
    let rows = sqlx::query_as(
        "SELECT * FROM video_studios WHERE ($1::bigint IS NULL OR created_by = $1) \
         AND ($2::text IS NULL OR name ILIKE $2 OR location ILIKE $2) \
         ORDER BY name, id LIMIT $3 OFFSET $4",
    )
    .bind(filter.created_by)
    .bind(filter.pattern())
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn get_studio(pool: &PgPool, id: i64) -> Result<VideoStudio, AppError> {
    sqlx::query_as("SELECT * FROM video_studios WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("video studio {}", id)))
}

pub async fn create_studio(pool: &PgPool, media: &dyn MediaStore, viewer: i64, form: &FormData) -> Result<VideoStudio, AppError> {
    let f = StudioFields::from_form(form, true)?;
    let mut uploads = StagedUploads::new(media);
    let written = async {
        let logo = uploads.store(dirs::STUDIOS, form.file("logo")).await?;
        let cover_image = uploads.store(dirs::STUDIOS, form.file("cover_image")).await?;
        let studio: VideoStudio = sqlx::query_as(
            "INSERT INTO video_studios (name, description, location, contact_phone, contact_email, website, service_types, \
             logo, cover_image, created_by) \
             VALUES ($1, COALESCE($2, ''), $3, COALESCE($4, ''), COALESCE($5, ''), COALESCE($6, ''), $7, $8, $9, $10) RETURNING *",
        )
        .bind(f.name)
        .bind(f.description)
        .bind(f.location)
        .bind(f.contact_phone)
        .bind(f.contact_email)
        .bind(f.website)
        .bind(f.service_types.unwrap_or_default())
        .bind(logo)
        .bind(cover_image)
        .bind(viewer)
        .fetch_one(pool)
        .await?;
        Ok::<_, AppError>(studio)
    }
    .await;
    let studio = uploads.settle(written).await?;
    tracing::info!(studio_id = studio.id, created_by = viewer, "video studio created");
    Ok(studio)
}

pub async fn update_studio(
    pool: &PgPool,
    media: &dyn MediaStore,
    viewer: i64,
    id: i64,
    form: &FormData,
) -> Result<VideoStudio, AppError> {
    let current = get_studio(pool, id).await?;
    ensure_owner(current.created_by, viewer, "video studio")?;
    let f = StudioFields::from_form(form, false)?;
    let mut uploads = StagedUploads::new(media);
    let written = async {
        let logo = uploads.store(dirs::STUDIOS, form.file("logo")).await?;
        let cover_image = uploads.store(dirs::STUDIOS, form.file("cover_image")).await?;
        let studio: VideoStudio = sqlx::query_as(
            "UPDATE video_studios SET name = COALESCE($2, name), description = COALESCE($3, description), \
             location = COALESCE($4, location), contact_phone = COALESCE($5, contact_phone), \
             contact_email = COALESCE($6, contact_email), website = COALESCE($7, website), \
             service_types = COALESCE($8, service_types), logo = COALESCE($9, logo), cover_image = COALESCE($10, cover_image), \
             updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(f.name)
        .bind(f.description)
        .bind(f.location)
        .bind(f.contact_phone)
        .bind(f.contact_email)
        .bind(f.website)
        .bind(f.service_types)
        .bind(&logo)
        .bind(&cover_image)
        .fetch_one(pool)
        .await?;
        Ok::<_, AppError>((studio, logo.is_some(), cover_image.is_some()))
    }
    .await;
    let (studio, new_logo, new_cover) = uploads.settle(written).await?;
    discard_uploads(media, [current.logo.filter(|_| new_logo), current.cover_image.filter(|_| new_cover)]).await;
    Ok(studio)
}

pub async fn delete_studio(pool: &PgPool, media: &dyn MediaStore, viewer: i64, id: i64) -> Result<(), AppError> {
    let current = get_studio(pool, id).await?;
    ensure_owner(current.created_by, viewer, "video studio")?;
    sqlx::query("DELETE FROM video_studios WHERE id = $1").bind(id).execute(pool).await?;
    discard_uploads(media, [current.logo, current.cover_image]).await;
    Ok(())
}

// Live events

#[derive(Clone, Debug, Default, Deserialize)]
pub struct LiveEventFilter {
    pub user: Option<i64>,
    pub is_live: Option<bool>,
}

pub async fn list_live_events(pool: &PgPool, filter: &LiveEventFilter, page: Page) -> Result<Vec<LiveEvent>, AppError> {
    let rows = sqlx::query_as(
        "SELECT * FROM live_events WHERE ($1::bigint IS NULL OR user_id = $1) AND ($2::boolean IS NULL OR is_live = $2) \
         ORDER BY start_time DESC, id DESC LIMIT $3 OFFSET $4",
    )
    .bind(filter.user)
    .bind(filter.is_live)
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn get_live_event(pool: &PgPool, id: i64) -> Result<LiveEvent, AppError> {
    sqlx::query_as("SELECT * FROM live_events WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("live event {}", id)))
}

fn event_fields(form: &FormData, creating: bool) -> Result<(Option<String>, Option<String>), AppError> {
    let title = form.trimmed("title");
    let youtube_url = form.trimmed("youtube_url");
    let mut v = RequestValidator::new();
    if creating {
        v.required("title", title.as_deref()).required("youtube_url", youtube_url.as_deref());
    }
    v.max_length("title", title.as_deref(), EVENT_TITLE_MAX)
        .max_length("youtube_url", youtube_url.as_deref(), YOUTUBE_URL_MAX)
        .finish()?;
    Ok((title, youtube_url))
}

pub async fn create_live_event(pool: &PgPool, viewer: i64, form: &FormData) -> Result<LiveEvent, AppError> {
    let (title, youtube_url) = event_fields(form, true)?;
    let event: LiveEvent = sqlx::query_as(
        "INSERT INTO live_events (user_id, title, description, youtube_url, thumbnail) VALUES ($1, $2, $3, $4, $5) RETURNING *",
    )
    .bind(viewer)
    .bind(title)
    .bind(form.text("description"))
    .bind(youtube_url)
    .bind(form.trimmed("thumbnail"))
    .fetch_one(pool)
    .await?;
    tracing::info!(event_id = event.id, user_id = viewer, "live event started");
    Ok(event)
}

pub async fn update_live_event(pool: &PgPool, viewer: i64, id: i64, form: &FormData) -> Result<LiveEvent, AppError> {
    let current = get_live_event(pool, id).await?;
    ensure_owner(current.user_id, viewer, "live event")?;
    let (title, youtube_url) = event_fields(form, false)?;
    let event = sqlx::query_as(
        "UPDATE live_events SET title = COALESCE($2, title), description = COALESCE($3, description), \
         youtube_url = COALESCE($4, youtube_url), thumbnail = COALESCE($5, thumbnail) WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(title)
    .bind(form.text("description"))
    .bind(youtube_url)
    .bind(form.trimmed("thumbnail"))
    .fetch_one(pool)
    .await?;
    Ok(event)
}

pub async fn delete_live_event(pool: &PgPool, viewer: i64, id: i64) -> Result<(), AppError> {
    let current = get_live_event(pool, id).await?;
    ensure_owner(current.user_id, viewer, "live event")?;
    sqlx::query("DELETE FROM live_events WHERE id = $1").bind(id).execute(pool).await?;
    Ok(())
}

/// Counts a viewer joining. Ended events cannot be joined.
pub async fn join_live_event(pool: &PgPool, id: i64) -> Result<LiveEvent, AppError> {
    let joined: Option<LiveEvent> =
        sqlx::query_as("UPDATE live_events SET viewers_count = viewers_count + 1 WHERE id = $1 AND is_live RETURNING *")
            .bind(id)
            .fetch_optional(pool)
            .await?;
    match joined {
        Some(event) => Ok(event),
        None => {
            get_live_event(pool, id).await?;
            Err(AppError::BadRequest("this event has ended".into()))
        }
    }
}

pub async fn end_live_event(pool: &PgPool, viewer: i64, id: i64) -> Result<LiveEvent, AppError> {
    let current = get_live_event(pool, id).await?;
    ensure_owner(current.user_id, viewer, "live event")?;
    if !current.is_live {
        return Err(AppError::BadRequest("this event has already ended".into()));
    }
    let event = sqlx::query_as("UPDATE live_events SET is_live = FALSE, end_time = NOW() WHERE id = $1 RETURNING *")
        .bind(id)
        .fetch_one(pool)
        .await?;
    tracing::info!(event_id = id, "live event ended");
    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_errors(err: AppError, field: &str) -> Vec<String> {
        match err {
            AppError::Validation(e) => e.field(field).map(<[String]>::to_vec).unwrap_or_default(),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn church_requires_name_country_and_conference() {
        let err = ChurchFields::from_form(&FormData::new().with_field("name", "Central"), true)
            .err()
            .unwrap();
        assert!(!field_errors(err, "conference").is_empty());
        assert!(ChurchFields::from_form(&FormData::new(), false).is_ok());
    }

    #[test]
    fn negative_member_counts_are_rejected() {
        let form = FormData::new()
            .with_field("name", "Central")
            .with_field("country", "Kenya")
            .with_field("conference", "CKC")
            .with_field("members", "-4");
        let err = ChurchFields::from_form(&form, true).err().unwrap();
        assert_eq!(field_errors(err, "members").len(), 1);
    }

    #[test]
    fn service_types_accept_comma_lists_and_dedupe() {
        let form = FormData::new()
            .with_field("service_types", "audio, editing")
            .with_field("service_types", "audio");
        let mut v = RequestValidator::new();
        assert_eq!(service_types(&form, &mut v), Some(vec!["audio".to_string(), "editing".to_string()]));
        assert!(v.finish().is_ok());
    }

    #[test]
    fn studio_needs_a_valid_service_type() {
        let base = FormData::new().with_field("name", "Lens").with_field("location", "Nairobi");
        let err = StudioFields::from_form(&base, true).err().unwrap();
        assert!(!field_errors(err, "service_types").is_empty());

        let bad = base.clone().with_field("service_types", "weddings");
        let err = StudioFields::from_form(&bad, true).err().unwrap();
        assert!(!field_errors(err, "service_types").is_empty());

        let good = base.with_field("service_types", "music_video");
        assert!(StudioFields::from_form(&good, true).is_ok());
    }

    #[test]
    fn live_event_needs_title_and_url() {
        let err = event_fields(&FormData::new().with_field("title", "Vespers"), true).err().unwrap();
        assert!(!field_errors(err, "youtube_url").is_empty());
        assert!(event_fields(&FormData::new(), false).is_ok());
    }
}
