//! Tracks, playlists, comments, likes and track categories.

use super::notifications::{self, Target};
use super::{discard_uploads, ensure_owner, like_pattern, Page, RequestValidator, StagedUploads};
use crate::error::AppError;
use crate::extractors::FormData;
use crate::media::{dirs, MediaReader, MediaStore};
use crate::schema::{Category, Comment, Like, NotificationType, Playlist, Track, TRACK_TITLE_MAX};
use crate::slug::unique_slug;
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};

pub const PLAYLIST_NAME_MAX: usize = 100;
pub const CATEGORY_NAME_MAX: usize = 100;
pub const ALBUM_MAX: usize = 100;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct TrackFilter {
    pub artist: Option<i64>,
    pub search: Option<String>,
    /// Category name (case-insensitive) or id.
    pub category: Option<String>,
}

pub async fn list_tracks(pool: &PgPool, filter: &TrackFilter, page: Page) -> Result<Vec<Track>, AppError> {
    let sql = "SELECT t.* FROM tracks t WHERE ($1::bigint IS NULL OR t.artist_id = $1) \
         AND ($2::text IS NULL OR t.title ILIKE $2 OR t.album ILIKE $2) \
         AND ($3::text IS NULL OR EXISTS (SELECT 1 FROM category_tracks ct JOIN categories c ON c.id = ct.category_id \
              WHERE ct.track_id = t.id AND (LOWER(c.name) = LOWER($3) OR c.id::text = $3))) \
         ORDER BY t.created_at DESC, t.id DESC LIMIT $4 OFFSET $5";
    tracing::debug!(sql, ?filter, "query");
    let search = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(like_pattern);
    let category = filter.category.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let rows = sqlx::query_as(sql)
        .bind(filter.artist)
        .bind(search)
        .bind(category)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

pub async fn get_track(pool: &PgPool, id: i64) -> Result<Track, AppError> {
    sqlx::query_as("SELECT * FROM tracks WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("track {}", id)))
}

/// Fetches a track for display, counting the view in the same statement.
pub async fn view_track(pool: &PgPool, id: i64) -> Result<Track, AppError> {
    sqlx::query_as("UPDATE tracks SET views = views + 1 WHERE id = $1 RETURNING *")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("track {}", id)))
}

pub async fn create_track(
    pool: &PgPool,
    media: &dyn MediaStore,
    viewer: i64,
    form: &FormData,
) -> Result<Track, AppError> {
    let title = form.trimmed("title");
    let album = form.trimmed("album");
    RequestValidator::new()
        .required("title", title.as_deref())
        .max_length("title", title.as_deref(), TRACK_TITLE_MAX)
        .max_length("album", album.as_deref(), ALBUM_MAX)
        .required("audio_file", form.file("audio_file"))
        .finish()?;
    let title = title.unwrap_or_default();
    let mut uploads = StagedUploads::new(media);
    let written = async {
        let audio = uploads
            .store(dirs::AUDIO, form.file("audio_file"))
            .await?
            .ok_or_else(|| AppError::invalid("audio_file", "This field is required."))?;
        let cover = uploads.store(dirs::COVERS, form.file("cover_image")).await?;
        let mut tx = pool.begin().await?;
        let slug = unique_slug(&mut *tx, "tracks", &title, "track").await?;
        let track: Track = sqlx::query_as(
            "INSERT INTO tracks (title, artist_id, album, audio_file, cover_image, lyrics, slug) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
        )
        .bind(&title)
        .bind(viewer)
        .bind(album)
        .bind(audio)
        .bind(cover)
        .bind(form.text("lyrics"))
        .bind(&slug)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok::<_, AppError>(track)
    }
    .await;
    let track = uploads.settle(written).await?;
    tracing::info!(track_id = track.id, slug = %track.slug, artist_id = viewer, "track uploaded");
    Ok(track)
}

/// Owner edit of title, album, lyrics and cover. The slug stays as first assigned.
pub async fn update_track(
    pool: &PgPool,
    media: &dyn MediaStore,
    viewer: i64,
    id: i64,
    form: &FormData,
) -> Result<Track, AppError> {
    let current = get_track(pool, id).await?;
    ensure_owner(current.artist_id, viewer, "track")?;
    let title = form.trimmed("title");
    let album = form.trimmed("album");
    RequestValidator::new()
        .max_length("title", title.as_deref(), TRACK_TITLE_MAX)
        .max_length("album", album.as_deref(), ALBUM_MAX)
        .finish()?;
    let mut uploads = StagedUploads::new(media);
    let written = async {
        let cover = uploads.store(dirs::COVERS, form.file("cover_image")).await?;
        let track: Track = sqlx::query_as(
            "UPDATE tracks SET title = COALESCE($2, title), album = COALESCE($3, album), lyrics = COALESCE($4, lyrics), \
             cover_image = COALESCE($5, cover_image), updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(title)
        .bind(album)
        .bind(form.text("lyrics"))
        .bind(cover)
        .fetch_one(pool)
        .await?;
        Ok::<_, AppError>(track)
    }
    .await;
    let replaced = !uploads.paths().is_empty();
    let track = uploads.settle(written).await?;
    if replaced {
        discard_uploads(media, [current.cover_image]).await;
    }
    Ok(track)
}

pub async fn delete_track(pool: &PgPool, media: &dyn MediaStore, viewer: i64, id: i64) -> Result<(), AppError> {
    let current = get_track(pool, id).await?;
    ensure_owner(current.artist_id, viewer, "track")?;
    sqlx::query("DELETE FROM tracks WHERE id = $1").bind(id).execute(pool).await?;
    discard_uploads(media, [Some(current.audio_file), current.cover_image]).await;
    tracing::info!(track_id = id, "track deleted");
    Ok(())
}

/// Opens the audio file, then counts the download.
pub async fn download_track(pool: &PgPool, media: &dyn MediaStore, id: i64) -> Result<(Track, MediaReader), AppError> {
    let track = get_track(pool, id).await?;
    let audio = media.reader(&track.audio_file).await?;
    let track = sqlx::query_as("UPDATE tracks SET downloads = downloads + 1 WHERE id = $1 RETURNING *")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .unwrap_or(track);
    Ok((track, audio))
}

async fn likes_count(conn: &mut PgConnection, track_id: i64) -> Result<i64, AppError> {
    let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM likes WHERE track_id = $1")
        .bind(track_id)
        .fetch_one(conn)
        .await?;
    Ok(n)
}

/// Adds or removes the viewer's like. Returns the new state and the track's like count.
pub async fn toggle_favorite(pool: &PgPool, viewer: i64, track_id: i64) -> Result<(bool, i64), AppError> {
    let track = get_track(pool, track_id).await?;
    let mut tx = pool.begin().await?;
    let removed = sqlx::query("DELETE FROM likes WHERE track_id = $1 AND user_id = $2")
        .bind(track_id)
        .bind(viewer)
        .execute(&mut *tx)
        .await?;
    let liked = removed.rows_affected() == 0;
    if liked {
        sqlx::query("INSERT INTO likes (track_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(track_id)
            .bind(viewer)
            .execute(&mut *tx)
            .await?;
        let target = Target { post_id: None, track_id: Some(track_id) };
        notifications::notify(&mut *tx, track.artist_id, viewer, NotificationType::Like, target).await?;
    }
    let count = likes_count(&mut *tx, track_id).await?;
    tx.commit().await?;
    Ok((liked, count))
}

/// Tracks the viewer has liked, most recent like first.
pub async fn favorites(pool: &PgPool, viewer: i64, page: Page) -> Result<Vec<Track>, AppError> {
    let rows = sqlx::query_as(
        "SELECT t.* FROM tracks t JOIN likes l ON l.track_id = t.id WHERE l.user_id = $1 \
         ORDER BY l.created_at DESC, l.id DESC LIMIT $2 OFFSET $3",
    )
    .bind(viewer)
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn track_comments(pool: &PgPool, track_id: i64, page: Page) -> Result<Vec<Comment>, AppError> {
    get_track(pool, track_id).await?;
    let rows = sqlx::query_as(
        "SELECT * FROM comments WHERE track_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3",
    )
    .bind(track_id)
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

fn comment_content(form: &FormData) -> Result<String, AppError> {
    let content = form.trimmed("content");
    RequestValidator::new().required("content", content.as_deref()).finish()?;
    Ok(content.unwrap_or_default())
}

pub async fn add_comment(pool: &PgPool, viewer: i64, track_id: i64, form: &FormData) -> Result<Comment, AppError> {
    let content = comment_content(form)?;
    let track = get_track(pool, track_id).await?;
    let mut tx = pool.begin().await?;
    let comment: Comment =
        sqlx::query_as("INSERT INTO comments (content, track_id, user_id) VALUES ($1, $2, $3) RETURNING *")
            .bind(&content)
            .bind(track_id)
            .bind(viewer)
            .fetch_one(&mut *tx)
            .await?;
    let target = Target { post_id: None, track_id: Some(track_id) };
    notifications::notify(&mut *tx, track.artist_id, viewer, NotificationType::Comment, target).await?;
    tx.commit().await?;
    Ok(comment)
}

pub async fn get_comment(pool: &PgPool, id: i64) -> Result<Comment, AppError> {
    sqlx::query_as("SELECT * FROM comments WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("comment {}", id)))
}

pub async fn update_comment(pool: &PgPool, viewer: i64, id: i64, form: &FormData) -> Result<Comment, AppError> {
    let current = get_comment(pool, id).await?;
    ensure_owner(current.user_id, viewer, "comment")?;
    let content = comment_content(form)?;
    let comment = sqlx::query_as("UPDATE comments SET content = $2, updated_at = NOW() WHERE id = $1 RETURNING *")
        .bind(id)
        .bind(content)
        .fetch_one(pool)
        .await?;
    Ok(comment)
}

pub async fn delete_comment(pool: &PgPool, viewer: i64, id: i64) -> Result<(), AppError> {
    let current = get_comment(pool, id).await?;
    ensure_owner(current.user_id, viewer, "comment")?;
    sqlx::query("DELETE FROM comments WHERE id = $1").bind(id).execute(pool).await?;
    Ok(())
}

pub async fn list_likes(pool: &PgPool, viewer: i64, page: Page) -> Result<Vec<Like>, AppError> {
    let rows = sqlx::query_as("SELECT * FROM likes WHERE user_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3")
        .bind(viewer)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Explicit like; a second like of the same track is a conflict rather than a toggle.
pub async fn create_like(pool: &PgPool, viewer: i64, form: &FormData) -> Result<Like, AppError> {
    let track_id = form.parse::<i64>("track")?;
    RequestValidator::new().required("track", track_id).finish()?;
    let track = get_track(pool, track_id.unwrap_or_default()).await?;
    let mut tx = pool.begin().await?;
    let like: Option<Like> = sqlx::query_as(
        "INSERT INTO likes (track_id, user_id) VALUES ($1, $2) ON CONFLICT (track_id, user_id) DO NOTHING RETURNING *",
    )
    .bind(track.id)
    .bind(viewer)
    .fetch_optional(&mut *tx)
    .await?;
    let like = like.ok_or_else(|| AppError::Conflict("you already like this track".into()))?;
    let target = Target { post_id: None, track_id: Some(track.id) };
    notifications::notify(&mut *tx, track.artist_id, viewer, NotificationType::Like, target).await?;
    tx.commit().await?;
    Ok(like)
}

pub async fn get_like(pool: &PgPool, id: i64) -> Result<Like, AppError> {
    sqlx::query_as("SELECT * FROM likes WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("like {}", id)))
}

pub async fn delete_like(pool: &PgPool, viewer: i64, id: i64) -> Result<(), AppError> {
    let like = get_like(pool, id).await?;
    ensure_owner(like.user_id, viewer, "like")?;
    sqlx::query("DELETE FROM likes WHERE id = $1").bind(id).execute(pool).await?;
    Ok(())
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct PlaylistFilter {
    pub user: Option<i64>,
}

pub async fn list_playlists(pool: &PgPool, filter: &PlaylistFilter, page: Page) -> Result<Vec<Playlist>, AppError> {
    let rows = sqlx::query_as(
        "SELECT * FROM playlists WHERE ($1::bigint IS NULL OR user_id = $1) \
         ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3",
    )
    .bind(filter.user)
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn get_playlist(pool: &PgPool, id: i64) -> Result<Playlist, AppError> {
    sqlx::query_as("SELECT * FROM playlists WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("playlist {}", id)))
}

/// Fails with a field error naming the first id that is not a track.
async fn ensure_tracks_exist(conn: &mut PgConnection, field: &str, ids: &[i64]) -> Result<(), AppError> {
    if ids.is_empty() {
        return Ok(());
    }
    let found: Vec<(i64,)> = sqlx::query_as("SELECT id FROM tracks WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(&mut *conn)
        .await?;
    if let Some(missing) = ids.iter().find(|id| !found.iter().any(|(f,)| f == *id)) {
        return Err(AppError::invalid(field, format!("Invalid pk \"{}\" - object does not exist.", missing)));
    }
    Ok(())
}

/// Replaces the rows of a `(owner, track_id)` link table.
async fn replace_track_links(
    conn: &mut PgConnection,
    table: &'static str,
    owner_column: &'static str,
    owner: i64,
    track_ids: &[i64],
) -> Result<(), AppError> {
    ensure_tracks_exist(conn, "track_ids", track_ids).await?;
    let clear = format!("DELETE FROM {} WHERE {} = $1", table, owner_column);
    tracing::debug!(sql = %clear, owner, "query");
    sqlx::query(&clear).bind(owner).execute(&mut *conn).await?;
    let insert = format!(
        "INSERT INTO {} ({}, track_id) SELECT $1, UNNEST($2::bigint[]) ON CONFLICT DO NOTHING",
        table, owner_column
    );
    tracing::debug!(sql = %insert, owner, tracks = track_ids.len(), "query");
    sqlx::query(&insert).bind(owner).bind(track_ids).execute(&mut *conn).await?;
    Ok(())
}

pub async fn create_playlist(pool: &PgPool, viewer: i64, form: &FormData) -> Result<Playlist, AppError> {
    let name = form.trimmed("name");
    RequestValidator::new()
        .required("name", name.as_deref())
        .max_length("name", name.as_deref(), PLAYLIST_NAME_MAX)
        .finish()?;
    let track_ids = form.ids("track_ids")?.unwrap_or_default();
    let mut tx = pool.begin().await?;
    let playlist: Playlist = sqlx::query_as("INSERT INTO playlists (name, user_id) VALUES ($1, $2) RETURNING *")
        .bind(name)
        .bind(viewer)
        .fetch_one(&mut *tx)
        .await?;
    replace_track_links(&mut *tx, "playlist_tracks", "playlist_id", playlist.id, &track_ids).await?;
    tx.commit().await?;
    Ok(playlist)
}

pub async fn update_playlist(pool: &PgPool, viewer: i64, id: i64, form: &FormData) -> Result<Playlist, AppError> {
    let current = get_playlist(pool, id).await?;
    ensure_owner(current.user_id, viewer, "playlist")?;
    let name = form.trimmed("name");
    RequestValidator::new()
        .max_length("name", name.as_deref(), PLAYLIST_NAME_MAX)
        .finish()?;
    let track_ids = form.ids("track_ids")?;
    let mut tx = pool.begin().await?;
    let playlist: Playlist =
        sqlx::query_as("UPDATE playlists SET name = COALESCE($2, name), updated_at = NOW() WHERE id = $1 RETURNING *")
            .bind(id)
            .bind(name)
            .fetch_one(&mut *tx)
            .await?;
    if let Some(track_ids) = track_ids {
        replace_track_links(&mut *tx, "playlist_tracks", "playlist_id", id, &track_ids).await?;
    }
    tx.commit().await?;
    Ok(playlist)
}

pub async fn delete_playlist(pool: &PgPool, viewer: i64, id: i64) -> Result<(), AppError> {
    let current = get_playlist(pool, id).await?;
    ensure_owner(current.user_id, viewer, "playlist")?;
    sqlx::query("DELETE FROM playlists WHERE id = $1").bind(id).execute(pool).await?;
    Ok(())
}

pub async fn add_to_playlist(pool: &PgPool, viewer: i64, id: i64, form: &FormData) -> Result<Playlist, AppError> {
    let current = get_playlist(pool, id).await?;
    ensure_owner(current.user_id, viewer, "playlist")?;
    let track_id = form.parse::<i64>("track_id")?;
    RequestValidator::new().required("track_id", track_id).finish()?;
    let track_id = track_id.unwrap_or_default();
    let mut tx = pool.begin().await?;
    ensure_tracks_exist(&mut *tx, "track_id", &[track_id]).await?;
    sqlx::query("INSERT INTO playlist_tracks (playlist_id, track_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
        .bind(id)
        .bind(track_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("UPDATE playlists SET updated_at = NOW() WHERE id = $1").bind(id).execute(&mut *tx).await?;
    tx.commit().await?;
    Ok(current)
}

pub async fn remove_from_playlist(pool: &PgPool, viewer: i64, id: i64, track_id: i64) -> Result<Playlist, AppError> {
    let current = get_playlist(pool, id).await?;
    ensure_owner(current.user_id, viewer, "playlist")?;
    let done = sqlx::query("DELETE FROM playlist_tracks WHERE playlist_id = $1 AND track_id = $2")
        .bind(id)
        .bind(track_id)
        .execute(pool)
        .await?;
    if done.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("track {} in playlist {}", track_id, id)));
    }
    Ok(current)
}

pub async fn list_categories(pool: &PgPool, page: Page) -> Result<Vec<Category>, AppError> {
    let rows = sqlx::query_as("SELECT * FROM categories ORDER BY name LIMIT $1 OFFSET $2")
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

pub async fn get_category(pool: &PgPool, id: i64) -> Result<Category, AppError> {
    sqlx::query_as("SELECT * FROM categories WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("category {}", id)))
}

pub async fn create_category(pool: &PgPool, form: &FormData) -> Result<Category, AppError> {
    let name = form.trimmed("name");
    RequestValidator::new()
        .required("name", name.as_deref())
        .max_length("name", name.as_deref(), CATEGORY_NAME_MAX)
        .finish()?;
    let track_ids = form.ids("track_ids")?.unwrap_or_default();
    let mut tx = pool.begin().await?;
    let category: Category = sqlx::query_as("INSERT INTO categories (name) VALUES ($1) RETURNING *")
        .bind(name)
        .fetch_one(&mut *tx)
        .await?;
    replace_track_links(&mut *tx, "category_tracks", "category_id", category.id, &track_ids).await?;
    tx.commit().await?;
    Ok(category)
}

pub async fn update_category(pool: &PgPool, id: i64, form: &FormData) -> Result<Category, AppError> {
    get_category(pool, id).await?;
    let name = form.trimmed("name");
    RequestValidator::new()
        .max_length("name", name.as_deref(), CATEGORY_NAME_MAX)
        .finish()?;
    let track_ids = form.ids("track_ids")?;
    let mut tx = pool.begin().await?;
    let category: Category =
        sqlx::query_as("UPDATE categories SET name = COALESCE($2, name), updated_at = NOW() WHERE id = $1 RETURNING *")
            .bind(id)
            .bind(name)
            .fetch_one(&mut *tx)
            .await?;
    if let Some(track_ids) = track_ids {
        replace_track_links(&mut *tx, "category_tracks", "category_id", id, &track_ids).await?;
    }
    tx.commit().await?;
    Ok(category)
}

pub async fn delete_category(pool: &PgPool, id: i64) -> Result<(), AppError> {
    let done = sqlx::query("DELETE FROM categories WHERE id = $1").bind(id).execute(pool).await?;
    if done.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("category {}", id)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_filter_reads_query_string() {
        let f: TrackFilter = serde_json::from_value(serde_json::json!({ "artist": 3, "search": "grace" })).unwrap();
        assert_eq!(f.artist, Some(3));
        assert_eq!(f.search.as_deref(), Some("grace"));
        assert!(f.category.is_none());
    }

    #[test]
    fn comment_requires_content() {
        assert!(matches!(comment_content(&FormData::new()), Err(AppError::Validation(_))));
        let form = FormData::new().with_field("content", "  Beautiful  ");
        assert_eq!(comment_content(&form).unwrap(), "Beautiful");
    }
}
