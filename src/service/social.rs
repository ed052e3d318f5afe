//! Social posts and their engagement: likes, saves, comments.

use super::notifications::{self, Target};
use super::{
    discard_uploads, ensure_owner, parse_duration, validate_social_upload, Page, RequestValidator, SocialUpload,
    StagedUploads,
};
use crate::error::AppError;
use crate::extractors::FormData;
use crate::media::{self, dirs, MediaReader, MediaStore};
use crate::schema::{ContentType, NotificationType, PostComment, PostLike, PostSave, SocialPost};
use serde::Deserialize;
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgConnection, PgPool};

pub const TAGS_MAX: usize = 200;
pub const LOCATION_MAX: usize = 100;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct PostFilter {
    pub user: Option<i64>,
    pub content_type: Option<String>,
}

pub async fn list_posts(pool: &PgPool, filter: &PostFilter, page: Page) -> Result<Vec<SocialPost>, AppError> {
    let content_type = filter
        .content_type
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.parse::<ContentType>().map_err(|e| AppError::invalid("content_type", e)))
        .transpose()?;
    let sql = "SELECT * FROM social_posts WHERE ($1::bigint IS NULL OR user_id = $1) \
               AND ($2::text IS NULL OR content_type = $2) ORDER BY created_at DESC, id DESC LIMIT $3 OFFSET $4";
    tracing::debug!(sql, ?filter, "query");
    let rows = sqlx::query_as(sql)
        .bind(filter.user)
        .bind(content_type.map(ContentType::as_str))
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

pub async fn get_post(pool: &PgPool, id: i64) -> Result<SocialPost, AppError> {
    sqlx::query_as("SELECT * FROM social_posts WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("social post {}", id)))
}

/// Creates a post from a multipart upload after the media rules pass.
pub async fn create_post(
    pool: &PgPool,
    media: &dyn MediaStore,
    viewer: i64,
    form: &FormData,
) -> Result<SocialPost, AppError> {
    let mut v = RequestValidator::new();
    let raw_type = form.trimmed("content_type");
    let content_type = match raw_type.as_deref().map(str::parse::<ContentType>) {
        Some(Ok(ct)) => Some(ct),
        Some(Err(e)) => {
            v.fail("content_type", e);
            None
        }
        None => {
            v.required("content_type", None::<()>);
            None
        }
    };
    let file = form.file("media_file");
    v.required("media_file", file);

    let duration_seconds = match form.trimmed("duration") {
        Some(raw) => match parse_duration(&raw) {
            Ok(secs) => Some(secs),
            Err(e) => {
                v.fail("duration", e);
                None
            }
        },
        None => None,
    };

    let song_id = form.parse::<i64>("song")?;
    let song_audio: Option<String> = match song_id {
        Some(id) => {
            let row: Option<(String,)> = sqlx::query_as("SELECT audio_file FROM tracks WHERE id = $1")
                .bind(id)
                .fetch_optional(pool)
                .await?;
            match row {
                Some((audio,)) => Some(audio),
                None => {
                    v.fail("song", format!("Invalid pk \"{}\" - object does not exist.", id));
                    None
                }
            }
        }
        None => None,
    };

    let caption = form.text("caption").unwrap_or_default().to_string();
    let tags = form.trimmed("tags").unwrap_or_default();
    let location = form.trimmed("location").unwrap_or_default();
    v.max_length("tags", Some(tags.as_str()), TAGS_MAX)
        .max_length("location", Some(location.as_str()), LOCATION_MAX);

    if let (Some(ct), Some(f)) = (content_type, file) {
        let media_ext = media::extension(&f.file_name);
        let song_ext = song_audio.as_deref().map(media::extension);
        validate_social_upload(
            &SocialUpload {
                content_type: ct.as_str(),
                media_extension: media_ext.as_deref(),
                duration_seconds,
                song_extension: song_ext.as_ref().map(|e| e.as_deref()),
            },
            &mut v,
        );
    }
    v.finish()?;

    let content_type = content_type.ok_or_else(|| AppError::invalid("content_type", "This field is required."))?;
    let mut uploads = StagedUploads::new(media);
    let written = async {
        let stored = uploads
            .store(dirs::SOCIAL_MEDIA, file)
            .await?
            .ok_or_else(|| AppError::invalid("media_file", "This field is required."))?;
        let post: SocialPost = sqlx::query_as(
            "INSERT INTO social_posts (user_id, content_type, media_file, song_id, caption, tags, location, duration_seconds) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING *",
        )
        .bind(viewer)
        .bind(content_type.as_str())
        .bind(stored)
        .bind(song_id)
        .bind(caption)
        .bind(tags)
        .bind(location)
        .bind(duration_seconds)
        .fetch_one(pool)
        .await?;
        Ok::<_, AppError>(post)
    }
    .await;
    let post = uploads.settle(written).await?;
    tracing::info!(post_id = post.id, user_id = viewer, content_type = content_type.as_str(), "social post created");
    Ok(post)
}

/// Owner edit of the text fields. Content type and media stay as uploaded.
pub async fn update_post(pool: &PgPool, viewer: i64, id: i64, form: &FormData) -> Result<SocialPost, AppError> {
    let current = get_post(pool, id).await?;
    ensure_owner(current.user_id, viewer, "post")?;
    let tags = form.trimmed("tags");
    let location = form.trimmed("location");
    RequestValidator::new()
        .max_length("tags", tags.as_deref(), TAGS_MAX)
        .max_length("location", location.as_deref(), LOCATION_MAX)
        .finish()?;
    let post = sqlx::query_as(
        "UPDATE social_posts SET caption = COALESCE($2, caption), tags = COALESCE($3, tags), \
         location = COALESCE($4, location), updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(form.text("caption"))
    .bind(tags)
    .bind(location)
    .fetch_one(pool)
    .await?;
    Ok(post)
}

pub async fn delete_post(pool: &PgPool, media: &dyn MediaStore, viewer: i64, id: i64) -> Result<(), AppError> {
    let current = get_post(pool, id).await?;
    ensure_owner(current.user_id, viewer, "post")?;
    sqlx::query("DELETE FROM social_posts WHERE id = $1").bind(id).execute(pool).await?;
    discard_uploads(media, [Some(current.media_file)]).await;
    tracing::info!(post_id = id, "social post deleted");
    Ok(())
}

pub async fn download_post(pool: &PgPool, media: &dyn MediaStore, id: i64) -> Result<(SocialPost, MediaReader), AppError> {
    let post = get_post(pool, id).await?;
    let file = media.reader(&post.media_file).await?;
    Ok((post, file))
}

/// The two per-user marks a post can carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Engagement {
    Like,
    Save,
}

impl Engagement {
    fn table(self) -> &'static str {
        match self {
            Engagement::Like => "post_likes",
            Engagement::Save => "post_saves",
        }
    }

    fn notification(self) -> NotificationType {
        match self {
            Engagement::Like => NotificationType::Like,
            Engagement::Save => NotificationType::Save,
        }
    }

    fn noun(self) -> &'static str {
        match self {
            Engagement::Like => "post like",
            Engagement::Save => "post save",
        }
    }
}

async fn notify_author(conn: &mut PgConnection, post: &SocialPost, viewer: i64, kind: NotificationType) -> Result<(), AppError> {
    let target = Target { post_id: Some(post.id), track_id: None };
    notifications::notify(conn, post.user_id, viewer, kind, target).await
}

/// Flips the viewer's like or save on a post. Returns the new state and the post's count for that mark.
pub async fn toggle(pool: &PgPool, viewer: i64, post_id: i64, mark: Engagement) -> Result<(bool, i64), AppError> {
    let post = get_post(pool, post_id).await?;
    let table = mark.table();
    let mut tx = pool.begin().await?;
    let delete = format!("DELETE FROM {} WHERE post_id = $1 AND user_id = $2", table);
    tracing::debug!(sql = %delete, post_id, viewer, "query");
    let removed = sqlx::query(&delete).bind(post_id).bind(viewer).execute(&mut *tx).await?;
    let on = removed.rows_affected() == 0;
    if on {
        let insert = format!("INSERT INTO {} (post_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING", table);
        tracing::debug!(sql = %insert, post_id, viewer, "query");
        sqlx::query(&insert).bind(post_id).bind(viewer).execute(&mut *tx).await?;
        notify_author(&mut *tx, &post, viewer, mark.notification()).await?;
    }
    let count_sql = format!("SELECT COUNT(*) FROM {} WHERE post_id = $1", table);
    let (count,): (i64,) = sqlx::query_as(&count_sql).bind(post_id).fetch_one(&mut *tx).await?;
    tx.commit().await?;
    Ok((on, count))
}

/// The viewer's likes or saves, newest first.
pub async fn list_marks<T>(pool: &PgPool, viewer: i64, mark: Engagement, page: Page) -> Result<Vec<T>, AppError>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    let sql = format!(
        "SELECT * FROM {} WHERE user_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3",
        mark.table()
    );
    tracing::debug!(sql = %sql, viewer, "query");
    let rows = sqlx::query_as(&sql)
        .bind(viewer)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Explicit create from `{post}`; a repeat is a conflict.
pub async fn create_mark<T>(pool: &PgPool, viewer: i64, mark: Engagement, form: &FormData) -> Result<T, AppError>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    let post_id = form.parse::<i64>("post")?;
    RequestValidator::new().required("post", post_id).finish()?;
    let post = get_post(pool, post_id.unwrap_or_default()).await?;
    let mut tx = pool.begin().await?;
    let sql = format!(
        "INSERT INTO {} (post_id, user_id) VALUES ($1, $2) ON CONFLICT (post_id, user_id) DO NOTHING RETURNING *",
        mark.table()
    );
    tracing::debug!(sql = %sql, post_id = post.id, viewer, "query");
    let row: Option<T> = sqlx::query_as(&sql).bind(post.id).bind(viewer).fetch_optional(&mut *tx).await?;
    let row = row.ok_or_else(|| {
        tracing::warn!(post_id = post.id, viewer, mark = mark.noun(), "duplicate engagement rejected");
        AppError::Conflict(format!("{} already exists", mark.noun()))
    })?;
    notify_author(&mut *tx, &post, viewer, mark.notification()).await?;
    tx.commit().await?;
    Ok(row)
}

async fn mark_owner(pool: &PgPool, mark: Engagement, id: i64) -> Result<i64, AppError> {
    let sql = format!("SELECT user_id FROM {} WHERE id = $1", mark.table());
    let row: Option<(i64,)> = sqlx::query_as(&sql).bind(id).fetch_optional(pool).await?;
    row.map(|(u,)| u).ok_or_else(|| AppError::NotFound(format!("{} {}", mark.noun(), id)))
}

pub async fn get_mark<T>(pool: &PgPool, mark: Engagement, id: i64) -> Result<T, AppError>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    let sql = format!("SELECT * FROM {} WHERE id = $1", mark.table());
    sqlx::query_as(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} {}", mark.noun(), id)))
}

pub async fn delete_mark(pool: &PgPool, viewer: i64, mark: Engagement, id: i64) -> Result<(), AppError> {
    ensure_owner(mark_owner(pool, mark, id).await?, viewer, mark.noun())?;
    let sql = format!("DELETE FROM {} WHERE id = $1", mark.table());
    sqlx::query(&sql).bind(id).execute(pool).await?;
    Ok(())
}

pub async fn list_likes(pool: &PgPool, viewer: i64, page: Page) -> Result<Vec<PostLike>, AppError> {
    list_marks(pool, viewer, Engagement::Like, page).await
}

pub async fn list_saves(pool: &PgPool, viewer: i64, page: Page) -> Result<Vec<PostSave>, AppError> {
    list_marks(pool, viewer, Engagement::Save, page).await
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct CommentFilter {
    pub post: Option<i64>,
}

pub async fn list_comments(pool: &PgPool, filter: &CommentFilter, page: Page) -> Result<Vec<PostComment>, AppError> {
    let rows = sqlx::query_as(
        "SELECT * FROM post_comments WHERE ($1::bigint IS NULL OR post_id = $1) \
         ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3",
    )
    .bind(filter.post)
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Comments under one post.
pub async fn post_comments(pool: &PgPool, post_id: i64, page: Page) -> Result<Vec<PostComment>, AppError> {
    get_post(pool, post_id).await?;
    list_comments(pool, &CommentFilter { post: Some(post_id) }, page).await
}

fn comment_content(form: &FormData) -> Result<String, AppError> {
    let content = form.trimmed("content");
    RequestValidator::new().required("content", content.as_deref()).finish()?;
    Ok(content.unwrap_or_default())
}

/// Adds a comment and notifies the post author.
pub async fn add_comment(pool: &PgPool, viewer: i64, post_id: i64, form: &FormData) -> Result<PostComment, AppError> {
    let content = comment_content(form)?;
    let post = get_post(pool, post_id).await?;
    let mut tx = pool.begin().await?;
    let comment: PostComment =
        sqlx::query_as("INSERT INTO post_comments (post_id, user_id, content) VALUES ($1, $2, $3) RETURNING *")
            .bind(post_id)
            .bind(viewer)
            .bind(content)
            .fetch_one(&mut *tx)
            .await?;
    notify_author(&mut *tx, &post, viewer, NotificationType::Comment).await?;
    tx.commit().await?;
    Ok(comment)
}

/// Collection-style create: the post comes from the body.
pub async fn create_comment(pool: &PgPool, viewer: i64, form: &FormData) -> Result<PostComment, AppError> {
    let post_id = form.parse::<i64>("post")?;
    let content = form.trimmed("content");
    RequestValidator::new()
        .required("post", post_id)
        .required("content", content.as_deref())
        .finish()?;
    add_comment(pool, viewer, post_id.unwrap_or_default(), form).await
}

pub async fn get_comment(pool: &PgPool, id: i64) -> Result<PostComment, AppError> {
    sqlx::query_as("SELECT * FROM post_comments WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("post comment {}", id)))
}

pub async fn update_comment(pool: &PgPool, viewer: i64, id: i64, form: &FormData) -> Result<PostComment, AppError> {
    let current = get_comment(pool, id).await?;
    ensure_owner(current.user_id, viewer, "comment")?;
    let content = comment_content(form)?;
    let comment = sqlx::query_as("UPDATE post_comments SET content = $2 WHERE id = $1 RETURNING *")
        .bind(id)
        .bind(content)
        .fetch_one(pool)
        .await?;
    Ok(comment)
}

pub async fn delete_comment(pool: &PgPool, viewer: i64, id: i64) -> Result<(), AppError> {
    let current = get_comment(pool, id).await?;
    ensure_owner(current.user_id, viewer, "comment")?;
    sqlx::query("DELETE FROM post_comments WHERE id = $1").bind(id).execute(pool).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engagement_tables_and_notifications() {
        assert_eq!(Engagement::Like.table(), "post_likes");
        assert_eq!(Engagement::Save.table(), "post_saves");
        assert_eq!(Engagement::Save.notification(), NotificationType::Save);
    }

    #[test]
    fn comment_content_is_trimmed_and_required() {
        let form = FormData::new().with_field("content", "   ");
        assert!(matches!(comment_content(&form), Err(AppError::Validation(_))));
        let form = FormData::new().with_field("content", " amen ");
        assert_eq!(comment_content(&form).unwrap(), "amen");
    }
}
