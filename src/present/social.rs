//! Social posts, their engagement rows, and notifications.

use super::{counts, music::track_map, unique_ids, users::user_map, viewer_hits, TrackView, UserView};
use crate::error::AppError;
use crate::extractors::ViewContext;
use crate::schema::{Notification, PostComment, PostLike, PostSave, SocialPost};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use std::collections::HashMap;

const POST_LIKES: &str = "SELECT post_id, COUNT(*) FROM post_likes WHERE post_id = ANY($1) GROUP BY post_id";
const POST_COMMENTS: &str = "SELECT post_id, COUNT(*) FROM post_comments WHERE post_id = ANY($1) GROUP BY post_id";
const POST_LIKED: &str = "SELECT post_id FROM post_likes WHERE post_id = ANY($1) AND user_id = $2";
const POST_SAVED: &str = "SELECT post_id FROM post_saves WHERE post_id = ANY($1) AND user_id = $2";
const FIRST_COMMENTS: &str = "SELECT DISTINCT ON (post_id, user_id) post_id, user_id, content \
     FROM post_comments WHERE post_id = ANY($1) ORDER BY post_id, user_id, created_at, id";

#[derive(Clone, Debug, Serialize)]
pub struct SocialPostView {
    pub id: i64,
    pub user: UserView,
    pub content_type: String,
    pub media_file: String,
    pub media_url: Option<String>,
    pub song: Option<TrackView>,
    pub caption: String,
    pub tags: String,
    pub location: String,
    pub duration: Option<f64>,
    pub likes_count: i64,
    pub comments_count: i64,
    pub is_liked: bool,
    pub is_saved: bool,
    pub can_edit: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct PostStats {
    pub likes: i64,
    pub comments: i64,
    pub viewer_liked: bool,
    pub viewer_saved: bool,
}

impl SocialPostView {
    pub fn build(ctx: &ViewContext, p: SocialPost, user: UserView, song: Option<TrackView>, stats: PostStats) -> Self {
        SocialPostView {
            media_url: ctx.media_url(Some(&p.media_file)),
            can_edit: ctx.is_viewer(p.user_id),
            is_liked: ctx.flag(stats.viewer_liked),
            is_saved: ctx.flag(stats.viewer_saved),
            likes_count: stats.likes,
            comments_count: stats.comments,
            id: p.id,
            user,
            content_type: p.content_type,
            media_file: p.media_file,
            song,
            caption: p.caption,
            tags: p.tags,
            location: p.location,
            duration: p.duration_seconds,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

pub async fn post_views(pool: &PgPool, ctx: &ViewContext, rows: Vec<SocialPost>) -> Result<Vec<SocialPostView>, AppError> {
    let ids: Vec<i64> = rows.iter().map(|p| p.id).collect();
    let users = user_map(pool, ctx, &unique_ids(rows.iter().map(|p| p.user_id))).await?;
    let songs = track_map(pool, ctx, &unique_ids(rows.iter().filter_map(|p| p.song_id))).await?;
    let likes = counts(pool, POST_LIKES, &ids).await?;
    let comments = counts(pool, POST_COMMENTS, &ids).await?;
    let liked = viewer_hits(pool, POST_LIKED, &ids, ctx.viewer).await?;
    let saved = viewer_hits(pool, POST_SAVED, &ids, ctx.viewer).await?;
    Ok(rows
        .into_iter()
        .filter_map(|p| {
            let user = users.get(&p.user_id)?.clone();
            let song = p.song_id.and_then(|id| songs.get(&id).cloned());
            let stats = PostStats {
                likes: likes.get(&p.id).copied().unwrap_or(0),
                comments: comments.get(&p.id).copied().unwrap_or(0),
                viewer_liked: liked.contains(&p.id),
                viewer_saved: saved.contains(&p.id),
            };
            Some(SocialPostView::build(ctx, p, user, song, stats))
        })
        .collect())
}

pub async fn post_map(pool: &PgPool, ctx: &ViewContext, ids: &[i64]) -> Result<HashMap<i64, SocialPostView>, AppError> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows: Vec<SocialPost> = sqlx::query_as("SELECT * FROM social_posts WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(pool)
        .await?;
    Ok(post_views(pool, ctx, rows).await?.into_iter().map(|v| (v.id, v)).collect())
}

pub async fn post_view(pool: &PgPool, ctx: &ViewContext, row: SocialPost) -> Result<SocialPostView, AppError> {
    super::single(post_views(pool, ctx, vec![row]).await?, "social post")
}

/// Shape shared by post likes and post saves.
#[derive(Clone, Debug, Serialize)]
pub struct PostEngagementView {
    pub id: i64,
    pub user: UserView,
    pub post: SocialPostView,
    pub created_at: DateTime<Utc>,
}

pub type PostLikeView = PostEngagementView;
pub type PostSaveView = PostEngagementView;

async fn engagement_views(
    pool: &PgPool,
    ctx: &ViewContext,
    rows: Vec<(i64, i64, i64, DateTime<Utc>)>,
) -> Result<Vec<PostEngagementView>, AppError> {
    let users = user_map(pool, ctx, &unique_ids(rows.iter().map(|r| r.2))).await?;
    let posts = post_map(pool, ctx, &unique_ids(rows.iter().map(|r| r.1))).await?;
    Ok(rows
        .into_iter()
        .filter_map(|(id, post_id, user_id, created_at)| {
            Some(PostEngagementView {
                id,
                user: users.get(&user_id)?.clone(),
                post: posts.get(&post_id)?.clone(),
                created_at,
            })
        })
        .collect())
}

pub async fn post_like_views(pool: &PgPool, ctx: &ViewContext, rows: Vec<PostLike>) -> Result<Vec<PostLikeView>, AppError> {
    let rows = rows.into_iter().map(|r| (r.id, r.post_id, r.user_id, r.created_at)).collect();
    engagement_views(pool, ctx, rows).await
}

pub async fn post_save_views(pool: &PgPool, ctx: &ViewContext, rows: Vec<PostSave>) -> Result<Vec<PostSaveView>, AppError> {
    let rows = rows.into_iter().map(|r| (r.id, r.post_id, r.user_id, r.created_at)).collect();
    engagement_views(pool, ctx, rows).await
}

#[derive(Clone, Debug, Serialize)]
pub struct PostCommentView {
    pub id: i64,
    pub user: UserView,
    pub post: SocialPostView,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

pub async fn post_comment_views(
    pool: &PgPool,
    ctx: &ViewContext,
    rows: Vec<PostComment>,
) -> Result<Vec<PostCommentView>, AppError> {
    let users = user_map(pool, ctx, &unique_ids(rows.iter().map(|c| c.user_id))).await?;
    let posts = post_map(pool, ctx, &unique_ids(rows.iter().map(|c| c.post_id))).await?;
    Ok(rows
        .into_iter()
        .filter_map(|c| {
            Some(PostCommentView {
                user: users.get(&c.user_id)?.clone(),
                post: posts.get(&c.post_id)?.clone(),
                id: c.id,
                content: c.content,
                created_at: c.created_at,
            })
        })
        .collect())
}

pub async fn post_comment_view(pool: &PgPool, ctx: &ViewContext, row: PostComment) -> Result<PostCommentView, AppError> {
    super::single(post_comment_views(pool, ctx, vec![row]).await?, "post comment")
}

#[derive(Clone, Debug, Serialize)]
pub struct NotificationView {
    pub id: i64,
    pub sender: UserView,
    pub message: String,
    pub read: bool,
    pub notification_type: String,
    pub post: Option<SocialPostView>,
    pub track: Option<TrackView>,
    pub related_comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NotificationView {
    pub fn build(
        n: Notification,
        sender: UserView,
        post: Option<SocialPostView>,
        track: Option<TrackView>,
        first_comments: &HashMap<(i64, i64), String>,
    ) -> Self {
        let related_comment = match (n.notification_type.as_str(), n.post_id) {
            ("comment", Some(post_id)) => first_comments.get(&(post_id, n.sender_id)).cloned(),
            _ => None,
        };
        NotificationView {
            id: n.id,
            sender,
            message: n.message,
            read: n.read,
            notification_type: n.notification_type,
            post,
            track,
            related_comment,
            created_at: n.created_at,
        }
    }
}

pub async fn notification_views(
    pool: &PgPool,
    ctx: &ViewContext,
    rows: Vec<Notification>,
) -> Result<Vec<NotificationView>, AppError> {
    let senders = user_map(pool, ctx, &unique_ids(rows.iter().map(|n| n.sender_id))).await?;
    let post_ids = unique_ids(rows.iter().filter_map(|n| n.post_id));
    let posts = post_map(pool, ctx, &post_ids).await?;
    let tracks = track_map(pool, ctx, &unique_ids(rows.iter().filter_map(|n| n.track_id))).await?;
    let commented: Vec<i64> = unique_ids(
        rows.iter()
            .filter(|n| n.notification_type == "comment")
            .filter_map(|n| n.post_id),
    );
    let first_comments: HashMap<(i64, i64), String> = if commented.is_empty() {
        HashMap::new()
    } else {
        let found: Vec<(i64, i64, String)> = sqlx::query_as(FIRST_COMMENTS).bind(&commented).fetch_all(pool).await?;
        found.into_iter().map(|(p, u, c)| ((p, u), c)).collect()
    };
    Ok(rows
        .into_iter()
        .filter_map(|n| {
            let sender = senders.get(&n.sender_id)?.clone();
            let post = n.post_id.and_then(|id| posts.get(&id).cloned());
            let track = n.track_id.and_then(|id| tracks.get(&id).cloned());
            Some(NotificationView::build(n, sender, post, track, &first_comments))
        })
        .collect())
}

pub async fn notification_view(pool: &PgPool, ctx: &ViewContext, row: Notification) -> Result<NotificationView, AppError> {
    super::single(notification_views(pool, ctx, vec![row]).await?, "notification")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::present::users::FollowStats;
    use crate::schema::User;

    fn user_view(ctx: &ViewContext, id: i64) -> UserView {
        let u = User {
            id,
            username: format!("user{id}"),
            email: String::new(),
            password_hash: String::new(),
            bio: String::new(),
            avatar: None,
            date_joined: Utc::now(),
        };
        UserView::build(ctx, u, None, FollowStats::default())
    }

    fn post(owner: i64) -> SocialPost {
        SocialPost {
            id: 11,
            user_id: owner,
            content_type: "video".into(),
            media_file: "social_media/clip.mp4".into(),
            song_id: None,
            caption: "choir rehearsal".into(),
            tags: String::new(),
            location: String::new(),
            duration_seconds: Some(42.0),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn only_owner_can_edit() {
        let owner_ctx = ViewContext::new(Some(1), None);
        let other_ctx = ViewContext::new(Some(2), None);
        let stats = PostStats::default();
        assert!(SocialPostView::build(&owner_ctx, post(1), user_view(&owner_ctx, 1), None, stats).can_edit);
        assert!(!SocialPostView::build(&other_ctx, post(1), user_view(&other_ctx, 1), None, stats).can_edit);
    }

    #[test]
    fn anonymous_sees_counts_but_no_flags() {
        let ctx = ViewContext::anonymous();
        let stats = PostStats { likes: 4, comments: 2, viewer_liked: true, viewer_saved: true };
        let view = SocialPostView::build(&ctx, post(1), user_view(&ctx, 1), None, stats);
        assert_eq!((view.likes_count, view.comments_count), (4, 2));
        assert!(!view.is_liked && !view.is_saved && !view.can_edit);
        assert_eq!(view.media_url, None);
        assert_eq!(view.media_file, "social_media/clip.mp4");
    }

    #[test]
    fn related_comment_only_for_comment_notifications() {
        let ctx = ViewContext::anonymous();
        let mut first = HashMap::new();
        first.insert((11, 2), "Amen!".to_string());
        let mut n = Notification {
            id: 1,
            recipient_id: 1,
            sender_id: 2,
            message: "user2 commented on your post".into(),
            read: false,
            notification_type: "comment".into(),
            post_id: Some(11),
            track_id: None,
            created_at: Utc::now(),
        };
        let view = NotificationView::build(n.clone(), user_view(&ctx, 2), None, None, &first);
        assert_eq!(view.related_comment.as_deref(), Some("Amen!"));
        n.notification_type = "like".into();
        let view = NotificationView::build(n, user_view(&ctx, 2), None, None, &first);
        assert_eq!(view.related_comment, None);
    }
}
