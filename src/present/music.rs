//! Tracks and the collections around them: playlists, comments, likes, categories.

use super::{counts, group_by, unique_ids, users::user_map, viewer_hits, UserView};
use crate::error::AppError;
use crate::extractors::ViewContext;
use crate::schema::{Category, Comment, Like, Playlist, Track};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use std::collections::HashMap;

const LIKES: &str = "SELECT track_id, COUNT(*) FROM likes WHERE track_id = ANY($1) GROUP BY track_id";
const LIKED: &str = "SELECT track_id FROM likes WHERE track_id = ANY($1) AND user_id = $2";
const TRACK_CATEGORIES: &str = "SELECT ct.track_id, c.name FROM category_tracks ct \
     JOIN categories c ON c.id = ct.category_id WHERE ct.track_id = ANY($1) ORDER BY c.name";
const CATEGORY_TRACKS: &str =
    "SELECT category_id, COUNT(*) FROM category_tracks WHERE category_id = ANY($1) GROUP BY category_id";
const PLAYLIST_TRACKS: &str = "SELECT pt.playlist_id, pt.track_id FROM playlist_tracks pt \
     JOIN tracks t ON t.id = pt.track_id WHERE pt.playlist_id = ANY($1) ORDER BY t.created_at DESC, t.id DESC";

#[derive(Clone, Debug, Serialize)]
pub struct TrackView {
    pub id: i64,
    pub title: String,
    pub artist: UserView,
    pub album: Option<String>,
    pub audio_file: Option<String>,
    pub cover_image: Option<String>,
    pub lyrics: Option<String>,
    pub slug: String,
    pub views: i64,
    pub downloads: i64,
    pub likes_count: i64,
    pub is_liked: bool,
    pub is_owner: bool,
    pub categories: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default)]
pub struct TrackStats {
    pub likes: i64,
    pub viewer_liked: bool,
    pub categories: Vec<String>,
}

impl TrackView {
    pub fn build(ctx: &ViewContext, t: Track, artist: UserView, stats: TrackStats) -> Self {
        TrackView {
            audio_file: ctx.media_url(Some(&t.audio_file)),
            cover_image: ctx.media_url(t.cover_image.as_deref()),
            is_owner: ctx.is_viewer(t.artist_id),
            is_liked: ctx.flag(stats.viewer_liked),
            likes_count: stats.likes,
            categories: stats.categories,
            id: t.id,
            title: t.title,
            artist,
            album: t.album,
            lyrics: t.lyrics,
            slug: t.slug,
            views: t.views,
            downloads: t.downloads,
            created_at: t.created_at,
            updated_at: t.updated_at,
        }
    }
}

pub async fn track_views(pool: &PgPool, ctx: &ViewContext, rows: Vec<Track>) -> Result<Vec<TrackView>, AppError> {
    let ids: Vec<i64> = rows.iter().map(|t| t.id).collect();
    let artists = user_map(pool, ctx, &unique_ids(rows.iter().map(|t| t.artist_id))).await?;
    let likes = counts(pool, LIKES, &ids).await?;
    let liked = viewer_hits(pool, LIKED, &ids, ctx.viewer).await?;
    let mut categories = if ids.is_empty() {
        HashMap::new()
    } else {
        let pairs: Vec<(i64, String)> = sqlx::query_as(TRACK_CATEGORIES).bind(&ids).fetch_all(pool).await?;
        group_by(pairs)
    };
    Ok(rows
        .into_iter()
        .filter_map(|t| {
            let artist = artists.get(&t.artist_id)?.clone();
            let stats = TrackStats {
                likes: likes.get(&t.id).copied().unwrap_or(0),
                viewer_liked: liked.contains(&t.id),
                categories: categories.remove(&t.id).unwrap_or_default(),
            };
            Some(TrackView::build(ctx, t, artist, stats))
        })
        .collect())
}

pub async fn track_map(pool: &PgPool, ctx: &ViewContext, ids: &[i64]) -> Result<HashMap<i64, TrackView>, AppError> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows: Vec<Track> = sqlx::query_as("SELECT * FROM tracks WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(pool)
        .await?;
    Ok(track_views(pool, ctx, rows).await?.into_iter().map(|v| (v.id, v)).collect())
}

pub async fn track_view(pool: &PgPool, ctx: &ViewContext, row: Track) -> Result<TrackView, AppError> {
    super::single(track_views(pool, ctx, vec![row]).await?, "track")
}

#[derive(Clone, Debug, Serialize)]
pub struct PlaylistView {
    pub id: i64,
    pub name: String,
    pub user: UserView,
    pub tracks: Vec<TrackView>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub async fn playlist_views(
    pool: &PgPool,
    ctx: &ViewContext,
    rows: Vec<Playlist>,
) -> Result<Vec<PlaylistView>, AppError> {
    let ids: Vec<i64> = rows.iter().map(|p| p.id).collect();
    let owners = user_map(pool, ctx, &unique_ids(rows.iter().map(|p| p.user_id))).await?;
    let members: Vec<(i64, i64)> = if ids.is_empty() {
        Vec::new()
    } else {
        sqlx::query_as(PLAYLIST_TRACKS).bind(&ids).fetch_all(pool).await?
    };
    let tracks = track_map(pool, ctx, &unique_ids(members.iter().map(|(_, t)| *t))).await?;
    let mut by_playlist = group_by(members);
    Ok(rows
        .into_iter()
        .filter_map(|p| {
            let user = owners.get(&p.user_id)?.clone();
            let tracks = by_playlist
                .remove(&p.id)
                .unwrap_or_default()
                .iter()
                .filter_map(|id| tracks.get(id).cloned())
                .collect();
            Some(PlaylistView {
                id: p.id,
                name: p.name,
                user,
                tracks,
                created_at: p.created_at,
                updated_at: p.updated_at,
            })
        })
        .collect())
}

pub async fn playlist_view(pool: &PgPool, ctx: &ViewContext, row: Playlist) -> Result<PlaylistView, AppError> {
    super::single(playlist_views(pool, ctx, vec![row]).await?, "playlist")
}

#[derive(Clone, Debug, Serialize)]
pub struct CommentView {
    pub id: i64,
    pub content: String,
    pub user: UserView,
    pub track: TrackView,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub async fn comment_views(pool: &PgPool, ctx: &ViewContext, rows: Vec<Comment>) -> Result<Vec<CommentView>, AppError> {
    let users = user_map(pool, ctx, &unique_ids(rows.iter().map(|c| c.user_id))).await?;
    let tracks = track_map(pool, ctx, &unique_ids(rows.iter().map(|c| c.track_id))).await?;
    Ok(rows
        .into_iter()
        .filter_map(|c| {
            Some(CommentView {
                user: users.get(&c.user_id)?.clone(),
                track: tracks.get(&c.track_id)?.clone(),
                id: c.id,
                content: c.content,
                created_at: c.created_at,
                updated_at: c.updated_at,
            })
        })
        .collect())
}

pub async fn comment_view(pool: &PgPool, ctx: &ViewContext, row: Comment) -> Result<CommentView, AppError> {
    super::single(comment_views(pool, ctx, vec![row]).await?, "comment")
}

#[derive(Clone, Debug, Serialize)]
pub struct LikeView {
    pub id: i64,
    pub user: UserView,
    pub track: TrackView,
    pub created_at: DateTime<Utc>,
}

pub async fn like_views(pool: &PgPool, ctx: &ViewContext, rows: Vec<Like>) -> Result<Vec<LikeView>, AppError> {
    let users = user_map(pool, ctx, &unique_ids(rows.iter().map(|l| l.user_id))).await?;
    let tracks = track_map(pool, ctx, &unique_ids(rows.iter().map(|l| l.track_id))).await?;
    Ok(rows
        .into_iter()
        .filter_map(|l| {
            Some(LikeView {
                user: users.get(&l.user_id)?.clone(),
                track: tracks.get(&l.track_id)?.clone(),
                id: l.id,
                created_at: l.created_at,
            })
        })
        .collect())
}

pub async fn like_view(pool: &PgPool, ctx: &ViewContext, row: Like) -> Result<LikeView, AppError> {
    super::single(like_views(pool, ctx, vec![row]).await?, "like")
}

#[derive(Clone, Debug, Serialize)]
pub struct CategoryView {
    pub id: i64,
    pub name: String,
    pub tracks_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub async fn category_views(pool: &PgPool, rows: Vec<Category>) -> Result<Vec<CategoryView>, AppError> {
    let ids: Vec<i64> = rows.iter().map(|c| c.id).collect();
    let tracks = counts(pool, CATEGORY_TRACKS, &ids).await?;
    Ok(rows
        .into_iter()
        .map(|c| CategoryView {
            tracks_count: tracks.get(&c.id).copied().unwrap_or(0),
            id: c.id,
            name: c.name,
            created_at: c.created_at,
            updated_at: c.updated_at,
        })
        .collect())
}

pub async fn category_view(pool: &PgPool, row: Category) -> Result<CategoryView, AppError> {
    super::single(category_views(pool, vec![row]).await?, "category")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::present::users::FollowStats;
    use crate::schema::User;

    fn artist(ctx: &ViewContext) -> UserView {
        let u = User {
            id: 9,
            username: "asaph".into(),
            email: String::new(),
            password_hash: String::new(),
            bio: String::new(),
            avatar: None,
            date_joined: Utc::now(),
        };
        UserView::build(ctx, u, None, FollowStats::default())
    }

    fn track() -> Track {
        Track {
            id: 1,
            title: "Psalm 23".into(),
            artist_id: 9,
            album: None,
            audio_file: "audio/abc-psalm.mp3".into(),
            cover_image: None,
            lyrics: None,
            slug: "psalm-23".into(),
            views: 12,
            downloads: 3,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn owner_and_like_flags_follow_viewer() {
        let ctx = ViewContext::new(Some(9), Some("http://h".into()));
        let stats = TrackStats { likes: 2, viewer_liked: true, categories: vec!["Gospel".into()] };
        let view = TrackView::build(&ctx, track(), artist(&ctx), stats);
        assert!(view.is_owner);
        assert!(view.is_liked);
        assert_eq!(view.likes_count, 2);
        assert_eq!(view.audio_file.as_deref(), Some("http://h/media/audio/abc-psalm.mp3"));
        assert_eq!(view.cover_image, None);
    }

    #[test]
    fn anonymous_track_view_has_no_flags() {
        let ctx = ViewContext::anonymous();
        let stats = TrackStats { likes: 5, viewer_liked: true, categories: vec![] };
        let view = TrackView::build(&ctx, track(), artist(&ctx), stats);
        assert!(!view.is_owner);
        assert!(!view.is_liked);
        assert_eq!(view.audio_file, None);
    }
}
