//! Tracks, playlists, track comments, likes, and categories.

use super::{attachment, no_content};
use crate::error::AppError;
use crate::extractors::{AuthUser, FormData, ViewContext};
use crate::media;
use crate::present::{music as views, CategoryView, CommentView, LikeView, PlaylistView, TrackView};
use crate::response::{created, many, ok, Many, One};
use crate::service::music::{self, PlaylistFilter, TrackFilter};
use crate::service::Page;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Response,
};
use serde::Serialize;

pub async fn list_tracks(
    State(state): State<AppState>,
    ctx: ViewContext,
    Query(filter): Query<TrackFilter>,
    Query(page): Query<Page>,
) -> Result<Many<TrackView>, AppError> {
    let rows = music::list_tracks(&state.pool, &filter, page).await?;
    Ok(many(views::track_views(&state.pool, &ctx, rows).await?))
}

pub async fn create_track(
    State(state): State<AppState>,
    ctx: ViewContext,
    AuthUser(viewer): AuthUser,
    form: FormData,
) -> Result<One<TrackView>, AppError> {
    let track = music::create_track(&state.pool, state.media.as_ref(), viewer, &form).await?;
    Ok(created(views::track_view(&state.pool, &ctx, track).await?))
}

pub async fn read_track(
    State(state): State<AppState>,
    ctx: ViewContext,
    Path(id): Path<i64>,
) -> Result<One<TrackView>, AppError> {
    let track = music::view_track(&state.pool, id).await?;
    Ok(ok(views::track_view(&state.pool, &ctx, track).await?))
}

pub async fn update_track(
    State(state): State<AppState>,
    ctx: ViewContext,
    AuthUser(viewer): AuthUser,
    Path(id): Path<i64>,
    form: FormData,
) -> Result<One<TrackView>, AppError> {
    let track = music::update_track(&state.pool, state.media.as_ref(), viewer, id, &form).await?;
    Ok(ok(views::track_view(&state.pool, &ctx, track).await?))
}

pub async fn delete_track(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    music::delete_track(&state.pool, state.media.as_ref(), viewer, id).await?;
    Ok(no_content())
}

pub async fn download_track(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Response, AppError> {
    let (track, audio) = music::download_track(&state.pool, state.media.as_ref(), id).await?;
    let name = match media::extension(&track.audio_file) {
        Some(ext) => format!("{}.{}", track.slug, ext),
        None => media::file_name(&track.audio_file).to_string(),
    };
    Ok(attachment(&name, audio))
}

#[derive(Serialize)]
pub struct LikeState {
    pub liked: bool,
    pub likes_count: i64,
}

pub async fn toggle_like(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    Path(id): Path<i64>,
) -> Result<One<LikeState>, AppError> {
    let (liked, likes_count) = music::toggle_favorite(&state.pool, viewer, id).await?;
    Ok(ok(LikeState { liked, likes_count }))
}

pub async fn favorites(
    State(state): State<AppState>,
    ctx: ViewContext,
    AuthUser(viewer): AuthUser,
    Query(page): Query<Page>,
) -> Result<Many<TrackView>, AppError> {
    let rows = music::favorites(&state.pool, viewer, page).await?;
    Ok(many(views::track_views(&state.pool, &ctx, rows).await?))
}

pub async fn track_comments(
    State(state): State<AppState>,
    ctx: ViewContext,
    Path(id): Path<i64>,
    Query(page): Query<Page>,
) -> Result<Many<CommentView>, AppError> {
    let rows = music::track_comments(&state.pool, id, page).await?;
    Ok(many(views::comment_views(&state.pool, &ctx, rows).await?))
}

pub async fn add_track_comment(
    State(state): State<AppState>,
    ctx: ViewContext,
    AuthUser(viewer): AuthUser,
    Path(id): Path<i64>,
    form: FormData,
) -> Result<One<CommentView>, AppError> {
    let comment = music::add_comment(&state.pool, viewer, id, &form).await?;
    Ok(created(views::comment_view(&state.pool, &ctx, comment).await?))
}

// Comments

pub async fn read_comment(
    State(state): State<AppState>,
    ctx: ViewContext,
    Path(id): Path<i64>,
) -> Result<One<CommentView>, AppError> {
    let comment = music::get_comment(&state.pool, id).await?;
    Ok(ok(views::comment_view(&state.pool, &ctx, comment).await?))
}

pub async fn update_comment(
    State(state): State<AppState>,
    ctx: ViewContext,
    AuthUser(viewer): AuthUser,
    Path(id): Path<i64>,
    form: FormData,
) -> Result<One<CommentView>, AppError> {
    let comment = music::update_comment(&state.pool, viewer, id, &form).await?;
    Ok(ok(views::comment_view(&state.pool, &ctx, comment).await?))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    music::delete_comment(&state.pool, viewer, id).await?;
    Ok(no_content())
}

// Likes

pub async fn list_likes(
    State(state): State<AppState>,
    ctx: ViewContext,
    AuthUser(viewer): AuthUser,
    Query(page): Query<Page>,
) -> Result<Many<LikeView>, AppError> {
    let rows = music::list_likes(&state.pool, viewer, page).await?;
    Ok(many(views::like_views(&state.pool, &ctx, rows).await?))
}

pub async fn create_like(
    State(state): State<AppState>,
    ctx: ViewContext,
    AuthUser(viewer): AuthUser,
    form: FormData,
) -> Result<One<LikeView>, AppError> {
    let like = music::create_like(&state.pool, viewer, &form).await?;
    Ok(created(views::like_view(&state.pool, &ctx, like).await?))
}

pub async fn read_like(
    State(state): State<AppState>,
    ctx: ViewContext,
    Path(id): Path<i64>,
) -> Result<One<LikeView>, AppError> {
    let like = music::get_like(&state.pool, id).await?;
    Ok(ok(views::like_view(&state.pool, &ctx, like).await?))
}

pub async fn delete_like(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    music::delete_like(&state.pool, viewer, id).await?;
    Ok(no_content())
}

// Playlists

pub async fn list_playlists(
    State(state): State<AppState>,
    ctx: ViewContext,
    Query(filter): Query<PlaylistFilter>,
    Query(page): Query<Page>,
) -> Result<Many<PlaylistView>, AppError> {
    let rows = music::list_playlists(&state.pool, &filter, page).await?;
    Ok(many(views::playlist_views(&state.pool, &ctx, rows).await?))
}

pub async fn create_playlist(
    State(state): State<AppState>,
    ctx: ViewContext,
    AuthUser(viewer): AuthUser,
    form: FormData,
) -> Result<One<PlaylistView>, AppError> {
    let playlist = music::create_playlist(&state.pool, viewer, &form).await?;
    Ok(created(views::playlist_view(&state.pool, &ctx, playlist).await?))
}

pub async fn read_playlist(
    State(state): State<AppState>,
    ctx: ViewContext,
    Path(id): Path<i64>,
) -> Result<One<PlaylistView>, AppError> {
    let playlist = music::get_playlist(&state.pool, id).await?;
    Ok(ok(views::playlist_view(&state.pool, &ctx, playlist).await?))
}

pub async fn update_playlist(
    State(state): State<AppState>,
    ctx: ViewContext,
    AuthUser(viewer): AuthUser,
    Path(id): Path<i64>,
    form: FormData,
) -> Result<One<PlaylistView>, AppError> {
    let playlist = music::update_playlist(&state.pool, viewer, id, &form).await?;
    Ok(ok(views::playlist_view(&state.pool, &ctx, playlist).await?))
}

pub async fn delete_playlist(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    music::delete_playlist(&state.pool, viewer, id).await?;
    Ok(no_content())
}

pub async fn add_playlist_track(
    State(state): State<AppState>,
    ctx: ViewContext,
    AuthUser(viewer): AuthUser,
    Path(id): Path<i64>,
    form: FormData,
) -> Result<One<PlaylistView>, AppError> {
    let playlist = music::add_to_playlist(&state.pool, viewer, id, &form).await?;
    Ok(ok(views::playlist_view(&state.pool, &ctx, playlist).await?))
}

pub async fn remove_playlist_track(
    State(state): State<AppState>,
    ctx: ViewContext,
    AuthUser(viewer): AuthUser,
    Path((id, track_id)): Path<(i64, i64)>,
) -> Result<One<PlaylistView>, AppError> {
    let playlist = music::remove_from_playlist(&state.pool, viewer, id, track_id).await?;
    Ok(ok(views::playlist_view(&state.pool, &ctx, playlist).await?))
}

// Categories

pub async fn list_categories(
    State(state): State<AppState>,
    Query(page): Query<Page>,
) -> Result<Many<CategoryView>, AppError> {
    let rows = music::list_categories(&state.pool, page).await?;
    Ok(many(views::category_views(&state.pool, rows).await?))
}

pub async fn create_category(
    State(state): State<AppState>,
    AuthUser(_): AuthUser,
    form: FormData,
) -> Result<One<CategoryView>, AppError> {
    let category = music::create_category(&state.pool, &form).await?;
    Ok(created(views::category_view(&state.pool, category).await?))
}

pub async fn read_category(State(state): State<AppState>, Path(id): Path<i64>) -> Result<One<CategoryView>, AppError> {
    let category = music::get_category(&state.pool, id).await?;
    Ok(ok(views::category_view(&state.pool, category).await?))
}

pub async fn update_category(
    State(state): State<AppState>,
    AuthUser(_): AuthUser,
    Path(id): Path<i64>,
    form: FormData,
) -> Result<One<CategoryView>, AppError> {
    let category = music::update_category(&state.pool, id, &form).await?;
    Ok(ok(views::category_view(&state.pool, category).await?))
}

pub async fn delete_category(
    State(state): State<AppState>,
    AuthUser(_): AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    music::delete_category(&state.pool, id).await?;
    Ok(no_content())
}
