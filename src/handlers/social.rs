//! Social posts and their engagement collections.

use super::{attachment, no_content};
use crate::error::AppError;
use crate::extractors::{AuthUser, FormData, ViewContext};
use crate::media;
use crate::present::{social as views, PostCommentView, PostLikeView, PostSaveView, SocialPostView};
use crate::response::{created, many, ok, Many, One};
use crate::schema::{PostLike, PostSave};
use crate::service::social::{self, CommentFilter, Engagement, PostFilter};
use crate::service::Page;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Response,
};
use serde::Serialize;

pub async fn list(
    State(state): State<AppState>,
    ctx: ViewContext,
    Query(filter): Query<PostFilter>,
    Query(page): Query<Page>,
) -> Result<Many<SocialPostView>, AppError> {
    let rows = social::list_posts(&state.pool, &filter, page).await?;
    Ok(many(views::post_views(&state.pool, &ctx, rows).await?))
}

pub async fn create(
    State(state): State<AppState>,
    ctx: ViewContext,
    AuthUser(viewer): AuthUser,
    form: FormData,
) -> Result<One<SocialPostView>, AppError> {
    let post = social::create_post(&state.pool, state.media.as_ref(), viewer, &form).await?;
    Ok(created(views::post_view(&state.pool, &ctx, post).await?))
}

pub async fn read(
    State(state): State<AppState>,
    ctx: ViewContext,
    Path(id): Path<i64>,
) -> Result<One<SocialPostView>, AppError> {
    let post = social::get_post(&state.pool, id).await?;
    Ok(ok(views::post_view(&state.pool, &ctx, post).await?))
}

pub async fn update(
    State(state): State<AppState>,
    ctx: ViewContext,
    AuthUser(viewer): AuthUser,
    Path(id): Path<i64>,
    form: FormData,
) -> Result<One<SocialPostView>, AppError> {
    let post = social::update_post(&state.pool, viewer, id, &form).await?;
    Ok(ok(views::post_view(&state.pool, &ctx, post).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    social::delete_post(&state.pool, state.media.as_ref(), viewer, id).await?;
    Ok(no_content())
}

pub async fn download(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Response, AppError> {
    let (post, file) = social::download_post(&state.pool, state.media.as_ref(), id).await?;
    Ok(attachment(media::file_name(&post.media_file), file))
}

#[derive(Serialize)]
pub struct LikeState {
    pub liked: bool,
    pub likes_count: i64,
}

#[derive(Serialize)]
pub struct SaveState {
    pub saved: bool,
    pub saves_count: i64,
}

pub async fn toggle_like(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    Path(id): Path<i64>,
) -> Result<One<LikeState>, AppError> {
    let (liked, likes_count) = social::toggle(&state.pool, viewer, id, Engagement::Like).await?;
    Ok(ok(LikeState { liked, likes_count }))
}

pub async fn toggle_save(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    Path(id): Path<i64>,
) -> Result<One<SaveState>, AppError> {
    let (saved, saves_count) = social::toggle(&state.pool, viewer, id, Engagement::Save).await?;
    Ok(ok(SaveState { saved, saves_count }))
}

pub async fn comments(
    State(state): State<AppState>,
    ctx: ViewContext,
    Path(id): Path<i64>,
    Query(page): Query<Page>,
) -> Result<Many<PostCommentView>, AppError> {
    let rows = social::post_comments(&state.pool, id, page).await?;
    Ok(many(views::post_comment_views(&state.pool, &ctx, rows).await?))
}

pub async fn add_comment(
    State(state): State<AppState>,
    ctx: ViewContext,
    AuthUser(viewer): AuthUser,
    Path(id): Path<i64>,
    form: FormData,
) -> Result<One<PostCommentView>, AppError> {
    let comment = social::add_comment(&state.pool, viewer, id, &form).await?;
    Ok(created(views::post_comment_view(&state.pool, &ctx, comment).await?))
}

// /post-likes and /post-saves

pub async fn list_likes(
    State(state): State<AppState>,
    ctx: ViewContext,
    AuthUser(viewer): AuthUser,
    Query(page): Query<Page>,
) -> Result<Many<PostLikeView>, AppError> {
    let rows = social::list_likes(&state.pool, viewer, page).await?;
    Ok(many(views::post_like_views(&state.pool, &ctx, rows).await?))
}

pub async fn create_like(
    State(state): State<AppState>,
    ctx: ViewContext,
    AuthUser(viewer): AuthUser,
    form: FormData,
) -> Result<One<PostLikeView>, AppError> {
    let like: PostLike = social::create_mark(&state.pool, viewer, Engagement::Like, &form).await?;
    let view = views::post_like_views(&state.pool, &ctx, vec![like]).await?;
    Ok(created(crate::present::single(view, "post like")?))
}

pub async fn read_like(
    State(state): State<AppState>,
    ctx: ViewContext,
    Path(id): Path<i64>,
) -> Result<One<PostLikeView>, AppError> {
    let like: PostLike = social::get_mark(&state.pool, Engagement::Like, id).await?;
    let view = views::post_like_views(&state.pool, &ctx, vec![like]).await?;
    Ok(ok(crate::present::single(view, "post like")?))
}

pub async fn delete_like(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    social::delete_mark(&state.pool, viewer, Engagement::Like, id).await?;
    Ok(no_content())
}

pub async fn list_saves(
    State(state): State<AppState>,
    ctx: ViewContext,
    AuthUser(viewer): AuthUser,
    Query(page): Query<Page>,
) -> Result<Many<PostSaveView>, AppError> {
    let rows = social::list_saves(&state.pool, viewer, page).await?;
    Ok(many(views::post_save_views(&state.pool, &ctx, rows).await?))
}

pub async fn create_save(
    State(state): State<AppState>,
    ctx: ViewContext,
    AuthUser(viewer): AuthUser,
    form: FormData,
) -> Result<One<PostSaveView>, AppError> {
    let save: PostSave = social::create_mark(&state.pool, viewer, Engagement::Save, &form).await?;
    let view = views::post_save_views(&state.pool, &ctx, vec![save]).await?;
    Ok(created(crate::present::single(view, "post save")?))
}

pub async fn read_save(
    State(state): State<AppState>,
    ctx: ViewContext,
    Path(id): Path<i64>,
) -> Result<One<PostSaveView>, AppError> {
    let save: PostSave = social::get_mark(&state.pool, Engagement::Save, id).await?;
    let view = views::post_save_views(&state.pool, &ctx, vec![save]).await?;
    Ok(ok(crate::present::single(view, "post save")?))
}

pub async fn delete_save(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    social::delete_mark(&state.pool, viewer, Engagement::Save, id).await?;
    Ok(no_content())
}

// /post-comments

pub async fn list_post_comments(
    State(state): State<AppState>,
    ctx: ViewContext,
    Query(filter): Query<CommentFilter>,
    Query(page): Query<Page>,
) -> Result<Many<PostCommentView>, AppError> {
    let rows = social::list_comments(&state.pool, &filter, page).await?;
    Ok(many(views::post_comment_views(&state.pool, &ctx, rows).await?))
}

pub async fn create_post_comment(
    State(state): State<AppState>,
    ctx: ViewContext,
    AuthUser(viewer): AuthUser,
    form: FormData,
) -> Result<One<PostCommentView>, AppError> {
    let comment = social::create_comment(&state.pool, viewer, &form).await?;
    Ok(created(views::post_comment_view(&state.pool, &ctx, comment).await?))
}

pub async fn read_post_comment(
    State(state): State<AppState>,
    ctx: ViewContext,
    Path(id): Path<i64>,
) -> Result<One<PostCommentView>, AppError> {
    let comment = social::get_comment(&state.pool, id).await?;
    Ok(ok(views::post_comment_view(&state.pool, &ctx, comment).await?))
}

pub async fn update_post_comment(
    State(state): State<AppState>,
    ctx: ViewContext,
    AuthUser(viewer): AuthUser,
    Path(id): Path<i64>,
    form: FormData,
) -> Result<One<PostCommentView>, AppError> {
    let comment = social::update_comment(&state.pool, viewer, id, &form).await?;
    Ok(ok(views::post_comment_view(&state.pool, &ctx, comment).await?))
}

pub async fn delete_post_comment(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    social::delete_comment(&state.pool, viewer, id).await?;
    Ok(no_content())
}
