//! Churches, choirs, video studios, and live events.

use super::no_content;
use crate::error::AppError;
use crate::extractors::{AuthUser, FormData, ViewContext};
use crate::present::{community as views, ChoirView, ChurchView, LiveEventView, VideoStudioView};
use crate::response::{created, many, ok, Many, One};
use crate::service::community::{self, DirectoryFilter, LiveEventFilter};
use crate::service::Page;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
};

// Churches

pub async fn list_churches(
    State(state): State<AppState>,
    ctx: ViewContext,
    Query(filter): Query<DirectoryFilter>,
    Query(page): Query<Page>,
) -> Result<Many<ChurchView>, AppError> {
    let rows = community::list_churches(&state.pool, &filter, page).await?;
    Ok(many(views::church_views(&state.pool, &ctx, rows).await?))
}

pub async fn my_churches(
    State(state): State<AppState>,
    ctx: ViewContext,
    AuthUser(viewer): AuthUser,
    Query(page): Query<Page>,
) -> Result<Many<ChurchView>, AppError> {
    let rows = community::list_churches(&state.pool, &DirectoryFilter::mine(viewer), page).await?;
    Ok(many(views::church_views(&state.pool, &ctx, rows).await?))
}

pub async fn create_church(
    State(state): State<AppState>,
    ctx: ViewContext,
    AuthUser(viewer): AuthUser,
    form: FormData,
) -> Result<One<ChurchView>, AppError> {
    let church = community::create_church(&state.pool, state.media.as_ref(), viewer, &form).await?;
    Ok(created(views::church_view(&state.pool, &ctx, church).await?))
}

pub async fn read_church(
    State(state): State<AppState>,
    ctx: ViewContext,
    Path(id): Path<i64>,
) -> Result<One<ChurchView>, AppError> {
    let church = community::get_church(&state.pool, id).await?;
    Ok(ok(views::church_view(&state.pool, &ctx, church).await?))
}

pub async fn update_church(
    State(state): State<AppState>,
    ctx: ViewContext,
    AuthUser(viewer): AuthUser,
    Path(id): Path<i64>,
    form: FormData,
) -> Result<One<ChurchView>, AppError> {
    let church = community::update_church(&state.pool, state.media.as_ref(), viewer, id, &form).await?;
    Ok(ok(views::church_view(&state.pool, &ctx, church).await?))
}

pub async fn delete_church(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    community::delete_church(&state.pool, state.media.as_ref(), viewer, id).await?;
    Ok(no_content())
}

// Choirs

pub async fn list_choirs(
    State(state): State<AppState>,
    ctx: ViewContext,
    Query(filter): Query<DirectoryFilter>,
    Query(page): Query<Page>,
) -> Result<Many<ChoirView>, AppError> {
    let rows = community::list_choirs(&state.pool, &filter, page).await?;
    Ok(many(views::choir_views(&state.pool, &ctx, rows).await?))
}

pub async fn my_choirs(
    State(state): State<AppState>,
    ctx: ViewContext,
    AuthUser(viewer): AuthUser,
    Query(page): Query<Page>,
) -> Result<Many<ChoirView>, AppError> {
    let rows = community::list_choirs(&state.pool, &DirectoryFilter::mine(viewer), page).await?;
    Ok(many(views::choir_views(&state.pool, &ctx, rows).await?))
}

pub async fn create_choir(
    State(state): State<AppState>,
    ctx: ViewContext,
    AuthUser(viewer): AuthUser,
    form: FormData,
) -> Result<One<ChoirView>, AppError> {
    let choir = community::create_choir(&state.pool, state.media.as_ref(), viewer, &form).await?;
    Ok(created(views::choir_view(&state.pool, &ctx, choir).await?))
}

pub async fn read_choir(
    State(state): State<AppState>,
    ctx: ViewContext,
    Path(id): Path<i64>,
) -> Result<One<ChoirView>, AppError> {
    let choir = community::get_choir(&state.pool, id).await?;
    Ok(ok(views::choir_view(&state.pool, &ctx, choir).await?))
}

pub async fn update_choir(
    State(state): State<AppState>,
    ctx: ViewContext,
    AuthUser(viewer): AuthUser,
    Path(id): Path<i64>,
    form: FormData,
) -> Result<One<ChoirView>, AppError> {
    let choir = community::update_choir(&state.pool, state.media.as_ref(), viewer, id, &form).await?;
    Ok(ok(views::choir_view(&state.pool, &ctx, choir).await?))
}

pub async fn delete_choir(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    community::delete_choir(&state.pool, state.media.as_ref(), viewer, id).await?;
    Ok(no_content())
}

pub async fn toggle_choir_active(
    State(state): State<AppState>,
    ctx: ViewContext,
    AuthUser(viewer): AuthUser,
    Path(id): Path<i64>,
) -> Result<One<ChoirView>, AppError> {
    let choir = community::toggle_choir_active(&state.pool, viewer, id).await?;
    Ok(ok(views::choir_view(&state.pool, &ctx, choir).await?))
}

pub async fn update_choir_members(
    State(state): State<AppState>,
    ctx: ViewContext,
    AuthUser(viewer): AuthUser,
    Path(id): Path<i64>,
    form: FormData,
) -> Result<One<ChoirView>, AppError> {
    let choir = community::update_choir_members(&state.pool, viewer, id, &form).await?;
    Ok(ok(views::choir_view(&state.pool, &ctx, choir).await?))
}

// Video studios

pub async fn list_studios(
    State(state): State<AppState>,
    ctx: ViewContext,
    Query(filter): Query<DirectoryFilter>,
    Query(page): Query<Page>,
) -> Result<Many<VideoStudioView>, AppError> {
    let rows = community::list_studios(&state.pool, &filter, page).await?;
    Ok(many(views::studio_views(&state.pool, &ctx, rows).await?))
}

pub async fn my_studios(
    State(state): State<AppState>,
    ctx: ViewContext,
    AuthUser(viewer): AuthUser,
    Query(page): Query<Page>,
) -> Result<Many<VideoStudioView>, AppError> {
    let rows = community::list_studios(&state.pool, &DirectoryFilter::mine(viewer), page).await?;
    Ok(many(views::studio_views(&state.pool, &ctx, rows).await?))
}

pub async fn create_studio(
    State(state): State<AppState>,
    ctx: ViewContext,
    AuthUser(viewer): AuthUser,
    form: FormData,
) -> Result<One<VideoStudioView>, AppError> {
    let studio = community::create_studio(&state.pool, state.media.as_ref(), viewer, &form).await?;
    Ok(created(views::studio_view(&state.pool, &ctx, studio).await?))
}

pub async fn read_studio(
    State(state): State<AppState>,
    ctx: ViewContext,
    Path(id): Path<i64>,
) -> Result<One<VideoStudioView>, AppError> {
    let studio = community::get_studio(&state.pool, id).await?;
    Ok(ok(views::studio_view(&state.pool, &ctx, studio).await?))
}

pub async fn update_studio(
    State(state): State<AppState>,
    ctx: ViewContext,
    AuthUser(viewer): AuthUser,
    Path(id): Path<i64>,
    form: FormData,
) -> Result<One<VideoStudioView>, AppError> {
    let studio = community::update_studio(&state.pool, state.media.as_ref(), viewer, id, &form).await?;
    Ok(ok(views::studio_view(&state.pool, &ctx, studio).await?))
}

pub async fn delete_studio(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    community::delete_studio(&state.pool, state.media.as_ref(), viewer, id).await?;
    Ok(no_content())
}

// Live events

pub async fn list_live_events(
    State(state): State<AppState>,
    ctx: ViewContext,
    Query(filter): Query<LiveEventFilter>,
    Query(page): Query<Page>,
) -> Result<Many<LiveEventView>, AppError> {
    let rows = community::list_live_events(&state.pool, &filter, page).await?;
    Ok(many(views::live_event_views(&state.pool, &ctx, rows).await?))
}

pub async fn create_live_event(
    State(state): State<AppState>,
    ctx: ViewContext,
    AuthUser(viewer): AuthUser,
    form: FormData,
) -> Result<One<LiveEventView>, AppError> {
    let event = community::create_live_event(&state.pool, viewer, &form).await?;
    Ok(created(views::live_event_view(&state.pool, &ctx, event).await?))
}

pub async fn read_live_event(
    State(state): State<AppState>,
    ctx: ViewContext,
    Path(id): Path<i64>,
) -> Result<One<LiveEventView>, AppError> {
    let event = community::get_live_event(&state.pool, id).await?;
    Ok(ok(views::live_event_view(&state.pool, &ctx, event).await?))
}

pub async fn update_live_event(
    State(state): State<AppState>,
    ctx: ViewContext,
    AuthUser(viewer): AuthUser,
    Path(id): Path<i64>,
    form: FormData,
) -> Result<One<LiveEventView>, AppError> {
    let event = community::update_live_event(&state.pool, viewer, id, &form).await?;
    Ok(ok(views::live_event_view(&state.pool, &ctx, event).await?))
}

pub async fn delete_live_event(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    community::delete_live_event(&state.pool, viewer, id).await?;
    Ok(no_content())
}

pub async fn join_live_event(
    State(state): State<AppState>,
    ctx: ViewContext,
    AuthUser(_): AuthUser,
    Path(id): Path<i64>,
) -> Result<One<LiveEventView>, AppError> {
    let event = community::join_live_event(&state.pool, id).await?;
    Ok(ok(views::live_event_view(&state.pool, &ctx, event).await?))
}

pub async fn end_live_event(
    State(state): State<AppState>,
    ctx: ViewContext,
    AuthUser(viewer): AuthUser,
    Path(id): Path<i64>,
) -> Result<One<LiveEventView>, AppError> {
    let event = community::end_live_event(&state.pool, viewer, id).await?;
    Ok(ok(views::live_event_view(&state.pool, &ctx, event).await?))
}
