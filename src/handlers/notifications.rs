use super::no_content;
use crate::error::AppError;
use crate::extractors::{AuthUser, ViewContext};
use crate::present::{social as views, NotificationView};
use crate::response::{many, ok, Many, One};
use crate::service::{notifications, Page};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Serialize;

pub async fn list(
    State(state): State<AppState>,
    ctx: ViewContext,
    AuthUser(viewer): AuthUser,
    Query(page): Query<Page>,
) -> Result<Many<NotificationView>, AppError> {
    let rows = notifications::list(&state.pool, viewer, page).await?;
    Ok(many(views::notification_views(&state.pool, &ctx, rows).await?))
}

pub async fn read(
    State(state): State<AppState>,
    ctx: ViewContext,
    AuthUser(viewer): AuthUser,
    Path(id): Path<i64>,
) -> Result<One<NotificationView>, AppError> {
    let row = notifications::get(&state.pool, viewer, id).await?;
    Ok(ok(views::notification_view(&state.pool, &ctx, row).await?))
}

#[derive(Serialize)]
pub struct UnreadCount {
    pub unread_count: i64,
}

pub async fn unread_count(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
) -> Result<One<UnreadCount>, AppError> {
    let unread_count = notifications::unread_count(&state.pool, viewer).await?;
    Ok(ok(UnreadCount { unread_count }))
}

pub async fn mark_as_read(
    State(state): State<AppState>,
    ctx: ViewContext,
    AuthUser(viewer): AuthUser,
    Path(id): Path<i64>,
) -> Result<One<NotificationView>, AppError> {
    let row = notifications::mark_read(&state.pool, viewer, id).await?;
    Ok(ok(views::notification_view(&state.pool, &ctx, row).await?))
}

#[derive(Serialize)]
pub struct MarkedRead {
    pub updated: u64,
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
) -> Result<One<MarkedRead>, AppError> {
    let updated = notifications::mark_all_read(&state.pool, viewer).await?;
    Ok(ok(MarkedRead { updated }))
}

pub async fn delete(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    notifications::delete(&state.pool, viewer, id).await?;
    Ok(no_content())
}
