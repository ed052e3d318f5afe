//! Accounts, follows, and profiles.

use super::no_content;
use crate::error::AppError;
use crate::extractors::{AuthUser, FormData, ViewContext, Viewer};
use crate::present::{self, ProfileView, UserDetailView, UserView};
use crate::response::{created, many, ok, Many, One};
use crate::service::{users, Page};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Serialize;

pub async fn signup(
    State(state): State<AppState>,
    ctx: ViewContext,
    form: FormData,
) -> Result<One<UserView>, AppError> {
    let new = users::NewUser::from_form(&form)?;
    let user = users::create(&state.pool, new).await?;
    Ok(created(present::users::user_view(&state.pool, &ctx, user).await?))
}

pub async fn list(
    State(state): State<AppState>,
    ctx: ViewContext,
    Query(page): Query<Page>,
) -> Result<Many<UserView>, AppError> {
    let rows = users::list(&state.pool, page).await?;
    Ok(many(present::users::user_views(&state.pool, &ctx, rows).await?))
}

pub async fn read(
    State(state): State<AppState>,
    ctx: ViewContext,
    Path(id): Path<i64>,
) -> Result<One<UserDetailView>, AppError> {
    let user = users::get(&state.pool, id).await?;
    Ok(ok(present::users::user_detail(&state.pool, &ctx, user).await?))
}

pub async fn update(
    State(state): State<AppState>,
    ctx: ViewContext,
    AuthUser(viewer): AuthUser,
    Path(id): Path<i64>,
    form: FormData,
) -> Result<One<UserView>, AppError> {
    let user = users::update(&state.pool, state.media.as_ref(), viewer, id, &form).await?;
    Ok(ok(present::users::user_view(&state.pool, &ctx, user).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    users::delete(&state.pool, viewer, id).await?;
    Ok(no_content())
}

#[derive(Serialize)]
pub struct FollowState {
    pub following: bool,
    pub followers_count: i64,
}

pub async fn follow(
    State(state): State<AppState>,
    ctx: ViewContext,
    AuthUser(viewer): AuthUser,
    Path(id): Path<i64>,
) -> Result<One<FollowState>, AppError> {
    let following = users::toggle_follow(&state.pool, viewer, id).await?;
    let target = users::get(&state.pool, id).await?;
    let view = present::users::user_view(&state.pool, &ctx, target).await?;
    Ok(ok(FollowState { following, followers_count: view.followers_count }))
}

pub async fn followers(
    State(state): State<AppState>,
    ctx: ViewContext,
    Path(id): Path<i64>,
    Query(page): Query<Page>,
) -> Result<Many<UserView>, AppError> {
    let rows = users::followers(&state.pool, id, page).await?;
    Ok(many(present::users::user_views(&state.pool, &ctx, rows).await?))
}

pub async fn following(
    State(state): State<AppState>,
    ctx: ViewContext,
    Path(id): Path<i64>,
    Query(page): Query<Page>,
) -> Result<Many<UserView>, AppError> {
    let rows = users::following(&state.pool, id, page).await?;
    Ok(many(present::users::user_views(&state.pool, &ctx, rows).await?))
}

// Profiles

pub async fn list_profiles(
    State(state): State<AppState>,
    ctx: ViewContext,
    Query(page): Query<Page>,
) -> Result<Many<ProfileView>, AppError> {
    let rows = users::list_profiles(&state.pool, ctx.viewer, page).await?;
    Ok(many(present::users::profile_views(&ctx, rows)))
}

pub async fn create_profile(
    State(state): State<AppState>,
    ctx: ViewContext,
    AuthUser(viewer): AuthUser,
    form: FormData,
) -> Result<One<ProfileView>, AppError> {
    let profile = users::create_profile(&state.pool, state.media.as_ref(), viewer, &form).await?;
    Ok(created(ProfileView::build(&ctx, profile)))
}

pub async fn my_profile(
    State(state): State<AppState>,
    ctx: ViewContext,
    AuthUser(viewer): AuthUser,
) -> Result<One<ProfileView>, AppError> {
    let profile = users::profile_of(&state.pool, Some(viewer), viewer).await?;
    Ok(ok(ProfileView::build(&ctx, profile)))
}

pub async fn profile_by_user(
    State(state): State<AppState>,
    ctx: ViewContext,
    Viewer(viewer): Viewer,
    Path(user_id): Path<i64>,
) -> Result<One<ProfileView>, AppError> {
    let profile = users::profile_of(&state.pool, viewer, user_id).await?;
    Ok(ok(ProfileView::build(&ctx, profile)))
}

pub async fn read_profile(
    State(state): State<AppState>,
    ctx: ViewContext,
    Path(id): Path<i64>,
) -> Result<One<ProfileView>, AppError> {
    let profile = users::get_profile(&state.pool, ctx.viewer, id).await?;
    Ok(ok(ProfileView::build(&ctx, profile)))
}

pub async fn update_profile(
    State(state): State<AppState>,
    ctx: ViewContext,
    AuthUser(viewer): AuthUser,
    Path(id): Path<i64>,
    form: FormData,
) -> Result<One<ProfileView>, AppError> {
    let profile = users::update_profile(&state.pool, state.media.as_ref(), viewer, id, &form).await?;
    Ok(ok(ProfileView::build(&ctx, profile)))
}

pub async fn delete_profile(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    users::delete_profile(&state.pool, viewer, id).await?;
    Ok(no_content())
}
