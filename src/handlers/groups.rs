//! Groups, membership, join requests, and group posts.

use super::no_content;
use crate::error::AppError;
use crate::extractors::{AuthUser, FormData, ViewContext, Viewer};
use crate::present::{groups as views, GroupJoinRequestView, GroupMemberView, GroupPostView, GroupView};
use crate::response::{created, many, ok, Many, One};
use crate::schema::JoinStatus;
use crate::service::groups::{self, GroupFilter, JoinOutcome, MembershipStatus};
use crate::service::Page;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

pub async fn list(
    State(state): State<AppState>,
    ctx: ViewContext,
    Query(filter): Query<GroupFilter>,
    Query(page): Query<Page>,
) -> Result<Many<GroupView>, AppError> {
    let rows = groups::list(&state.pool, &filter, page).await?;
    Ok(many(views::group_views(&state.pool, &ctx, rows).await?))
}

pub async fn create(
    State(state): State<AppState>,
    ctx: ViewContext,
    AuthUser(viewer): AuthUser,
    form: FormData,
) -> Result<One<GroupView>, AppError> {
    let group = groups::create(&state.pool, state.media.as_ref(), viewer, &form).await?;
    Ok(created(views::group_view(&state.pool, &ctx, group).await?))
}

pub async fn read(
    State(state): State<AppState>,
    ctx: ViewContext,
    Path(slug): Path<String>,
) -> Result<One<GroupView>, AppError> {
    let group = groups::get(&state.pool, &slug).await?;
    Ok(ok(views::group_view(&state.pool, &ctx, group).await?))
}

pub async fn update(
    State(state): State<AppState>,
    ctx: ViewContext,
    AuthUser(viewer): AuthUser,
    Path(slug): Path<String>,
    form: FormData,
) -> Result<One<GroupView>, AppError> {
    let group = groups::update(&state.pool, state.media.as_ref(), viewer, &slug, &form).await?;
    Ok(ok(views::group_view(&state.pool, &ctx, group).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    Path(slug): Path<String>,
) -> Result<StatusCode, AppError> {
    groups::delete(&state.pool, state.media.as_ref(), viewer, &slug).await?;
    Ok(no_content())
}

/// 201 with the new member for public groups, 201 with the pending request for private ones.
pub async fn join(
    State(state): State<AppState>,
    ctx: ViewContext,
    AuthUser(viewer): AuthUser,
    Path(slug): Path<String>,
    form: FormData,
) -> Result<Response, AppError> {
    let res = match groups::join(&state.pool, viewer, &slug, &form).await? {
        JoinOutcome::Joined(member) => {
            let view = crate::present::single(views::member_views(&state.pool, vec![member]).await?, "group member")?;
            created(view).into_response()
        }
        JoinOutcome::Requested(request) => {
            created(views::join_request_view(&state.pool, &ctx, request).await?).into_response()
        }
    };
    Ok(res)
}

pub async fn leave(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    Path(slug): Path<String>,
) -> Result<StatusCode, AppError> {
    groups::leave(&state.pool, viewer, &slug).await?;
    Ok(no_content())
}

pub async fn members(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(page): Query<Page>,
) -> Result<Many<GroupMemberView>, AppError> {
    let rows = groups::members(&state.pool, &slug, page).await?;
    Ok(many(views::member_views(&state.pool, rows).await?))
}

pub async fn check_membership(
    State(state): State<AppState>,
    Viewer(viewer): Viewer,
    Path(slug): Path<String>,
) -> Result<One<MembershipStatus>, AppError> {
    let group = groups::get(&state.pool, &slug).await?;
    Ok(ok(groups::membership(&state.pool, group.id, viewer).await?))
}

pub async fn posts(
    State(state): State<AppState>,
    ctx: ViewContext,
    Path(slug): Path<String>,
    Query(page): Query<Page>,
) -> Result<Many<GroupPostView>, AppError> {
    let rows = groups::posts(&state.pool, ctx.viewer, &slug, page).await?;
    Ok(many(views::group_post_views(&state.pool, &ctx, rows).await?))
}

pub async fn create_post(
    State(state): State<AppState>,
    ctx: ViewContext,
    AuthUser(viewer): AuthUser,
    Path(slug): Path<String>,
    form: FormData,
) -> Result<One<GroupPostView>, AppError> {
    let post = groups::create_post(&state.pool, state.media.as_ref(), viewer, &slug, &form).await?;
    Ok(created(views::group_post_view(&state.pool, &ctx, post).await?))
}

pub async fn join_requests(
    State(state): State<AppState>,
    ctx: ViewContext,
    AuthUser(viewer): AuthUser,
    Path(slug): Path<String>,
    Query(page): Query<Page>,
) -> Result<Many<GroupJoinRequestView>, AppError> {
    let rows = groups::join_requests(&state.pool, viewer, &slug, page).await?;
    Ok(many(views::join_request_views(&state.pool, &ctx, rows).await?))
}

pub async fn approve(
    State(state): State<AppState>,
    ctx: ViewContext,
    AuthUser(viewer): AuthUser,
    Path(id): Path<i64>,
) -> Result<One<GroupJoinRequestView>, AppError> {
    let request = groups::decide_request(&state.pool, viewer, id, JoinStatus::Approved).await?;
    Ok(ok(views::join_request_view(&state.pool, &ctx, request).await?))
}

pub async fn reject(
    State(state): State<AppState>,
    ctx: ViewContext,
    AuthUser(viewer): AuthUser,
    Path(id): Path<i64>,
) -> Result<One<GroupJoinRequestView>, AppError> {
    let request = groups::decide_request(&state.pool, viewer, id, JoinStatus::Rejected).await?;
    Ok(ok(views::join_request_view(&state.pool, &ctx, request).await?))
}
