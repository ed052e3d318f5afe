//! Cart, checkout, and the order lifecycle.

use crate::error::AppError;
use crate::extractors::{AuthUser, FormData, ViewContext};
use crate::present::{market as views, CartView, OrderView};
use crate::response::{created, many, ok, Many, One};
use crate::service::orders::{self, OrderFilter};
use crate::service::Page;
use crate::state::AppState;
use axum::extract::{Path, Query, State};

async fn current_cart(state: &AppState, ctx: &ViewContext, viewer: i64) -> Result<CartView, AppError> {
    let cart = orders::cart(&state.pool, viewer).await?;
    let items = orders::cart_items(&state.pool, cart.id).await?;
    views::cart_view(&state.pool, ctx, cart.id, items).await
}

pub async fn cart(
    State(state): State<AppState>,
    ctx: ViewContext,
    AuthUser(viewer): AuthUser,
) -> Result<One<CartView>, AppError> {
    Ok(ok(current_cart(&state, &ctx, viewer).await?))
}

/// Adds a line (or grows an existing one) and answers with the whole cart.
pub async fn add_item(
    State(state): State<AppState>,
    ctx: ViewContext,
    AuthUser(viewer): AuthUser,
    form: FormData,
) -> Result<One<CartView>, AppError> {
    orders::add_item(&state.pool, viewer, &form).await?;
    Ok(created(current_cart(&state, &ctx, viewer).await?))
}

pub async fn update_item(
    State(state): State<AppState>,
    ctx: ViewContext,
    AuthUser(viewer): AuthUser,
    Path(id): Path<i64>,
    form: FormData,
) -> Result<One<CartView>, AppError> {
    orders::update_item(&state.pool, viewer, id, &form).await?;
    Ok(ok(current_cart(&state, &ctx, viewer).await?))
}

pub async fn remove_item(
    State(state): State<AppState>,
    ctx: ViewContext,
    AuthUser(viewer): AuthUser,
    Path(id): Path<i64>,
) -> Result<One<CartView>, AppError> {
    orders::remove_item(&state.pool, viewer, id).await?;
    Ok(ok(current_cart(&state, &ctx, viewer).await?))
}

pub async fn checkout(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    form: FormData,
) -> Result<One<OrderView>, AppError> {
    let (order, items) = orders::checkout(&state.pool, viewer, &form).await?;
    Ok(created(OrderView::build(order, items)))
}

pub async fn list(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    Query(filter): Query<OrderFilter>,
    Query(page): Query<Page>,
) -> Result<Many<OrderView>, AppError> {
    let rows = orders::list(&state.pool, viewer, &filter, page).await?;
    Ok(many(views::order_views(&state.pool, rows).await?))
}

pub async fn read(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    Path(id): Path<i64>,
) -> Result<One<OrderView>, AppError> {
    let order = orders::get(&state.pool, viewer, id).await?;
    Ok(ok(views::order_view(&state.pool, order).await?))
}

pub async fn pay(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    Path(id): Path<i64>,
    form: FormData,
) -> Result<One<OrderView>, AppError> {
    let order = orders::pay(&state.pool, viewer, id, &form).await?;
    Ok(ok(views::order_view(&state.pool, order).await?))
}

pub async fn cancel(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    Path(id): Path<i64>,
) -> Result<One<OrderView>, AppError> {
    let order = orders::cancel(&state.pool, viewer, id).await?;
    Ok(ok(views::order_view(&state.pool, order).await?))
}

pub async fn advance(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    Path(id): Path<i64>,
    form: FormData,
) -> Result<One<OrderView>, AppError> {
    let order = orders::advance(&state.pool, viewer, id, &form).await?;
    Ok(ok(views::order_view(&state.pool, order).await?))
}
