//! Marketplace catalogue: product categories, products, reviews, and the wishlist.

use super::no_content;
use crate::error::AppError;
use crate::extractors::{AuthUser, FormData, ViewContext};
use crate::present::{market as views, ProductCategoryView, ProductReviewView, ProductView, WishlistView};
use crate::response::{created, many, ok, Many, One};
use crate::service::market::{self, ProductFilter};
use crate::service::Page;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Serialize;

pub async fn list_categories(
    State(state): State<AppState>,
    Query(page): Query<Page>,
) -> Result<Many<ProductCategoryView>, AppError> {
    let rows = market::list_categories(&state.pool, page).await?;
    Ok(many(views::category_views(&state.pool, rows).await?))
}

pub async fn create_category(
    State(state): State<AppState>,
    AuthUser(_): AuthUser,
    form: FormData,
) -> Result<One<ProductCategoryView>, AppError> {
    let category = market::create_category(&state.pool, &form).await?;
    Ok(created(views::category_view(&state.pool, category).await?))
}

pub async fn read_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<One<ProductCategoryView>, AppError> {
    let category = market::get_category(&state.pool, id).await?;
    Ok(ok(views::category_view(&state.pool, category).await?))
}

pub async fn list_products(
    State(state): State<AppState>,
    ctx: ViewContext,
    Query(filter): Query<ProductFilter>,
    Query(page): Query<Page>,
) -> Result<Many<ProductView>, AppError> {
    let rows = market::list_products(&state.pool, &filter, page).await?;
    Ok(many(views::product_views(&state.pool, &ctx, rows).await?))
}

pub async fn create_product(
    State(state): State<AppState>,
    ctx: ViewContext,
    AuthUser(viewer): AuthUser,
    form: FormData,
) -> Result<One<ProductView>, AppError> {
    let product = market::create_product(&state.pool, state.media.as_ref(), viewer, &form).await?;
    Ok(created(views::product_view(&state.pool, &ctx, product).await?))
}

/// `key` is either the numeric id or the slug.
pub async fn read_product(
    State(state): State<AppState>,
    ctx: ViewContext,
    Path(key): Path<String>,
) -> Result<One<ProductView>, AppError> {
    let product = market::view_product(&state.pool, &key).await?;
    Ok(ok(views::product_view(&state.pool, &ctx, product).await?))
}

pub async fn update_product(
    State(state): State<AppState>,
    ctx: ViewContext,
    AuthUser(viewer): AuthUser,
    Path(id): Path<i64>,
    form: FormData,
) -> Result<One<ProductView>, AppError> {
    let product = market::update_product(&state.pool, state.media.as_ref(), viewer, id, &form).await?;
    Ok(ok(views::product_view(&state.pool, &ctx, product).await?))
}

pub async fn delete_product(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    market::delete_product(&state.pool, state.media.as_ref(), viewer, id).await?;
    Ok(no_content())
}

pub async fn list_reviews(
    State(state): State<AppState>,
    ctx: ViewContext,
    Path(id): Path<i64>,
    Query(page): Query<Page>,
) -> Result<Many<ProductReviewView>, AppError> {
    let rows = market::list_reviews(&state.pool, id, page).await?;
    Ok(many(views::review_views(&state.pool, &ctx, rows).await?))
}

pub async fn create_review(
    State(state): State<AppState>,
    ctx: ViewContext,
    AuthUser(viewer): AuthUser,
    Path(id): Path<i64>,
    form: FormData,
) -> Result<One<ProductReviewView>, AppError> {
    let review = market::create_review(&state.pool, viewer, id, &form).await?;
    Ok(created(views::review_view(&state.pool, &ctx, review).await?))
}

pub async fn wishlist(
    State(state): State<AppState>,
    ctx: ViewContext,
    AuthUser(viewer): AuthUser,
) -> Result<One<WishlistView>, AppError> {
    let list = market::wishlist(&state.pool, viewer).await?;
    Ok(ok(views::wishlist_view(&state.pool, &ctx, list).await?))
}

#[derive(Serialize)]
pub struct WishlistState {
    pub wishlisted: bool,
}

pub async fn toggle_wishlist(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    form: FormData,
) -> Result<One<WishlistState>, AppError> {
    let wishlisted = market::toggle_wishlist(&state.pool, viewer, &form).await?;
    Ok(ok(WishlistState { wishlisted }))
}
