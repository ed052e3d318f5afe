//! Marketplace views.
//!
//! Cart totals are computed from the live product price; order totals come from the
//! price stored on each order line at checkout.

use super::{group_by, music::track_map, unique_ids, users::user_map, viewer_hits, TrackView, UserView};
use crate::error::AppError;
use crate::extractors::ViewContext;
use crate::schema::{Order, OrderItem, Product, ProductCategory, ProductImage, ProductReview, Wishlist};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use std::collections::HashMap;

const REVIEW_STATS: &str = "SELECT product_id, COUNT(*), AVG(rating)::float8 FROM product_reviews \
     WHERE product_id = ANY($1) GROUP BY product_id";
const WISHLISTED: &str = "SELECT wp.product_id FROM wishlist_products wp JOIN wishlists w ON w.id = wp.wishlist_id \
     WHERE wp.product_id = ANY($1) AND w.user_id = $2";
const CATEGORY_PRODUCTS: &str =
    "SELECT category_id, COUNT(*) FROM products WHERE category_id = ANY($1) GROUP BY category_id";

#[derive(Clone, Debug, Serialize)]
pub struct ProductCategoryView {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub products_count: i64,
    pub created_at: DateTime<Utc>,
}

pub async fn category_views(pool: &PgPool, rows: Vec<ProductCategory>) -> Result<Vec<ProductCategoryView>, AppError> {
    let ids: Vec<i64> = rows.iter().map(|c| c.id).collect();
    let products = super::counts(pool, CATEGORY_PRODUCTS, &ids).await?;
    Ok(rows
        .into_iter()
        .map(|c| ProductCategoryView {
            products_count: products.get(&c.id).copied().unwrap_or(0),
            id: c.id,
            name: c.name,
            slug: c.slug,
            description: c.description,
            created_at: c.created_at,
        })
        .collect())
}

pub async fn category_view(pool: &PgPool, row: ProductCategory) -> Result<ProductCategoryView, AppError> {
    super::single(category_views(pool, vec![row]).await?, "product category")
}

#[derive(Clone, Debug, Serialize)]
pub struct ProductImageView {
    pub id: i64,
    pub image: Option<String>,
    pub is_primary: bool,
    pub position: i32,
}

#[derive(Clone, Debug, Serialize)]
pub struct ProductView {
    pub id: i64,
    pub seller: UserView,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub price: Decimal,
    pub currency: String,
    pub quantity: i32,
    pub condition: String,
    pub category: Option<ProductCategoryView>,
    pub is_digital: bool,
    pub is_available: bool,
    pub track: Option<TrackView>,
    pub images: Vec<ProductImageView>,
    pub average_rating: Option<f64>,
    pub reviews_count: i64,
    pub views: i64,
    pub is_owner: bool,
    pub is_wishlisted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default)]
pub struct ProductExtras {
    pub category: Option<ProductCategoryView>,
    pub track: Option<TrackView>,
    pub images: Vec<ProductImage>,
    pub reviews: i64,
    pub average_rating: Option<f64>,
    pub viewer_wishlisted: bool,
}

impl ProductView {
    pub fn build(ctx: &ViewContext, p: Product, seller: UserView, extras: ProductExtras) -> Self {
        ProductView {
            images: extras
                .images
                .into_iter()
                .map(|i| ProductImageView {
                    image: ctx.media_url(Some(&i.image)),
                    id: i.id,
                    is_primary: i.is_primary,
                    position: i.position,
                })
                .collect(),
            is_owner: ctx.is_viewer(p.seller_id),
            is_wishlisted: ctx.flag(extras.viewer_wishlisted),
            average_rating: extras.average_rating.map(|r| (r * 100.0).round() / 100.0),
            reviews_count: extras.reviews,
            category: extras.category,
            track: extras.track,
            id: p.id,
            seller,
            title: p.title,
            slug: p.slug,
            description: p.description,
            price: p.price,
            currency: p.currency,
            quantity: p.quantity,
            condition: p.condition,
            is_digital: p.is_digital,
            is_available: p.is_available,
            views: p.views,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

pub async fn product_views(pool: &PgPool, ctx: &ViewContext, rows: Vec<Product>) -> Result<Vec<ProductView>, AppError> {
    let ids: Vec<i64> = rows.iter().map(|p| p.id).collect();
    let sellers = user_map(pool, ctx, &unique_ids(rows.iter().map(|p| p.seller_id))).await?;
    let tracks = track_map(pool, ctx, &unique_ids(rows.iter().filter_map(|p| p.track_id))).await?;
    let category_ids = unique_ids(rows.iter().filter_map(|p| p.category_id));
    let categories: HashMap<i64, ProductCategoryView> = if category_ids.is_empty() {
        HashMap::new()
    } else {
        let found: Vec<ProductCategory> = sqlx::query_as("SELECT * FROM product_categories WHERE id = ANY($1)")
            .bind(&category_ids)
            .fetch_all(pool)
            .await?;
        category_views(pool, found).await?.into_iter().map(|c| (c.id, c)).collect()
    };
    let (mut images, stats) = if ids.is_empty() {
        (HashMap::new(), HashMap::new())
    } else {
        let found: Vec<ProductImage> =
            sqlx::query_as("SELECT * FROM product_images WHERE product_id = ANY($1) ORDER BY position, id")
                .bind(&ids)
                .fetch_all(pool)
                .await?;
        let stats: Vec<(i64, i64, Option<f64>)> = sqlx::query_as(REVIEW_STATS).bind(&ids).fetch_all(pool).await?;
        (
            group_by(found.into_iter().map(|i| (i.product_id, i))),
            stats.into_iter().map(|(id, n, avg)| (id, (n, avg))).collect::<HashMap<_, _>>(),
        )
    };
    let wishlisted = viewer_hits(pool, WISHLISTED, &ids, ctx.viewer).await?;
    Ok(rows
        .into_iter()
        .filter_map(|p| {
            let seller = sellers.get(&p.seller_id)?.clone();
            let (reviews, average_rating) = stats.get(&p.id).copied().unwrap_or((0, None));
            let extras = ProductExtras {
                category: p.category_id.and_then(|id| categories.get(&id).cloned()),
                track: p.track_id.and_then(|id| tracks.get(&id).cloned()),
                images: images.remove(&p.id).unwrap_or_default(),
                reviews,
                average_rating,
                viewer_wishlisted: wishlisted.contains(&p.id),
            };
            Some(ProductView::build(ctx, p, seller, extras))
        })
        .collect())
}

pub async fn product_map(pool: &PgPool, ctx: &ViewContext, ids: &[i64]) -> Result<HashMap<i64, ProductView>, AppError> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows: Vec<Product> = sqlx::query_as("SELECT * FROM products WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(pool)
        .await?;
    Ok(product_views(pool, ctx, rows).await?.into_iter().map(|v| (v.id, v)).collect())
}

pub async fn product_view(pool: &PgPool, ctx: &ViewContext, row: Product) -> Result<ProductView, AppError> {
    super::single(product_views(pool, ctx, vec![row]).await?, "product")
}

#[derive(Clone, Debug, Serialize)]
pub struct CartItemView {
    pub id: i64,
    pub product: ProductView,
    pub quantity: i32,
    pub line_total: Decimal,
    pub added_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize)]
pub struct CartView {
    pub id: i64,
    pub items: Vec<CartItemView>,
    pub item_count: i64,
    pub subtotal: Decimal,
}

/// Sum of live price times quantity.
pub fn cart_subtotal<'a>(lines: impl IntoIterator<Item = (&'a Decimal, i32)>) -> Decimal {
    lines
        .into_iter()
        .map(|(price, qty)| *price * Decimal::from(qty))
        .sum()
}

impl CartView {
    pub fn build(cart_id: i64, items: Vec<CartItemView>) -> Self {
        let subtotal = cart_subtotal(items.iter().map(|i| (&i.product.price, i.quantity)));
        let item_count = items.iter().map(|i| i64::from(i.quantity)).sum();
        CartView { id: cart_id, items, item_count, subtotal }
    }
}

pub async fn cart_view(
    pool: &PgPool,
    ctx: &ViewContext,
    cart_id: i64,
    items: Vec<crate::schema::CartItem>,
) -> Result<CartView, AppError> {
    let products = product_map(pool, ctx, &unique_ids(items.iter().map(|i| i.product_id))).await?;
    let lines = items
        .into_iter()
        .filter_map(|i| {
            let product = products.get(&i.product_id)?.clone();
            Some(CartItemView {
                line_total: product.price * Decimal::from(i.quantity),
                product,
                id: i.id,
                quantity: i.quantity,
                added_at: i.added_at,
            })
        })
        .collect();
    Ok(CartView::build(cart_id, lines))
}

#[derive(Clone, Debug, Serialize)]
pub struct OrderItemView {
    pub id: i64,
    pub product: Option<i64>,
    pub product_title: String,
    pub seller_id: i64,
    pub quantity: i32,
    pub price_at_purchase: Decimal,
    pub total_price: Decimal,
}

impl From<OrderItem> for OrderItemView {
    fn from(i: OrderItem) -> Self {
        OrderItemView {
            total_price: i.total_price(),
            id: i.id,
            product: i.product_id,
            product_title: i.product_title,
            seller_id: i.seller_id,
            quantity: i.quantity,
            price_at_purchase: i.price_at_purchase,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct OrderView {
    pub id: i64,
    pub buyer_id: i64,
    pub status: String,
    pub payment_method: Option<String>,
    pub shipping_address: String,
    pub total_amount: Decimal,
    pub items: Vec<OrderItemView>,
    pub ordered_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderView {
    pub fn build(o: Order, items: Vec<OrderItem>) -> Self {
        OrderView {
            id: o.id,
            buyer_id: o.buyer_id,
            status: o.status,
            payment_method: o.payment_method,
            shipping_address: o.shipping_address,
            total_amount: o.total_amount,
            items: items.into_iter().map(OrderItemView::from).collect(),
            ordered_at: o.ordered_at,
            updated_at: o.updated_at,
        }
    }
}

pub async fn order_views(pool: &PgPool, rows: Vec<Order>) -> Result<Vec<OrderView>, AppError> {
    let ids: Vec<i64> = rows.iter().map(|o| o.id).collect();
    let mut items = if ids.is_empty() {
        HashMap::new()
    } else {
        let found: Vec<OrderItem> = sqlx::query_as("SELECT * FROM order_items WHERE order_id = ANY($1) ORDER BY id")
            .bind(&ids)
            .fetch_all(pool)
            .await?;
        group_by(found.into_iter().map(|i| (i.order_id, i)))
    };
    Ok(rows
        .into_iter()
        .map(|o| {
            let lines = items.remove(&o.id).unwrap_or_default();
            OrderView::build(o, lines)
        })
        .collect())
}

pub async fn order_view(pool: &PgPool, row: Order) -> Result<OrderView, AppError> {
    super::single(order_views(pool, vec![row]).await?, "order")
}

#[derive(Clone, Debug, Serialize)]
pub struct ProductReviewView {
    pub id: i64,
    pub product: i64,
    pub reviewer: UserView,
    pub rating: i16,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

pub async fn review_views(pool: &PgPool, ctx: &ViewContext, rows: Vec<ProductReview>) -> Result<Vec<ProductReviewView>, AppError> {
    let reviewers = user_map(pool, ctx, &unique_ids(rows.iter().map(|r| r.reviewer_id))).await?;
    Ok(rows
        .into_iter()
        .filter_map(|r| {
            Some(ProductReviewView {
                reviewer: reviewers.get(&r.reviewer_id)?.clone(),
                id: r.id,
                product: r.product_id,
                rating: r.rating,
                comment: r.comment,
                created_at: r.created_at,
            })
        })
        .collect())
}

pub async fn review_view(pool: &PgPool, ctx: &ViewContext, row: ProductReview) -> Result<ProductReviewView, AppError> {
    super::single(review_views(pool, ctx, vec![row]).await?, "review")
}

#[derive(Clone, Debug, Serialize)]
pub struct WishlistView {
    pub id: i64,
    pub products: Vec<ProductView>,
    pub created_at: DateTime<Utc>,
}

pub async fn wishlist_view(pool: &PgPool, ctx: &ViewContext, wishlist: Wishlist) -> Result<WishlistView, AppError> {
    let rows: Vec<Product> = sqlx::query_as(
        "SELECT p.* FROM products p JOIN wishlist_products wp ON wp.product_id = p.id \
         WHERE wp.wishlist_id = $1 ORDER BY p.created_at DESC, p.id DESC",
    )
    .bind(wishlist.id)
    .fetch_all(pool)
    .await?;
    Ok(WishlistView {
        id: wishlist.id,
        products: product_views(pool, ctx, rows).await?,
        created_at: wishlist.created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subtotal_sums_price_times_quantity() {
        let a = Decimal::new(1999, 2);
        let b = Decimal::new(500, 2);
        assert_eq!(cart_subtotal([(&a, 2), (&b, 3)]), Decimal::new(5498, 2));
        assert_eq!(cart_subtotal(std::iter::empty()), Decimal::ZERO);
    }

    #[test]
    fn order_lines_use_frozen_price() {
        let order = Order {
            id: 1,
            buyer_id: 2,
            status: "pending".into(),
            payment_method: None,
            shipping_address: String::new(),
            total_amount: Decimal::new(3000, 2),
            ordered_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let item = OrderItem {
            id: 1,
            order_id: 1,
            product_id: Some(7),
            seller_id: 3,
            product_title: "Hymnal".into(),
            quantity: 2,
            price_at_purchase: Decimal::new(1500, 2),
        };
        let view = OrderView::build(order, vec![item]);
        assert_eq!(view.items[0].total_price, Decimal::new(3000, 2));
        assert_eq!(view.items[0].product, Some(7));
    }
}
