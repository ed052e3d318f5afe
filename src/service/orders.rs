//! Carts, checkout, and order fulfilment.
//!
//! Checkout runs in one transaction: the cart's products are locked with
//! `FOR UPDATE`, stock is verified and decremented, and each order line records
//! the price paid so later price changes never alter an order's totals.

use super::{Page, RequestValidator};
use crate::error::AppError;
use crate::extractors::FormData;
use crate::schema::{Cart, CartItem, Order, OrderItem, OrderStatus, Product};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use std::collections::HashMap;

const PAYMENT_METHOD_MAX: usize = 50;

/// The viewer's cart, created on first use.
pub async fn cart(pool: &PgPool, viewer: i64) -> Result<Cart, AppError> {
    sqlx::query("INSERT INTO carts (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
        .bind(viewer)
        .execute(pool)
        .await?;
    let cart = sqlx::query_as("SELECT * FROM carts WHERE user_id = $1")
        .bind(viewer)
        .fetch_one(pool)
        .await?;
    Ok(cart)
}

pub async fn cart_items(pool: &PgPool, cart_id: i64) -> Result<Vec<CartItem>, AppError> {
    let rows = sqlx::query_as("SELECT * FROM cart_items WHERE cart_id = $1 ORDER BY added_at, id")
        .bind(cart_id)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

async fn touch_cart(conn: &mut PgConnection, cart_id: i64) -> Result<(), AppError> {
    sqlx::query("UPDATE carts SET updated_at = NOW() WHERE id = $1")
        .bind(cart_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Checks a product can go into the viewer's cart in the requested quantity.
fn check_purchasable(product: &Product, viewer: i64, quantity: i32) -> Result<(), AppError> {
    if product.seller_id == viewer {
        return Err(AppError::BadRequest("you cannot buy your own product".into()));
    }
    if !product.is_available {
        return Err(AppError::invalid("product_id", format!("'{}' is not available", product.title)));
    }
    if !product.can_supply(quantity) {
        return Err(AppError::invalid(
            "quantity",
            format!("only {} of '{}' left in stock", product.quantity, product.title),
        ));
    }
    Ok(())
}

/// Adds `{product_id, quantity}` to the cart, merging with an existing line for the same product.
pub async fn add_item(pool: &PgPool, viewer: i64, form: &FormData) -> Result<CartItem, AppError> {
    let product_id = form.parse::<i64>("product_id")?;
    let quantity = form.parse::<i32>("quantity")?.unwrap_or(1);
    RequestValidator::new()
        .required("product_id", product_id)
        .minimum("quantity", Some(i64::from(quantity)), 1)
        .finish()?;
    let product: Product = sqlx::query_as("SELECT * FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::invalid("product_id", "Product not found."))?;
    let cart = cart(pool, viewer).await?;
    let mut tx = pool.begin().await?;
    let existing: Option<(i32,)> = sqlx::query_as("SELECT quantity FROM cart_items WHERE cart_id = $1 AND product_id = $2")
        .bind(cart.id)
        .bind(product.id)
        .fetch_optional(&mut *tx)
        .await?;
    let total = existing.map_or(0, |(q,)| q).saturating_add(quantity);
    check_purchasable(&product, viewer, total)?;
    let item: CartItem = sqlx::query_as(
        "INSERT INTO cart_items (cart_id, product_id, quantity) VALUES ($1, $2, $3) \
         ON CONFLICT (cart_id, product_id) DO UPDATE SET quantity = EXCLUDED.quantity RETURNING *",
    )
    .bind(cart.id)
    .bind(product.id)
    .bind(total)
    .fetch_one(&mut *tx)
    .await?;
    touch_cart(&mut *tx, cart.id).await?;
    tx.commit().await?;
    Ok(item)
}

async fn own_item(pool: &PgPool, viewer: i64, item_id: i64) -> Result<CartItem, AppError> {
    sqlx::query_as(
        "SELECT ci.* FROM cart_items ci JOIN carts c ON c.id = ci.cart_id WHERE ci.id = $1 AND c.user_id = $2",
    )
    .bind(item_id)
    .bind(viewer)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("cart item {}", item_id)))
}

pub async fn update_item(pool: &PgPool, viewer: i64, item_id: i64, form: &FormData) -> Result<CartItem, AppError> {
    let item = own_item(pool, viewer, item_id).await?;
    let quantity = form.parse::<i32>("quantity")?;
    RequestValidator::new()
        .required("quantity", quantity)
        .minimum("quantity", quantity.map(i64::from), 1)
        .finish()?;
    let quantity = quantity.unwrap_or(1);
    let product: Product = sqlx::query_as("SELECT * FROM products WHERE id = $1")
        .bind(item.product_id)
        .fetch_one(pool)
        .await?;
    check_purchasable(&product, viewer, quantity)?;
    let updated = sqlx::query_as("UPDATE cart_items SET quantity = $2 WHERE id = $1 RETURNING *")
        .bind(item_id)
        .bind(quantity)
        .fetch_one(pool)
        .await?;
    Ok(updated)
}

pub async fn remove_item(pool: &PgPool, viewer: i64, item_id: i64) -> Result<(), AppError> {
    own_item(pool, viewer, item_id).await?;
    sqlx::query("DELETE FROM cart_items WHERE id = $1").bind(item_id).execute(pool).await?;
    Ok(())
}

/// One line of a checkout plan: the locked product and how many units are bought.
#[derive(Clone, Debug)]
pub struct CheckoutLine {
    pub product: Product,
    pub quantity: i32,
}

/// Order total from the prices captured at checkout.
pub fn order_total(lines: &[CheckoutLine]) -> Decimal {
    lines.iter().map(|l| l.product.price * Decimal::from(l.quantity)).sum()
}

/// Verifies every line can still be supplied, reporting each failing product.
pub fn verify_stock(lines: &[CheckoutLine]) -> Result<(), AppError> {
    let mut v = RequestValidator::new();
    for line in lines {
        if !line.product.can_supply(line.quantity) {
            let msg = if line.product.is_available {
                format!("only {} of '{}' left in stock", line.product.quantity, line.product.title)
            } else {
                format!("'{}' is no longer available", line.product.title)
            };
            v.fail("items", msg);
        }
    }
    v.finish()
}

/// Turns the viewer's cart into a pending order.
pub async fn checkout(pool: &PgPool, viewer: i64, form: &FormData) -> Result<(Order, Vec<OrderItem>), AppError> {
    let payment_method = form.trimmed("payment_method");
    RequestValidator::new()
        .max_length("payment_method", payment_method.as_deref(), PAYMENT_METHOD_MAX)
        .finish()?;
    let cart = cart(pool, viewer).await?;
    let mut tx = pool.begin().await?;
    // Concurrent checkouts of one cart queue here; the later one finds it empty.
    sqlx::query("SELECT id FROM carts WHERE id = $1 FOR UPDATE")
        .bind(cart.id)
        .execute(&mut *tx)
        .await?;
    let items: Vec<CartItem> = sqlx::query_as("SELECT * FROM cart_items WHERE cart_id = $1 ORDER BY added_at, id")
        .bind(cart.id)
        .fetch_all(&mut *tx)
        .await?;
    if items.is_empty() {
        return Err(AppError::BadRequest("your cart is empty".into()));
    }
    let ids: Vec<i64> = items.iter().map(|i| i.product_id).collect();
    let locked: Vec<Product> = sqlx::query_as("SELECT * FROM products WHERE id = ANY($1) ORDER BY id FOR UPDATE")
        .bind(&ids)
        .fetch_all(&mut *tx)
        .await?;
    let mut by_id: HashMap<i64, Product> = locked.into_iter().map(|p| (p.id, p)).collect();
    let lines: Vec<CheckoutLine> = items
        .iter()
        .filter_map(|i| by_id.remove(&i.product_id).map(|product| CheckoutLine { product, quantity: i.quantity }))
        .collect();
    if lines.iter().any(|l| l.product.seller_id == viewer) {
        return Err(AppError::BadRequest("you cannot buy your own product".into()));
    }
    verify_stock(&lines)?;

    let order: Order = sqlx::query_as(
        "INSERT INTO orders (buyer_id, payment_method, shipping_address, total_amount) VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(viewer)
    .bind(payment_method)
    .bind(form.text("shipping_address").unwrap_or_default())
    .bind(order_total(&lines))
    .fetch_one(&mut *tx)
    .await?;
    let mut order_items = Vec::with_capacity(lines.len());
    for line in &lines {
        let p = &line.product;
        let item: OrderItem = sqlx::query_as(
            "INSERT INTO order_items (order_id, product_id, seller_id, product_title, quantity, price_at_purchase) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
        )
        .bind(order.id)
        .bind(p.id)
        .bind(p.seller_id)
        .bind(&p.title)
        .bind(line.quantity)
        .bind(p.price)
        .fetch_one(&mut *tx)
        .await?;
        order_items.push(item);
        if !p.is_digital {
            sqlx::query(
                "UPDATE products SET quantity = quantity - $2, is_available = (quantity - $2) > 0, updated_at = NOW() \
                 WHERE id = $1",
            )
            .bind(p.id)
            .bind(line.quantity)
            .execute(&mut *tx)
            .await?;
        }
    }
    sqlx::query("DELETE FROM cart_items WHERE cart_id = $1").bind(cart.id).execute(&mut *tx).await?;
    touch_cart(&mut *tx, cart.id).await?;
    tx.commit().await?;
    tracing::info!(order_id = order.id, buyer_id = viewer, lines = order_items.len(), total = %order.total_amount, "order placed");
    Ok((order, order_items))
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct OrderFilter {
    /// List orders that contain the viewer's products instead of the viewer's purchases.
    #[serde(default)]
    pub as_seller: bool,
}

pub async fn list(pool: &PgPool, viewer: i64, filter: &OrderFilter, page: Page) -> Result<Vec<Order>, AppError> {
    let sql = if filter.as_seller {
        "SELECT o.* FROM orders o WHERE EXISTS (SELECT 1 FROM order_items i WHERE i.order_id = o.id AND i.seller_id = $1) \
         ORDER BY o.ordered_at DESC, o.id DESC LIMIT $2 OFFSET $3"
    } else {
        "SELECT * FROM orders WHERE buyer_id = $1 ORDER BY ordered_at DESC, id DESC LIMIT $2 OFFSET $3"
    };
    tracing::debug!(sql, viewer, "query");
    let rows = sqlx::query_as(sql)
        .bind(viewer)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

async fn fetch(pool: &PgPool, id: i64) -> Result<Order, AppError> {
    sqlx::query_as("SELECT * FROM orders WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {}", id)))
}

async fn sells_in(pool: &PgPool, order_id: i64, viewer: i64) -> Result<bool, AppError> {
    let (hit,): (bool,) =
        sqlx::query_as("SELECT EXISTS (SELECT 1 FROM order_items WHERE order_id = $1 AND seller_id = $2)")
            .bind(order_id)
            .bind(viewer)
            .fetch_one(pool)
            .await?;
    Ok(hit)
}

/// Visible to the buyer and to anyone selling an item in it. Others get 404.
pub async fn get(pool: &PgPool, viewer: i64, id: i64) -> Result<Order, AppError> {
    let order = fetch(pool, id).await?;
    if order.buyer_id == viewer || sells_in(pool, id, viewer).await? {
        Ok(order)
    } else {
        Err(AppError::NotFound(format!("order {}", id)))
    }
}

fn status_of(order: &Order) -> Result<OrderStatus, AppError> {
    order.status.parse::<OrderStatus>().map_err(AppError::Internal)
}

async fn buyer_order(pool: &PgPool, viewer: i64, id: i64) -> Result<Order, AppError> {
    let order = get(pool, viewer, id).await?;
    if order.buyer_id != viewer {
        tracing::warn!(order_id = id, viewer, "buyer action by non-buyer rejected");
        return Err(AppError::Forbidden("only the buyer can do this".into()));
    }
    Ok(order)
}

/// Records payment: pending becomes processing.
pub async fn pay(pool: &PgPool, viewer: i64, id: i64, form: &FormData) -> Result<Order, AppError> {
    let order = buyer_order(pool, viewer, id).await?;
    let payment_method = form.trimmed("payment_method").or(order.payment_method.clone());
    RequestValidator::new()
        .required("payment_method", payment_method.as_deref())
        .max_length("payment_method", payment_method.as_deref(), PAYMENT_METHOD_MAX)
        .finish()?;
    let paid: Option<Order> = sqlx::query_as(
        "UPDATE orders SET status = 'processing', payment_method = $2, updated_at = NOW() \
         WHERE id = $1 AND status = 'pending' RETURNING *",
    )
    .bind(id)
    .bind(payment_method)
    .fetch_optional(pool)
    .await?;
    let paid = paid.ok_or_else(|| AppError::Conflict(format!("order is {}, not pending", order.status)))?;
    tracing::info!(order_id = id, "order paid");
    Ok(paid)
}

/// Cancels a pending order and returns its physical stock.
pub async fn cancel(pool: &PgPool, viewer: i64, id: i64) -> Result<Order, AppError> {
    let order = buyer_order(pool, viewer, id).await?;
    let mut tx = pool.begin().await?;
    let cancelled: Option<Order> = sqlx::query_as(
        "UPDATE orders SET status = 'cancelled', updated_at = NOW() WHERE id = $1 AND status = 'pending' RETURNING *",
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?;
    let cancelled = cancelled.ok_or_else(|| AppError::Conflict(format!("order is {}, only pending orders can be cancelled", order.status)))?;
    sqlx::query(
        "UPDATE products p SET quantity = p.quantity + i.quantity, is_available = TRUE, updated_at = NOW() \
         FROM order_items i WHERE i.order_id = $1 AND i.product_id = p.id AND NOT p.is_digital",
    )
    .bind(id)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;
    tracing::info!(order_id = id, "order cancelled");
    Ok(cancelled)
}

/// Seller-driven fulfilment step, `{status}` one of shipped or delivered.
pub async fn advance(pool: &PgPool, viewer: i64, id: i64, form: &FormData) -> Result<Order, AppError> {
    let order = get(pool, viewer, id).await?;
    if !sells_in(pool, id, viewer).await? {
        tracing::warn!(order_id = id, viewer, "status change by non-seller rejected");
        return Err(AppError::Forbidden("only a seller in this order can update its status".into()));
    }
    let raw = form.trimmed("status");
    RequestValidator::new().required("status", raw.as_deref()).finish()?;
    let next = raw
        .unwrap_or_default()
        .parse::<OrderStatus>()
        .map_err(|e| AppError::invalid("status", e))?;
    let current = status_of(&order)?;
    if !current.can_advance_to(next) {
        return Err(AppError::invalid(
            "status",
            format!("cannot move an order from {} to {}", current.as_str(), next.as_str()),
        ));
    }
    let updated: Option<Order> = sqlx::query_as(
        "UPDATE orders SET status = $3, updated_at = NOW() WHERE id = $1 AND status = $2 RETURNING *",
    )
    .bind(id)
    .bind(current.as_str())
    .bind(next.as_str())
    .fetch_optional(pool)
    .await?;
    updated.ok_or_else(|| AppError::Conflict("order status changed concurrently".into()))
}

pub async fn items_of(pool: &PgPool, order_id: i64) -> Result<Vec<OrderItem>, AppError> {
    let rows = sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id")
        .bind(order_id)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn product(id: i64, price: i64, quantity: i32, is_digital: bool) -> Product {
        Product {
            id,
            seller_id: 9,
            category_id: None,
            track_id: None,
            title: format!("item {}", id),
            slug: format!("item-{}", id),
            description: String::new(),
            price: Decimal::new(price, 2),
            currency: "USD".into(),
            quantity,
            condition: "NEW".into(),
            is_digital,
            is_available: true,
            views: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn total_uses_checkout_prices() {
        let lines = vec![
            CheckoutLine { product: product(1, 1000, 5, false), quantity: 2 },
            CheckoutLine { product: product(2, 250, 0, true), quantity: 3 },
        ];
        assert_eq!(order_total(&lines), Decimal::new(2750, 2));
    }

    #[test]
    fn stock_shortfalls_are_reported() {
        let lines = vec![
            CheckoutLine { product: product(1, 1000, 1, false), quantity: 2 },
            CheckoutLine { product: product(2, 250, 0, true), quantity: 3 },
        ];
        match verify_stock(&lines) {
            Err(AppError::Validation(e)) => assert_eq!(e.field("items").map(<[String]>::len), Some(1)),
            other => panic!("expected stock failure, got {other:?}"),
        }
    }

    #[test]
    fn own_products_cannot_be_bought() {
        let p = product(1, 1000, 5, false);
        assert!(matches!(check_purchasable(&p, 9, 1), Err(AppError::BadRequest(_))));
        assert!(check_purchasable(&p, 3, 5).is_ok());
        assert!(matches!(check_purchasable(&p, 3, 6), Err(AppError::Validation(_))));
    }

    #[test]
    fn as_seller_defaults_off() {
        let f: OrderFilter = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(!f.as_seller);
    }
}
