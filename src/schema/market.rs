//! Marketplace: catalogue, carts, orders, reviews, wishlists.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;
use std::str::FromStr;

pub const PRODUCT_TITLE_MAX: usize = 200;
pub const CATEGORY_NAME_MAX: usize = 100;
pub const DEFAULT_CURRENCY: &str = "USD";

#[derive(Clone, Debug, FromRow)]
pub struct ProductCategory {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Condition {
    New,
    Used,
    Refurbished,
}

impl Condition {
    pub fn as_str(self) -> &'static str {
        match self {
            Condition::New => "NEW",
            Condition::Used => "USED",
            Condition::Refurbished => "REFURBISHED",
        }
    }
}

impl FromStr for Condition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NEW" => Ok(Condition::New),
            "USED" => Ok(Condition::Used),
            "REFURBISHED" => Ok(Condition::Refurbished),
            other => Err(format!("'{}' is not a valid condition (NEW, USED, REFURBISHED)", other)),
        }
    }
}

#[derive(Clone, Debug, FromRow)]
pub struct Product {
    pub id: i64,
    pub seller_id: i64,
    pub category_id: Option<i64>,
    pub track_id: Option<i64>,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub price: Decimal,
    pub currency: String,
    pub quantity: i32,
    pub condition: String,
    pub is_digital: bool,
    pub is_available: bool,
    pub views: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Whether `requested` units can be sold right now. Digital goods have no stock limit.
    pub fn can_supply(&self, requested: i32) -> bool {
        self.is_available && (self.is_digital || self.quantity >= requested)
    }
}

#[derive(Clone, Debug, FromRow)]
pub struct ProductImage {
    pub id: i64,
    pub product_id: i64,
    pub image: String,
    pub is_primary: bool,
    pub position: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, FromRow)]
pub struct Cart {
    pub id: i64,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, FromRow)]
pub struct CartItem {
    pub id: i64,
    pub cart_id: i64,
    pub product_id: i64,
    pub quantity: i32,
    pub added_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Seller-driven fulfilment steps; payment and cancellation have their own operations.
    pub fn can_advance_to(self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Processing, OrderStatus::Shipped) | (OrderStatus::Shipped, OrderStatus::Delivered)
        )
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(OrderStatus::Pending),
            "processing" => Ok(OrderStatus::Processing),
            "shipped" => Ok(OrderStatus::Shipped),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(format!("'{}' is not a valid order status", other)),
        }
    }
}

#[derive(Clone, Debug, FromRow)]
pub struct Order {
    pub id: i64,
    pub buyer_id: i64,
    pub status: String,
    pub payment_method: Option<String>,
    pub shipping_address: String,
    pub total_amount: Decimal,
    pub ordered_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Line of an order. `price_at_purchase` is frozen at checkout.
#[derive(Clone, Debug, FromRow)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: Option<i64>,
    pub seller_id: i64,
    pub product_title: String,
    pub quantity: i32,
    pub price_at_purchase: Decimal,
}

impl OrderItem {
    pub fn total_price(&self) -> Decimal {
        self.price_at_purchase * Decimal::from(self.quantity)
    }
}

#[derive(Clone, Debug, FromRow)]
pub struct ProductReview {
    pub id: i64,
    pub product_id: i64,
    pub reviewer_id: i64,
    pub rating: i16,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, FromRow)]
pub struct Wishlist {
    pub id: i64,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(quantity: i32, is_digital: bool, is_available: bool) -> Product {
        Product {
            id: 1,
            seller_id: 1,
            category_id: None,
            track_id: None,
            title: "Hymnal".into(),
            slug: "hymnal".into(),
            description: String::new(),
            price: Decimal::new(1500, 2),
            currency: DEFAULT_CURRENCY.into(),
            quantity,
            condition: "NEW".into(),
            is_digital,
            is_available,
            views: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn stock_limits_physical_goods_only() {
        assert!(product(2, false, true).can_supply(2));
        assert!(!product(2, false, true).can_supply(3));
        assert!(product(0, true, true).can_supply(10));
        assert!(!product(5, true, false).can_supply(1));
    }

    #[test]
    fn order_item_total_uses_frozen_price() {
        let item = OrderItem {
            id: 1,
            order_id: 1,
            product_id: Some(1),
            seller_id: 2,
            product_title: "Hymnal".into(),
            quantity: 3,
            price_at_purchase: Decimal::new(1250, 2),
        };
        assert_eq!(item.total_price(), Decimal::new(3750, 2));
    }

    #[test]
    fn fulfilment_moves_forward_only() {
        assert!(OrderStatus::Processing.can_advance_to(OrderStatus::Shipped));
        assert!(OrderStatus::Shipped.can_advance_to(OrderStatus::Delivered));
        assert!(!OrderStatus::Pending.can_advance_to(OrderStatus::Shipped));
        assert!(!OrderStatus::Delivered.can_advance_to(OrderStatus::Shipped));
    }

    #[test]
    fn condition_parses_case_insensitively() {
        assert_eq!("used".parse::<Condition>(), Ok(Condition::Used));
        assert!("mint".parse::<Condition>().is_err());
    }
}
