use std::{fmt, str::FromStr};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Lifecycle of an order. `Cart` is the open, mutable basket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "order_status")]
pub enum OrderStatus {
    Cart,
    Pending,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Cart => "Cart",
            OrderStatus::Pending => "Pending",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            OrderStatus::Cart,
            OrderStatus::Pending,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ]
        .into_iter()
        .find(|status| status.as_str() == s.trim())
        .ok_or_else(|| format!("unknown order status: {s}"))
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Order {
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub status: OrderStatus,
    pub total_amount: Decimal,
    pub shipping_address: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub order_date: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Order row plus its line count, for listings.
#[derive(Debug, Serialize, FromRow)]
pub struct OrderSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub order: Order,
    pub item_count: i64,
}

/// Cart line joined to the product's current catalogue data.
#[derive(Debug, Serialize, FromRow)]
pub struct CartItem {
    pub order_item_id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub price_at_purchase: Decimal,
    pub product_name: String,
    pub description: Option<String>,
    pub current_price: Decimal,
}

#[derive(Debug, Serialize, FromRow)]
pub struct OrderLine {
    pub order_item_id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub price_at_purchase: Decimal,
    pub product_name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct OrderItem {
    pub order_item_id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub price_at_purchase: Decimal,
}

/// A cart line owned by a given user, with the stock currently available.
#[derive(Debug, Clone, FromRow)]
pub struct OwnedCartLine {
    pub order_item_id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub stock_quantity: i32,
}

/// What checkout needs to know about each line.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct StockLine {
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub stock_quantity: i32,
}
