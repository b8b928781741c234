use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::repo_types::{CartItem, Order, OrderLine, OrderStatus, OrderSummary};
use crate::error::{AppError, AppResult};

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    #[serde(rename = "productId", alias = "product_id")]
    pub product_id: Option<Uuid>,
    pub quantity: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub quantity: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct PlaceOrderRequest {
    #[serde(rename = "shippingAddress", alias = "shipping_address")]
    pub shipping_address: Option<String>,
}

impl PlaceOrderRequest {
    pub fn address(&self) -> AppResult<&str> {
        self.shipping_address
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .ok_or_else(|| AppError::bad_request("Shipping address is required"))
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: Option<String>,
}

/// Parses a status a client may set or filter by; `Cart` is never one of them.
pub fn placed_status(raw: &str) -> AppResult<OrderStatus> {
    match raw.parse::<OrderStatus>() {
        Ok(OrderStatus::Cart) | Err(_) => Err(AppError::bad_request("Invalid order status")),
        Ok(status) => Ok(status),
    }
}

#[derive(Debug, Deserialize)]
pub struct OrderListQuery {
    pub status: Option<String>,
}

impl OrderListQuery {
    pub fn status(&self) -> AppResult<Option<OrderStatus>> {
        match self.status.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => placed_status(raw).map(Some),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CartWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<CartItem>,
}

#[derive(Debug, Serialize)]
pub struct CartPayload {
    pub cart: CartWithItems,
}

#[derive(Debug, Serialize)]
pub struct CartTotal {
    pub total_amount: Decimal,
}

#[derive(Debug, Serialize)]
pub struct PlacedOrder {
    #[serde(rename = "orderId")]
    pub order_id: Uuid,
    pub order: Order,
}

#[derive(Debug, Serialize)]
pub struct OrderList {
    pub orders: Vec<OrderSummary>,
}

#[derive(Debug, Serialize)]
pub struct OrderDetail {
    pub order: Order,
    pub items: Vec<OrderLine>,
}

#[derive(Debug, Serialize)]
pub struct OrderPayload {
    pub order: Order,
}
