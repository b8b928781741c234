use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Row of the `products` table.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Product {
    pub product_id: Uuid,
    pub supplier_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub product_name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub stock_quantity: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Catalogue entry with category and rating aggregates.
#[derive(Debug, Serialize, FromRow)]
pub struct ProductSummary {
    pub product_id: Uuid,
    pub product_name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub stock_quantity: i32,
    pub category_id: Option<Uuid>,
    pub category_name: Option<String>,
    pub avg_rating: f64,
    pub review_count: i64,
}

#[derive(Debug, Serialize, FromRow)]
pub struct ProductDetail {
    pub product_id: Uuid,
    pub supplier_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub product_name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub stock_quantity: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub category_name: Option<String>,
    pub supplier_name: Option<String>,
    pub avg_rating: f64,
    pub review_count: i64,
}

#[derive(Debug, Serialize, FromRow)]
pub struct SupplierProduct {
    pub product_id: Uuid,
    pub product_name: String,
    pub stock_quantity: i32,
    pub price: Decimal,
}

#[derive(Debug, Serialize, FromRow)]
pub struct Category {
    pub category_id: Uuid,
    pub category_name: String,
}

#[derive(Debug, Serialize, FromRow)]
pub struct Review {
    pub review_id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub rating: i16,
    pub comment: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub reviewed_at: OffsetDateTime,
}

#[derive(Debug, Serialize, FromRow)]
pub struct ReviewWithAuthor {
    pub review_id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub rating: i16,
    pub comment: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub reviewed_at: OffsetDateTime,
    pub username: String,
}

pub struct NewProduct<'a> {
    pub supplier_id: Uuid,
    pub category_id: Uuid,
    pub product_name: &'a str,
    pub description: Option<&'a str>,
    pub price: Decimal,
    pub stock_quantity: i32,
}
