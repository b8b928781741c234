use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::repo_types::{
    Category, Product, ProductDetail, ProductSummary, Review, ReviewWithAuthor, SupplierProduct,
};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub product_name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub stock_quantity: Option<i32>,
    pub category_id: Option<Uuid>,
}

/// Product fields after validation.
#[derive(Debug, PartialEq)]
pub struct ValidProduct {
    pub product_name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub stock_quantity: i32,
    pub category_id: Uuid,
}

impl CreateProductRequest {
    pub fn validate(self) -> Result<ValidProduct, AppError> {
        let name = self
            .product_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        let (Some(product_name), Some(price), Some(category_id)) =
            (name, self.price, self.category_id)
        else {
            return Err(AppError::bad_request(
                "Product name, price, and category are required",
            ));
        };
        if price.is_sign_negative() {
            return Err(AppError::bad_request("Price cannot be negative"));
        }
        let stock_quantity = self.stock_quantity.unwrap_or(0);
        if stock_quantity < 0 {
            return Err(AppError::bad_request("Stock quantity cannot be negative"));
        }
        Ok(ValidProduct {
            product_name,
            description: self.description.filter(|d| !d.trim().is_empty()),
            price: price.round_dp(2),
            stock_quantity,
            category_id,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateReviewRequest {
    pub rating: Option<i64>,
    pub comment: Option<String>,
}

impl CreateReviewRequest {
    pub fn rating(&self) -> Result<i16, AppError> {
        match self.rating {
            Some(r @ 1..=5) => Ok(r as i16),
            _ => Err(AppError::bad_request("Rating must be between 1 and 5")),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProductList {
    pub products: Vec<ProductSummary>,
}

#[derive(Debug, Serialize)]
pub struct SupplierProductList {
    pub products: Vec<SupplierProduct>,
}

#[derive(Debug, Serialize)]
pub struct ProductWithReviews {
    pub product: ProductDetail,
    pub reviews: Vec<ReviewWithAuthor>,
}

#[derive(Debug, Serialize)]
pub struct ProductPayload {
    pub product: Product,
}

#[derive(Debug, Serialize)]
pub struct CategoryList {
    pub categories: Vec<Category>,
}

#[derive(Debug, Serialize)]
pub struct ReviewPayload {
    pub review: Review,
}
