use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{
        CategoryList, CreateProductRequest, CreateReviewRequest, ProductList, ProductPayload,
        ProductWithReviews, ReviewPayload, SupplierProductList,
    },
    repo::supplier_id_for_user,
    repo_types::{Category, NewProduct, Product, Review},
};
use crate::{
    auth::AuthUser,
    error::{is_unique_violation, AppError, AppResult},
    extract::{AppJson, AppPath},
    response::{created, ok, ApiResponse},
    state::AppState,
};

const REVIEWS_ON_DETAIL: i64 = 10;

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products))
        .route("/products/categories/list", get(list_categories))
        .route("/products/:product_id", get(get_product))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/products", post(create_product))
        .route("/products/supplier/mine", get(supplier_products))
        .route("/products/:product_id/reviews", post(create_review))
}

#[instrument(skip(state))]
pub async fn list_products(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    let products = Product::list(&state.db).await?;
    Ok(ok(ProductList { products }))
}

#[instrument(skip(state))]
pub async fn get_product(
    State(state): State<AppState>,
    AppPath(product_id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<ProductWithReviews>>> {
    let product = Product::detail(&state.db, product_id)
        .await?
        .ok_or_else(|| AppError::not_found("Product not found"))?;
    let reviews = Review::latest_for_product(&state.db, product_id, REVIEWS_ON_DETAIL).await?;
    Ok(ok(ProductWithReviews { product, reviews }))
}

#[instrument(skip(state))]
pub async fn list_categories(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<CategoryList>>> {
    let categories = Category::list(&state.db).await?;
    Ok(ok(CategoryList { categories }))
}

#[instrument(skip(state, payload))]
pub async fn create_product(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppJson(payload): AppJson<CreateProductRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<ProductPayload>>)> {
    let valid = payload.validate()?;

    let Some(supplier_id) = supplier_id_for_user(&state.db, user_id).await? else {
        warn!(%user_id, "non-supplier tried to add a product");
        return Err(AppError::Forbidden("Only suppliers can add products".into()));
    };
    if !Category::exists(&state.db, valid.category_id).await? {
        return Err(AppError::bad_request("Category not found"));
    }

    let product = Product::create(
        &state.db,
        &NewProduct {
            supplier_id,
            category_id: valid.category_id,
            product_name: &valid.product_name,
            description: valid.description.as_deref(),
            price: valid.price,
            stock_quantity: valid.stock_quantity,
        },
    )
    .await?;

    info!(product_id = %product.product_id, %supplier_id, "product added");
    Ok(created("Product added successfully", ProductPayload { product }))
}

#[instrument(skip(state))]
pub async fn supplier_products(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<ApiResponse<SupplierProductList>>> {
    let Some(supplier_id) = supplier_id_for_user(&state.db, user_id).await? else {
        return Err(AppError::Forbidden(
            "Only suppliers can view their products".into(),
        ));
    };
    let products = Product::list_by_supplier(&state.db, supplier_id).await?;
    Ok(ok(SupplierProductList { products }))
}

#[instrument(skip(state, payload))]
pub async fn create_review(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppPath(product_id): AppPath<Uuid>,
    AppJson(payload): AppJson<CreateReviewRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<ReviewPayload>>)> {
    let rating = payload.rating()?;

    if !Product::exists(&state.db, product_id).await? {
        return Err(AppError::not_found("Product not found"));
    }
    if Review::exists_for(&state.db, user_id, product_id).await? {
        return Err(AppError::Conflict(
            "You have already reviewed this product".into(),
        ));
    }

    let comment = payload
        .comment
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());
    let review = match Review::create(&state.db, user_id, product_id, rating, comment).await {
        Ok(r) => r,
        Err(e) if is_unique_violation(&e) => {
            return Err(AppError::Conflict(
                "You have already reviewed this product".into(),
            ))
        }
        Err(e) => return Err(e.into()),
    };

    info!(%user_id, %product_id, rating, "review added");
    Ok(created("Review added successfully", ReviewPayload { review }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request};
    use tower::ServiceExt;

    #[tokio::test]
    async fn writes_require_a_session() {
        let app = super::super::router().with_state(AppState::fake());
        let res = app
            .oneshot(
                Request::post("/products")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"product_name":"Bar","price":2.5}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }
}
