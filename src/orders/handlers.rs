use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::{
    dto::{
        placed_status, AddItemRequest, CartPayload, CartTotal, CartWithItems, OrderDetail,
        OrderList, OrderListQuery, OrderPayload, PlaceOrderRequest, PlacedOrder, StatusRequest,
        UpdateItemRequest,
    },
    repo_types::Order,
    services,
};
use crate::{
    auth::AuthUser,
    error::{AppError, AppResult},
    extract::{AppJson, AppPath, AppQuery},
    response::{created, ok, ok_msg, ApiResponse},
    state::AppState,
};

pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/orders/cart", get(get_cart))
        .route("/orders/cart/items", post(add_item))
        .route(
            "/orders/cart/items/:item_id",
            put(update_item).delete(remove_item),
        )
        .route("/orders/place-order", post(place_order))
}

pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_orders))
        .route("/orders/:order_id", get(get_order))
        .route("/orders/:order_id/status", put(update_status))
        .route("/orders/:order_id/complete", put(complete_order))
}

#[instrument(skip(state))]
pub async fn get_cart(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<ApiResponse<CartPayload>>> {
    let (order, items) = services::get_or_create_cart(&state.db, user_id).await?;
    Ok(ok(CartPayload {
        cart: CartWithItems { order, items },
    }))
}

#[instrument(skip(state, payload))]
pub async fn add_item(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppJson(payload): AppJson<AddItemRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<CartTotal>>)> {
    let Some(product_id) = payload.product_id else {
        return Err(AppError::bad_request(
            "Product ID and valid quantity are required",
        ));
    };
    let quantity = services::validate_quantity(payload.quantity)?;
    let total_amount = services::add_item(&state.db, user_id, product_id, quantity).await?;
    Ok(created(
        "Item added to cart successfully",
        CartTotal { total_amount },
    ))
}

#[instrument(skip(state, payload))]
pub async fn update_item(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppPath(item_id): AppPath<Uuid>,
    AppJson(payload): AppJson<UpdateItemRequest>,
) -> AppResult<Json<ApiResponse<CartTotal>>> {
    let quantity = services::validate_quantity(payload.quantity)?;
    let total_amount = services::update_item(&state.db, user_id, item_id, quantity).await?;
    Ok(ok_msg(
        "Cart item updated successfully",
        CartTotal { total_amount },
    ))
}

#[instrument(skip(state))]
pub async fn remove_item(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppPath(item_id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<CartTotal>>> {
    let total_amount = services::remove_item(&state.db, user_id, item_id).await?;
    Ok(ok_msg(
        "Item removed from cart successfully",
        CartTotal { total_amount },
    ))
}

#[instrument(skip(state, payload))]
pub async fn place_order(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppJson(payload): AppJson<PlaceOrderRequest>,
) -> AppResult<Json<ApiResponse<PlacedOrder>>> {
    let address = payload.address()?;
    let order = services::checkout(&state.db, user_id, address).await?;
    Ok(ok_msg(
        "Order placed successfully",
        PlacedOrder {
            order_id: order.order_id,
            order,
        },
    ))
}

#[instrument(skip(state))]
pub async fn list_orders(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppQuery(query): AppQuery<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let status = query.status()?;
    let orders = Order::list_placed(&state.db, user_id, status).await?;
    Ok(ok(OrderList { orders }))
}

#[instrument(skip(state))]
pub async fn get_order(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppPath(order_id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<OrderDetail>>> {
    let mut tx = state.db.begin().await?;
    let order = Order::find_owned(&mut *tx, user_id, order_id)
        .await?
        .ok_or_else(|| AppError::not_found("Order not found"))?;
    let items = Order::lines(&mut *tx, order_id).await?;
    tx.commit().await?;
    Ok(ok(OrderDetail { order, items }))
}

#[instrument(skip(state, payload))]
pub async fn update_status(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppPath(order_id): AppPath<Uuid>,
    AppJson(payload): AppJson<StatusRequest>,
) -> AppResult<Json<ApiResponse<OrderPayload>>> {
    let next = placed_status(payload.status.as_deref().unwrap_or_default())?;
    let order = services::change_status(&state.db, user_id, order_id, next).await?;
    Ok(ok_msg(
        "Order status updated successfully",
        OrderPayload { order },
    ))
}

#[instrument(skip(state))]
pub async fn complete_order(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppPath(order_id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<OrderPayload>>> {
    let order = services::complete_order(&state.db, user_id, order_id).await?;
    Ok(ok_msg("Order placed successfully", OrderPayload { order }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::services::JwtKeys;
    use axum::{
        body::Body,
        extract::FromRef,
        http::{header, Request},
    };
    use tower::ServiceExt;

    async fn call(method: &str, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        let state = AppState::fake();
        let token = JwtKeys::from_ref(&state)
            .sign_access(Uuid::new_v4())
            .unwrap();
        let res = super::super::router()
            .with_state(state)
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn add_item_rejects_bad_quantity() {
        let (status, body) = call(
            "POST",
            "/orders/cart/items",
            serde_json::json!({"productId": Uuid::new_v4(), "quantity": 0}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn mistyped_product_id_is_a_json_400() {
        let (status, body) = call(
            "POST",
            "/orders/cart/items",
            serde_json::json!({"productId": 12, "quantity": 1}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["message"].is_string());
    }

    #[tokio::test]
    async fn malformed_order_id_is_a_json_400() {
        let (status, body) = call("GET", "/orders/not-a-uuid", serde_json::json!({})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn place_order_requires_address() {
        let (status, body) = call(
            "POST",
            "/orders/place-order",
            serde_json::json!({"shippingAddress": "  "}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Shipping address is required");
    }

    #[tokio::test]
    async fn status_update_rejects_unknown_status() {
        let uri = format!("/orders/{}/status", Uuid::new_v4());
        let (status, _) = call("PUT", &uri, serde_json::json!({"status": "Cart"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn list_rejects_bad_filter() {
        let (status, _) = call("GET", "/orders?status=Lost", serde_json::json!({})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
