use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    repo::take_stock,
    repo_types::{CartItem, Order, OrderItem, OrderStatus, StockLine},
};
use crate::{
    error::{AppError, AppResult},
    products::repo_types::Product,
};

impl OrderStatus {
    /// Legal moves of the order state machine. `Cart -> Pending` belongs to
    /// checkout and `Cart -> Delivered` to order completion; neither goes
    /// through a plain status update.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Cart, Pending)
                | (Cart, Delivered)
                | (Pending, Shipped)
                | (Pending, Cancelled)
                | (Shipped, Delivered)
                | (Shipped, Cancelled)
        )
    }
}

pub fn validate_quantity(quantity: Option<i64>) -> AppResult<i32> {
    match quantity {
        Some(q) if q >= 1 => {
            i32::try_from(q).map_err(|_| AppError::bad_request("Quantity is too large"))
        }
        _ => Err(AppError::bad_request("Valid quantity is required")),
    }
}

/// Sum of `quantity × price_at_purchase`.
pub fn cart_total<I>(lines: I) -> Decimal
where
    I: IntoIterator<Item = (i32, Decimal)>,
{
    lines
        .into_iter()
        .map(|(quantity, price)| Decimal::from(quantity) * price)
        .sum()
}

/// First line asking for more units than are in stock.
pub fn first_shortfall(lines: &[StockLine]) -> Option<&StockLine> {
    lines.iter().find(|l| l.stock_quantity < l.quantity)
}

fn insufficient_stock(line: &StockLine) -> AppError {
    AppError::bad_request(format!(
        "Insufficient stock for product: {}",
        line.product_name
    ))
}

/// Fetches the user's cart with its items, creating an empty one on first access.
pub async fn get_or_create_cart(db: &PgPool, user_id: Uuid) -> AppResult<(Order, Vec<CartItem>)> {
    let mut tx = db.begin().await?;
    Order::ensure_cart(&mut *tx, user_id).await?;
    let cart = Order::find_cart_for_update(&mut *tx, user_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("cart missing right after creation"))?;
    let items = Order::cart_items(&mut *tx, cart.order_id).await?;
    tx.commit().await?;
    Ok((cart, items))
}

/// Adds `quantity` units of a product to the cart, merging with an existing
/// line. Returns the new cart total.
pub async fn add_item(
    db: &PgPool,
    user_id: Uuid,
    product_id: Uuid,
    quantity: i32,
) -> AppResult<Decimal> {
    let mut tx = db.begin().await?;

    let product = Product::find(&mut *tx, product_id)
        .await?
        .ok_or_else(|| AppError::not_found("Product not found"))?;
    if product.stock_quantity < quantity {
        return Err(AppError::bad_request("Insufficient stock available"));
    }

    Order::ensure_cart(&mut *tx, user_id).await?;
    let cart = Order::find_cart_for_update(&mut *tx, user_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("cart missing right after creation"))?;

    match OrderItem::find_in_order(&mut *tx, cart.order_id, product_id).await? {
        Some(existing) => {
            let merged = existing
                .quantity
                .checked_add(quantity)
                .filter(|m| *m <= product.stock_quantity)
                .ok_or_else(|| AppError::bad_request("Insufficient stock for total quantity"))?;
            OrderItem::set_quantity(&mut *tx, existing.order_item_id, merged).await?;
        }
        None => {
            OrderItem::insert(&mut *tx, cart.order_id, product_id, quantity, product.price)
                .await?;
        }
    }

    let total = Order::recompute_total(&mut *tx, cart.order_id).await?;
    tx.commit().await?;
    Ok(total)
}

pub async fn update_item(
    db: &PgPool,
    user_id: Uuid,
    item_id: Uuid,
    quantity: i32,
) -> AppResult<Decimal> {
    let mut tx = db.begin().await?;
    let line = OrderItem::find_owned_cart_line(&mut *tx, item_id, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Cart item not found"))?;
    if line.stock_quantity < quantity {
        return Err(AppError::bad_request("Insufficient stock available"));
    }
    OrderItem::set_quantity(&mut *tx, item_id, quantity).await?;
    let total = Order::recompute_total(&mut *tx, line.order_id).await?;
    tx.commit().await?;
    Ok(total)
}

pub async fn remove_item(db: &PgPool, user_id: Uuid, item_id: Uuid) -> AppResult<Decimal> {
    let mut tx = db.begin().await?;
    let line = OrderItem::find_owned_cart_line(&mut *tx, item_id, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Cart item not found"))?;
    OrderItem::delete(&mut *tx, item_id).await?;
    let total = Order::recompute_total(&mut *tx, line.order_id).await?;
    tx.commit().await?;
    Ok(total)
}

/// Takes every line's quantity out of stock. Any shortfall aborts with a 400
/// and leaves the caller's transaction to roll back.
async fn consume_stock(conn: &mut PgConnection, order_id: Uuid) -> AppResult<()> {
    let lines = Order::stock_lines(&mut *conn, order_id).await?;
    if lines.is_empty() {
        return Err(AppError::bad_request("No items in cart"));
    }
    if let Some(line) = first_shortfall(&lines) {
        warn!(%order_id, product_id = %line.product_id, "checkout stock shortfall");
        return Err(insufficient_stock(line));
    }
    for line in &lines {
        if !take_stock(&mut *conn, line.product_id, line.quantity).await? {
            warn!(%order_id, product_id = %line.product_id, "stock changed during checkout");
            return Err(insufficient_stock(line));
        }
    }
    Ok(())
}

/// Places the user's cart: all stock is taken or none is.
pub async fn checkout(db: &PgPool, user_id: Uuid, shipping_address: &str) -> AppResult<Order> {
    let mut tx = db.begin().await?;
    let cart = Order::find_cart_for_update(&mut *tx, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("No items in cart"))?;

    consume_stock(&mut tx, cart.order_id).await?;
    Order::recompute_total(&mut *tx, cart.order_id).await?;
    let order = Order::mark_placed(
        &mut *tx,
        cart.order_id,
        OrderStatus::Pending,
        Some(shipping_address),
    )
    .await?;
    tx.commit().await?;

    info!(%user_id, order_id = %order.order_id, total = %order.total_amount, "order placed");
    Ok(order)
}

/// Flips a cart straight to `Delivered`. Unlike checkout this neither checks
/// nor takes stock.
pub async fn complete_order(db: &PgPool, user_id: Uuid, order_id: Uuid) -> AppResult<Order> {
    let order = Order::complete_cart(db, user_id, order_id)
        .await?
        .ok_or_else(|| AppError::bad_request("Order not found or already completed"))?;
    info!(%user_id, %order_id, "order completed");
    Ok(order)
}

pub async fn change_status(
    db: &PgPool,
    user_id: Uuid,
    order_id: Uuid,
    next: OrderStatus,
) -> AppResult<Order> {
    let mut tx = db.begin().await?;
    let order = Order::find_owned(&mut *tx, user_id, order_id)
        .await?
        .ok_or_else(|| AppError::not_found("Order not found"))?;
    if order.status == OrderStatus::Cart || !order.status.can_transition_to(next) {
        return Err(AppError::bad_request(format!(
            "Cannot change order status from {} to {}",
            order.status, next
        )));
    }
    let order = Order::set_status(&mut *tx, order_id, next).await?;
    tx.commit().await?;
    info!(%order_id, status = %next, "order status updated");
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn line(name: &str, quantity: i32, stock: i32) -> StockLine {
        StockLine {
            product_id: Uuid::new_v4(),
            product_name: name.into(),
            quantity,
            stock_quantity: stock,
        }
    }

    #[test]
    fn transitions_follow_the_state_machine() {
        use OrderStatus::*;
        assert!(Pending.can_transition_to(Shipped));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Shipped.can_transition_to(Delivered));
        assert!(Shipped.can_transition_to(Cancelled));
        assert!(!Pending.can_transition_to(Delivered));
        assert!(!Delivered.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Pending));
        assert!(!Shipped.can_transition_to(Cart));
    }

    #[test]
    fn status_parses_exact_names() {
        assert_eq!("Shipped".parse::<OrderStatus>(), Ok(OrderStatus::Shipped));
        assert!("shipped".parse::<OrderStatus>().is_err());
        assert!("Lost".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn quantity_must_be_positive() {
        assert_eq!(validate_quantity(Some(3)).unwrap(), 3);
        assert!(validate_quantity(Some(0)).is_err());
        assert!(validate_quantity(Some(-2)).is_err());
        assert!(validate_quantity(None).is_err());
        assert!(validate_quantity(Some(i64::from(i32::MAX) + 1)).is_err());
    }

    #[test]
    fn cart_total_sums_lines() {
        assert_eq!(cart_total(Vec::<(i32, Decimal)>::new()), Decimal::ZERO);
        assert_eq!(
            cart_total([(2, dec!(39.99)), (3, dec!(6.75))]),
            dec!(100.23)
        );
    }

    #[test]
    fn shortfall_names_the_first_short_line() {
        let lines = [line("Whey", 3, 5), line("Creatine", 1, 0), line("Mat", 9, 1)];
        let short = first_shortfall(&lines).unwrap();
        assert_eq!(short.product_name, "Creatine");
        assert!(insufficient_stock(short).to_string().contains("Creatine"));
        assert!(first_shortfall(&lines[..1]).is_none());
    }
}

#[cfg(test)]
mod db_tests {
    use super::*;
    use crate::auth::repo_types::{NewUser, Role, User};
    use rust_decimal_macros::dec;

    async fn user(db: &PgPool, name: &str) -> Uuid {
        User::create(
            db,
            &NewUser {
                username: name,
                email: &format!("{name}@example.com"),
                password_hash: "x",
                phone_number: None,
                address: None,
                role: Role::Customer,
            },
        )
        .await
        .unwrap()
        .user_id
    }

    async fn product(db: &PgPool, name: &str, price: Decimal, stock: i32) -> Uuid {
        sqlx::query_scalar(
            "INSERT INTO products (product_name, price, stock_quantity) VALUES ($1, $2, $3) RETURNING product_id",
        )
        .bind(name)
        .bind(price)
        .bind(stock)
        .fetch_one(db)
        .await
        .unwrap()
    }

    async fn stock(db: &PgPool, product_id: Uuid) -> i32 {
        sqlx::query_scalar("SELECT stock_quantity FROM products WHERE product_id = $1")
            .bind(product_id)
            .fetch_one(db)
            .await
            .unwrap()
    }

    async fn assert_total_matches_lines(db: &PgPool, user_id: Uuid) {
        let (cart, items) = get_or_create_cart(db, user_id).await.unwrap();
        let expected = cart_total(items.iter().map(|i| (i.quantity, i.price_at_purchase)));
        assert_eq!(cart.total_amount, expected);
    }

    #[sqlx::test]
    #[ignore = "needs DATABASE_URL"]
    async fn cart_total_tracks_every_mutation(db: PgPool) {
        let user_id = user(&db, "carter").await;
        let a = product(&db, "Whey", dec!(10.00), 10).await;
        let b = product(&db, "Bar", dec!(5.50), 10).await;

        let (cart, items) = get_or_create_cart(&db, user_id).await.unwrap();
        assert_eq!(cart.status, OrderStatus::Cart);
        assert!(items.is_empty());
        assert_eq!(cart.total_amount, Decimal::ZERO);

        assert_eq!(add_item(&db, user_id, a, 2).await.unwrap(), dec!(20.00));
        assert_eq!(add_item(&db, user_id, b, 1).await.unwrap(), dec!(25.50));
        assert_eq!(add_item(&db, user_id, a, 1).await.unwrap(), dec!(35.50));
        assert_total_matches_lines(&db, user_id).await;

        let (_, items) = get_or_create_cart(&db, user_id).await.unwrap();
        assert_eq!(items.len(), 2);
        let line_a = items.iter().find(|i| i.product_id == a).unwrap();
        assert_eq!(line_a.quantity, 3);
        let line_b = items.iter().find(|i| i.product_id == b).unwrap();

        assert!(matches!(
            add_item(&db, user_id, a, 8).await,
            Err(AppError::BadRequest(_))
        ));
        assert_eq!(
            update_item(&db, user_id, line_a.order_item_id, 1).await.unwrap(),
            dec!(15.50)
        );
        assert_eq!(
            remove_item(&db, user_id, line_b.order_item_id).await.unwrap(),
            dec!(10.00)
        );
        assert_total_matches_lines(&db, user_id).await;

        let other = user(&db, "stranger").await;
        assert!(matches!(
            remove_item(&db, other, line_a.order_item_id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[sqlx::test]
    #[ignore = "needs DATABASE_URL"]
    async fn checkout_is_all_or_nothing(db: PgPool) {
        let user_id = user(&db, "shopper").await;
        let a = product(&db, "Product A", dec!(12.00), 5).await;
        let b = product(&db, "Product B", dec!(3.00), 1).await;
        add_item(&db, user_id, a, 3).await.unwrap();
        add_item(&db, user_id, b, 1).await.unwrap();
        sqlx::query("UPDATE products SET stock_quantity = 0 WHERE product_id = $1")
            .bind(b)
            .execute(&db)
            .await
            .unwrap();

        let err = checkout(&db, user_id, "1 Main St").await.unwrap_err();
        assert!(matches!(&err, AppError::BadRequest(m) if m.contains("Product B")));
        assert_eq!(stock(&db, a).await, 5);
        assert_eq!(stock(&db, b).await, 0);
        let (cart, _) = get_or_create_cart(&db, user_id).await.unwrap();
        assert_eq!(cart.status, OrderStatus::Cart);
    }

    #[sqlx::test]
    #[ignore = "needs DATABASE_URL"]
    async fn checkout_takes_stock_and_places_order(db: PgPool) {
        let user_id = user(&db, "buyer").await;
        let a = product(&db, "Product A", dec!(12.00), 5).await;
        add_item(&db, user_id, a, 3).await.unwrap();

        let order = checkout(&db, user_id, "1 Main St").await.unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total_amount, dec!(36.00));
        assert_eq!(order.shipping_address.as_deref(), Some("1 Main St"));
        assert!(order.order_date.is_some());
        assert_eq!(stock(&db, a).await, 2);

        let (cart, items) = get_or_create_cart(&db, user_id).await.unwrap();
        assert_ne!(cart.order_id, order.order_id);
        assert!(items.is_empty());

        let shipped = change_status(&db, user_id, order.order_id, OrderStatus::Shipped)
            .await
            .unwrap();
        assert_eq!(shipped.status, OrderStatus::Shipped);
        assert!(matches!(
            change_status(&db, user_id, order.order_id, OrderStatus::Pending).await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[sqlx::test]
    #[ignore = "needs DATABASE_URL"]
    async fn complete_order_leaves_stock_alone(db: PgPool) {
        let user_id = user(&db, "payer").await;
        let a = product(&db, "Product A", dec!(2.00), 4).await;
        let b = product(&db, "Product B", dec!(1.00), 1).await;
        add_item(&db, user_id, a, 4).await.unwrap();
        add_item(&db, user_id, b, 1).await.unwrap();
        sqlx::query("UPDATE products SET stock_quantity = 0 WHERE product_id = $1")
            .bind(b)
            .execute(&db)
            .await
            .unwrap();
        let (cart, _) = get_or_create_cart(&db, user_id).await.unwrap();

        let done = complete_order(&db, user_id, cart.order_id).await.unwrap();
        assert_eq!(done.status, OrderStatus::Delivered);
        assert_eq!(stock(&db, a).await, 4);
        assert_eq!(stock(&db, b).await, 0);
        assert!(matches!(
            complete_order(&db, user_id, cart.order_id).await,
            Err(AppError::BadRequest(m)) if m == "Order not found or already completed"
        ));

        let other = user(&db, "bystander").await;
        assert!(matches!(
            complete_order(&db, other, done.order_id).await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[sqlx::test]
    #[ignore = "needs DATABASE_URL"]
    async fn complete_order_accepts_an_empty_cart(db: PgPool) {
        let user_id = user(&db, "window").await;
        let (cart, items) = get_or_create_cart(&db, user_id).await.unwrap();
        assert!(items.is_empty());
        let done = complete_order(&db, user_id, cart.order_id).await.unwrap();
        assert_eq!(done.status, OrderStatus::Delivered);
        assert_eq!(done.total_amount, Decimal::ZERO);
    }
}
