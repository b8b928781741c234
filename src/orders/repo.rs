use anyhow::Context;
use rust_decimal::Decimal;
use sqlx::PgExecutor;
use uuid::Uuid;

use super::repo_types::{
    CartItem, Order, OrderItem, OrderLine, OrderStatus, OrderSummary, OwnedCartLine, StockLine,
};

const ORDER_COLUMNS: &str =
    "order_id, user_id, status, total_amount, shipping_address, order_date, created_at";

impl Order {
    /// The user's open cart, row-locked when run inside a transaction.
    pub async fn find_cart_for_update(
        db: impl PgExecutor<'_>,
        user_id: Uuid,
    ) -> anyhow::Result<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 AND status = 'Cart' FOR UPDATE"
        ))
        .bind(user_id)
        .fetch_optional(db)
        .await
        .context("find cart")?;
        Ok(order)
    }

    /// Inserts an empty cart unless the user already has one.
    pub async fn ensure_cart(db: impl PgExecutor<'_>, user_id: Uuid) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (user_id, total_amount, status)
            VALUES ($1, 0, 'Cart')
            ON CONFLICT (user_id) WHERE status = 'Cart' DO NOTHING
            "#,
        )
        .bind(user_id)
        .execute(db)
        .await
        .context("create cart")?;
        Ok(())
    }

    pub async fn find_owned(
        db: impl PgExecutor<'_>,
        user_id: Uuid,
        order_id: Uuid,
    ) -> anyhow::Result<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE order_id = $1 AND user_id = $2 FOR UPDATE"
        ))
        .bind(order_id)
        .bind(user_id)
        .fetch_optional(db)
        .await
        .context("find order")?;
        Ok(order)
    }

    /// Non-cart orders of a user, newest first.
    pub async fn list_placed(
        db: impl PgExecutor<'_>,
        user_id: Uuid,
        status: Option<OrderStatus>,
    ) -> anyhow::Result<Vec<OrderSummary>> {
        let rows = sqlx::query_as::<_, OrderSummary>(
            r#"
            SELECT o.order_id, o.user_id, o.status, o.total_amount, o.shipping_address,
                   o.order_date, o.created_at,
                   COUNT(oi.order_item_id) AS item_count
              FROM orders o
              LEFT JOIN order_items oi ON oi.order_id = o.order_id
             WHERE o.user_id = $1
               AND o.status <> 'Cart'
               AND ($2::order_status IS NULL OR o.status = $2)
             GROUP BY o.order_id
             ORDER BY o.order_date DESC NULLS LAST, o.created_at DESC
            "#,
        )
        .bind(user_id)
        .bind(status)
        .fetch_all(db)
        .await
        .context("list orders")?;
        Ok(rows)
    }

    pub async fn cart_items(db: impl PgExecutor<'_>, order_id: Uuid) -> anyhow::Result<Vec<CartItem>> {
        let rows = sqlx::query_as::<_, CartItem>(
            r#"
            SELECT oi.order_item_id, oi.order_id, oi.product_id, oi.quantity, oi.price_at_purchase,
                   p.product_name, p.description, p.price AS current_price
              FROM order_items oi
              JOIN products p ON p.product_id = oi.product_id
             WHERE oi.order_id = $1
             ORDER BY oi.created_at
            "#,
        )
        .bind(order_id)
        .fetch_all(db)
        .await
        .context("list cart items")?;
        Ok(rows)
    }

    pub async fn lines(db: impl PgExecutor<'_>, order_id: Uuid) -> anyhow::Result<Vec<OrderLine>> {
        let rows = sqlx::query_as::<_, OrderLine>(
            r#"
            SELECT oi.order_item_id, oi.order_id, oi.product_id, oi.quantity, oi.price_at_purchase,
                   p.product_name, p.description
              FROM order_items oi
              JOIN products p ON p.product_id = oi.product_id
             WHERE oi.order_id = $1
             ORDER BY oi.created_at
            "#,
        )
        .bind(order_id)
        .fetch_all(db)
        .await
        .context("list order lines")?;
        Ok(rows)
    }

    /// Lines with their product's stock, products locked for the rest of the transaction.
    pub async fn stock_lines(
        db: impl PgExecutor<'_>,
        order_id: Uuid,
    ) -> anyhow::Result<Vec<StockLine>> {
        let rows = sqlx::query_as::<_, StockLine>(
            r#"
            SELECT oi.product_id, p.product_name, oi.quantity, p.stock_quantity
              FROM order_items oi
              JOIN products p ON p.product_id = oi.product_id
             WHERE oi.order_id = $1
             ORDER BY p.product_id
               FOR UPDATE OF p
            "#,
        )
        .bind(order_id)
        .fetch_all(db)
        .await
        .context("load checkout lines")?;
        Ok(rows)
    }

    /// Sets `total_amount` to the sum of its lines and returns it.
    pub async fn recompute_total(db: impl PgExecutor<'_>, order_id: Uuid) -> anyhow::Result<Decimal> {
        let total: Decimal = sqlx::query_scalar(
            r#"
            UPDATE orders
               SET total_amount = COALESCE(
                       (SELECT SUM(quantity * price_at_purchase) FROM order_items WHERE order_id = $1),
                       0)
             WHERE order_id = $1
            RETURNING total_amount
            "#,
        )
        .bind(order_id)
        .fetch_one(db)
        .await
        .context("recompute order total")?;
        Ok(total)
    }

    pub async fn mark_placed(
        db: impl PgExecutor<'_>,
        order_id: Uuid,
        status: OrderStatus,
        shipping_address: Option<&str>,
    ) -> anyhow::Result<Order> {
        let order = sqlx::query_as::<_, Order>(&format!(
            r#"
            UPDATE orders
               SET status = $2,
                   shipping_address = COALESCE($3, shipping_address),
                   order_date = now()
             WHERE order_id = $1
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(order_id)
        .bind(status)
        .bind(shipping_address)
        .fetch_one(db)
        .await
        .context("place order")?;
        Ok(order)
    }

    pub async fn set_status(
        db: impl PgExecutor<'_>,
        order_id: Uuid,
        status: OrderStatus,
    ) -> anyhow::Result<Order> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "UPDATE orders SET status = $2 WHERE order_id = $1 RETURNING {ORDER_COLUMNS}"
        ))
        .bind(order_id)
        .bind(status)
        .fetch_one(db)
        .await
        .context("update order status")?;
        Ok(order)
    }

    /// Flips the user's cart to `Delivered` in one statement; stock is untouched.
    /// `None` when the order is not the user's or is no longer a cart.
    pub async fn complete_cart(
        db: impl PgExecutor<'_>,
        user_id: Uuid,
        order_id: Uuid,
    ) -> anyhow::Result<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(&format!(
            r#"
            UPDATE orders
               SET status = 'Delivered'
             WHERE order_id = $1 AND user_id = $2 AND status = 'Cart'
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(order_id)
        .bind(user_id)
        .fetch_optional(db)
        .await
        .context("complete cart")?;
        Ok(order)
    }
}

impl OrderItem {
    pub async fn find_in_order(
        db: impl PgExecutor<'_>,
        order_id: Uuid,
        product_id: Uuid,
    ) -> anyhow::Result<Option<OrderItem>> {
        let item = sqlx::query_as::<_, OrderItem>(
            r#"
            SELECT order_item_id, order_id, product_id, quantity, price_at_purchase
              FROM order_items
             WHERE order_id = $1 AND product_id = $2
            "#,
        )
        .bind(order_id)
        .bind(product_id)
        .fetch_optional(db)
        .await
        .context("find order item")?;
        Ok(item)
    }

    /// A line of the user's open cart, with current product stock.
    pub async fn find_owned_cart_line(
        db: impl PgExecutor<'_>,
        item_id: Uuid,
        user_id: Uuid,
    ) -> anyhow::Result<Option<OwnedCartLine>> {
        let line = sqlx::query_as::<_, OwnedCartLine>(
            r#"
            SELECT oi.order_item_id, oi.order_id, oi.product_id, oi.quantity, p.stock_quantity
              FROM order_items oi
              JOIN orders o ON o.order_id = oi.order_id
              JOIN products p ON p.product_id = oi.product_id
             WHERE oi.order_item_id = $1 AND o.user_id = $2 AND o.status = 'Cart'
               FOR UPDATE OF oi
            "#,
        )
        .bind(item_id)
        .bind(user_id)
        .fetch_optional(db)
        .await
        .context("find cart line")?;
        Ok(line)
    }

    pub async fn insert(
        db: impl PgExecutor<'_>,
        order_id: Uuid,
        product_id: Uuid,
        quantity: i32,
        price: Decimal,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO order_items (order_id, product_id, quantity, price_at_purchase)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(order_id)
        .bind(product_id)
        .bind(quantity)
        .bind(price)
        .execute(db)
        .await
        .context("insert order item")?;
        Ok(())
    }

    pub async fn set_quantity(
        db: impl PgExecutor<'_>,
        item_id: Uuid,
        quantity: i32,
    ) -> anyhow::Result<()> {
        sqlx::query("UPDATE order_items SET quantity = $2 WHERE order_item_id = $1")
            .bind(item_id)
            .bind(quantity)
            .execute(db)
            .await
            .context("update order item")?;
        Ok(())
    }

    pub async fn delete(db: impl PgExecutor<'_>, item_id: Uuid) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM order_items WHERE order_item_id = $1")
            .bind(item_id)
            .execute(db)
            .await
            .context("delete order item")?;
        Ok(())
    }
}

/// Takes `quantity` units from stock. Returns false, changing nothing, when
/// fewer than `quantity` units are left.
pub async fn take_stock(
    db: impl PgExecutor<'_>,
    product_id: Uuid,
    quantity: i32,
) -> anyhow::Result<bool> {
    let res = sqlx::query(
        r#"
        UPDATE products
           SET stock_quantity = stock_quantity - $1
         WHERE product_id = $2 AND stock_quantity >= $1
        "#,
    )
    .bind(quantity)
    .bind(product_id)
    .execute(db)
    .await
    .context("decrement stock")?;
    Ok(res.rows_affected() == 1)
}
