use anyhow::Context;
use sqlx::PgExecutor;
use uuid::Uuid;

use super::repo_types::{
    Category, NewProduct, Product, ProductDetail, ProductSummary, Review, ReviewWithAuthor,
    SupplierProduct,
};

const PRODUCT_COLUMNS: &str = "product_id, supplier_id, category_id, product_name, description, \
     price, stock_quantity, created_at";

impl Product {
    pub async fn find(db: impl PgExecutor<'_>, product_id: Uuid) -> anyhow::Result<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE product_id = $1"
        ))
        .bind(product_id)
        .fetch_optional(db)
        .await
        .context("find product")?;
        Ok(product)
    }

    pub async fn exists(db: impl PgExecutor<'_>, product_id: Uuid) -> anyhow::Result<bool> {
        let found: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM products WHERE product_id = $1)")
                .bind(product_id)
                .fetch_one(db)
                .await
                .context("check product exists")?;
        Ok(found)
    }

    pub async fn list(db: impl PgExecutor<'_>) -> anyhow::Result<Vec<ProductSummary>> {
        let rows = sqlx::query_as::<_, ProductSummary>(
            r#"
            SELECT p.product_id, p.product_name, p.description, p.price,
                   p.stock_quantity, p.category_id, c.category_name,
                   COALESCE(AVG(r.rating), 0)::float8 AS avg_rating,
                   COUNT(r.review_id) AS review_count
              FROM products p
              LEFT JOIN categories c ON c.category_id = p.category_id
              LEFT JOIN reviews r ON r.product_id = p.product_id
             GROUP BY p.product_id, c.category_name
             ORDER BY p.product_name
            "#,
        )
        .fetch_all(db)
        .await
        .context("list products")?;
        Ok(rows)
    }

    pub async fn detail(
        db: impl PgExecutor<'_>,
        product_id: Uuid,
    ) -> anyhow::Result<Option<ProductDetail>> {
        let row = sqlx::query_as::<_, ProductDetail>(
            r#"
            SELECT p.product_id, p.supplier_id, p.category_id, p.product_name, p.description,
                   p.price, p.stock_quantity, p.created_at,
                   c.category_name, s.supplier_name,
                   COALESCE(AVG(r.rating), 0)::float8 AS avg_rating,
                   COUNT(r.review_id) AS review_count
              FROM products p
              LEFT JOIN categories c ON c.category_id = p.category_id
              LEFT JOIN suppliers s ON s.supplier_id = p.supplier_id
              LEFT JOIN reviews r ON r.product_id = p.product_id
             WHERE p.product_id = $1
             GROUP BY p.product_id, c.category_name, s.supplier_name
            "#,
        )
        .bind(product_id)
        .fetch_optional(db)
        .await
        .context("product detail")?;
        Ok(row)
    }

    pub async fn list_by_supplier(
        db: impl PgExecutor<'_>,
        supplier_id: Uuid,
    ) -> anyhow::Result<Vec<SupplierProduct>> {
        let rows = sqlx::query_as::<_, SupplierProduct>(
            r#"
            SELECT product_id, product_name, stock_quantity, price
              FROM products
             WHERE supplier_id = $1
             ORDER BY product_name
            "#,
        )
        .bind(supplier_id)
        .fetch_all(db)
        .await
        .context("list supplier products")?;
        Ok(rows)
    }

    pub async fn create(db: impl PgExecutor<'_>, new: &NewProduct<'_>) -> anyhow::Result<Product> {
        let product = sqlx::query_as::<_, Product>(&format!(
            r#"
            INSERT INTO products (product_name, description, price, stock_quantity, category_id, supplier_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(new.product_name)
        .bind(new.description)
        .bind(new.price)
        .bind(new.stock_quantity)
        .bind(new.category_id)
        .bind(new.supplier_id)
        .fetch_one(db)
        .await
        .context("insert product")?;
        Ok(product)
    }
}

/// Supplier row owned by the given user, if any.
pub async fn supplier_id_for_user(
    db: impl PgExecutor<'_>,
    user_id: Uuid,
) -> anyhow::Result<Option<Uuid>> {
    let id = sqlx::query_scalar("SELECT supplier_id FROM suppliers WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(db)
        .await
        .context("find supplier for user")?;
    Ok(id)
}

impl Category {
    pub async fn list(db: impl PgExecutor<'_>) -> anyhow::Result<Vec<Category>> {
        let rows = sqlx::query_as::<_, Category>(
            "SELECT category_id, category_name FROM categories ORDER BY category_name",
        )
        .fetch_all(db)
        .await
        .context("list categories")?;
        Ok(rows)
    }

    pub async fn exists(db: impl PgExecutor<'_>, category_id: Uuid) -> anyhow::Result<bool> {
        let found: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM categories WHERE category_id = $1)")
                .bind(category_id)
                .fetch_one(db)
                .await
                .context("check category exists")?;
        Ok(found)
    }
}

impl Review {
    pub async fn latest_for_product(
        db: impl PgExecutor<'_>,
        product_id: Uuid,
        limit: i64,
    ) -> anyhow::Result<Vec<ReviewWithAuthor>> {
        let rows = sqlx::query_as::<_, ReviewWithAuthor>(
            r#"
            SELECT r.review_id, r.user_id, r.product_id, r.rating, r.comment, r.reviewed_at,
                   u.username
              FROM reviews r
              JOIN users u ON u.user_id = r.user_id
             WHERE r.product_id = $1
             ORDER BY r.reviewed_at DESC
             LIMIT $2
            "#,
        )
        .bind(product_id)
        .bind(limit)
        .fetch_all(db)
        .await
        .context("list reviews")?;
        Ok(rows)
    }

    pub async fn exists_for(
        db: impl PgExecutor<'_>,
        user_id: Uuid,
        product_id: Uuid,
    ) -> anyhow::Result<bool> {
        let found: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM reviews WHERE user_id = $1 AND product_id = $2)",
        )
        .bind(user_id)
        .bind(product_id)
        .fetch_one(db)
        .await
        .context("check review exists")?;
        Ok(found)
    }

    pub async fn create(
        db: impl PgExecutor<'_>,
        user_id: Uuid,
        product_id: Uuid,
        rating: i16,
        comment: Option<&str>,
    ) -> anyhow::Result<Review> {
        let review = sqlx::query_as::<_, Review>(
            r#"
            INSERT INTO reviews (user_id, product_id, rating, comment)
            VALUES ($1, $2, $3, $4)
            RETURNING review_id, user_id, product_id, rating, comment, reviewed_at
            "#,
        )
        .bind(user_id)
        .bind(product_id)
        .bind(rating)
        .bind(comment)
        .fetch_one(db)
        .await
        .context("insert review")?;
        Ok(review)
    }
}
