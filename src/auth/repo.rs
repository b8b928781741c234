use crate::auth::repo_types::{NewUser, User};
use anyhow::Context;
use sqlx::PgExecutor;
use uuid::Uuid;

const USER_COLUMNS: &str =
    "user_id, username, email, password_hash, phone_number, address, role, created_at, updated_at";

impl User {
    /// Find a user by email (case-insensitive) or exact username.
    pub async fn find_by_identifier(
        db: impl PgExecutor<'_>,
        identifier: &str,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower($1) OR username = $1 LIMIT 1"
        ))
        .bind(identifier)
        .fetch_optional(db)
        .await
        .context("find user by identifier")?;
        Ok(user)
    }

    pub async fn find_by_id(db: impl PgExecutor<'_>, user_id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(db)
        .await
        .context("find user by id")?;
        Ok(user)
    }

    /// True when the email or the username is already registered.
    pub async fn exists(
        db: impl PgExecutor<'_>,
        email: &str,
        username: &str,
    ) -> anyhow::Result<bool> {
        let found: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM users WHERE lower(email) = lower($1) OR username = $2
            )
            "#,
        )
        .bind(email)
        .bind(username)
        .fetch_one(db)
        .await
        .context("check user exists")?;
        Ok(found)
    }

    pub async fn username_taken_by_other(
        db: impl PgExecutor<'_>,
        username: &str,
        user_id: Uuid,
    ) -> anyhow::Result<bool> {
        let found: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM users WHERE username = $1 AND user_id <> $2)",
        )
        .bind(username)
        .bind(user_id)
        .fetch_one(db)
        .await
        .context("check username")?;
        Ok(found)
    }

    /// Create a new user with hashed password.
    pub async fn create(db: impl PgExecutor<'_>, new: &NewUser<'_>) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, email, password_hash, phone_number, address, role)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(new.username)
        .bind(new.email)
        .bind(new.password_hash)
        .bind(new.phone_number)
        .bind(new.address)
        .bind(new.role)
        .fetch_one(db)
        .await
        .context("insert user")?;
        Ok(user)
    }

    pub async fn touch(db: impl PgExecutor<'_>, user_id: Uuid) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET updated_at = now() WHERE user_id = $1")
            .bind(user_id)
            .execute(db)
            .await
            .context("touch user")?;
        Ok(())
    }

    /// Applies the provided fields; an empty string clears phone or address.
    pub async fn update_profile(
        db: impl PgExecutor<'_>,
        user_id: Uuid,
        username: Option<&str>,
        phone_number: Option<&str>,
        address: Option<&str>,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
               SET username     = COALESCE($2, username),
                   phone_number = CASE WHEN $3::text IS NULL THEN phone_number ELSE NULLIF($3, '') END,
                   address      = CASE WHEN $4::text IS NULL THEN address ELSE NULLIF($4, '') END,
                   updated_at   = now()
             WHERE user_id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(username)
        .bind(phone_number)
        .bind(address)
        .fetch_optional(db)
        .await
        .context("update profile")?;
        Ok(user)
    }
}

pub async fn create_supplier(
    db: impl PgExecutor<'_>,
    user: &User,
    supplier_name: &str,
) -> anyhow::Result<Uuid> {
    let id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO suppliers (user_id, supplier_name, email, phone_number, address)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING supplier_id
        "#,
    )
    .bind(user.user_id)
    .bind(supplier_name)
    .bind(&user.email)
    .bind(&user.phone_number)
    .bind(&user.address)
    .fetch_one(db)
    .await
    .context("insert supplier")?;
    Ok(id)
}
