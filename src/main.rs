mod ai;
mod app;
mod auth;
mod config;
mod diet_plans;
mod error;
mod extract;
mod foods;
mod health;
mod orders;
mod products;
mod response;
mod state;
mod types;

use sqlx::PgPool;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "fitfusion=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let app_state = state::AppState::init().await?;

    sqlx::migrate!("./migrations").run(&app_state.db).await?;

    if app_state.config.seed_sample_data {
        seed_sample_data(&app_state.db).await;
    }

    app::serve(app::build_app(app_state)).await
}

/// Loads the sample catalogue into an empty database. Failures are logged and
/// the server starts anyway.
async fn seed_sample_data(db: &PgPool) {
    let products: Result<i64, sqlx::Error> = sqlx::query_scalar("SELECT count(*) FROM products")
        .fetch_one(db)
        .await;
    match products {
        Ok(0) => {
            match sqlx::Executor::execute(db, include_str!("../seed/sample_data.sql")).await {
                Ok(_) => tracing::info!("sample data loaded"),
                Err(e) => tracing::warn!(error = %e, "sample data failed to load; continuing"),
            }
        }
        Ok(count) => tracing::debug!(count, "products present, skipping sample data"),
        Err(e) => tracing::warn!(error = %e, "could not check for sample data; continuing"),
    }
}
