use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use tracing::instrument;

use super::{
    dto::{FoodList, SearchQuery},
    repo_types::Food,
};
use crate::{
    auth::AuthUser,
    error::AppResult,
    extract::AppQuery,
    response::{ok, ApiResponse},
    state::AppState,
};

const AUTOCOMPLETE_LIMIT: i64 = 10;

pub fn routes() -> Router<AppState> {
    Router::new().route("/food/search", get(search_food))
}

/// Autocomplete over the local food table.
#[instrument(skip(state))]
pub async fn search_food(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    AppQuery(query): AppQuery<SearchQuery>,
) -> AppResult<Json<ApiResponse<FoodList>>> {
    let foods = match query.text() {
        Some(q) => Food::search(&state.db, q, AUTOCOMPLETE_LIMIT).await?,
        None => Vec::new(),
    };
    Ok(ok(FoodList { foods }))
}
