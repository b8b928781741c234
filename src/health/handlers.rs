use axum::{
    async_trait,
    extract::{FromRequestParts, Query, State},
    http::{request::Parts, StatusCode},
    routing::{delete, get, post},
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::{
    dto::{
        Data, DailySummary, ExerciseHit, FoodHit, IngestQuery, LogExerciseRequest, LogFoodRequest,
        LogListQuery, LogPayload, LoggedExercise, LoggedFood, QuickExerciseLogRequest,
        QuickFoodLogRequest, SearchResults, SummaryQuery, SuggestionsRequest, TodayLogs,
    },
    repo_types::{ExerciseLog, ExerciseLogView, FoodLog, FoodLogView},
    services::{
        self, check_ingest_key, exercise_rate, log_window, meal_slot, positive, EntryRef,
        ExerciseEntry, FoodEntry,
    },
};
use crate::{
    auth::AuthUser,
    error::{AppError, AppResult},
    extract::{AppJson, AppPath, AppQuery},
    foods::{
        dto::SearchQuery,
        repo_types::{Food, Nutrition},
    },
    response::{created, ok, ok_msg, ApiResponse, Empty},
    state::AppState,
};

const INGEST_HEADER: &str = "x-ingest-key";

pub fn log_routes() -> Router<AppState> {
    Router::new()
        .route("/log/search-food", get(search_food))
        .route("/log/search-exercise", get(search_exercise))
        .route("/log/food", post(log_food))
        .route("/log/exercise", post(log_exercise))
        .route("/log/today", get(today))
        .route("/log/food/:log_id", delete(delete_food_log))
        .route("/log/exercise/:log_id", delete(delete_exercise_log))
}

pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health/food-logs", get(list_food_logs).post(add_food_log))
        .route("/health/food-logs/:log_id", delete(delete_food_log))
        .route(
            "/health/exercise-logs",
            get(list_exercise_logs).post(add_exercise_log),
        )
        .route("/health/exercise-logs/:log_id", delete(delete_exercise_log))
        .route("/health/summary", get(summary))
        .route("/health/food-suggestions", post(food_suggestions))
}

/// Passes only requests carrying the configured ingestion key, read from the
/// `x-ingest-key` header or the `ingest_key` query parameter.
pub struct IngestKey;

#[async_trait]
impl FromRequestParts<AppState> for IngestKey {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let from_header = parts
            .headers
            .get(INGEST_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let given = match from_header {
            Some(key) => Some(key),
            None => Query::<IngestQuery>::try_from_uri(&parts.uri)
                .ok()
                .and_then(|Query(q)| q.ingest_key),
        };
        check_ingest_key(state.config.ingestion_key.as_deref(), given.as_deref())?;
        Ok(IngestKey)
    }
}

fn required_query(query: &SearchQuery) -> AppResult<&str> {
    query
        .text()
        .ok_or_else(|| AppError::bad_request("Query is required"))
}

#[instrument(skip(state))]
pub async fn search_food(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    AppQuery(query): AppQuery<SearchQuery>,
) -> AppResult<Json<ApiResponse<SearchResults<FoodHit>>>> {
    let q = required_query(&query)?;
    let results = services::search_food(&state.db, state.ai.as_ref(), q).await?;
    Ok(ok(SearchResults { results }))
}

#[instrument(skip(state))]
pub async fn search_exercise(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    AppQuery(query): AppQuery<SearchQuery>,
) -> AppResult<Json<ApiResponse<SearchResults<ExerciseHit>>>> {
    let q = required_query(&query)?;
    let results = services::search_exercise(&state.db, state.ai.as_ref(), q).await?;
    Ok(ok(SearchResults { results }))
}

#[instrument(skip(state, payload))]
pub async fn log_food(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppJson(payload): AppJson<LogFoodRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<LogPayload<FoodLog>>>)> {
    let (Some(food), Some(meal_time)) = (payload.food, payload.meal_time.as_deref()) else {
        return Err(AppError::bad_request(
            "Food, quantity, and meal time are required",
        ));
    };
    let quantity_grams = positive(payload.quantity_grams, "Quantity")?;
    let meal_time = meal_slot(meal_time)?;
    let food_ref = EntryRef::from_parts(food.food_id, food.food_name.as_deref())
        .ok_or_else(|| AppError::bad_request("Food id or name is required"))?;

    let entry = FoodEntry {
        food: food_ref,
        nutrition: Nutrition::or_placeholder(
            food.calories_per_100g,
            food.protein_per_100g,
            food.carbs_per_100g,
            food.fats_per_100g,
        ),
        quantity_grams,
        meal_time: Some(meal_time),
    };
    let (log, _) = services::log_food(&state.db, user_id, &entry).await?;
    Ok(created("Food logged", LogPayload { log }))
}

#[instrument(skip(state, payload))]
pub async fn log_exercise(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppJson(payload): AppJson<LogExerciseRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<LogPayload<ExerciseLog>>>)> {
    let Some(exercise) = payload.exercise else {
        return Err(AppError::bad_request("Exercise and duration are required"));
    };
    let duration_minutes = positive(payload.duration_minutes, "Duration")?;
    let exercise_ref = EntryRef::from_parts(exercise.exercise_id, exercise.exercise_name.as_deref())
        .ok_or_else(|| AppError::bad_request("Exercise id or name is required"))?;

    let entry = ExerciseEntry {
        exercise: exercise_ref,
        calories_per_minute: exercise_rate(exercise.calories_burned_per_minute),
        duration_minutes,
    };
    let (log, _) = services::log_exercise(&state.db, user_id, &entry).await?;
    Ok(created("Exercise logged", LogPayload { log }))
}

#[instrument(skip(state))]
pub async fn today(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<ApiResponse<TodayLogs>>> {
    let day = services::today();
    let food = FoodLog::on_day(&state.db, user_id, day).await?;
    let exercise = ExerciseLog::on_day(&state.db, user_id, day).await?;
    Ok(ok(TodayLogs { food, exercise }))
}

#[instrument(skip(state))]
pub async fn delete_food_log(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppPath(log_id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<Empty>>> {
    if !FoodLog::delete(&state.db, user_id, log_id).await? {
        return Err(AppError::not_found("Food log entry not found"));
    }
    Ok(ok_msg("Food log entry deleted successfully", Empty {}))
}

#[instrument(skip(state))]
pub async fn delete_exercise_log(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppPath(log_id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<Empty>>> {
    if !ExerciseLog::delete(&state.db, user_id, log_id).await? {
        return Err(AppError::not_found("Exercise log entry not found"));
    }
    Ok(ok_msg("Exercise log entry deleted successfully", Empty {}))
}

#[instrument(skip(state))]
pub async fn list_food_logs(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppQuery(query): AppQuery<LogListQuery>,
) -> AppResult<Json<ApiResponse<Data<Vec<FoodLogView>>>>> {
    let window = log_window(&query)?;
    let data = FoodLog::list(&state.db, user_id, &window).await?;
    Ok(ok(Data { data }))
}

#[instrument(skip(state))]
pub async fn list_exercise_logs(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppQuery(query): AppQuery<LogListQuery>,
) -> AppResult<Json<ApiResponse<Data<Vec<ExerciseLogView>>>>> {
    let window = log_window(&query)?;
    let data = ExerciseLog::list(&state.db, user_id, &window).await?;
    Ok(ok(Data { data }))
}

#[instrument(skip(state, payload))]
pub async fn add_food_log(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppJson(payload): AppJson<QuickFoodLogRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Data<LoggedFood>>>)> {
    let Some(food) = EntryRef::from_parts(None, payload.food_name.as_deref()) else {
        return Err(AppError::bad_request("Food name and quantity are required"));
    };
    let entry = FoodEntry {
        food,
        nutrition: Nutrition::PLACEHOLDER,
        quantity_grams: positive(payload.quantity_grams, "Quantity")?,
        meal_time: None,
    };
    let (log, food) = services::log_food(&state.db, user_id, &entry).await?;
    Ok(created(
        "Food log added successfully",
        Data {
            data: LoggedFood {
                log,
                food_name: food.food_name,
            },
        },
    ))
}

#[instrument(skip(state, payload))]
pub async fn add_exercise_log(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppJson(payload): AppJson<QuickExerciseLogRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Data<LoggedExercise>>>)> {
    let Some(exercise) = EntryRef::from_parts(None, payload.exercise_name.as_deref()) else {
        return Err(AppError::bad_request(
            "Exercise name and duration are required",
        ));
    };
    let entry = ExerciseEntry {
        exercise,
        calories_per_minute: exercise_rate(None),
        duration_minutes: positive(payload.duration_minutes, "Duration")?,
    };
    let (log, exercise) = services::log_exercise(&state.db, user_id, &entry).await?;
    Ok(created(
        "Exercise log added successfully",
        Data {
            data: LoggedExercise {
                log,
                exercise_name: exercise.exercise_name,
            },
        },
    ))
}

#[instrument(skip(state))]
pub async fn summary(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppQuery(query): AppQuery<SummaryQuery>,
) -> AppResult<Json<ApiResponse<Data<DailySummary>>>> {
    let day = services::summary_day(query.date.as_deref(), services::today())?;
    let data = services::daily_summary(&state.db, user_id, day).await?;
    Ok(ok(Data { data }))
}

#[instrument(skip(state, _key, payload))]
pub async fn food_suggestions(
    State(state): State<AppState>,
    _key: IngestKey,
    AppJson(payload): AppJson<SuggestionsRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Data<Vec<Food>>>>)> {
    let Some(foods) = payload.foods else {
        return Err(AppError::bad_request("Foods array is required"));
    };
    let drafts = services::suggestion_drafts(foods);
    let data = services::ingest_suggestions(&state.db, &drafts).await?;
    info!(received = drafts.len(), "food suggestions stored");
    Ok(created("Food suggestions saved", Data { data }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::services::JwtKeys;
    use crate::state::testing::{fake_config, FakeAi};
    use axum::{
        body::Body,
        extract::FromRef,
        http::{header, Request},
    };
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn send(state: AppState, req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let res = super::super::router()
            .with_state(state)
            .oneshot(req)
            .await
            .unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn bearer(state: &AppState) -> String {
        let token = JwtKeys::from_ref(state).sign_access(Uuid::new_v4()).unwrap();
        format!("Bearer {token}")
    }

    fn authed_post(state: &AppState, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::post(uri)
            .header(header::AUTHORIZATION, bearer(state))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn suggestions(uri: &str, key: Option<&str>) -> Request<Body> {
        let mut req = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
        if let Some(key) = key {
            req = req.header(INGEST_HEADER, key);
        }
        req.body(Body::from(r#"{"foods": null}"#)).unwrap()
    }

    #[tokio::test]
    async fn search_requires_query() {
        let ai = Arc::new(FakeAi::default());
        let state = AppState::fake_with_ai(ai.clone());
        let req = Request::get("/log/search-food")
            .header(header::AUTHORIZATION, bearer(&state))
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(state, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Query is required");
        assert!(ai.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn logging_needs_a_session() {
        let req = Request::post("/log/food")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{}"))
            .unwrap();
        let (status, _) = send(AppState::fake(), req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn food_log_rejects_non_positive_quantity() {
        let state = AppState::fake();
        let req = authed_post(
            &state,
            "/log/food",
            serde_json::json!({"food": {"food_name": "Oats"}, "quantity_grams": 0, "meal_time": "Breakfast"}),
        );
        let (status, body) = send(state, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].as_str().unwrap().contains("greater than 0"));
    }

    #[tokio::test]
    async fn food_log_rejects_unknown_meal_time() {
        let state = AppState::fake();
        let req = authed_post(
            &state,
            "/log/food",
            serde_json::json!({"food": {"food_name": "Oats"}, "quantity_grams": 80, "meal_time": "Brunch"}),
        );
        let (status, _) = send(state, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn exercise_log_requires_duration() {
        let state = AppState::fake();
        let req = authed_post(
            &state,
            "/health/exercise-logs",
            serde_json::json!({"exercise_name": "Swimming", "duration_minutes": -10}),
        );
        let (status, _) = send(state, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn log_list_rejects_inverted_range() {
        let state = AppState::fake();
        let req = Request::get("/health/food-logs?startDate=2024-05-07&endDate=2024-05-01")
            .header(header::AUTHORIZATION, bearer(&state))
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(state, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn malformed_log_id_is_a_json_400() {
        let state = AppState::fake();
        let req = Request::delete("/log/food/not-a-uuid")
            .header(header::AUTHORIZATION, bearer(&state))
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(state, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["message"].is_string());
    }

    #[tokio::test]
    async fn non_numeric_limit_is_a_json_400() {
        let state = AppState::fake();
        let req = Request::get("/health/food-logs?limit=lots")
            .header(header::AUTHORIZATION, bearer(&state))
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(state, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn ingestion_is_disabled_without_a_key() {
        let mut config = fake_config();
        config.ingestion_key = None;
        let base = AppState::fake();
        let state = AppState::from_parts(base.db.clone(), Arc::new(config), base.ai.clone());
        let (status, body) = send(
            state,
            suggestions("/health/food-suggestions", Some("ingest-secret")),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "Ingestion disabled");
    }

    #[tokio::test]
    async fn ingestion_rejects_wrong_key() {
        let (status, body) = send(
            AppState::fake(),
            suggestions("/health/food-suggestions", Some("guess")),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Invalid ingestion key");

        let (status, _) = send(AppState::fake(), suggestions("/health/food-suggestions", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn ingestion_key_may_come_from_query() {
        let (status, body) = send(
            AppState::fake(),
            suggestions("/health/food-suggestions?ingest_key=ingest-secret", None),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Foods array is required");
    }
}
