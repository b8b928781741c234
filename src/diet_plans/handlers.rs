use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{info, instrument};
use uuid::Uuid;

use super::{
    dto::{
        CreatePlanRequest, GeneratePlanRequest, GeneratedPlan, ItemPayload, ManualPlanCreated,
        ManualPlanRequest, PlanCreated, PlanDetail, PlanItemInput, PlanList, PlanPayload,
        UpdatePlanRequest,
    },
    repo_types::{DietPlan, PlanItem},
    services,
};
use crate::{
    ai::{
        parse::parse_plan,
        prompts::{self, PlanPromptInput},
    },
    auth::AuthUser,
    error::{AppError, AppResult},
    extract::{AppJson, AppPath},
    response::{created, ok, ok_msg, ApiResponse, Empty},
    state::AppState,
};

const RECENT_PLANS: i64 = 3;

pub fn plan_routes() -> Router<AppState> {
    Router::new()
        .route("/diet-plans", get(list_plans).post(create_plan))
        .route("/diet-plans/recent", get(recent_plans))
        .route("/diet-plans/manual", post(create_manual_plan))
        .route(
            "/diet-plans/:plan_id",
            get(get_plan).put(update_plan).delete(delete_plan),
        )
        .route("/diet-plans/:plan_id/items", post(add_item))
        .route("/diet-plans/:plan_id/items/:item_id", delete(remove_item))
}

pub fn ai_routes() -> Router<AppState> {
    Router::new().route("/ai-diet-plan/generate", post(generate_plan))
}

#[instrument(skip(state))]
pub async fn list_plans(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<ApiResponse<PlanList>>> {
    let plans = DietPlan::list_with_totals(&state.db, user_id, None).await?;
    Ok(ok(PlanList { plans }))
}

#[instrument(skip(state))]
pub async fn recent_plans(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<ApiResponse<PlanList>>> {
    let plans = DietPlan::list_with_totals(&state.db, user_id, Some(RECENT_PLANS)).await?;
    Ok(ok(PlanList { plans }))
}

#[instrument(skip(state))]
pub async fn get_plan(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppPath(plan_id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<PlanDetail>>> {
    let plan = DietPlan::find_owned(&state.db, user_id, plan_id)
        .await?
        .ok_or_else(|| AppError::not_found("Diet plan not found"))?;
    let items = DietPlan::items(&state.db, plan_id).await?;
    Ok(ok(PlanDetail { plan, items }))
}

#[instrument(skip(state, payload))]
pub async fn create_plan(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppJson(payload): AppJson<CreatePlanRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<PlanCreated>>)> {
    let draft = payload.into_draft()?;
    let (plan, items) = services::create_plan(&state.db, user_id, &draft).await?;
    Ok(created(
        "Diet plan created successfully",
        PlanCreated { plan, items },
    ))
}

#[instrument(skip(state, payload))]
pub async fn create_manual_plan(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppJson(payload): AppJson<ManualPlanRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<ManualPlanCreated>>)> {
    let draft = payload.into_draft()?;
    let (plan, _) = services::create_plan(&state.db, user_id, &draft).await?;
    Ok(created(
        "Diet plan saved successfully!",
        ManualPlanCreated {
            plan_id: plan.plan_id,
            plan,
        },
    ))
}

#[instrument(skip(state, payload))]
pub async fn update_plan(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppPath(plan_id): AppPath<Uuid>,
    AppJson(payload): AppJson<UpdatePlanRequest>,
) -> AppResult<Json<ApiResponse<PlanPayload>>> {
    let name = services::plan_name(payload.plan_name.as_deref())?;
    let start = services::parse_date(payload.start_date.as_deref())?;
    let end = services::parse_date(payload.end_date.as_deref())?;
    services::check_date_range(start, end)?;

    let plan = DietPlan::update(&state.db, user_id, plan_id, &name, start, end)
        .await?
        .ok_or_else(|| AppError::not_found("Diet plan not found"))?;
    Ok(ok_msg("Diet plan updated successfully", PlanPayload { plan }))
}

#[instrument(skip(state))]
pub async fn delete_plan(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppPath(plan_id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<Empty>>> {
    if !DietPlan::delete(&state.db, user_id, plan_id).await? {
        return Err(AppError::not_found("Diet plan not found"));
    }
    info!(%user_id, %plan_id, "diet plan deleted");
    Ok(ok_msg("Diet plan deleted successfully", Empty {}))
}

#[instrument(skip(state, payload))]
pub async fn add_item(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppPath(plan_id): AppPath<Uuid>,
    AppJson(payload): AppJson<PlanItemInput>,
) -> AppResult<(StatusCode, Json<ApiResponse<ItemPayload>>)> {
    let item = services::add_item(&state.db, user_id, plan_id, payload).await?;
    Ok(created(
        "Item added to diet plan successfully",
        ItemPayload { item },
    ))
}

#[instrument(skip(state))]
pub async fn remove_item(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppPath((plan_id, item_id)): AppPath<(Uuid, Uuid)>,
) -> AppResult<Json<ApiResponse<Empty>>> {
    let mut tx = state.db.begin().await?;
    DietPlan::find_owned(&mut *tx, user_id, plan_id)
        .await?
        .ok_or_else(|| AppError::not_found("Diet plan not found"))?;
    if !PlanItem::delete(&mut *tx, plan_id, item_id).await? {
        return Err(AppError::not_found("Diet plan item not found"));
    }
    tx.commit().await?;
    Ok(ok_msg("Item removed from diet plan successfully", Empty {}))
}

fn or_default<'a>(value: Option<&'a str>, default: &'a str) -> &'a str {
    value.map(str::trim).filter(|v| !v.is_empty()).unwrap_or(default)
}

/// Asks the model for a plan and stores it through the regular plan path.
#[instrument(skip(state, payload))]
pub async fn generate_plan(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppJson(payload): AppJson<GeneratePlanRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<GeneratedPlan>>)> {
    let duration_days = services::clamp_duration(payload.duration);
    let prompt = prompts::diet_plan(&PlanPromptInput {
        goals: or_default(payload.goals.as_deref(), "General health and fitness"),
        preferences: or_default(payload.preferences.as_deref(), "No restrictions"),
        budget: or_default(payload.budget.as_deref(), "Moderate"),
        duration_days,
    });

    let raw = state.ai.generate(&prompt).await?;
    let ai_plan = parse_plan(&raw)?;
    let today = OffsetDateTime::now_utc().date();
    let draft = services::ai_draft(&ai_plan, today, duration_days)?;

    let (plan, _) = services::create_plan(&state.db, user_id, &draft).await?;
    let items = DietPlan::items(&state.db, plan.plan_id).await?;
    info!(%user_id, plan_id = %plan.plan_id, meals = ai_plan.meals.len(), "AI diet plan saved");

    Ok(created(
        "AI diet plan generated and saved successfully",
        GeneratedPlan {
            plan,
            items,
            ai_response: ai_plan,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::services::JwtKeys;
    use crate::state::testing::FakeAi;
    use axum::{
        body::Body,
        extract::FromRef,
        http::{header, Request},
    };
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn post(state: AppState, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        let token = JwtKeys::from_ref(&state)
            .sign_access(Uuid::new_v4())
            .unwrap();
        let res = super::super::router()
            .with_state(state)
            .oneshot(
                Request::post(uri)
                    .header(header::COOKIE, format!("authToken={token}"))
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
    async fn create_requires_plan_name() {
        let (status, body) = post(
            AppState::fake(),
            "/diet-plans",
            serde_json::json!({"items": [], "foods": []}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Plan name is required");
    }

    #[tokio::test]
    async fn manual_plan_rejects_missing_fields() {
        let (status, body) = post(
            AppState::fake(),
            "/diet-plans/manual",
            serde_json::json!({"planName": "Week"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Missing required fields.");
    }

    #[tokio::test]
    async fn unparseable_ai_output_is_a_generic_500() {
        let ai = Arc::new(FakeAi {
            answer: "Sorry, I can't help with that.".into(),
            ..Default::default()
        });
        let (status, body) = post(
            AppState::fake_with_ai(ai.clone()),
            "/ai-diet-plan/generate",
            serde_json::json!({"goals": "lose fat", "duration": 90}),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Failed to parse AI response. Please try again.");

        let prompts = ai.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("lose fat"));
        assert!(prompts[0].contains("30-day"));
        assert!(prompts[0].contains("No restrictions"));
    }

    #[tokio::test]
    async fn ai_plan_with_bad_meal_is_rejected_before_db() {
        let ai = Arc::new(FakeAi {
            answer: r#"```json
{"planName": "X", "meals": [{"mealTime": "Brunch", "foodName": "Toast", "quantity": 50}]}
```"#
                .into(),
            ..Default::default()
        });
        let (status, _) = post(
            AppState::fake_with_ai(ai),
            "/ai-diet-plan/generate",
            serde_json::json!({}),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
