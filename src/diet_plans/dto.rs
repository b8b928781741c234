use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::repo_types::{DietPlan, PlanItem, PlanItemView, PlanSummary};
use crate::ai::parse::AiPlan;

/// Food described inline by a plan request, upserted by name.
#[derive(Debug, Clone, Deserialize)]
pub struct FoodInput {
    #[serde(default)]
    pub food_name: String,
    pub calories_per_100g: Option<f64>,
    pub protein_per_100g: Option<f64>,
    pub carbs_per_100g: Option<f64>,
    pub fats_per_100g: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlanItemInput {
    pub food_id: Option<Uuid>,
    pub food_name: Option<String>,
    pub product_id: Option<Uuid>,
    pub meal_time: Option<String>,
    pub quantity: Option<f64>,
    pub calories: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePlanRequest {
    #[serde(alias = "plan_name")]
    pub plan_name: Option<String>,
    #[serde(alias = "start_date")]
    pub start_date: Option<String>,
    #[serde(alias = "end_date")]
    pub end_date: Option<String>,
    #[serde(default)]
    pub items: Vec<PlanItemInput>,
    #[serde(default)]
    pub foods: Vec<FoodInput>,
}

#[derive(Debug, Deserialize)]
pub struct ManualFoodRef {
    pub food_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ManualItem {
    pub food: Option<ManualFoodRef>,
    pub quantity: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct ManualMeal {
    pub meal_time: Option<String>,
    #[serde(default)]
    pub items: Vec<ManualItem>,
}

#[derive(Debug, Deserialize)]
pub struct ManualDay {
    #[serde(default)]
    pub meals: Vec<ManualMeal>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualPlanRequest {
    pub plan_name: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub days: Option<Vec<ManualDay>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePlanRequest {
    #[serde(alias = "plan_name")]
    pub plan_name: Option<String>,
    #[serde(alias = "start_date")]
    pub start_date: Option<String>,
    #[serde(alias = "end_date")]
    pub end_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GeneratePlanRequest {
    pub goals: Option<String>,
    pub preferences: Option<String>,
    pub budget: Option<String>,
    pub duration: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct PlanList {
    pub plans: Vec<PlanSummary>,
}

#[derive(Debug, Serialize)]
pub struct PlanDetail {
    pub plan: DietPlan,
    pub items: Vec<PlanItemView>,
}

#[derive(Debug, Serialize)]
pub struct PlanCreated {
    pub plan: DietPlan,
    pub items: Vec<PlanItem>,
}

#[derive(Debug, Serialize)]
pub struct ManualPlanCreated {
    #[serde(rename = "planId")]
    pub plan_id: Uuid,
    pub plan: DietPlan,
}

#[derive(Debug, Serialize)]
pub struct PlanPayload {
    pub plan: DietPlan,
}

#[derive(Debug, Serialize)]
pub struct ItemPayload {
    pub item: PlanItem,
}

#[derive(Debug, Serialize)]
pub struct GeneratedPlan {
    pub plan: DietPlan,
    pub items: Vec<PlanItemView>,
    #[serde(rename = "aiResponse")]
    pub ai_response: AiPlan,
}
