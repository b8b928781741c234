use serde::Serialize;
use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::types::MealSlot;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct DietPlan {
    pub plan_id: Uuid,
    pub user_id: Uuid,
    pub plan_name: String,
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
    pub is_ai_generated: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Plan with aggregates over its items.
#[derive(Debug, Serialize, FromRow)]
pub struct PlanSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub plan: DietPlan,
    pub item_count: i64,
    pub total_calories: f64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PlanItem {
    pub item_id: Uuid,
    pub plan_id: Uuid,
    pub food_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    pub meal_time: MealSlot,
    pub quantity: f64,
    pub calories: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Plan item with whichever of food or product it points at.
#[derive(Debug, Serialize, FromRow)]
pub struct PlanItemView {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub item: PlanItem,
    pub food_name: Option<String>,
    pub calories_per_100g: Option<f64>,
    pub protein_per_100g: Option<f64>,
    pub carbs_per_100g: Option<f64>,
    pub fats_per_100g: Option<f64>,
    pub product_name: Option<String>,
}

pub struct NewPlan<'a> {
    pub user_id: Uuid,
    pub plan_name: &'a str,
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
    pub is_ai_generated: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPlanItem {
    pub food_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    pub meal_time: MealSlot,
    pub quantity: f64,
    pub calories: f64,
}
