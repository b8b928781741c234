use serde::Serialize;
use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::types::MealSlot;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct FoodLog {
    pub log_id: Uuid,
    pub user_id: Uuid,
    pub food_id: Uuid,
    pub quantity_grams: f64,
    pub total_calories: f64,
    pub meal_time: Option<MealSlot>,
    #[serde(with = "time::serde::rfc3339")]
    pub log_date: OffsetDateTime,
}

/// Food log joined with the food it references.
#[derive(Debug, Serialize, FromRow)]
pub struct FoodLogView {
    pub log_id: Uuid,
    pub quantity_grams: f64,
    pub total_calories: f64,
    pub meal_time: Option<MealSlot>,
    #[serde(with = "time::serde::rfc3339")]
    pub log_date: OffsetDateTime,
    pub food_name: String,
    pub calories_per_100g: f64,
    pub protein_per_100g: f64,
    pub carbs_per_100g: f64,
    pub fats_per_100g: f64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ExerciseLog {
    pub log_id: Uuid,
    pub user_id: Uuid,
    pub exercise_id: Uuid,
    pub duration_minutes: f64,
    pub total_calories_burned: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub log_date: OffsetDateTime,
}

#[derive(Debug, Serialize, FromRow)]
pub struct ExerciseLogView {
    pub log_id: Uuid,
    pub duration_minutes: f64,
    pub total_calories_burned: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub log_date: OffsetDateTime,
    pub exercise_name: String,
    pub calories_burned_per_minute: f64,
}

pub struct NewFoodLog {
    pub user_id: Uuid,
    pub food_id: Uuid,
    pub quantity_grams: f64,
    pub total_calories: f64,
    pub meal_time: Option<MealSlot>,
}

pub struct NewExerciseLog {
    pub user_id: Uuid,
    pub exercise_id: Uuid,
    pub duration_minutes: f64,
    pub total_calories_burned: f64,
}

/// Inclusive day range and row cap for log listings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogWindow {
    pub start: Option<Date>,
    pub end: Option<Date>,
    pub limit: i64,
}

#[derive(Debug, Clone, Copy, FromRow)]
pub struct DayTotals {
    pub total_food_calories: f64,
    pub total_exercise_calories: f64,
}
