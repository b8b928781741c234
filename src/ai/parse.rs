use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::MealSlot;

#[derive(Debug, Error)]
pub enum AiParseError {
    #[error("AI response was empty")]
    Empty,
    #[error("AI response is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("AI plan has no name")]
    MissingPlanName,
    #[error("AI plan has no meals")]
    NoMeals,
    #[error("AI meal #{index} is invalid: {reason}")]
    InvalidMeal { index: usize, reason: String },
}

/// Raw plan shape requested from the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiPlan {
    pub plan_name: String,
    pub meals: Vec<AiMeal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiMeal {
    #[serde(default)]
    pub day: Option<u32>,
    pub meal_time: String,
    pub food_name: String,
    pub quantity: f64,
    #[serde(default)]
    pub calories_per_100g: f64,
    #[serde(default)]
    pub protein_per_100g: f64,
    #[serde(default)]
    pub carbs_per_100g: f64,
    #[serde(default)]
    pub fats_per_100g: f64,
    #[serde(default)]
    pub instructions: Option<String>,
}

/// Meal from an [`AiPlan`] that passed validation.
#[derive(Debug, Clone)]
pub struct ValidMeal<'a> {
    pub slot: MealSlot,
    pub meal: &'a AiMeal,
}

impl AiPlan {
    pub fn validated_meals(&self) -> Result<Vec<ValidMeal<'_>>, AiParseError> {
        if self.plan_name.trim().is_empty() {
            return Err(AiParseError::MissingPlanName);
        }
        if self.meals.is_empty() {
            return Err(AiParseError::NoMeals);
        }
        self.meals
            .iter()
            .enumerate()
            .map(|(index, meal)| {
                let invalid = |reason: &str| AiParseError::InvalidMeal {
                    index,
                    reason: reason.to_string(),
                };
                let slot = meal
                    .meal_time
                    .parse::<MealSlot>()
                    .map_err(|e| invalid(&e))?;
                if meal.food_name.trim().is_empty() {
                    return Err(invalid("missing food name"));
                }
                if !(meal.quantity.is_finite() && meal.quantity > 0.0) {
                    return Err(invalid("quantity must be positive"));
                }
                let nutrition = [
                    meal.calories_per_100g,
                    meal.protein_per_100g,
                    meal.carbs_per_100g,
                    meal.fats_per_100g,
                ];
                if nutrition.iter().any(|v| !v.is_finite() || *v < 0.0) {
                    return Err(invalid("nutrition values must be non-negative"));
                }
                Ok(ValidMeal { slot, meal })
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiFoodEstimate {
    pub food_name: String,
    pub calories_per_100g: Option<f64>,
    pub protein_per_100g: Option<f64>,
    pub carbs_per_100g: Option<f64>,
    pub fats_per_100g: Option<f64>,
}

impl AiFoodEstimate {
    pub fn is_usable(&self) -> bool {
        !self.food_name.trim().is_empty()
            && matches!(self.calories_per_100g, Some(c) if c.is_finite() && c > 0.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiExerciseEstimate {
    pub exercise_name: String,
    pub calories_burned_per_minute: Option<f64>,
}

impl AiExerciseEstimate {
    pub fn is_usable(&self) -> bool {
        !self.exercise_name.trim().is_empty()
            && matches!(self.calories_burned_per_minute, Some(c) if c.is_finite() && c > 0.0)
    }
}

/// Removes markdown code fences and any prose around the JSON payload.
pub fn strip_fences(raw: &str) -> &str {
    let mut s = raw.trim();
    if let Some(rest) = s.strip_prefix("```") {
        s = rest.strip_prefix("json").unwrap_or(rest);
        s = s.trim_start();
    }
    if let Some(rest) = s.strip_suffix("```") {
        s = rest.trim_end();
    }
    if s.starts_with('{') || s.starts_with('[') || s == "null" {
        return s;
    }
    match (s.find('{'), s.rfind('}')) {
        (Some(start), Some(end)) if start < end => &s[start..=end],
        _ => s,
    }
}

fn parse_json<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T, AiParseError> {
    let body = strip_fences(raw);
    if body.is_empty() {
        return Err(AiParseError::Empty);
    }
    Ok(serde_json::from_str(body)?)
}

pub fn parse_plan(raw: &str) -> Result<AiPlan, AiParseError> {
    let plan: AiPlan = parse_json(raw)?;
    plan.validated_meals()?;
    Ok(plan)
}

/// `None` when the model answered `null` or with an estimate lacking calories.
pub fn parse_food_estimate(raw: &str) -> Result<Option<AiFoodEstimate>, AiParseError> {
    let est: Option<AiFoodEstimate> = parse_json(raw)?;
    Ok(est.filter(AiFoodEstimate::is_usable))
}

pub fn parse_exercise_estimate(raw: &str) -> Result<Option<AiExerciseEstimate>, AiParseError> {
    let est: Option<AiExerciseEstimate> = parse_json(raw)?;
    Ok(est.filter(AiExerciseEstimate::is_usable))
}
