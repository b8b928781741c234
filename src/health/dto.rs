use serde::{Deserialize, Serialize};
use time::Date;
use uuid::Uuid;

use super::repo_types::{ExerciseLog, ExerciseLogView, FoodLog, FoodLogView};
use crate::{
    ai::parse::{AiExerciseEstimate, AiFoodEstimate},
    foods::repo_types::{Exercise, Food},
};

/// Food picked from a search result; `food_id` is absent for AI estimates.
#[derive(Debug, Deserialize)]
pub struct FoodChoice {
    pub food_id: Option<Uuid>,
    pub food_name: Option<String>,
    pub calories_per_100g: Option<f64>,
    pub protein_per_100g: Option<f64>,
    pub carbs_per_100g: Option<f64>,
    pub fats_per_100g: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct LogFoodRequest {
    pub food: Option<FoodChoice>,
    pub quantity_grams: Option<f64>,
    pub meal_time: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExerciseChoice {
    pub exercise_id: Option<Uuid>,
    pub exercise_name: Option<String>,
    pub calories_burned_per_minute: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct LogExerciseRequest {
    pub exercise: Option<ExerciseChoice>,
    pub duration_minutes: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct QuickFoodLogRequest {
    pub food_name: Option<String>,
    pub quantity_grams: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct QuickExerciseLogRequest {
    pub exercise_name: Option<String>,
    pub duration_minutes: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogListQuery {
    #[serde(alias = "start_date")]
    pub start_date: Option<String>,
    #[serde(alias = "end_date")]
    pub end_date: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct IngestQuery {
    pub ingest_key: Option<String>,
}

/// One AI suggestion; short field names are accepted too.
#[derive(Debug, Deserialize)]
pub struct FoodSuggestion {
    #[serde(alias = "name")]
    pub food_name: Option<String>,
    #[serde(alias = "calories")]
    pub calories_per_100g: Option<f64>,
    #[serde(alias = "protein")]
    pub protein_per_100g: Option<f64>,
    #[serde(alias = "carbs")]
    pub carbs_per_100g: Option<f64>,
    #[serde(alias = "fat")]
    pub fats_per_100g: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct SuggestionsRequest {
    pub foods: Option<Vec<FoodSuggestion>>,
}

/// Search hit tagged with where it came from.
#[derive(Debug, Serialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum FoodHit {
    Db(Food),
    Ai(AiFoodEstimate),
}

#[derive(Debug, Serialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum ExerciseHit {
    Db(Exercise),
    Ai(AiExerciseEstimate),
}

#[derive(Debug, Serialize)]
pub struct SearchResults<T> {
    pub results: Vec<T>,
}

#[derive(Debug, Serialize)]
pub struct LogPayload<T> {
    pub log: T,
}

/// New log together with the name of what was logged.
#[derive(Debug, Serialize)]
pub struct LoggedFood {
    #[serde(flatten)]
    pub log: FoodLog,
    pub food_name: String,
}

#[derive(Debug, Serialize)]
pub struct LoggedExercise {
    #[serde(flatten)]
    pub log: ExerciseLog,
    pub exercise_name: String,
}

#[derive(Debug, Serialize)]
pub struct Data<T> {
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct TodayLogs {
    pub food: Vec<FoodLogView>,
    pub exercise: Vec<ExerciseLogView>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct DailySummary {
    pub date: Date,
    pub total_food_calories: f64,
    pub total_exercise_calories: f64,
    pub net_calories: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hits_carry_their_source() {
        let hit = FoodHit::Ai(AiFoodEstimate {
            food_name: "Dragon fruit".into(),
            calories_per_100g: Some(60.0),
            protein_per_100g: Some(1.2),
            carbs_per_100g: None,
            fats_per_100g: None,
        });
        let v = serde_json::to_value(&hit).unwrap();
        assert_eq!(v["source"], "ai");
        assert_eq!(v["food_name"], "Dragon fruit");
        assert_eq!(v["calories_per_100g"], 60.0);

        let hit = ExerciseHit::Db(Exercise {
            exercise_id: Uuid::nil(),
            exercise_name: "Running".into(),
            calories_burned_per_minute: 11.0,
        });
        let v = serde_json::to_value(&hit).unwrap();
        assert_eq!(v["source"], "db");
        assert_eq!(v["exercise_name"], "Running");
    }

    #[test]
    fn suggestions_accept_short_names() {
        let req: SuggestionsRequest = serde_json::from_str(
            r#"{"foods": [{"name": "Kefir", "calories": 41, "fat": 1}]}"#,
        )
        .unwrap();
        let foods = req.foods.unwrap();
        assert_eq!(foods[0].food_name.as_deref(), Some("Kefir"));
        assert_eq!(foods[0].calories_per_100g, Some(41.0));
        assert_eq!(foods[0].fats_per_100g, Some(1.0));
        assert_eq!(foods[0].protein_per_100g, None);
    }

    #[test]
    fn list_query_accepts_both_casings() {
        let q: LogListQuery =
            serde_json::from_str(r#"{"startDate": "2024-05-01", "end_date": "2024-05-07"}"#)
                .unwrap();
        assert_eq!(q.start_date.as_deref(), Some("2024-05-01"));
        assert_eq!(q.end_date.as_deref(), Some("2024-05-07"));
        assert_eq!(q.limit, None);
    }

    #[test]
    fn summary_date_is_iso() {
        let s = DailySummary {
            date: time::macros::date!(2024 - 05 - 01),
            total_food_calories: 1800.0,
            total_exercise_calories: 300.0,
            net_calories: 1500.0,
        };
        let v = serde_json::to_value(&s).unwrap();
        assert_eq!(v["date"], "2024-05-01");
        assert_eq!(v["net_calories"], 1500.0);
    }
}
