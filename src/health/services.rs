use sqlx::{PgConnection, PgPool};
use time::{Date, OffsetDateTime};
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    dto::{DailySummary, ExerciseHit, FoodHit, FoodSuggestion, LogListQuery},
    repo_types::{DayTotals, ExerciseLog, FoodLog, LogWindow, NewExerciseLog, NewFoodLog},
};
use crate::{
    ai::{parse, prompts, AiClient},
    diet_plans::services::{check_date_range, parse_date},
    error::{AppError, AppResult},
    foods::repo_types::{Exercise, Food, Nutrition, PLACEHOLDER_CALORIES_PER_MINUTE},
    types::{calories_for_grams, calories_for_minutes, MealSlot},
};

pub const SEARCH_LIMIT: i64 = 5;
pub const DEFAULT_LOG_LIMIT: i64 = 50;
pub const MAX_LOG_LIMIT: i64 = 200;

/// How a log entry names the food or exercise it records.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryRef {
    Id(Uuid),
    Name(String),
}

impl EntryRef {
    /// Prefers the id; a blank name counts as absent.
    pub fn from_parts(id: Option<Uuid>, name: Option<&str>) -> Option<EntryRef> {
        match (id, name.map(str::trim).filter(|n| !n.is_empty())) {
            (Some(id), _) => Some(EntryRef::Id(id)),
            (None, Some(name)) => Some(EntryRef::Name(name.to_string())),
            (None, None) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FoodEntry {
    pub food: EntryRef,
    /// Used only when a name has to be created.
    pub nutrition: Nutrition,
    pub quantity_grams: f64,
    pub meal_time: Option<MealSlot>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExerciseEntry {
    pub exercise: EntryRef,
    pub calories_per_minute: f64,
    pub duration_minutes: f64,
}

pub fn positive(value: Option<f64>, field: &str) -> AppResult<f64> {
    match value {
        Some(v) if v.is_finite() && v > 0.0 => Ok(v),
        Some(_) => Err(AppError::bad_request(format!(
            "{field} must be greater than 0"
        ))),
        None => Err(AppError::bad_request(format!("{field} is required"))),
    }
}

pub fn meal_slot(raw: &str) -> AppResult<MealSlot> {
    raw.parse()
        .map_err(|_| AppError::bad_request(format!("Invalid meal time: {}", raw.trim())))
}

pub fn log_window(query: &LogListQuery) -> AppResult<LogWindow> {
    let start = parse_date(query.start_date.as_deref())?;
    let end = parse_date(query.end_date.as_deref())?;
    check_date_range(start, end)?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LOG_LIMIT)
        .clamp(1, MAX_LOG_LIMIT);
    Ok(LogWindow { start, end, limit })
}

pub fn summary_day(raw: Option<&str>, today: Date) -> AppResult<Date> {
    Ok(parse_date(raw)?.unwrap_or(today))
}

pub fn today() -> Date {
    OffsetDateTime::now_utc().date()
}

/// Checks the server-to-server ingestion key.
pub fn check_ingest_key(configured: Option<&str>, given: Option<&str>) -> AppResult<()> {
    let Some(expected) = configured else {
        warn!("ingestion key not configured, refusing food suggestions");
        return Err(AppError::Forbidden("Ingestion disabled".into()));
    };
    match given {
        Some(key) if key == expected => Ok(()),
        _ => Err(AppError::Unauthorized("Invalid ingestion key".into())),
    }
}

async fn resolve_food(
    conn: &mut PgConnection,
    food: &EntryRef,
    nutrition: &Nutrition,
) -> AppResult<Food> {
    match food {
        EntryRef::Id(id) => Food::find(&mut *conn, *id)
            .await?
            .ok_or_else(|| AppError::not_found("Food not found")),
        EntryRef::Name(name) => {
            if !nutrition.is_valid() {
                return Err(AppError::bad_request("Nutrition values must not be negative"));
            }
            Ok(Food::upsert_by_name(&mut *conn, name, nutrition).await?)
        }
    }
}

async fn resolve_exercise(
    conn: &mut PgConnection,
    exercise: &EntryRef,
    calories_per_minute: f64,
) -> AppResult<Exercise> {
    match exercise {
        EntryRef::Id(id) => Exercise::find(&mut *conn, *id)
            .await?
            .ok_or_else(|| AppError::not_found("Exercise not found")),
        EntryRef::Name(name) => {
            if !calories_per_minute.is_finite() || calories_per_minute < 0.0 {
                return Err(AppError::bad_request(
                    "Calories per minute must not be negative",
                ));
            }
            Ok(Exercise::upsert_by_name(&mut *conn, name, calories_per_minute).await?)
        }
    }
}

/// Resolves the food and writes the log in one transaction. Calories come
/// from the stored food row.
pub async fn log_food(db: &PgPool, user_id: Uuid, entry: &FoodEntry) -> AppResult<(FoodLog, Food)> {
    let mut tx = db.begin().await?;
    let food = resolve_food(&mut tx, &entry.food, &entry.nutrition).await?;
    let total_calories = calories_for_grams(food.calories_per_100g, entry.quantity_grams);
    let log = FoodLog::insert(
        &mut *tx,
        &NewFoodLog {
            user_id,
            food_id: food.food_id,
            quantity_grams: entry.quantity_grams,
            total_calories,
            meal_time: entry.meal_time,
        },
    )
    .await?;
    tx.commit().await?;

    info!(%user_id, food = %food.food_name, total_calories, "food logged");
    Ok((log, food))
}

pub async fn log_exercise(
    db: &PgPool,
    user_id: Uuid,
    entry: &ExerciseEntry,
) -> AppResult<(ExerciseLog, Exercise)> {
    let mut tx = db.begin().await?;
    let exercise = resolve_exercise(&mut tx, &entry.exercise, entry.calories_per_minute).await?;
    let total_calories_burned =
        calories_for_minutes(exercise.calories_burned_per_minute, entry.duration_minutes);
    let log = ExerciseLog::insert(
        &mut *tx,
        &NewExerciseLog {
            user_id,
            exercise_id: exercise.exercise_id,
            duration_minutes: entry.duration_minutes,
            total_calories_burned,
        },
    )
    .await?;
    tx.commit().await?;

    info!(%user_id, exercise = %exercise.exercise_name, total_calories_burned, "exercise logged");
    Ok((log, exercise))
}

/// Local foods first; the AI is asked only when nothing matches.
pub async fn search_food(db: &PgPool, ai: &dyn AiClient, query: &str) -> AppResult<Vec<FoodHit>> {
    let local = Food::search(db, query, SEARCH_LIMIT).await?;
    if !local.is_empty() {
        return Ok(local.into_iter().map(FoodHit::Db).collect());
    }
    info!(%query, "no local food match, asking AI");
    let raw = ai.generate(&prompts::food_estimate(query)).await?;
    Ok(parse::parse_food_estimate(&raw)?
        .map(FoodHit::Ai)
        .into_iter()
        .collect())
}

pub async fn search_exercise(
    db: &PgPool,
    ai: &dyn AiClient,
    query: &str,
) -> AppResult<Vec<ExerciseHit>> {
    let local = Exercise::search(db, query, SEARCH_LIMIT).await?;
    if !local.is_empty() {
        return Ok(local.into_iter().map(ExerciseHit::Db).collect());
    }
    info!(%query, "no local exercise match, asking AI");
    let raw = ai.generate(&prompts::exercise_estimate(query)).await?;
    Ok(parse::parse_exercise_estimate(&raw)?
        .map(ExerciseHit::Ai)
        .into_iter()
        .collect())
}

pub async fn daily_summary(db: &PgPool, user_id: Uuid, day: Date) -> AppResult<DailySummary> {
    let totals = DayTotals::for_day(db, user_id, day).await?;
    Ok(DailySummary {
        date: day,
        total_food_calories: totals.total_food_calories,
        total_exercise_calories: totals.total_exercise_calories,
        net_calories: totals.total_food_calories - totals.total_exercise_calories,
    })
}

/// Named suggestions with placeholder values filling the gaps. Nameless or
/// negative entries are skipped.
pub fn suggestion_drafts(foods: Vec<FoodSuggestion>) -> Vec<(String, Nutrition)> {
    foods
        .into_iter()
        .filter_map(|f| {
            let name = f.food_name.as_deref().map(str::trim).filter(|n| !n.is_empty())?;
            let nutrition = Nutrition::or_placeholder(
                f.calories_per_100g,
                f.protein_per_100g,
                f.carbs_per_100g,
                f.fats_per_100g,
            );
            nutrition.is_valid().then(|| (name.to_string(), nutrition))
        })
        .collect()
}

pub async fn ingest_suggestions(db: &PgPool, drafts: &[(String, Nutrition)]) -> AppResult<Vec<Food>> {
    let mut tx = db.begin().await?;
    let mut foods = Vec::with_capacity(drafts.len());
    for (name, nutrition) in drafts {
        foods.push(Food::upsert_by_name(&mut *tx, name, nutrition).await?);
    }
    tx.commit().await?;
    info!(count = foods.len(), "food suggestions ingested");
    Ok(foods)
}

pub fn exercise_rate(given: Option<f64>) -> f64 {
    given.unwrap_or(PLACEHOLDER_CALORIES_PER_MINUTE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn entry_prefers_id_over_name() {
        let id = Uuid::new_v4();
        assert_eq!(EntryRef::from_parts(Some(id), Some("Oats")), Some(EntryRef::Id(id)));
        assert_eq!(
            EntryRef::from_parts(None, Some(" Oats ")),
            Some(EntryRef::Name("Oats".into()))
        );
        assert_eq!(EntryRef::from_parts(None, Some("  ")), None);
        assert_eq!(EntryRef::from_parts(None, None), None);
    }

    #[test]
    fn amounts_must_be_positive() {
        assert_eq!(positive(Some(80.0), "Quantity").unwrap(), 80.0);
        assert!(matches!(positive(Some(0.0), "Quantity"), Err(AppError::BadRequest(m)) if m.contains("greater than 0")));
        assert!(positive(Some(-3.0), "Duration").is_err());
        assert!(positive(Some(f64::INFINITY), "Duration").is_err());
        assert!(matches!(positive(None, "Duration"), Err(AppError::BadRequest(m)) if m.contains("required")));
    }

    #[test]
    fn window_defaults_and_caps_the_limit() {
        let q = |start: Option<&str>, end: Option<&str>, limit: Option<i64>| LogListQuery {
            start_date: start.map(String::from),
            end_date: end.map(String::from),
            limit,
        };
        let w = log_window(&q(None, None, None)).unwrap();
        assert_eq!(w.limit, DEFAULT_LOG_LIMIT);
        assert_eq!(w.start, None);
        assert_eq!(log_window(&q(None, None, Some(5000))).unwrap().limit, MAX_LOG_LIMIT);
        assert_eq!(log_window(&q(None, None, Some(0))).unwrap().limit, 1);

        let w = log_window(&q(Some("2024-05-01"), Some("2024-05-07"), None)).unwrap();
        assert_eq!(w.start, Some(date!(2024 - 05 - 01)));
        assert_eq!(w.end, Some(date!(2024 - 05 - 07)));

        assert!(log_window(&q(Some("2024-05-07"), Some("2024-05-01"), None)).is_err());
        assert!(log_window(&q(Some("May 1st"), None, None)).is_err());
    }

    #[test]
    fn summary_defaults_to_today() {
        let today = date!(2024 - 06 - 15);
        assert_eq!(summary_day(None, today).unwrap(), today);
        assert_eq!(summary_day(Some(""), today).unwrap(), today);
        assert_eq!(summary_day(Some("2024-06-01"), today).unwrap(), date!(2024 - 06 - 01));
        assert!(summary_day(Some("yesterday"), today).is_err());
    }

    #[test]
    fn ingest_key_rules() {
        assert!(matches!(check_ingest_key(None, Some("k")), Err(AppError::Forbidden(_))));
        assert!(matches!(check_ingest_key(Some("k"), None), Err(AppError::Unauthorized(_))));
        assert!(matches!(check_ingest_key(Some("k"), Some("x")), Err(AppError::Unauthorized(_))));
        assert!(check_ingest_key(Some("k"), Some("k")).is_ok());
    }

    #[test]
    fn suggestions_skip_nameless_and_fill_gaps() {
        let s = |name: Option<&str>, calories: Option<f64>| FoodSuggestion {
            food_name: name.map(String::from),
            calories_per_100g: calories,
            protein_per_100g: None,
            carbs_per_100g: None,
            fats_per_100g: None,
        };
        let drafts = suggestion_drafts(vec![
            s(Some(" Kefir "), Some(41.0)),
            s(None, Some(10.0)),
            s(Some(""), None),
            s(Some("Tofu"), None),
            s(Some("Bad"), Some(-5.0)),
        ]);
        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].0, "Kefir");
        assert_eq!(drafts[0].1.calories_per_100g, 41.0);
        assert_eq!(drafts[1].1, Nutrition::PLACEHOLDER);
    }

    #[test]
    fn meal_slot_errors_are_bad_requests() {
        assert_eq!(meal_slot("lunch").unwrap(), MealSlot::Lunch);
        assert!(matches!(meal_slot("Brunch"), Err(AppError::BadRequest(_))));
    }
}
