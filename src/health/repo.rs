use anyhow::Context;
use sqlx::PgExecutor;
use time::Date;
use uuid::Uuid;

use super::repo_types::{
    DayTotals, ExerciseLog, ExerciseLogView, FoodLog, FoodLogView, LogWindow, NewExerciseLog,
    NewFoodLog,
};

const FOOD_LOG_COLUMNS: &str =
    "log_id, user_id, food_id, quantity_grams, total_calories, meal_time, log_date";
const EXERCISE_LOG_COLUMNS: &str =
    "log_id, user_id, exercise_id, duration_minutes, total_calories_burned, log_date";

// Log days are calendar days in UTC.
const FOOD_DAY: &str = "(fl.log_date AT TIME ZONE 'UTC')::date";
const EXERCISE_DAY: &str = "(el.log_date AT TIME ZONE 'UTC')::date";

const FOOD_VIEW: &str = r#"
    SELECT fl.log_id, fl.quantity_grams, fl.total_calories, fl.meal_time, fl.log_date,
           f.food_name, f.calories_per_100g, f.protein_per_100g, f.carbs_per_100g, f.fats_per_100g
      FROM food_log fl
      JOIN food f ON f.food_id = fl.food_id
"#;

const EXERCISE_VIEW: &str = r#"
    SELECT el.log_id, el.duration_minutes, el.total_calories_burned, el.log_date,
           e.exercise_name, e.calories_burned_per_minute
      FROM exercise_log el
      JOIN exercise e ON e.exercise_id = el.exercise_id
"#;

impl FoodLog {
    pub async fn insert(db: impl PgExecutor<'_>, new: &NewFoodLog) -> anyhow::Result<FoodLog> {
        let log = sqlx::query_as::<_, FoodLog>(&format!(
            r#"
            INSERT INTO food_log (user_id, food_id, quantity_grams, total_calories, meal_time)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {FOOD_LOG_COLUMNS}
            "#
        ))
        .bind(new.user_id)
        .bind(new.food_id)
        .bind(new.quantity_grams)
        .bind(new.total_calories)
        .bind(new.meal_time)
        .fetch_one(db)
        .await
        .context("insert food log")?;
        Ok(log)
    }

    /// Newest first, bounded by the window's days and limit.
    pub async fn list(
        db: impl PgExecutor<'_>,
        user_id: Uuid,
        window: &LogWindow,
    ) -> anyhow::Result<Vec<FoodLogView>> {
        let rows = sqlx::query_as::<_, FoodLogView>(&format!(
            r#"
            {FOOD_VIEW}
             WHERE fl.user_id = $1
               AND ($2::date IS NULL OR {FOOD_DAY} >= $2)
               AND ($3::date IS NULL OR {FOOD_DAY} <= $3)
             ORDER BY fl.log_date DESC
             LIMIT $4
            "#
        ))
        .bind(user_id)
        .bind(window.start)
        .bind(window.end)
        .bind(window.limit)
        .fetch_all(db)
        .await
        .context("list food logs")?;
        Ok(rows)
    }

    pub async fn on_day(
        db: impl PgExecutor<'_>,
        user_id: Uuid,
        day: Date,
    ) -> anyhow::Result<Vec<FoodLogView>> {
        let rows = sqlx::query_as::<_, FoodLogView>(&format!(
            "{FOOD_VIEW} WHERE fl.user_id = $1 AND {FOOD_DAY} = $2 ORDER BY fl.log_date DESC"
        ))
        .bind(user_id)
        .bind(day)
        .fetch_all(db)
        .await
        .context("food logs for day")?;
        Ok(rows)
    }

    /// False when no log with this id belongs to the user.
    pub async fn delete(db: impl PgExecutor<'_>, user_id: Uuid, log_id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM food_log WHERE log_id = $1 AND user_id = $2")
            .bind(log_id)
            .bind(user_id)
            .execute(db)
            .await
            .context("delete food log")?;
        Ok(res.rows_affected() > 0)
    }
}

impl ExerciseLog {
    pub async fn insert(
        db: impl PgExecutor<'_>,
        new: &NewExerciseLog,
    ) -> anyhow::Result<ExerciseLog> {
        let log = sqlx::query_as::<_, ExerciseLog>(&format!(
            r#"
            INSERT INTO exercise_log (user_id, exercise_id, duration_minutes, total_calories_burned)
            VALUES ($1, $2, $3, $4)
            RETURNING {EXERCISE_LOG_COLUMNS}
            "#
        ))
        .bind(new.user_id)
        .bind(new.exercise_id)
        .bind(new.duration_minutes)
        .bind(new.total_calories_burned)
        .fetch_one(db)
        .await
        .context("insert exercise log")?;
        Ok(log)
    }

    pub async fn list(
        db: impl PgExecutor<'_>,
        user_id: Uuid,
        window: &LogWindow,
    ) -> anyhow::Result<Vec<ExerciseLogView>> {
        let rows = sqlx::query_as::<_, ExerciseLogView>(&format!(
            r#"
            {EXERCISE_VIEW}
             WHERE el.user_id = $1
               AND ($2::date IS NULL OR {EXERCISE_DAY} >= $2)
               AND ($3::date IS NULL OR {EXERCISE_DAY} <= $3)
             ORDER BY el.log_date DESC
             LIMIT $4
            "#
        ))
        .bind(user_id)
        .bind(window.start)
        .bind(window.end)
        .bind(window.limit)
        .fetch_all(db)
        .await
        .context("list exercise logs")?;
        Ok(rows)
    }

    pub async fn on_day(
        db: impl PgExecutor<'_>,
        user_id: Uuid,
        day: Date,
    ) -> anyhow::Result<Vec<ExerciseLogView>> {
        let rows = sqlx::query_as::<_, ExerciseLogView>(&format!(
            "{EXERCISE_VIEW} WHERE el.user_id = $1 AND {EXERCISE_DAY} = $2 ORDER BY el.log_date DESC"
        ))
        .bind(user_id)
        .bind(day)
        .fetch_all(db)
        .await
        .context("exercise logs for day")?;
        Ok(rows)
    }

    pub async fn delete(db: impl PgExecutor<'_>, user_id: Uuid, log_id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM exercise_log WHERE log_id = $1 AND user_id = $2")
            .bind(log_id)
            .bind(user_id)
            .execute(db)
            .await
            .context("delete exercise log")?;
        Ok(res.rows_affected() > 0)
    }
}

impl DayTotals {
    /// Calories eaten and burned by the user on `day`.
    pub async fn for_day(db: impl PgExecutor<'_>, user_id: Uuid, day: Date) -> anyhow::Result<DayTotals> {
        let totals = sqlx::query_as::<_, DayTotals>(&format!(
            r#"
            SELECT
                COALESCE((SELECT SUM(fl.total_calories) FROM food_log fl
                           WHERE fl.user_id = $1 AND {FOOD_DAY} = $2), 0)::float8
                    AS total_food_calories,
                COALESCE((SELECT SUM(el.total_calories_burned) FROM exercise_log el
                           WHERE el.user_id = $1 AND {EXERCISE_DAY} = $2), 0)::float8
                    AS total_exercise_calories
            "#
        ))
        .bind(user_id)
        .bind(day)
        .fetch_one(db)
        .await
        .context("daily totals")?;
        Ok(totals)
    }
}
