use anyhow::Context;
use sqlx::PgExecutor;
use uuid::Uuid;

use super::repo_types::{Exercise, Food, Nutrition};

const FOOD_COLUMNS: &str =
    "food_id, food_name, calories_per_100g, protein_per_100g, carbs_per_100g, fats_per_100g";
const EXERCISE_COLUMNS: &str = "exercise_id, exercise_name, calories_burned_per_minute";

/// Escapes `%`, `_` and `\` so user text matches literally inside ILIKE.
pub fn like_pattern(query: &str) -> String {
    let mut out = String::with_capacity(query.len() + 2);
    out.push('%');
    for c in query.trim().chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

impl Food {
    /// Case-insensitive substring search by name.
    pub async fn search(
        db: impl PgExecutor<'_>,
        query: &str,
        limit: i64,
    ) -> anyhow::Result<Vec<Food>> {
        let rows = sqlx::query_as::<_, Food>(&format!(
            "SELECT {FOOD_COLUMNS} FROM food WHERE food_name ILIKE $1 ORDER BY food_name LIMIT $2"
        ))
        .bind(like_pattern(query))
        .bind(limit)
        .fetch_all(db)
        .await
        .context("search food")?;
        Ok(rows)
    }

    pub async fn find(db: impl PgExecutor<'_>, food_id: Uuid) -> anyhow::Result<Option<Food>> {
        let food = sqlx::query_as::<_, Food>(&format!(
            "SELECT {FOOD_COLUMNS} FROM food WHERE food_id = $1"
        ))
        .bind(food_id)
        .fetch_optional(db)
        .await
        .context("find food")?;
        Ok(food)
    }

    pub async fn find_by_name(db: impl PgExecutor<'_>, name: &str) -> anyhow::Result<Option<Food>> {
        let food = sqlx::query_as::<_, Food>(&format!(
            "SELECT {FOOD_COLUMNS} FROM food WHERE lower(food_name) = lower($1)"
        ))
        .bind(name.trim())
        .fetch_optional(db)
        .await
        .context("find food by name")?;
        Ok(food)
    }

    /// Returns the food matching `name` case-insensitively, inserting it with
    /// `nutrition` when absent. An existing row keeps its own values.
    pub async fn upsert_by_name(
        db: impl PgExecutor<'_>,
        name: &str,
        nutrition: &Nutrition,
    ) -> anyhow::Result<Food> {
        let food = sqlx::query_as::<_, Food>(&format!(
            r#"
            INSERT INTO food (food_name, calories_per_100g, protein_per_100g, carbs_per_100g, fats_per_100g)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT ((lower(food_name))) DO UPDATE SET food_name = food.food_name
            RETURNING {FOOD_COLUMNS}
            "#
        ))
        .bind(name.trim())
        .bind(nutrition.calories_per_100g)
        .bind(nutrition.protein_per_100g)
        .bind(nutrition.carbs_per_100g)
        .bind(nutrition.fats_per_100g)
        .fetch_one(db)
        .await
        .context("upsert food")?;
        Ok(food)
    }
}

impl Exercise {
    pub async fn search(
        db: impl PgExecutor<'_>,
        query: &str,
        limit: i64,
    ) -> anyhow::Result<Vec<Exercise>> {
        let rows = sqlx::query_as::<_, Exercise>(&format!(
            "SELECT {EXERCISE_COLUMNS} FROM exercise WHERE exercise_name ILIKE $1 ORDER BY exercise_name LIMIT $2"
        ))
        .bind(like_pattern(query))
        .bind(limit)
        .fetch_all(db)
        .await
        .context("search exercise")?;
        Ok(rows)
    }

    pub async fn find(
        db: impl PgExecutor<'_>,
        exercise_id: Uuid,
    ) -> anyhow::Result<Option<Exercise>> {
        let exercise = sqlx::query_as::<_, Exercise>(&format!(
            "SELECT {EXERCISE_COLUMNS} FROM exercise WHERE exercise_id = $1"
        ))
        .bind(exercise_id)
        .fetch_optional(db)
        .await
        .context("find exercise")?;
        Ok(exercise)
    }

    pub async fn upsert_by_name(
        db: impl PgExecutor<'_>,
        name: &str,
        calories_per_minute: f64,
    ) -> anyhow::Result<Exercise> {
        let exercise = sqlx::query_as::<_, Exercise>(&format!(
            r#"
            INSERT INTO exercise (exercise_name, calories_burned_per_minute)
            VALUES ($1, $2)
            ON CONFLICT ((lower(exercise_name))) DO UPDATE SET exercise_name = exercise.exercise_name
            RETURNING {EXERCISE_COLUMNS}
            "#
        ))
        .bind(name.trim())
        .bind(calories_per_minute)
        .fetch_one(db)
        .await
        .context("upsert exercise")?;
        Ok(exercise)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("oat"), "%oat%");
        assert_eq!(like_pattern(" 100%_pure\\ "), "%100\\%\\_pure\\\\%");
    }
}

#[cfg(test)]
mod db_tests {
    use super::*;
    use sqlx::PgPool;

    #[sqlx::test]
    #[ignore = "needs DATABASE_URL"]
    async fn names_resolve_case_insensitively(db: PgPool) {
        let first = Food::upsert_by_name(&db, "Quinoa", &Nutrition::PLACEHOLDER)
            .await
            .unwrap();
        let mut richer = Nutrition::PLACEHOLDER;
        richer.calories_per_100g = 368.0;
        let second = Food::upsert_by_name(&db, "  QUINOA ", &richer).await.unwrap();
        assert_eq!(first.food_id, second.food_id);
        assert_eq!(second.calories_per_100g, 100.0);

        let found = Food::find_by_name(&db, "quinoa").await.unwrap().unwrap();
        assert_eq!(found.food_id, first.food_id);

        let hits = Food::search(&db, "uino", 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(Food::search(&db, "%", 5).await.unwrap().is_empty());

        let run = Exercise::upsert_by_name(&db, "Rowing", 7.0).await.unwrap();
        let again = Exercise::upsert_by_name(&db, "rowing", 1.0).await.unwrap();
        assert_eq!(run.exercise_id, again.exercise_id);
        assert_eq!(again.calories_burned_per_minute, 7.0);
    }
}
