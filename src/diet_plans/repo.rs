use anyhow::Context;
use sqlx::PgExecutor;
use time::Date;
use uuid::Uuid;

use super::repo_types::{DietPlan, NewPlan, NewPlanItem, PlanItem, PlanItemView, PlanSummary};

const PLAN_COLUMNS: &str =
    "plan_id, user_id, plan_name, start_date, end_date, is_ai_generated, created_at";
const ITEM_COLUMNS: &str =
    "item_id, plan_id, food_id, product_id, meal_time, quantity, calories, created_at";

impl DietPlan {
    pub async fn create(db: impl PgExecutor<'_>, new: &NewPlan<'_>) -> anyhow::Result<DietPlan> {
        let plan = sqlx::query_as::<_, DietPlan>(&format!(
            r#"
            INSERT INTO diet_plans (user_id, plan_name, start_date, end_date, is_ai_generated)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {PLAN_COLUMNS}
            "#
        ))
        .bind(new.user_id)
        .bind(new.plan_name)
        .bind(new.start_date)
        .bind(new.end_date)
        .bind(new.is_ai_generated)
        .fetch_one(db)
        .await
        .context("insert diet plan")?;
        Ok(plan)
    }

    pub async fn find_owned(
        db: impl PgExecutor<'_>,
        user_id: Uuid,
        plan_id: Uuid,
    ) -> anyhow::Result<Option<DietPlan>> {
        let plan = sqlx::query_as::<_, DietPlan>(&format!(
            "SELECT {PLAN_COLUMNS} FROM diet_plans WHERE plan_id = $1 AND user_id = $2"
        ))
        .bind(plan_id)
        .bind(user_id)
        .fetch_optional(db)
        .await
        .context("find diet plan")?;
        Ok(plan)
    }

    /// The user's plans, newest first, optionally capped at `limit`.
    pub async fn list_with_totals(
        db: impl PgExecutor<'_>,
        user_id: Uuid,
        limit: Option<i64>,
    ) -> anyhow::Result<Vec<PlanSummary>> {
        let rows = sqlx::query_as::<_, PlanSummary>(
            r#"
            SELECT dp.plan_id, dp.user_id, dp.plan_name, dp.start_date, dp.end_date,
                   dp.is_ai_generated, dp.created_at,
                   COUNT(dpi.item_id) AS item_count,
                   COALESCE(SUM(dpi.calories), 0)::float8 AS total_calories
              FROM diet_plans dp
              LEFT JOIN diet_plan_items dpi ON dpi.plan_id = dp.plan_id
             WHERE dp.user_id = $1
             GROUP BY dp.plan_id
             ORDER BY dp.created_at DESC
             LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(db)
        .await
        .context("list diet plans")?;
        Ok(rows)
    }

    pub async fn update(
        db: impl PgExecutor<'_>,
        user_id: Uuid,
        plan_id: Uuid,
        plan_name: &str,
        start_date: Option<Date>,
        end_date: Option<Date>,
    ) -> anyhow::Result<Option<DietPlan>> {
        let plan = sqlx::query_as::<_, DietPlan>(&format!(
            r#"
            UPDATE diet_plans
               SET plan_name = $3, start_date = $4, end_date = $5
             WHERE plan_id = $1 AND user_id = $2
            RETURNING {PLAN_COLUMNS}
            "#
        ))
        .bind(plan_id)
        .bind(user_id)
        .bind(plan_name)
        .bind(start_date)
        .bind(end_date)
        .fetch_optional(db)
        .await
        .context("update diet plan")?;
        Ok(plan)
    }

    /// Deletes the plan and, through the foreign key, its items.
    pub async fn delete(db: impl PgExecutor<'_>, user_id: Uuid, plan_id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM diet_plans WHERE plan_id = $1 AND user_id = $2")
            .bind(plan_id)
            .bind(user_id)
            .execute(db)
            .await
            .context("delete diet plan")?;
        Ok(res.rows_affected() > 0)
    }

    /// Items ordered by meal slot, then insertion.
    pub async fn items(db: impl PgExecutor<'_>, plan_id: Uuid) -> anyhow::Result<Vec<PlanItemView>> {
        let rows = sqlx::query_as::<_, PlanItemView>(
            r#"
            SELECT dpi.item_id, dpi.plan_id, dpi.food_id, dpi.product_id, dpi.meal_time,
                   dpi.quantity, dpi.calories, dpi.created_at,
                   f.food_name, f.calories_per_100g, f.protein_per_100g,
                   f.carbs_per_100g, f.fats_per_100g,
                   p.product_name
              FROM diet_plan_items dpi
              LEFT JOIN food f ON f.food_id = dpi.food_id
              LEFT JOIN products p ON p.product_id = dpi.product_id
             WHERE dpi.plan_id = $1
             ORDER BY dpi.meal_time, dpi.created_at, dpi.item_id
            "#,
        )
        .bind(plan_id)
        .fetch_all(db)
        .await
        .context("list diet plan items")?;
        Ok(rows)
    }
}

impl PlanItem {
    pub async fn insert(
        db: impl PgExecutor<'_>,
        plan_id: Uuid,
        item: &NewPlanItem,
    ) -> anyhow::Result<PlanItem> {
        let row = sqlx::query_as::<_, PlanItem>(&format!(
            r#"
            INSERT INTO diet_plan_items (plan_id, food_id, product_id, meal_time, quantity, calories)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {ITEM_COLUMNS}
            "#
        ))
        .bind(plan_id)
        .bind(item.food_id)
        .bind(item.product_id)
        .bind(item.meal_time)
        .bind(item.quantity)
        .bind(item.calories)
        .fetch_one(db)
        .await
        .context("insert diet plan item")?;
        Ok(row)
    }

    pub async fn delete(db: impl PgExecutor<'_>, plan_id: Uuid, item_id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM diet_plan_items WHERE item_id = $1 AND plan_id = $2")
            .bind(item_id)
            .bind(plan_id)
            .execute(db)
            .await
            .context("delete diet plan item")?;
        Ok(res.rows_affected() > 0)
    }
}
