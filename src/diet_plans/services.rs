use std::collections::HashMap;

use sqlx::{PgConnection, PgPool};
use time::{macros::format_description, Date, Duration};
use tracing::{debug, info};
use uuid::Uuid;

use super::{
    dto::{CreatePlanRequest, ManualPlanRequest, PlanItemInput},
    repo_types::{DietPlan, NewPlan, NewPlanItem, PlanItem},
};
use crate::{
    ai::parse::AiPlan,
    error::{AppError, AppResult},
    foods::repo_types::{Food, Nutrition},
    types::{calories_for_grams, MealSlot},
};

pub const DEFAULT_AI_DURATION_DAYS: u32 = 7;
pub const MAX_AI_DURATION_DAYS: u32 = 30;

/// How a plan item points at its food.
#[derive(Debug, Clone, PartialEq)]
pub enum FoodRef {
    Id(Uuid),
    Name(String),
    /// Looked up by name first; the id is used only when the name is unknown.
    NameThenId(String, Uuid),
    Unset,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FoodDraft {
    pub name: String,
    pub nutrition: Nutrition,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemDraft {
    pub food: FoodRef,
    pub product_id: Option<Uuid>,
    pub meal_time: MealSlot,
    pub quantity: f64,
    /// Explicit calories; computed from the resolved food when absent.
    pub calories: Option<f64>,
}

/// A validated plan ready to be written in one transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanDraft {
    pub plan_name: String,
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
    pub is_ai_generated: bool,
    pub foods: Vec<FoodDraft>,
    pub items: Vec<ItemDraft>,
}

pub fn parse_date(raw: Option<&str>) -> AppResult<Option<Date>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => Date::parse(s, format_description!("[year]-[month]-[day]"))
            .map(Some)
            .map_err(|_| AppError::bad_request(format!("Invalid date: {s}"))),
    }
}

pub fn check_date_range(start: Option<Date>, end: Option<Date>) -> AppResult<()> {
    match (start, end) {
        (Some(s), Some(e)) if s > e => Err(AppError::bad_request(
            "Start date must not be after end date",
        )),
        _ => Ok(()),
    }
}

pub fn plan_name(raw: Option<&str>) -> AppResult<String> {
    raw.map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::bad_request("Plan name is required"))
}

fn meal_slot(raw: Option<&str>) -> AppResult<MealSlot> {
    let raw = raw.unwrap_or_default();
    raw.parse::<MealSlot>()
        .map_err(|_| AppError::bad_request(format!("Invalid meal time: {raw}")))
}

fn positive_quantity(quantity: Option<f64>) -> AppResult<f64> {
    match quantity {
        Some(q) if q.is_finite() && q > 0.0 => Ok(q),
        _ => Err(AppError::bad_request("Quantity must be greater than 0")),
    }
}

fn explicit_calories(calories: Option<f64>) -> AppResult<Option<f64>> {
    match calories {
        Some(c) if !c.is_finite() || c < 0.0 => {
            Err(AppError::bad_request("Calories must not be negative"))
        }
        other => Ok(other),
    }
}

fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Keeps the first entry of every case-insensitive food name.
pub fn dedupe_foods(foods: Vec<FoodDraft>) -> Vec<FoodDraft> {
    let mut seen = std::collections::HashSet::new();
    foods
        .into_iter()
        .filter(|f| seen.insert(name_key(&f.name)))
        .collect()
}

/// Validates a single item of a plan request.
pub fn item_draft(input: PlanItemInput) -> AppResult<ItemDraft> {
    let meal_time = meal_slot(input.meal_time.as_deref())?;
    let quantity = positive_quantity(input.quantity)?;
    let calories = explicit_calories(input.calories)?;
    let name = input
        .food_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty());
    let food = match (name, input.food_id) {
        (Some(name), Some(id)) => FoodRef::NameThenId(name.to_string(), id),
        (Some(name), None) => FoodRef::Name(name.to_string()),
        (None, Some(id)) => FoodRef::Id(id),
        (None, None) => FoodRef::Unset,
    };
    if food == FoodRef::Unset && input.product_id.is_none() {
        return Err(AppError::bad_request(
            "Each item needs a food or a product",
        ));
    }
    Ok(ItemDraft {
        food,
        product_id: input.product_id,
        meal_time,
        quantity,
        calories,
    })
}

impl CreatePlanRequest {
    pub fn into_draft(self) -> AppResult<PlanDraft> {
        let plan_name = plan_name(self.plan_name.as_deref())?;
        let start_date = parse_date(self.start_date.as_deref())?;
        let end_date = parse_date(self.end_date.as_deref())?;
        check_date_range(start_date, end_date)?;

        let mut foods = Vec::with_capacity(self.foods.len());
        for f in self.foods {
            let name = f.food_name.trim();
            if name.is_empty() {
                return Err(AppError::bad_request("Food name is required"));
            }
            let nutrition = Nutrition::or_placeholder(
                f.calories_per_100g,
                f.protein_per_100g,
                f.carbs_per_100g,
                f.fats_per_100g,
            );
            if !nutrition.is_valid() {
                return Err(AppError::bad_request(format!(
                    "Nutrition values for {name} must not be negative"
                )));
            }
            foods.push(FoodDraft {
                name: name.to_string(),
                nutrition,
            });
        }

        let items = self
            .items
            .into_iter()
            .map(item_draft)
            .collect::<AppResult<Vec<_>>>()?;

        Ok(PlanDraft {
            plan_name,
            start_date,
            end_date,
            is_ai_generated: false,
            foods: dedupe_foods(foods),
            items,
        })
    }
}

impl ManualPlanRequest {
    pub fn into_draft(self) -> AppResult<PlanDraft> {
        let missing = || AppError::bad_request("Missing required fields.");
        let plan_name = plan_name(self.plan_name.as_deref()).map_err(|_| missing())?;
        let start_date = parse_date(self.start_date.as_deref())?.ok_or_else(missing)?;
        let end_date = parse_date(self.end_date.as_deref())?.ok_or_else(missing)?;
        let days = self.days.ok_or_else(missing)?;
        check_date_range(Some(start_date), Some(end_date))?;

        let mut items = Vec::new();
        for meal in days.into_iter().flat_map(|d| d.meals) {
            let meal_time = meal_slot(meal.meal_time.as_deref())?;
            for item in meal.items {
                let food_id = item
                    .food
                    .and_then(|f| f.food_id)
                    .ok_or_else(|| AppError::bad_request("Each item needs a food_id"))?;
                items.push(ItemDraft {
                    food: FoodRef::Id(food_id),
                    product_id: None,
                    meal_time,
                    quantity: positive_quantity(item.quantity)?,
                    calories: None,
                });
            }
        }

        Ok(PlanDraft {
            plan_name,
            start_date: Some(start_date),
            end_date: Some(end_date),
            is_ai_generated: false,
            foods: Vec::new(),
            items,
        })
    }
}

/// Requested AI plan length, defaulted and kept within bounds.
pub fn clamp_duration(raw: Option<i64>) -> u32 {
    raw.map(|d| d.clamp(1, MAX_AI_DURATION_DAYS as i64) as u32)
        .unwrap_or(DEFAULT_AI_DURATION_DAYS)
}

/// Turns a parsed AI plan into the same draft a manual request produces.
pub fn ai_draft(plan: &AiPlan, today: Date, duration_days: u32) -> AppResult<PlanDraft> {
    let meals = plan.validated_meals()?;
    let mut foods = Vec::with_capacity(meals.len());
    let mut items = Vec::with_capacity(meals.len());
    for valid in meals {
        let meal = valid.meal;
        let name = meal.food_name.trim().to_string();
        foods.push(FoodDraft {
            name: name.clone(),
            nutrition: Nutrition {
                calories_per_100g: meal.calories_per_100g,
                protein_per_100g: meal.protein_per_100g,
                carbs_per_100g: meal.carbs_per_100g,
                fats_per_100g: meal.fats_per_100g,
            },
        });
        items.push(ItemDraft {
            food: FoodRef::Name(name),
            product_id: None,
            meal_time: valid.slot,
            quantity: meal.quantity,
            calories: Some(calories_for_grams(meal.calories_per_100g, meal.quantity)),
        });
    }
    Ok(PlanDraft {
        plan_name: plan.plan_name.trim().to_string(),
        start_date: Some(today),
        end_date: today.checked_add(Duration::days(duration_days.into())),
        is_ai_generated: true,
        foods: dedupe_foods(foods),
        items,
    })
}

fn unknown_food(name: &str) -> AppError {
    AppError::bad_request(format!("Unknown food: {name}"))
}

/// Request foods win over stored ones with the same name.
async fn food_named(
    conn: &mut PgConnection,
    foods_by_name: &HashMap<String, Food>,
    name: &str,
) -> AppResult<Option<Food>> {
    match foods_by_name.get(&name_key(name)) {
        Some(food) => Ok(Some(food.clone())),
        None => Ok(Food::find_by_name(&mut *conn, name).await?),
    }
}

async fn resolve_item(
    conn: &mut PgConnection,
    foods_by_name: &HashMap<String, Food>,
    item: &ItemDraft,
) -> AppResult<NewPlanItem> {
    let food = match &item.food {
        FoodRef::Name(name) => Some(
            food_named(&mut *conn, foods_by_name, name)
                .await?
                .ok_or_else(|| unknown_food(name))?,
        ),
        FoodRef::NameThenId(name, id) => match food_named(&mut *conn, foods_by_name, name)
            .await?
        {
            Some(food) => Some(food),
            None => Some(
                Food::find(&mut *conn, *id)
                    .await?
                    .ok_or_else(|| unknown_food(name))?,
            ),
        },
        FoodRef::Id(id) => Some(
            Food::find(&mut *conn, *id)
                .await?
                .ok_or_else(|| AppError::bad_request(format!("Unknown food id: {id}")))?,
        ),
        FoodRef::Unset => None,
    };

    let calories = item
        .calories
        .or_else(|| {
            food.as_ref()
                .map(|f| calories_for_grams(f.calories_per_100g, item.quantity))
        })
        .unwrap_or(0.0);

    Ok(NewPlanItem {
        food_id: food.map(|f| f.food_id),
        product_id: item.product_id,
        meal_time: item.meal_time,
        quantity: item.quantity,
        calories,
    })
}

/// Writes foods, plan and items as one unit; any failure rolls everything back.
pub async fn create_plan(
    db: &PgPool,
    user_id: Uuid,
    draft: &PlanDraft,
) -> AppResult<(DietPlan, Vec<PlanItem>)> {
    let mut tx = db.begin().await?;

    let mut foods_by_name = HashMap::with_capacity(draft.foods.len());
    for f in &draft.foods {
        let food = Food::upsert_by_name(&mut *tx, &f.name, &f.nutrition).await?;
        foods_by_name.insert(name_key(&f.name), food);
    }
    debug!(foods = foods_by_name.len(), "plan foods resolved");

    let plan = DietPlan::create(
        &mut *tx,
        &NewPlan {
            user_id,
            plan_name: &draft.plan_name,
            start_date: draft.start_date,
            end_date: draft.end_date,
            is_ai_generated: draft.is_ai_generated,
        },
    )
    .await?;

    let mut items = Vec::with_capacity(draft.items.len());
    for item in &draft.items {
        let new_item = resolve_item(&mut tx, &foods_by_name, item).await?;
        items.push(PlanItem::insert(&mut *tx, plan.plan_id, &new_item).await?);
    }

    tx.commit().await?;
    info!(
        %user_id,
        plan_id = %plan.plan_id,
        items = items.len(),
        ai = draft.is_ai_generated,
        "diet plan created"
    );
    Ok((plan, items))
}

/// Adds one item to an owned plan.
pub async fn add_item(
    db: &PgPool,
    user_id: Uuid,
    plan_id: Uuid,
    input: PlanItemInput,
) -> AppResult<PlanItem> {
    let draft = item_draft(input)?;
    let mut tx = db.begin().await?;
    DietPlan::find_owned(&mut *tx, user_id, plan_id)
        .await?
        .ok_or_else(|| AppError::not_found("Diet plan not found"))?;
    let new_item = resolve_item(&mut tx, &HashMap::new(), &draft).await?;
    let item = PlanItem::insert(&mut *tx, plan_id, &new_item).await?;
    tx.commit().await?;
    Ok(item)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diet_plans::dto::FoodInput;
    use time::macros::date;

    fn item(name: Option<&str>, meal_time: &str, quantity: f64) -> PlanItemInput {
        PlanItemInput {
            food_id: None,
            food_name: name.map(String::from),
            product_id: None,
            meal_time: Some(meal_time.into()),
            quantity: Some(quantity),
            calories: None,
        }
    }

    fn food(name: &str, calories: f64) -> FoodInput {
        FoodInput {
            food_name: name.into(),
            calories_per_100g: Some(calories),
            protein_per_100g: None,
            carbs_per_100g: None,
            fats_per_100g: None,
        }
    }

    fn request(items: Vec<PlanItemInput>, foods: Vec<FoodInput>) -> CreatePlanRequest {
        CreatePlanRequest {
            plan_name: Some("Cut".into()),
            start_date: Some("2024-06-01".into()),
            end_date: Some("2024-06-07".into()),
            items,
            foods,
        }
    }

    #[test]
    fn dates_parse_and_order() {
        assert_eq!(parse_date(Some("2024-06-01")).unwrap(), Some(date!(2024 - 06 - 01)));
        assert_eq!(parse_date(Some(" ")).unwrap(), None);
        assert!(parse_date(Some("06/01/2024")).is_err());
        assert!(check_date_range(Some(date!(2024 - 06 - 02)), Some(date!(2024 - 06 - 01))).is_err());
        assert!(check_date_range(Some(date!(2024 - 06 - 01)), None).is_ok());
    }

    #[test]
    fn create_request_requires_name() {
        let mut r = request(vec![], vec![]);
        r.plan_name = Some("   ".into());
        assert!(matches!(r.into_draft(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn create_request_rejects_bad_items() {
        let r = request(vec![item(Some("Oats"), "Breakfast", 0.0)], vec![]);
        assert!(r.into_draft().is_err());
        let r = request(vec![item(Some("Oats"), "Brunch", 10.0)], vec![]);
        assert!(r.into_draft().is_err());
        let r = request(vec![item(None, "Lunch", 10.0)], vec![]);
        assert!(r.into_draft().is_err());
    }

    #[test]
    fn foods_are_deduplicated_case_insensitively() {
        let r = request(
            vec![item(Some("oats"), "breakfast", 80.0)],
            vec![food("Oats", 379.0), food(" OATS ", 1.0), food("Egg", 155.0)],
        );
        let draft = r.into_draft().unwrap();
        assert_eq!(draft.foods.len(), 2);
        assert_eq!(draft.foods[0].name, "Oats");
        assert_eq!(draft.foods[0].nutrition.calories_per_100g, 379.0);
        assert_eq!(draft.items[0].meal_time, MealSlot::Breakfast);
        assert_eq!(draft.items[0].food, FoodRef::Name("oats".into()));
    }

    #[test]
    fn item_keeps_both_name_and_id() {
        let id = Uuid::new_v4();
        let draft = item_draft(PlanItemInput {
            food_id: Some(id),
            food_name: Some(" Stew ".into()),
            product_id: None,
            meal_time: Some("Dinner".into()),
            quantity: Some(250.0),
            calories: None,
        })
        .unwrap();
        assert_eq!(draft.food, FoodRef::NameThenId("Stew".into(), id));
    }

    #[test]
    fn manual_request_requires_every_field() {
        let manual: ManualPlanRequest = serde_json::from_value(serde_json::json!({
            "planName": "Week",
            "startDate": "2024-06-01",
            "endDate": "2024-06-07"
        }))
        .unwrap();
        assert!(manual.into_draft().is_err());
    }

    #[test]
    fn manual_request_flattens_days() {
        let id = Uuid::new_v4();
        let manual: ManualPlanRequest = serde_json::from_value(serde_json::json!({
            "planName": "Week",
            "startDate": "2024-06-01",
            "endDate": "2024-06-07",
            "days": [
                {"meals": [{"meal_time": "Breakfast", "items": [{"food": {"food_id": id}, "quantity": 80}]}]},
                {"meals": [{"meal_time": "Dinner", "items": [{"food": {"food_id": id}, "quantity": 120}]}]}
            ]
        }))
        .unwrap();
        let draft = manual.into_draft().unwrap();
        assert_eq!(draft.items.len(), 2);
        assert_eq!(draft.items[1].meal_time, MealSlot::Dinner);
        assert_eq!(draft.items[1].food, FoodRef::Id(id));
        assert_eq!(draft.items[1].calories, None);
    }

    #[test]
    fn duration_is_clamped() {
        assert_eq!(clamp_duration(None), 7);
        assert_eq!(clamp_duration(Some(0)), 1);
        assert_eq!(clamp_duration(Some(14)), 14);
        assert_eq!(clamp_duration(Some(365)), 30);
    }

    #[test]
    fn ai_plan_becomes_a_dated_draft() {
        let plan = crate::ai::parse::parse_plan(
            r#"{"planName": "Lean", "meals": [
                {"day": 1, "mealTime": "Breakfast", "foodName": "Oats", "quantity": 80, "caloriesPer100g": 379},
                {"day": 2, "mealTime": "breakfast", "foodName": "oats", "quantity": 40, "caloriesPer100g": 379}
            ]}"#,
        )
        .unwrap();
        let draft = ai_draft(&plan, date!(2024 - 06 - 01), 7).unwrap();
        assert!(draft.is_ai_generated);
        assert_eq!(draft.end_date, Some(date!(2024 - 06 - 08)));
        assert_eq!(draft.foods.len(), 1);
        assert_eq!(draft.items.len(), 2);
        let kcal = draft.items[0].calories.unwrap();
        assert!((kcal - 303.2).abs() < 1e-9);
    }
}
