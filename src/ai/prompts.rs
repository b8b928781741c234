pub struct PlanPromptInput<'a> {
    pub goals: &'a str,
    pub preferences: &'a str,
    pub budget: &'a str,
    pub duration_days: u32,
}

pub fn diet_plan(input: &PlanPromptInput<'_>) -> String {
    format!(
        r#"Act as a registered nutritionist and build a {days}-day meal plan.

Goals: {goals}
Dietary preferences: {preferences}
Budget: {budget}

Reply with a single JSON object only (no markdown, no commentary) using exactly this shape:

{{
  "planName": "Short descriptive plan name",
  "meals": [
    {{
      "day": 1,
      "mealTime": "Breakfast",
      "foodName": "Food name",
      "quantity": 100,
      "caloriesPer100g": 250.5,
      "proteinPer100g": 12.5,
      "carbsPer100g": 30.0,
      "fatsPer100g": 8.5,
      "instructions": "One-line preparation note"
    }}
  ]
}}

Rules:
- Four meals per day for all {days} days.
- "mealTime" is one of "Breakfast", "Lunch", "Snack", "Dinner" with that capitalization.
- Nutrition values are per 100 g; "quantity" is in grams.
- Use short, plain food names.
- Respect the goals and the budget."#,
        days = input.duration_days,
        goals = input.goals,
        preferences = input.preferences,
        budget = input.budget,
    )
}

pub fn food_estimate(query: &str) -> String {
    let name = sanitize(query);
    format!(
        r#"Estimate the nutrition of "{name}" per 100 g.
Reply with a single JSON object only (no markdown, no commentary):
{{"food_name": "{name}", "calories_per_100g": 123, "protein_per_100g": 12.3, "carbs_per_100g": 45.6, "fats_per_100g": 7.8}}
If the food is unknown, use null for every numeric value."#
    )
}

pub fn exercise_estimate(query: &str) -> String {
    let name = sanitize(query);
    format!(
        r#"Estimate the average calories burned per minute doing "{name}".
Reply with a single JSON object only (no markdown, no commentary):
{{"exercise_name": "{name}", "calories_burned_per_minute": 8.5}}
If the exercise is unknown, use null for the numeric value."#
    )
}

/// Keeps user text from breaking out of the quoted JSON example.
fn sanitize(query: &str) -> String {
    query
        .trim()
        .chars()
        .filter(|c| !c.is_control() && *c != '"' && *c != '\\')
        .take(100)
        .collect()
}
