use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Meal slot of a diet plan item or a food log entry. Declared in the same
/// order as the `meal_slot` Postgres enum so `ORDER BY meal_time` follows the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "meal_slot")]
pub enum MealSlot {
    Breakfast,
    Lunch,
    Snack,
    Dinner,
}

impl MealSlot {
    pub const ALL: [MealSlot; 4] = [
        MealSlot::Breakfast,
        MealSlot::Lunch,
        MealSlot::Snack,
        MealSlot::Dinner,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MealSlot::Breakfast => "Breakfast",
            MealSlot::Lunch => "Lunch",
            MealSlot::Snack => "Snack",
            MealSlot::Dinner => "Dinner",
        }
    }
}

impl fmt::Display for MealSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MealSlot {
    type Err = String;

    /// Case-insensitive, so model output like "breakfast" is still accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        MealSlot::ALL
            .into_iter()
            .find(|slot| slot.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown meal slot: {s}"))
    }
}

/// Calories for `grams` of a food with `calories_per_100g`.
pub fn calories_for_grams(calories_per_100g: f64, grams: f64) -> f64 {
    calories_per_100g * grams / 100.0
}

/// Calories burned over `minutes` at `calories_per_minute`.
pub fn calories_for_minutes(calories_per_minute: f64, minutes: f64) -> f64 {
    calories_per_minute * minutes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meal_slot_parses_any_case() {
        assert_eq!("Breakfast".parse::<MealSlot>(), Ok(MealSlot::Breakfast));
        assert_eq!(" dinner ".parse::<MealSlot>(), Ok(MealSlot::Dinner));
        assert_eq!("SNACK".parse::<MealSlot>(), Ok(MealSlot::Snack));
        assert!("brunch".parse::<MealSlot>().is_err());
    }

    #[test]
    fn meal_slot_serde_uses_exact_names() {
        let json = serde_json::to_string(&MealSlot::Lunch).unwrap();
        assert_eq!(json, "\"Lunch\"");
        assert!(serde_json::from_str::<MealSlot>("\"lunch\"").is_err());
    }

    #[test]
    fn calories_from_per_100g() {
        assert!((calories_for_grams(379.0, 80.0) - 303.2).abs() < 1e-9);
        assert_eq!(calories_for_grams(250.0, 0.0), 0.0);
    }

    #[test]
    fn calories_from_per_minute() {
        assert!((calories_for_minutes(8.5, 30.0) - 255.0).abs() < 1e-9);
    }
}
