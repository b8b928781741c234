use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Food {
    pub food_id: Uuid,
    pub food_name: String,
    pub calories_per_100g: f64,
    pub protein_per_100g: f64,
    pub carbs_per_100g: f64,
    pub fats_per_100g: f64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Exercise {
    pub exercise_id: Uuid,
    pub exercise_name: String,
    pub calories_burned_per_minute: f64,
}

/// Per-100 g nutrition used when a food row has to be created.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Nutrition {
    pub calories_per_100g: f64,
    pub protein_per_100g: f64,
    pub carbs_per_100g: f64,
    pub fats_per_100g: f64,
}

impl Nutrition {
    /// Stand-in values for foods nobody has described yet.
    pub const PLACEHOLDER: Nutrition = Nutrition {
        calories_per_100g: 100.0,
        protein_per_100g: 5.0,
        carbs_per_100g: 15.0,
        fats_per_100g: 2.0,
    };

    /// Given values where present, placeholder values elsewhere.
    pub fn or_placeholder(
        calories: Option<f64>,
        protein: Option<f64>,
        carbs: Option<f64>,
        fats: Option<f64>,
    ) -> Nutrition {
        let base = Nutrition::PLACEHOLDER;
        Nutrition {
            calories_per_100g: calories.unwrap_or(base.calories_per_100g),
            protein_per_100g: protein.unwrap_or(base.protein_per_100g),
            carbs_per_100g: carbs.unwrap_or(base.carbs_per_100g),
            fats_per_100g: fats.unwrap_or(base.fats_per_100g),
        }
    }

    pub fn is_valid(&self) -> bool {
        [
            self.calories_per_100g,
            self.protein_per_100g,
            self.carbs_per_100g,
            self.fats_per_100g,
        ]
        .iter()
        .all(|v| v.is_finite() && *v >= 0.0)
    }
}

/// Rate used for exercises nobody has described yet.
pub const PLACEHOLDER_CALORIES_PER_MINUTE: f64 = 5.0;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_values_fall_back_to_placeholder() {
        let n = Nutrition::or_placeholder(Some(379.0), None, Some(67.7), None);
        assert_eq!(n.calories_per_100g, 379.0);
        assert_eq!(n.protein_per_100g, 5.0);
        assert_eq!(n.carbs_per_100g, 67.7);
        assert_eq!(n.fats_per_100g, 2.0);
        assert!(n.is_valid());
        assert!(!Nutrition::or_placeholder(Some(-1.0), None, None, None).is_valid());
        assert!(!Nutrition::or_placeholder(Some(f64::NAN), None, None, None).is_valid());
    }
}
