use serde::{Deserialize, Serialize};

use super::repo_types::Food;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

impl SearchQuery {
    /// Trimmed query text, `None` when absent or blank.
    pub fn text(&self) -> Option<&str> {
        self.q.as_deref().map(str::trim).filter(|q| !q.is_empty())
    }
}

#[derive(Debug, Serialize)]
pub struct FoodList {
    pub foods: Vec<Food>,
}
