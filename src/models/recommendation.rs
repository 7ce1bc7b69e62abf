use serde::{Deserialize, Serialize};

use super::{Nutrition, Recipe};

/// A recipe scored against one profile during a single retrieval
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate<'a> {
    pub recipe: &'a Recipe,
    /// Cosine similarity in [-1, 1]
    pub similarity_score: f32,
}

/// Nutrition as reported to users, always sourced from the corpus record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionSnapshot {
    pub calories: f64,
    pub protein: String,
    pub carbs: String,
    pub fat: String,
}

impl From<&Nutrition> for NutritionSnapshot {
    fn from(nutrition: &Nutrition) -> Self {
        let grams = |value: Option<f64>| format!("{}g", value.unwrap_or(0.0));
        Self {
            calories: nutrition.calories.unwrap_or(0.0),
            protein: grams(nutrition.protein),
            carbs: grams(nutrition.carbs),
            fat: grams(nutrition.fat),
        }
    }
}

/// A single explained recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub recipe_id: String,
    pub title: String,
    pub explanation: String,
    pub ingredients: Vec<String>,
    pub nutrition: NutritionSnapshot,
}

impl Recommendation {
    /// Combines a model explanation with authoritative corpus data
    pub fn from_recipe(recipe: &Recipe, explanation: String) -> Self {
        Self {
            recipe_id: recipe.recipe_id.clone(),
            title: recipe.title.clone(),
            explanation,
            ingredients: recipe.ingredient_list(),
            nutrition: NutritionSnapshot::from(&recipe.nutrition),
        }
    }
}

/// Engine output for one persona
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaRecommendations {
    /// The input persona object, unchanged
    pub persona: serde_json::Value,
    pub recommendations: Vec<Recommendation>,
}

/// Study arm a recommendation was assigned to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbGroup {
    /// Shown without an explanation
    #[serde(rename = "A_Control")]
    Control,
    /// Shown with the generated explanation
    #[serde(rename = "B_Treatment")]
    Treatment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbRecommendation {
    #[serde(flatten)]
    pub recommendation: Recommendation,
    pub group: AbGroup,
    /// Explanation withheld from the control arm
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_explanation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbPersonaRecommendations {
    pub persona: serde_json::Value,
    pub recommendations: Vec<AbRecommendation>,
}
