use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr};

use super::{lenient_age, lenient_measure, null_as_default, string_or_number};
use crate::error::{AppError, AppResult};

/// The user's primary dietary goal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum DietaryGoal {
    WeightLoss,
    MuscleGain,
    #[default]
    Maintenance,
    MedicalManagement,
    EnergyBoost,
}

impl DietaryGoal {
    pub fn label(&self) -> &'static str {
        match self {
            DietaryGoal::WeightLoss => "Weight Loss",
            DietaryGoal::MuscleGain => "Muscle Gain",
            DietaryGoal::Maintenance => "Maintenance",
            DietaryGoal::MedicalManagement => "Medical Management",
            DietaryGoal::EnergyBoost => "Energy Boost",
        }
    }
}

/// Lowercases and strips separators so "Weight Loss", "weight_loss" and
/// "weight-loss" compare equal
fn normalize_label(value: &str) -> String {
    value
        .chars()
        .filter(|c| !matches!(c, ' ' | '_' | '-'))
        .flat_map(char::to_lowercase)
        .collect()
}

impl FromStr for DietaryGoal {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_label(s).as_str() {
            "weightloss" => Ok(DietaryGoal::WeightLoss),
            "musclegain" => Ok(DietaryGoal::MuscleGain),
            "maintenance" => Ok(DietaryGoal::Maintenance),
            "medicalmanagement" => Ok(DietaryGoal::MedicalManagement),
            "energyboost" => Ok(DietaryGoal::EnergyBoost),
            _ => Err(AppError::InvalidInput(format!("Unknown dietary goal: {}", s))),
        }
    }
}

/// Self-reported physical activity level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ActivityLevel {
    Sedentary,
    LightlyActive,
    #[default]
    ModeratelyActive,
    VeryActive,
}

impl ActivityLevel {
    pub fn label(&self) -> &'static str {
        match self {
            ActivityLevel::Sedentary => "sedentary",
            ActivityLevel::LightlyActive => "lightly_active",
            ActivityLevel::ModeratelyActive => "moderately_active",
            ActivityLevel::VeryActive => "very_active",
        }
    }
}

impl FromStr for ActivityLevel {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_label(s).as_str() {
            "sedentary" => Ok(ActivityLevel::Sedentary),
            "lightlyactive" | "light" => Ok(ActivityLevel::LightlyActive),
            "moderatelyactive" | "moderate" => Ok(ActivityLevel::ModeratelyActive),
            "veryactive" | "active" => Ok(ActivityLevel::VeryActive),
            _ => Err(AppError::InvalidInput(format!(
                "Unknown activity level: {}",
                s
            ))),
        }
    }
}

macro_rules! label_serde {
    ($ty:ty) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }

        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.label())
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

label_serde!(DietaryGoal);
label_serde!(ActivityLevel);

/// A multi-select answer with a free-text "other" field
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    #[serde(default, deserialize_with = "null_as_default")]
    pub selected: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub other: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DietaryProfile {
    #[serde(default, deserialize_with = "null_as_default")]
    pub dietary_restrictions: Selection,
    #[serde(default, deserialize_with = "null_as_default")]
    pub food_allergies: Selection,
    #[serde(default, deserialize_with = "null_as_default")]
    pub health_conditions: Selection,
}

/// Validated dietary profile for one recommendation run
///
/// Only the goal and activity level are validated strictly. Demographics
/// accept any number and fall back to `None` otherwise; `null` anywhere
/// means "not answered".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(
        default,
        deserialize_with = "lenient_age",
        skip_serializing_if = "Option::is_none"
    )]
    pub age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    /// Height in cm
    #[serde(
        default,
        deserialize_with = "lenient_measure",
        skip_serializing_if = "Option::is_none"
    )]
    pub height: Option<f64>,
    /// Weight in kg
    #[serde(
        default,
        deserialize_with = "lenient_measure",
        skip_serializing_if = "Option::is_none"
    )]
    pub weight: Option<f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub activity_level: ActivityLevel,
    #[serde(default, rename = "dietary_goal", deserialize_with = "null_as_default")]
    pub dietary_goal: DietaryGoal,
    #[serde(default, deserialize_with = "null_as_default")]
    pub dietary_profile: DietaryProfile,
    #[serde(default, deserialize_with = "null_as_default")]
    pub liked_ingredients: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub disliked_ingredients: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub favorite_cuisines: Vec<String>,
}

impl UserProfile {
    pub fn allergies(&self) -> &[String] {
        &self.dietary_profile.food_allergies.selected
    }

    pub fn restrictions(&self) -> &[String] {
        &self.dietary_profile.dietary_restrictions.selected
    }

    pub fn health_conditions(&self) -> &[String] {
        &self.dietary_profile.health_conditions.selected
    }
}

/// A user profile used as recommendation input
///
/// The original JSON object is kept so the output echoes the input verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct Persona {
    pub id: String,
    pub description: String,
    pub profile: UserProfile,
    pub raw: serde_json::Value,
}

impl Persona {
    /// Validates a persona object at the input boundary
    pub fn from_value(raw: serde_json::Value) -> AppResult<Self> {
        #[derive(Deserialize)]
        struct PersonaShape {
            #[serde(deserialize_with = "string_or_number")]
            id: String,
            #[serde(default)]
            description: String,
            profile: UserProfile,
        }

        let shape = PersonaShape::deserialize(&raw)
            .map_err(|e| AppError::InvalidInput(format!("Invalid persona: {}", e)))?;

        Ok(Self {
            id: shape.id,
            description: shape.description,
            profile: shape.profile,
            raw,
        })
    }

    /// Parses a JSON array of persona objects
    pub fn parse_batch(json: &str) -> AppResult<Vec<Self>> {
        let values: Vec<serde_json::Value> = serde_json::from_str(json)?;
        values
            .into_iter()
            .enumerate()
            .map(|(index, value)| {
                Self::from_value(value).map_err(|e| {
                    AppError::InvalidInput(format!("Persona #{}: {}", index + 1, e))
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn persona_json() -> serde_json::Value {
        json!({
            "id": "user_01",
            "description": "A busy vegan lawyer trying to gain muscle.",
            "profile": {
                "age": 30,
                "gender": "Female",
                "height": 165.0,
                "weight": 60.0,
                "activityLevel": "Active",
                "dietary_goal": "Muscle Gain",
                "dietaryProfile": {
                    "dietaryRestrictions": { "selected": ["Vegan"], "other": "" },
                    "foodAllergies": { "selected": ["Peanuts"], "other": "" },
                    "healthConditions": { "selected": [], "other": "" }
                },
                "likedIngredients": ["Tofu", "Quinoa"],
                "dislikedIngredients": ["Mushrooms"],
                "favoriteCuisines": ["Asian"]
            }
        })
    }

    #[test]
    fn test_persona_from_value() {
        let persona = Persona::from_value(persona_json()).unwrap();
        assert_eq!(persona.id, "user_01");
        assert_eq!(persona.profile.dietary_goal, DietaryGoal::MuscleGain);
        assert_eq!(persona.profile.activity_level, ActivityLevel::VeryActive);
        assert_eq!(persona.profile.restrictions(), ["Vegan".to_string()]);
        assert_eq!(persona.profile.allergies(), ["Peanuts".to_string()]);
        assert_eq!(persona.raw, persona_json());
    }

    #[test]
    fn test_missing_fields_default() {
        let persona = Persona::from_value(json!({"id": 3, "profile": {}})).unwrap();
        assert_eq!(persona.id, "3");
        assert_eq!(persona.profile.dietary_goal, DietaryGoal::Maintenance);
        assert_eq!(persona.profile.activity_level, ActivityLevel::ModeratelyActive);
        assert!(persona.profile.allergies().is_empty());
    }

    #[test]
    fn test_null_and_float_answers_accepted() {
        let mut value = persona_json();
        value["profile"]["age"] = json!(30.0);
        value["profile"]["weight"] = json!("61.5");
        value["profile"]["likedIngredients"] = json!(null);
        value["profile"]["dietaryProfile"]["foodAllergies"] =
            json!({"selected": ["peanut"], "other": null});
        value["profile"]["dietaryProfile"]["healthConditions"] = json!(null);

        let persona = Persona::from_value(value).unwrap();
        assert_eq!(persona.profile.age, Some(30));
        assert_eq!(persona.profile.weight, Some(61.5));
        assert!(persona.profile.liked_ingredients.is_empty());
        assert_eq!(persona.profile.allergies(), ["peanut".to_string()]);
        assert_eq!(persona.profile.dietary_profile.food_allergies.other, "");
        assert!(persona.profile.health_conditions().is_empty());
    }

    #[test]
    fn test_null_goal_defaults() {
        let persona =
            Persona::from_value(json!({"id": "n", "profile": {"dietary_goal": null}})).unwrap();
        assert_eq!(persona.profile.dietary_goal, DietaryGoal::Maintenance);
    }

    #[test]
    fn test_unknown_goal_rejected() {
        let mut value = persona_json();
        value["profile"]["dietary_goal"] = json!("Become Immortal");
        let err = Persona::from_value(value).unwrap_err();
        assert!(err.to_string().contains("Unknown dietary goal"));
    }

    #[test]
    fn test_activity_level_spellings() {
        for raw in ["lightly_active", "Lightly Active", "lightly-active", "light"] {
            assert_eq!(
                raw.parse::<ActivityLevel>().unwrap(),
                ActivityLevel::LightlyActive
            );
        }
        assert!("hyperactive".parse::<ActivityLevel>().is_err());
    }

    #[test]
    fn test_goal_serializes_as_label() {
        let json = serde_json::to_string(&DietaryGoal::WeightLoss).unwrap();
        assert_eq!(json, "\"Weight Loss\"");
        let goal: DietaryGoal = serde_json::from_str("\"weight_loss\"").unwrap();
        assert_eq!(goal, DietaryGoal::WeightLoss);
    }

    #[test]
    fn test_parse_batch_reports_position() {
        let json = r#"[{"id": "a", "profile": {}}, {"profile": {}}]"#;
        let err = Persona::parse_batch(json).unwrap_err();
        assert!(err.to_string().contains("Persona #2"));
    }
}
