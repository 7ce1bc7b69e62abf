use serde::{de, Deserialize, Deserializer};
use std::fmt;

pub mod profile;
pub mod recipe;
pub mod recommendation;

pub use profile::{ActivityLevel, DietaryGoal, DietaryProfile, Persona, Selection, UserProfile};
pub use recipe::{Nutrition, Recipe, RecipeRecord, TextOrList};
pub use recommendation::{
    AbGroup, AbPersonaRecommendations, AbRecommendation, Candidate, NutritionSnapshot,
    PersonaRecommendations, Recommendation,
};

/// Deserializes an identifier that may arrive as a JSON string or number
///
/// Numbers are rendered without a fractional part when they are integral, so
/// `42`, `42.0` and `"42"` all become `"42"`.
pub fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    struct IdVisitor;

    impl<'de> de::Visitor<'de> for IdVisitor {
        type Value = String;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a string or number identifier")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<String, E> {
            Ok(v.trim().to_string())
        }

        fn visit_string<E: de::Error>(self, v: String) -> Result<String, E> {
            Ok(v.trim().to_string())
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<String, E> {
            if v.fract() == 0.0 && v.is_finite() {
                Ok(format!("{}", v as i64))
            } else {
                Ok(v.to_string())
            }
        }
    }

    deserializer.deserialize_any(IdVisitor)
}

/// Treats an explicit `null` the same as a missing field
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Reads an optional measurement from any JSON number or numeric string
///
/// Values that are not finite, non-negative numbers become `None`.
pub fn lenient_measure<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(value.filter(|v| v.is_finite() && *v >= 0.0))
}

/// Reads an optional age in whole years, rounding fractional input
pub fn lenient_age<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_measure(deserializer)?
        .filter(|years| *years <= u32::MAX as f64)
        .map(|years| years.round() as u32))
}
