use serde::{de, Deserialize, Deserializer, Serialize};
use std::fmt;

use super::string_or_number;

/// A corpus field stored either as free text or as a list of strings
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TextOrList {
    Text(String),
    List(Vec<String>),
}

impl Default for TextOrList {
    fn default() -> Self {
        TextOrList::Text(String::new())
    }
}

impl TextOrList {
    /// Flattens the value into a single searchable string
    pub fn as_text(&self) -> String {
        match self {
            TextOrList::Text(text) => text.clone(),
            TextOrList::List(items) => items.join(", "),
        }
    }

    /// Splits the value into trimmed, non-empty items
    ///
    /// Plain text is split on commas. Text that looks like a serialized list
    /// (`['salt, to taste', 'pepper']`) is split on commas outside quotes.
    pub fn to_list(&self) -> Vec<String> {
        let items: Vec<String> = match self {
            TextOrList::List(items) => items.clone(),
            TextOrList::Text(text) => {
                let trimmed = text.trim();
                match trimmed
                    .strip_prefix('[')
                    .and_then(|rest| rest.strip_suffix(']'))
                {
                    Some(inner) => split_list_literal(inner),
                    None => trimmed.split(',').map(str::to_string).collect(),
                }
            }
        };

        items
            .into_iter()
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect()
    }
}

fn split_list_literal(inner: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for c in inner.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None => match c {
                '\'' | '"' => quote = Some(c),
                ',' => items.push(std::mem::take(&mut current)),
                _ => current.push(c),
            },
        }
    }
    items.push(current);
    items
}

impl<'de> Deserialize<'de> for TextOrList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TextOrListVisitor;

        impl<'de> de::Visitor<'de> for TextOrListVisitor {
            type Value = TextOrList;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a string or a list of strings")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<TextOrList, E> {
                Ok(TextOrList::Text(v.to_string()))
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<TextOrList, E> {
                Ok(TextOrList::Text(v))
            }

            // CSV infers numbers and booleans from bare cells.
            fn visit_u64<E: de::Error>(self, v: u64) -> Result<TextOrList, E> {
                Ok(TextOrList::Text(v.to_string()))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<TextOrList, E> {
                Ok(TextOrList::Text(v.to_string()))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<TextOrList, E> {
                Ok(TextOrList::Text(v.to_string()))
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<TextOrList, E> {
                Ok(TextOrList::Text(v.to_string()))
            }

            fn visit_unit<E: de::Error>(self) -> Result<TextOrList, E> {
                Ok(TextOrList::default())
            }

            fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<TextOrList, A::Error> {
                let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
                while let Some(item) = seq.next_element::<serde_json::Value>()? {
                    match item {
                        serde_json::Value::String(s) => items.push(s),
                        serde_json::Value::Null => {}
                        other => items.push(other.to_string()),
                    }
                }
                Ok(TextOrList::List(items))
            }
        }

        deserializer.deserialize_any(TextOrListVisitor)
    }
}

/// Per-serving nutrition; unit grams except calories
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Nutrition {
    pub calories: Option<f64>,
    pub protein: Option<f64>,
    pub carbs: Option<f64>,
    pub fat: Option<f64>,
}

/// A raw corpus row as read from disk
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RecipeRecord {
    #[serde(deserialize_with = "string_or_number")]
    pub recipe_id: String,
    pub title: String,
    #[serde(default)]
    pub ingredients: TextOrList,
    #[serde(default)]
    pub ingredients_title: Option<TextOrList>,
    #[serde(default)]
    pub tags: Option<TextOrList>,
    #[serde(default, alias = "calories_per_serving [cal]")]
    pub calories_per_serving: Option<f64>,
    #[serde(default, alias = "protein_per_serving [g]")]
    pub protein_per_serving: Option<f64>,
    #[serde(default, alias = "totalcarbohydrate_per_serving [g]")]
    pub totalcarbohydrate_per_serving: Option<f64>,
    #[serde(default, alias = "totalfat_per_serving [g]")]
    pub totalfat_per_serving: Option<f64>,
}

impl RecipeRecord {
    /// Text embedded for similarity search
    pub fn semantic_document(&self) -> String {
        let ingredients = self
            .ingredients_title
            .as_ref()
            .unwrap_or(&self.ingredients)
            .as_text();
        let tags = self.tags.as_ref().map(TextOrList::as_text).unwrap_or_default();
        let calories = self
            .calories_per_serving
            .map(|c| c.to_string())
            .unwrap_or_default();

        format!(
            "Title: {}. Ingredients: {}. Tags: {}. Calories: {}.",
            self.title, ingredients, tags, calories
        )
    }
}

/// An immutable corpus recipe with its precomputed embedding
#[derive(Debug, Clone, PartialEq)]
pub struct Recipe {
    pub recipe_id: String,
    pub title: String,
    pub ingredients: TextOrList,
    pub ingredients_title: Option<TextOrList>,
    pub tags: String,
    pub nutrition: Nutrition,
    pub embedding: Vec<f32>,
}

impl Recipe {
    pub fn from_record(record: RecipeRecord, embedding: Vec<f32>) -> Self {
        Self {
            tags: record.tags.as_ref().map(TextOrList::as_text).unwrap_or_default(),
            nutrition: Nutrition {
                calories: record.calories_per_serving,
                protein: record.protein_per_serving,
                carbs: record.totalcarbohydrate_per_serving,
                fat: record.totalfat_per_serving,
            },
            recipe_id: record.recipe_id,
            title: record.title,
            ingredients: record.ingredients,
            ingredients_title: record.ingredients_title,
            embedding,
        }
    }

    /// Raw ingredient text used by the safety filters
    pub fn ingredient_text(&self) -> String {
        self.ingredients.as_text()
    }

    /// Display ingredient list, preferring the short ingredient titles
    pub fn ingredient_list(&self) -> Vec<String> {
        self.ingredients_title
            .as_ref()
            .unwrap_or(&self.ingredients)
            .to_list()
    }
}
