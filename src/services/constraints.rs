use crate::models::{Recipe, UserProfile};

/// Ingredients treated as gluten sources when a recipe is not tagged gluten-free
const GLUTEN_DENYLIST: [&str; 3] = ["flour", "wheat", "bread"];

/// A hard dietary restriction the filter knows how to enforce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Restriction {
    Vegan,
    Vegetarian,
    GlutenFree,
}

impl Restriction {
    fn from_label(label: &str) -> Option<Self> {
        let label = label.to_lowercase();
        if label.contains("vegan") {
            Some(Restriction::Vegan)
        } else if label.contains("vegetarian") {
            Some(Restriction::Vegetarian)
        } else if label.contains("gluten") {
            Some(Restriction::GlutenFree)
        } else {
            None
        }
    }

    fn permits(&self, recipe: &Recipe) -> bool {
        let tags = recipe.tags.to_lowercase();
        match self {
            Restriction::Vegan => tags.contains("vegan"),
            Restriction::Vegetarian => tags.contains("vegetarian"),
            Restriction::GlutenFree => {
                let ingredients = recipe.ingredient_text().to_lowercase();
                tags.contains("gluten")
                    || !GLUTEN_DENYLIST.iter().any(|g| ingredients.contains(g))
            }
        }
    }
}

fn contains_allergen(recipe: &Recipe, allergens: &[String]) -> bool {
    let ingredients = recipe.ingredient_text().to_lowercase();
    allergens.iter().any(|a| ingredients.contains(a.as_str()))
}

/// Removes every recipe that violates the profile's allergies or restrictions
///
/// Allergies are applied first, then each restriction in profile order
/// against the already-reduced set. The returned view keeps corpus order and
/// never copies or mutates recipes. An empty result is returned as-is.
pub fn apply_hard_constraints<'a>(corpus: &'a [Recipe], profile: &UserProfile) -> Vec<&'a Recipe> {
    let allergens: Vec<String> = profile
        .allergies()
        .iter()
        .map(|a| a.trim().to_lowercase())
        .filter(|a| !a.is_empty())
        .collect();

    let mut safe: Vec<&Recipe> = corpus
        .iter()
        .filter(|recipe| !contains_allergen(recipe, &allergens))
        .collect();

    tracing::debug!(
        before = corpus.len(),
        after = safe.len(),
        allergens = ?allergens,
        "Allergy filter applied"
    );

    for label in profile.restrictions() {
        let Some(restriction) = Restriction::from_label(label) else {
            tracing::debug!(restriction = %label, "No filter rule for restriction");
            continue;
        };
        let before = safe.len();
        safe.retain(|recipe| restriction.permits(recipe));
        tracing::debug!(
            restriction = %label,
            before,
            after = safe.len(),
            "Restriction filter applied"
        );
    }

    if safe.is_empty() && !corpus.is_empty() {
        tracing::warn!(
            corpus = corpus.len(),
            allergies = profile.allergies().len(),
            restrictions = profile.restrictions().len(),
            "Hard constraints removed all recipes"
        );
    }

    safe
}
