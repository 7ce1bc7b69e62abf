use rand::{rngs::StdRng, seq::index, Rng, SeedableRng};

use crate::models::{
    AbGroup, AbPersonaRecommendations, AbRecommendation, PersonaRecommendations,
};

/// Assigns each persona's recommendations to control and treatment arms
///
/// `floor(n / 2)` randomly chosen recommendations per persona become
/// control: their explanation is blanked and kept in `original_explanation`.
/// Order within each persona is unchanged.
pub fn split_with_rng<R: Rng + ?Sized>(
    results: Vec<PersonaRecommendations>,
    rng: &mut R,
) -> Vec<AbPersonaRecommendations> {
    results
        .into_iter()
        .map(|entry| {
            let total = entry.recommendations.len();
            let control = index::sample(rng, total, total / 2).into_vec();

            let recommendations = entry
                .recommendations
                .into_iter()
                .enumerate()
                .map(|(i, mut recommendation)| {
                    if control.contains(&i) {
                        let original = std::mem::take(&mut recommendation.explanation);
                        AbRecommendation {
                            recommendation,
                            group: AbGroup::Control,
                            original_explanation: Some(original),
                        }
                    } else {
                        AbRecommendation {
                            recommendation,
                            group: AbGroup::Treatment,
                            original_explanation: None,
                        }
                    }
                })
                .collect();

            AbPersonaRecommendations {
                persona: entry.persona,
                recommendations,
            }
        })
        .collect()
}

/// Splits with a seeded generator for reproducible studies, or entropy otherwise
pub fn split(results: Vec<PersonaRecommendations>, seed: Option<u64>) -> Vec<AbPersonaRecommendations> {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let split = split_with_rng(results, &mut rng);

    let control: usize = split
        .iter()
        .flat_map(|p| &p.recommendations)
        .filter(|r| r.group == AbGroup::Control)
        .count();
    tracing::info!(
        personas = split.len(),
        control,
        seeded = seed.is_some(),
        "A/B dataset created"
    );

    split
}
