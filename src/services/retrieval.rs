use std::cmp::Ordering;
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    models::{Candidate, Recipe, UserProfile},
    services::providers::EmbeddingProvider,
};

/// Builds the profile-side semantic document
///
/// Covers the same axes as the recipe document (goal, health context,
/// activity, tastes, cuisines) so both land near each other in vector space.
pub fn build_query_document(profile: &UserProfile) -> String {
    format!(
        "User goal: {}. Dietary conditions: {}. Activity Level: {}. Preferences: {}. Cuisine style: {}.",
        profile.dietary_goal,
        profile.health_conditions().join(", "),
        profile.activity_level,
        profile.liked_ingredients.join(", "),
        profile.favorite_cuisines.join(", "),
    )
}

/// Cosine similarity clamped to [-1, 1]; zero-norm vectors score 0
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    let score = dot / (norm_a * norm_b);
    if score.is_finite() {
        score.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

/// Scores recipes against a query vector and keeps the best `k`
///
/// Sorting is stable, so equal scores keep their corpus order.
pub fn rank_by_similarity<'a>(
    query: &[f32],
    recipes: &[&'a Recipe],
    k: usize,
) -> AppResult<Vec<Candidate<'a>>> {
    let mut candidates = Vec::with_capacity(recipes.len());
    for recipe in recipes {
        if recipe.embedding.len() != query.len() {
            return Err(AppError::Embedding(format!(
                "Query dimension {} does not match recipe {} dimension {}",
                query.len(),
                recipe.recipe_id,
                recipe.embedding.len()
            )));
        }
        candidates.push(Candidate {
            recipe,
            similarity_score: cosine_similarity(query, &recipe.embedding),
        });
    }

    candidates.sort_by(|a, b| {
        b.similarity_score
            .partial_cmp(&a.similarity_score)
            .unwrap_or(Ordering::Equal)
    });
    candidates.truncate(k);
    Ok(candidates)
}

/// Shrinks a filtered corpus to a consideration set by semantic similarity
pub struct SimilarityRetriever {
    embedder: Arc<dyn EmbeddingProvider>,
    consideration_set_size: usize,
}

impl SimilarityRetriever {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, consideration_set_size: usize) -> Self {
        Self {
            embedder,
            consideration_set_size,
        }
    }

    /// Returns at most `consideration_set_size` candidates, best first
    ///
    /// An empty input yields an empty result without touching the embedding
    /// model.
    pub async fn retrieve<'a>(
        &self,
        profile: &UserProfile,
        filtered: &[&'a Recipe],
    ) -> AppResult<Vec<Candidate<'a>>> {
        if filtered.is_empty() {
            tracing::info!("No recipes left after hard constraints, skipping retrieval");
            return Ok(Vec::new());
        }

        let query = build_query_document(profile);
        let query_vector = self
            .embedder
            .embed(std::slice::from_ref(&query))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Embedding("No embedding returned for query".to_string()))?;

        let candidates = rank_by_similarity(&query_vector, filtered, self.consideration_set_size)?;

        tracing::debug!(
            filtered = filtered.len(),
            candidates = candidates.len(),
            top_score = candidates.first().map(|c| c.similarity_score),
            "Similarity ranking complete"
        );

        Ok(candidates)
    }
}
