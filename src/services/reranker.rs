use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use backoff::{backoff::Backoff, ExponentialBackoffBuilder};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    error::AppError,
    models::{string_or_number, Candidate, Recipe, Recommendation, UserProfile},
    services::providers::GenerativeModel,
};

/// Error types for a single reranking attempt
#[derive(Debug, Error)]
pub enum RerankError {
    #[error("Generative call failed: {0}")]
    Call(#[from] AppError),
    #[error("Malformed model response: {0}")]
    MalformedResponse(String),
}

impl RerankError {
    /// Malformed output is a sampling failure, so a fresh attempt may succeed
    fn is_retryable(&self) -> bool {
        match self {
            RerankError::Call(e) => e.is_transient(),
            RerankError::MalformedResponse(_) => true,
        }
    }
}

/// One entry of the model's ranking
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RankedEntry {
    #[serde(deserialize_with = "string_or_number")]
    pub recipe_id: String,
    pub explanation: String,
}

/// The response contract: `{"recommendations": [{"recipe_id", "explanation"}]}`
///
/// Extra keys at either level are ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RerankResponse {
    pub recommendations: Vec<RankedEntry>,
}

/// Retry settings for the generative call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first; 1 disables retries
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
        }
    }
}

/// Candidate fields shown to the model; embeddings are never sent
#[derive(Debug, Serialize)]
struct CandidatePayload<'a> {
    recipe_id: &'a str,
    title: &'a str,
    ingredients_title: Vec<String>,
    calories: Option<f64>,
    protein_g: Option<f64>,
    carbs_g: Option<f64>,
    fat_g: Option<f64>,
    tags: &'a str,
}

impl<'a> From<&'a Recipe> for CandidatePayload<'a> {
    fn from(recipe: &'a Recipe) -> Self {
        Self {
            recipe_id: &recipe.recipe_id,
            title: &recipe.title,
            ingredients_title: recipe.ingredient_list(),
            calories: recipe.nutrition.calories,
            protein_g: recipe.nutrition.protein,
            carbs_g: recipe.nutrition.carbs,
            fat_g: recipe.nutrition.fat,
            tags: &recipe.tags,
        }
    }
}

pub fn build_system_prompt(final_k: usize) -> String {
    format!(
        r#"You are an AI-powered food recommendation assistant.
The candidate recipes you receive were already screened by a hard-constraint module that removed anything violating the user's dietary restrictions and allergies.

Rank the candidates and return the TOP {final_k} recipes, balancing two goals:
(A) match the user's profile (goal and tastes), and
(B) gently prefer healthier options when that does not meaningfully reduce profile match.

RULES:
- Do not reveal internal reasoning steps.
- Base explanations only on the provided user profile and recipe metadata.
- Do not invent nutrition facts or health claims the data does not support.
- Do not give medical advice.

RANKING PRINCIPLES (apply silently):
1. PRIMARY, PROFILE FIT: prefer recipes matching the user's goal, liked ingredients and cuisines, avoiding disliked ingredients, and respecting dietaryRestrictions, foodAllergies and healthConditions.
2. SECONDARY, HEALTHIER BIAS: between similarly good options, rank the healthier-leaning one higher (more nutrient-dense, more balanced macros, less excess sugar, sodium or saturated fat), judged only from the provided data.

EXPLANATION REQUIREMENTS (shown to the user):
- TRANSPARENCY: name at least one user factor (goal or preference) that drove the choice.
- HEALTH JUSTIFICATION: when the recipe is a healthier-leaning pick, mention the relevant nutrition cue (e.g. higher protein, balanced meal, includes vegetables or whole grains) without overstating it.
- PERSUASIVENESS: use motivating, non-clinical language that encourages trying the recipe.
- Keep each explanation to 3-4 sentences.

Output strictly valid JSON in this format:
{{"recommendations": [{{"recipe_id": "...", "explanation": "..."}}]}}
Use only recipe_id values that appear in the candidate list."#
    )
}

pub fn build_user_prompt(
    profile: &UserProfile,
    candidates: &[Candidate<'_>],
) -> Result<String, serde_json::Error> {
    let payload: Vec<CandidatePayload> = candidates
        .iter()
        .map(|c| CandidatePayload::from(c.recipe))
        .collect();

    Ok(format!(
        "User Profile: {}\n\nCandidates: {}",
        serde_json::to_string_pretty(profile)?,
        serde_json::to_string_pretty(&payload)?
    ))
}

/// Parses the model reply into the typed contract
///
/// Tolerates prose or code fences around the JSON object, nothing else.
pub fn parse_response(raw: &str) -> Result<RerankResponse, RerankError> {
    let start = raw.find('{');
    let end = raw.rfind('}');
    let json = match (start, end) {
        (Some(start), Some(end)) if start < end => &raw[start..=end],
        _ => {
            return Err(RerankError::MalformedResponse(
                "response contains no JSON object".to_string(),
            ))
        }
    };

    serde_json::from_str(json).map_err(|e| RerankError::MalformedResponse(e.to_string()))
}

/// Matches model entries back to the consideration set
///
/// Output records take title, ingredients and nutrition from the corpus
/// recipe; only the explanation comes from the model. Unknown ids, blank
/// explanations and repeated ids are skipped. `limit` truncates the result.
pub fn reconcile(
    entries: Vec<RankedEntry>,
    candidates: &[Candidate<'_>],
    limit: Option<usize>,
) -> Vec<Recommendation> {
    let by_id: HashMap<&str, &Recipe> = candidates
        .iter()
        .map(|c| (c.recipe.recipe_id.as_str(), c.recipe))
        .collect();

    let mut seen = HashSet::new();
    let mut recommendations = Vec::with_capacity(entries.len());

    for entry in entries {
        let Some(recipe) = by_id.get(entry.recipe_id.as_str()) else {
            tracing::warn!(recipe_id = %entry.recipe_id, "Model returned unknown recipe id, skipping");
            continue;
        };

        if entry.explanation.trim().is_empty() {
            tracing::warn!(recipe_id = %entry.recipe_id, "Model returned an empty explanation, skipping");
            continue;
        }

        if !seen.insert(recipe.recipe_id.as_str()) {
            tracing::warn!(recipe_id = %entry.recipe_id, "Model repeated a recipe id, skipping");
            continue;
        }

        recommendations.push(Recommendation::from_recipe(
            recipe,
            entry.explanation.trim().to_string(),
        ));
    }

    if let Some(limit) = limit {
        if recommendations.len() > limit {
            tracing::info!(
                returned = recommendations.len(),
                limit,
                "Truncating model output to final size"
            );
            recommendations.truncate(limit);
        }
    }

    recommendations
}

/// Selects and explains the final recommendations with a generative model
pub struct Reranker {
    model: Arc<dyn GenerativeModel>,
    final_k: usize,
    enforce_final_k: bool,
    retry: RetryPolicy,
}

impl Reranker {
    pub fn new(
        model: Arc<dyn GenerativeModel>,
        final_k: usize,
        enforce_final_k: bool,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            model,
            final_k,
            enforce_final_k,
            retry,
        }
    }

    /// Ranks and explains `candidates` for `profile`
    ///
    /// Never fails: any call or parse error that survives the retry policy is
    /// logged and yields an empty list, so one bad persona cannot abort a
    /// batch. An empty candidate set returns immediately without a model call.
    pub async fn rerank_explain(
        &self,
        profile: &UserProfile,
        candidates: &[Candidate<'_>],
    ) -> Vec<Recommendation> {
        if candidates.is_empty() {
            tracing::info!("Empty consideration set, skipping reranking");
            return Vec::new();
        }

        let system_prompt = build_system_prompt(self.final_k);
        let user_prompt = match build_user_prompt(profile, candidates) {
            Ok(prompt) => prompt,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize reranking prompt");
                return Vec::new();
            }
        };

        match self.request_ranking(&system_prompt, &user_prompt).await {
            Ok(response) => {
                let returned = response.recommendations.len();
                let limit = self.enforce_final_k.then_some(self.final_k);
                let recommendations = reconcile(response.recommendations, candidates, limit);
                tracing::debug!(
                    returned,
                    kept = recommendations.len(),
                    "Model ranking reconciled"
                );
                recommendations
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    model = self.model.name(),
                    "Reranking failed, returning no recommendations"
                );
                Vec::new()
            }
        }
    }

    /// Calls the model and parses its reply under the retry policy
    async fn request_ranking(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<RerankResponse, RerankError> {
        let mut backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(self.retry.initial_backoff)
            .with_max_elapsed_time(None)
            .build();

        let mut attempts = 0;

        loop {
            attempts += 1;
            tracing::debug!(attempt = attempts, "Calling generative model");

            let result = match self.model.complete_json(system_prompt, user_prompt).await {
                Ok(raw) => parse_response(&raw),
                Err(e) => Err(RerankError::from(e)),
            };

            let error = match result {
                Ok(response) => return Ok(response),
                Err(e) => e,
            };

            if attempts >= self.retry.max_attempts || !error.is_retryable() {
                return Err(error);
            }

            match backoff.next_backoff() {
                Some(delay) => {
                    tracing::warn!(
                        error = %error,
                        attempt = attempts,
                        retry_in_ms = delay.as_millis(),
                        "Generative call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                None => return Err(error),
            }
        }
    }
}
