use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tracing::Instrument;

use crate::{
    error::{AppError, AppResult},
    models::{Persona, PersonaRecommendations},
    services::recommendations::RecommendationEngine,
    storage,
};

/// Loads and validates the persona input file
pub fn load_personas(path: &Path) -> AppResult<Vec<Persona>> {
    let json = std::fs::read_to_string(path).map_err(|e| {
        AppError::InvalidInput(format!("Could not read personas {}: {}", path.display(), e))
    })?;
    Persona::parse_batch(&json)
}

/// Runs the engine over a list of personas and persists the results
pub struct BatchOrchestrator {
    engine: Arc<RecommendationEngine>,
    concurrency: usize,
}

impl BatchOrchestrator {
    /// `concurrency` of 1 processes personas strictly one after another
    pub fn new(engine: Arc<RecommendationEngine>, concurrency: usize) -> Self {
        Self {
            engine,
            concurrency: concurrency.max(1),
        }
    }

    /// Produces one entry per persona, in input order
    ///
    /// A persona whose pipeline fails still gets an entry with an empty
    /// recommendation list.
    pub async fn run(&self, personas: Vec<Persona>) -> Vec<PersonaRecommendations> {
        let start = Instant::now();
        let total = personas.len();
        tracing::info!(personas = total, concurrency = self.concurrency, "Starting batch");

        let results = if self.concurrency == 1 {
            let mut results = Vec::with_capacity(total);
            for (index, persona) in personas.into_iter().enumerate() {
                results.push(process_persona(&self.engine, index, total, persona).await);
            }
            results
        } else {
            self.run_concurrently(personas).await
        };

        let empty = results
            .iter()
            .filter(|r| r.recommendations.is_empty())
            .count();
        tracing::info!(
            personas = total,
            without_recommendations = empty,
            elapsed_ms = start.elapsed().as_millis(),
            "Batch completed"
        );

        results
    }

    async fn run_concurrently(&self, personas: Vec<Persona>) -> Vec<PersonaRecommendations> {
        let total = personas.len();
        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = Vec::with_capacity(total);

        for (index, persona) in personas.into_iter().enumerate() {
            let engine = Arc::clone(&self.engine);
            let permits = Arc::clone(&permits);
            let raw = persona.raw.clone();
            let span = tracing::Span::current();

            let task = tokio::spawn(
                async move {
                    let _permit = permits.acquire_owned().await;
                    process_persona(&engine, index, total, persona).await
                }
                .instrument(span),
            );
            tasks.push((raw, task));
        }

        // Awaiting in spawn order keeps the output aligned with the input.
        let mut results = Vec::with_capacity(total);
        for (raw, task) in tasks {
            match task.await {
                Ok(result) => results.push(result),
                Err(e) => {
                    let error = AppError::Internal(format!("persona task failed: {}", e));
                    tracing::error!(error = %error, "Persona task join error");
                    results.push(PersonaRecommendations {
                        persona: raw,
                        recommendations: Vec::new(),
                    });
                }
            }
        }
        results
    }

    /// Writes the whole batch in one atomic step
    pub fn persist(&self, path: &Path, results: &[PersonaRecommendations]) -> AppResult<()> {
        storage::write_json_atomic(path, results)?;
        tracing::info!(
            path = %path.display(),
            personas = results.len(),
            "Saved full results"
        );
        Ok(())
    }
}

async fn process_persona(
    engine: &RecommendationEngine,
    index: usize,
    total: usize,
    persona: Persona,
) -> PersonaRecommendations {
    let span = tracing::info_span!("persona", persona_id = %persona.id);

    async move {
        tracing::info!(
            position = index + 1,
            total,
            goal = %persona.profile.dietary_goal,
            "Processing persona"
        );

        let recommendations = match engine.recommend(&persona.profile).await {
            Ok(recommendations) => recommendations,
            Err(e) => {
                tracing::error!(error = %e, "Recommendation pipeline failed for persona");
                Vec::new()
            }
        };

        PersonaRecommendations {
            persona: persona.raw,
            recommendations,
        }
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RecipeRecord, TextOrList};
    use crate::services::corpus::CorpusStore;
    use crate::services::providers::{MockEmbeddingProvider, MockGenerativeModel};
    use crate::services::reranker::{Reranker, RetryPolicy};
    use crate::services::retrieval::SimilarityRetriever;
    use serde_json::json;
    use std::time::Duration;

    fn persona(id: &str, goal: &str) -> Persona {
        Persona::from_value(json!({
            "id": id,
            "description": format!("Persona {}", id),
            "profile": {"dietary_goal": goal}
        }))
        .unwrap()
    }

    async fn engine(model: MockGenerativeModel) -> Arc<RecommendationEngine> {
        let mut embedder = MockEmbeddingProvider::new();
        embedder
            .expect_embed()
            .returning(|texts| Ok(texts.iter().map(|_| vec![1.0, 0.5]).collect()));
        embedder.expect_name().return_const("mock");

        let records = vec![RecipeRecord {
            recipe_id: "r1".to_string(),
            title: "Oat Bowl".to_string(),
            ingredients: TextOrList::Text("oats, milk".to_string()),
            ingredients_title: None,
            tags: None,
            calories_per_serving: Some(320.0),
            protein_per_serving: Some(12.0),
            totalcarbohydrate_per_serving: Some(48.0),
            totalfat_per_serving: Some(7.0),
        }];
        let store = CorpusStore::from_records(records, &embedder, 8).await.unwrap();

        let embedder: Arc<MockEmbeddingProvider> = Arc::new(embedder);
        Arc::new(RecommendationEngine::new(
            Arc::new(store),
            SimilarityRetriever::new(embedder, 100),
            Reranker::new(
                Arc::new(model),
                6,
                true,
                RetryPolicy {
                    max_attempts: 1,
                    initial_backoff: Duration::from_millis(1),
                },
            ),
        ))
    }

    fn failing_for_weight_loss() -> MockGenerativeModel {
        let mut model = MockGenerativeModel::new();
        model
            .expect_complete_json()
            .returning(|_, user| {
                if user.contains("Weight Loss") {
                    Err(AppError::ExternalApi("HTTP 500".to_string()))
                } else {
                    Ok(r#"{"recommendations": [{"recipe_id": "r1", "explanation": "Warm and filling."}]}"#
                        .to_string())
                }
            });
        model.expect_name().return_const("mock");
        model
    }

    #[tokio::test]
    async fn test_failure_is_contained_per_persona() {
        let orchestrator = BatchOrchestrator::new(engine(failing_for_weight_loss()).await, 1);
        let results = orchestrator
            .run(vec![
                persona("p1", "Muscle Gain"),
                persona("p2", "Weight Loss"),
                persona("p3", "Maintenance"),
            ])
            .await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].persona["id"], "p1");
        assert_eq!(results[0].recommendations.len(), 1);
        assert_eq!(results[1].persona["id"], "p2");
        assert!(results[1].recommendations.is_empty());
        assert_eq!(results[2].recommendations.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_run_preserves_order() {
        let orchestrator = BatchOrchestrator::new(engine(failing_for_weight_loss()).await, 4);
        let personas: Vec<Persona> = (0..12)
            .map(|i| {
                let goal = if i % 3 == 0 { "Weight Loss" } else { "Energy Boost" };
                persona(&format!("p{}", i), goal)
            })
            .collect();

        let results = orchestrator.run(personas).await;

        assert_eq!(results.len(), 12);
        for (i, result) in results.iter().enumerate() {
            assert_eq!(result.persona["id"], format!("p{}", i));
            assert_eq!(result.recommendations.is_empty(), i % 3 == 0);
        }
    }

    #[tokio::test]
    async fn test_persist_writes_full_collection() {
        let orchestrator = BatchOrchestrator::new(engine(failing_for_weight_loss()).await, 1);
        let results = orchestrator.run(vec![persona("p1", "Maintenance")]).await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recommendations.json");
        tokio_test::assert_ok!(orchestrator.persist(&path, &results));

        let saved: Vec<PersonaRecommendations> = storage::read_json(&path).unwrap();
        assert_eq!(saved, results);
        assert_eq!(saved[0].recommendations[0].nutrition.protein, "12g");
    }

    #[test]
    fn test_load_personas_missing_file() {
        let result = load_personas(Path::new("/no/personas.json"));
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }
}
