use std::sync::Arc;

use crate::{
    error::AppResult,
    models::{Recommendation, UserProfile},
    services::{constraints::apply_hard_constraints, corpus::CorpusStore},
    services::{reranker::Reranker, retrieval::SimilarityRetriever},
};

/// Hybrid recommendation engine for a single profile
///
/// Safety first, relevance second:
/// 1. Hard constraints remove recipes the user must not eat
/// 2. Vector similarity shrinks the remainder to a consideration set
/// 3. The generative reranker picks and explains the final list
pub struct RecommendationEngine {
    corpus: Arc<CorpusStore>,
    retriever: SimilarityRetriever,
    reranker: Reranker,
}

impl RecommendationEngine {
    pub fn new(corpus: Arc<CorpusStore>, retriever: SimilarityRetriever, reranker: Reranker) -> Self {
        Self {
            corpus,
            retriever,
            reranker,
        }
    }

    /// Generates explained recommendations for one profile
    ///
    /// Only a query embedding failure is returned as an error; an empty filter
    /// result or a failed reranking produce an empty list.
    pub async fn recommend(&self, profile: &UserProfile) -> AppResult<Vec<Recommendation>> {
        let safe = apply_hard_constraints(self.corpus.recipes(), profile);
        tracing::info!(
            corpus = self.corpus.len(),
            safe = safe.len(),
            "Stage 1: hard constraints applied"
        );

        let candidates = self.retriever.retrieve(profile, &safe).await?;
        tracing::info!(
            candidates = candidates.len(),
            "Stage 1: retrieved candidates"
        );

        let recommendations = self.reranker.rerank_explain(profile, &candidates).await;
        tracing::info!(
            recommendations = recommendations.len(),
            "Stage 2: generated final recommendations"
        );

        Ok(recommendations)
    }
}
