pub mod ab_split;
pub mod batch;
pub mod constraints;
pub mod corpus;
pub mod providers;
pub mod recommendations;
pub mod reranker;
pub mod retrieval;

pub use batch::BatchOrchestrator;
pub use corpus::CorpusStore;
pub use recommendations::RecommendationEngine;
pub use reranker::{Reranker, RetryPolicy};
pub use retrieval::SimilarityRetriever;
