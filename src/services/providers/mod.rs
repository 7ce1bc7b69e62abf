/// Model provider abstraction
///
/// The engine talks to two external models: an embedding model used for both
/// recipe documents and profile queries, and a generative model used by the
/// reranker. Both are injected as trait objects so tests can substitute fakes.
use crate::error::AppResult;

pub mod openai;

pub use openai::{OpenAiChatModel, OpenAiEmbedder};

/// Trait for text embedding models
///
/// Recipes and queries must go through the same provider so their vectors
/// live in the same space.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embeds each text, returning one vector per input in input order
    async fn embed(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;

    /// Provider name for logging and debugging
    fn name(&self) -> &'static str;
}

/// Trait for chat-style generative models that answer in JSON
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Sends a system and user message and returns the raw JSON text of the reply
    async fn complete_json(&self, system_prompt: &str, user_prompt: &str) -> AppResult<String>;

    /// Provider name for logging and debugging
    fn name(&self) -> &'static str;
}
