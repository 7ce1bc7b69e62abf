use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Recipe corpus (.csv, .json or .jsonl)
    #[serde(default = "default_recipes_file")]
    pub recipes_file: PathBuf,

    /// Persona input file (JSON array)
    #[serde(default = "default_personas_file")]
    pub personas_file: PathBuf,

    /// Engine output file
    #[serde(default = "default_recommendations_file")]
    pub recommendations_file: PathBuf,

    /// A/B split output file
    #[serde(default = "default_ab_recommendations_file")]
    pub ab_recommendations_file: PathBuf,

    /// OpenAI-compatible API key, required by the `recommend` command
    #[serde(default)]
    pub openai_api_key: String,

    /// OpenAI-compatible API base URL
    #[serde(default = "default_openai_api_url")]
    pub openai_api_url: String,

    /// Embedding API base URL, falls back to `openai_api_url`
    #[serde(default)]
    pub embedding_api_url: Option<String>,

    /// Embedding API key, falls back to `openai_api_key`
    #[serde(default)]
    pub embedding_api_key: Option<String>,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Number of documents sent per embedding request
    #[serde(default = "default_embedding_batch_size")]
    pub embedding_batch_size: usize,

    #[serde(default = "default_llm_model")]
    pub llm_model: String,

    #[serde(default = "default_llm_temperature")]
    pub llm_temperature: f32,

    /// Number of candidates sent to the reranker
    #[serde(default = "default_consideration_set_size")]
    pub consideration_set_size: usize,

    /// Number of final recommendations requested per persona
    #[serde(default = "default_final_k")]
    pub final_k: usize,

    /// Truncate model output to `final_k` entries
    #[serde(default = "default_enforce_final_k")]
    pub enforce_final_k: bool,

    /// Total attempts per reranking call, 1 disables retries
    #[serde(default = "default_rerank_max_attempts")]
    pub rerank_max_attempts: u32,

    #[serde(default = "default_rerank_initial_backoff_ms")]
    pub rerank_initial_backoff_ms: u64,

    /// HTTP timeout for model requests
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Personas processed at once, 1 keeps the batch strictly sequential
    #[serde(default = "default_persona_concurrency")]
    pub persona_concurrency: usize,
}

fn default_recipes_file() -> PathBuf {
    PathBuf::from("data/input/recipes.csv")
}

fn default_personas_file() -> PathBuf {
    PathBuf::from("data/output/personas.json")
}

fn default_recommendations_file() -> PathBuf {
    PathBuf::from("data/output/recommendations.json")
}

fn default_ab_recommendations_file() -> PathBuf {
    PathBuf::from("data/output/recommendations_ab.json")
}

fn default_openai_api_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_embedding_batch_size() -> usize {
    128
}

fn default_llm_model() -> String {
    "gpt-4o".to_string()
}

fn default_llm_temperature() -> f32 {
    0.5
}

fn default_consideration_set_size() -> usize {
    100
}

fn default_final_k() -> usize {
    6
}

fn default_enforce_final_k() -> bool {
    true
}

fn default_rerank_max_attempts() -> u32 {
    3
}

fn default_rerank_initial_backoff_ms() -> u64 {
    500
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_persona_concurrency() -> usize {
    1
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_iter(std::env::vars())
    }

    /// Load configuration from explicit key/value pairs
    pub fn from_iter<I>(vars: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config = envy::from_iter::<_, Config>(vars)
            .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.consideration_set_size == 0 {
            anyhow::bail!("CONSIDERATION_SET_SIZE must be at least 1");
        }
        if self.final_k == 0 {
            anyhow::bail!("FINAL_K must be at least 1");
        }
        if self.rerank_max_attempts == 0 {
            anyhow::bail!("RERANK_MAX_ATTEMPTS must be at least 1");
        }
        if self.embedding_batch_size == 0 {
            anyhow::bail!("EMBEDDING_BATCH_SIZE must be at least 1");
        }
        Ok(())
    }

    /// Fails unless a key for the generative model is configured
    pub fn require_api_key(&self) -> anyhow::Result<&str> {
        if self.openai_api_key.trim().is_empty() {
            anyhow::bail!("OPENAI_API_KEY must be set");
        }
        Ok(&self.openai_api_key)
    }

    pub fn embedding_api_url(&self) -> &str {
        self.embedding_api_url
            .as_deref()
            .unwrap_or(&self.openai_api_url)
    }

    pub fn embedding_api_key(&self) -> &str {
        self.embedding_api_key
            .as_deref()
            .unwrap_or(&self.openai_api_key)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn rerank_initial_backoff(&self) -> Duration {
        Duration::from_millis(self.rerank_initial_backoff_ms)
    }
}
