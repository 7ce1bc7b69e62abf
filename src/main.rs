use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::Instrument;

use xfood_recommender::{
    config::Config,
    models::PersonaRecommendations,
    services::{
        ab_split,
        batch::load_personas,
        providers::{OpenAiChatModel, OpenAiEmbedder},
        BatchOrchestrator, CorpusStore, RecommendationEngine, Reranker, RetryPolicy,
        SimilarityRetriever,
    },
    storage,
    telemetry::{self, RunId},
};

#[derive(Parser)]
#[command(name = "xfood", version, about = "Explainable food recommendations for personas")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate explained recommendations for every persona
    Recommend {
        /// Recipe corpus, overrides RECIPES_FILE
        #[arg(long)]
        recipes: Option<PathBuf>,
        /// Persona file, overrides PERSONAS_FILE
        #[arg(long)]
        personas: Option<PathBuf>,
        /// Output file, overrides RECOMMENDATIONS_FILE
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Build the A/B evaluation dataset from engine output
    AbSplit {
        /// Engine output, overrides RECOMMENDATIONS_FILE
        #[arg(long)]
        input: Option<PathBuf>,
        /// A/B output, overrides AB_RECOMMENDATIONS_FILE
        #[arg(long)]
        output: Option<PathBuf>,
        /// Seed for a reproducible split
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG and LOG_FORMAT may come from .env.
    dotenvy::dotenv().ok();
    telemetry::init_tracing();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let run_id = RunId::new();

    match cli.command {
        Command::Recommend {
            recipes,
            personas,
            output,
        } => {
            let span = telemetry::make_span_with_run_id(&run_id, "recommend");
            recommend(
                config.clone(),
                recipes.unwrap_or(config.recipes_file),
                personas.unwrap_or(config.personas_file),
                output.unwrap_or(config.recommendations_file),
            )
            .instrument(span)
            .await
        }
        Command::AbSplit {
            input,
            output,
            seed,
        } => {
            let _guard = telemetry::make_span_with_run_id(&run_id, "ab-split").entered();
            let input = input.unwrap_or(config.recommendations_file);
            let output = output.unwrap_or(config.ab_recommendations_file);

            let results: Vec<PersonaRecommendations> = storage::read_json(&input)
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let split = ab_split::split(results, seed);
            storage::write_json_atomic(&output, &split)
                .with_context(|| format!("Failed to write {}", output.display()))?;

            tracing::info!(path = %output.display(), "Saved A/B dataset");
            Ok(())
        }
    }
}

async fn recommend(
    config: Config,
    recipes: PathBuf,
    personas: PathBuf,
    output: PathBuf,
) -> anyhow::Result<()> {
    let api_key = config.require_api_key()?.to_string();

    // Personas are validated before any embedding work starts.
    let personas = load_personas(&personas)?;

    let embedder = Arc::new(OpenAiEmbedder::new(
        config.embedding_api_url().to_string(),
        config.embedding_api_key().to_string(),
        config.embedding_model.clone(),
        config.request_timeout(),
    )?);
    let model = Arc::new(OpenAiChatModel::new(
        config.openai_api_url.clone(),
        api_key,
        config.llm_model.clone(),
        config.llm_temperature,
        config.request_timeout(),
    )?);

    let corpus = CorpusStore::load(&recipes, embedder.as_ref(), config.embedding_batch_size)
        .await
        .context("Failed to build recipe corpus")?;
    tracing::info!(
        recipes = corpus.len(),
        dimension = corpus.dimension(),
        embedding_model = %config.embedding_model,
        "Corpus ready"
    );

    let engine = RecommendationEngine::new(
        Arc::new(corpus),
        SimilarityRetriever::new(embedder, config.consideration_set_size),
        Reranker::new(
            model,
            config.final_k,
            config.enforce_final_k,
            RetryPolicy {
                max_attempts: config.rerank_max_attempts,
                initial_backoff: config.rerank_initial_backoff(),
            },
        ),
    );

    let orchestrator = BatchOrchestrator::new(Arc::new(engine), config.persona_concurrency);
    let results = orchestrator.run(personas).await;
    orchestrator
        .persist(&output, &results)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    Ok(())
}
