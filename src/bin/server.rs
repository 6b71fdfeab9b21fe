//! Retrieval/webhook HTTP server (§6): binds the six stable endpoints
//! atop the library API.

use std::sync::Arc;

use consilium::config::Config;
use consilium::embedding::OpenAiEmbedder;
use consilium::error::{ConsiliumError, Result};
use consilium::generation::AnthropicGenerator;
use consilium::generation::anthropic::DEFAULT_MODEL;
use consilium::http::{router, AppState};
use consilium::retrieval::RetrievalEngine;
use consilium::store::postgres::PostgresStore;
use consilium::transcript::fireflies::FirefliesClient;
use consilium::transcript::ingestor::TranscriptIngestor;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::load();

    let store = Arc::new(PostgresStore::connect(&config.database_url).await?);

    let openai_key = config
        .openai_api_key
        .clone()
        .ok_or_else(|| ConsiliumError::Config("OPENAI_API_KEY is required".into()))?;
    let embedder = Arc::new(OpenAiEmbedder::new(openai_key, "text-embedding-3-small", config.embedding_deadline));

    let anthropic_key = config
        .anthropic_api_key
        .clone()
        .ok_or_else(|| ConsiliumError::Config("ANTHROPIC_API_KEY is required".into()))?;
    let generator = Arc::new(AnthropicGenerator::new(anthropic_key, DEFAULT_MODEL, config.generation_deadline));

    let fireflies_key = config
        .fireflies_api_key
        .clone()
        .ok_or_else(|| ConsiliumError::Config("FIREFLIES_API_KEY is required".into()))?;
    let transcript_provider = Arc::new(FirefliesClient::new(fireflies_key, config.transcript_fetch_deadline)?);

    let transcript_ingestor = Arc::new(TranscriptIngestor::new(
        store.clone(),
        transcript_provider,
        embedder.clone(),
    ));

    let retrieval = Arc::new(RetrievalEngine::new(store.clone(), embedder.clone(), generator.clone()));

    let state = AppState {
        store,
        embedder,
        generator,
        transcript_ingestor,
        retrieval,
    };

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ConsiliumError::Internal(format!("failed to bind {addr}: {e}")))?;

    tracing::info!(addr, "consilium server listening");
    axum::serve(listener, router(state))
        .await
        .map_err(|e| ConsiliumError::Internal(format!("server error: {e}")))?;

    Ok(())
}
