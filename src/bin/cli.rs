//! Operator CLI: manual indexing, reindexing, and ad hoc questions
//! against a running deployment's database, bypassing the HTTP surface.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use uuid::Uuid;

use consilium::config::Config;
use consilium::embedding::OpenAiEmbedder;
use consilium::error::{ConsiliumError, Result};
use consilium::generation::anthropic::DEFAULT_MODEL;
use consilium::generation::AnthropicGenerator;
use consilium::retrieval::RetrievalEngine;
use consilium::store::postgres::PostgresStore;
use consilium::store::Store;

#[derive(Parser)]
#[command(name = "consilium-cli", about = "Operator CLI for the consilium retrieval service")]
struct Cli {
    #[command(subcommand)]
    command: Command,
    #[command(flatten)]
    config: Config,
}

#[derive(Subcommand)]
enum Command {
    /// Index a meeting's transcript if it has no embeddings yet.
    Index { meeting_id: Uuid },
    /// Unconditionally re-chunk and re-embed a meeting's transcript.
    Reindex { meeting_id: Uuid },
    /// Ask a question against both corpora.
    Ask {
        question: String,
        #[arg(long)]
        client_id: Option<Uuid>,
        #[arg(long, default_value_t = false)]
        chats: bool,
    },
    /// Print indexing stats.
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = cli.config;
    let store = Arc::new(PostgresStore::connect(&config.database_url).await?);

    match cli.command {
        Command::Stats => {
            let (total_chunks, indexed_meetings) = store.rag_stats().await?;
            println!("total_chunks={total_chunks} indexed_meetings={indexed_meetings}");
        }
        Command::Index { meeting_id } => {
            let embedder = openai_embedder(&config)?;
            let provider = fireflies_provider(&config)?;
            let ingestor = consilium::transcript::ingestor::TranscriptIngestor::new(store, provider, embedder);
            let n = ingestor.index_meeting(meeting_id).await?;
            println!("indexed {n} chunks");
        }
        Command::Reindex { meeting_id } => {
            let embedder = openai_embedder(&config)?;
            let provider = fireflies_provider(&config)?;
            let ingestor = consilium::transcript::ingestor::TranscriptIngestor::new(store, provider, embedder);
            let n = ingestor.reindex_meeting(meeting_id).await?;
            println!("created {n} chunks");
        }
        Command::Ask { question, client_id, chats } => {
            let embedder = openai_embedder(&config)?;
            let generator = anthropic_generator(&config)?;
            let engine = RetrievalEngine::new(store, embedder, generator);
            let response = engine.ask(&question, client_id, chats).await?;
            println!("{}", response.answer);
            for source in &response.meeting_sources {
                println!("  [meeting] {} ({:.2})", source.meeting_title, source.similarity);
            }
            for source in &response.chat_sources {
                println!("  [chat] {} ({:.2})", source.chat_title, source.similarity);
            }
        }
    }

    Ok(())
}

fn openai_embedder(config: &Config) -> Result<Arc<OpenAiEmbedder>> {
    let key = config
        .openai_api_key
        .clone()
        .ok_or_else(|| ConsiliumError::Config("OPENAI_API_KEY is required".into()))?;
    Ok(Arc::new(OpenAiEmbedder::new(key, "text-embedding-3-small", config.embedding_deadline)))
}

fn anthropic_generator(config: &Config) -> Result<Arc<AnthropicGenerator>> {
    let key = config
        .anthropic_api_key
        .clone()
        .ok_or_else(|| ConsiliumError::Config("ANTHROPIC_API_KEY is required".into()))?;
    Ok(Arc::new(AnthropicGenerator::new(key, DEFAULT_MODEL, config.generation_deadline)))
}

fn fireflies_provider(config: &Config) -> Result<Arc<consilium::transcript::fireflies::FirefliesClient>> {
    let key = config
        .fireflies_api_key
        .clone()
        .ok_or_else(|| ConsiliumError::Config("FIREFLIES_API_KEY is required".into()))?;
    Ok(Arc::new(consilium::transcript::fireflies::FirefliesClient::new(
        key,
        config.transcript_fetch_deadline,
    )?))
}
