//! Process-wide configuration, loaded once at boot from CLI flags and
//! the environment (each flag's `env` attribute).
//!
//! Setting-table values are a different, dynamic layer (§5, §9) and are
//! deliberately not modeled here — they are re-fetched per retrieval
//! request through [`crate::store::Store::get_setting`].

use std::time::Duration;

use clap::Parser;

use crate::error::{ConsiliumError, Result};

/// Bootstrap configuration. Immutable after process start. Every
/// binary flattens or parses this directly; a required field with no
/// `env` value set fails fast with clap's own named "missing required
/// argument" error.
#[derive(Parser, Debug, Clone)]
#[command(name = "consilium", about = "Process-wide configuration for the consilium retrieval service")]
pub struct Config {
    /// Postgres connection string.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Telegram user-session API id.
    #[arg(long, env = "TELEGRAM_API_ID")]
    pub telegram_api_id: Option<i32>,
    /// Telegram user-session API hash.
    #[arg(long, env = "TELEGRAM_API_HASH")]
    pub telegram_api_hash: Option<String>,
    /// Serialized Telegram session string.
    #[arg(long, env = "TELEGRAM_SESSION")]
    pub telegram_session: Option<String>,

    /// Fireflies GraphQL API bearer token.
    #[arg(long, env = "FIREFLIES_API_KEY")]
    pub fireflies_api_key: Option<String>,

    /// Embedding model API key.
    #[arg(long, env = "OPENAI_API_KEY")]
    pub openai_api_key: Option<String>,
    /// Generative model API key.
    #[arg(long, env = "ANTHROPIC_API_KEY")]
    pub anthropic_api_key: Option<String>,

    /// Base URL this process's webhooks are reachable on.
    #[arg(long, env = "WEBHOOK_URL")]
    pub webhook_url: Option<String>,

    /// HTTP bind host.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,
    /// HTTP bind port.
    #[arg(long, env = "PORT", default_value_t = 8000)]
    pub port: u16,

    /// Reconciler interval for the chat ingestor (§4.4).
    #[arg(skip = Duration::from_secs(3600))]
    pub reconcile_interval: Duration,

    /// Deadlines for outbound calls (§5).
    #[arg(skip = Duration::from_secs(30))]
    pub embedding_deadline: Duration,
    #[arg(skip = Duration::from_secs(60))]
    pub generation_deadline: Duration,
    #[arg(skip = Duration::from_secs(20))]
    pub transcript_fetch_deadline: Duration,
}

impl Config {
    /// Load a `.env` file if present (local development only — a real
    /// deployment sets the environment directly), then parse flags and
    /// environment variables into a `Config`. Exits the process with
    /// clap's own usage message if a required flag is missing.
    pub fn load() -> Self {
        dotenvy::dotenv().ok();
        Config::parse()
    }

    /// Require the Telegram user-session triple, for binaries that
    /// cannot run without it (the chat watcher).
    pub fn require_telegram(&self) -> Result<(i32, &str, &str)> {
        let id = self
            .telegram_api_id
            .ok_or_else(|| ConsiliumError::Config("TELEGRAM_API_ID is required".into()))?;
        let hash = self
            .telegram_api_hash
            .as_deref()
            .ok_or_else(|| ConsiliumError::Config("TELEGRAM_API_HASH is required".into()))?;
        let session = self
            .telegram_session
            .as_deref()
            .ok_or_else(|| ConsiliumError::Config("TELEGRAM_SESSION is required".into()))?;
        Ok((id, hash, session))
    }
}
