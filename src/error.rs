//! Error taxonomy for consilium
//!
//! Mirrors §7 of the spec: transient I/O is retryable, permanent
//! upstream rejection is fatal, rate limits bubble up as transient
//! once their deadline is exhausted, and data-contract violations
//! abort a single unit of work without poisoning durable state.

use thiserror::Error;

/// Result type alias for consilium operations
pub type Result<T> = std::result::Result<T, ConsiliumError>;

#[derive(Error, Debug)]
pub enum ConsiliumError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("data contract violation: {0}")]
    DataContract(String),

    #[error("embedding error: {0}")]
    Embedding(String),

    #[error("generative model error: {0}")]
    Generation(String),

    #[error("chat network error: {0}")]
    ChatNetwork(String),

    #[error("transcript provider error: {0}")]
    TranscriptProvider(String),

    #[error("upstream rejected the request (permanent): {0}")]
    PermanentUpstream(String),

    #[error("rate limited: retry after {0}s")]
    RateLimited(u64),

    #[error("transient I/O failure: {0}")]
    Transient(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("http error: {0}")]
    #[cfg(feature = "openai")]
    Http(#[from] reqwest::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ConsiliumError {
    /// Whether the caller may safely retry this operation. Transient
    /// I/O failures and rate limits are retryable; permanent upstream
    /// rejections and data-contract violations are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ConsiliumError::Transient(_) | ConsiliumError::RateLimited(_) | ConsiliumError::Database(_)
        )
    }

    /// Whether this error should terminate a long-lived process
    /// (chat ingestor authorization failures are fatal, §4.4).
    pub fn is_fatal(&self) -> bool {
        matches!(self, ConsiliumError::Auth(_) | ConsiliumError::PermanentUpstream(_))
    }

    /// A short stable string code per variant, used for log
    /// correlation and for the HTTP error body's reason string.
    pub fn code(&self) -> &'static str {
        match self {
            ConsiliumError::Database(_) => "database_error",
            ConsiliumError::NotFound(_) => "not_found",
            ConsiliumError::InvalidInput(_) => "invalid_input",
            ConsiliumError::DataContract(_) => "data_contract_violation",
            ConsiliumError::Embedding(_) => "embedding_error",
            ConsiliumError::Generation(_) => "generation_error",
            ConsiliumError::ChatNetwork(_) => "chat_network_error",
            ConsiliumError::TranscriptProvider(_) => "transcript_provider_error",
            ConsiliumError::PermanentUpstream(_) => "permanent_upstream_rejection",
            ConsiliumError::RateLimited(_) => "rate_limited",
            ConsiliumError::Transient(_) => "transient_io_failure",
            ConsiliumError::Auth(_) => "auth_failed",
            ConsiliumError::Config(_) => "config_error",
            ConsiliumError::Serialization(_) => "serialization_error",
            #[cfg(feature = "openai")]
            ConsiliumError::Http(_) => "http_error",
            ConsiliumError::Internal(_) => "internal_error",
        }
    }
}
