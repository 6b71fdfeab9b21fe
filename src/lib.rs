//! Private knowledge retrieval over meeting transcripts and chat
//! history for a business consultant: ingests both sources into
//! vector corpora and answers natural-language questions through a
//! diversified, filter-aware retrieval engine.

pub mod chat;
pub mod chunking;
pub mod config;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod http;
pub mod retrieval;
pub mod store;
pub mod transcript;
pub mod types;

pub use config::Config;
pub use error::{ConsiliumError, Result};
pub use retrieval::RetrievalEngine;
pub use store::Store;
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
