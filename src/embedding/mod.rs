//! Embedder: turns text into fixed-dimension vectors via an external
//! model (§4.2). Batches to an upstream limit; surfaces upstream
//! failures and leaves retry decisions to the caller.

pub mod openai;
pub mod test_double;

use async_trait::async_trait;

use crate::error::Result;

pub use openai::OpenAiEmbedder;
pub use test_double::DeterministicEmbedder;

/// Capability interface shared by the production HTTP-backed embedder
/// and the deterministic test double (§9 Dynamic dispatch).
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of strings, returning equally-dimensioned vectors
    /// in the same order. Implementations must internally chunk calls
    /// that exceed the upstream batch limit.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Convenience for embedding a single piece of text.
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed(std::slice::from_ref(&text.to_string())).await?;
        Ok(vectors.remove(0))
    }
}
