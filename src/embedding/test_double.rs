//! Deterministic, network-free embedder for tests. Shares the same
//! trait boundary as [`super::OpenAiEmbedder`] so retrieval and
//! ingestion tests never depend on a live network call (§4.2).

use async_trait::async_trait;

use crate::error::Result;
use crate::types::VECTOR_DIM;

/// Produces a hash-seeded unit vector for each input string. Identical
/// strings always embed identically; distinct strings are extremely
/// unlikely to collide, which is enough for exercising similarity
/// ranking in tests without a real model.
#[derive(Default)]
pub struct DeterministicEmbedder;

impl DeterministicEmbedder {
    pub fn new() -> Self {
        Self
    }

    /// Exposed so tests can construct query vectors identically to
    /// how the embedder itself would embed the same text.
    pub fn vector_for(text: &str) -> Vec<f32> {
        let mut seed: u64 = 1469598103934665603; // FNV offset basis
        for byte in text.as_bytes() {
            seed ^= *byte as u64;
            seed = seed.wrapping_mul(1099511628211);
        }

        let mut vector = Vec::with_capacity(VECTOR_DIM);
        let mut state = seed;
        for _ in 0..VECTOR_DIM {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let v = ((state % 2000) as f32 / 1000.0) - 1.0;
            vector.push(v);
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl super::Embedder for DeterministicEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| Self::vector_for(t)).collect())
    }
}
