//! HTTP-backed embedder calling an OpenAI-compatible embeddings API.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::embedding::Embedder;
use crate::error::{ConsiliumError, Result};
use crate::types::VECTOR_DIM;

/// The upstream batch ceiling a single logical embed call must never
/// exceed (§4.2).
const MAX_BATCH: usize = 100;

pub struct OpenAiEmbedder {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiEmbedder {
    pub fn new(api_key: String, model: impl Into<String>, deadline: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(deadline)
                .build()
                .expect("reqwest client builds"),
            api_key,
            model: model.into(),
            base_url: "https://api.openai.com/v1".to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        #[derive(Serialize)]
        struct Req<'a> {
            input: &'a [String],
            model: &'a str,
        }
        #[derive(Deserialize)]
        struct EmbeddingRow {
            embedding: Vec<f32>,
        }
        #[derive(Deserialize)]
        struct Resp {
            data: Vec<EmbeddingRow>,
        }

        let resp = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&Req {
                input: inputs,
                model: &self.model,
            })
            .send()
            .await
            .map_err(|e| classify_reqwest_error(e))?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ConsiliumError::RateLimited(1));
        }
        if status.is_client_error() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ConsiliumError::PermanentUpstream(format!(
                "embedding API rejected request ({status}): {body}"
            )));
        }
        if !status.is_success() {
            return Err(ConsiliumError::Transient(format!("embedding API returned {status}")));
        }

        let parsed: Resp = resp.json().await.map_err(|e| classify_reqwest_error(e))?;
        let vectors: Vec<Vec<f32>> = parsed.data.into_iter().map(|r| r.embedding).collect();

        for v in &vectors {
            if v.len() != VECTOR_DIM {
                return Err(ConsiliumError::DataContract(format!(
                    "embedding model returned dimension {} != {VECTOR_DIM}",
                    v.len()
                )));
            }
        }

        Ok(vectors)
    }
}

fn classify_reqwest_error(e: reqwest::Error) -> ConsiliumError {
    if e.is_timeout() || e.is_connect() {
        ConsiliumError::Transient(e.to_string())
    } else {
        ConsiliumError::Embedding(e.to_string())
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(MAX_BATCH) {
            out.extend(self.embed_batch(batch).await?);
        }
        Ok(out)
    }
}
