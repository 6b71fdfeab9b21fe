//! HTTP-backed generator calling Anthropic's Messages API, grounded
//! in the original Python service's `ChatAnthropic` binding (same
//! model id, same system/user message split).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ConsiliumError, Result};
use crate::generation::Generator;

/// Matches the model the original service pinned (`claude-sonnet-4-20250514`).
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

pub struct AnthropicGenerator {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl AnthropicGenerator {
    pub fn new(api_key: String, model: impl Into<String>, deadline: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(deadline)
                .build()
                .expect("reqwest client builds"),
            api_key,
            model: model.into(),
            base_url: "https://api.anthropic.com/v1".to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Serialize)]
struct MessageRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message>,
}

#[derive(Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct MessageResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct ApiErrorEnvelope {
    error: ApiError,
}

#[async_trait]
impl Generator for AnthropicGenerator {
    async fn generate(&self, system: &str, user: &str) -> Result<String> {
        let request = MessageRequest {
            model: &self.model,
            max_tokens: DEFAULT_MAX_TOKENS,
            system,
            messages: vec![Message {
                role: "user".to_string(),
                content: user.to_string(),
            }],
        };

        let resp = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ConsiliumError::RateLimited(1));
        }
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ConsiliumError::Auth(format!("generative model auth rejected: {status}")));
        }
        if status.is_client_error() {
            let body = resp.json::<ApiErrorEnvelope>().await.ok();
            let reason = body.map(|b| b.error.message).unwrap_or_default();
            return Err(ConsiliumError::PermanentUpstream(format!(
                "generative model rejected the request ({status}): {reason}"
            )));
        }
        if !status.is_success() {
            return Err(ConsiliumError::Transient(format!("generative model returned {status}")));
        }

        let parsed: MessageResponse = resp
            .json()
            .await
            .map_err(|e| ConsiliumError::DataContract(format!("malformed generative model response: {e}")))?;

        let text = parsed
            .content
            .into_iter()
            .map(|b| b.text)
            .collect::<Vec<_>>()
            .join("");

        if text.trim().is_empty() {
            return Err(ConsiliumError::Generation("generative model returned no text content".into()));
        }

        Ok(text)
    }
}

fn classify_reqwest_error(e: reqwest::Error) -> ConsiliumError {
    if e.is_timeout() || e.is_connect() {
        ConsiliumError::Transient(e.to_string())
    } else {
        ConsiliumError::Generation(e.to_string())
    }
}
