//! Fireflies GraphQL transcript provider (§6 Transcript provider),
//! grounded in the original GraphQL query shape.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::error::{ConsiliumError, Result};
use crate::transcript::{Sentence, TranscriptPayload, TranscriptProvider, TranscriptSummaryPayload};

const GRAPHQL_URL: &str = "https://api.fireflies.ai/graphql";

const TRANSCRIPT_QUERY: &str = r#"
query Transcript($id: String!) {
  transcript(id: $id) {
    title
    date
    sentences { speaker_name text start_time end_time }
    summary { overview action_items }
  }
}
"#;

pub struct FirefliesClient {
    http: reqwest::Client,
    api_key: String,
}

impl FirefliesClient {
    pub fn new(api_key: String, deadline: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(deadline)
            .build()
            .map_err(|e| ConsiliumError::Config(format!("failed to build fireflies client: {e}")))?;
        Ok(Self { http, api_key })
    }
}

#[derive(Deserialize)]
struct GraphQlResponse {
    data: Option<GraphQlData>,
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Deserialize)]
struct GraphQlData {
    transcript: Option<RawTranscript>,
}

#[derive(Deserialize)]
struct RawTranscript {
    title: String,
    date: Option<chrono::DateTime<chrono::Utc>>,
    sentences: Vec<Sentence>,
    summary: Option<TranscriptSummaryPayload>,
}

#[async_trait]
impl TranscriptProvider for FirefliesClient {
    async fn get_transcript(&self, meeting_id: &str) -> Result<TranscriptPayload> {
        let body = json!({
            "query": TRANSCRIPT_QUERY,
            "variables": { "id": meeting_id },
        });

        let resp = self
            .http
            .post(GRAPHQL_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ConsiliumError::RateLimited(1));
        }
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ConsiliumError::Auth(format!("fireflies auth rejected: {status}")));
        }
        if status.is_client_error() {
            return Err(ConsiliumError::PermanentUpstream(format!(
                "fireflies rejected the request: {status}"
            )));
        }
        if !status.is_success() {
            return Err(ConsiliumError::Transient(format!("fireflies returned {status}")));
        }

        let parsed: GraphQlResponse = resp
            .json()
            .await
            .map_err(|e| ConsiliumError::DataContract(format!("malformed fireflies response: {e}")))?;

        if let Some(errors) = parsed.errors {
            let joined = errors.into_iter().map(|e| e.message).collect::<Vec<_>>().join("; ");
            return Err(ConsiliumError::TranscriptProvider(joined));
        }

        let raw = parsed
            .data
            .and_then(|d| d.transcript)
            .ok_or_else(|| ConsiliumError::NotFound(format!("no transcript for meeting {meeting_id}")))?;

        Ok(TranscriptPayload {
            title: raw.title,
            date: raw.date,
            sentences: raw.sentences,
            summary: raw.summary.unwrap_or_default(),
        })
    }
}

fn classify_reqwest_error(e: reqwest::Error) -> ConsiliumError {
    if e.is_timeout() || e.is_connect() {
        ConsiliumError::Transient(e.to_string())
    } else {
        ConsiliumError::TranscriptProvider(e.to_string())
    }
}
