//! Transcript Ingestor: accepts webhook events, pulls the transcript,
//! normalizes, chunks, embeds, persists (§4.5).

pub mod fireflies;
pub mod ingestor;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One sentence of a provider transcript (§6 Transcript provider).
#[derive(Debug, Clone, Deserialize)]
pub struct Sentence {
    pub speaker_name: String,
    pub text: String,
    #[allow(dead_code)]
    pub start_time: f64,
    #[allow(dead_code)]
    pub end_time: f64,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TranscriptSummaryPayload {
    pub overview: Option<String>,
    pub action_items: Option<String>,
}

/// The structured payload returned by the transcript provider (§6).
#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptPayload {
    pub title: String,
    pub date: Option<DateTime<Utc>>,
    pub sentences: Vec<Sentence>,
    #[serde(default)]
    pub summary: TranscriptSummaryPayload,
}

impl TranscriptPayload {
    /// Flatten `sentences` into `"<speaker>: <text>"` lines joined by
    /// newlines (§4.5 step 3).
    pub fn flatten(&self) -> String {
        self.sentences
            .iter()
            .map(|s| format!("{}: {}", s.speaker_name, s.text))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// The webhook body accepted at `POST /api/webhook/fireflies` (§6).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebhookEvent {
    #[serde(rename = "meetingId")]
    pub meeting_id: String,
    #[serde(rename = "eventType")]
    pub event_type: String,
    #[serde(rename = "clientReferenceId")]
    pub client_reference_id: Option<String>,
}

/// Only `event_type == "Transcription completed"` is processed (§4.5).
pub const TRANSCRIPTION_COMPLETED: &str = "Transcription completed";

/// Capability interface for the transcript provider, consumed through
/// a narrow GraphQL-shaped contract (§6, §9 Dynamic dispatch).
#[async_trait]
pub trait TranscriptProvider: Send + Sync {
    async fn get_transcript(&self, meeting_id: &str) -> Result<TranscriptPayload>;
}
