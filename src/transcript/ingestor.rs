//! Webhook handling and indexing for meeting transcripts (§4.5).

use std::sync::Arc;

use tracing::{info, warn};

use crate::chunking::chunk_transcript;
use crate::embedding::Embedder;
use crate::error::{ConsiliumError, Result};
use crate::store::Store;
use crate::transcript::{TranscriptProvider, WebhookEvent, TRANSCRIPTION_COMPLETED};
use crate::types::MeetingId;

/// Outcome of handling a single webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Created(MeetingId),
    AlreadyExists(MeetingId),
    Ignored,
}

pub struct TranscriptIngestor {
    store: Arc<dyn Store>,
    provider: Arc<dyn TranscriptProvider>,
    embedder: Arc<dyn Embedder>,
}

impl TranscriptIngestor {
    pub fn new(store: Arc<dyn Store>, provider: Arc<dyn TranscriptProvider>, embedder: Arc<dyn Embedder>) -> Self {
        Self { store, provider, embedder }
    }

    /// Steps 1-4 of §4.5: filter by event type, dedup on `provider_id`,
    /// fetch and normalize the transcript, persist the meeting row.
    /// Indexing is a separate, explicit step (`index_meeting`) so a
    /// webhook delivery never blocks on an embedding-provider outage.
    pub async fn handle_webhook(&self, event: WebhookEvent) -> Result<WebhookOutcome> {
        if event.event_type != TRANSCRIPTION_COMPLETED {
            return Ok(WebhookOutcome::Ignored);
        }

        if let Some(existing) = self.store.get_meeting_by_provider_id(&event.meeting_id).await? {
            info!(meeting_id = %existing.id, provider_id = %event.meeting_id, "webhook for already-ingested meeting, skipping");
            return Ok(WebhookOutcome::AlreadyExists(existing.id));
        }

        let payload = self.provider.get_transcript(&event.meeting_id).await?;
        let transcript = payload.flatten();
        if transcript.trim().is_empty() {
            return Err(ConsiliumError::DataContract(format!(
                "transcript {} has no sentences",
                event.meeting_id
            )));
        }

        let meeting = self
            .store
            .create_meeting(Some(event.meeting_id.clone()), payload.title, payload.date, Some(transcript), None, None)
            .await?;

        info!(meeting_id = %meeting.id, provider_id = %event.meeting_id, "ingested meeting transcript");
        Ok(WebhookOutcome::Created(meeting.id))
    }

    /// Chunk, embed, and persist embeddings for a meeting. A no-op if
    /// the meeting is already fully indexed (§4.5 step 5).
    pub async fn index_meeting(&self, meeting_id: MeetingId) -> Result<usize> {
        if self.store.meeting_embedding_count(meeting_id).await? > 0 {
            return Ok(0);
        }
        self.do_index(meeting_id).await
    }

    /// Unconditional, destructive re-embedding of a meeting's
    /// transcript (§4.5 Reindex): always re-chunks and re-embeds,
    /// replacing whatever embeddings already exist.
    pub async fn reindex_meeting(&self, meeting_id: MeetingId) -> Result<usize> {
        self.do_index(meeting_id).await
    }

    async fn do_index(&self, meeting_id: MeetingId) -> Result<usize> {
        let meeting = self
            .store
            .get_meeting(meeting_id)
            .await?
            .ok_or_else(|| ConsiliumError::NotFound(format!("meeting {meeting_id}")))?;

        let transcript = meeting
            .transcript
            .ok_or_else(|| ConsiliumError::DataContract(format!("meeting {meeting_id} has no transcript")))?;

        let chunks = chunk_transcript(&transcript);
        if chunks.is_empty() {
            warn!(meeting_id = %meeting_id, "transcript produced no chunks, nothing to index");
            return Ok(0);
        }

        let vectors = self.embedder.embed(&chunks).await?;
        if vectors.len() != chunks.len() {
            return Err(ConsiliumError::DataContract(format!(
                "embedder returned {} vectors for {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }

        let pairs: Vec<(String, Vec<f32>)> = chunks.into_iter().zip(vectors).collect();
        let n = pairs.len();
        self.store.replace_meeting_embeddings(meeting_id, pairs).await?;
        info!(meeting_id = %meeting_id, chunks = n, "indexed meeting");
        Ok(n)
    }
}
