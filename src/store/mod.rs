//! The Store: durable persistence for entities, messages, transcripts,
//! per-chunk vectors, synchronization cursors, and tunable settings
//! (§4.1). The Store is the only component permitted to hold a
//! database handle — everything else receives query results through
//! this trait.

pub mod migrations;
pub mod mock;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::*;

/// Outcome of the chat save-and-index path (§4.4 step 3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatIngestOutcome {
    Inserted(MessageId),
    Skipped,
}

/// Durable persistence and vector search. Implemented by the
/// production Postgres+pgvector backend and by an in-memory mock
/// shared across tests (§9 Dynamic dispatch).
#[async_trait]
pub trait Store: Send + Sync {
    // -- clients --------------------------------------------------

    async fn get_client(&self, id: ClientId) -> Result<Option<Client>>;
    async fn get_client_by_name(&self, name: &str) -> Result<Option<Client>>;
    async fn create_client(&self, name: &str, telegram_chat_id: Option<i64>) -> Result<Client>;

    // -- meetings ---------------------------------------------------

    async fn get_meeting(&self, id: MeetingId) -> Result<Option<Meeting>>;
    async fn get_meeting_by_provider_id(&self, provider_id: &str) -> Result<Option<Meeting>>;
    #[allow(clippy::too_many_arguments)]
    async fn create_meeting(
        &self,
        provider_id: Option<String>,
        title: String,
        date: Option<DateTime<Utc>>,
        transcript: Option<String>,
        client_id: Option<ClientId>,
        meeting_type: Option<MeetingType>,
    ) -> Result<Meeting>;
    async fn list_distinct_meeting_titles(&self) -> Result<Vec<String>>;

    // -- summaries ----------------------------------------------------

    async fn create_summary(
        &self,
        meeting_id: MeetingId,
        meeting_type: MeetingType,
        content_text: String,
        content_json: Option<serde_json::Value>,
    ) -> Result<Summary>;

    // -- meeting embeddings --------------------------------------------

    async fn meeting_embedding_count(&self, meeting_id: MeetingId) -> Result<i64>;

    /// Atomic replacement of a meeting's embedding rows: delete
    /// everything for `meeting_id`, then insert `chunks` in order with
    /// dense `chunk_index` 0..N-1 (§3 invariants, §4.3, §4.5 Reindex).
    async fn replace_meeting_embeddings(
        &self,
        meeting_id: MeetingId,
        chunks: Vec<(String, Vec<f32>)>,
    ) -> Result<usize>;

    async fn delete_meeting_embeddings(&self, meeting_id: MeetingId) -> Result<u64>;

    /// Up to the first `limit` chunks of a meeting in `chunk_index`
    /// order (§4.6.6).
    async fn get_meeting_chunks(&self, meeting_id: MeetingId, limit: i64) -> Result<Vec<String>>;

    // -- chat rooms ------------------------------------------------------

    async fn get_chat_room(&self, chat_id: ChatId) -> Result<Option<ChatRoom>>;
    async fn list_active_chat_rooms(&self) -> Result<Vec<ChatRoom>>;
    async fn upsert_chat_room(
        &self,
        chat_id: ChatId,
        title: String,
        client_name: Option<String>,
    ) -> Result<ChatRoom>;
    async fn list_distinct_chat_client_names(&self) -> Result<Vec<String>>;

    // -- chat ingestion (save-and-index path, §4.4) ---------------------

    async fn chat_message_exists(&self, chat_id: ChatId, external_id: i64) -> Result<bool>;

    /// Performs steps 2-7 of the save-and-index path atomically: dedup
    /// check, message insert, embedding insert, cursor advance to
    /// `max(current, external_id)`, commit. The embedding vector is
    /// computed by the caller before this call so that a failed embed
    /// never requires rolling back a partially-written transaction —
    /// nothing is written until the vector already exists.
    #[allow(clippy::too_many_arguments)]
    async fn save_and_index_chat_message(
        &self,
        chat_id: ChatId,
        external_id: i64,
        event_time: DateTime<Utc>,
        sender_name: Option<String>,
        text: String,
        embedding: Vec<f32>,
    ) -> Result<ChatIngestOutcome>;

    // -- settings -----------------------------------------------------

    async fn get_setting(&self, key: &str) -> Result<Option<String>>;
    async fn set_setting(&self, key: &str, value: &str, description: Option<&str>) -> Result<()>;

    // -- diversified vector search (§4.6.2) -----------------------------

    async fn search_meetings_diversified(
        &self,
        query_vector: &[f32],
        params: &DiversifiedSearchParams,
    ) -> Result<Vec<MeetingSearchResult>>;

    async fn search_chats_diversified(
        &self,
        query_vector: &[f32],
        params: &DiversifiedSearchParams,
    ) -> Result<Vec<ChatSearchResult>>;

    // -- stats (§6 GET /api/rag/stats) ----------------------------------

    /// `(total_chunks, indexed_meetings)`.
    async fn rag_stats(&self) -> Result<(i64, i64)>;
}
