//! Core domain types (§3 DATA MODEL).
//!
//! All identifiers are opaque unless noted. Entities read and write
//! through [`crate::store::Store`]; nothing outside that module holds
//! a raw database handle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Vector dimension shared by both embedding corpora.
pub const VECTOR_DIM: usize = 1536;

/// Minimum chat-message text length to be indexed (§4.4, §9).
pub const MIN_CHAT_TEXT_LENGTH: usize = 50;

pub type ClientId = Uuid;
pub type MeetingId = Uuid;
pub type SummaryId = Uuid;
pub type MessageId = Uuid;
pub type ChatId = i64;

/// A business counterpart (§3 Client).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    pub name: String,
    pub telegram_chat_id: Option<i64>,
    pub external_ids: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Closed set of meeting type tags (§3 Meeting).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeetingType {
    WorkingMeeting,
    Diagnostics,
    Traction,
    Intro,
}

impl std::fmt::Display for MeetingType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MeetingType::WorkingMeeting => "working_meeting",
            MeetingType::Diagnostics => "diagnostics",
            MeetingType::Traction => "traction",
            MeetingType::Intro => "intro",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for MeetingType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "working_meeting" => Ok(MeetingType::WorkingMeeting),
            "diagnostics" => Ok(MeetingType::Diagnostics),
            "traction" => Ok(MeetingType::Traction),
            "intro" => Ok(MeetingType::Intro),
            other => Err(format!("unknown meeting type: {other}")),
        }
    }
}

/// A recorded conversation (§3 Meeting).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meeting {
    pub id: MeetingId,
    pub provider_id: Option<String>,
    pub title: String,
    pub date: Option<DateTime<Utc>>,
    pub transcript: Option<String>,
    pub client_id: Option<ClientId>,
    pub meeting_type: Option<MeetingType>,
    pub created_at: DateTime<Utc>,
}

/// A post-processed narrative of a meeting (§3 Summary).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub id: SummaryId,
    pub meeting_id: MeetingId,
    pub meeting_type: MeetingType,
    pub content_text: String,
    pub content_json: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// A single vector chunk of a meeting transcript (§3 MeetingEmbedding).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeetingEmbedding {
    pub id: Uuid,
    pub meeting_id: MeetingId,
    pub chunk_text: String,
    pub chunk_index: i32,
    #[serde(skip)]
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
}

/// A monitored chat room (§3 ChatRoom). The external id is the
/// numeric Telegram chat/channel id and may be negative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRoom {
    pub id: ChatId,
    pub title: String,
    pub client_id: Option<ClientId>,
    /// Free-text client name, populated independently of `client_id`
    /// by client-linking heuristics; the filter-inference algorithm in
    /// §4.6.1 reads this field, not the foreign key.
    pub client_name: Option<String>,
    pub last_synced_message_id: Option<i64>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// A single chat message (§3 ChatMessage).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub chat_id: ChatId,
    pub external_id: i64,
    pub event_time: DateTime<Utc>,
    pub sender_name: Option<String>,
    pub text: Option<String>,
    pub has_media: bool,
    pub media_tag: Option<String>,
    pub meeting_id: Option<MeetingId>,
}

/// One vector per sufficiently long chat message (§3 ChatEmbedding).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatEmbedding {
    pub id: Uuid,
    pub message_id: MessageId,
    pub chunk_text: String,
    pub chunk_index: i32,
    #[serde(skip)]
    pub embedding: Vec<f32>,
}

/// A string-keyed configuration cell (§3 Setting). Retrieval tunables
/// and the system prompt live here; re-read per request, never bound
/// at startup (§5, §9 Global state).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Setting {
    pub key: String,
    pub value: String,
    pub description: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// An inclusive-to-the-second date range inferred from a question,
/// with a human-readable description for logging and prompt notes
/// (§4.6.1).
#[derive(Debug, Clone, PartialEq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub description: String,
}

/// A meeting-title substring filter, inferred from a question by
/// matching the leading `" - "` token of known meeting titles
/// (§4.6.1). Kept as a distinct type from [`ClientNameFilter`] so the
/// two disjoint filter kinds can never be mixed up at the query
/// boundary (§9 Dynamic dispatch).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleFilter(pub String);

/// A chat-room `client_name` equality filter, inferred from a question
/// by matching known `ChatRoom.client_name` values (§4.6.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientNameFilter(pub String);

/// A single retrieved passage from the meeting corpus, grouped by
/// meeting for context assembly (§4.6.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeetingSearchResult {
    pub chunk_text: String,
    pub meeting_id: MeetingId,
    pub meeting_title: String,
    pub meeting_date: Option<DateTime<Utc>>,
    pub similarity: f32,
}

/// A single retrieved passage from the chat corpus, grouped by chat
/// title for context assembly (§4.6.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSearchResult {
    pub chunk_text: String,
    pub message_id: MessageId,
    pub chat_id: ChatId,
    pub chat_title: String,
    pub client_name: Option<String>,
    pub message_date: Option<DateTime<Utc>>,
    pub sender_name: Option<String>,
    pub similarity: f32,
}

/// Parameters for one diversified nearest-neighbor search attempt
/// (§4.6.2).
#[derive(Debug, Clone)]
pub struct DiversifiedSearchParams {
    pub max_per_group: u32,
    pub max_total: u32,
    pub min_similarity: f32,
    pub client_id: Option<ClientId>,
    pub title_filter: Option<TitleFilter>,
    pub client_name_filter: Option<ClientNameFilter>,
    pub date_range: Option<DateRange>,
}

impl DiversifiedSearchParams {
    pub fn meeting_default(
        client_id: Option<ClientId>,
        title_filter: Option<TitleFilter>,
        date_range: Option<DateRange>,
    ) -> Self {
        Self {
            max_per_group: 2,
            max_total: 20,
            min_similarity: 0.15,
            client_id,
            title_filter,
            client_name_filter: None,
            date_range,
        }
    }

    pub fn meeting_unfiltered() -> Self {
        Self {
            max_per_group: 1,
            max_total: 15,
            min_similarity: 0.20,
            client_id: None,
            title_filter: None,
            client_name_filter: None,
            date_range: None,
        }
    }

    pub fn chat_default(client_name_filter: Option<ClientNameFilter>, date_range: Option<DateRange>) -> Self {
        Self {
            max_per_group: 3,
            max_total: 15,
            min_similarity: 0.15,
            client_id: None,
            title_filter: None,
            client_name_filter,
            date_range,
        }
    }

    pub fn chat_unfiltered() -> Self {
        Self {
            max_per_group: 2,
            max_total: 10,
            min_similarity: 0.20,
            client_id: None,
            title_filter: None,
            client_name_filter: None,
            date_range: None,
        }
    }
}

/// The structured answer returned by the retrieval engine (§4.6).
///
/// This is the engine's internal return type, kept separate from the
/// `/api/rag/ask` wire shape (§6) so callers that want the full
/// per-source detail (the CLI, tests) aren't forced through the
/// narrower public contract; the HTTP handler maps this into the
/// stable merged-`sources` response before serializing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskResponse {
    pub answer: String,
    pub meeting_sources: Vec<MeetingSearchResult>,
    pub chat_sources: Vec<ChatSearchResult>,
}

/// Canned apology returned when both retrievals come back empty
/// (§4.6.4, §8).
pub const NO_RESULTS_APOLOGY: &str =
    "К сожалению, я не нашёл релевантной информации по вашему вопросу.";
