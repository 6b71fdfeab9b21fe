//! In-memory [`Store`] used by unit tests so retrieval, ingestion, and
//! cascade logic can be exercised without a live Postgres instance.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::error::Result;
use crate::store::{ChatIngestOutcome, Store};
use crate::types::*;

#[derive(Default)]
struct State {
    clients: HashMap<ClientId, Client>,
    meetings: HashMap<MeetingId, Meeting>,
    summaries: Vec<Summary>,
    meeting_embeddings: HashMap<MeetingId, Vec<(String, Vec<f32>)>>,
    chat_rooms: HashMap<ChatId, ChatRoom>,
    chat_messages: HashMap<MessageId, ChatMessage>,
    chat_embeddings: Vec<(MessageId, String, Vec<f32>)>,
    settings: HashMap<String, String>,
}

pub struct MockStore {
    state: Mutex<State>,
}

impl Default for MockStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MockStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }

    /// Test helper: seed a meeting with embedding rows directly,
    /// bypassing the ingest path, for retrieval-only tests.
    pub fn seed_meeting_embeddings(&self, meeting: Meeting, chunks: Vec<(String, Vec<f32>)>) {
        let mut state = self.state.lock();
        state.meeting_embeddings.insert(meeting.id, chunks);
        state.meetings.insert(meeting.id, meeting);
    }

    /// Test helper: seed a chat room with a message + embedding.
    #[allow(clippy::too_many_arguments)]
    pub fn seed_chat_message(
        &self,
        room: ChatRoom,
        message: ChatMessage,
        chunk_text: String,
        vector: Vec<f32>,
    ) {
        let mut state = self.state.lock();
        state.chat_rooms.insert(room.id, room);
        let message_id = message.id;
        state.chat_messages.insert(message_id, message);
        state.chat_embeddings.push((message_id, chunk_text, vector));
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
    }
}

#[async_trait]
impl Store for MockStore {
    async fn get_client(&self, id: ClientId) -> Result<Option<Client>> {
        Ok(self.state.lock().clients.get(&id).cloned())
    }

    async fn get_client_by_name(&self, name: &str) -> Result<Option<Client>> {
        Ok(self.state.lock().clients.values().find(|c| c.name == name).cloned())
    }

    async fn create_client(&self, name: &str, telegram_chat_id: Option<i64>) -> Result<Client> {
        let client = Client {
            id: Uuid::new_v4(),
            name: name.to_string(),
            telegram_chat_id,
            external_ids: serde_json::json!({}),
            created_at: Utc::now(),
        };
        self.state.lock().clients.insert(client.id, client.clone());
        Ok(client)
    }

    async fn get_meeting(&self, id: MeetingId) -> Result<Option<Meeting>> {
        Ok(self.state.lock().meetings.get(&id).cloned())
    }

    async fn get_meeting_by_provider_id(&self, provider_id: &str) -> Result<Option<Meeting>> {
        Ok(self
            .state
            .lock()
            .meetings
            .values()
            .find(|m| m.provider_id.as_deref() == Some(provider_id))
            .cloned())
    }

    async fn create_meeting(
        &self,
        provider_id: Option<String>,
        title: String,
        date: Option<DateTime<Utc>>,
        transcript: Option<String>,
        client_id: Option<ClientId>,
        meeting_type: Option<MeetingType>,
    ) -> Result<Meeting> {
        let meeting = Meeting {
            id: Uuid::new_v4(),
            provider_id,
            title,
            date,
            transcript,
            client_id,
            meeting_type,
            created_at: Utc::now(),
        };
        self.state.lock().meetings.insert(meeting.id, meeting.clone());
        Ok(meeting)
    }

    async fn list_distinct_meeting_titles(&self) -> Result<Vec<String>> {
        Ok(self.state.lock().meetings.values().map(|m| m.title.clone()).collect())
    }

    async fn create_summary(
        &self,
        meeting_id: MeetingId,
        meeting_type: MeetingType,
        content_text: String,
        content_json: Option<serde_json::Value>,
    ) -> Result<Summary> {
        let summary = Summary {
            id: Uuid::new_v4(),
            meeting_id,
            meeting_type,
            content_text,
            content_json,
            created_at: Utc::now(),
        };
        self.state.lock().summaries.push(summary.clone());
        Ok(summary)
    }

    async fn meeting_embedding_count(&self, meeting_id: MeetingId) -> Result<i64> {
        Ok(self
            .state
            .lock()
            .meeting_embeddings
            .get(&meeting_id)
            .map(|c| c.len() as i64)
            .unwrap_or(0))
    }

    async fn replace_meeting_embeddings(
        &self,
        meeting_id: MeetingId,
        chunks: Vec<(String, Vec<f32>)>,
    ) -> Result<usize> {
        let len = chunks.len();
        self.state.lock().meeting_embeddings.insert(meeting_id, chunks);
        Ok(len)
    }

    async fn delete_meeting_embeddings(&self, meeting_id: MeetingId) -> Result<u64> {
        let removed = self
            .state
            .lock()
            .meeting_embeddings
            .remove(&meeting_id)
            .map(|c| c.len() as u64)
            .unwrap_or(0);
        Ok(removed)
    }

    async fn get_meeting_chunks(&self, meeting_id: MeetingId, limit: i64) -> Result<Vec<String>> {
        Ok(self
            .state
            .lock()
            .meeting_embeddings
            .get(&meeting_id)
            .map(|chunks| chunks.iter().take(limit as usize).map(|(t, _)| t.clone()).collect())
            .unwrap_or_default())
    }

    async fn get_chat_room(&self, chat_id: ChatId) -> Result<Option<ChatRoom>> {
        Ok(self.state.lock().chat_rooms.get(&chat_id).cloned())
    }

    async fn list_active_chat_rooms(&self) -> Result<Vec<ChatRoom>> {
        Ok(self
            .state
            .lock()
            .chat_rooms
            .values()
            .filter(|r| r.is_active)
            .cloned()
            .collect())
    }

    async fn upsert_chat_room(
        &self,
        chat_id: ChatId,
        title: String,
        client_name: Option<String>,
    ) -> Result<ChatRoom> {
        let mut state = self.state.lock();
        let room = state.chat_rooms.entry(chat_id).or_insert_with(|| ChatRoom {
            id: chat_id,
            title: title.clone(),
            client_id: None,
            client_name: client_name.clone(),
            last_synced_message_id: None,
            is_active: true,
            created_at: Utc::now(),
        });
        room.title = title;
        if client_name.is_some() {
            room.client_name = client_name;
        }
        Ok(room.clone())
    }

    async fn list_distinct_chat_client_names(&self) -> Result<Vec<String>> {
        Ok(self
            .state
            .lock()
            .chat_rooms
            .values()
            .filter_map(|r| r.client_name.clone())
            .collect())
    }

    async fn chat_message_exists(&self, chat_id: ChatId, external_id: i64) -> Result<bool> {
        Ok(self
            .state
            .lock()
            .chat_messages
            .values()
            .any(|m| m.chat_id == chat_id && m.external_id == external_id))
    }

    async fn save_and_index_chat_message(
        &self,
        chat_id: ChatId,
        external_id: i64,
        event_time: DateTime<Utc>,
        sender_name: Option<String>,
        text: String,
        embedding: Vec<f32>,
    ) -> Result<ChatIngestOutcome> {
        let mut state = self.state.lock();
        if state
            .chat_messages
            .values()
            .any(|m| m.chat_id == chat_id && m.external_id == external_id)
        {
            return Ok(ChatIngestOutcome::Skipped);
        }

        let message_id = Uuid::new_v4();
        let message = ChatMessage {
            id: message_id,
            chat_id,
            external_id,
            event_time,
            sender_name,
            text: Some(text.clone()),
            has_media: false,
            media_tag: None,
            meeting_id: None,
        };
        state.chat_messages.insert(message_id, message);
        state.chat_embeddings.push((message_id, text, embedding));

        if let Some(room) = state.chat_rooms.get_mut(&chat_id) {
            room.last_synced_message_id =
                Some(room.last_synced_message_id.unwrap_or(0).max(external_id));
        } else {
            state.chat_rooms.insert(
                chat_id,
                ChatRoom {
                    id: chat_id,
                    title: format!("chat {chat_id}"),
                    client_id: None,
                    client_name: None,
                    last_synced_message_id: Some(external_id),
                    is_active: true,
                    created_at: Utc::now(),
                },
            );
        }

        Ok(ChatIngestOutcome::Inserted(message_id))
    }

    async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        Ok(self.state.lock().settings.get(key).cloned())
    }

    async fn set_setting(&self, key: &str, value: &str, _description: Option<&str>) -> Result<()> {
        self.state.lock().settings.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn search_meetings_diversified(
        &self,
        query_vector: &[f32],
        params: &DiversifiedSearchParams,
    ) -> Result<Vec<MeetingSearchResult>> {
        let state = self.state.lock();
        let mut grouped: HashMap<MeetingId, Vec<MeetingSearchResult>> = HashMap::new();

        for (meeting_id, chunks) in state.meeting_embeddings.iter() {
            let meeting = match state.meetings.get(meeting_id) {
                Some(m) => m,
                None => continue,
            };

            if let Some(client_id) = params.client_id {
                if meeting.client_id != Some(client_id) {
                    continue;
                }
            }
            if let Some(TitleFilter(ref t)) = params.title_filter {
                if !meeting.title.to_lowercase().contains(&t.to_lowercase()) {
                    continue;
                }
            }
            if let Some(ref range) = params.date_range {
                match meeting.date {
                    Some(d) if d >= range.start && d <= range.end => {}
                    _ => continue,
                }
            }

            let mut ranked: Vec<MeetingSearchResult> = chunks
                .iter()
                .map(|(text, vector)| MeetingSearchResult {
                    chunk_text: text.clone(),
                    meeting_id: *meeting_id,
                    meeting_title: meeting.title.clone(),
                    meeting_date: meeting.date,
                    similarity: cosine_similarity(query_vector, vector),
                })
                .collect();
            ranked.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap());
            ranked.truncate(params.max_per_group as usize);
            grouped.insert(*meeting_id, ranked);
        }

        let mut all: Vec<MeetingSearchResult> = grouped
            .into_values()
            .flatten()
            .filter(|r| r.similarity > params.min_similarity)
            .collect();
        all.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap());
        all.truncate(params.max_total as usize);
        Ok(all)
    }

    async fn search_chats_diversified(
        &self,
        query_vector: &[f32],
        params: &DiversifiedSearchParams,
    ) -> Result<Vec<ChatSearchResult>> {
        let state = self.state.lock();
        let mut grouped: HashMap<ChatId, Vec<ChatSearchResult>> = HashMap::new();

        for (message_id, text, vector) in state.chat_embeddings.iter() {
            let message = match state.chat_messages.get(message_id) {
                Some(m) => m,
                None => continue,
            };
            let room = match state.chat_rooms.get(&message.chat_id) {
                Some(r) => r,
                None => continue,
            };

            if let Some(ClientNameFilter(ref name)) = params.client_name_filter {
                if room.client_name.as_deref() != Some(name.as_str()) {
                    continue;
                }
            }
            if let Some(ref range) = params.date_range {
                if !(message.event_time >= range.start && message.event_time <= range.end) {
                    continue;
                }
            }

            let result = ChatSearchResult {
                chunk_text: text.clone(),
                message_id: *message_id,
                chat_id: room.id,
                chat_title: room.title.clone(),
                client_name: room.client_name.clone(),
                message_date: Some(message.event_time),
                sender_name: message.sender_name.clone(),
                similarity: cosine_similarity(query_vector, vector),
            };
            grouped.entry(room.id).or_default().push(result);
        }

        for ranked in grouped.values_mut() {
            ranked.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap());
            ranked.truncate(params.max_per_group as usize);
        }

        let mut all: Vec<ChatSearchResult> = grouped
            .into_values()
            .flatten()
            .filter(|r| r.similarity > params.min_similarity)
            .collect();
        all.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap());
        all.truncate(params.max_total as usize);
        Ok(all)
    }

    async fn rag_stats(&self) -> Result<(i64, i64)> {
        let state = self.state.lock();
        let total_chunks: i64 = state.meeting_embeddings.values().map(|c| c.len() as i64).sum();
        let indexed_meetings = state.meeting_embeddings.len() as i64;
        Ok((total_chunks, indexed_meetings))
    }
}
