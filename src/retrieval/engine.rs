//! Retrieval engine: infers filters, runs the cascading diversified
//! search, assembles context, and drives the generative model (§4.6).

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::Result;
use crate::generation::Generator;
use crate::retrieval::context::assemble_context;
use crate::retrieval::date_range::parse_date_range;
use crate::retrieval::filters::{infer_client_name_filter, infer_title_filter};
use crate::store::Store;
use crate::types::{
    AskResponse, ChatSearchResult, ClientId, DiversifiedSearchParams, MeetingSearchResult, NO_RESULTS_APOLOGY,
};
use crate::embedding::Embedder;

const MEETING_CONTEXT_CHUNK_LIMIT: usize = 10;

pub struct RetrievalEngine {
    store: Arc<dyn Store>,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
}

impl RetrievalEngine {
    pub fn new(store: Arc<dyn Store>, embedder: Arc<dyn Embedder>, generator: Arc<dyn Generator>) -> Self {
        Self { store, embedder, generator }
    }

    /// Answer a free-form question against both corpora (§4.6). When
    /// `search_chats` is false the chat corpus is never queried
    /// (§4.6.3's chat cascade runs only when requested).
    pub async fn ask(&self, question: &str, client_id: Option<ClientId>, search_chats: bool) -> Result<AskResponse> {
        let now = chrono::Utc::now();

        let titles = self.store.list_distinct_meeting_titles().await?;
        let title_filter = infer_title_filter(&titles, question);

        let client_name_filter = if search_chats {
            let names = self.store.list_distinct_chat_client_names().await?;
            infer_client_name_filter(&names, question)
        } else {
            None
        };

        let date_range = parse_date_range(question, now);

        debug!(
            title_filter = ?title_filter,
            client_name_filter = ?client_name_filter,
            date_range = ?date_range,
            "inferred retrieval filters"
        );

        let query_vector = self.embedder.embed(&[question.to_string()]).await?;
        let query_vector = query_vector.into_iter().next().unwrap_or_default();

        let meeting_sources = self
            .search_meetings_cascade(&query_vector, client_id, title_filter.clone(), date_range.clone())
            .await?;

        let chat_sources = if search_chats {
            self.search_chats_cascade(&query_vector, client_name_filter.clone(), date_range.clone())
                .await?
        } else {
            Vec::new()
        };

        if meeting_sources.is_empty() && chat_sources.is_empty() {
            info!(question, "retrieval found nothing, returning canned apology");
            return Ok(AskResponse {
                answer: NO_RESULTS_APOLOGY.to_string(),
                meeting_sources: Vec::new(),
                chat_sources: Vec::new(),
            });
        }

        let context = assemble_context(&meeting_sources, &chat_sources).unwrap_or_default();
        let filter_note = build_filter_note(title_filter.as_ref(), client_name_filter.as_ref(), date_range.as_ref());
        let user_message = format!("{context}\n\nВопрос: {question}");

        let answer = self
            .generator
            .generate(&system_prompt(filter_note.as_deref()), &user_message)
            .await?;

        Ok(AskResponse { answer, meeting_sources, chat_sources })
    }

    async fn search_meetings_cascade(
        &self,
        query_vector: &[f32],
        client_id: Option<ClientId>,
        title_filter: Option<crate::types::TitleFilter>,
        date_range: Option<crate::types::DateRange>,
    ) -> Result<Vec<MeetingSearchResult>> {
        if client_id.is_none() && title_filter.is_none() && date_range.is_none() {
            return self
                .store
                .search_meetings_diversified(query_vector, &DiversifiedSearchParams::meeting_unfiltered())
                .await;
        }

        let tier1 = DiversifiedSearchParams::meeting_default(client_id, title_filter.clone(), date_range.clone());
        let mut results = self.store.search_meetings_diversified(query_vector, &tier1).await?;

        if results.len() < 3 && date_range.is_some() {
            let tier2 = DiversifiedSearchParams::meeting_default(client_id, title_filter.clone(), None);
            results = self.store.search_meetings_diversified(query_vector, &tier2).await?;
        }

        if results.len() < 3 && title_filter.is_some() {
            let tier3 = DiversifiedSearchParams {
                max_per_group: 1,
                max_total: 15,
                min_similarity: 0.20,
                client_id,
                title_filter: None,
                client_name_filter: None,
                date_range: None,
            };
            results = self.store.search_meetings_diversified(query_vector, &tier3).await?;
        }

        Ok(results)
    }

    async fn search_chats_cascade(
        &self,
        query_vector: &[f32],
        client_name_filter: Option<crate::types::ClientNameFilter>,
        date_range: Option<crate::types::DateRange>,
    ) -> Result<Vec<ChatSearchResult>> {
        if client_name_filter.is_none() && date_range.is_none() {
            return self
                .store
                .search_chats_diversified(query_vector, &DiversifiedSearchParams::chat_unfiltered())
                .await;
        }

        let tier1 = DiversifiedSearchParams::chat_default(client_name_filter.clone(), date_range.clone());
        let mut results = self.store.search_chats_diversified(query_vector, &tier1).await?;

        if results.len() < 2 && date_range.is_some() {
            let tier2 = DiversifiedSearchParams::chat_default(client_name_filter.clone(), None);
            results = self.store.search_chats_diversified(query_vector, &tier2).await?;
        }

        Ok(results)
    }

    /// Answer a question against a single meeting's transcript alone
    /// (§4.6.6). Fetches every chunk, then truncates to the first ten
    /// in Rust rather than at the SQL level.
    pub async fn meeting_context_answer(&self, meeting_id: crate::types::MeetingId, question: &str) -> Result<String> {
        let chunks = self.store.get_meeting_chunks(meeting_id, i64::MAX).await?;
        let context = chunks.into_iter().take(MEETING_CONTEXT_CHUNK_LIMIT).collect::<Vec<_>>().join("\n\n");

        let user_message = format!("{context}\n\nВопрос: {question}");
        self.generator.generate(&single_meeting_system_prompt(), &user_message).await
    }
}

fn build_filter_note(
    title_filter: Option<&crate::types::TitleFilter>,
    client_name_filter: Option<&crate::types::ClientNameFilter>,
    date_range: Option<&crate::types::DateRange>,
) -> Option<String> {
    let client = title_filter.map(|f| f.0.as_str()).or(client_name_filter.map(|f| f.0.as_str()));

    if client.is_none() && date_range.is_none() {
        return None;
    }

    let mut note = String::from("Примечание: вопрос ограничен");
    if let Some(name) = client {
        note.push_str(&format!(" клиентом «{name}»"));
    }
    if let Some(range) = date_range {
        if client.is_some() {
            note.push_str(" и");
        }
        note.push_str(&format!(" периодом «{}»", range.description));
    }
    note.push('.');
    Some(note)
}

fn system_prompt(filter_note: Option<&str>) -> String {
    let base = "Ты — ассистент делового консультанта. Отвечай только на основе приведённого \
контекста из транскриптов встреч и переписки в Telegram, никогда не выдумывай факты. \
Каждое утверждение подкрепляй ссылкой на источник: название и дату встречи или название \
чата. Используй все релевантные источники, когда это возможно. Отвечай на языке, на \
котором задан вопрос.";

    match filter_note {
        Some(note) => format!("{base}\n\n{note}"),
        None => base.to_string(),
    }
}

fn single_meeting_system_prompt() -> String {
    "Ты — ассистент делового консультанта. Отвечай только на основе приведённого \
фрагмента транскрипта встречи, никогда не выдумывай факты. Отвечай на языке, на котором \
задан вопрос."
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::DeterministicEmbedder;
    use crate::generation::EchoGenerator;
    use crate::store::mock::MockStore;
    use chrono::Utc;
    use uuid::Uuid;

    fn engine() -> (RetrievalEngine, Arc<MockStore>, Arc<EchoGenerator>) {
        let store = Arc::new(MockStore::new());
        let embedder = Arc::new(DeterministicEmbedder::new());
        let generator = Arc::new(EchoGenerator::new());
        let engine = RetrievalEngine::new(store.clone(), embedder, generator.clone());
        (engine, store, generator)
    }

    #[tokio::test]
    async fn empty_store_returns_canned_apology_without_invoking_generator() {
        let (engine, _store, generator) = engine();
        let response = engine.ask("что обсуждали с Acme?", None, true).await.unwrap();
        assert_eq!(response.answer, NO_RESULTS_APOLOGY);
        assert!(response.meeting_sources.is_empty());
        assert!(response.chat_sources.is_empty());
        assert_eq!(generator.call_count(), 0);
    }

    #[tokio::test]
    async fn hit_invokes_generator_with_assembled_context() {
        let (engine, store, generator) = engine();
        let chunk = "обсудили бюджет";
        let meeting = crate::types::Meeting {
            id: Uuid::new_v4(),
            provider_id: None,
            title: "Acme - Working session".to_string(),
            date: None,
            transcript: None,
            client_id: None,
            meeting_type: None,
            created_at: Utc::now(),
        };
        store.seed_meeting_embeddings(meeting, vec![(chunk.to_string(), DeterministicEmbedder::vector_for(chunk))]);

        let response = engine.ask("обсудили бюджет?", None, false).await.unwrap();
        assert_eq!(generator.call_count(), 1);
        let call = generator.last_call().unwrap();
        assert!(call.user.contains("обсудили бюджет"));
        assert!(!response.meeting_sources.is_empty());
    }
}
