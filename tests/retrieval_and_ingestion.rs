//! Integration tests exercising the ingestion and retrieval paths
//! end-to-end against the in-memory test doubles, covering the
//! round-trip and idempotence properties of the retrieval design.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use uuid::Uuid;

use consilium::chat::ingestor::ChatIngestor;
use consilium::chat::{ChatSession, IncomingMessage, SelfIdentity};
use consilium::embedding::DeterministicEmbedder;
use consilium::error::Result;
use consilium::generation::EchoGenerator;
use consilium::retrieval::RetrievalEngine;
use consilium::store::mock::MockStore;
use consilium::store::{ChatIngestOutcome, Store};
use consilium::transcript::ingestor::{TranscriptIngestor, WebhookOutcome};
use consilium::transcript::{Sentence, TranscriptPayload, TranscriptProvider, TranscriptSummaryPayload, WebhookEvent};
use consilium::types::{ChatId, Meeting, MeetingId};

struct FixedTranscriptProvider;

#[async_trait]
impl TranscriptProvider for FixedTranscriptProvider {
    async fn get_transcript(&self, _meeting_id: &str) -> Result<TranscriptPayload> {
        Ok(sample_payload())
    }
}

fn sample_payload() -> TranscriptPayload {
    TranscriptPayload {
        title: "Acme - Working session".to_string(),
        date: Some(Utc.with_ymd_and_hms(2026, 1, 10, 10, 0, 0).unwrap()),
        sentences: vec![
            Sentence {
                speaker_name: "Ivan".to_string(),
                text: "Обсудили бюджет на следующий квартал и договорились о сроках поставки оборудования."
                    .to_string(),
                start_time: 0.0,
                end_time: 5.0,
            },
            Sentence {
                speaker_name: "Maria".to_string(),
                text: "Нужно согласовать финальную смету с финансовым отделом до конца недели.".to_string(),
                start_time: 5.0,
                end_time: 10.0,
            },
        ],
        summary: TranscriptSummaryPayload::default(),
    }
}

#[tokio::test]
async fn transcript_webhook_replay_is_idempotent() {
    let store = Arc::new(MockStore::new());
    let embedder = Arc::new(DeterministicEmbedder::new());
    let provider = Arc::new(FixedTranscriptProvider);
    let ingestor = TranscriptIngestor::new(store.clone(), provider, embedder);

    let event = WebhookEvent {
        meeting_id: "ff-123".to_string(),
        event_type: "Transcription completed".to_string(),
        client_reference_id: None,
    };

    let first = ingestor.handle_webhook(event.clone()).await.unwrap();
    let meeting_id = match first {
        WebhookOutcome::Created(id) => id,
        other => panic!("expected Created, got {other:?}"),
    };

    let second = ingestor.handle_webhook(event).await.unwrap();
    assert_eq!(second, WebhookOutcome::AlreadyExists(meeting_id));

    let indexed = ingestor.index_meeting(meeting_id).await.unwrap();
    assert!(indexed > 0);
    let reindexed_noop = ingestor.index_meeting(meeting_id).await.unwrap();
    assert_eq!(reindexed_noop, 0, "index_meeting is a no-op once already indexed");

    let (total_chunks, indexed_meetings) = store.rag_stats().await.unwrap();
    assert_eq!(indexed_meetings, 1);
    assert_eq!(total_chunks, indexed as i64);
}

#[tokio::test]
async fn reindex_is_not_a_no_op_and_replaces_embeddings() {
    let store = Arc::new(MockStore::new());
    let embedder = Arc::new(DeterministicEmbedder::new());
    let provider = Arc::new(FixedTranscriptProvider);
    let ingestor = TranscriptIngestor::new(store.clone(), provider, embedder);

    let event = WebhookEvent {
        meeting_id: "ff-456".to_string(),
        event_type: "Transcription completed".to_string(),
        client_reference_id: None,
    };
    let meeting_id = match ingestor.handle_webhook(event).await.unwrap() {
        WebhookOutcome::Created(id) => id,
        other => panic!("expected Created, got {other:?}"),
    };

    let first_count = ingestor.index_meeting(meeting_id).await.unwrap();
    let reindex_count = ingestor.reindex_meeting(meeting_id).await.unwrap();
    assert_eq!(first_count, reindex_count, "re-chunking the same transcript yields the same chunk count");
}

struct NoopChatSession;

#[async_trait]
impl ChatSession for NoopChatSession {
    async fn get_self(&self) -> Result<SelfIdentity> {
        Ok(SelfIdentity { user_id: 0, display_name: "noop".to_string() })
    }
    async fn iter_messages_since(&self, _chat_id: ChatId, _min_id: i64) -> Result<Vec<IncomingMessage>> {
        Ok(vec![])
    }
    async fn subscribe(&self, _chat_ids: Vec<ChatId>) -> Result<tokio::sync::mpsc::Receiver<IncomingMessage>> {
        let (_tx, rx) = tokio::sync::mpsc::channel(1);
        Ok(rx)
    }
}

#[tokio::test]
async fn short_chat_message_is_dropped_long_one_is_indexed() {
    let store = Arc::new(MockStore::new());
    store.upsert_chat_room(1, "Acme chat".to_string(), Some("Acme".to_string())).await.unwrap();
    let embedder = Arc::new(DeterministicEmbedder::new());
    let session = Arc::new(NoopChatSession);
    let ingestor = ChatIngestor::new(store.clone(), embedder, session, std::time::Duration::from_secs(3600));

    let short = ingestor
        .save_and_index(1, 1, Utc::now(), Some("Ivan".to_string()), Some("too short".to_string()))
        .await
        .unwrap();
    assert_eq!(short, ChatIngestOutcome::Skipped);

    let long_text = "обсудили бюджет на следующий квартал и согласовали сроки поставки оборудования для проекта";
    assert!(long_text.chars().count() >= 50);
    let inserted = ingestor
        .save_and_index(1, 2, Utc::now(), Some("Ivan".to_string()), Some(long_text.to_string()))
        .await
        .unwrap();
    assert!(matches!(inserted, ChatIngestOutcome::Inserted(_)));

    let replay = ingestor
        .save_and_index(1, 2, Utc::now(), Some("Ivan".to_string()), Some(long_text.to_string()))
        .await
        .unwrap();
    assert_eq!(replay, ChatIngestOutcome::Skipped, "re-ingesting the same external id is a no-op");
}

#[tokio::test]
async fn diversification_caps_hits_per_meeting() {
    let store = Arc::new(MockStore::new());
    let meeting_a = Uuid::new_v4();
    let meeting_b = Uuid::new_v4();

    let meeting = |id: MeetingId, title: &str| Meeting {
        id,
        provider_id: None,
        title: title.to_string(),
        date: None,
        transcript: None,
        client_id: None,
        meeting_type: None,
        created_at: Utc::now(),
    };

    let query = "обсуждение бюджета проекта";
    let chunks_a: Vec<(String, Vec<f32>)> = (0..5)
        .map(|i| {
            let text = format!("{query} деталь номер {i}");
            let v = DeterministicEmbedder::vector_for(&text);
            (text, v)
        })
        .collect();
    let chunks_b: Vec<(String, Vec<f32>)> = (0..2)
        .map(|i| {
            let text = format!("{query} другая встреча {i}");
            let v = DeterministicEmbedder::vector_for(&text);
            (text, v)
        })
        .collect();

    store.seed_meeting_embeddings(meeting(meeting_a, "Acme - Working session"), chunks_a);
    store.seed_meeting_embeddings(meeting(meeting_b, "Acme - Diagnostics"), chunks_b);

    let params = consilium::types::DiversifiedSearchParams::meeting_unfiltered();
    let query_vector = DeterministicEmbedder::vector_for(query);
    let results = store.search_meetings_diversified(&query_vector, &params).await.unwrap();

    let from_a = results.iter().filter(|r| r.meeting_id == meeting_a).count();
    assert!(from_a <= params.max_per_group as usize, "per-group cap must bound hits from meeting A");
}

#[tokio::test]
async fn ask_returns_apology_without_invoking_generator_when_empty() {
    let store = Arc::new(MockStore::new());
    let embedder = Arc::new(DeterministicEmbedder::new());
    let generator = Arc::new(EchoGenerator::new());
    let engine = RetrievalEngine::new(store, embedder, generator.clone());

    let response = engine.ask("есть ли новости про Acme?", None, true).await.unwrap();
    assert_eq!(response.answer, consilium::types::NO_RESULTS_APOLOGY);
    assert_eq!(generator.call_count(), 0);
}
