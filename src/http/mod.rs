//! The thin HTTP binding atop the library API (§6): every handler is a
//! direct call into a component described in §4, no business logic
//! lives here.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::error::ConsiliumError;
use crate::generation::Generator;
use crate::retrieval::RetrievalEngine;
use crate::store::Store;
use crate::transcript::ingestor::{TranscriptIngestor, WebhookOutcome};
use crate::transcript::WebhookEvent;
use crate::types::{AskResponse, ClientId, MeetingId};
use crate::embedding::Embedder;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub embedder: Arc<dyn Embedder>,
    pub generator: Arc<dyn Generator>,
    pub transcript_ingestor: Arc<TranscriptIngestor>,
    pub retrieval: Arc<RetrievalEngine>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/webhook/fireflies", post(webhook_fireflies))
        .route("/api/rag/ask", post(rag_ask))
        .route("/api/rag/index", post(rag_index))
        .route("/api/rag/stats", get(rag_stats))
        .route("/api/rag/index/:meeting_id", delete(rag_delete_index))
        .route("/api/rag/reindex/:meeting_id", post(rag_reindex))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

impl IntoResponse for ConsiliumError {
    fn into_response(self) -> Response {
        let status = match &self {
            ConsiliumError::NotFound(_) => StatusCode::NOT_FOUND,
            ConsiliumError::InvalidInput(_) | ConsiliumError::DataContract(_) => StatusCode::BAD_REQUEST,
            ConsiliumError::Auth(_) => StatusCode::UNAUTHORIZED,
            ConsiliumError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let code = self.code();
        error!(error = %self, code, "request failed");
        (status, Json(ErrorBody { status: "error".to_string(), code, message: self.to_string() })).into_response()
    }
}

#[derive(Serialize)]
struct ErrorBody {
    status: String,
    code: &'static str,
    message: String,
}

// -- POST /api/webhook/fireflies ---------------------------------------

async fn webhook_fireflies(
    State(state): State<AppState>,
    Json(event): Json<WebhookEvent>,
) -> Result<impl IntoResponse, ConsiliumError> {
    let outcome = state.transcript_ingestor.handle_webhook(event).await?;

    let (status, message) = match outcome {
        WebhookOutcome::Created(id) => {
            let ingestor = state.transcript_ingestor.clone();
            tokio::spawn(async move {
                if let Err(e) = ingestor.index_meeting(id).await {
                    warn!(meeting_id = %id, error = %e, "background indexing failed");
                }
            });
            ("accepted", "meeting created, indexing in background".to_string())
        }
        WebhookOutcome::AlreadyExists(id) => ("ok", format!("meeting {id} already ingested")),
        WebhookOutcome::Ignored => ("ignored", "event type not handled".to_string()),
    };

    Ok(Json(serde_json::json!({ "status": status, "message": message })))
}

// -- POST /api/rag/ask --------------------------------------------------

#[derive(Deserialize)]
struct AskRequest {
    question: String,
    client_id: Option<ClientId>,
    #[serde(default)]
    #[allow(dead_code)]
    num_chunks: Option<u32>,
}

/// A single retrieved passage as exposed on the stable wire contract —
/// narrower than the engine's internal `MeetingSearchResult`/
/// `ChatSearchResult`, which carry chunk text and ids for in-process
/// callers only.
#[derive(Serialize)]
struct AskSource {
    meeting_title: String,
    meeting_date: Option<chrono::DateTime<chrono::Utc>>,
    similarity: f32,
}

#[derive(Serialize)]
struct AskApiResponse {
    answer: String,
    sources: Vec<AskSource>,
}

impl From<AskResponse> for AskApiResponse {
    fn from(response: AskResponse) -> Self {
        let meeting_sources = response.meeting_sources.into_iter().map(|r| AskSource {
            meeting_title: r.meeting_title,
            meeting_date: r.meeting_date,
            similarity: r.similarity,
        });
        let chat_sources = response.chat_sources.into_iter().map(|r| AskSource {
            meeting_title: r.chat_title,
            meeting_date: r.message_date,
            similarity: r.similarity,
        });
        Self { answer: response.answer, sources: meeting_sources.chain(chat_sources).collect() }
    }
}

async fn rag_ask(State(state): State<AppState>, Json(req): Json<AskRequest>) -> Result<impl IntoResponse, ConsiliumError> {
    let response = state.retrieval.ask(&req.question, req.client_id, true).await?;
    Ok(Json(AskApiResponse::from(response)))
}

// -- POST /api/rag/index --------------------------------------------------

#[derive(Deserialize)]
struct IndexRequest {
    meeting_ids: Option<Vec<MeetingId>>,
}

async fn rag_index(State(state): State<AppState>, Json(req): Json<IndexRequest>) -> Result<impl IntoResponse, ConsiliumError> {
    let meeting_ids = req.meeting_ids.ok_or_else(|| {
        ConsiliumError::InvalidInput("meeting_ids is required; this deployment has no bulk meeting listing".into())
    })?;

    let mut total_chunks = 0usize;
    for meeting_id in meeting_ids {
        total_chunks += state.transcript_ingestor.index_meeting(meeting_id).await?;
    }

    Ok(Json(serde_json::json!({
        "status": "ok",
        "message": "indexing complete",
        "stats": { "total_chunks": total_chunks },
    })))
}

// -- GET /api/rag/stats --------------------------------------------------

async fn rag_stats(State(state): State<AppState>) -> Result<impl IntoResponse, ConsiliumError> {
    let (total_chunks, indexed_meetings) = state.store.rag_stats().await?;
    Ok(Json(serde_json::json!({
        "total_chunks": total_chunks,
        "indexed_meetings": indexed_meetings,
    })))
}

// -- DELETE /api/rag/index/{meeting_id} -----------------------------------

async fn rag_delete_index(
    State(state): State<AppState>,
    Path(meeting_id): Path<MeetingId>,
) -> Result<impl IntoResponse, ConsiliumError> {
    let deleted_chunks = state.store.delete_meeting_embeddings(meeting_id).await?;
    Ok(Json(serde_json::json!({ "deleted_chunks": deleted_chunks })))
}

// -- POST /api/rag/reindex/{meeting_id} -----------------------------------

async fn rag_reindex(
    State(state): State<AppState>,
    Path(meeting_id): Path<MeetingId>,
) -> Result<impl IntoResponse, ConsiliumError> {
    let chunks_created = state.transcript_ingestor.reindex_meeting(meeting_id).await?;
    Ok(Json(serde_json::json!({ "chunks_created": chunks_created })))
}
