//! Chat Ingestor: holds a persistent subscription to the chat
//! network, handles live events, runs periodic catch-up
//! reconciliation, and writes messages and vectors through the
//! Chunker and Embedder into the Store (§4.4).

pub mod grammers_session;
pub mod ingestor;
pub mod mock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::ChatId;

/// A message observed from the chat network, either via the live
/// subscription or a reconciler catch-up walk.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub chat_id: ChatId,
    pub external_id: i64,
    pub date: DateTime<Utc>,
    pub sender_name: Option<String>,
    pub text: Option<String>,
}

/// Minimal self-identity, used for health checks.
#[derive(Debug, Clone)]
pub struct SelfIdentity {
    pub user_id: i64,
    pub display_name: String,
}

/// The capabilities the ingestor consumes from the chat network
/// (§6). This interface is intentionally read-only: it exposes no
/// send/edit/delete/react method, so no implementation behind it can
/// be called to mutate foreign chat state (§4.4 Read-only invariant).
#[async_trait]
pub trait ChatSession: Send + Sync {
    /// Authenticated self-identity, for health checks.
    async fn get_self(&self) -> Result<SelfIdentity>;

    /// Iterate messages in `chat_id` with `external_id > min_id`, in
    /// `external_id` ascending order (used by the reconciler).
    async fn iter_messages_since(&self, chat_id: ChatId, min_id: i64) -> Result<Vec<IncomingMessage>>;

    /// Subscribe to new-message events for the given rooms. Returns a
    /// channel the live handler drains until the session disconnects
    /// or the returned sender is dropped.
    async fn subscribe(&self, chat_ids: Vec<ChatId>) -> Result<tokio::sync::mpsc::Receiver<IncomingMessage>>;
}
