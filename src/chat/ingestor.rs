//! The chat ingestor's two cooperating tasks: the live handler and
//! the periodic reconciler (§4.4), sharing a single save-and-index
//! path and a cancellation token (§5, §9 Async control flow).

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::chat::{ChatSession, IncomingMessage};
use crate::embedding::Embedder;
use crate::error::Result;
use crate::store::{ChatIngestOutcome, Store};
use crate::types::{ChatId, MIN_CHAT_TEXT_LENGTH};

pub struct ChatIngestor {
    store: Arc<dyn Store>,
    embedder: Arc<dyn Embedder>,
    session: Arc<dyn ChatSession>,
    reconcile_interval: Duration,
}

impl ChatIngestor {
    pub fn new(
        store: Arc<dyn Store>,
        embedder: Arc<dyn Embedder>,
        session: Arc<dyn ChatSession>,
        reconcile_interval: Duration,
    ) -> Self {
        Self {
            store,
            embedder,
            session,
            reconcile_interval,
        }
    }

    /// Steps 1-7 of the save-and-index path (§4.4), shared by the
    /// live handler and the reconciler. A message with no text or
    /// text under [`MIN_CHAT_TEXT_LENGTH`] — including forwarded
    /// media-only messages, which always arrive with no text — is
    /// dropped silently; there is no separate media-only code path.
    pub async fn save_and_index(
        &self,
        chat_id: ChatId,
        external_id: i64,
        event_time: chrono::DateTime<chrono::Utc>,
        sender_name: Option<String>,
        text: Option<String>,
    ) -> Result<ChatIngestOutcome> {
        let text = match text {
            Some(t) if t.chars().count() >= MIN_CHAT_TEXT_LENGTH => t,
            _ => return Ok(ChatIngestOutcome::Skipped),
        };

        if self.store.chat_message_exists(chat_id, external_id).await? {
            return Ok(ChatIngestOutcome::Skipped);
        }

        let vector = self.embedder.embed_one(&text).await?;

        self.store
            .save_and_index_chat_message(chat_id, external_id, event_time, sender_name, text, vector)
            .await
    }

    async fn handle_incoming(&self, msg: IncomingMessage) {
        match self
            .save_and_index(msg.chat_id, msg.external_id, msg.date, msg.sender_name, msg.text)
            .await
        {
            Ok(ChatIngestOutcome::Inserted(id)) => debug!(message_id = %id, chat_id = msg.chat_id, "indexed chat message"),
            Ok(ChatIngestOutcome::Skipped) => {}
            Err(e) if e.is_retryable() => {
                warn!(error = %e, chat_id = msg.chat_id, "transient failure indexing message, reconciler will retry")
            }
            Err(e) => error!(error = %e, chat_id = msg.chat_id, "failed to index chat message"),
        }
    }

    /// Live handler: drains the subscription until the session
    /// disconnects or `cancel` fires.
    pub async fn run_live(&self, cancel: CancellationToken) -> Result<()> {
        let active = self.store.list_active_chat_rooms().await?;
        let chat_ids: Vec<ChatId> = active.iter().map(|r| r.id).collect();
        let mut rx = self.session.subscribe(chat_ids).await?;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("live handler cancelled, draining in-flight work");
                    return Ok(());
                }
                msg = rx.recv() => {
                    match msg {
                        Some(msg) => self.handle_incoming(msg).await,
                        None => return Ok(()),
                    }
                }
            }
        }
    }

    /// Reconciler: one immediate catch-up at startup, then a sleep-first
    /// periodic loop (§4.4) so a freshly started process never
    /// reconciles twice back-to-back. Re-checks `cancel` between rooms,
    /// not only between iterations (§9 Async control flow).
    pub async fn run_reconciler(&self, cancel: CancellationToken) {
        if let Err(e) = self.catchup_all(&cancel).await {
            error!(error = %e, "startup catch-up failed");
        }

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("reconciler cancelled");
                    return;
                }
                _ = tokio::time::sleep(self.reconcile_interval) => {
                    if let Err(e) = self.catchup_all(&cancel).await {
                        error!(error = %e, "periodic catch-up failed");
                    }
                }
            }
        }
    }

    /// Walks every active room from its stored cursor forward,
    /// re-driving any missing messages through the save-and-index
    /// path. A failure in one room must not stop others (§7).
    pub async fn catchup_all(&self, cancel: &CancellationToken) -> Result<usize> {
        let rooms = self.store.list_active_chat_rooms().await?;
        let mut total_new = 0;

        for room in rooms {
            if cancel.is_cancelled() {
                break;
            }

            let min_id = room.last_synced_message_id.unwrap_or(0);
            let messages = match self.session.iter_messages_since(room.id, min_id).await {
                Ok(m) => m,
                Err(e) => {
                    error!(error = %e, chat_id = room.id, "error catching up chat");
                    continue;
                }
            };

            for msg in messages {
                match self
                    .save_and_index(room.id, msg.external_id, msg.date, msg.sender_name, msg.text)
                    .await
                {
                    Ok(ChatIngestOutcome::Inserted(_)) => total_new += 1,
                    Ok(ChatIngestOutcome::Skipped) => {}
                    Err(e) => error!(error = %e, chat_id = room.id, message_id = msg.external_id, "error indexing message during catchup"),
                }
            }
        }

        if total_new > 0 {
            info!(total_new, "catchup completed");
        } else {
            debug!("catchup completed: no new messages");
        }
        Ok(total_new)
    }
}
