//! Test double for [`ChatSession`], used to exercise the ingestor's
//! live-handler and reconciler logic without a network, and to prove
//! the read-only invariant (§4.4, §8): the ingestor never calls a
//! send/edit/delete/react method.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::chat::{ChatSession, IncomingMessage, SelfIdentity};
use crate::error::Result;
use crate::types::ChatId;

#[derive(Default)]
pub struct MockChatSession {
    /// Every method invocation, logged by name, so tests can assert
    /// the ingestor only ever calls read-only methods.
    pub call_log: Mutex<Vec<String>>,
    pub backlog: Mutex<HashMap<ChatId, Vec<IncomingMessage>>>,
    live_rx: Mutex<Option<mpsc::Receiver<IncomingMessage>>>,
    live_tx: Mutex<Option<mpsc::Sender<IncomingMessage>>>,
}

impl MockChatSession {
    pub fn new() -> Arc<Self> {
        let (tx, rx) = mpsc::channel(256);
        Arc::new(Self {
            call_log: Mutex::new(Vec::new()),
            backlog: Mutex::new(HashMap::new()),
            live_rx: Mutex::new(Some(rx)),
            live_tx: Mutex::new(Some(tx)),
        })
    }

    /// Queue a message the reconciler will discover via
    /// `iter_messages_since`.
    pub fn queue_backlog(&self, msg: IncomingMessage) {
        self.backlog.lock().entry(msg.chat_id).or_default().push(msg);
    }

    /// Deliver a message to the live handler, as if the chat network
    /// pushed it through the subscription.
    pub async fn deliver_live(&self, msg: IncomingMessage) {
        let tx = self.live_tx.lock().clone();
        if let Some(tx) = tx {
            let _ = tx.send(msg).await;
        }
    }

    /// `true` iff the call log contains no mutating method name —
    /// the independently-testable read-only invariant (§8).
    pub fn never_mutated(&self) -> bool {
        self.call_log
            .lock()
            .iter()
            .all(|name| !["send_", "delete_", "edit_", "react_"].iter().any(|p| name.starts_with(p)))
    }
}

#[async_trait]
impl ChatSession for MockChatSession {
    async fn get_self(&self) -> Result<SelfIdentity> {
        self.call_log.lock().push("get_self".to_string());
        Ok(SelfIdentity {
            user_id: 1,
            display_name: "test-bot".to_string(),
        })
    }

    async fn iter_messages_since(&self, chat_id: ChatId, min_id: i64) -> Result<Vec<IncomingMessage>> {
        self.call_log.lock().push("iter_messages_since".to_string());
        let mut msgs: Vec<IncomingMessage> = self
            .backlog
            .lock()
            .get(&chat_id)
            .map(|v| v.iter().filter(|m| m.external_id > min_id).cloned().collect())
            .unwrap_or_default();
        msgs.sort_by_key(|m| m.external_id);
        Ok(msgs)
    }

    async fn subscribe(&self, _chat_ids: Vec<ChatId>) -> Result<mpsc::Receiver<IncomingMessage>> {
        self.call_log.lock().push("subscribe".to_string());
        Ok(self.live_rx.lock().take().expect("subscribe called more than once in test"))
    }
}
