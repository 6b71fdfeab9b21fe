//! Production [`ChatSession`] backed by a long-lived Telegram
//! user-identity session (grammers' MTProto client, the Rust analog
//! of a Telethon user session — a bot-API client cannot subscribe to
//! arbitrary rooms on a user's behalf).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use grammers_client::{Client, Config, InitParams, Update};
use grammers_session::Session;
use tokio::sync::mpsc;

use crate::chat::{ChatSession, IncomingMessage, SelfIdentity};
use crate::error::{ConsiliumError, Result};
use crate::types::ChatId;

const RECONNECT_BASE: Duration = Duration::from_secs(1);
const RECONNECT_CAP: Duration = Duration::from_secs(60);

pub struct GrammersChatSession {
    client: Arc<Client>,
}

impl GrammersChatSession {
    /// Connects using a pre-authorized session string. Authorization
    /// failures are permanent per §4.4 and surface as
    /// [`ConsiliumError::Auth`] so the caller can exit the process.
    pub async fn connect(api_id: i32, api_hash: &str, session: &str) -> Result<Self> {
        let session = Session::load_from_str(session)
            .map_err(|e| ConsiliumError::Config(format!("invalid TELEGRAM_SESSION: {e}")))?;

        let client = Client::connect(Config {
            session,
            api_id,
            api_hash: api_hash.to_string(),
            params: InitParams::default(),
        })
        .await
        .map_err(|e| ConsiliumError::ChatNetwork(e.to_string()))?;

        if !client.is_authorized().await.map_err(|e| ConsiliumError::ChatNetwork(e.to_string()))? {
            return Err(ConsiliumError::Auth(
                "Telegram session is not authorized; re-run telegram_auth".into(),
            ));
        }

        Ok(Self { client: Arc::new(client) })
    }

    /// Reconnect loop with exponential backoff capped at a minute
    /// (§4.4 Failure semantics). `SignInError`-shaped auth failures
    /// are fatal and propagate immediately instead of retrying.
    pub async fn reconnect_with_backoff(&self, api_id: i32, api_hash: &str, session: &str) -> Result<Self> {
        let mut backoff = RECONNECT_BASE;
        loop {
            match Self::connect(api_id, api_hash, session).await {
                Ok(s) => return Ok(s),
                Err(ConsiliumError::Auth(msg)) => return Err(ConsiliumError::Auth(msg)),
                Err(e) => {
                    tracing::warn!(error = %e, backoff_secs = backoff.as_secs(), "chat network reconnect failed, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(RECONNECT_CAP);
                }
            }
        }
    }
}

#[async_trait]
impl ChatSession for GrammersChatSession {
    async fn get_self(&self) -> Result<SelfIdentity> {
        let me = self
            .client
            .get_me()
            .await
            .map_err(|e| ConsiliumError::ChatNetwork(e.to_string()))?;
        Ok(SelfIdentity {
            user_id: me.id(),
            display_name: me.full_name(),
        })
    }

    async fn iter_messages_since(&self, chat_id: ChatId, min_id: i64) -> Result<Vec<IncomingMessage>> {
        let chat = self
            .client
            .resolve_chat_id(chat_id)
            .await
            .map_err(|e| ConsiliumError::ChatNetwork(e.to_string()))?
            .ok_or_else(|| ConsiliumError::ChatNetwork(format!("chat {chat_id} not found")))?;

        let mut out = Vec::new();
        let mut iter = self.client.iter_messages(&chat).min_id(min_id as i32);
        while let Some(message) = iter.next().await.map_err(|e| ConsiliumError::ChatNetwork(e.to_string()))? {
            out.push(IncomingMessage {
                chat_id,
                external_id: message.id() as i64,
                date: Utc.timestamp_opt(message.date().timestamp(), 0).single().unwrap_or_else(Utc::now),
                sender_name: message.sender().map(|s| s.full_name()),
                text: Some(message.text().to_string()).filter(|t| !t.is_empty()),
            });
        }
        // The network returns newest-first; the reconciler wants to
        // re-drive oldest-first so chunk/commit order matches arrival.
        out.reverse();
        Ok(out)
    }

    async fn subscribe(&self, chat_ids: Vec<ChatId>) -> Result<mpsc::Receiver<IncomingMessage>> {
        let (tx, rx) = mpsc::channel(256);
        let client = self.client.clone();
        let watched: std::collections::HashSet<ChatId> = chat_ids.into_iter().collect();

        tokio::spawn(async move {
            loop {
                match client.next_update().await {
                    Ok(Some(Update::NewMessage(message))) if !message.outgoing() => {
                        let chat_id = message.chat().id();
                        if !watched.contains(&chat_id) {
                            continue;
                        }
                        let incoming = IncomingMessage {
                            chat_id,
                            external_id: message.id() as i64,
                            date: Utc
                                .timestamp_opt(message.date().timestamp(), 0)
                                .single()
                                .unwrap_or_else(Utc::now),
                            sender_name: message.sender().map(|s| s.full_name()),
                            text: Some(message.text().to_string()).filter(|t| !t.is_empty()),
                        };
                        if tx.send(incoming).await.is_err() {
                            break;
                        }
                    }
                    Ok(Some(_)) => continue,
                    Ok(None) => break,
                    Err(e) => {
                        tracing::error!(error = %e, "chat network update stream error");
                        break;
                    }
                }
            }
        });

        Ok(rx)
    }
}
