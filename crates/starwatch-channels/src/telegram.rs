//! Telegram Bot channel — long polling + message sending via Bot API.

use async_trait::async_trait;
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use starwatch_core::config::TelegramConfig;
use starwatch_core::error::{Result, StarwatchError};
use starwatch_core::traits::Notifier;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use crate::templates;

/// Telegram Bot channel with polling loop.
pub struct TelegramChannel {
    config: TelegramConfig,
    client: reqwest::Client,
    last_update_id: AtomicI64,
}

/// A text message addressed to the bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub chat_id: i64,
    pub username: Option<String>,
    pub text: String,
}

impl TelegramChannel {
    /// Every request carries `timeout_secs`, so an unresponsive Bot API
    /// fails the send instead of holding up a star check.
    pub fn new(config: TelegramConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| StarwatchError::Config(format!("HTTP client: {e}")))?;
        Ok(Self {
            config,
            client,
            last_update_id: AtomicI64::new(0),
        })
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.config.api_base.trim_end_matches('/'),
            self.config.bot_token,
            method
        )
    }

    /// Get updates using long polling.
    pub async fn get_updates(&self, timeout_secs: u64) -> Result<Vec<TelegramUpdate>> {
        let offset = self.last_update_id.load(Ordering::SeqCst) + 1;
        let response = self
            .client
            .get(self.api_url("getUpdates"))
            .timeout(Duration::from_secs(
                timeout_secs + self.config.timeout_secs.max(1),
            ))
            .query(&[
                ("offset", offset.to_string()),
                ("timeout", timeout_secs.to_string()),
                ("allowed_updates", "[\"message\"]".into()),
            ])
            .send()
            .await
            .map_err(|e| StarwatchError::Channel(format!("Telegram getUpdates failed: {e}")))?;

        let body: TelegramApiResponse<Vec<TelegramUpdate>> = response
            .json()
            .await
            .map_err(|e| StarwatchError::Channel(format!("Invalid Telegram response: {e}")))?;

        if !body.ok {
            return Err(StarwatchError::Channel(format!(
                "Telegram API error: {}",
                body.description.unwrap_or_default()
            )));
        }

        let updates = body.result.unwrap_or_default();
        if let Some(last) = updates.last() {
            self.last_update_id.fetch_max(last.update_id, Ordering::SeqCst);
        }
        Ok(updates)
    }

    /// Send a Markdown text message.
    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        let body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "Markdown",
            "disable_web_page_preview": true,
        });

        let response = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&body)
            .send()
            .await
            .map_err(|e| StarwatchError::Channel(format!("sendMessage failed: {e}")))?;

        let result: TelegramApiResponse<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| StarwatchError::Channel(format!("Invalid send response: {e}")))?;

        if !result.ok {
            return Err(StarwatchError::Channel(format!(
                "Send to {chat_id} failed: {}",
                result.description.unwrap_or_default()
            )));
        }
        Ok(())
    }

    /// Get bot info.
    pub async fn get_me(&self) -> Result<TelegramUser> {
        let response = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| StarwatchError::Channel(format!("getMe failed: {e}")))?;
        let body: TelegramApiResponse<TelegramUser> = response
            .json()
            .await
            .map_err(|e| StarwatchError::Channel(format!("Invalid getMe response: {e}")))?;
        body.result
            .ok_or_else(|| StarwatchError::Channel("No bot info".into()))
    }

    /// Start polling loop, returning a stream of incoming messages.
    /// Polling stops once the stream is dropped.
    pub fn start_polling(self: &Arc<Self>) -> TelegramPollingStream {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let channel = Arc::clone(self);

        tokio::spawn(async move {
            tracing::info!("📡 Telegram polling loop started");

            loop {
                match channel.get_updates(30).await {
                    Ok(updates) => {
                        for msg in updates.iter().filter_map(TelegramUpdate::to_incoming) {
                            if tx.send(msg).is_err() {
                                tracing::info!("Telegram polling stopped (receiver dropped)");
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        tracing::error!("❌ Telegram polling error: {e}");
                        tokio::time::sleep(tokio::time::Duration::from_secs(5)).await;
                    }
                }

                if tx.is_closed() {
                    return;
                }
                tokio::time::sleep(tokio::time::Duration::from_secs(
                    channel.config.poll_interval,
                ))
                .await;
            }
        });

        TelegramPollingStream { rx }
    }
}

/// Stream of incoming Telegram messages from polling.
pub struct TelegramPollingStream {
    rx: tokio::sync::mpsc::UnboundedReceiver<IncomingMessage>,
}

impl Stream for TelegramPollingStream {
    type Item = IncomingMessage;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

#[async_trait]
impl Notifier for TelegramChannel {
    async fn send_star_alert(
        &self,
        subscriber: i64,
        name: &str,
        full_name: &str,
        gained: i64,
        total: i64,
    ) -> Result<()> {
        let text = templates::star_alert(name, full_name, gained, total);
        self.send_message(subscriber, &text).await
    }
}

// --- Telegram API Types ---

#[derive(Debug, Deserialize)]
pub struct TelegramApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramUpdate {
    pub update_id: i64,
    pub message: Option<TelegramMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramMessage {
    pub message_id: i64,
    pub from: Option<TelegramUser>,
    pub chat: TelegramChat,
    pub text: Option<String>,
    pub date: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    pub is_bot: bool,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
    #[serde(rename = "type")]
    pub chat_type: String,
    pub title: Option<String>,
}

impl TelegramUpdate {
    /// Text messages from humans only.
    pub fn to_incoming(&self) -> Option<IncomingMessage> {
        let msg = self.message.as_ref()?;
        let text = msg.text.as_ref()?;
        let from = msg.from.as_ref()?;

        if from.is_bot {
            return None;
        }

        Some(IncomingMessage {
            chat_id: msg.chat.id,
            username: from.username.clone(),
            text: text.clone(),
        })
    }
}
