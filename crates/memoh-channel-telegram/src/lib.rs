//! Telegram channel adapter, thin `teloxide`-based wrapper
//! around the [`memoh_channels::Channel`] trait. Grounded in the prior build's
//! `skynet-telegram` crate: long-polling receive loop, chunked sends
//! (`send::split_chunks_smart`), canonical `telegram:<chat_id>` targets.
//! Per-bot allowlisting / DM-guard / mention-requirement concerns the
//! `handler.rs` folded into this same module now live one layer
//! up, in the router and MCP `message.send` tool — this adapter's only job
//! is "move bytes between Telegram's wire format and `InboundMessage`/
//! `OutboundMessage`".

pub mod send;

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use memoh_channels::{
    channel::InboundHandler,
    connection::Connection,
    error::ChannelError,
    types::{ChannelCapabilities, ConversationRef, Identity, InboundMessage, OutboundMessage},
    Channel,
};
use serde::Deserialize;
use serde_json::Value;
use teloxide::prelude::*;
use teloxide::types::{ChatId, ParseMode, UpdateKind};
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
}

pub struct TelegramChannel {
    bot: RwLock<Option<Bot>>,
}

impl Default for TelegramChannel {
    fn default() -> Self {
        Self { bot: RwLock::new(None) }
    }
}

impl TelegramChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

fn chat_kind(chat: &teloxide::types::Chat) -> &'static str {
    if chat.is_private() {
        "p2p"
    } else {
        "group"
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    fn capabilities(&self) -> ChannelCapabilities {
        ChannelCapabilities::TEXT | ChannelCapabilities::RICHTEXT | ChannelCapabilities::ATTACHMENTS | ChannelCapabilities::REPLY
    }

    fn normalize_config(&self, raw: Value) -> Result<Value, ChannelError> {
        let cfg: TelegramConfig = serde_json::from_value(raw.clone())
        .map_err(|e| ChannelError::ConfigError(e.to_string()))?;
        if cfg.bot_token.trim().is_empty() {
            return Err(ChannelError::ConfigError("bot_token is required".into()));
        }
        Ok(raw)
    }

    fn normalize_user_config(&self, raw: Value) -> Result<Value, ChannelError> {
        Ok(raw)
    }

    fn resolve_target(&self, raw: &str) -> String {
        if let Some(rest) = raw.strip_prefix("telegram:") {
            format!("telegram:{rest}")
        } else {
            format!("telegram:{raw}")
        }
    }

    fn match_binding(&self, binding: &Value, identity: &Identity) -> bool {
        binding.get("telegram_user_id").and_then(Value::as_str) == Some(identity.external_id.as_str())
    }

    async fn discover_self(&self) -> Result<Identity, ChannelError> {
        let bot = self
        .bot
        .read()
        .unwrap()
        .clone()
        .ok_or_else(|| ChannelError::ConnectionFailed("not connected".into()))?;
        let me = bot
        .get_me()
        .await
        .map_err(|e| ChannelError::ConnectionFailed(e.to_string()))?;
        Ok(Identity {
                channel: "telegram".to_string(),
                external_id: me.user.id.0.to_string(),
                display_name: me.user.username.clone(),
                avatar_url: None,
        })
    }

    async fn connect(
        &self,
        config: Value,
        handler: Arc<dyn InboundHandler>,
    ) -> Result<Connection, ChannelError> {
        let cfg: TelegramConfig =
        serde_json::from_value(config).map_err(|e| ChannelError::ConfigError(e.to_string()))?;
        let bot = Bot::new(cfg.bot_token);
        *self.bot.write().unwrap() = Some(bot.clone());

        let cancel = CancellationToken::new();
        let child = cancel.clone();
        let task = tokio::spawn(async move {
                let mut offset: i32 = 0;
                loop {
                    let updates = tokio::select! {
                        _ = child.cancelled() => break,
                        r = bot.get_updates().offset(offset).timeout(30).send() => r,
                    };
                    let updates = match updates {
                        Ok(u) => u,
                        Err(e) => {
                            warn!(error = %e, "telegram get_updates failed, backing off");
                            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                            continue;
                        }
                    };
                    for update in updates {
                        offset = offset.max(update.id.0 as i32 + 1);
                        if let UpdateKind::Message(msg) = update.kind {
                            if msg.from().map(|u| u.is_bot).unwrap_or(false) {
                                continue;
                            }
                            let Some(from) = msg.from() else { continue };
                            let text = msg.text().or(msg.caption()).unwrap_or("").to_string();
                            if text.is_empty() {
                                continue;
                            }
                            let inbound = InboundMessage {
                                channel: "telegram".to_string(),
                                message: serde_json::json!({"text": text}),
                                reply_target: format!("telegram:{}", msg.chat.id.0),
                                sender: Identity {
                                    channel: "telegram".to_string(),
                                    external_id: from.id.0.to_string(),
                                    display_name: from.username.clone(),
                                    avatar_url: None,
                                },
                                conversation: ConversationRef {
                                    external_conversation_id: msg.chat.id.0.to_string(),
                                    thread_id: msg.thread_id.map(|t| t.0.0.to_string()),
                                    conversation_type: Some(chat_kind(&msg.chat).to_string()),
                                },
                                received_at: Utc::now(),
                                external_message_id: Some(msg.id.0.to_string()),
                                source: None,
                            };
                            handler.handle(inbound).await;
                        }
                    }
                }
        });
        Ok(Connection::new(cancel, task))
    }

    async fn send(&self, msg: &OutboundMessage) -> Result<(), ChannelError> {
        let bot = self
        .bot
        .read()
        .unwrap()
        .clone()
        .ok_or_else(|| ChannelError::ConnectionFailed("not connected".into()))?;
        let chat_id_str = msg
        .target
        .strip_prefix("telegram:")
        .ok_or_else(|| ChannelError::SendFailed(format!("not a telegram target: {}", msg.target)))?;
        let chat_id: i64 = chat_id_str
        .parse()
        .map_err(|_| ChannelError::SendFailed(format!("bad telegram chat id: {chat_id_str}")))?;

        for chunk in send::split_chunks_smart(&msg.content) {
            let markdown = matches!(msg.format, memoh_channels::types::MessageFormat::Markdown);
            let result = if markdown {
                bot.send_message(ChatId(chat_id), &chunk)
                .parse_mode(ParseMode::MarkdownV2)
                .send()
                .await
            } else {
                bot.send_message(ChatId(chat_id), &chunk).send().await
            };
            if result.is_err() {
                // Retry once as plain text — Telegram rejects malformed MarkdownV2.
                bot.send_message(ChatId(chat_id), &chunk).send().await.map_err(|e| {
                        error!(error = %e, "telegram send failed");
                        ChannelError::SendFailed(e.to_string())
                })?;
            }
        }
        Ok(())
    }
}
