//! CLI channel: reads stdin lines as inbound messages
//! and writes outbound messages to stdout. This is distinct from the
//! external `memoh chat` CLI *front-end* of the design (an HTTP client against
//! the gateway, explicitly out of scope per the design) — this adapter instead lets
//! the gateway process itself run in a local interactive mode that reuses
//! the exact same `InboundHandler`/router path as the networked adapters,
//! rather than a bespoke stdin/stdout loop bolted onto `main`.
//!
//! Canonical target form `cli:<session>` — a single fixed session id
//! (`"local"`) since one process has exactly one stdin/stdout pair.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use memoh_channels::{
    channel::InboundHandler,
    connection::Connection,
    error::ChannelError,
    types::{ChannelCapabilities, ConversationRef, Identity, InboundMessage, OutboundMessage},
    Channel,
};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Fixed session id — one process, one terminal.
pub const LOCAL_SESSION: &str = "local";

pub struct CliChannel;

impl CliChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self)
    }
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    fn capabilities(&self) -> ChannelCapabilities {
        ChannelCapabilities::TEXT
    }

    fn normalize_config(&self, raw: Value) -> Result<Value, ChannelError> {
        Ok(raw)
    }

    fn normalize_user_config(&self, raw: Value) -> Result<Value, ChannelError> {
        Ok(raw)
    }

    fn resolve_target(&self, raw: &str) -> String {
        if let Some(rest) = raw.strip_prefix("cli:") {
            format!("cli:{rest}")
        } else {
            format!("cli:{raw}")
        }
    }

    fn match_binding(&self, _binding: &Value, _identity: &Identity) -> bool {
        false
    }

    async fn connect(
        &self,
        _config: Value,
        handler: Arc<dyn InboundHandler>,
    ) -> Result<Connection, ChannelError> {
        let cancel = CancellationToken::new();
        let child = cancel.clone();
        let task = tokio::spawn(async move {
                let stdin = tokio::io::stdin();
                let mut lines = BufReader::new(stdin).lines();
                loop {
                    tokio::select! {
                        _ = child.cancelled() => break,
                        line = lines.next_line() => {
                            match line {
                                Ok(Some(text)) if !text.trim().is_empty() => {
                                    let msg = InboundMessage {
                                        channel: "cli".to_string(),
                                        message: serde_json::json!({"text": text}),
                                        reply_target: format!("cli:{LOCAL_SESSION}"),
                                        sender: Identity {
                                            channel: "cli".to_string(),
                                            external_id: LOCAL_SESSION.to_string(),
                                            display_name: Some("local".to_string()),
                                            avatar_url: None,
                                        },
                                        conversation: ConversationRef {
                                            external_conversation_id: LOCAL_SESSION.to_string(),
                                            thread_id: None,
                                            conversation_type: Some("p2p".to_string()),
                                        },
                                        received_at: Utc::now(),
                                        external_message_id: None,
                                        source: None,
                                    };
                                    handler.handle(msg).await;
                                }
                                Ok(Some(_)) => continue,
                                Ok(None) => break,
                                Err(_) => break,
                            }
                        }
                    }
                }
                info!("cli channel stdin loop exited");
        });
        Ok(Connection::new(cancel, task))
    }

    async fn send(&self, msg: &OutboundMessage) -> Result<(), ChannelError> {
        println!("{}", msg.content);
        Ok(())
    }
}
