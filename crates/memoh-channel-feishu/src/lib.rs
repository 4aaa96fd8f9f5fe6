//! Feishu/Lark webhook adapter. Feishu delivers inbound
//! events over an HTTP callback the gateway exposes (`POST /webhooks/feishu`)
//! rather than a pollable/streaming connection, so — like the web channel —
//! `connect` only records the handler; the gateway's webhook route calls
//! [`FeishuChannel::submit_inbound`] directly after verifying the
//! `verification_token`. Outbound sends authenticate against Feishu's REST
//! API with a cached `tenant_access_token`, modeled on the prior build's
//! `skynet-discord::send` chunking idiom (`split_chunks`) — Lark's message
//! API has its own 150 KB body limit, so long replies are chunked the same
//! way before each REST call. Canonical target form `feishu:<chat_id>`.

use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use memoh_channels::{
    channel::InboundHandler, connection::Connection, error::ChannelError,
    types::{ChannelCapabilities, Identity, InboundMessage, OutboundMessage},
    Channel,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

/// Feishu message bodies are capped well under the platform's 150 KB limit;
/// 4000 chars keeps well clear of markdown-escaping blowup.
const CHUNK_MAX: usize = 4000;

#[derive(Debug, Clone)]
pub struct FeishuConfig {
    pub app_id: String,
    pub app_secret: String,
    pub verification_token: String,
    pub base_url: String,
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

pub struct FeishuChannel {
    http: reqwest::Client,
    config: FeishuConfig,
    handler: RwLock<Option<Arc<dyn InboundHandler>>>,
    token: RwLock<Option<CachedToken>>,
}

impl FeishuChannel {
    pub fn new(config: FeishuConfig) -> Arc<Self> {
        Arc::new(Self {
                http: reqwest::Client::new(),
                config,
                handler: RwLock::new(None),
                token: RwLock::new(None),
        })
    }

    /// Called by the gateway's `POST /webhooks/feishu` route after checking
    /// `params.verification_token == self.config.verification_token`.
    pub async fn submit_inbound(&self, msg: InboundMessage) {
        let handler = self.handler.read().unwrap().clone();
        if let Some(handler) = handler {
            handler.handle(msg).await;
        } else {
            warn!("feishu channel received inbound before a connection was established");
        }
    }

    pub fn verify_token(&self, provided: &str) -> bool {
        provided == self.config.verification_token
    }

    async fn tenant_access_token(&self) -> Result<String, ChannelError> {
        if let Some(cached) = self.token.read().unwrap().as_ref() {
            if cached.expires_at > Instant::now() {
                return Ok(cached.token.clone());
            }
        }

        #[derive(Deserialize)]
        struct TokenResp {
            code: i32,
            msg: String,
            tenant_access_token: Option<String>,
            expire: Option<u64>,
        }

        let url = format!(
            "{}/open-apis/auth/v3/tenant_access_token/internal",
            self.config.base_url
        );
        let resp: TokenResp = self
        .http
        .post(&url)
        .json(&json!({"app_id": self.config.app_id, "app_secret": self.config.app_secret}))
        .send()
        .await
        .map_err(|e| ChannelError::AuthFailed(e.to_string()))?
        .json()
        .await
        .map_err(|e| ChannelError::AuthFailed(e.to_string()))?;

        if resp.code != 0 {
            return Err(ChannelError::AuthFailed(resp.msg));
        }
        let token = resp
        .tenant_access_token
        .ok_or_else(|| ChannelError::AuthFailed("missing tenant_access_token".into()))?;
        let ttl = resp.expire.unwrap_or(7200).saturating_sub(60);
        *self.token.write().unwrap() = Some(CachedToken {
                token: token.clone(),
                expires_at: Instant::now() + Duration::from_secs(ttl),
        });
        Ok(token)
    }

    /// Split `text` into ≤[`CHUNK_MAX`]-char chunks, preferring whitespace
    /// boundaries — same shape as Discord `split_chunks`.
    pub fn split_chunks(text: &str) -> Vec<String> {
        if text.len() <= CHUNK_MAX {
            return vec![text.to_string()];
        }
        let mut chunks = Vec::new();
        let mut remaining = text;
        while remaining.len() > CHUNK_MAX {
            let window = &remaining[..CHUNK_MAX];
            let split_at = window.rfind('\n').or_else(|| window.rfind(' ')).unwrap_or(CHUNK_MAX);
            chunks.push(remaining[..split_at].to_string());
            remaining = remaining[split_at..].trim_start();
        }
        if !remaining.is_empty() {
            chunks.push(remaining.to_string());
        }
        chunks
    }
}

#[async_trait]
impl Channel for FeishuChannel {
    fn name(&self) -> &str {
        "feishu"
    }

    fn capabilities(&self) -> ChannelCapabilities {
        ChannelCapabilities::TEXT | ChannelCapabilities::RICHTEXT | ChannelCapabilities::REPLY
    }

    fn normalize_config(&self, raw: Value) -> Result<Value, ChannelError> {
        if raw.get("app_id").and_then(Value::as_str).is_none() {
            return Err(ChannelError::ConfigError("missing app_id".into()));
        }
        Ok(raw)
    }

    fn normalize_user_config(&self, raw: Value) -> Result<Value, ChannelError> {
        Ok(raw)
    }

    fn resolve_target(&self, raw: &str) -> String {
        if let Some(rest) = raw.strip_prefix("feishu:") {
            format!("feishu:{rest}")
        } else {
            format!("feishu:{raw}")
        }
    }

    fn match_binding(&self, binding: &Value, identity: &Identity) -> bool {
        binding.get("open_id").and_then(Value::as_str) == Some(identity.external_id.as_str())
    }

    async fn connect(
        &self,
        _config: Value,
        handler: Arc<dyn InboundHandler>,
    ) -> Result<Connection, ChannelError> {
        *self.handler.write().unwrap() = Some(handler);
        let cancel = CancellationToken::new();
        let child = cancel.clone();
        let task = tokio::spawn(async move {
                child.cancelled().await;
        });
        Ok(Connection::new(cancel, task))
    }

    async fn send(&self, msg: &OutboundMessage) -> Result<(), ChannelError> {
        let chat_id = msg
        .target
        .strip_prefix("feishu:")
        .ok_or_else(|| ChannelError::SendFailed(format!("not a feishu target: {}", msg.target)))?;
        let token = self.tenant_access_token().await?;
        let url = format!("{}/open-apis/im/v1/messages?receive_id_type=chat_id", self.config.base_url);

        for chunk in Self::split_chunks(&msg.content) {
            let body = json!({
                    "receive_id": chat_id,
                    "msg_type": "text",
                    "content": json!({"text": chunk}).to_string(),
            });
            let resp = self
            .http
            .post(&url)
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed(e.to_string()))?;
            if !resp.status().is_success() {
                let status = resp.status();
                let text = resp.text().await.unwrap_or_default();
                error!(%status, %text, "feishu send failed");
                return Err(ChannelError::SendFailed(format!("{status}: {text}")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_single_chunk() {
        let chunks = FeishuChannel::split_chunks("hello world");
        assert_eq!(chunks, vec!["hello world".to_string()]);
    }

    #[test]
    fn long_text_splits_on_whitespace() {
        let line = "a".repeat(CHUNK_MAX);
        let text = format!("{line} {line}");
        let chunks = FeishuChannel::split_chunks(&text);
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.len() <= CHUNK_MAX));
    }

    #[test]
    fn target_normalization_is_a_retract() {
        let chan = FeishuChannel::new(FeishuConfig {
                app_id: "a".into(),
                app_secret: "s".into(),
                verification_token: "v".into(),
                base_url: "https://open.feishu.cn".into(),
        });
        let once = chan.normalize_target("oc_1");
        let twice = chan.normalize_target(&once);
        assert_eq!(once, twice);
    }
}
