//! The built-in web channel: backed by the gateway's own
//! SSE hub, no external network dependency. Canonical target form
//! `web:<conn_id>`.
//!
//! Unlike Telegram/Feishu, there is no outside service to "connect" to —
//! `connect` just records the handler the gateway's
//! `POST /bots/{id}/web/messages` route should forward inbound messages
//! into, and `send` fans an outbound message out to whichever browser tab's
//! SSE stream (`GET /bots/{id}/web/stream`) is subscribed under that
//! `conn_id`. Modeled on WS hub (`skynet-gateway::ws`) but
//! reduced to the narrower `InboundHandler`/`Channel::send` contract.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use dashmap::DashMap;
use memoh_channels::{
    channel::InboundHandler, connection::Connection, error::ChannelError,
    types::{ChannelCapabilities, Identity, InboundMessage, OutboundMessage},
    Channel,
};
use memoh_core::types::ConnId;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

const OUTBOUND_BUFFER: usize = 64;

pub struct WebChannel {
    handler: RwLock<Option<Arc<dyn InboundHandler>>>,
    subscribers: DashMap<ConnId, mpsc::Sender<OutboundMessage>>,
}

impl Default for WebChannel {
    fn default() -> Self {
        Self {
            handler: RwLock::new(None),
            subscribers: DashMap::new(),
        }
    }
}

impl WebChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers a fresh SSE subscriber for `conn_id`, returning the
    /// receiving half the gateway's `GET /bots/{id}/web/stream` handler
    /// drains into the response body. Replaces any prior subscription under
    /// the same id (a page reload).
    pub fn subscribe(&self, conn_id: ConnId) -> mpsc::Receiver<OutboundMessage> {
        let (tx, rx) = mpsc::channel(OUTBOUND_BUFFER);
        self.subscribers.insert(conn_id, tx);
        rx
    }

    pub fn unsubscribe(&self, conn_id: ConnId) {
        self.subscribers.remove(&conn_id);
    }

    /// Called by `POST /bots/{id}/web/messages` to hand an inbound message
    /// to the router, the same path every other adapter's receive loop uses.
    pub async fn submit_inbound(&self, msg: InboundMessage) {
        let handler = self.handler.read().unwrap().clone();
        if let Some(handler) = handler {
            handler.handle(msg).await;
        } else {
            warn!("web channel received inbound before any connection was established");
        }
    }

    fn parse_target(target: &str) -> Result<ConnId, ChannelError> {
        let id = target
        .strip_prefix("web:")
        .ok_or_else(|| ChannelError::SendFailed(format!("not a web target: {target}")))?;
        id.parse()
        .map_err(|e| ChannelError::SendFailed(format!("bad web conn id {id}: {e}")))
    }
}

#[async_trait]
impl Channel for WebChannel {
    fn name(&self) -> &str {
        "web"
    }

    fn capabilities(&self) -> ChannelCapabilities {
        ChannelCapabilities::TEXT | ChannelCapabilities::RICHTEXT | ChannelCapabilities::ATTACHMENTS
    }

    fn normalize_config(&self, raw: Value) -> Result<Value, ChannelError> {
        Ok(raw)
    }

    fn normalize_user_config(&self, raw: Value) -> Result<Value, ChannelError> {
        Ok(raw)
    }

    fn resolve_target(&self, raw: &str) -> String {
        if let Some(rest) = raw.strip_prefix("web:") {
            format!("web:{rest}")
        } else {
            format!("web:{raw}")
        }
    }

    fn match_binding(&self, _binding: &Value, _identity: &Identity) -> bool {
        // The web channel has no durable external account to bind — every
        // browser tab is its own ephemeral identity.
        false
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
        let conn_id = Self::parse_target(&msg.target)?;
        let Some(sub) = self.subscribers.get(&conn_id) else {
            return Err(ChannelError::SendFailed(format!(
                        "no subscriber for web conn {conn_id}"
            )));
        };
        sub.send(msg.clone())
        .await
        .map_err(|e| ChannelError::SendFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_normalization_is_a_retract() {
        let chan = WebChannel::default();
        let once = chan.normalize_target("abc");
        let twice = chan.normalize_target(&once);
        assert_eq!(once, "web:abc");
        assert_eq!(once, twice);
    }

    #[tokio::test]
    async fn send_without_subscriber_fails() {
        let chan = WebChannel::default();
        let msg = OutboundMessage {
            target: "web:00000000-0000-0000-0000-000000000000".into(),
            content: "hi".into(),
            format: Default::default(),
            reply_to: None,
        };
        assert!(chan.send(&msg).await.is_err());
    }

    #[tokio::test]
    async fn send_reaches_subscriber() {
        let chan = WebChannel::default();
        let conn_id = ConnId::new();
        let mut rx = chan.subscribe(conn_id);
        let msg = OutboundMessage {
            target: format!("web:{conn_id}"),
            content: "hi".into(),
            format: Default::default(),
            reply_to: None,
        };
        chan.send(&msg).await.unwrap();
        let got = rx.recv().await.unwrap();
        assert_eq!(got.content, "hi");
    }
}
