//! `POST /webhooks/feishu` : Feishu/Lark delivers inbound
//! events over an HTTP callback rather than a pollable connection, so this
//! is the one webhook route the gateway exposes — narrower than the
//! generic multi-source HMAC webhook system, since nothing else
//! in `memoh-channels` needs one.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use memoh_channels::types::{ConversationRef, Identity, InboundMessage};
use serde_json::{json, Value};

use crate::app::AppState;

/// Feishu's event callback carries a `type: "url_verification"` handshake
/// (answered with its `challenge` verbatim) and, for real events, a
/// `header.token` (or legacy top-level `token`) that must match the
/// configured verification token before the event is trusted.
pub async fn feishu_webhook_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Json<Value> {
    if body.get("type").and_then(Value::as_str) == Some("url_verification") {
        let challenge = body.get("challenge").cloned().unwrap_or(Value::Null);
        return Json(json!({ "challenge": challenge }));
    }

    let Some(feishu) = &state.feishu else {
        return Json(json!({ "ok": false, "error": "feishu channel not configured" }));
    };

    let token = body
    .get("header")
    .and_then(|h| h.get("token"))
    .or_else(|| body.get("token"))
    .and_then(Value::as_str)
    .unwrap_or("");
    if !feishu.verify_token(token) {
        return Json(json!({ "ok": false, "error": "invalid verification token" }));
    }

    let Some(event) = body.get("event") else {
        return Json(json!({ "ok": true }));
    };
    let Some(message) = event.get("message") else {
        return Json(json!({ "ok": true }));
    };
    let chat_id = message.get("chat_id").and_then(Value::as_str).unwrap_or("").to_string();
    let content: Value = message
    .get("content")
    .and_then(Value::as_str)
    .and_then(|raw| serde_json::from_str(raw).ok())
    .unwrap_or_else(|| json!({ "text": "" }));
    let open_id = event
    .get("sender")
    .and_then(|s| s.get("sender_id"))
    .and_then(|s| s.get("open_id"))
    .and_then(Value::as_str)
    .unwrap_or("")
    .to_string();
    let message_id = message.get("message_id").and_then(Value::as_str).map(str::to_string);

    let msg = InboundMessage {
        channel: "feishu".to_string(),
        message: content,
        reply_target: format!("feishu:{chat_id}"),
        sender: Identity {
            channel: "feishu".to_string(),
            external_id: open_id,
            display_name: None,
            avatar_url: None,
        },
        conversation: ConversationRef {
            external_conversation_id: chat_id,
            thread_id: None,
            conversation_type: Some(
                message
                .get("chat_type")
                .and_then(Value::as_str)
                .unwrap_or("p2p")
                .to_string(),
            ),
        },
        received_at: Utc::now(),
        external_message_id: message_id,
        source: Some(body.clone()),
    };
    feishu.submit_inbound(msg).await;
    Json(json!({ "ok": true }))
}
