//! Wire shape for `GET /bots/{id}/messages/events` and the web channel's
//! `GET /bots/{id}/web/stream`. Distinct from [`crate::agent_event::AgentEvent`]:
//! this is the *persisted-message* stream (what arrived/was sent), not the
//! live turn-in-progress stream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::agent_event::AgentEvent;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageStreamEvent {
    MessageCreated { message_id: String, content: Value },
    MessageUpdated { message_id: String, content: Value },
}

/// The legacy-compatible envelope named in clients that predate the
/// tagged-union `AgentEvent`/`MessageStreamEvent` split can still consume
/// `{type: "status"|"delta"|"phase_start"|"phase_end"|"tool_call_*"|
/// "attachment"|"final"|"error", ...}`. `memoh-gateway`'s SSE handler emits
/// both the typed `AgentEvent` line and, for now, this flattened legacy
/// shape is derivable from it on demand via [`LegacySseEvent::from_agent_event`]
/// rather than maintained as a second source of truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacySseEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LegacySseEvent {
    pub fn from_agent_event(ev: &AgentEvent) -> Self {
        let kind = match ev {
            AgentEvent::AgentStart | AgentEvent::AgentEnd => "status",
            AgentEvent::TextStart | AgentEvent::ReasoningStart => "phase_start",
            AgentEvent::TextEnd | AgentEvent::ReasoningEnd => "phase_end",
            AgentEvent::TextDelta { .. } | AgentEvent::ReasoningDelta { .. } => "delta",
            AgentEvent::ToolCallStart { .. } => "tool_call_start",
            AgentEvent::ToolCallEnd { .. } => "tool_call_end",
            AgentEvent::AttachmentDelta { .. } => "attachment",
            AgentEvent::ProcessingStarted => "status",
            AgentEvent::ProcessingCompleted => "final",
            AgentEvent::ProcessingFailed { .. } => "error",
        };
        let mut out = LegacySseEvent {
            kind: kind.to_string(),
            delta: None,
            call_id: None,
            name: None,
            payload: None,
            error: None,
        };
        match ev {
            AgentEvent::TextDelta { delta } | AgentEvent::ReasoningDelta { delta } => {
                out.delta = Some(delta.clone());
            }
            AgentEvent::ToolCallStart { call_id, name, input } => {
                out.call_id = Some(call_id.clone());
                out.name = Some(name.clone());
                out.payload = Some(input.clone());
            }
            AgentEvent::ToolCallEnd { call_id, result } => {
                out.call_id = Some(call_id.clone());
                out.payload = Some(result.clone());
            }
            AgentEvent::AttachmentDelta { attachments } => {
                out.payload = serde_json::to_value(attachments).ok();
            }
            AgentEvent::ProcessingFailed { error } => {
                out.error = Some(error.clone());
            }
            _ => {}
        }
        out
    }
}

/// `messages.content` persisted shape : text messages are
/// `{text, attachments?}`; assistant multi-part messages are an array of
/// tagged blocks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    Text {
        text: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        attachments: Vec<String>,
    },
    Parts(Vec<ContentBlock>),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    ToolCall { call_id: String, name: String, input: Value },
    ToolResult { call_id: String, result: Value },
}

/// `/bots/{id}/messages` response item — thin projection of `memoh-db::model::Message`
/// for the HTTP surface, keeping the gateway decoupled from the DB row shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageView {
    pub id: String,
    pub bot_id: String,
    pub role: String,
    pub content: MessageContent,
    pub created_at: DateTime<Utc>,
}
