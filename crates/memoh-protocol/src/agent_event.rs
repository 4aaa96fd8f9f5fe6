//! Wire shape of the agent turn engine's event stream.
//!
//! `AgentEvent` is the tagged union `Stream(ctx, TurnInput) -> AsyncSequence<AgentEvent>`
//! emits; `memoh-agent` produces these, `memoh-gateway` serialises them onto
//! the `/chat/stream` SSE response without needing to know anything
//! about how the turn loop itself works.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One call-id-scoped tool invocation's attachment to the turn timeline.
/// `tool_call_start{id}` always precedes exactly one `tool_call_end{id}`
/// before the stream ends, unless the stream ends in `processing_failed`
/// (the design, "tool-call pairing").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    AgentStart,
    AgentEnd,

    TextStart,
    TextDelta { delta: String },
    TextEnd,

    ReasoningStart,
    ReasoningDelta { delta: String },
    ReasoningEnd,

    ToolCallStart {
        call_id: String,
        name: String,
        input: Value,
    },
    ToolCallEnd {
        call_id: String,
        result: Value,
    },

    AttachmentDelta {
        attachments: Vec<AttachmentRef>,
    },

    ProcessingStarted,
    ProcessingCompleted,
    ProcessingFailed { error: String },
}

impl AgentEvent {
    /// Discriminant string — matches the `type` tag serde writes, used by
    /// tests and by the gateway's SSE `event:` line.
    pub fn type_name(&self) -> &'static str {
        match self {
            AgentEvent::AgentStart => "agent_start",
            AgentEvent::AgentEnd => "agent_end",
            AgentEvent::TextStart => "text_start",
            AgentEvent::TextDelta { .. } => "text_delta",
            AgentEvent::TextEnd => "text_end",
            AgentEvent::ReasoningStart => "reasoning_start",
            AgentEvent::ReasoningDelta { .. } => "reasoning_delta",
            AgentEvent::ReasoningEnd => "reasoning_end",
            AgentEvent::ToolCallStart { .. } => "tool_call_start",
            AgentEvent::ToolCallEnd { .. } => "tool_call_end",
            AgentEvent::AttachmentDelta { .. } => "attachment_delta",
            AgentEvent::ProcessingStarted => "processing_started",
            AgentEvent::ProcessingCompleted => "processing_completed",
            AgentEvent::ProcessingFailed { .. } => "processing_failed",
        }
    }
}

/// One extracted `<attachments>` entry — a path the attachment stream
/// extractor pulled out of model output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttachmentRef {
    pub file: String,
}

/// `TurnInput` — the request shape `memoh-agent::Stream` accepts.
/// Lives here (not in `memoh-agent`) so the gateway can build one from an
/// HTTP `ChatRequest` body without depending on the agent crate's internals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnInput {
    #[serde(alias = "model")]
    pub model_ref: String,
    #[serde(alias = "active_context_time", default = "default_active_context_minutes")]
    pub active_context_minutes: i64,
    #[serde(default)]
    pub platforms: Vec<String>,
    #[serde(alias = "currentPlatform")]
    pub current_platform: String,
    #[serde(alias = "allowedActions", default)]
    pub allowed_actions: Vec<AllowedAction>,
    #[serde(default)]
    pub messages: Vec<Value>,
    #[serde(default)]
    pub skills: Vec<String>,
    pub query: String,
    pub identity: Value,
    #[serde(default)]
    pub attachments: Vec<String>,
}

fn default_active_context_minutes() -> i64 {
    60
}

/// One member of `TurnInput.allowed_actions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllowedAction {
    Web,
    Subagent,
    Skill,
    Container,
    Memory,
    Messaging,
    McpExternal,
    Schedule,
}
