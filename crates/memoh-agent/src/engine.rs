//! The agent turn engine : `Stream(ctx, TurnInput) →
//! AsyncSequence<AgentEvent>`. Generalizes the prior build's
//! `tools::tool_loop::run_tool_loop` (LLM → tool calls → results → LLM →
//! repeat, `raw_messages`-driven) from a single non-streaming response into
//! a streaming, multi-provider, multi-step turn that forwards provider
//! output through [`AttachmentExtractor`] and dispatches tool calls through
//! [`memoh_mcp::provider::Manager`].

use std::sync::Arc;

use async_stream::stream;
use futures_util::Stream;
use memoh_core::types::BotId;
use memoh_db::PgPool;
use memoh_memory::MemoryEngine;
use memoh_mcp::provider::{err_result, Manager, SessionContext};
use memoh_protocol::agent_event::{AgentEvent, AllowedAction, AttachmentRef, TurnInput};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::attachments::AttachmentExtractor;
use crate::context::{self, DEFAULT_MAX_CONTEXT_TOKENS};
use crate::provider::{ChatRequest, ToolCall, ToolDefinition};
use crate::resolve;
use crate::stream::StreamEvent;

/// Hard cap on tool-dispatch round trips per turn.
pub const MAX_STEPS: usize = 32;
/// Grace period for in-flight tool calls to wrap up after cancellation
/// (the design state machine).
const CANCEL_GRACE: std::time::Duration = std::time::Duration::from_secs(1);
/// Output budget per provider round trip. Not a hard requirement; kept generous
/// since the provider itself enforces its own context window.
const MAX_OUTPUT_TOKENS: u32 = 4096;

pub struct TurnEngine {
    pool: PgPool,
    memory: Arc<MemoryEngine>,
    tools: Arc<Manager>,
}

impl TurnEngine {
    pub fn new(pool: PgPool, memory: Arc<MemoryEngine>, tools: Arc<Manager>) -> Self {
        Self { pool, memory, tools }
    }

    /// Runs one turn, yielding `AgentEvent`s as they happen. The returned
    /// stream is the entire public contract of this crate: the gateway maps
    /// it onto SSE, the scheduler drains it to completion for a synthetic
    /// turn.
    pub fn stream(
        self: Arc<Self>,
        ctx: SessionContext,
        input: TurnInput,
        cancel: CancellationToken,
    ) -> impl Stream<Item = AgentEvent> {
        stream! {
            yield AgentEvent::AgentStart;
            yield AgentEvent::ProcessingStarted;

            let resolved = match resolve::resolve(&self.pool, &input.model_ref).await {
                Ok(r) => r,
                Err(e) => {
                    yield AgentEvent::ProcessingFailed { error: e.to_string() };
                    yield AgentEvent::AgentEnd;
                    return;
                }
            };

            let all_tools = self.tools.list_tools(&ctx).await;
            let tool_defs: Vec<ToolDefinition> = all_tools
            .into_iter()
            .filter(|t| {
                    let action = action_for_tool(&t.name).unwrap_or(AllowedAction::McpExternal);
                    input.allowed_actions.contains(&action)
            })
            .map(|t| ToolDefinition {
                    name: t.name,
                    description: t.description,
                    input_schema: t.input_schema,
            })
            .collect();

            let context_bundle = match context::build(
                &self.pool,
                &self.memory,
                ctx.bot_id,
                input.active_context_minutes,
                &ctx.current_platform,
                &input.skills,
                &input.query,
                DEFAULT_MAX_CONTEXT_TOKENS,
            )
            .await
            {
                Ok(b) => b,
                Err(e) => {
                    yield AgentEvent::ProcessingFailed { error: e.to_string() };
                    yield AgentEvent::AgentEnd;
                    return;
                }
            };

            let mut raw_messages: Vec<serde_json::Value> = context_bundle
            .history
            .iter()
            .map(|m| serde_json::json!({ "role": m.role.to_string(), "content": m.content.clone() }))
            .collect();
            raw_messages.extend(input.messages.clone());
            raw_messages.push(serde_json::json!({ "role": "user", "content": render_query(&input) }));

            let base_req = ChatRequest {
                model: resolved.model.model_id.clone(),
                system: context_bundle.system_prompt.to_plain_text(),
                system_prompt: Some(context_bundle.system_prompt.clone()),
                messages: Vec::new(),
                max_tokens: MAX_OUTPUT_TOKENS,
                stream: true,
                thinking: None,
                tools: tool_defs,
                raw_messages: None,
            };

            let mut final_text = String::new();

            'turn: for step in 0..MAX_STEPS {
                if cancel.is_cancelled() {
                    yield AgentEvent::ProcessingFailed { error: "cancelled".to_string() };
                    yield AgentEvent::AgentEnd;
                    return;
                }

                let mut req = base_req.clone();
                req.raw_messages = Some(raw_messages.clone());

                let (tx, mut rx) = mpsc::channel::<StreamEvent>(64);
                let provider = Arc::clone(&resolved.provider);
                let req_for_task = req.clone();
                tokio::spawn(async move {
                        if let Err(e) = provider.send_stream(&req_for_task, tx).await {
                            warn!(error = %e, "provider stream ended with error");
                        }
                });

                let mut extractor = AttachmentExtractor::new();
                let mut in_text = false;
                let mut in_reasoning = false;
                let mut tool_calls: Vec<ToolCall> = Vec::new();
                let mut text_content = String::new();
                let mut stop_reason = String::new();
                let mut cancelled = false;

                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            cancelled = true;
                            break;
                        }
                        event = rx.recv() => {
                            match event {
                                Some(StreamEvent::TextDelta { text }) => {
                                    let step_out = extractor.push(&text);
                                    if !step_out.visible_text.is_empty() {
                                        if !in_text {
                                            yield AgentEvent::TextStart;
                                            in_text = true;
                                        }
                                        text_content.push_str(&step_out.visible_text);
                                        yield AgentEvent::TextDelta { delta: step_out.visible_text };
                                    }
                                    if !step_out.attachments.is_empty() {
                                        yield AgentEvent::AttachmentDelta {
                                            attachments: step_out.attachments.into_iter().map(|file| AttachmentRef { file }).collect(),
                                        };
                                    }
                                }
                                Some(StreamEvent::Thinking { text }) => {
                                    if !in_reasoning {
                                        yield AgentEvent::ReasoningStart;
                                        in_reasoning = true;
                                    }
                                    yield AgentEvent::ReasoningDelta { delta: text };
                                }
                                Some(StreamEvent::ToolUse { id, name, input: tool_input }) => {
                                    tool_calls.push(ToolCall { id, name, input: tool_input });
                                }
                                Some(StreamEvent::Done { stop_reason: sr, .. }) => {
                                    stop_reason = sr;
                                    break;
                                }
                                Some(StreamEvent::Error { message }) => {
                                    if in_text {
                                        yield AgentEvent::TextEnd;
                                    }
                                    if in_reasoning {
                                        yield AgentEvent::ReasoningEnd;
                                    }
                                    yield AgentEvent::ProcessingFailed { error: message };
                                    yield AgentEvent::AgentEnd;
                                    return;
                                }
                                None => break,
                            }
                        }
                    }
                }

                if cancelled {
                    tokio::time::sleep(CANCEL_GRACE).await;
                    if in_text {
                        yield AgentEvent::TextEnd;
                    }
                    if in_reasoning {
                        yield AgentEvent::ReasoningEnd;
                    }
                    yield AgentEvent::ProcessingFailed { error: "cancelled".to_string() };
                    yield AgentEvent::AgentEnd;
                    return;
                }

                let flushed = extractor.flush_remainder();
                if !flushed.visible_text.is_empty() {
                    if !in_text {
                        yield AgentEvent::TextStart;
                        in_text = true;
                    }
                    text_content.push_str(&flushed.visible_text);
                    yield AgentEvent::TextDelta { delta: flushed.visible_text };
                }
                if !flushed.attachments.is_empty() {
                    yield AgentEvent::AttachmentDelta {
                        attachments: flushed.attachments.into_iter().map(|file| AttachmentRef { file }).collect(),
                    };
                }
                if in_text {
                    yield AgentEvent::TextEnd;
                }
                if in_reasoning {
                    yield AgentEvent::ReasoningEnd;
                }

                if tool_calls.is_empty() || stop_reason != "tool_use" {
                    final_text = text_content;
                    break 'turn;
                }

                let mut assistant_content: Vec<serde_json::Value> = Vec::new();
                if !text_content.is_empty() {
                    assistant_content.push(serde_json::json!({ "type": "text", "text": text_content }));
                }
                for call in &tool_calls {
                    assistant_content.push(serde_json::json!({
                                "type": "tool_use",
                                "id": call.id,
                                "name": call.name,
                                "input": call.input,
                    }));
                }
                raw_messages.push(serde_json::json!({ "role": "assistant", "content": assistant_content }));

                let mut tool_result_content: Vec<serde_json::Value> = Vec::new();
                for call in &tool_calls {
                    yield AgentEvent::ToolCallStart {
                        call_id: call.id.clone(),
                        name: call.name.clone(),
                        input: call.input.clone(),
                    };
                    let result = match self.tools.call_tool(&ctx, &call.name, call.input.clone()).await {
                        Ok(v) => v,
                        Err(e) => err_result(e.to_string()),
                    };
                    yield AgentEvent::ToolCallEnd { call_id: call.id.clone(), result: result.clone() };
                    tool_result_content.push(serde_json::json!({
                                "type": "tool_result",
                                "tool_use_id": call.id,
                                "content": result,
                    }));
                }
                raw_messages.push(serde_json::json!({ "role": "user", "content": tool_result_content }));

                if step + 1 == MAX_STEPS {
                    yield AgentEvent::ProcessingFailed { error: "step limit".to_string() };
                    yield AgentEvent::AgentEnd;
                    return;
                }
            }

            spawn_memory_reconcile(Arc::clone(&self.memory), ctx.bot_id, &input.query, &final_text);

            yield AgentEvent::ProcessingCompleted;
            yield AgentEvent::AgentEnd;
        }
    }
}

fn render_query(input: &TurnInput) -> String {
    if input.attachments.is_empty() {
        return input.query.clone();
    }
    let mut out = input.query.clone();
    out.push_str("\n\n<attachments>\n");
    for path in &input.attachments {
        out.push_str("- ");
        out.push_str(path);
        out.push('\n');
    }
    out.push_str("</attachments>");
    out
}

/// Maps a tool name's family prefix (the contract names of the design) to
/// the `allowed_actions` entry that gates it. A name with no recognized
/// prefix is treated as an externally-registered MCP tool, gated by
/// `mcp_external` rather than silently allowed.
fn action_for_tool(name: &str) -> Option<AllowedAction> {
    match name.split('.').next().unwrap_or(name) {
        "message" => Some(AllowedAction::Messaging),
        "container" => Some(AllowedAction::Container),
        "memory" => Some(AllowedAction::Memory),
        "web" => Some(AllowedAction::Web),
        "subagent" => Some(AllowedAction::Subagent),
        "schedule" => Some(AllowedAction::Schedule),
        "skill" => Some(AllowedAction::Skill),
        _ => None,
    }
}

/// Fire-and-forget post-turn memory reconciliation : the turn's
/// stream closes on `processing_completed` without waiting for extraction to
/// finish, since a slow `Extract` call must never delay `agent_end`.
fn spawn_memory_reconcile(memory: Arc<MemoryEngine>, bot_id: BotId, query: &str, final_text: &str) {
    let window = vec![
        memoh_memory::TurnMessage { role: "user".to_string(), content: query.to_string() },
        memoh_memory::TurnMessage { role: "assistant".to_string(), content: final_text.to_string() },
    ];
    tokio::spawn(async move {
            if let Err(e) = memory.reconcile_turn(bot_id, &window, None).await {
                warn!(%bot_id, error = %e, "memory reconciliation failed for turn");
            }
    });
}
