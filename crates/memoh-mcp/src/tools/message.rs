//! `message.send`/`message.react` : the only built-in tool
//! family that talks directly to `memoh-channels` rather than `memoh-db` —
//! everything else about "which conversation does this belong to" has
//! already been resolved by the router before the agent sees a session.

use std::sync::Arc;

use async_trait::async_trait;
use memoh_channels::registry::ChannelRegistry;
use memoh_channels::types::{MessageFormat, OutboundMessage};
use serde_json::Value;

use crate::error::{McpError, Result};
use crate::provider::{err_result, ok_result, SessionContext, ToolDescriptor, ToolProvider};

pub struct MessageToolProvider {
    registry: Arc<ChannelRegistry>,
}

impl MessageToolProvider {
    pub fn new(registry: Arc<ChannelRegistry>) -> Self {
        Self { registry }
    }

    fn channel_of(target: &str) -> Option<&str> {
        target.split_once(':').map(|(kind, _)| kind)
    }
}

#[async_trait]
impl ToolProvider for MessageToolProvider {
    fn provider_name(&self) -> &str {
        "message"
    }

    fn authoritative(&self) -> bool {
        true
    }

    async fn list_tools(&self, _ctx: &SessionContext) -> Vec<ToolDescriptor> {
        vec![
            ToolDescriptor::new(
                "message.send",
                "Send a message to the current conversation, or an explicit target",
                serde_json::json!({
                        "type": "object",
                        "properties": {
                            "target": {"type": "string", "description": "canonical <kind>:<id> target; defaults to the session's reply_target"},
                            "content": {"type": "string"},
                            "format": {"type": "string", "enum": ["plain_text", "markdown", "html"]},
                            "reply_to": {"type": "string"}
                        },
                        "required": ["content"]
                }),
            ),
            ToolDescriptor::new(
                "message.react",
                "Attach a reaction emoji to a message, on channels that support it",
                serde_json::json!({
                        "type": "object",
                        "properties": {
                            "target": {"type": "string"},
                            "emoji": {"type": "string"}
                        },
                        "required": ["target", "emoji"]
                }),
            ),
        ]
    }

    async fn call_tool(&self, ctx: &SessionContext, name: &str, args: Value) -> Result<Value> {
        match name {
            "message.send" => {
                let target = args
                .get("target")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| ctx.reply_target.clone());
                let Some(channel) = Self::channel_of(&target) else {
                    return Ok(err_result(format!("malformed target: {target}")));
                };
                if channel != ctx.current_platform && target != ctx.reply_target {
                    return Ok(err_result("cross-bot/cross-channel targeting is not allowed"));
                }
                let content = match args.get("content").and_then(Value::as_str) {
                    Some(c) => c.to_string(),
                    None => return Ok(err_result("content is required")),
                };
                let format = match args.get("format").and_then(Value::as_str) {
                    Some("markdown") => MessageFormat::Markdown,
                    Some("html") => MessageFormat::Html,
                    _ => MessageFormat::PlainText,
                };
                let reply_to = args.get("reply_to").and_then(Value::as_str).map(str::to_string);

                let adapter = self.registry.get(channel).map_err(McpError::from)?;
                let outbound = OutboundMessage {
                    target: target.clone(),
                    content,
                    format,
                    reply_to,
                };
                match adapter.send(&outbound).await {
                    Ok(()) => Ok(ok_result(serde_json::json!({ "target": target }))),
                    Err(e) => Ok(err_result(e.to_string())),
                }
            }
            "message.react" => {
                let Some(target) = args.get("target").and_then(Value::as_str) else {
                    return Ok(err_result("target is required"));
                };
                let Some(emoji) = args.get("emoji").and_then(Value::as_str) else {
                    return Ok(err_result("emoji is required"));
                };
                let Some(channel) = Self::channel_of(target) else {
                    return Ok(err_result(format!("malformed target: {target}")));
                };
                let adapter = self.registry.get(channel).map_err(McpError::from)?;
                match adapter.react(target, emoji).await {
                    Ok(()) => Ok(ok_result(serde_json::json!({ "target": target }))),
                    Err(e) => Ok(err_result(e.to_string())),
                }
            }
            other => Err(McpError::ToolNotFound(other.to_string())),
        }
    }
}
