//! `ToolProvider`/`Manager`/`SessionContext`. Grounded on the
//! `ws::dispatch::route` method-name dispatch, generalized from a
//! single flat `match` over two hardcoded tools into an ordered list of
//! providers so external MCP servers configured per bot can be multiplexed
//! alongside the built-in tool families.

use std::sync::Arc;

use async_trait::async_trait;
use memoh_core::types::{BotId, ChannelIdentityId, ChannelName, UserId};
use serde_json::Value;

use crate::error::{McpError, Result};

/// JSON-Schema-described tool signature returned by `list_tools`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// Identity threaded through every tool call. Providers read it to infer
/// defaults — `message.send` defaults `target` to `reply_target` and
/// rejects a caller targeting a different bot's channel identity.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub bot_id: BotId,
    pub current_platform: ChannelName,
    pub reply_target: String,
    pub channel_identity_id: Option<ChannelIdentityId>,
    pub user_id: Option<UserId>,
}

/// Builds `{ok: true, ...}` — every successful tool call per the design.
pub fn ok_result(mut value: Value) -> Value {
    if let Value::Object(ref mut map) = value {
        map.insert("ok".to_string(), Value::Bool(true));
        Value::Object(map.clone())
    } else {
        serde_json::json!({ "ok": true, "value": value })
    }
}

/// Builds `{ok: false, error}` — tool-level failures are returned, not
/// raised, so the calling model can observe and recover.
pub fn err_result(error: impl Into<String>) -> Value {
    serde_json::json!({ "ok": false, "error": error.into() })
}

#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// Stable name used for ordering/diagnostics; not part of the wire
    /// contract (tool *names* are).
    fn provider_name(&self) -> &str;

    /// Whether this provider's tools win a name collision unconditionally,
    /// rather than losing to whichever provider registered first.
    fn authoritative(&self) -> bool {
        false
    }

    async fn list_tools(&self, ctx: &SessionContext) -> Vec<ToolDescriptor>;

    /// Returns `Err(McpError::ToolNotFound)` when this provider doesn't own
    /// `name` — the `Manager` tries the next provider. Any other error
    /// variant is a transport/infrastructure failure; an in-band tool
    /// failure is `Ok(err_result(...))`, never an `Err`.
    async fn call_tool(&self, ctx: &SessionContext, name: &str, args: Value) -> Result<Value>;
}

/// Ordered provider list. `list_tools` concatenates every provider's
/// descriptors; on a name collision the first-registered provider wins
/// unless a later one is `authoritative()`, in which case it overrides.
pub struct Manager {
    providers: Vec<Arc<dyn ToolProvider>>,
}

impl Manager {
    pub fn new() -> Self {
        Self { providers: Vec::new() }
    }

    pub fn register(&mut self, provider: Arc<dyn ToolProvider>) -> &mut Self {
        self.providers.push(provider);
        self
    }

    pub async fn list_tools(&self, ctx: &SessionContext) -> Vec<ToolDescriptor> {
        let mut seen: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
        let mut out: Vec<ToolDescriptor> = Vec::new();
        for (provider_idx, provider) in self.providers.iter().enumerate() {
            for descriptor in provider.list_tools(ctx).await {
                match seen.get(&descriptor.name) {
                    None => {
                        seen.insert(descriptor.name.clone(), provider_idx);
                        out.push(descriptor);
                    }
                    Some(&existing_idx) => {
                        if provider.authoritative() && existing_idx != provider_idx {
                            if let Some(slot) = out.iter_mut().find(|d| d.name == descriptor.name) {
                                *slot = descriptor.clone();
                            }
                            seen.insert(descriptor.name.clone(), provider_idx);
                        }
                        // else: first-wins, drop this duplicate.
                    }
                }
            }
        }
        out
    }

    /// Tries each provider in order; the first one that doesn't answer
    /// `ToolNotFound` handles the call.
    pub async fn call_tool(&self, ctx: &SessionContext, name: &str, args: Value) -> Result<Value> {
        for provider in &self.providers {
            match provider.call_tool(ctx, name, args.clone()).await {
                Err(McpError::ToolNotFound(_)) => continue,
                other => return other,
            }
        }
        Err(McpError::ToolNotFound(name.to_string()))
    }
}

impl Default for Manager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoProvider {
        name: &'static str,
        authoritative: bool,
    }

    #[async_trait]
    impl ToolProvider for EchoProvider {
        fn provider_name(&self) -> &str {
            self.name
        }

        fn authoritative(&self) -> bool {
            self.authoritative
        }

        async fn list_tools(&self, _ctx: &SessionContext) -> Vec<ToolDescriptor> {
            vec![ToolDescriptor::new("echo", self.name, serde_json::json!({}))]
        }

        async fn call_tool(&self, _ctx: &SessionContext, name: &str, args: Value) -> Result<Value> {
            if name != "echo" {
                return Err(McpError::ToolNotFound(name.to_string()));
            }
            Ok(ok_result(serde_json::json!({ "from": self.name, "args": args })))
        }
    }

    fn ctx() -> SessionContext {
        SessionContext {
            bot_id: BotId::new(),
            current_platform: "cli".to_string(),
            reply_target: "cli:local".to_string(),
            channel_identity_id: None,
            user_id: None,
        }
    }

    #[tokio::test]
    async fn first_provider_wins_on_collision_by_default() {
        let mut mgr = Manager::new();
        mgr.register(Arc::new(EchoProvider { name: "first", authoritative: false }));
        mgr.register(Arc::new(EchoProvider { name: "second", authoritative: false }));
        let tools = mgr.list_tools(&ctx()).await;
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].description, "first");
    }

    #[tokio::test]
    async fn authoritative_provider_overrides_first_wins() {
        let mut mgr = Manager::new();
        mgr.register(Arc::new(EchoProvider { name: "first", authoritative: false }));
        mgr.register(Arc::new(EchoProvider { name: "second", authoritative: true }));
        let tools = mgr.list_tools(&ctx()).await;
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].description, "second");
    }

    #[tokio::test]
    async fn call_tool_falls_through_to_next_provider() {
        let mut mgr = Manager::new();
        mgr.register(Arc::new(EchoProvider { name: "first", authoritative: false }));
        let result = mgr.call_tool(&ctx(), "echo", serde_json::json!({"x": 1})).await.unwrap();
        assert_eq!(result["ok"], Value::Bool(true));
    }

    #[tokio::test]
    async fn unknown_tool_across_all_providers_errors() {
        let mgr = Manager::new();
        let err = mgr.call_tool(&ctx(), "nope", Value::Null).await.unwrap_err();
        assert!(matches!(err, McpError::ToolNotFound(_)));
    }
}
