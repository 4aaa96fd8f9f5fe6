use async_trait::async_trait;
use serde_json::Value;

use crate::{
    connection::Connection,
    error::ChannelError,
    types::{ChannelCapabilities, Identity, InboundMessage, OutboundMessage},
};

/// Delivers inbound messages from a connected adapter to the router.
/// Adapters hold an `Arc<dyn InboundHandler>` and call `handle` once per
/// message received; they must not serialise calls behind a global mutex
/// — concurrent handler invocations are expected.
#[async_trait]
pub trait InboundHandler: Send + Sync {
    async fn handle(&self, msg: InboundMessage);
}

#[async_trait]
impl<F> InboundHandler for F
where
F: Fn(InboundMessage) -> futures_util::future::BoxFuture<'static, ()> + Send + Sync,
{
    async fn handle(&self, msg: InboundMessage) {
        (self)(msg).await
    }
}

/// Capability set implemented by every channel adapter (Telegram, Feishu,
/// WebChat, CLI, …): `connect`, `send`, optional `react`/`discover_self`,
/// config normalisation, and target resolution. A `Channel` is stateless
/// and `Send + Sync` — all per-connection state lives behind the
/// [`Connection`] handle `connect` returns, so one `Channel` instance can
/// serve many concurrent connections (the web channel needs this: one
/// adapter, one connection per browser tab).
#[async_trait]
pub trait Channel: Send + Sync {
    /// Stable lowercase identifier for this channel (e.g. `"telegram"`).
    /// Used as the key inside [`ChannelRegistry`](crate::registry::ChannelRegistry)
    /// and must be unique across all registered adapters.
    fn name(&self) -> &str;

    /// Capabilities this adapter actually implements; callers check this
    /// before invoking `react`/`discover_self` or asking for rich text.
    fn capabilities(&self) -> ChannelCapabilities;

    /// Validates and fills in defaults for bot-facing credentials (e.g. a
    /// bot token). Called once when a bot's channel config is saved.
    fn normalize_config(&self, raw: Value) -> Result<Value, ChannelError>;

    /// Validates and fills in defaults for a user-facing binding (e.g.
    /// "link my Telegram account"). Called when a user submits one.
    fn normalize_user_config(&self, raw: Value) -> Result<Value, ChannelError>;

    /// Maps a platform-native identifier (chat id, user id, …) onto this
    /// adapter's canonical `<kind>:<id>` target string.
    fn resolve_target(&self, raw: &str) -> String;

    /// Canonicalises a target that may already be in canonical form — a
    /// retract: `normalize_target(normalize_target(x)) == normalize_target(x)`.
    /// Defaults to `resolve_target`, which satisfies the law as long as
    /// `resolve_target` itself is idempotent on its own output (true for
    /// every adapter in this workspace: none of them nest the `<kind>:`
    /// prefix).
    fn normalize_target(&self, raw: &str) -> String {
        self.resolve_target(raw)
    }

    /// True when `identity` satisfies a user-facing binding config
    /// previously produced by `normalize_user_config` (e.g. "does this
    /// Telegram user id match the one the user linked?").
    fn match_binding(&self, binding: &Value, identity: &Identity) -> bool;

    /// Starts a long-lived subscription and delivers each inbound message
    /// to `handler`. The returned [`Connection`]'s `stop()` cancels the
    /// adapter's own `CancellationToken` and waits (bounded) for in-flight
    /// handler calls to return.
    async fn connect(
        &self,
        config: Value,
        handler: std::sync::Arc<dyn InboundHandler>,
    ) -> Result<Connection, ChannelError>;

    /// Deliver a single outbound message to the channel. `&self` (not
    /// `&mut self`) so concurrent sends never need to serialise on a
    /// mutable borrow.
    async fn send(&self, msg: &OutboundMessage) -> Result<(), ChannelError>;

    /// Attach a reaction to a previously sent/received message, if the
    /// adapter advertises [`ChannelCapability::Reactions`](crate::types::ChannelCapability::Reactions).
    async fn react(&self, _target: &str, _emoji: &str) -> Result<(), ChannelError> {
        Err(ChannelError::CapabilityMissing(format!(
                    "{} does not support react",
                    self.name()
        )))
    }

    /// Best-effort self-description (bot username, display name, …) used
    /// by `message.send` to avoid a bot replying to its own messages.
    async fn discover_self(&self) -> Result<Identity, ChannelError> {
        Err(ChannelError::CapabilityMissing(format!(
                    "{} does not support discover_self",
                    self.name()
        )))
    }
}
