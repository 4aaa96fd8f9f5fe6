use chrono::{DateTime, Utc};
use memoh_core::types::ChannelName;
use serde::{Deserialize, Serialize};

/// The external account that produced an inbound message, pre-resolution.
/// The router turns this into a persisted `ChannelIdentity`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub channel: ChannelName,
    pub external_id: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

/// Adapter's view of the conversation an inbound message arrived in, before
/// the router maps it onto a `Route`. `thread_id` and `conversation_type`
/// are raw platform hints; `thread_id.is_some()` is what decides `kind =
/// thread` in the router's route-resolution step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationRef {
    pub external_conversation_id: String,
    pub thread_id: Option<String>,
    pub conversation_type: Option<String>,
}

/// A message received from an external channel (Telegram, Feishu, WebChat, …).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub channel: ChannelName,

    /// Message body. Adapters hand the router whatever shape their platform
    /// produces (text, attachments, …); `memoh-protocol` defines the typed
    /// content-block shape consumers decode this into.
    pub message: serde_json::Value,

    /// Canonical `<kind>:<id>` string the router should reply to. Produced
    /// by the adapter's `resolve_target`/`normalize_target`.
    pub reply_target: String,

    pub sender: Identity,
    pub conversation: ConversationRef,
    pub received_at: DateTime<Utc>,

    /// Platform-native message id, when the platform assigns one — feeds
    /// the message-idempotency key in `memoh-db::messages::insert`.
    pub external_message_id: Option<String>,

    /// Full raw payload for cases that need extra, adapter-specific fields.
    pub source: Option<serde_json::Value>,
}

/// A message to be delivered to an external channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Canonical `<kind>:<id>` target, as produced by `resolve_target`.
    pub target: String,

    pub content: String,
    pub format: MessageFormat,

    /// Canonical target of the message this one replies to, if any.
    pub reply_to: Option<String>,
}

/// Formatting hint for outbound message content.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageFormat {
    /// Raw text with no special markup.
    #[default]
    PlainText,

    /// Markdown as understood by the target platform.
    Markdown,

    /// HTML markup (supported by Telegram, some web clients).
    Html,
}

/// Runtime connection state of a channel adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
    /// Fully connected and ready to send/receive.
    Connected,

    /// Attempting to establish or re-establish the connection.
    Connecting,

    /// Cleanly disconnected (not an error condition).
    Disconnected,

    /// An unrecoverable (or pre-retry) error occurred.
    Error(String),
}

/// One capability a channel adapter may or may not support. `Channel::send`
/// is always required; the rest are advertised so callers (the router, the
/// MCP `message.react` tool) can check before calling an optional method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelCapability {
    Text,
    RichText,
    Attachments,
    Reply,
    Reactions,
}

/// Immutable set of capabilities a `Channel` advertises, built once at
/// adapter construction. A thin wrapper over a bitmask rather than a
/// `HashSet` — the capability set is small and fixed, so `contains` is a
/// single AND.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelCapabilities(u8);

impl ChannelCapabilities {
    pub const TEXT: ChannelCapabilities = ChannelCapabilities(1 << 0);
    pub const RICHTEXT: ChannelCapabilities = ChannelCapabilities(1 << 1);
    pub const ATTACHMENTS: ChannelCapabilities = ChannelCapabilities(1 << 2);
    pub const REPLY: ChannelCapabilities = ChannelCapabilities(1 << 3);
    pub const REACTIONS: ChannelCapabilities = ChannelCapabilities(1 << 4);

    pub const fn empty() -> Self {
        ChannelCapabilities(0)
    }

    pub const fn union(self, other: Self) -> Self {
        ChannelCapabilities(self.0 | other.0)
    }

    pub fn contains(self, cap: ChannelCapability) -> bool {
        let bit = match cap {
            ChannelCapability::Text => Self::TEXT,
            ChannelCapability::RichText => Self::RICHTEXT,
            ChannelCapability::Attachments => Self::ATTACHMENTS,
            ChannelCapability::Reply => Self::REPLY,
            ChannelCapability::Reactions => Self::REACTIONS,
        };
        self.0 & bit.0 != 0
    }
}

impl std::ops::BitOr for ChannelCapabilities {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}
