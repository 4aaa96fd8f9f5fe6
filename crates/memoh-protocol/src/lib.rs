//! Shared wire types for the agent turn engine and the gateway's SSE
//! endpoints : `AgentEvent`/`TurnInput` (the live turn
//! stream), `MessageStreamEvent` (the persisted-message stream), and the
//! JSON-RPC envelope the MCP tool plane's stdio/HTTP transports share.
//!
//! Kept as its own crate so `memoh-agent` and `memoh-gateway` agree on these
//! shapes without either depending on the other.

pub mod agent_event;
pub mod rpc;
pub mod stream_event;

pub use agent_event::{AgentEvent, AllowedAction, AttachmentRef, TurnInput};
pub use rpc::{ErrorShape, InboundFrame, ReqFrame, ResFrame};
pub use stream_event::{ContentBlock, LegacySseEvent, MessageContent, MessageStreamEvent, MessageView};
