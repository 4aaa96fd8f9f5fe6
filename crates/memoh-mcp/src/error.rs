use thiserror::Error;

/// Errors raised by the tool plane itself (registry lookups, transports).
/// Per the design, a tool *call* failing never raises this — it comes back
/// as `{ok: false, error: ...}` inside [`crate::provider::ToolResult`].
/// This type is for the surrounding machinery: an unknown tool name, a
/// malformed JSON-RPC envelope, a transport-level failure.
#[derive(Debug, Error)]
pub enum McpError {
    #[error("tool not found: {0}")]
    ToolNotFound(String),

    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error(transparent)]
    Container(#[from] memoh_container::ContainerError),

    #[error(transparent)]
    Channel(#[from] memoh_channels::error::ChannelError),
}

impl From<McpError> for memoh_core::MemohError {
    fn from(err: McpError) -> Self {
        match err {
            McpError::ToolNotFound(msg) => memoh_core::MemohError::NotFound(msg),
            McpError::InvalidArgs(msg) => memoh_core::MemohError::Validation(msg),
            McpError::Transport(msg) => memoh_core::MemohError::upstream("mcp-transport", msg),
            McpError::Container(e) => e.into(),
            McpError::Channel(e) => memoh_core::MemohError::upstream("channel", e.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, McpError>;
