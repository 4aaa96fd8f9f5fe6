//! MCP tool plane : an ordered [`provider::Manager`] of
//! [`provider::ToolProvider`]s, exposed over two transports that share one
//! JSON-RPC envelope (`memoh_protocol::rpc`).

pub mod error;
pub mod provider;
pub mod tools;
pub mod transport;

pub use error::{McpError, Result};
pub use provider::{Manager, SessionContext, ToolDescriptor, ToolProvider};
