pub mod channel;
pub mod connection;
pub mod error;
pub mod manager;
pub mod registry;
pub mod types;

pub use channel::{Channel, InboundHandler};
pub use connection::Connection;
pub use error::ChannelError;
pub use manager::ChannelManager;
pub use registry::{ChannelRegistry, ChannelRegistryBuilder};
pub use types::{
    ChannelCapabilities, ChannelCapability, ChannelStatus, ConversationRef, Identity,
    InboundMessage, MessageFormat, OutboundMessage,
};
