use std::collections::HashMap;
use std::sync::Arc;

use crate::channel::Channel;
use crate::error::ChannelError;

/// Process-wide, immutable-after-init `channel_name -> Channel` mapping
///. Built once at gateway startup from [`ChannelRegistryBuilder`]
/// and handed around as `Arc<ChannelRegistry>`; nothing mutates it after
/// that, so it needs no internal locking, unlike [`crate::manager::ChannelManager`]
/// which tracks live connections over time.
pub struct ChannelRegistry {
    channels: HashMap<String, Arc<dyn Channel>>,
}

impl ChannelRegistry {
    pub fn builder() -> ChannelRegistryBuilder {
        ChannelRegistryBuilder::default()
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Channel>, ChannelError> {
        self.channels
        .get(name)
        .cloned()
        .ok_or_else(|| ChannelError::Unsupported(name.to_string()))
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.channels.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn Channel>)> {
        self.channels.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[derive(Default)]
pub struct ChannelRegistryBuilder {
    channels: HashMap<String, Arc<dyn Channel>>,
}

impl ChannelRegistryBuilder {
    pub fn register(mut self, channel: Arc<dyn Channel>) -> Self {
        self.channels.insert(channel.name().to_string(), channel);
        self
    }

    pub fn build(self) -> ChannelRegistry {
        ChannelRegistry {
            channels: self.channels,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::InboundHandler;
    use crate::connection::Connection;
    use crate::types::{ChannelCapabilities, Identity, InboundMessage, OutboundMessage};
    use async_trait::async_trait;
    use tokio_util::sync::CancellationToken;

    struct Stub;

    #[async_trait]
    impl Channel for Stub {
        fn name(&self) -> &str {
            "stub"
        }
        fn capabilities(&self) -> ChannelCapabilities {
            ChannelCapabilities::TEXT
        }
        fn normalize_config(&self, raw: serde_json::Value) -> Result<serde_json::Value, ChannelError> {
            Ok(raw)
        }
        fn normalize_user_config(&self, raw: serde_json::Value) -> Result<serde_json::Value, ChannelError> {
            Ok(raw)
        }
        fn resolve_target(&self, raw: &str) -> String {
            format!("stub:{raw}")
        }
        fn match_binding(&self, _binding: &serde_json::Value, _identity: &Identity) -> bool {
            false
        }
        async fn connect(
            &self,
            _config: serde_json::Value,
            _handler: std::sync::Arc<dyn InboundHandler>,
        ) -> Result<Connection, ChannelError> {
            let token = CancellationToken::new();
            let task = tokio::spawn(async {});
            Ok(Connection::new(token, task))
        }
        async fn send(&self, _msg: &OutboundMessage) -> Result<(), ChannelError> {
            Ok(())
        }
    }

    #[test]
    fn unknown_channel_is_unsupported() {
        let registry = ChannelRegistry::builder().build();
        assert!(matches!(
                registry.get("nope"),
                Err(ChannelError::Unsupported(_))
        ));
    }

    #[test]
    fn registered_channel_is_found_by_name() {
        let registry = ChannelRegistry::builder()
        .register(Arc::new(Stub))
        .build();
        assert!(registry.get("stub").is_ok());
        assert_eq!(registry.names(), vec!["stub"]);
    }

    #[test]
    fn target_normalization_is_a_retract() {
        let stub = Stub;
        let once = stub.normalize_target("42");
        let twice = stub.normalize_target(&once);
        assert_eq!(once, twice);
    }
}
