use async_trait::async_trait;

/// Text embedder with a fixed output dimension, backed by whichever model
/// a bot has `enable_as = embedding` (the design `Model`). Kept as a port here
/// rather than calling an LLM provider client directly since `memoh-memory`
/// sits below `memoh-agent` in dependency order and must not depend on it.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn dimensions(&self) -> usize;
    async fn embed(&self, text: &str) -> Result<Vec<f32>, String>;
}
