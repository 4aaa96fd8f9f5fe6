use async_trait::async_trait;

use crate::types::{Decision, ExtractedFact, MemoryRecord, TurnMessage};

/// The memory-capable LLM seam (`LLM {Extract(req)→facts[],
/// Decide(req)→actions[]}`). A concrete implementation lives above this
/// crate (`memoh-agent` drives whichever model a bot designates
/// `enable_as = memory`); `memoh-memory` only needs the two calls.
#[async_trait]
pub trait MemoryLlm: Send + Sync {
    /// Mines candidate facts from a role-tagged turn window. Implementations
    /// should return facts even when the model's own JSON is malformed in
    /// places — callers tolerate an empty or partial result, never a hard
    /// failure, per the noise-tolerance invariant.
    async fn extract(&self, window: &[TurnMessage]) -> Result<Vec<ExtractedFact>, String>;

    /// Chooses one of `ADD|UPDATE(id)|DELETE(id)|NONE` for a candidate fact
    /// given the top-K existing records retrieved for it.
    async fn decide(&self, candidate: &ExtractedFact, existing: &[MemoryRecord]) -> Result<Decision, String>;
}
