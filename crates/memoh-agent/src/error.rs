use thiserror::Error;

use crate::provider::ProviderError;

/// Errors raised by the turn engine itself — model/provider resolution,
/// the step-cap abort, cancellation. A tool call failing is never one of
/// these; it surfaces as a `tool_call_end` event carrying the tool's own
/// `{ok:false, error}` payload.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("unsupported client_type: {0}")]
    UnsupportedClientType(String),

    #[error("model not found: {0}")]
    ModelNotFound(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Db(#[from] memoh_db::DbError),

    #[error(transparent)]
    Memory(#[from] memoh_memory::MemoryError),

    #[error("step limit")]
    StepLimit,

    #[error("cancelled")]
    Cancelled,
}

impl From<AgentError> for memoh_core::MemohError {
    fn from(err: AgentError) -> Self {
        match err {
            AgentError::UnsupportedClientType(m) => memoh_core::MemohError::Validation(m),
            AgentError::ModelNotFound(m) => memoh_core::MemohError::NotFound(m),
            AgentError::Provider(e) => memoh_core::MemohError::upstream("llm-provider", e.to_string()),
            AgentError::Db(e) => e.into(),
            AgentError::Memory(e) => e.into(),
            AgentError::StepLimit => memoh_core::MemohError::Internal("step limit".into()),
            AgentError::Cancelled => memoh_core::MemohError::Cancelled,
        }
    }
}

pub type Result<T> = std::result::Result<T, AgentError>;
