use thiserror::Error;

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("memory record not found: {0}")]
    NotFound(String),

    #[error("vector store error: {0}")]
    VectorStore(String),

    #[error("llm error: {0}")]
    Llm(String),

    #[error("embedder error: {0}")]
    Embedder(String),
}

impl From<MemoryError> for memoh_core::MemohError {
    fn from(err: MemoryError) -> Self {
        match err {
            MemoryError::NotFound(msg) => memoh_core::MemohError::NotFound(msg),
            MemoryError::VectorStore(msg) => memoh_core::MemohError::upstream("memory-vector-store", msg),
            MemoryError::Llm(msg) => memoh_core::MemohError::upstream("memory-llm", msg),
            MemoryError::Embedder(msg) => memoh_core::MemohError::upstream("memory-embedder", msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, MemoryError>;
