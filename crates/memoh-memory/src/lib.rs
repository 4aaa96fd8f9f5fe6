//! Memory Engine : fact extraction, ADD/UPDATE/DELETE/NONE
//! reconciliation, and hybrid vector+keyword retrieval, shared across all
//! bots in one process.

pub mod bm25_index;
pub mod embed;
pub mod error;
pub mod llm;
pub mod manager;
pub mod types;
pub mod vector;

pub use embed::Embedder;
pub use error::{MemoryError, Result};
pub use llm::MemoryLlm;
pub use manager::MemoryEngine;
pub use types::{Decision, ExtractedFact, MemoryHit, MemoryMetadata, MemoryRecord, SearchFilter, TurnMessage};
pub use vector::{QdrantStore, VectorStore, COLLECTION};
