//! Per-bot BM25 keyword index, paired with `VectorStore` for the hybrid
//! search score in the design. Tokenizer style follows the corpus's only
//! `bm25`-crate usage (`ploke-db::bm25_index::CodeTokenizer`): a small type
//! implementing `bm25::Tokenizer` by lowercasing and splitting on
//! non-alphanumerics — simplified here since memory content is prose, not
//! source code.

use bm25::{EmbedderBuilder, Scorer, Tokenizer};
use uuid::Uuid;

#[derive(Default, Clone)]
pub struct WordTokenizer;

impl Tokenizer for WordTokenizer {
    fn tokenize(&self, input_text: &str) -> Vec<String> {
        input_text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_lowercase())
        .collect()
    }
}

/// In-memory BM25 index for one bot. Rebuilt lazily from the vector store's
/// records the first time a bot's memory is touched in a process lifetime,
/// then kept incrementally in sync by `upsert`/`remove`.
pub struct Bm25Index {
    embedder: bm25::Embedder<u32, WordTokenizer>,
    scorer: Scorer<Uuid, u32>,
}

impl Bm25Index {
    /// `avgdl` is recomputed from the corpus at build time; a reasonable
    /// estimate is enough for a fresh, empty index.
    pub fn new() -> Self {
        Self::with_avgdl(32.0)
    }

    pub fn with_avgdl(avgdl: f32) -> Self {
        Self {
            embedder: EmbedderBuilder::<u32, WordTokenizer>::with_avgdl(avgdl).build(),
            scorer: Scorer::<Uuid, u32>::new(),
        }
    }

    /// Rebuilds the index from scratch over a bot's full corpus, computing
    /// a fitted `avgdl` the way `ploke_db::bm25_index::new_from_corpus` does.
    pub fn from_corpus(corpus: Vec<(Uuid, String)>) -> Self {
        let total_tokens: usize = corpus
        .iter()
        .map(|(_, text)| WordTokenizer.tokenize(text).len())
        .sum();
        let avgdl = if corpus.is_empty() {
            32.0
        } else {
            total_tokens as f32 / corpus.len() as f32
        };
        let mut index = Self::with_avgdl(avgdl);
        for (id, text) in corpus {
            index.upsert(id, &text);
        }
        index
    }

    pub fn upsert(&mut self, id: Uuid, content: &str) {
        let embedding = self.embedder.embed(content);
        self.scorer.upsert(&id, embedding);
    }

    pub fn remove(&mut self, id: &Uuid) {
        self.scorer.remove(id);
    }

    /// Raw BM25 score for one document against `query`; callers normalise
    /// across the result set themselves before blending with cosine scores.
    pub fn score(&self, id: &Uuid, query: &str) -> f32 {
        let query_embedding = self.embedder.embed(query);
        self.scorer.score(id, &query_embedding).unwrap_or(0.0)
    }
}

impl Default for Bm25Index {
    fn default() -> Self {
        Self::new()
    }
}
