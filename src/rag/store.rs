//! DocumentStore trait — abstract interface for fragment storage backends.
//!
//! Two conforming implementations exist: `MemoryStore` (volatile,
//! process-lifetime) and `SqliteStore` (persistent, with a native FTS5
//! keyword-search capability). Backends differ in how they can rank:
//! the capability flag tells callers which ranking path applies instead
//! of letting the backends silently diverge.

use async_trait::async_trait;

use super::types::Fragment;
use crate::core::errors::RagError;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a fragment with its embedding. Atomic per id; writing an
    /// existing id replaces the whole fragment/embedding pair.
    async fn put(&self, fragment: Fragment, embedding: Vec<f32>) -> Result<(), RagError>;

    /// Fetch a fragment by id.
    async fn get(&self, id: &str) -> Result<Option<Fragment>, RagError>;

    /// All fragment/embedding pairs in insertion order. Insertion order
    /// is load-bearing: it is the ranking tie-breaker.
    async fn all(&self) -> Result<Vec<(Fragment, Vec<f32>)>, RagError>;

    /// Delete every fragment derived from a source record. Returns the
    /// number of fragments removed.
    async fn delete_by_source(&self, source_id: &str) -> Result<usize, RagError>;

    async fn count(&self) -> Result<usize, RagError>;

    /// Whether this backend's fragments can be ranked by cosine
    /// similarity. When false, ranking degrades to `keyword_search`.
    fn supports_vector_search(&self) -> bool;

    /// Native keyword-match capability, best hit first. Only meaningful
    /// for backends that report `supports_vector_search() == false`.
    async fn keyword_search(&self, _query: &str, _limit: usize) -> Result<Vec<Fragment>, RagError> {
        Err(RagError::Unsupported("keyword search"))
    }
}
