//! In-process fragment store.
//!
//! Volatile, process-lifetime storage used by the embedded (browser-side)
//! build. Insertion order is preserved because ranking uses it to break
//! similarity ties.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::store::DocumentStore;
use super::types::Fragment;
use crate::core::errors::RagError;

#[derive(Default)]
struct MemoryInner {
    /// Insertion-ordered rows; replacing an id keeps its original slot.
    rows: Vec<(Fragment, Vec<f32>)>,
    index: HashMap<String, usize>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn put(&self, fragment: Fragment, embedding: Vec<f32>) -> Result<(), RagError> {
        let mut inner = self.inner.write().await;

        // Dimensionality is uniform per store; the first insert fixes it.
        if let Some((_, existing)) = inner.rows.first() {
            if existing.len() != embedding.len() {
                return Err(RagError::DimensionMismatch {
                    expected: existing.len(),
                    actual: embedding.len(),
                });
            }
        }

        match inner.index.get(&fragment.id).copied() {
            Some(slot) => inner.rows[slot] = (fragment, embedding),
            None => {
                let slot = inner.rows.len();
                inner.index.insert(fragment.id.clone(), slot);
                inner.rows.push((fragment, embedding));
            }
        }
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Fragment>, RagError> {
        let inner = self.inner.read().await;
        Ok(inner
            .index
            .get(id)
            .map(|slot| inner.rows[*slot].0.clone()))
    }

    async fn all(&self) -> Result<Vec<(Fragment, Vec<f32>)>, RagError> {
        let inner = self.inner.read().await;
        Ok(inner.rows.clone())
    }

    async fn delete_by_source(&self, source_id: &str) -> Result<usize, RagError> {
        let mut inner = self.inner.write().await;
        let before = inner.rows.len();
        inner.rows.retain(|(fragment, _)| fragment.source_id != source_id);

        let index: HashMap<String, usize> = inner
            .rows
            .iter()
            .enumerate()
            .map(|(slot, (fragment, _))| (fragment.id.clone(), slot))
            .collect();
        inner.index = index;

        Ok(before - inner.rows.len())
    }

    async fn count(&self) -> Result<usize, RagError> {
        Ok(self.inner.read().await.rows.len())
    }

    fn supports_vector_search(&self) -> bool {
        true
    }
}
