//! Similarity ranking over a document store.
//!
//! Pure functions of their inputs: no caches, no state between calls.
//! Candidates are filtered before any similarity is computed, so ranking
//! cost is never spent on excluded fragments.

use super::store::DocumentStore;
use super::types::{Fragment, SearchOptions, SearchResult};
use crate::core::errors::RagError;

/// Cosine similarity in [-1, 1]. A zero-magnitude vector on either side
/// yields 0. Length mismatch is store corruption or a model-version
/// change and fails loudly.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32, RagError> {
    if a.len() != b.len() {
        return Err(RagError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }
    if a.is_empty() {
        return Ok(0.0);
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    let denom = norm_a * norm_b;

    if denom <= f32::EPSILON {
        Ok(0.0)
    } else {
        Ok((dot / denom).clamp(-1.0, 1.0))
    }
}

fn passes_filters(fragment: &Fragment, options: &SearchOptions) -> bool {
    if let Some(allowed) = &options.source_types {
        if !allowed.contains(&fragment.source_type) {
            return false;
        }
    }
    if let Some(library) = &options.library {
        if fragment.library() != Some(library.as_str()) {
            return false;
        }
    }
    true
}

/// Rank the store's fragments against a query embedding: filter, score,
/// threshold, then cut to `top_k`. Descending by similarity; ties keep
/// insertion order (the sort is stable over store order), so identical
/// inputs always produce identical output.
pub async fn top_k(
    store: &dyn DocumentStore,
    query_embedding: &[f32],
    options: &SearchOptions,
) -> Result<Vec<SearchResult>, RagError> {
    let mut scored = Vec::new();
    for (fragment, embedding) in store.all().await? {
        if !passes_filters(&fragment, options) {
            continue;
        }
        let similarity = cosine_similarity(query_embedding, &embedding)?;
        if similarity < options.min_similarity {
            continue;
        }
        scored.push(SearchResult {
            fragment,
            similarity: Some(similarity),
        });
    }

    scored.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(options.top_k);

    Ok(scored)
}

/// Degraded ranking for stores without vector capability: delegate to the
/// store's native keyword match and synthesize results without a numeric
/// similarity. Rank is keyword order.
pub async fn keyword_top_k(
    store: &dyn DocumentStore,
    query: &str,
    options: &SearchOptions,
) -> Result<Vec<SearchResult>, RagError> {
    // Overfetch so post-filtering can still fill the requested K.
    let hits = store
        .keyword_search(query, options.top_k.saturating_mul(2))
        .await?;

    let mut results: Vec<SearchResult> = hits
        .into_iter()
        .filter(|fragment| passes_filters(fragment, options))
        .map(|fragment| SearchResult {
            fragment,
            similarity: None,
        })
        .collect();
    results.truncate(options.top_k);

    Ok(results)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::rag::memory::MemoryStore;
    use crate::rag::types::SourceType;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    fn fragment(id: &str, source_type: SourceType, library: Option<&str>) -> Fragment {
        Fragment {
            id: id.to_string(),
            source_type,
            source_id: format!("src-{id}"),
            text: format!("text for {id}"),
            chunk_index: 0,
            metadata: library.map(|l| json!({ "library": l })),
        }
    }

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = vec![1.0, 2.0, 3.0, 4.0];
        assert!(approx(cosine_similarity(&v, &v).unwrap(), 1.0));
    }

    #[test]
    fn cosine_is_symmetric() {
        let a = vec![0.3, -0.7, 1.1];
        let b = vec![0.9, 0.1, -0.4];
        assert!(approx(
            cosine_similarity(&a, &b).unwrap(),
            cosine_similarity(&b, &a).unwrap()
        ));
    }

    #[test]
    fn zero_magnitude_yields_zero_not_nan() {
        let zero = vec![0.0, 0.0];
        let v = vec![1.0, 2.0];
        let score = cosine_similarity(&zero, &v).unwrap();
        assert!(approx(score, 0.0));
        assert!(!score.is_nan());
    }

    #[test]
    fn length_mismatch_is_a_hard_error() {
        let result = cosine_similarity(&[1.0, 2.0], &[1.0]);
        assert!(matches!(
            result,
            Err(RagError::DimensionMismatch { expected: 2, actual: 1 })
        ));
    }

    async fn seeded_store() -> MemoryStore {
        let store = MemoryStore::new();
        // Orthogonal-ish vectors with known similarity to the query [1, 0].
        let rows: Vec<(&str, Vec<f32>)> = vec![
            ("a", vec![1.0, 0.0]),  // similarity 1.0
            ("b", vec![1.0, 1.0]),  // ~0.707
            ("c", vec![0.0, 1.0]),  // 0.0
            ("d", vec![1.0, 1.0]),  // ~0.707, ties with b
        ];
        for (id, embedding) in rows {
            store
                .put(fragment(id, SourceType::Message, None), embedding)
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn results_descend_with_ties_in_insertion_order() {
        let store = seeded_store().await;
        let options = SearchOptions {
            top_k: 10,
            min_similarity: 0.0,
            ..SearchOptions::default()
        };

        let results = top_k(&store, &[1.0, 0.0], &options).await.unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.fragment.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "d", "c"]);

        for pair in results.windows(2) {
            assert!(pair[0].similarity.unwrap() >= pair[1].similarity.unwrap());
        }
    }

    #[tokio::test]
    async fn threshold_drops_candidates_before_the_cut() {
        let store = seeded_store().await;
        let options = SearchOptions {
            top_k: 10,
            min_similarity: 0.5,
            ..SearchOptions::default()
        };

        let results = top_k(&store, &[1.0, 0.0], &options).await.unwrap();
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.similarity.unwrap() >= 0.5));
    }

    #[tokio::test]
    async fn returns_at_most_min_of_k_and_store_size() {
        let store = seeded_store().await;
        let options = SearchOptions {
            top_k: 2,
            min_similarity: -1.0,
            ..SearchOptions::default()
        };
        let results = top_k(&store, &[1.0, 0.0], &options).await.unwrap();
        assert_eq!(results.len(), 2);

        let wide = SearchOptions {
            top_k: 50,
            min_similarity: -1.0,
            ..SearchOptions::default()
        };
        let results = top_k(&store, &[1.0, 0.0], &wide).await.unwrap();
        assert_eq!(results.len(), 4);
    }

    #[tokio::test]
    async fn source_type_and_library_filters_apply_before_ranking() {
        let store = MemoryStore::new();
        store
            .put(fragment("m", SourceType::Message, None), vec![1.0, 0.0])
            .await
            .unwrap();
        store
            .put(
                fragment("s", SourceType::Snippet, Some("three.js")),
                vec![1.0, 0.0],
            )
            .await
            .unwrap();
        store
            .put(
                fragment("t", SourceType::Snippet, Some("cannon-es")),
                vec![1.0, 0.0],
            )
            .await
            .unwrap();

        let options = SearchOptions {
            top_k: 10,
            min_similarity: 0.0,
            library: Some("three.js".to_string()),
            source_types: Some(vec![SourceType::Snippet]),
        };
        let results = top_k(&store, &[1.0, 0.0], &options).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].fragment.id, "s");
    }

    #[tokio::test]
    async fn stored_dimension_mismatch_propagates() {
        let store = seeded_store().await;
        let options = SearchOptions::default();
        let result = top_k(&store, &[1.0, 0.0, 0.0], &options).await;
        assert!(matches!(result, Err(RagError::DimensionMismatch { .. })));
    }

    #[tokio::test]
    async fn keyword_path_synthesizes_results_without_similarity() {
        struct KeywordStore;

        #[async_trait::async_trait]
        impl DocumentStore for KeywordStore {
            async fn put(&self, _: Fragment, _: Vec<f32>) -> Result<(), RagError> {
                Ok(())
            }
            async fn get(&self, _: &str) -> Result<Option<Fragment>, RagError> {
                Ok(None)
            }
            async fn all(&self) -> Result<Vec<(Fragment, Vec<f32>)>, RagError> {
                Ok(Vec::new())
            }
            async fn delete_by_source(&self, _: &str) -> Result<usize, RagError> {
                Ok(0)
            }
            async fn count(&self) -> Result<usize, RagError> {
                Ok(2)
            }
            fn supports_vector_search(&self) -> bool {
                false
            }
            async fn keyword_search(
                &self,
                _query: &str,
                _limit: usize,
            ) -> Result<Vec<Fragment>, RagError> {
                Ok(vec![
                    fragment("k1", SourceType::Message, None),
                    fragment("k2", SourceType::Snippet, None),
                ])
            }
        }

        let options = SearchOptions {
            top_k: 10,
            source_types: Some(vec![SourceType::Message]),
            ..SearchOptions::default()
        };
        let results = keyword_top_k(&KeywordStore, "anything", &options).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].fragment.id, "k1");
        assert!(results[0].similarity.is_none());
    }
}
