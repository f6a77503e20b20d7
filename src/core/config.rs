//! Settings and policy constants for the retrieval subsystem.
//!
//! The thresholds below are policy, not derived values. They are named
//! here so they can be tuned and tested independently of the algorithm
//! code that consumes them.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::errors::RagError;

/// Vector length produced by the default embedding model.
pub const EMBEDDING_DIMENSIONS: usize = 768;
/// Sources shorter than this are not worth the embedding cost.
pub const MIN_INDEX_CHARS: usize = 50;
/// Per-entry ceiling applied before context budget accounting.
pub const MAX_ENTRY_CHARS: usize = 1_500;
/// Embedding input ceiling; longer text is truncated before submission.
pub const MAX_EMBED_INPUT_CHARS: usize = 30_000;
/// Overall context budget handed to the prompt builder.
pub const MAX_CONTEXT_CHARS: usize = 12_000;
/// Provider batch size for `embed_batch`.
pub const EMBED_BATCH_SIZE: usize = 8;
/// Courtesy pause between provider batches.
pub const EMBED_BATCH_DELAY_MS: u64 = 100;
/// Candidates scoring below this are dropped before the top-K cut.
pub const DEFAULT_MIN_SIMILARITY: f32 = 0.3;
pub const DEFAULT_TOP_K: usize = 5;

/// Connection details and request shaping for the embedding provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Base URL up to and including the API version segment.
    pub base_url: String,
    pub model: String,
    pub dimensions: usize,
    pub max_input_chars: usize,
    pub batch_size: usize,
    /// Zero disables the inter-batch pause (used by tests).
    pub batch_delay_ms: u64,
    pub timeout_secs: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta/openai".to_string(),
            model: "text-embedding-004".to_string(),
            dimensions: EMBEDDING_DIMENSIONS,
            max_input_chars: MAX_EMBED_INPUT_CHARS,
            batch_size: EMBED_BATCH_SIZE,
            batch_delay_ms: EMBED_BATCH_DELAY_MS,
            timeout_secs: 30,
        }
    }
}

/// Shaping of the assembled context block.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextSettings {
    pub max_chars: usize,
    pub max_entry_chars: usize,
    pub include_metadata: bool,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            max_chars: MAX_CONTEXT_CHARS,
            max_entry_chars: MAX_ENTRY_CHARS,
            include_metadata: true,
        }
    }
}

/// Top-level settings for the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagSettings {
    pub min_index_chars: usize,
    pub min_similarity: f32,
    pub top_k: usize,
    pub embedding: EmbeddingSettings,
    pub context: ContextSettings,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            min_index_chars: MIN_INDEX_CHARS,
            min_similarity: DEFAULT_MIN_SIMILARITY,
            top_k: DEFAULT_TOP_K,
            embedding: EmbeddingSettings::default(),
            context: ContextSettings::default(),
        }
    }
}

impl RagSettings {
    /// Load settings from a YAML file; absent keys fall back to defaults.
    pub fn load(path: &Path) -> Result<Self, RagError> {
        let raw = fs::read_to_string(path)
            .map_err(|err| RagError::InvalidInput(format!("{}: {err}", path.display())))?;
        serde_yaml::from_str(&raw)
            .map_err(|err| RagError::InvalidInput(format!("{}: {err}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_carry_policy_constants() {
        let settings = RagSettings::default();
        assert_eq!(settings.min_index_chars, 50);
        assert_eq!(settings.context.max_entry_chars, 1_500);
        assert_eq!(settings.embedding.max_input_chars, 30_000);
        assert_eq!(settings.context.max_chars, 12_000);
        assert_eq!(settings.embedding.batch_size, 8);
        assert!((settings.min_similarity - 0.3).abs() < f32::EPSILON);
    }

    #[test]
    fn partial_yaml_overrides_keep_defaults_elsewhere() {
        let parsed: RagSettings =
            serde_yaml::from_str("top_k: 8\nembedding:\n  batch_delay_ms: 0\n").unwrap();
        assert_eq!(parsed.top_k, 8);
        assert_eq!(parsed.embedding.batch_delay_ms, 0);
        assert_eq!(parsed.embedding.batch_size, 8);
        assert_eq!(parsed.min_index_chars, 50);
    }
}
