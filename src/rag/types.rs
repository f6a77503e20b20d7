//! Data model for the retrieval subsystem.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::core::config::{DEFAULT_MIN_SIMILARITY, DEFAULT_TOP_K, MAX_CONTEXT_CHARS};

/// Provenance tag of a stored fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Message,
    Conversation,
    Snippet,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Message => "message",
            SourceType::Conversation => "conversation",
            SourceType::Snippet => "snippet",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "message" => Some(SourceType::Message),
            "conversation" => Some(SourceType::Conversation),
            "snippet" => Some(SourceType::Snippet),
            _ => None,
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The unit of retrieval. Immutable once stored; re-indexing replaces the
/// whole fragment/embedding pair rather than mutating in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fragment {
    /// Opaque unique id, assigned at index time.
    pub id: String,
    pub source_type: SourceType,
    /// Id of the originating record (message, conversation, snippet).
    pub source_id: String,
    pub text: String,
    /// Offset within a multi-chunk source. Producers currently always
    /// write 0; the field is carried for forward compatibility.
    pub chunk_index: u32,
    /// Open map of auxiliary facts (`role`, `library`, ...). Used for
    /// filtering and display only, never for ranking.
    pub metadata: Option<Value>,
}

impl Fragment {
    fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.as_ref()?.get(key)?.as_str()
    }

    pub fn role(&self) -> Option<&str> {
        self.metadata_str("role")
    }

    pub fn library(&self) -> Option<&str> {
        self.metadata_str("library")
    }
}

/// What the chat subsystem hands to `index_fragment`.
#[derive(Debug, Clone)]
pub struct FragmentSource {
    /// Id of the originating record.
    pub id: String,
    pub text: String,
    pub source_type: SourceType,
    pub role: Option<String>,
    pub conversation_id: Option<String>,
    pub library: Option<String>,
}

impl FragmentSource {
    pub fn message(id: &str, text: &str, role: &str, conversation_id: &str) -> Self {
        Self {
            id: id.to_string(),
            text: text.to_string(),
            source_type: SourceType::Message,
            role: Some(role.to_string()),
            conversation_id: Some(conversation_id.to_string()),
            library: None,
        }
    }

    pub fn snippet(id: &str, text: &str, library: Option<&str>) -> Self {
        Self {
            id: id.to_string(),
            text: text.to_string(),
            source_type: SourceType::Snippet,
            role: None,
            conversation_id: None,
            library: library.map(str::to_string),
        }
    }

    pub(crate) fn metadata(&self) -> Option<Value> {
        let mut map = serde_json::Map::new();
        if let Some(role) = &self.role {
            map.insert("role".to_string(), json!(role));
        }
        if let Some(conversation_id) = &self.conversation_id {
            map.insert("conversation_id".to_string(), json!(conversation_id));
        }
        if let Some(library) = &self.library {
            map.insert("library".to_string(), json!(library));
        }
        if map.is_empty() {
            None
        } else {
            Some(Value::Object(map))
        }
    }
}

/// A ranked hit. `similarity` is `None` on the keyword-ranked path, where
/// rank is keyword order rather than cosine. Never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub fragment: Fragment,
    pub similarity: Option<f32>,
}

/// Knobs accepted by `search`.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub top_k: usize,
    pub min_similarity: f32,
    /// Keep only fragments whose `metadata.library` equals this value.
    pub library: Option<String>,
    /// Allow-list of provenance tags; `None` admits everything.
    pub source_types: Option<Vec<SourceType>>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            min_similarity: DEFAULT_MIN_SIMILARITY,
            library: None,
            source_types: None,
        }
    }
}

/// Knobs accepted by `build_context`.
#[derive(Debug, Clone)]
pub struct ContextOptions {
    pub max_chars: usize,
    pub include_metadata: bool,
    pub search: SearchOptions,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            max_chars: MAX_CONTEXT_CHARS,
            include_metadata: true,
            search: SearchOptions::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_source_builds_metadata_map() {
        let source = FragmentSource::message("m1", "some text", "user", "c1");
        let metadata = source.metadata().unwrap();
        assert_eq!(metadata["role"], json!("user"));
        assert_eq!(metadata["conversation_id"], json!("c1"));
        assert!(metadata.get("library").is_none());
    }

    #[test]
    fn snippet_without_library_has_no_metadata() {
        let source = FragmentSource::snippet("s1", "some text", None);
        assert!(source.metadata().is_none());
    }

    #[test]
    fn source_type_round_trips_through_strings() {
        for ty in [SourceType::Message, SourceType::Conversation, SourceType::Snippet] {
            assert_eq!(SourceType::parse(ty.as_str()), Some(ty));
        }
        assert_eq!(SourceType::parse("widget"), None);
    }
}
