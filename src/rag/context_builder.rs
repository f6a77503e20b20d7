//! Context assembly.
//!
//! Turns ranked results into a single bounded string for prompt
//! injection. Entries are rendered in the rank order given, each capped
//! to a per-entry ceiling so one long fragment cannot starve the rest,
//! and appended whole-or-not-at-all against the overall budget.

use super::types::SearchResult;
use crate::core::config::ContextSettings;

const ENTRY_SEPARATOR: &str = "\n\n";

#[derive(Default)]
pub struct ContextAssembler {
    settings: ContextSettings,
}

impl ContextAssembler {
    pub fn new(settings: ContextSettings) -> Self {
        Self { settings }
    }

    /// Assemble ranked results into a context block of at most
    /// `max_chars` characters. The first entry that would overflow the
    /// budget stops assembly; later entries are dropped, never split.
    /// Empty input, or a budget too small for even one entry, yields the
    /// empty string.
    pub fn assemble(
        &self,
        results: &[SearchResult],
        max_chars: usize,
        include_metadata: bool,
    ) -> String {
        let mut out = String::new();
        let mut used = 0usize;

        for (i, result) in results.iter().enumerate() {
            let entry = self.render_entry(i + 1, result, include_metadata);
            let entry_chars = entry.chars().count();
            let needed = entry_chars + if out.is_empty() { 0 } else { ENTRY_SEPARATOR.len() };

            if used + needed > max_chars {
                break;
            }
            if !out.is_empty() {
                out.push_str(ENTRY_SEPARATOR);
            }
            out.push_str(&entry);
            used += needed;
        }

        out
    }

    /// Render one entry. The annotation format is stable; snapshot tests
    /// rely on it.
    fn render_entry(&self, position: usize, result: &SearchResult, include_metadata: bool) -> String {
        let text = truncate_entry(&result.fragment.text, self.settings.max_entry_chars);
        if !include_metadata {
            return text.into_owned();
        }

        let mut tags: Vec<String> = Vec::new();
        if let Some(role) = result.fragment.role() {
            tags.push(format!("role: {role}"));
        }
        if let Some(library) = result.fragment.library() {
            tags.push(format!("library: {library}"));
        }
        if let Some(similarity) = result.similarity {
            tags.push(format!("relevance: {:.0}%", similarity * 100.0));
        }

        if tags.is_empty() {
            format!("[{position}]\n{text}")
        } else {
            format!("[{position}] ({})\n{text}", tags.join(", "))
        }
    }
}

/// Cap an entry's text, ellipsis marker included in the cap.
fn truncate_entry(text: &str, max_chars: usize) -> std::borrow::Cow<'_, str> {
    if text.chars().count() <= max_chars {
        std::borrow::Cow::Borrowed(text)
    } else {
        let mut truncated: String = text.chars().take(max_chars.saturating_sub(1)).collect();
        truncated.push('…');
        std::borrow::Cow::Owned(truncated)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::rag::types::{Fragment, SourceType};

    fn result(text: &str, similarity: Option<f32>, metadata: Option<serde_json::Value>) -> SearchResult {
        SearchResult {
            fragment: Fragment {
                id: "f".to_string(),
                source_type: SourceType::Message,
                source_id: "m".to_string(),
                text: text.to_string(),
                chunk_index: 0,
                metadata,
            },
            similarity,
        }
    }

    #[test]
    fn empty_inputs_yield_empty_string() {
        let assembler = ContextAssembler::default();
        assert_eq!(assembler.assemble(&[], 1000, false), "");
        assert_eq!(
            assembler.assemble(&[result("some text", Some(0.9), None)], 0, false),
            ""
        );
    }

    #[test]
    fn output_never_exceeds_budget_and_drops_whole_entries() {
        let assembler = ContextAssembler::default();
        let results = vec![
            result(&"a".repeat(40), None, None),
            result(&"b".repeat(40), None, None),
        ];

        let out = assembler.assemble(&results, 50, false);
        assert_eq!(out.chars().count(), 40);
        assert!(out.starts_with('a'));
        assert!(!out.contains('b'));
    }

    #[test]
    fn lower_ranked_entries_after_first_overflow_are_dropped() {
        let assembler = ContextAssembler::default();
        let results = vec![
            result(&"a".repeat(30), None, None),
            result(&"b".repeat(100), None, None),
            result(&"c".repeat(30), None, None),
        ];

        // The second entry overflows a 70-char budget and stops assembly;
        // the third is not considered even though it would fit.
        let out = assembler.assemble(&results, 70, false);
        assert_eq!(out, "a".repeat(30));
    }

    #[test]
    fn per_entry_cap_applies_before_budget_accounting() {
        let assembler = ContextAssembler::new(ContextSettings {
            max_entry_chars: 10,
            ..ContextSettings::default()
        });
        let results = vec![result(&"x".repeat(500), None, None)];

        let out = assembler.assemble(&results, 1000, false);
        assert_eq!(out.chars().count(), 10);
        assert!(out.ends_with('…'));
        assert_eq!(out, format!("{}…", "x".repeat(9)));
    }

    #[test]
    fn annotation_format_is_stable() {
        let assembler = ContextAssembler::default();
        let results = vec![
            result(
                "Rotate the cube each frame.",
                Some(0.87),
                Some(json!({ "role": "assistant" })),
            ),
            result("Second entry.", None, None),
        ];

        let out = assembler.assemble(&results, 10_000, true);
        assert_eq!(
            out,
            "[1] (role: assistant, relevance: 87%)\nRotate the cube each frame.\n\n[2]\nSecond entry."
        );
    }

    #[test]
    fn snippet_library_is_annotated() {
        let assembler = ContextAssembler::default();
        let mut r = result(
            "Import the library first.",
            Some(0.5),
            Some(json!({ "library": "three.js" })),
        );
        r.fragment.source_type = SourceType::Snippet;

        let out = assembler.assemble(&[r], 10_000, true);
        assert_eq!(
            out,
            "[1] (library: three.js, relevance: 50%)\nImport the library first."
        );
    }

    #[test]
    fn rank_order_is_preserved_not_resorted() {
        let assembler = ContextAssembler::default();
        let results = vec![
            result("low first", Some(0.4), None),
            result("high second", Some(0.9), None),
        ];

        let out = assembler.assemble(&results, 10_000, false);
        assert_eq!(out, "low first\n\nhigh second");
    }
}
