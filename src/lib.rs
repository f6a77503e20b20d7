//! Retrieval context engine for the Vitrine chat application.
//!
//! Turns previously stored conversation content into a bounded, ranked
//! context block for prompt injection. The host application constructs a
//! [`RagEngine`] at its composition root with an injected embedding
//! provider and document store; everything else in this crate hangs off
//! that value.

pub mod core;
pub mod embedding;
pub mod logging;
pub mod rag;

pub use crate::core::config::{ContextSettings, EmbeddingSettings, RagSettings};
pub use crate::core::errors::RagError;
pub use crate::embedding::{Embedder, EmbeddingClient};
pub use crate::rag::{
    ContextAssembler, ContextOptions, DocumentStore, Fragment, FragmentSource, MemoryStore,
    RagEngine, SearchOptions, SearchResult, SourceType, SqliteStore,
};
