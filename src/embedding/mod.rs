//! Embedding provider abstraction.
//!
//! [`EmbeddingClient`] talks to an OpenAI-compatible `/embeddings`
//! endpoint. The [`Embedder`] trait is the seam the engine is built
//! against, so tests and alternative providers can be injected.

mod client;

pub use client::EmbeddingClient;

use async_trait::async_trait;

use crate::core::errors::RagError;

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Provider name for logging (e.g. "openai-compat").
    fn name(&self) -> &str;

    /// Fixed vector length this provider produces.
    fn dimensions(&self) -> usize;

    /// True once a credential has been supplied via [`set_credential`].
    ///
    /// [`set_credential`]: Embedder::set_credential
    fn is_configured(&self) -> bool;

    /// Store the provider credential. No validation beyond non-empty.
    fn set_credential(&self, key: &str) -> Result<(), RagError>;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError>;

    /// Embed many texts, preserving input order in the output.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError>;
}
