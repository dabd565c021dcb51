use std::sync::Arc;
use std::time::Duration;

use swallow_llm::LlmProvider;

use crate::error::{IndexError, Result};
use crate::store::{RetrievalResult, VectorIndex};

#[derive(Debug, Clone, Copy)]
pub struct RetrievalConfig {
    /// Chunks returned per question.
    pub k: usize,
    pub embed_timeout: Duration,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k: 4,
            embed_timeout: Duration::from_secs(30),
        }
    }
}

/// Top-k similarity lookup over a shared, read-only index.
///
/// Every call embeds the question afresh; nothing is cached between calls.
pub struct Retriever<P> {
    index: Arc<VectorIndex>,
    provider: Arc<P>,
    config: RetrievalConfig,
}

impl<P> Clone for Retriever<P> {
    fn clone(&self) -> Self {
        Self {
            index: Arc::clone(&self.index),
            provider: Arc::clone(&self.provider),
            config: self.config,
        }
    }
}

impl<P: LlmProvider> Retriever<P> {
    #[must_use]
    pub fn new(index: Arc<VectorIndex>, provider: Arc<P>, config: RetrievalConfig) -> Self {
        Self {
            index,
            provider,
            config,
        }
    }

    #[must_use]
    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    #[must_use]
    pub fn config(&self) -> RetrievalConfig {
        self.config
    }

    /// # Errors
    ///
    /// Returns `IndexError::EmbeddingTimeout` when the query embedding exceeds its
    /// budget, `IndexError::Embedding` on provider failure, and the index's own
    /// errors from [`VectorIndex::search`].
    pub async fn retrieve(&self, question: &str) -> Result<RetrievalResult> {
        let timeout = self.config.embed_timeout;
        let query = tokio::time::timeout(timeout, self.provider.embed(question))
            .await
            .map_err(|_| IndexError::EmbeddingTimeout(timeout))??;
        let hits = self.index.search(&query, self.config.k)?;
        tracing::debug!(k = self.config.k, hits = hits.len(), "retrieved chunks");
        Ok(hits)
    }
}
