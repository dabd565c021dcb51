//! In-memory vector index: batched embedding at build time and exhaustive top-k search.

use std::time::Duration;

use futures::{StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use swallow_llm::{LlmError, LlmProvider};

use crate::document::Chunk;
use crate::error::{IndexError, Result};

/// Similarity metric fixed at build time and recorded with the index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    #[default]
    Cosine,
    /// Raw inner product.
    Dot,
}

impl Metric {
    #[must_use]
    pub fn score(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Self::Cosine => cosine_similarity(a, b),
            Self::Dot => dot(a, b),
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cosine => f.write_str("cosine"),
            Self::Dot => f.write_str("dot"),
        }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let norm_a = dot(a, a).sqrt();
    let norm_b = dot(b, b).sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot(a, b) / (norm_a * norm_b)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedVector {
    pub vector: Vec<f32>,
    pub chunk: Chunk,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Search hits, best first.
pub type RetrievalResult = Vec<ScoredChunk>;

#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub metric: Metric,
    /// Texts per embedding request.
    pub batch_size: usize,
    /// Embedding requests in flight at once.
    pub concurrency: usize,
    /// Budget for a single embedding request.
    pub timeout: Duration,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            metric: Metric::Cosine,
            batch_size: 32,
            concurrency: 4,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Immutable set of `(vector, chunk)` pairs sharing one dimension.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    pub(crate) entries: Vec<IndexedVector>,
    pub(crate) dimensions: usize,
    pub(crate) metric: Metric,
    pub(crate) embedding_model: String,
    pub(crate) fingerprint: String,
}

impl VectorIndex {
    /// Embed every chunk and collect the pairs in chunk order.
    ///
    /// Batches are sent with at most `options.concurrency` requests in flight;
    /// the first failing batch aborts the whole build.
    ///
    /// # Errors
    ///
    /// - `IndexError::EmptyIndex` when `chunks` is empty, before any provider call
    /// - `IndexError::Embedding` on provider failure or an empty vector
    /// - `IndexError::EmbeddingTimeout` when a batch exceeds `options.timeout`
    /// - `IndexError::Dimension` when vectors disagree in length
    pub async fn build<P: LlmProvider>(
        chunks: Vec<Chunk>,
        provider: &P,
        embedding_model: &str,
        options: &BuildOptions,
    ) -> Result<Self> {
        if chunks.is_empty() {
            return Err(IndexError::EmptyIndex);
        }
        if !provider.supports_embeddings() {
            return Err(LlmError::EmbedUnsupported {
                provider: provider.name().to_owned(),
            }
            .into());
        }
        if options.batch_size == 0 || options.concurrency == 0 {
            return Err(IndexError::Config(
                "embedding batch size and concurrency must be greater than 0".into(),
            ));
        }

        let fingerprint = fingerprint(&chunks);
        let batch_count = chunks.len().div_ceil(options.batch_size);
        tracing::info!(
            chunks = chunks.len(),
            batches = batch_count,
            concurrency = options.concurrency,
            model = embedding_model,
            "embedding chunks"
        );

        let timeout = options.timeout;
        let batches: Vec<Vec<String>> = chunks
            .chunks(options.batch_size)
            .map(|batch| batch.iter().map(|c| c.content.clone()).collect())
            .collect();

        let vectors: Vec<Vec<Vec<f32>>> = futures::stream::iter(batches.into_iter().enumerate())
            .map(|(batch, texts)| async move {
                let vectors = tokio::time::timeout(timeout, provider.embed_batch(&texts))
                    .await
                    .map_err(|_| IndexError::EmbeddingTimeout(timeout))??;
                tracing::debug!(batch, size = texts.len(), "embedded batch");
                Ok::<_, IndexError>(vectors)
            })
            .buffered(options.concurrency)
            .try_collect()
            .await?;

        let vectors: Vec<Vec<f32>> = vectors.into_iter().flatten().collect();
        if vectors.len() != chunks.len() {
            return Err(IndexError::Embedding(LlmError::BatchMismatch {
                provider: "index",
                expected: chunks.len(),
                got: vectors.len(),
            }));
        }

        let dimensions = vectors.first().map_or(0, Vec::len);
        if dimensions == 0 {
            return Err(IndexError::Embedding(LlmError::EmptyResponse {
                provider: "index",
            }));
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != dimensions) {
            return Err(IndexError::Dimension {
                expected: dimensions,
                got: bad.len(),
            });
        }

        let entries = vectors
            .into_iter()
            .zip(chunks)
            .map(|(vector, chunk)| IndexedVector { vector, chunk })
            .collect::<Vec<_>>();

        tracing::info!(entries = entries.len(), dimensions, "index built");
        Ok(Self {
            entries,
            dimensions,
            metric: options.metric,
            embedding_model: embedding_model.to_owned(),
            fingerprint,
        })
    }

    /// The `k` best-scoring chunks, best first. Equal scores keep insertion order.
    ///
    /// # Errors
    ///
    /// Returns `IndexError::EmptyIndex` for an index without entries and
    /// `IndexError::Dimension` when `query` has the wrong length.
    pub fn search(&self, query: &[f32], k: usize) -> Result<RetrievalResult> {
        if self.entries.is_empty() {
            return Err(IndexError::EmptyIndex);
        }
        if query.len() != self.dimensions {
            return Err(IndexError::Dimension {
                expected: self.dimensions,
                got: query.len(),
            });
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| {
                let score = self.metric.score(query, &e.vector);
                (i, if score.is_nan() { f32::NEG_INFINITY } else { score })
            })
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, score)| ScoredChunk {
                chunk: self.entries[i].chunk.clone(),
                score,
            })
            .collect())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    #[must_use]
    pub fn metric(&self) -> Metric {
        self.metric
    }

    #[must_use]
    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    /// Fingerprint of the chunk set the index was built from.
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.entries.iter().map(|e| &e.chunk)
    }
}

/// blake3 digest over chunk content and metadata, in order.
#[must_use]
pub fn fingerprint(chunks: &[Chunk]) -> String {
    let mut hasher = blake3::Hasher::new();
    for chunk in chunks {
        for field in [
            chunk.metadata.class.as_str(),
            chunk.metadata.file_path.as_str(),
            chunk.content.as_str(),
        ] {
            hasher.update(&(field.len() as u64).to_le_bytes());
            hasher.update(field.as_bytes());
        }
        hasher.update(&(chunk.index as u64).to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}
