//! Application bootstrap: config resolution, provider construction and index load-or-build.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use swallow_index::{
    Chunk, IndexError, Retriever, TextSplitter, VectorIndex, build_documents, load_records,
};
use swallow_llm::LlmProvider;
use swallow_llm::any::AnyProvider;
use swallow_llm::ollama::OllamaProvider;
use tokio::sync::watch;

use crate::answer::AnswerGenerator;
use crate::config::Config;
use crate::engine::QaEngine;

/// How a persisted index relates to the current run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexSource {
    Loaded,
    Built,
    /// Loaded, found stale against the current chunks, then rebuilt.
    Rebuilt,
}

pub struct AppBuilder {
    config: Config,
    config_path: PathBuf,
}

impl AppBuilder {
    /// Load and validate the configuration at `config_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed or a value is invalid.
    pub fn new(config_path: PathBuf) -> anyhow::Result<Self> {
        let config = Config::load(&config_path)?;
        config.validate()?;
        Ok(Self {
            config,
            config_path,
        })
    }

    #[must_use]
    pub fn from_config(config: Config) -> Self {
        Self {
            config,
            config_path: PathBuf::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Create the provider and log whether it is reachable. Never fails on an unreachable backend.
    pub async fn build_provider(&self) -> AnyProvider {
        let provider = create_provider(&self.config);
        provider.health_check().await;
        provider
    }

    /// Records, documents and chunks for the configured input file.
    ///
    /// # Errors
    ///
    /// Returns an error if the input cannot be read, a record lacks a required
    /// field, or the chunking parameters are invalid.
    pub async fn build_chunks(&self) -> anyhow::Result<Vec<Chunk>> {
        let path = &self.config.input.metadata_path;
        let records = load_records(path)
            .await
            .with_context(|| format!("failed to load code metadata from {}", path.display()))?;
        let documents = build_documents(&records).context("failed to build documents")?;
        let splitter = TextSplitter::new(self.config.splitter())?;
        let chunks = splitter.split_documents(&documents);
        tracing::info!(
            records = records.len(),
            documents = documents.len(),
            chunks = chunks.len(),
            "loaded and split code metadata"
        );
        Ok(chunks)
    }

    /// Load the persisted index, or build and persist a fresh one.
    ///
    /// A fresh build happens when `force_rebuild` is set, when nothing is
    /// persisted yet, or when `index.rebuild_on_change` is on and the stored
    /// chunk fingerprint differs from `chunks`.
    ///
    /// # Errors
    ///
    /// Returns an error if loading fails for any reason other than a missing
    /// index, or if building or saving fails.
    pub async fn load_or_build_index<P: LlmProvider>(
        &self,
        provider: &P,
        chunks: &[Chunk],
        force_rebuild: bool,
    ) -> anyhow::Result<(VectorIndex, IndexSource)> {
        let path = &self.config.index.path;
        let model = &self.config.llm.embedding_model;

        if !force_rebuild {
            match VectorIndex::load(path, model).await {
                Ok(index) => {
                    let current = swallow_index::store::fingerprint(chunks);
                    if !self.config.index.rebuild_on_change || index.fingerprint() == current {
                        return Ok((index, IndexSource::Loaded));
                    }
                    tracing::info!(
                        path = %path.display(),
                        "input changed since index was built, rebuilding"
                    );
                    let index = self.build_index(provider, chunks).await?;
                    return Ok((index, IndexSource::Rebuilt));
                }
                Err(IndexError::IndexNotFound(_)) => {
                    tracing::info!(path = %path.display(), "no persisted index, building");
                }
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("failed to load index from {}", path.display()));
                }
            }
        }

        let index = self.build_index(provider, chunks).await?;
        Ok((index, IndexSource::Built))
    }

    async fn build_index<P: LlmProvider>(
        &self,
        provider: &P,
        chunks: &[Chunk],
    ) -> anyhow::Result<VectorIndex> {
        let index = VectorIndex::build(
            chunks.to_vec(),
            provider,
            &self.config.llm.embedding_model,
            &self.config.build_options(),
        )
        .await
        .context("failed to build index")?;
        index
            .save(&self.config.index.path)
            .await
            .with_context(|| {
                format!(
                    "failed to save index to {}",
                    self.config.index.path.display()
                )
            })?;
        Ok(index)
    }

    /// Assemble retriever and generator around a ready index.
    #[must_use]
    pub fn build_engine<P: LlmProvider>(
        &self,
        provider: Arc<P>,
        index: VectorIndex,
        chunks: Vec<Chunk>,
    ) -> QaEngine<P> {
        let retriever = Retriever::new(
            Arc::new(index),
            Arc::clone(&provider),
            self.config.retrieval_config(),
        );
        let generator = AnswerGenerator::new(provider, self.config.llm_timeout());
        QaEngine::new(retriever, generator, chunks)
    }

    #[must_use]
    pub fn build_shutdown() -> (watch::Sender<bool>, watch::Receiver<bool>) {
        watch::channel(false)
    }
}

/// `--config` argument, then `SWALLOW_CONFIG`, then `config/default.toml`.
#[must_use]
pub fn resolve_config_path(cli: Option<&Path>) -> PathBuf {
    if let Some(path) = cli {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var("SWALLOW_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from("config/default.toml")
}

#[must_use]
pub fn create_provider(config: &Config) -> AnyProvider {
    AnyProvider::Ollama(OllamaProvider::new(
        &config.llm.base_url,
        config.llm.model.clone(),
        config.llm.embedding_model.clone(),
    ))
}
