mod env;
mod types;


pub use types::*;

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, bail};
use swallow_index::{BuildOptions, RetrievalConfig, SplitterConfig};

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Reject values the pipeline cannot run with.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first offending key.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.splitter()
            .validate()
            .context("invalid [chunking] section")?;
        if self.retrieval.k == 0 {
            bail!("retrieval.k must be greater than 0");
        }
        if self.index.embed_batch_size == 0 {
            bail!("index.embed_batch_size must be greater than 0");
        }
        if self.index.embed_concurrency == 0 {
            bail!("index.embed_concurrency must be greater than 0");
        }
        if self.timeouts.llm_seconds == 0 || self.timeouts.embedding_seconds == 0 {
            bail!("timeouts must be greater than 0 seconds");
        }
        if self.llm.model.trim().is_empty() || self.llm.embedding_model.trim().is_empty() {
            bail!("llm.model and llm.embedding_model must not be empty");
        }
        if self.gateway.auth_token.as_deref().is_some_and(|t| t.trim().is_empty()) {
            bail!("gateway.auth_token must not be empty when set");
        }
        Ok(())
    }

    #[must_use]
    pub fn splitter(&self) -> SplitterConfig {
        SplitterConfig {
            chunk_size: self.chunking.chunk_size,
            chunk_overlap: self.chunking.chunk_overlap,
        }
    }

    #[must_use]
    pub fn build_options(&self) -> BuildOptions {
        BuildOptions {
            metric: self.index.metric,
            batch_size: self.index.embed_batch_size,
            concurrency: self.index.embed_concurrency,
            timeout: self.embedding_timeout(),
        }
    }

    #[must_use]
    pub fn retrieval_config(&self) -> RetrievalConfig {
        RetrievalConfig {
            k: self.retrieval.k,
            embed_timeout: self.embedding_timeout(),
        }
    }

    #[must_use]
    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.llm_seconds)
    }

    #[must_use]
    pub fn embedding_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.embedding_seconds)
    }
}
