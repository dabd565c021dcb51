use std::path::PathBuf;
use std::str::FromStr;

use super::Config;

fn parsed<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    if let Ok(value) = raw.parse::<T>() {
        Some(value)
    } else {
        tracing::warn!("ignoring invalid {key} value: {raw}");
        None
    }
}

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("SWALLOW_METADATA_PATH") {
            self.input.metadata_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("SWALLOW_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("SWALLOW_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("SWALLOW_LLM_EMBEDDING_MODEL") {
            self.llm.embedding_model = v;
        }
        if let Some(n) = parsed("SWALLOW_CHUNK_SIZE") {
            self.chunking.chunk_size = n;
        }
        if let Some(n) = parsed("SWALLOW_CHUNK_OVERLAP") {
            self.chunking.chunk_overlap = n;
        }
        if let Ok(v) = std::env::var("SWALLOW_INDEX_PATH") {
            self.index.path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("SWALLOW_INDEX_METRIC") {
            if let Ok(metric) = serde_json::from_value(serde_json::Value::String(v.clone())) {
                self.index.metric = metric;
            } else {
                tracing::warn!("ignoring invalid SWALLOW_INDEX_METRIC value: {v}");
            }
        }
        if let Some(n) = parsed("SWALLOW_INDEX_EMBED_BATCH_SIZE") {
            self.index.embed_batch_size = n;
        }
        if let Some(n) = parsed("SWALLOW_INDEX_EMBED_CONCURRENCY") {
            self.index.embed_concurrency = n;
        }
        if let Some(enabled) = parsed("SWALLOW_INDEX_REBUILD_ON_CHANGE") {
            self.index.rebuild_on_change = enabled;
        }
        if let Some(k) = parsed("SWALLOW_RETRIEVAL_K") {
            self.retrieval.k = k;
        }
        if let Some(secs) = parsed("SWALLOW_TIMEOUT_LLM") {
            self.timeouts.llm_seconds = secs;
        }
        if let Some(secs) = parsed("SWALLOW_TIMEOUT_EMBEDDING") {
            self.timeouts.embedding_seconds = secs;
        }
        if let Ok(v) = std::env::var("SWALLOW_GATEWAY_BIND") {
            self.gateway.bind = v;
        }
        if let Some(port) = parsed("SWALLOW_GATEWAY_PORT") {
            self.gateway.port = port;
        }
        if let Ok(v) = std::env::var("SWALLOW_GATEWAY_TOKEN") {
            self.gateway.auth_token = Some(v);
        }
        if let Some(limit) = parsed("SWALLOW_GATEWAY_RATE_LIMIT") {
            self.gateway.rate_limit = limit;
        }
    }
}
