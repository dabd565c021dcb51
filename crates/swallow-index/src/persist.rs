//! On-disk layout of a [`VectorIndex`]: `manifest.json` plus `vectors.json`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};
use crate::store::{IndexedVector, Metric, VectorIndex};

const FORMAT_VERSION: u32 = 1;
const MANIFEST_FILE: &str = "manifest.json";
const VECTORS_FILE: &str = "vectors.json";

#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    format_version: u32,
    embedding_model: String,
    dimensions: usize,
    metric: Metric,
    entries: usize,
    /// blake3 of `vectors.json`.
    checksum: String,
    /// blake3 of the chunk set, see [`crate::store::fingerprint`].
    fingerprint: String,
}

impl VectorIndex {
    /// Write the index under `dir`, replacing a previously saved index there.
    ///
    /// Files go to a sibling staging directory first, which is then renamed
    /// into place; an interrupted save leaves no loadable index at `dir`.
    /// An existing `dir` is only replaced when it is empty or holds a manifest.
    ///
    /// # Errors
    ///
    /// Returns `IndexError::NotAnIndex` when `dir` holds anything else, and
    /// `IndexError::Io` on filesystem failure.
    pub async fn save(&self, dir: &Path) -> Result<()> {
        let vectors = serde_json::to_vec(&self.entries)
            .map_err(|e| IndexError::IndexCorrupt(format!("failed to encode vectors: {e}")))?;
        let manifest = Manifest {
            format_version: FORMAT_VERSION,
            embedding_model: self.embedding_model.clone(),
            dimensions: self.dimensions,
            metric: self.metric,
            entries: self.entries.len(),
            checksum: blake3::hash(&vectors).to_hex().to_string(),
            fingerprint: self.fingerprint.clone(),
        };
        let manifest = serde_json::to_vec_pretty(&manifest)
            .map_err(|e| IndexError::IndexCorrupt(format!("failed to encode manifest: {e}")))?;

        ensure_replaceable(dir).await?;
        let staging = staging_dir(dir);
        if let Some(parent) = dir.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::create_dir_all(&staging).await?;

        let written = async {
            tokio::fs::write(staging.join(VECTORS_FILE), &vectors).await?;
            tokio::fs::write(staging.join(MANIFEST_FILE), &manifest).await?;
            if tokio::fs::try_exists(dir).await? {
                tokio::fs::remove_dir_all(dir).await?;
            }
            tokio::fs::rename(&staging, dir).await
        }
        .await;

        if let Err(e) = written {
            let _ = tokio::fs::remove_dir_all(&staging).await;
            return Err(e.into());
        }

        tracing::info!(
            path = %dir.display(),
            entries = self.entries.len(),
            dimensions = self.dimensions,
            "index saved"
        );
        Ok(())
    }

    /// Read an index saved by [`VectorIndex::save`].
    ///
    /// # Errors
    ///
    /// - `IndexError::IndexNotFound` when `dir` or its manifest is missing
    /// - `IndexError::IndexCorrupt` when files fail to parse or disagree with the manifest
    /// - `IndexError::ModelMismatch` when the index was built with another embedding model
    pub async fn load(dir: &Path, embedding_model: &str) -> Result<Self> {
        let manifest_path = dir.join(MANIFEST_FILE);
        let manifest = match tokio::fs::read(&manifest_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(IndexError::IndexNotFound(dir.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };
        let manifest: Manifest = serde_json::from_slice(&manifest)
            .map_err(|e| IndexError::IndexCorrupt(format!("manifest: {e}")))?;

        if manifest.format_version != FORMAT_VERSION {
            return Err(IndexError::IndexCorrupt(format!(
                "unsupported format version {} (expected {FORMAT_VERSION})",
                manifest.format_version
            )));
        }
        if manifest.embedding_model != embedding_model {
            return Err(IndexError::ModelMismatch {
                built: manifest.embedding_model,
                current: embedding_model.to_owned(),
            });
        }

        let vectors = match tokio::fs::read(dir.join(VECTORS_FILE)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(IndexError::IndexCorrupt(format!("{VECTORS_FILE} is missing")));
            }
            Err(e) => return Err(e.into()),
        };
        if blake3::hash(&vectors).to_hex().as_str() != manifest.checksum {
            return Err(IndexError::IndexCorrupt("vector checksum mismatch".into()));
        }

        let entries: Vec<IndexedVector> = serde_json::from_slice(&vectors)
            .map_err(|e| IndexError::IndexCorrupt(format!("{VECTORS_FILE}: {e}")))?;
        if entries.len() != manifest.entries {
            return Err(IndexError::IndexCorrupt(format!(
                "manifest lists {} entries, found {}",
                manifest.entries,
                entries.len()
            )));
        }
        if let Some(bad) = entries.iter().find(|e| e.vector.len() != manifest.dimensions) {
            return Err(IndexError::IndexCorrupt(format!(
                "vector of dimension {} in index of dimension {}",
                bad.vector.len(),
                manifest.dimensions
            )));
        }

        tracing::info!(
            path = %dir.display(),
            entries = entries.len(),
            dimensions = manifest.dimensions,
            metric = %manifest.metric,
            "index loaded"
        );
        Ok(Self {
            entries,
            dimensions: manifest.dimensions,
            metric: manifest.metric,
            embedding_model: manifest.embedding_model,
            fingerprint: manifest.fingerprint,
        })
    }
}

async fn ensure_replaceable(dir: &Path) -> Result<()> {
    let metadata = match tokio::fs::metadata(dir).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    if metadata.is_dir() {
        if tokio::fs::try_exists(dir.join(MANIFEST_FILE)).await? {
            return Ok(());
        }
        if tokio::fs::read_dir(dir).await?.next_entry().await?.is_none() {
            return Ok(());
        }
    }
    Err(IndexError::NotAnIndex(dir.to_path_buf()))
}

fn staging_dir(dir: &Path) -> PathBuf {
    let name = dir
        .file_name()
        .map_or_else(|| "index".into(), |n| n.to_string_lossy().into_owned());
    dir.with_file_name(format!(".{name}.staging-{}", uuid::Uuid::new_v4()))
}

#[cfg(test)]
mod tests {
    use swallow_llm::LlmProvider;
    use swallow_llm::mock::MockProvider;

    use super::*;
    use crate::document::{Chunk, DocumentMetadata};
    use crate::store::BuildOptions;

    fn chunks() -> Vec<Chunk> {
        ["alpha beta", "gamma delta", "epsilon", "zeta eta theta"]
            .into_iter()
            .enumerate()
            .map(|(i, content)| Chunk {
                content: content.to_owned(),
                metadata: DocumentMetadata {
                    class: format!("C{i}"),
                    file_path: format!("C{i}.java"),
                },
                index: 0,
            })
            .collect()
    }

    async fn built() -> (VectorIndex, MockProvider) {
        let provider = MockProvider::default();
        let index = VectorIndex::build(
            chunks(),
            &provider,
            "nomic-embed-text",
            &BuildOptions::default(),
        )
        .await
        .unwrap();
        (index, provider)
    }

    #[tokio::test]
    async fn round_trip_preserves_search_results() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("code_vector_db");
        let (index, provider) = built().await;
        index.save(&dir).await.unwrap();

        let loaded = VectorIndex::load(&dir, "nomic-embed-text").await.unwrap();
        assert_eq!(loaded.len(), index.len());
        assert_eq!(loaded.dimensions(), index.dimensions());
        assert_eq!(loaded.metric(), index.metric());
        assert_eq!(loaded.fingerprint(), index.fingerprint());

        let query = provider.embed("beta theta").await.unwrap();
        assert_eq!(loaded.search(&query, 4).unwrap(), index.search(&query, 4).unwrap());
    }

    #[tokio::test]
    async fn save_replaces_existing_index_and_leaves_no_staging() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("db");
        let (index, _) = built().await;
        index.save(&dir).await.unwrap();
        index.save(&dir).await.unwrap();

        let names: Vec<String> = std::fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["db".to_owned()]);
        assert!(VectorIndex::load(&dir, "nomic-embed-text").await.is_ok());
    }

    #[tokio::test]
    async fn save_refuses_to_replace_unrelated_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("data");
        std::fs::create_dir(&dir).unwrap();
        std::fs::write(dir.join("keep.txt"), b"precious").unwrap();
        let (index, _) = built().await;

        let err = index.save(&dir).await.unwrap_err();
        assert!(matches!(&err, IndexError::NotAnIndex(path) if path == &dir));
        assert_eq!(std::fs::read(dir.join("keep.txt")).unwrap(), b"precious");

        let names: Vec<String> = std::fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["data".to_owned()]);
    }

    #[tokio::test]
    async fn save_refuses_to_replace_a_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("db");
        std::fs::write(&path, b"not a directory").unwrap();
        let (index, _) = built().await;

        let err = index.save(&path).await.unwrap_err();
        assert!(matches!(err, IndexError::NotAnIndex(_)));
        assert!(path.is_file());
    }

    #[tokio::test]
    async fn save_fills_an_empty_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("db");
        std::fs::create_dir(&dir).unwrap();
        let (index, _) = built().await;
        index.save(&dir).await.unwrap();
        assert_eq!(
            VectorIndex::load(&dir, "nomic-embed-text").await.unwrap().len(),
            index.len()
        );
    }

    #[tokio::test]
    async fn missing_directory_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let err = VectorIndex::load(&tmp.path().join("absent"), "m")
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::IndexNotFound(_)));
    }

    #[tokio::test]
    async fn directory_without_manifest_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let err = VectorIndex::load(tmp.path(), "m").await.unwrap_err();
        assert!(matches!(err, IndexError::IndexNotFound(_)));
    }

    #[tokio::test]
    async fn garbage_manifest_is_corrupt() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(MANIFEST_FILE), b"{not json").unwrap();
        let err = VectorIndex::load(tmp.path(), "m").await.unwrap_err();
        assert!(matches!(err, IndexError::IndexCorrupt(_)));
    }

    #[tokio::test]
    async fn tampered_vectors_fail_checksum() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("db");
        let (index, _) = built().await;
        index.save(&dir).await.unwrap();
        std::fs::write(dir.join(VECTORS_FILE), b"[]").unwrap();

        let err = VectorIndex::load(&dir, "nomic-embed-text").await.unwrap_err();
        assert!(matches!(err, IndexError::IndexCorrupt(msg) if msg.contains("checksum")));
    }

    #[tokio::test]
    async fn missing_vectors_file_is_corrupt() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("db");
        let (index, _) = built().await;
        index.save(&dir).await.unwrap();
        std::fs::remove_file(dir.join(VECTORS_FILE)).unwrap();

        let err = VectorIndex::load(&dir, "nomic-embed-text").await.unwrap_err();
        assert!(matches!(err, IndexError::IndexCorrupt(_)));
    }

    #[tokio::test]
    async fn different_embedding_model_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("db");
        let (index, _) = built().await;
        index.save(&dir).await.unwrap();

        let err = VectorIndex::load(&dir, "mxbai-embed-large").await.unwrap_err();
        match err {
            IndexError::ModelMismatch { built, current } => {
                assert_eq!(built, "nomic-embed-text");
                assert_eq!(current, "mxbai-embed-large");
            }
            other => panic!("expected ModelMismatch, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn wrong_dimension_entry_is_corrupt() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("db");
        let (mut index, _) = built().await;
        index.entries[1].vector.push(0.5);
        index.save(&dir).await.unwrap();

        let err = VectorIndex::load(&dir, "nomic-embed-text").await.unwrap_err();
        assert!(matches!(err, IndexError::IndexCorrupt(msg) if msg.contains("dimension")));
    }

    #[test]
    fn staging_dir_is_hidden_sibling() {
        let staging = staging_dir(Path::new("/data/code_vector_db"));
        assert_eq!(staging.parent(), Some(Path::new("/data")));
        let name = staging.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(".code_vector_db.staging-"));
    }
}
