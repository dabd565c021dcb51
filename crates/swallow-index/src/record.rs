//! Code-unit metadata records as written by the upstream source scanner.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};

/// One method entry of a scanned class.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodInfo {
    #[serde(default)]
    pub method_name: Option<String>,
}

impl MethodInfo {
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            method_name: Some(name.into()),
        }
    }
}

/// Metadata for a single class. Required fields are optional here so that a
/// malformed record can be reported by position instead of failing the whole parse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeUnitRecord {
    #[serde(default)]
    pub class_name: Option<String>,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub methods: Vec<MethodInfo>,
    #[serde(default)]
    pub comments: Vec<String>,
}

/// Parse a JSON array of records.
///
/// # Errors
///
/// Returns `IndexError::InvalidInput` if the bytes are not a JSON array of objects.
pub fn parse_records(bytes: &[u8]) -> Result<Vec<CodeUnitRecord>> {
    serde_json::from_slice(bytes).map_err(IndexError::InvalidInput)
}

/// Read and parse the metadata file.
///
/// # Errors
///
/// Returns an IO error if the file cannot be read, or `IndexError::InvalidInput`
/// if it is not a JSON array of records.
pub async fn load_records(path: &Path) -> Result<Vec<CodeUnitRecord>> {
    let bytes = tokio::fs::read(path).await?;
    let records = parse_records(&bytes)?;
    tracing::info!(path = %path.display(), records = records.len(), "loaded code metadata");
    Ok(records)
}
