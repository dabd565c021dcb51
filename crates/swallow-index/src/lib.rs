//! Code-unit documents, recursive chunking, a persisted vector index and top-k retrieval.
//!
//! Pipeline: metadata records are rendered into one [`Document`] per class, split into
//! overlapping [`Chunk`]s, embedded into a [`VectorIndex`] that is persisted once and
//! loaded on later starts, then queried per question through a [`Retriever`].

pub mod document;
pub mod error;
mod persist;
pub mod record;
pub mod retriever;
pub mod splitter;
pub mod store;

pub use document::{Chunk, Document, DocumentMetadata, build_documents};
pub use error::{IndexError, Result};
pub use record::{CodeUnitRecord, MethodInfo, load_records};
pub use retriever::{RetrievalConfig, Retriever};
pub use splitter::{SplitterConfig, TextSplitter};
pub use store::{BuildOptions, IndexedVector, Metric, RetrievalResult, ScoredChunk, VectorIndex};
