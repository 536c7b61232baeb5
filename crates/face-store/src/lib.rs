//! Face Gallery Storage
//!
//! Persists the gallery of enrolled faces as a single JSON document stored
//! under a well-known key. The document is replaced whole on every write.

mod backend;
mod record;
mod store;

pub use backend::{DocumentStore, FileDocumentStore, MemoryDocumentStore};
pub use record::{Embedding, FaceRecord, Gallery};
pub use store::EmbeddingStore;

use thiserror::Error;

/// Key the gallery document is stored under
pub const GALLERY_KEY: &str = "knownFaces";

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage backend error: {0}")]
    Backend(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Embedding dimension mismatch: gallery holds {expected}-d embeddings, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("Invalid face record: {0}")]
    InvalidRecord(String),
    #[error("No face record at index {0}")]
    NotFound(usize),
}
