//! Embedding store over a document backend

use crate::{DocumentStore, FaceRecord, Gallery, StorageError, GALLERY_KEY};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Gallery of enrolled faces backed by a [`DocumentStore`].
///
/// The in-memory gallery is reconciled with the persisted document only in
/// [`load`](Self::load) and after each successful mutation.
pub struct EmbeddingStore {
    backend: Arc<dyn DocumentStore>,
    key: String,
    gallery: Gallery,
}

impl EmbeddingStore {
    /// Create a store over the default gallery key. Call [`load`](Self::load) before use.
    pub fn new(backend: Arc<dyn DocumentStore>) -> Self {
        Self::with_key(backend, GALLERY_KEY)
    }

    pub fn with_key(backend: Arc<dyn DocumentStore>, key: impl Into<String>) -> Self {
        Self {
            backend,
            key: key.into(),
            gallery: Gallery::new(),
        }
    }

    /// Read the persisted gallery.
    ///
    /// Missing, unreadable or corrupt documents yield an empty gallery.
    pub fn load(&mut self) -> &Gallery {
        self.gallery = match self.backend.get(&self.key) {
            Ok(Some(document)) => match serde_json::from_str::<Gallery>(&document) {
                Ok(gallery) => {
                    info!("Loaded {} enrolled faces", gallery.len());
                    gallery
                }
                Err(e) => {
                    warn!("Persisted gallery '{}' is corrupt, starting empty: {}", self.key, e);
                    Gallery::new()
                }
            },
            Ok(None) => {
                debug!("No persisted gallery under '{}'", self.key);
                Gallery::new()
            }
            Err(e) => {
                error!("Failed to read gallery '{}', starting empty: {}", self.key, e);
                Gallery::new()
            }
        };
        &self.gallery
    }

    /// Current gallery
    pub fn gallery(&self) -> &Gallery {
        &self.gallery
    }

    /// Append a record and persist the whole gallery.
    ///
    /// The in-memory gallery only changes once the write has succeeded.
    pub fn append(&mut self, record: FaceRecord) -> Result<&Gallery, StorageError> {
        let mut updated = self.gallery.clone();
        updated.push(record)?;
        self.persist(&updated)?;

        self.gallery = updated;
        info!("Gallery now holds {} faces", self.gallery.len());
        Ok(&self.gallery)
    }

    /// Delete the record at `index` and persist the whole gallery
    pub fn remove(&mut self, index: usize) -> Result<FaceRecord, StorageError> {
        let mut updated = self.gallery.clone();
        let removed = updated.remove(index)?;
        self.persist(&updated)?;

        self.gallery = updated;
        info!("Removed face '{}' from gallery", removed.name());
        Ok(removed)
    }

    /// Serialize and write the full gallery document
    pub fn persist(&self, gallery: &Gallery) -> Result<(), StorageError> {
        let document = serde_json::to_string(gallery)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.backend.put(&self.key, &document)
    }
}
