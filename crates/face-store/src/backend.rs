//! Key-value document storage backends

use crate::StorageError;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

/// Persistence medium holding whole documents under string keys.
///
/// `put` replaces the document atomically: a reader sees either the old or
/// the new document, never a partial write.
pub trait DocumentStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn put(&self, key: &str, document: &str) -> Result<(), StorageError>;
}

/// In-memory document store
#[derive(Default)]
pub struct MemoryDocumentStore {
    documents: Mutex<HashMap<String, String>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let documents = self
            .documents
            .lock()
            .map_err(|e| StorageError::Backend(format!("Lock error: {}", e)))?;
        Ok(documents.get(key).cloned())
    }

    fn put(&self, key: &str, document: &str) -> Result<(), StorageError> {
        let mut documents = self
            .documents
            .lock()
            .map_err(|e| StorageError::Backend(format!("Lock error: {}", e)))?;
        documents.insert(key.to_string(), document.to_string());
        Ok(())
    }
}

/// Stores each document as `<dir>/<key>.json`
pub struct FileDocumentStore {
    dir: PathBuf,
}

impl FileDocumentStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        info!("Using file document store at {}", dir.display());
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
            return Err(StorageError::Backend(format!("Invalid document key: {:?}", key)));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl DocumentStore for FileDocumentStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Backend(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    fn put(&self, key: &str, document: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir).map_err(|e| {
            StorageError::Backend(format!(
                "Failed to create storage directory {}: {}",
                self.dir.display(),
                e
            ))
        })?;

        // Write beside the target then rename over it
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, document)
            .map_err(|e| StorageError::Backend(format!("Failed to write {}: {}", tmp.display(), e)))?;
        fs::rename(&tmp, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            StorageError::Backend(format!("Failed to replace {}: {}", path.display(), e))
        })?;

        debug!("Wrote {} bytes to {}", document.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("face-store-{}-{}", tag, std::process::id()))
    }

    #[test]
    fn test_memory_store_replaces_documents() {
        let store = MemoryDocumentStore::new();
        assert_eq!(store.get("knownFaces").unwrap(), None);

        store.put("knownFaces", "[]").unwrap();
        store.put("knownFaces", "[1]").unwrap();
        assert_eq!(store.get("knownFaces").unwrap().as_deref(), Some("[1]"));
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = scratch_dir("roundtrip");
        let store = FileDocumentStore::new(&dir);

        assert_eq!(store.get("knownFaces").unwrap(), None);
        store.put("knownFaces", r#"[{"name":"Alice"}]"#).unwrap();
        assert_eq!(
            store.get("knownFaces").unwrap().as_deref(),
            Some(r#"[{"name":"Alice"}]"#)
        );
        assert!(!dir.join("knownFaces.json.tmp").exists());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_file_store_rejects_path_keys() {
        let store = FileDocumentStore::new(scratch_dir("keys"));
        assert!(store.put("../escape", "{}").is_err());
        assert!(store.get("").is_err());
    }
}
