//! # Storage Backend
//!
//! The persistence contract the collection layer is built upon.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      STORAGE BACKENDS                                   │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  StorageBackend Trait                                           │   │
//! │  │  ────────────────────                                            │   │
//! │  │                                                                 │   │
//! │  │  • read(key)    - Fetch an opaque blob, None if absent         │   │
//! │  │  • write(key)   - Store a blob                                 │   │
//! │  │  • remove(key)  - Delete a blob                                │   │
//! │  │  • clear()      - Drop everything                              │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  Implementations shipped here:                                         │
//! │  ─────────────────────────────                                          │
//! │                                                                         │
//! │  ┌───────────────┐  ┌───────────────┐                                  │
//! │  │ MemoryBackend │  │  FileBackend  │                                  │
//! │  │               │  │               │                                  │
//! │  │ - HashMap     │  │ - One file    │                                  │
//! │  │ - Tests,      │  │   per key     │                                  │
//! │  │   ephemeral   │  │ - Desktop     │                                  │
//! │  └───────────────┘  └───────────────┘                                  │
//! │                                                                         │
//! │  Browser and mobile storage are host-platform concerns implemented     │
//! │  outside this crate against the same trait.                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The core never assumes a backing medium. Values are opaque bytes; keys
//! are flat strings namespaced by the collection layer (`notes:index`,
//! `notes:item:<id>`, `content:<id>`).

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::{Error, Result};

/// Key-value persistence contract consumed by the collection layer
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Read the blob stored under `key`, or `None` if absent
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store `value` under `key`, replacing any existing blob
    async fn write(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Remove the blob under `key`; absent keys are a no-op
    async fn remove(&self, key: &str) -> Result<()>;

    /// Remove everything
    async fn clear(&self) -> Result<()>;
}

// ============================================================================
// MEMORY BACKEND
// ============================================================================

/// In-memory backend for tests and ephemeral stores
#[derive(Default)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBackend {
    /// Create an empty in-memory backend
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn write(&self, key: &str, value: &[u8]) -> Result<()> {
        self.entries.write().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.entries.write().clear();
        Ok(())
    }
}

// ============================================================================
// FILE BACKEND
// ============================================================================

/// Filesystem backend: one file per key under a root directory
///
/// Keys are hex-encoded into file names, so any key string is safe to use.
pub struct FileBackend {
    root: PathBuf,
}

impl FileBackend {
    /// Open a file backend rooted at `root`, creating the directory if needed
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| Error::StorageWriteError(format!("create {}: {}", root.display(), e)))?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(hex::encode(key.as_bytes()))
    }
}

#[async_trait]
impl StorageBackend for FileBackend {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.path_for(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::StorageReadError(format!("read {}: {}", key, e))),
        }
    }

    async fn write(&self, key: &str, value: &[u8]) -> Result<()> {
        tokio::fs::write(self.path_for(key), value)
            .await
            .map_err(|e| Error::StorageWriteError(format!("write {}: {}", key, e)))
    }

    async fn remove(&self, key: &str) -> Result<()> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::StorageWriteError(format!("remove {}: {}", key, e))),
        }
    }

    async fn clear(&self) -> Result<()> {
        let mut dir = tokio::fs::read_dir(&self.root)
            .await
            .map_err(|e| Error::StorageReadError(format!("list {}: {}", self.root.display(), e)))?;
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| Error::StorageReadError(e.to_string()))?
        {
            tokio::fs::remove_file(entry.path())
                .await
                .map_err(|e| Error::StorageWriteError(e.to_string()))?;
        }
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_backend_round_trip() {
        let backend = MemoryBackend::new();

        assert!(backend.read("missing").await.unwrap().is_none());

        backend.write("key", b"value").await.unwrap();
        assert_eq!(backend.read("key").await.unwrap().unwrap(), b"value");

        backend.remove("key").await.unwrap();
        assert!(backend.read("key").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_backend_clear() {
        let backend = MemoryBackend::new();
        backend.write("a", b"1").await.unwrap();
        backend.write("b", b"2").await.unwrap();

        backend.clear().await.unwrap();

        assert!(backend.read("a").await.unwrap().is_none());
        assert!(backend.read("b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_backend_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).await.unwrap();

        backend.write("notes:item:abc", b"payload").await.unwrap();
        assert_eq!(
            backend.read("notes:item:abc").await.unwrap().unwrap(),
            b"payload"
        );

        backend.remove("notes:item:abc").await.unwrap();
        assert!(backend.read("notes:item:abc").await.unwrap().is_none());

        // Removing an absent key is a no-op
        backend.remove("notes:item:abc").await.unwrap();
    }

    #[tokio::test]
    async fn test_file_backend_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();

        {
            let backend = FileBackend::open(dir.path()).await.unwrap();
            backend.write("key", b"persisted").await.unwrap();
        }

        let backend = FileBackend::open(dir.path()).await.unwrap();
        assert_eq!(backend.read("key").await.unwrap().unwrap(), b"persisted");
    }

    #[tokio::test]
    async fn test_file_backend_clear() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).await.unwrap();

        backend.write("a", b"1").await.unwrap();
        backend.write("b/with:odd chars", b"2").await.unwrap();

        backend.clear().await.unwrap();

        assert!(backend.read("a").await.unwrap().is_none());
        assert!(backend.read("b/with:odd chars").await.unwrap().is_none());
    }
}
