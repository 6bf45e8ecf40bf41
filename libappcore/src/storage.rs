//! Durable key/value storage
//!
//! The locale store persists its value through [`KeyValueStorage`] so hosts
//! can plug in whatever durable store they have. [`FileStorage`] keeps one
//! plain-text file per key; [`MemoryStorage`] is an in-process store with
//! injectable failures for tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::StorageError;

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Asynchronous string store
#[async_trait]
pub trait KeyValueStorage: Send + Sync {
    /// Read the value under `key`; `Ok(None)` when nothing is stored
    async fn read(&self, key: &str) -> StorageResult<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    async fn write(&self, key: &str, value: &str) -> StorageResult<()>;
}

/// One file per key inside a directory
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File for `key`; `None` for keys that are not a single path component
    fn path_for(&self, key: &str) -> Option<PathBuf> {
        if key.is_empty() || key.contains(['/', '\\']) || key == "." || key == ".." {
            return None;
        }
        Some(self.dir.join(key))
    }
}

#[async_trait]
impl KeyValueStorage for FileStorage {
    async fn read(&self, key: &str) -> StorageResult<Option<String>> {
        let path = self
            .path_for(key)
            .ok_or_else(|| StorageError::Read(format!("Invalid storage key '{}'", key)))?;

        match tokio::fs::read_to_string(&path).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Read(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn write(&self, key: &str, value: &str) -> StorageResult<()> {
        let path = self
            .path_for(key)
            .ok_or_else(|| StorageError::Write(format!("Invalid storage key '{}'", key)))?;

        // Create parent directories if they don't exist
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            StorageError::Write(format!("Failed to create directory: {}", e))
        })?;

        tokio::fs::write(&path, value).await.map_err(|e| {
            StorageError::Write(format!("Failed to write {}: {}", path.display(), e))
        })?;

        tracing::debug!(key, path = %path.display(), "Stored value");
        Ok(())
    }
}

/// In-memory store for tests
///
/// Clones share the same values and failure switches.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    values: Arc<Mutex<HashMap<String, String>>>,
    fail_reads: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate `key`
    pub fn with_value(self, key: &str, value: &str) -> Self {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        self
    }

    /// Current value under `key`, bypassing failure injection
    pub fn get(&self, key: &str) -> Option<String> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl KeyValueStorage for MemoryStorage {
    async fn read(&self, key: &str) -> StorageResult<Option<String>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Read("simulated read failure".to_string()));
        }
        Ok(self.get(key))
    }

    async fn write(&self, key: &str, value: &str) -> StorageResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Write("simulated write failure".to_string()));
        }
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
