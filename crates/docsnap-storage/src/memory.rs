//! In-memory blob storage implementation.

use crate::{BlobStore, StorageError, StorageResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

/// In-memory blob storage.
///
/// Not persistent. Supports an optional byte quota and fault injection so
/// callers can exercise their persistence-failure paths.
#[derive(Default)]
pub struct MemoryBlobStore {
    data: RwLock<HashMap<String, Vec<u8>>>,
    quota: Option<usize>,
    fail_saves: AtomicBool,
    fail_loads: AtomicBool,
    saves: AtomicUsize,
}

impl MemoryBlobStore {
    /// Create a new in-memory storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit the total number of stored bytes.
    pub fn with_quota(mut self, bytes: usize) -> Self {
        self.quota = Some(bytes);
        self
    }

    /// Make every subsequent `save` fail (or succeed again).
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `load` fail (or succeed again).
    pub fn set_fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Put raw bytes under a key, bypassing quota and fault injection.
    pub fn insert_raw(&self, key: &str, bytes: impl Into<Vec<u8>>) -> StorageResult<()> {
        let mut data = self
            .data
            .write()
            .map_err(|e| StorageError::LockPoisoned(e.to_string()))?;
        data.insert(key.to_string(), bytes.into());
        Ok(())
    }

    fn injected(op: &str) -> StorageError {
        StorageError::Io(std::io::Error::other(format!("injected {op} failure")))
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn load(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(Self::injected("load"));
        }

        let data = self
            .data
            .read()
            .map_err(|e| StorageError::LockPoisoned(e.to_string()))?;
        Ok(data.get(key).cloned())
    }

    async fn save(&self, key: &str, bytes: &[u8]) -> StorageResult<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(Self::injected("save"));
        }

        let mut data = self
            .data
            .write()
            .map_err(|e| StorageError::LockPoisoned(e.to_string()))?;

        if let Some(quota) = self.quota {
            let used: usize = data
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(_, v)| v.len())
                .sum();
            let available = quota.saturating_sub(used);
            if bytes.len() > available {
                return Err(StorageError::QuotaExceeded {
                    needed: bytes.len(),
                    available,
                });
            }
        }

        data.insert(key.to_string(), bytes.to_vec());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        let mut data = self
            .data
            .write()
            .map_err(|e| StorageError::LockPoisoned(e.to_string()))?;
        data.remove(key);
        Ok(())
    }

    async fn keys(&self) -> StorageResult<Vec<String>> {
        let data = self
            .data
            .read()
            .map_err(|e| StorageError::LockPoisoned(e.to_string()))?;
        let mut keys: Vec<String> = data.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let data = self
            .data
            .read()
            .map_err(|e| StorageError::LockPoisoned(e.to_string()))?;
        Ok(data.contains_key(key))
    }
}
