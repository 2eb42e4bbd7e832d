//! In-memory store for testing and embedding

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{BatchOp, StorageError, Store};

/// Number of calls made against a [`MemoryStorage`], per operation
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StorageStats {
    pub gets: usize,
    pub puts: usize,
    pub dels: usize,
    pub batches: usize,
}

#[derive(Debug, Default)]
struct Counters {
    gets: AtomicUsize,
    puts: AtomicUsize,
    dels: AtomicUsize,
    batches: AtomicUsize,
}

/// In-memory storage implementation
#[derive(Debug, Default)]
pub struct MemoryStorage {
    data: Mutex<HashMap<String, String>>,
    counters: Counters,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `entries`
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            data: Mutex::new(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
            counters: Counters::default(),
        }
    }

    /// Calls made so far
    pub fn stats(&self) -> StorageStats {
        StorageStats {
            gets: self.counters.gets.load(Ordering::SeqCst),
            puts: self.counters.puts.load(Ordering::SeqCst),
            dels: self.counters.dels.load(Ordering::SeqCst),
            batches: self.counters.batches.load(Ordering::SeqCst),
        }
    }

    /// Get all stored keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Get the raw document at `key`, if any
    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries().get(key).cloned()
    }

    /// Clear all data
    pub fn clear(&self) {
        self.entries().clear();
    }

    /// Get number of stored items
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Check if storage is empty
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    // Inspection helpers tolerate a poisoned lock
    fn entries(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Store for MemoryStorage {
    async fn get(&self, key: &str) -> Result<String, StorageError> {
        self.counters.gets.fetch_add(1, Ordering::SeqCst);
        let storage = self
            .data
            .lock()
            .map_err(|_| StorageError::Backend("Lock poisoned".into()))?;

        storage
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn put(&self, key: &str, value: String) -> Result<(), StorageError> {
        self.counters.puts.fetch_add(1, Ordering::SeqCst);
        let mut storage = self
            .data
            .lock()
            .map_err(|_| StorageError::Backend("Lock poisoned".into()))?;

        storage.insert(key.to_string(), value);
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), StorageError> {
        self.counters.dels.fetch_add(1, Ordering::SeqCst);
        let mut storage = self
            .data
            .lock()
            .map_err(|_| StorageError::Backend("Lock poisoned".into()))?;

        storage.remove(key);
        Ok(())
    }

    async fn batch(&self, ops: Vec<BatchOp>) -> Result<(), StorageError> {
        self.counters.batches.fetch_add(1, Ordering::SeqCst);
        if let Some(op) = ops.iter().find(|op| op.key().is_empty()) {
            return Err(StorageError::InvalidKey(format!("{op:?}")));
        }

        // One lock for the whole batch keeps it atomic
        let mut storage = self
            .data
            .lock()
            .map_err(|_| StorageError::Backend("Lock poisoned".into()))?;

        for op in ops {
            match op {
                BatchOp::Put { key, value } => {
                    storage.insert(key, value);
                }
                BatchOp::Del { key } => {
                    storage.remove(&key);
                }
            }
        }
        Ok(())
    }
}
