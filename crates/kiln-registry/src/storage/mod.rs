//! Storage abstraction for component documents
//!
//! The store is a plain key-value engine holding JSON documents. It never
//! interprets them; parsing happens in [`read_data`].

use async_trait::async_trait;
use kiln::ComponentData;

use crate::error::{RegistryError, Result};

pub mod memory_storage;

pub use memory_storage::{MemoryStorage, StorageStats};

#[derive(Debug, Clone, thiserror::Error)]
pub enum StorageError {
    #[error("Key not found: {0}")]
    NotFound(String),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Invalid key format: {0}")]
    InvalidKey(String),
}

/// A single operation inside an atomic batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Put { key: String, value: String },
    Del { key: String },
}

impl BatchOp {
    pub fn put(key: impl Into<String>, value: impl Into<String>) -> Self {
        BatchOp::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn del(key: impl Into<String>) -> Self {
        BatchOp::Del { key: key.into() }
    }

    pub fn key(&self) -> &str {
        match self {
            BatchOp::Put { key, .. } | BatchOp::Del { key } => key,
        }
    }
}

/// Abstraction for key-value storage backends
///
/// Implementations must be atomic per key, and `batch` must apply all of its
/// operations or none of them.
#[async_trait]
pub trait Store: Send + Sync {
    /// Retrieve the document stored at `key`
    async fn get(&self, key: &str) -> std::result::Result<String, StorageError>;

    /// Store a document at `key`
    async fn put(&self, key: &str, value: String) -> std::result::Result<(), StorageError>;

    /// Delete `key`; deleting a missing key is not an error
    async fn del(&self, key: &str) -> std::result::Result<(), StorageError>;

    /// Apply several operations atomically
    async fn batch(&self, ops: Vec<BatchOp>) -> std::result::Result<(), StorageError>;
}

/// Read and parse the component document at `key`
pub async fn read_data(store: &dyn Store, key: &str) -> Result<ComponentData> {
    let raw = store
        .get(key)
        .await
        .map_err(|e| RegistryError::from_storage(key, e))?;

    parse_document(key, &raw)
}

/// Parse a raw document read from `key`
pub fn parse_document(key: &str, raw: &str) -> Result<ComponentData> {
    ComponentData::from_json(raw).map_err(|e| RegistryError::MalformedDocument {
        key: key.to_string(),
        reason: e.to_string(),
    })
}
