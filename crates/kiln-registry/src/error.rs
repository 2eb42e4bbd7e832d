//! Error types for the kiln registry

use crate::storage::StorageError;
use kiln::{HookError, KilnError, PathError};
use thiserror::Error;

/// Registry-specific errors
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Component not found: {key}")]
    NotFound { key: String },

    #[error("Validation error: {0}")]
    Validation(#[from] PathError),

    #[error("Storage error while processing {reference}: {source}")]
    Upstream {
        reference: String,
        #[source]
        source: StorageError,
    },

    #[error("Hook {operation} failed for {reference}: {source}")]
    Hook {
        reference: String,
        operation: &'static str,
        #[source]
        source: HookError,
    },

    #[error("Hook {operation} of component {component} broke its contract: {reason}")]
    ContractViolation {
        component: String,
        operation: &'static str,
        reason: String,
    },

    #[error("Malformed document at {key}: {reason}")]
    MalformedDocument { key: String, reason: String },

    #[error("Reference cycle: {}", .chain.join(" -> "))]
    ReferenceCycle { chain: Vec<String> },

    #[error("Reference {reference} is nested deeper than {max_depth} levels")]
    DepthExceeded { reference: String, max_depth: usize },

    #[error("Failed to resolve {reference}: {source}")]
    Resolution {
        reference: String,
        #[source]
        source: Box<RegistryError>,
    },

    #[error("Kiln error: {0}")]
    Kiln(#[from] KilnError),
}

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;

impl RegistryError {
    /// Map a storage failure for `key`, keeping missing keys distinct
    pub fn from_storage(key: &str, error: StorageError) -> Self {
        match error {
            StorageError::NotFound(key) => RegistryError::NotFound { key },
            source => RegistryError::Upstream {
                reference: key.to_string(),
                source,
            },
        }
    }

    /// Whether the root cause is a missing store key
    pub fn is_not_found(&self) -> bool {
        match self {
            RegistryError::NotFound { .. } => true,
            RegistryError::Resolution { source, .. } => source.is_not_found(),
            _ => false,
        }
    }

    /// Whether the caller's input was rejected before any I/O
    pub fn is_validation(&self) -> bool {
        match self {
            RegistryError::Validation(_) => true,
            RegistryError::Kiln(e) => e.is_validation(),
            _ => false,
        }
    }

    /// The innermost error behind any resolution wrappers
    pub fn root_cause(&self) -> &RegistryError {
        match self {
            RegistryError::Resolution { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
