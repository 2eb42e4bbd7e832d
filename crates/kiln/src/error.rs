//! Error types for the kiln core library
//!
//! Errors are grouped by domain: reference paths, templates, component data
//! and configuration. Everything in this crate is pure or filesystem-local, so
//! none of these errors carry store failures.

use thiserror::Error;

/// Main error type for the kiln core library
#[derive(Error, Debug)]
pub enum KilnError {
    /// Reference string parsing and version validation
    #[error("Path error: {0}")]
    Path(#[from] PathError),

    /// Template discovery
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    /// Component data decoding and shape errors
    #[error("Data error: {0}")]
    Data(#[from] DataError),

    /// Configuration loading
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Reference string errors
///
/// These are validation failures: they are raised before any I/O happens.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("Not a component reference: {reference}")]
    NotAComponent { reference: String },

    #[error("Invalid component reference {reference}: {reason}")]
    InvalidFormat { reference: String, reason: String },

    #[error("Version '{version}' is reserved and cannot be written: {reference}")]
    ReservedVersion { reference: String, version: String },

    #[error("Invalid tag '{tag}': {reason}")]
    InvalidTag { tag: String, reason: String },
}

/// Template discovery errors
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("No template found for component {name}")]
    NotFound { name: String },

    #[error("Template search failed in {dir}: {reason}")]
    Search { dir: String, reason: String },
}

/// Component data errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DataError {
    #[error("JSON deserialization failed: {reason}")]
    Deserialization { reason: String },

    #[error("JSON serialization failed: {reason}")]
    Serialization { reason: String },

    #[error("Expected a JSON object, got {actual}")]
    NotAnObject { actual: String },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable error: {var} - {reason}")]
    Environment { var: String, reason: String },

    #[error("Invalid configuration: {setting} - {reason}")]
    InvalidConfig { setting: String, reason: String },
}

/// Shorthand result type for kiln operations
pub type Result<T> = std::result::Result<T, KilnError>;

impl From<serde_json::Error> for DataError {
    fn from(error: serde_json::Error) -> Self {
        let reason = error.to_string();
        if error.is_syntax() || error.is_data() || error.is_eof() {
            DataError::Deserialization { reason }
        } else {
            DataError::Serialization { reason }
        }
    }
}

impl From<serde_json::Error> for KilnError {
    fn from(error: serde_json::Error) -> Self {
        KilnError::Data(error.into())
    }
}

impl KilnError {
    /// Whether this error is a validation failure on caller input
    pub fn is_validation(&self) -> bool {
        matches!(self, KilnError::Path(_))
    }
}

impl PathError {
    pub(crate) fn invalid(reference: &str, reason: impl Into<String>) -> Self {
        PathError::InvalidFormat {
            reference: reference.to_string(),
            reason: reason.into(),
        }
    }
}
