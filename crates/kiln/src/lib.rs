//! Kiln is the core of a versioned component store.
//!
//! Components are addressed by references such as
//! `/components/article/instances/abc@published`. This crate holds everything
//! that does not talk to the store: reference parsing, the component data
//! tree, per-component hooks, and template discovery. Store access and
//! reference resolution live in `kiln-registry`.

pub mod config;
pub mod data;
pub mod error;
pub mod files;
pub mod hook;
pub mod path;
pub mod template;

// Re-export core types
pub use config::KilnConfig;
pub use data::{ComponentData, ComponentValue, REF_KEY, Reference, Scalar};
pub use error::{ConfigError, DataError, KilnError, PathError, Result, TemplateError};
pub use files::{ComponentFiles, LocalComponentFiles};
pub use hook::{ComponentHook, HookError, HookFuture, HookResult};
pub use path::{ComponentPath, VersionLabel, get_name};
pub use template::TemplateLocator;
