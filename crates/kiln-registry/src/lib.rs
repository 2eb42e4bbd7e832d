//! # Kiln Registry
//!
//! Versioned storage for kiln components:
//! - Reads with recursive reference resolution
//! - Writes under latest, published, or named tags, one atomic batch each
//! - Per-component hooks for get, put and del
//!
//! ## Core Concepts
//!
//! - **References** are objects with a `_ref` key pointing at another
//!   component. Reads replace them with the referenced data, keeping `_ref`.
//! - **Versions** live under `<base>@<label>`; latest is the bare base key.
//! - **Publishing** writes both the published and the latest key.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use kiln::{ComponentData, LocalComponentFiles};
//! use kiln_registry::{Components, MemoryStorage};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let components = Components::new(
//!     Arc::new(MemoryStorage::new()),
//!     Arc::new(LocalComponentFiles::new("components")),
//! );
//!
//! let data = ComponentData::from_json(r#"{"title": "Hello", "byline": {"_ref": "/components/author/instances/jo"}}"#)?;
//! components.put("/components/article/instances/a@published", data).await?;
//!
//! let article = components.get("/components/article/instances/a@published").await?;
//! println!("{}", article.to_json());
//! # Ok(())
//! # }
//! ```

pub mod components;
pub mod error;
pub mod resolver;
pub mod storage;
pub mod writer;

pub use components::Components;
pub use error::{RegistryError, Result};
pub use resolver::ReferenceResolver;
pub use storage::{BatchOp, MemoryStorage, StorageError, StorageStats, Store};
pub use writer::{PutPlan, VersionedWriter};
