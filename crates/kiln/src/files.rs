//! Component asset lookup
//!
//! The [`ComponentFiles`] trait is the seam between kiln and wherever
//! component directories and hooks come from. [`LocalComponentFiles`] maps
//! component names onto subdirectories of a root directory and keeps an
//! explicit registry of hooks.

use crate::hook::ComponentHook;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Provider of per-component directories and hooks
pub trait ComponentFiles: Send + Sync {
    /// Base directory holding the component's assets, if it exists
    fn component_path(&self, name: &str) -> Option<PathBuf>;

    /// The component's hook, if one is registered
    fn component_hook(&self, name: &str) -> Option<Arc<dyn ComponentHook>>;
}

/// Components laid out as `<root>/<name>/` on the local disk
#[derive(Clone, Default)]
pub struct LocalComponentFiles {
    root: PathBuf,
    hooks: HashMap<String, Arc<dyn ComponentHook>>,
}

impl LocalComponentFiles {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            hooks: HashMap::new(),
        }
    }

    /// Register a hook for `name`, replacing any previous one
    pub fn with_hook(mut self, name: impl Into<String>, hook: Arc<dyn ComponentHook>) -> Self {
        self.register_hook(name, hook);
        self
    }

    pub fn register_hook(&mut self, name: impl Into<String>, hook: Arc<dyn ComponentHook>) {
        self.hooks.insert(name.into(), hook);
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ComponentFiles for LocalComponentFiles {
    fn component_path(&self, name: &str) -> Option<PathBuf> {
        let dir = self.root.join(name);
        dir.is_dir().then_some(dir)
    }

    fn component_hook(&self, name: &str) -> Option<Arc<dyn ComponentHook>> {
        self.hooks.get(name).cloned()
    }
}

impl fmt::Debug for LocalComponentFiles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut hooks: Vec<&String> = self.hooks.keys().collect();
        hooks.sort();
        f.debug_struct("LocalComponentFiles")
            .field("root", &self.root)
            .field("hooks", &hooks)
            .finish()
    }
}
