//! Component lifecycle: get, put and del
//!
//! [`Components`] ties together reference parsing, per-component hooks,
//! reference resolution and versioned writes. A component's hook, when it
//! implements an operation, replaces (for `get`) or transforms (for `put`)
//! the default behavior.

use std::path::PathBuf;
use std::sync::Arc;

use kiln::data::json_kind;
use kiln::{
    ComponentData, ComponentFiles, ComponentHook, ComponentPath, KilnConfig, KilnError,
    TemplateLocator,
};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{RegistryError, Result};
use crate::resolver::ReferenceResolver;
use crate::storage::{Store, read_data};
use crate::writer::{PutPlan, VersionedWriter};

/// Entry point for reading, writing and deleting components
#[derive(Clone)]
pub struct Components {
    store: Arc<dyn Store>,
    files: Arc<dyn ComponentFiles>,
    resolver: ReferenceResolver,
    writer: VersionedWriter,
    templates: TemplateLocator,
}

impl Components {
    pub fn new(store: Arc<dyn Store>, files: Arc<dyn ComponentFiles>) -> Self {
        Self {
            resolver: ReferenceResolver::new(store.clone()),
            writer: VersionedWriter::new(store.clone()),
            templates: TemplateLocator::new(files.clone()),
            store,
            files,
        }
    }

    /// Build with the reference depth and template names from `config`
    pub fn with_config(
        store: Arc<dyn Store>,
        files: Arc<dyn ComponentFiles>,
        config: &KilnConfig,
    ) -> Self {
        let mut components = Self::new(store, files);
        components.resolver = components
            .resolver
            .with_max_depth(config.max_reference_depth);
        components.templates = components
            .templates
            .with_template_names(config.template_names.iter().cloned());
        components
    }

    pub fn resolver(&self) -> &ReferenceResolver {
        &self.resolver
    }

    pub fn writer(&self) -> &VersionedWriter {
        &self.writer
    }

    /// Component name of a reference
    pub fn get_name(&self, reference: &str) -> Result<String> {
        Ok(kiln::get_name(reference)?)
    }

    /// Template file of the referenced component
    pub fn get_template(&self, reference: &str) -> Result<PathBuf> {
        Ok(self.templates.get_template(reference)?)
    }

    /// Expand every reference in `data`
    pub async fn resolve_data_references(&self, data: ComponentData) -> Result<ComponentData> {
        self.resolver.resolve_data_references(data).await
    }

    /// Fetch a component's data with its references resolved
    pub async fn get(&self, reference: &str) -> Result<ComponentData> {
        let path = ComponentPath::parse(reference)?;

        if let Some(hook) = self.hook(&path) {
            if let Some(pending) = hook.get(reference) {
                debug!(reference, component = %path.name, "delegating get to component hook");
                let value = pending.await.map_err(|source| RegistryError::Hook {
                    reference: reference.to_string(),
                    operation: "get",
                    source,
                })?;
                return expect_object(&path, "get", value);
            }
        }

        let data = read_data(self.store.as_ref(), &path.store_key()).await?;
        self.resolver.resolve_data_references(data).await
    }

    /// Write a component's data and return the root document written.
    ///
    /// Embedded component data is written to the keys its references name.
    /// Published and tagged writes store the root with its references
    /// resolved, so the version captures the referenced data as it is now.
    /// Referenced components' own keys are only written when the caller
    /// embedded data for them.
    pub async fn put(&self, reference: &str, data: ComponentData) -> Result<ComponentData> {
        let path = ComponentPath::parse(reference)?;
        let label = path.write_label()?;

        let data = match self.hook(&path) {
            Some(hook) => match hook.put(reference, data.clone()) {
                Some(pending) => {
                    debug!(reference, component = %path.name, "delegating put to component hook");
                    let value = pending.await.map_err(|source| RegistryError::Hook {
                        reference: reference.to_string(),
                        operation: "put",
                        source,
                    })?;
                    expect_object(&path, "put", value)?
                }
                None => data,
            },
            None => data,
        };

        let mut plan = PutPlan::new(path, label, data)?;
        if plan.label().is_snapshot() {
            let snapshot = self
                .resolver
                .resolve_staged(plan.root().clone(), plan.children().to_vec())
                .await?;
            plan = plan.with_root(snapshot);
        }

        let written = plan.root().clone();
        self.writer.commit(reference, plan).await?;
        Ok(written)
    }

    /// Delete a component's stored data.
    ///
    /// A hook implementing `del` runs first and sees the existing data. A
    /// missing key is not an error.
    pub async fn del(&self, reference: &str) -> Result<()> {
        let path = ComponentPath::parse(reference)?;
        let key = path.store_key();

        let existing = match read_data(self.store.as_ref(), &key).await {
            Ok(data) => Some(data),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e),
        };

        if let Some(hook) = self.hook(&path) {
            if let Some(pending) = hook.del(reference, existing) {
                debug!(reference, component = %path.name, "delegating del to component hook");
                pending.await.map_err(|source| RegistryError::Hook {
                    reference: reference.to_string(),
                    operation: "del",
                    source,
                })?;
            }
        }

        info!(reference, key = %key, "deleting component");
        self.store
            .del(&key)
            .await
            .map_err(|source| RegistryError::Upstream {
                reference: reference.to_string(),
                source,
            })
    }

    fn hook(&self, path: &ComponentPath) -> Option<Arc<dyn ComponentHook>> {
        self.files.component_hook(&path.name)
    }
}

fn expect_object(
    path: &ComponentPath,
    operation: &'static str,
    value: Value,
) -> Result<ComponentData> {
    if !value.is_object() {
        let kind = json_kind(&value);
        warn!(component = %path.name, operation, kind, "hook returned non-object data");
        return Err(RegistryError::ContractViolation {
            component: path.name.clone(),
            operation,
            reason: format!("expected an object, got {kind}"),
        });
    }
    Ok(ComponentData::try_from(value).map_err(KilnError::from)?)
}
