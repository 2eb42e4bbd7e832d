//! Template discovery
//!
//! A component's template lives in its base directory as
//! `<template name>.<extension>`, e.g. `template.nunjucks`. Several template
//! names may be configured; earlier names win, and within one name the
//! lexicographically first file wins.

use crate::error::{Result, TemplateError};
use crate::files::ComponentFiles;
use crate::path::get_name;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use walkdir::WalkDir;

pub const DEFAULT_TEMPLATE_NAME: &str = "template";

/// Finds template files for components
#[derive(Clone)]
pub struct TemplateLocator {
    files: Arc<dyn ComponentFiles>,
    template_names: Vec<String>,
}

impl TemplateLocator {
    pub fn new(files: Arc<dyn ComponentFiles>) -> Self {
        Self {
            files,
            template_names: vec![DEFAULT_TEMPLATE_NAME.to_string()],
        }
    }

    /// Set the template names to search for, in precedence order
    pub fn with_template_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.template_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn template_names(&self) -> &[String] {
        &self.template_names
    }

    /// The template for the component named by `reference`
    pub fn get_template(&self, reference: &str) -> Result<PathBuf> {
        let name = get_name(reference)?;
        let template = self
            .candidates_for(&name)?
            .into_iter()
            .next()
            .ok_or(TemplateError::NotFound { name })?;

        debug!(reference, template = %template.display(), "located template");
        Ok(template)
    }

    /// Every template file for the component, in precedence order
    pub fn candidates(&self, reference: &str) -> Result<Vec<PathBuf>> {
        let name = get_name(reference)?;
        self.candidates_for(&name)
    }

    fn candidates_for(&self, name: &str) -> Result<Vec<PathBuf>> {
        let Some(dir) = self.files.component_path(name) else {
            return Ok(Vec::new());
        };

        let entries = list_files(&dir)?;
        let mut found = Vec::new();
        for template_name in &self.template_names {
            let mut matches: Vec<&PathBuf> = entries
                .iter()
                .filter(|path| is_template_file(path, template_name))
                .collect();
            matches.sort();
            found.extend(matches.into_iter().cloned());
        }

        Ok(found)
    }
}

/// Regular files directly inside `dir`
fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| TemplateError::Search {
            dir: dir.display().to_string(),
            reason: e.to_string(),
        })?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Matches `<template_name>.<ext>` with a non-empty extension
fn is_template_file(path: &Path, template_name: &str) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.strip_prefix(template_name))
        .and_then(|rest| rest.strip_prefix('.'))
        .is_some_and(|ext| !ext.is_empty())
}
