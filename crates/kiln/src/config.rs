//! Configuration for component lookup and reference resolution

use crate::error::{ConfigError, Result};
use crate::template::DEFAULT_TEMPLATE_NAME;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default bound on nested reference resolution
pub const DEFAULT_MAX_REFERENCE_DEPTH: usize = 10;

/// Kiln configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KilnConfig {
    /// Directory holding one subdirectory per component
    pub components_dir: PathBuf,

    /// Template base names to search for, in precedence order
    pub template_names: Vec<String>,

    /// Maximum chain of nested references followed during resolution
    pub max_reference_depth: usize,
}

impl KilnConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let components_dir = std::env::var("KILN_COMPONENTS_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.components_dir);

        let template_names = match std::env::var("KILN_TEMPLATE_NAMES") {
            Ok(names) => parse_template_names(&names)?,
            Err(_) => defaults.template_names,
        };

        let max_reference_depth = match std::env::var("KILN_MAX_REFERENCE_DEPTH") {
            Ok(depth) => parse_depth(&depth)?,
            Err(_) => defaults.max_reference_depth,
        };

        Ok(Self {
            components_dir,
            template_names,
            max_reference_depth,
        })
    }
}

impl Default for KilnConfig {
    fn default() -> Self {
        Self {
            components_dir: PathBuf::from("components"),
            template_names: vec![DEFAULT_TEMPLATE_NAME.to_string()],
            max_reference_depth: DEFAULT_MAX_REFERENCE_DEPTH,
        }
    }
}

fn parse_template_names(raw: &str) -> std::result::Result<Vec<String>, ConfigError> {
    let names: Vec<String> = raw
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    if names.is_empty() {
        return Err(ConfigError::Environment {
            var: "KILN_TEMPLATE_NAMES".to_string(),
            reason: "at least one template name is required".to_string(),
        });
    }
    Ok(names)
}

fn parse_depth(raw: &str) -> std::result::Result<usize, ConfigError> {
    let depth: usize = raw.trim().parse().map_err(|_| ConfigError::Environment {
        var: "KILN_MAX_REFERENCE_DEPTH".to_string(),
        reason: format!("invalid value: {raw}"),
    })?;

    if depth == 0 {
        return Err(ConfigError::InvalidConfig {
            setting: "max_reference_depth".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    Ok(depth)
}
