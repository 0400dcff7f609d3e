//! Engine options
//!
//! The attribute-encoded declaration surface. Options are a plain value
//! threaded into extraction, resolution and evaluation; defaults are applied
//! once when an [`Engine`](crate::Engine) is built.
//!
//! Loadable from YAML or TOML:
//! ```yaml
//! data_prefix: "data-"
//! binding_prefix: "@"
//! reference_attribute: "id@"
//! separator: "@"
//! root_marker: "at"
//! debug: false
//! max_reference_depth: 64
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DataEventError, Result};
use crate::util::casing;

/// Default cap on reference hops before giving up
pub const DEFAULT_MAX_REFERENCE_DEPTH: usize = 64;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Options {
    /// Attribute prefix of declarative data (`data-@fill` → data key `@fill`)
    pub data_prefix: String,

    /// Data key prefix marking a managed binding
    pub binding_prefix: String,

    /// Data key holding a node's reference id
    pub reference_attribute: String,

    /// Splits a shorthand reference `<id><sep><attribute>`
    pub separator: String,

    /// Data key marking dispatch roots; `None` dispatches from the given node only
    pub root_marker: Option<String>,

    /// Record structured trace records for each dispatch step
    pub debug: bool,

    /// Maximum reference hops followed from a single binding
    pub max_reference_depth: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            data_prefix: "data-".into(),
            binding_prefix: "@".into(),
            reference_attribute: "id@".into(),
            separator: "@".into(),
            root_marker: Some("at".into()),
            debug: false,
            max_reference_depth: DEFAULT_MAX_REFERENCE_DEPTH,
        }
    }
}

impl Options {
    /// Parse options from YAML (missing fields take their defaults)
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let options: Self = serde_yaml::from_str(yaml).map_err(|e| DataEventError::ConfigError {
            reason: format!("Failed to parse YAML options: {}", e),
        })?;
        options.validate()
    }

    /// Parse options from TOML (missing fields take their defaults)
    pub fn from_toml(content: &str) -> Result<Self> {
        let options: Self = toml::from_str(content).map_err(|e| DataEventError::ConfigError {
            reason: format!("Failed to parse TOML options: {}", e),
        })?;
        options.validate()
    }

    /// Load options from a `.toml`, `.yaml` or `.yml` file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| DataEventError::ConfigError {
            reason: format!("Failed to read {}: {}", path.display(), e),
        })?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml(&content),
            Some("yaml") | Some("yml") => Self::from_yaml(&content),
            other => Err(DataEventError::ConfigError {
                reason: format!("Unsupported config extension: {:?}", other.unwrap_or("")),
            }),
        }
    }

    /// Enable or disable trace recording
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Check invariants the engine relies on and bring data keys into the
    /// camelCase form attributes are read in (`managed-root` → `managedRoot`)
    pub fn validate(mut self) -> Result<Self> {
        let empty = [
            ("binding_prefix", &self.binding_prefix),
            ("reference_attribute", &self.reference_attribute),
            ("separator", &self.separator),
        ]
        .into_iter()
        .find(|(_, value)| value.is_empty());

        if let Some((field, _)) = empty {
            return Err(DataEventError::ConfigError {
                reason: format!("{} cannot be empty", field),
            });
        }
        if self.root_marker.as_deref() == Some("") {
            return Err(DataEventError::ConfigError {
                reason: "root_marker cannot be empty (use null to dispatch from the given node only)".into(),
            });
        }
        if self.binding_prefix.ends_with('-') {
            return Err(DataEventError::ConfigError {
                reason: format!(
                    "binding_prefix '{}' cannot end with '-' (the dash folds into the binding key)",
                    self.binding_prefix
                ),
            });
        }
        if self.max_reference_depth == 0 {
            return Err(DataEventError::ConfigError {
                reason: "max_reference_depth must be at least 1".into(),
            });
        }

        self.binding_prefix = camel_key(&self.binding_prefix);
        self.reference_attribute = camel_key(&self.reference_attribute);
        self.root_marker = self.root_marker.as_deref().map(camel_key);
        Ok(self)
    }

    /// Full attribute name of a data key (`id@` → `data-id@`)
    pub fn data_attribute(&self, data_key: &str) -> String {
        format!("{}{}", self.data_prefix, data_key)
    }
}

fn camel_key(key: &str) -> String {
    casing::data_key(key, "").unwrap_or_else(|| key.to_string())
}
