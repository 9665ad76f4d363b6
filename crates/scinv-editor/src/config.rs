//! Editor configuration
//!
//! Loaded from YAML or JSON; every key is optional.
//!
//! ```yaml
//! backup_suffix: .bak
//! keep_backup: false
//! indent_unit: "  "
//! default_schema: "0.12"
//! addressing:
//!   "0.10": serial_number
//!   "0.12": attribute_reference
//! reject_duplicate_ids: true
//! debounce_ms: 750
//! ```

use crate::{Error, Result};
use scinv_schema::{ReferenceAddressing, SchemaRegistry};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Appended to the full file name to form the backup path
    pub backup_suffix: String,

    /// Keep the backup after a successful save
    pub keep_backup: bool,

    /// Indentation step for blocks with no child line to copy from
    pub indent_unit: String,

    /// Schema label tried first when a document declares no known namespace
    pub default_schema: Option<String>,

    /// Per-version addressing overrides
    pub addressing: BTreeMap<String, ReferenceAddressing>,

    /// Refuse edits against identifiers that occur more than once
    pub reject_duplicate_ids: bool,

    /// Quiet period before a debounced save
    pub debounce_ms: u64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            backup_suffix: ".bak".to_string(),
            keep_backup: false,
            indent_unit: "  ".to_string(),
            default_schema: None,
            addressing: BTreeMap::new(),
            reject_duplicate_ids: true,
            debounce_ms: 750,
        }
    }
}

impl EditorConfig {
    /// Load from a file, choosing YAML or JSON by extension
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read and [`Error::Config`]
    /// if its content is invalid.
    pub fn from_file(path: &Path) -> Result<Self> {
        trace!("Loading editor config from {:?}", path);
        let content = std::fs::read_to_string(path)?;

        if path
            .extension()
            .is_some_and(|e| e == "yaml" || e == "yml")
        {
            Self::from_yaml(&content)
        } else {
            Self::from_json(&content)
        }
    }

    /// # Errors
    ///
    /// Returns [`Error::Config`] for malformed JSON or invalid values.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("JSON parse error: {e}")))?;
        config.checked()
    }

    /// # Errors
    ///
    /// Returns [`Error::Config`] for malformed YAML or invalid values.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| Error::Config(format!("YAML parse error: {e}")))?;
        config.checked()
    }

    fn checked(self) -> Result<Self> {
        if self.backup_suffix.is_empty() {
            return Err(Error::Config("backup_suffix must not be empty".to_string()));
        }
        if self.indent_unit.chars().any(|c| c != ' ' && c != '\t') {
            return Err(Error::Config(
                "indent_unit may only contain spaces and tabs".to_string(),
            ));
        }
        Ok(self)
    }

    /// The SeisComP3 registry with this configuration's addressing overrides
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if an override or `default_schema` names an
    /// unknown schema version.
    pub fn registry(&self) -> Result<SchemaRegistry> {
        let mut registry = SchemaRegistry::seiscomp3();
        for (label, addressing) in &self.addressing {
            registry.set_addressing(label, *addressing)?;
        }
        if let Some(label) = &self.default_schema {
            if !registry.contains(label) {
                return Err(Error::Config(format!("unknown default_schema '{label}'")));
            }
        }
        Ok(registry)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}
