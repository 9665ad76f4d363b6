//! Registry of supported schema revisions

use crate::model::{ReferenceAddressing, SchemaVersion};
use crate::{Error, Result};
use tracing::debug;

/// Namespace stem shared by the SeisComP3 schema revisions
pub const SEISCOMP3_NAMESPACE_BASE: &str = "http://geofon.gfz-potsdam.de/ns/seiscomp3-schema/";

/// Ordered table of supported revisions, oldest first
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    versions: Vec<SchemaVersion>,
}

impl SchemaRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            versions: Vec::new(),
        }
    }

    /// Registry with the SeisComP3 revisions 0.10 through 0.13
    pub fn seiscomp3() -> Self {
        let mut registry = Self::new();
        for label in ["0.10", "0.11", "0.12", "0.13"] {
            registry.register(SchemaVersion::new(
                label,
                format!("{SEISCOMP3_NAMESPACE_BASE}{label}"),
            ));
        }
        registry
    }

    /// Register a revision, replacing any existing one with the same label
    pub fn register(&mut self, version: SchemaVersion) {
        match self.versions.iter_mut().find(|v| v.label == version.label) {
            Some(existing) => *existing = version,
            None => self.versions.push(version),
        }
    }

    /// Get a revision by label
    pub fn get(&self, label: &str) -> Option<&SchemaVersion> {
        self.versions.iter().find(|v| v.label == label)
    }

    /// Check if a revision exists
    pub fn contains(&self, label: &str) -> bool {
        self.get(label).is_some()
    }

    /// Revision whose namespace a declared URI names
    pub fn matching(&self, uri: &str) -> Option<&SchemaVersion> {
        // Longest namespace first so a more specific URI wins over a prefix of it
        self.versions
            .iter()
            .filter(|v| v.matches_uri(uri))
            .max_by_key(|v| v.namespace.len())
    }

    /// Most recent revision
    pub fn latest(&self) -> Option<&SchemaVersion> {
        self.versions.last()
    }

    /// Revisions oldest first
    pub fn iter(&self) -> impl Iterator<Item = &SchemaVersion> {
        self.versions.iter()
    }

    /// Override the addressing convention of one revision
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `label` is not registered.
    pub fn set_addressing(&mut self, label: &str, addressing: ReferenceAddressing) -> Result<()> {
        let version = self
            .versions
            .iter_mut()
            .find(|v| v.label == label)
            .ok_or_else(|| Error::NotFound(label.to_string()))?;
        debug!("Addressing for schema {} set to {:?}", label, addressing);
        version.addressing = addressing;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::seiscomp3()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seiscomp3_has_four_versions_latest_last() {
        let registry = SchemaRegistry::seiscomp3();
        assert_eq!(registry.len(), 4);
        assert_eq!(registry.latest().map(|v| v.label.as_str()), Some("0.13"));
        assert!(registry.contains("0.10"));
        assert!(!registry.contains("0.9"));
    }

    #[test]
    fn test_matching_picks_declared_revision() {
        let registry = SchemaRegistry::default();
        let uri = format!("{SEISCOMP3_NAMESPACE_BASE}0.11");
        assert_eq!(registry.matching(&uri).map(|v| v.label.as_str()), Some("0.11"));
        assert!(registry.matching("urn:unrelated").is_none());
    }

    #[test]
    fn test_register_replaces_same_label() {
        let mut registry = SchemaRegistry::seiscomp3();
        registry.register(SchemaVersion::new("0.12", "urn:custom"));
        assert_eq!(registry.len(), 4);
        assert_eq!(registry.get("0.12").map(|v| v.namespace.as_str()), Some("urn:custom"));
    }

    #[test]
    fn test_set_addressing_overrides_and_rejects_unknown() {
        let mut registry = SchemaRegistry::seiscomp3();
        registry
            .set_addressing("0.13", ReferenceAddressing::AttributeReference)
            .unwrap();
        assert_eq!(
            registry.get("0.13").map(|v| v.addressing),
            Some(ReferenceAddressing::AttributeReference)
        );
        assert_eq!(
            registry.set_addressing("9.9", ReferenceAddressing::ComponentName),
            Err(Error::NotFound("9.9".to_string()))
        );
    }
}
