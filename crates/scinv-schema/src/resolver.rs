//! Namespace detection for parsed documents

use crate::model::{ReferenceAddressing, SampleRateEncoding, SchemaVersion};
use crate::registry::SchemaRegistry;
use crate::{Error, Result};
use scinv_ir::{Document, NodeId};
use tracing::{debug, info};

/// Local name of the container holding every network and component
pub const INVENTORY_ELEMENT: &str = "Inventory";

/// Outcome of schema detection for one document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSchema {
    /// Matched revision
    pub version: SchemaVersion,

    /// Namespace URI exactly as bound on the `Inventory` element
    pub namespace: String,

    /// The `Inventory` element
    pub inventory: NodeId,
}

impl ResolvedSchema {
    /// Namespace URI used for every structural query
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.version.label
    }

    #[must_use]
    pub fn addressing(&self) -> ReferenceAddressing {
        self.version.addressing
    }

    #[must_use]
    pub fn sample_rate(&self) -> SampleRateEncoding {
        self.version.sample_rate
    }
}

/// Selects the namespace revision a document is written in
pub struct SchemaResolver<'a> {
    registry: &'a SchemaRegistry,
    preferred: Option<String>,
}

impl<'a> SchemaResolver<'a> {
    pub fn new(registry: &'a SchemaRegistry) -> Self {
        Self {
            registry,
            preferred: None,
        }
    }

    /// Revision to try first when the document declares none of the known URIs
    #[must_use]
    pub fn with_preferred(mut self, label: impl Into<String>) -> Self {
        self.preferred = Some(label.into());
        self
    }

    /// Detect the revision of `doc` and locate its `Inventory` element.
    ///
    /// Declared namespaces on the root are tried first, then the preferred
    /// or latest revision, then every registered revision in order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Structure`] when no supported namespace yields an
    /// `Inventory` element directly under the root.
    pub fn resolve(&self, doc: &Document) -> Result<ResolvedSchema> {
        let declared = self.declared_versions(doc);
        if let Some(resolved) = declared.iter().find_map(|v| Self::probe(doc, v)) {
            info!(
                "Detected schema {} ({})",
                resolved.label(),
                resolved.namespace
            );
            return Ok(resolved);
        }

        let fallback = self
            .preferred
            .as_deref()
            .and_then(|label| self.registry.get(label))
            .or_else(|| self.registry.latest());
        if let Some(version) = fallback {
            debug!("No declared namespace matched, trying {}", version.label);
            if let Some(resolved) = Self::probe(doc, version) {
                return Ok(resolved);
            }
        }

        for version in self.registry.iter() {
            if let Some(resolved) = Self::probe(doc, version) {
                info!(
                    "Detected schema {} by probing ({})",
                    resolved.label(),
                    resolved.namespace
                );
                return Ok(resolved);
            }
        }

        Err(Error::Structure)
    }

    /// Revisions named by the root's own namespace and its `xmlns` declarations
    fn declared_versions(&self, doc: &Document) -> Vec<&'a SchemaVersion> {
        let root = doc.node(doc.root());
        let declarations = root
            .attributes
            .iter()
            .filter(|a| a.name == "xmlns" || a.name.starts_with("xmlns:"))
            .map(|a| a.value.as_str());

        let mut versions: Vec<&'a SchemaVersion> = Vec::new();
        for uri in root.namespace.as_deref().into_iter().chain(declarations) {
            if let Some(version) = self.registry.matching(uri) {
                if !versions.iter().any(|v| v.label == version.label) {
                    debug!("Root declares schema {} via {}", version.label, uri);
                    versions.push(version);
                }
            }
        }
        versions
    }

    fn probe(doc: &Document, version: &SchemaVersion) -> Option<ResolvedSchema> {
        doc.children(doc.root()).iter().copied().find_map(|id| {
            let node = doc.node(id);
            let namespace = node.namespace.as_deref()?;
            (node.name == INVENTORY_ELEMENT && version.matches_uri(namespace)).then(|| {
                ResolvedSchema {
                    version: version.clone(),
                    namespace: namespace.to_string(),
                    inventory: id,
                }
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SEISCOMP3_NAMESPACE_BASE;
    use scinv_ir::Node;

    fn ns(label: &str) -> String {
        format!("{SEISCOMP3_NAMESPACE_BASE}{label}")
    }

    fn document(root_ns: &str, inventory_ns: &str) -> Document {
        let root = Node::in_namespace("seiscomp", root_ns).with_attribute("xmlns", root_ns);
        let mut doc = Document::new(root);
        doc.append_child(doc.root(), Node::in_namespace("Inventory", inventory_ns));
        doc
    }

    #[test]
    fn test_resolves_declared_namespace() {
        let registry = SchemaRegistry::seiscomp3();
        let doc = document(&ns("0.11"), &ns("0.11"));
        let resolved = SchemaResolver::new(&registry).resolve(&doc).unwrap();
        assert_eq!(resolved.label(), "0.11");
        assert_eq!(resolved.namespace(), ns("0.11"));
        assert_eq!(doc.node(resolved.inventory).name, "Inventory");
    }

    #[test]
    fn test_probes_when_declaration_is_unknown() {
        let registry = SchemaRegistry::seiscomp3();
        let doc = document("urn:wrapper", &ns("0.10"));
        let resolved = SchemaResolver::new(&registry)
            .with_preferred("0.13")
            .resolve(&doc)
            .unwrap();
        assert_eq!(resolved.label(), "0.10");
    }

    #[test]
    fn test_keeps_actual_uri_when_decorated() {
        let registry = SchemaRegistry::seiscomp3();
        let decorated = format!("{}/", ns("0.12"));
        let doc = document(&decorated, &decorated);
        let resolved = SchemaResolver::new(&registry).resolve(&doc).unwrap();
        assert_eq!(resolved.label(), "0.12");
        assert_eq!(resolved.namespace(), decorated);
    }

    #[test]
    fn test_missing_inventory_is_structure_error() {
        let registry = SchemaRegistry::seiscomp3();
        let doc = Document::new(Node::in_namespace("seiscomp", ns("0.12")));
        let err = SchemaResolver::new(&registry).resolve(&doc).unwrap_err();
        assert_eq!(err, Error::Structure);
        assert!(err.to_string().starts_with("Invalid inventory structure"));
    }

    #[test]
    fn test_unsupported_namespace_is_structure_error() {
        let registry = SchemaRegistry::seiscomp3();
        let doc = document("urn:other", "urn:other");
        assert_eq!(
            SchemaResolver::new(&registry).resolve(&doc),
            Err(Error::Structure)
        );
    }
}
