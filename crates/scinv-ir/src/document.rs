//! Document representation for the inventory tree
#![allow(clippy::must_use_candidate)] // Accessor API intentionally omits pervasive #[must_use].

use crate::metadata::SourceInfo;
use crate::node::{Node, NodeId};
use serde::{Deserialize, Serialize};

/// A document: an arena of nodes with one root
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    nodes: Vec<Node>,

    root: NodeId,

    /// Document-level metadata
    pub metadata: DocumentMetadata,
}

/// Metadata associated with a document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Where the document was loaded from
    pub source: Option<SourceInfo>,

    /// Namespace URI selected for structural queries
    pub namespace: Option<String>,

    /// Schema version label matching `namespace`
    pub schema_version: Option<String>,
}

impl Document {
    /// Create a new document with the given root node
    pub fn new(root: Node) -> Self {
        Self::with_metadata(root, DocumentMetadata::default())
    }

    /// Create a new document with metadata
    pub fn with_metadata(mut root: Node, metadata: DocumentMetadata) -> Self {
        root.parent = None;
        root.children.clear();
        Self {
            nodes: vec![root],
            root: NodeId(0),
            metadata,
        }
    }

    /// Handle of the root element
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Borrow a node if the handle belongs to this document
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    /// Mutably borrow a node if the handle belongs to this document
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }

    /// Borrow a node
    ///
    /// # Panics
    ///
    /// Panics if `id` was not produced by this document.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// Mutably borrow a node
    ///
    /// # Panics
    ///
    /// Panics if `id` was not produced by this document.
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    /// Check that a handle was minted by this document
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ForeignNode`] for out-of-range handles.
    pub fn check(&self, id: NodeId) -> crate::Result<()> {
        if id.0 < self.nodes.len() {
            Ok(())
        } else {
            Err(crate::Error::ForeignNode { id: id.0 })
        }
    }

    /// Child handles in document order
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map_or(&[], |n| n.children.as_slice())
    }

    /// Parent handle
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.parent)
    }

    /// Append a node as the last child of `parent`
    pub fn append_child(&mut self, parent: NodeId, mut node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        node.parent = Some(parent);
        node.children.clear();
        self.nodes.push(node);
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Detach `child` from `parent`. The arena slot stays allocated but is
    /// no longer reachable from the root.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        let Some(parent_node) = self.nodes.get_mut(parent.0) else {
            return false;
        };
        let Some(pos) = parent_node.children.iter().position(|c| *c == child) else {
            return false;
        };
        parent_node.children.remove(pos);
        self.nodes[child.0].parent = None;
        true
    }

    /// True if the node can be reached from the root
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut current = id;
        loop {
            if current == self.root {
                return true;
            }
            match self.parent(current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// First direct child with the given namespace and local name
    pub fn find_child(&self, id: NodeId, namespace: &str, local: &str) -> Option<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .find(|c| self.nodes[c.0].matches(namespace, local))
    }

    /// All direct children with the given namespace and local name
    pub fn find_children(&self, id: NodeId, namespace: &str, local: &str) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|c| self.nodes[c.0].matches(namespace, local))
            .collect()
    }

    /// All descendants (not including `id`) with the given namespace and
    /// local name, in document order
    pub fn find_descendants(&self, id: NodeId, namespace: &str, local: &str) -> Vec<NodeId> {
        self.descendants(id)
            .filter(|d| self.nodes[d.0].matches(namespace, local))
            .collect()
    }

    /// Trimmed text of the first matching direct child, if present and non-empty
    pub fn child_text(&self, id: NodeId, namespace: &str, local: &str) -> Option<&str> {
        self.find_child(id, namespace, local)
            .map(|c| self.nodes[c.0].trimmed_text())
            .filter(|t| !t.is_empty())
    }

    /// Pre-order iterator over the descendants of `id`
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        let mut stack: Vec<NodeId> = self.children(id).to_vec();
        stack.reverse();
        Descendants { doc: self, stack }
    }

    /// Number of allocated nodes, attached or not
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// A document always has a root, so this only reports `false`
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Pre-order descendant iterator
pub struct Descendants<'a> {
    doc: &'a Document,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        self.stack
            .extend(self.doc.children(id).iter().rev().copied());
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{Position, SourceInfo};

    const NS: &str = "urn:test";

    fn sample() -> (Document, NodeId, NodeId, NodeId) {
        let mut doc = Document::new(Node::in_namespace("seiscomp", NS));
        let inv = doc.append_child(doc.root(), Node::in_namespace("Inventory", NS));
        let net = doc.append_child(inv, Node::in_namespace("network", NS));
        let sta = doc.append_child(net, Node::in_namespace("station", NS));
        doc.append_child(sta, Node::in_namespace("latitude", NS).with_text(" 52.1 "));
        (doc, inv, net, sta)
    }

    #[test]
    fn test_document_creation() {
        let doc = Document::new(Node::new("root"));
        assert_eq!(doc.node(doc.root()).name, "root");
        assert!(doc.metadata.source.is_none());
        assert_eq!(doc.len(), 1);
    }

    #[test]
    fn test_document_with_metadata() {
        let metadata = DocumentMetadata {
            source: Some(SourceInfo::new("inventory.xml", Position::new(1, 1, 0, 42))),
            namespace: Some(NS.to_string()),
            schema_version: Some("0.12".to_string()),
        };
        let doc = Document::with_metadata(Node::new("root"), metadata);
        assert_eq!(doc.metadata.schema_version.as_deref(), Some("0.12"));
        assert_eq!(doc.metadata.source.as_ref().map(|s| s.position.length), Some(42));
    }

    #[test]
    fn test_find_child_and_descendants() {
        let (doc, inv, net, sta) = sample();
        assert_eq!(doc.find_child(doc.root(), NS, "Inventory"), Some(inv));
        assert_eq!(doc.find_descendants(doc.root(), NS, "station"), vec![sta]);
        assert_eq!(doc.find_children(inv, NS, "network"), vec![net]);
        assert!(doc.find_child(doc.root(), "urn:other", "Inventory").is_none());
    }

    #[test]
    fn test_child_text_trims_and_filters_empty() {
        let (mut doc, _, _, sta) = sample();
        assert_eq!(doc.child_text(sta, NS, "latitude"), Some("52.1"));
        doc.append_child(sta, Node::in_namespace("place", NS).with_text("   "));
        assert_eq!(doc.child_text(sta, NS, "place"), None);
    }

    #[test]
    fn test_descendants_preorder() {
        let (doc, ..) = sample();
        let names: Vec<_> = doc
            .descendants(doc.root())
            .map(|id| doc.node(id).name.clone())
            .collect();
        assert_eq!(names, vec!["Inventory", "network", "station", "latitude"]);
    }

    #[test]
    fn test_remove_child_detaches() {
        let (mut doc, _, _, sta) = sample();
        let lat = doc.find_child(sta, NS, "latitude").unwrap();
        assert!(doc.remove_child(sta, lat));
        assert!(!doc.remove_child(sta, lat));
        assert!(!doc.is_attached(lat));
        assert!(doc.is_attached(sta));
        assert!(doc.children(sta).is_empty());
    }

    #[test]
    fn test_check_rejects_foreign_handle() {
        let (doc, ..) = sample();
        assert!(doc.check(NodeId(1)).is_ok());
        assert_eq!(
            doc.check(NodeId(99)),
            Err(crate::Error::ForeignNode { id: 99 })
        );
    }
}
