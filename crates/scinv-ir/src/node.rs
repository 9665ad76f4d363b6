//! Node types for the inventory tree

use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle to a node stored in a [`Document`](crate::Document) arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Position of the node in its document's arena
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An element attribute; attributes keep their source order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    /// Qualified attribute name as written (e.g. `publicID`, `xmlns:sc3`)
    pub name: String,

    /// Unescaped attribute value
    pub value: String,
}

/// An element in the tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Local element name (e.g. `stream`)
    pub name: String,

    /// Resolved namespace URI, if the element is bound to one
    pub namespace: Option<String>,

    /// Prefix the element was written with (e.g. `sc3`)
    pub prefix: Option<String>,

    /// Character data directly inside the element
    pub text: Option<String>,

    /// Attributes in source order
    pub attributes: Vec<Attribute>,

    pub(crate) children: Vec<NodeId>,

    pub(crate) parent: Option<NodeId>,
}

impl Node {
    /// Create a new unbound element
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            prefix: None,
            text: None,
            attributes: Vec::new(),
            children: Vec::new(),
            parent: None,
        }
    }

    /// Create an element bound to a namespace
    pub fn in_namespace(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        let mut node = Self::new(name);
        node.namespace = Some(namespace.into());
        node
    }

    /// Set the text content
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Set the written prefix
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Builder-style attribute setter
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// Qualified name as it appears in markup (`prefix:name` or `name`)
    #[must_use]
    pub fn qualified_name(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}:{}", self.name),
            None => self.name.clone(),
        }
    }

    /// True if this element has the given local name inside the given namespace
    #[must_use]
    pub fn matches(&self, namespace: &str, local: &str) -> bool {
        self.name == local && self.namespace.as_deref() == Some(namespace)
    }

    /// Look up an attribute value by name
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Set an attribute, replacing the value in place if it already exists
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|a| a.name == name) {
            Some(existing) => existing.value = value,
            None => self.attributes.push(Attribute { name, value }),
        }
    }

    /// Remove an attribute, returning its former value
    pub fn remove_attribute(&mut self, name: &str) -> Option<String> {
        let idx = self.attributes.iter().position(|a| a.name == name)?;
        Some(self.attributes.remove(idx).value)
    }

    /// Text content with surrounding whitespace removed; empty if absent
    #[must_use]
    pub fn trimmed_text(&self) -> &str {
        self.text.as_deref().map_or("", str::trim)
    }

    /// Child handles in document order
    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Parent handle, `None` for the root or a detached node
    #[must_use]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attributes_keep_source_order_on_update() {
        let mut node = Node::new("stream")
            .with_attribute("publicID", "Stream/1")
            .with_attribute("code", "HHZ");

        node.set_attribute("publicID", "Stream/2");
        node.set_attribute("sensor", "Sensor/1");

        let names: Vec<_> = node.attributes.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["publicID", "code", "sensor"]);
        assert_eq!(node.attribute("publicID"), Some("Stream/2"));
    }

    #[test]
    fn test_remove_attribute_returns_old_value() {
        let mut node = Node::new("station").with_attribute("name", "Alpha");
        assert_eq!(node.remove_attribute("name"), Some("Alpha".to_string()));
        assert_eq!(node.remove_attribute("name"), None);
        assert!(node.attributes.is_empty());
    }

    #[test]
    fn test_qualified_name_uses_prefix() {
        let plain = Node::in_namespace("gain", "urn:x");
        let prefixed = Node::in_namespace("gain", "urn:x").with_prefix("sc3");
        assert_eq!(plain.qualified_name(), "gain");
        assert_eq!(prefixed.qualified_name(), "sc3:gain");
    }

    #[test]
    fn test_matches_requires_namespace() {
        let node = Node::in_namespace("network", "urn:a");
        assert!(node.matches("urn:a", "network"));
        assert!(!node.matches("urn:b", "network"));
        assert!(!Node::new("network").matches("urn:a", "network"));
    }

    #[test]
    fn test_trimmed_text_handles_missing_and_padded() {
        assert_eq!(Node::new("x").trimmed_text(), "");
        assert_eq!(Node::new("x").with_text("  1.5\n").trimmed_text(), "1.5");
    }
}
