//! Namespace-aware XML parser into the arena tree

use crate::{Error, Result};
use quick_xml::NsReader;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use scinv_ir::{Attribute, Document, Node, NodeId, Position, SourceInfo};
use std::path::Path;
use tracing::debug;

/// Incremental tree construction shared by the whole-document parser and
/// the streaming network reader. Errors are plain messages; callers attach
/// a position.
pub(crate) struct TreeBuilder {
    doc: Option<Document>,
    stack: Vec<NodeId>,
}

impl TreeBuilder {
    pub(crate) fn new() -> Self {
        Self {
            doc: None,
            stack: Vec::new(),
        }
    }

    /// Number of currently open elements
    pub(crate) fn depth(&self) -> usize {
        self.stack.len()
    }

    pub(crate) fn open(&mut self, node: Node) -> std::result::Result<(), String> {
        let parent = self.stack.last().copied();
        match (self.doc.as_mut(), parent) {
            (Some(doc), Some(parent)) => {
                let id = doc.append_child(parent, node);
                self.stack.push(id);
                return Ok(());
            }
            (Some(_), None) => return Err("multiple root elements".to_string()),
            (None, _) => {}
        }
        let doc = Document::new(node);
        self.stack.push(doc.root());
        self.doc = Some(doc);
        Ok(())
    }

    /// A self-closing element
    pub(crate) fn leaf(&mut self, node: Node) -> std::result::Result<(), String> {
        self.open(node)?;
        self.close();
        Ok(())
    }

    pub(crate) fn close(&mut self) {
        let Some(id) = self.stack.pop() else {
            return;
        };
        if let Some(node) = self.doc.as_mut().and_then(|d| d.get_mut(id)) {
            if node.text.as_deref().is_some_and(|t| t.trim().is_empty()) {
                node.text = None;
            }
        }
    }

    pub(crate) fn text(&mut self, text: &str) -> std::result::Result<(), String> {
        match (self.doc.as_mut(), self.stack.last().copied()) {
            (Some(doc), Some(top)) => {
                doc.node_mut(top)
                    .text
                    .get_or_insert_with(String::new)
                    .push_str(text);
                Ok(())
            }
            _ if text.trim().is_empty() => Ok(()),
            _ => Err("text outside the root element".to_string()),
        }
    }

    pub(crate) fn finish(self) -> std::result::Result<Document, String> {
        if let (Some(doc), Some(open)) = (self.doc.as_ref(), self.stack.last()) {
            return Err(format!(
                "unexpected end of document, <{}> is not closed",
                doc.node(*open).qualified_name()
            ));
        }
        self.doc
            .ok_or_else(|| "document has no root element".to_string())
    }
}

/// Build a node from a start tag and its resolved namespace
pub(crate) fn element(
    resolved: &ResolveResult<'_>,
    start: &BytesStart<'_>,
) -> std::result::Result<Node, String> {
    let local_name = start.local_name();
    let local = utf8(local_name.as_ref())?;
    let mut node = Node::new(local);

    match resolved {
        ResolveResult::Bound(Namespace(ns)) => node.namespace = Some(utf8(ns)?.to_string()),
        ResolveResult::Unbound => {}
        ResolveResult::Unknown(prefix) => {
            return Err(format!(
                "unbound namespace prefix '{}'",
                String::from_utf8_lossy(prefix)
            ));
        }
    }

    if let Some(prefix) = start.name().prefix() {
        node.prefix = Some(utf8(prefix.as_ref())?.to_string());
    }

    for attr in start.attributes() {
        let attr = attr.map_err(|e| e.to_string())?;
        let name = utf8(attr.key.as_ref())?.to_string();
        let value = attr.unescape_value().map_err(|e| e.to_string())?;
        node.attributes.push(Attribute {
            name,
            value: value.into_owned(),
        });
    }

    Ok(node)
}

/// Apply one character-data event to the builder
pub(crate) fn character_data(
    builder: &mut TreeBuilder,
    event: &Event<'_>,
) -> std::result::Result<(), String> {
    match event {
        Event::Text(t) => {
            let text = t.unescape().map_err(|e| e.to_string())?;
            builder.text(&text)
        }
        Event::CData(c) => builder.text(utf8(c)?),
        _ => Ok(()),
    }
}

fn utf8(bytes: &[u8]) -> std::result::Result<&str, String> {
    std::str::from_utf8(bytes).map_err(|e| format!("invalid UTF-8: {e}"))
}

fn located(text: &str, offset: usize, message: String) -> Error {
    let pos = Position::from_offset(text, offset);
    Error::parse(pos.line, pos.column, message)
}

/// Parse a complete document held in memory.
///
/// Element and attribute order, prefixes and resolved namespaces are kept;
/// comments, processing instructions and whitespace-only text are dropped
/// from the tree (they survive in the raw text the patcher works on).
///
/// # Errors
///
/// Returns [`Error::Parse`] with line and column for malformed markup,
/// unbound prefixes, unclosed elements and documents without a root.
pub fn parse_str(text: &str, source: &str) -> Result<Document> {
    let body = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut reader = NsReader::from_str(body);
    let mut builder = TreeBuilder::new();

    loop {
        let step = match reader.read_resolved_event() {
            Ok((ns, Event::Start(e))) => element(&ns, &e).and_then(|n| builder.open(n)),
            Ok((ns, Event::Empty(e))) => element(&ns, &e).and_then(|n| builder.leaf(n)),
            Ok((_, Event::End(_))) => {
                builder.close();
                Ok(())
            }
            Ok((_, Event::Eof)) => break,
            Ok((_, event)) => character_data(&mut builder, &event),
            Err(e) => Err(e.to_string()),
        };
        if let Err(message) = step {
            let offset = usize::try_from(reader.buffer_position()).unwrap_or(usize::MAX);
            return Err(located(body, offset, message));
        }
    }

    let mut doc = builder
        .finish()
        .map_err(|m| located(body, body.len(), m))?;
    doc.metadata.source =
        Some(SourceInfo::new(source, Position::new(1, 1, 0, text.len())).loaded_now());
    debug!("Parsed {} ({} nodes)", source, doc.len());
    Ok(doc)
}

/// Read and parse a file, returning the tree together with the raw text
/// it was built from.
///
/// # Errors
///
/// Returns [`Error::Io`] if the file cannot be read and [`Error::Parse`]
/// for malformed content.
pub fn parse_file(path: &Path) -> Result<(Document, String)> {
    let raw = std::fs::read_to_string(path)?;
    let doc = parse_str(&raw, &path.display().to_string())?;
    Ok((doc, raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    const NS: &str = "http://geofon.gfz-potsdam.de/ns/seiscomp3-schema/0.12";

    #[test]
    fn test_parse_resolves_default_namespace() {
        let xml = format!(
            r#"<?xml version="1.0"?>
<seiscomp xmlns="{NS}" version="0.12">
  <Inventory>
    <network publicID="Network/GE" code="GE">
      <description>GEOFON &amp; friends</description>
    </network>
  </Inventory>
</seiscomp>"#
        );
        let doc = parse_str(&xml, "test.xml").unwrap();
        let root = doc.node(doc.root());
        assert_eq!(root.name, "seiscomp");
        assert_eq!(root.namespace.as_deref(), Some(NS));
        assert_eq!(root.attribute("xmlns"), Some(NS));
        assert!(root.text.is_none());

        let net = doc.find_descendants(doc.root(), NS, "network")[0];
        assert_eq!(doc.node(net).attribute("code"), Some("GE"));
        assert_eq!(doc.child_text(net, NS, "description"), Some("GEOFON & friends"));
    }

    #[test]
    fn test_parse_keeps_prefix() {
        let xml = format!(r#"<sc3:seiscomp xmlns:sc3="{NS}"><sc3:Inventory/></sc3:seiscomp>"#);
        let doc = parse_str(&xml, "prefixed.xml").unwrap();
        let inv = doc.find_child(doc.root(), NS, "Inventory").unwrap();
        assert_eq!(doc.node(inv).prefix.as_deref(), Some("sc3"));
        assert_eq!(doc.node(inv).qualified_name(), "sc3:Inventory");
    }

    #[test]
    fn test_parse_attribute_order_and_escapes() {
        let doc = parse_str(r#"<a z="1" b="x &lt; y" m="3"/>"#, "a.xml").unwrap();
        let names: Vec<_> = doc
            .node(doc.root())
            .attributes
            .iter()
            .map(|a| a.name.as_str())
            .collect();
        assert_eq!(names, vec!["z", "b", "m"]);
        assert_eq!(doc.node(doc.root()).attribute("b"), Some("x < y"));
    }

    #[test]
    fn test_parse_cdata_and_comments() {
        let doc = parse_str("<a><!-- note --><b><![CDATA[1 < 2]]></b></a>", "a.xml").unwrap();
        let b = doc.children(doc.root())[0];
        assert_eq!(doc.node(b).trimmed_text(), "1 < 2");
    }

    #[test]
    fn test_parse_mismatched_tag_reports_line() {
        let err = parse_str("<a>\n  <b>\n  </c>\n</a>", "bad.xml").unwrap_err();
        match err {
            Error::Parse { line, .. } => assert!(line >= 2),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_unclosed_element() {
        let err = parse_str("<a><b>text</b>", "bad.xml").unwrap_err();
        assert!(err.to_string().contains("<a> is not closed"));
    }

    #[test]
    fn test_parse_empty_input() {
        let err = parse_str("   ", "empty.xml").unwrap_err();
        assert!(err.to_string().contains("no root element"));
    }

    #[test]
    fn test_parse_unbound_prefix() {
        let err = parse_str("<x:a/>", "bad.xml").unwrap_err();
        assert!(err.to_string().contains("unbound namespace prefix"));
    }

    #[test]
    fn test_parse_records_source() {
        let doc = parse_str("<a/>", "inventory.xml").unwrap();
        let source = doc.metadata.source.unwrap();
        assert_eq!(source.source, "inventory.xml");
        assert_eq!(source.position.length, 4);
        assert!(source.loaded_at.is_some());
    }
}
