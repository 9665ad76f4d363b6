//! Streaming reader yielding one network block at a time
//!
//! Large inventories are read forward-only: each `network` directly under
//! `Inventory` becomes its own small [`Document`] and is dropped by the
//! caller when done. Everything outside network blocks (sensors,
//! dataloggers, responses) is skipped without being materialised.

use crate::parser::{TreeBuilder, character_data, element};
use crate::{Error, Result};
use quick_xml::NsReader;
use quick_xml::events::Event;
use quick_xml::name::{Namespace, ResolveResult};
use scinv_ir::{Document, Node, Position, SourceInfo};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, trace};

enum Step {
    Network(std::result::Result<Node, String>),
    NetworkLeaf(std::result::Result<Node, String>),
    Open(Vec<u8>),
    Close,
    Skip,
    Eof,
    Fail(String),
}

/// Forward-only iterator over the network blocks of an inventory
pub struct NetworkReader<R: BufRead> {
    reader: NsReader<R>,
    buf: Vec<u8>,
    source: String,
    namespace: Option<String>,
    /// Local names of open elements outside any network block
    path: Vec<Vec<u8>>,
    count: usize,
    done: bool,
}

impl NetworkReader<BufReader<File>> {
    /// Open a file for streaming
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be opened.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file), path.display().to_string()))
    }
}

impl<R: BufRead> NetworkReader<R> {
    pub fn new(reader: R, source: impl Into<String>) -> Self {
        Self {
            reader: NsReader::from_reader(reader),
            buf: Vec::new(),
            source: source.into(),
            namespace: None,
            path: Vec::new(),
            count: 0,
            done: false,
        }
    }

    /// Only yield networks bound to exactly this namespace URI
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Number of network blocks yielded so far
    pub fn count_read(&self) -> usize {
        self.count
    }

    fn offset(&self) -> usize {
        usize::try_from(self.reader.buffer_position()).unwrap_or(usize::MAX)
    }

    fn error(&self, message: impl Into<String>) -> Error {
        // Line and column are unknown without the full text
        Error::parse(
            0,
            0,
            format!("{} (byte {} of {})", message.into(), self.offset(), self.source),
        )
    }

    fn next_network(&mut self) -> Result<Option<Document>> {
        loop {
            let start = self.offset();
            let at_inventory = self.path.len() == 2 && self.path[1] == b"Inventory";
            let filter = self.namespace.as_deref();

            self.buf.clear();
            let step = match self.reader.read_resolved_event_into(&mut self.buf) {
                Ok((ns, Event::Start(e))) => {
                    if at_inventory && is_network(&ns, e.local_name().as_ref(), filter) {
                        Step::Network(element(&ns, &e))
                    } else {
                        Step::Open(e.local_name().as_ref().to_vec())
                    }
                }
                Ok((ns, Event::Empty(e))) => {
                    if at_inventory && is_network(&ns, e.local_name().as_ref(), filter) {
                        Step::NetworkLeaf(element(&ns, &e))
                    } else {
                        Step::Skip
                    }
                }
                Ok((_, Event::End(_))) => Step::Close,
                Ok((_, Event::Eof)) => Step::Eof,
                Ok(_) => Step::Skip,
                Err(e) => Step::Fail(e.to_string()),
            };

            match step {
                Step::Network(node) => {
                    let node = node.map_err(|m| self.error(m))?;
                    let doc = self.read_block(node, start)?;
                    return Ok(Some(doc));
                }
                Step::NetworkLeaf(node) => {
                    let node = node.map_err(|m| self.error(m))?;
                    let doc = self.finish_block(Document::new(node), start);
                    return Ok(Some(doc));
                }
                Step::Open(name) => self.path.push(name),
                Step::Close => {
                    self.path.pop();
                }
                Step::Skip => {}
                Step::Eof => {
                    if let Some(open) = self.path.last() {
                        let name = String::from_utf8_lossy(open).into_owned();
                        return Err(self.error(format!(
                            "unexpected end of document, <{name}> is not closed"
                        )));
                    }
                    debug!("Streamed {} network blocks from {}", self.count, self.source);
                    return Ok(None);
                }
                Step::Fail(message) => return Err(self.error(message)),
            }
        }
    }

    fn read_block(&mut self, root: Node, start: usize) -> Result<Document> {
        let mut builder = TreeBuilder::new();
        builder.open(root).map_err(|m| self.error(m))?;

        while builder.depth() > 0 {
            self.buf.clear();
            let step = match self.reader.read_resolved_event_into(&mut self.buf) {
                Ok((ns, Event::Start(e))) => element(&ns, &e).and_then(|n| builder.open(n)),
                Ok((ns, Event::Empty(e))) => element(&ns, &e).and_then(|n| builder.leaf(n)),
                Ok((_, Event::End(_))) => {
                    builder.close();
                    Ok(())
                }
                Ok((_, Event::Eof)) => Err("unexpected end of document inside network".to_string()),
                Ok((_, event)) => character_data(&mut builder, &event),
                Err(e) => Err(e.to_string()),
            };
            step.map_err(|m| self.error(m))?;
        }

        let doc = builder.finish().map_err(|m| self.error(m))?;
        Ok(self.finish_block(doc, start))
    }

    fn finish_block(&mut self, mut doc: Document, start: usize) -> Document {
        let end = self.offset();
        let namespace = doc.node(doc.root()).namespace.clone();
        doc.metadata.namespace = namespace;
        doc.metadata.source = Some(
            SourceInfo::new(
                self.source.clone(),
                Position::new(0, 0, start, end.saturating_sub(start)),
            )
            .with_context(format!("network block {}", self.count))
            .loaded_now(),
        );
        trace!("Network block {} read ({} nodes)", self.count, doc.len());
        self.count += 1;
        doc
    }
}

fn is_network(resolved: &ResolveResult<'_>, local: &[u8], filter: Option<&str>) -> bool {
    if local != b"network" {
        return false;
    }
    match (resolved, filter) {
        (_, None) => true,
        (ResolveResult::Bound(Namespace(ns)), Some(wanted)) => *ns == wanted.as_bytes(),
        _ => false,
    }
}

impl<R: BufRead> Iterator for NetworkReader<R> {
    type Item = Result<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_network() {
            Ok(Some(doc)) => Some(Ok(doc)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const NS: &str = "http://geofon.gfz-potsdam.de/ns/seiscomp3-schema/0.11";

    fn inventory() -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<seiscomp xmlns="{NS}" version="0.11">
  <Inventory>
    <sensor publicID="Sensor/1" name="STS-2"><serialNumber>S1</serialNumber></sensor>
    <network publicID="Network/GE" code="GE">
      <station publicID="Station/GE.APE" code="APE"/>
    </network>
    <network publicID="Network/II" code="II"/>
    <network publicID="Network/IU" code="IU">
      <description>Global</description>
    </network>
  </Inventory>
</seiscomp>"#
        )
    }

    #[test]
    fn test_yields_each_network() {
        let xml = inventory();
        let codes: Vec<String> = NetworkReader::new(xml.as_bytes(), "inv.xml")
            .map(|doc| {
                let doc = doc.unwrap();
                doc.node(doc.root()).attribute("code").unwrap().to_string()
            })
            .collect();
        assert_eq!(codes, vec!["GE", "II", "IU"]);
    }

    #[test]
    fn test_block_contents_and_metadata() {
        let xml = inventory();
        let mut reader = NetworkReader::new(xml.as_bytes(), "inv.xml").with_namespace(NS);
        let first = reader.next().unwrap().unwrap();
        assert_eq!(first.find_children(first.root(), NS, "station").len(), 1);
        assert_eq!(first.metadata.namespace.as_deref(), Some(NS));
        let source = first.metadata.source.unwrap();
        assert_eq!(source.context.as_deref(), Some("network block 0"));
        assert!(source.position.length > 0);
        assert_eq!(reader.count_read(), 1);
    }

    #[test]
    fn test_namespace_filter_excludes_others() {
        let xml = inventory();
        let reader = NetworkReader::new(xml.as_bytes(), "inv.xml").with_namespace("urn:other");
        assert_eq!(reader.count(), 0);
    }

    #[test]
    fn test_truncated_input_errors_then_stops() {
        let xml = format!(r#"<seiscomp xmlns="{NS}"><Inventory><network code="GE"><station>"#);
        let mut reader = NetworkReader::new(xml.as_bytes(), "cut.xml");
        assert!(matches!(reader.next(), Some(Err(Error::Parse { .. }))));
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_open_file_matches_full_parse() -> anyhow::Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(inventory().as_bytes())?;

        let (doc, raw) = crate::parse_file(file.path())?;
        assert_eq!(raw, inventory());
        let networks = doc.find_descendants(doc.root(), NS, "network").len();

        let streamed = NetworkReader::open(file.path())?
            .with_namespace(NS)
            .collect::<Result<Vec<_>>>()?;
        assert_eq!(streamed.len(), networks);
        Ok(())
    }
}
