//! Loaded document and structural queries

use crate::{Error, Result};
use scinv_ir::{Document, NodeId};
use scinv_schema::{EntityKind, ResolvedSchema, SchemaRegistry, SchemaResolver};
use scinv_xml::NetworkReader;
use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const ID_ATTRIBUTE: &str = "publicID";

/// A parsed inventory together with the text it was parsed from
#[derive(Debug, Clone)]
pub struct InventoryDocument {
    pub path: PathBuf,
    /// File content as loaded, or as last written by a save
    pub raw: String,
    pub tree: Document,
    pub schema: ResolvedSchema,
    duplicates: BTreeSet<String>,
}

impl InventoryDocument {
    /// Identifiers that occur on more than one element
    pub fn duplicates(&self) -> &BTreeSet<String> {
        &self.duplicates
    }

    pub fn is_duplicate(&self, public_id: &str) -> bool {
        self.duplicates.contains(public_id)
    }

    pub fn namespace(&self) -> &str {
        self.schema.namespace()
    }

    /// Attached element carrying `public_id`
    pub fn find_by_id(&self, public_id: &str) -> Option<NodeId> {
        let root = self.tree.root();
        std::iter::once(root)
            .chain(self.tree.descendants(root))
            .find(|id| self.tree.node(*id).attribute(ID_ATTRIBUTE) == Some(public_id))
    }
}

fn scan_duplicates(doc: &Document) -> BTreeSet<String> {
    let root = doc.root();
    let mut seen: HashMap<&str, usize> = HashMap::new();
    for id in std::iter::once(root).chain(doc.descendants(root)) {
        if let Some(public_id) = doc.node(id).attribute(ID_ATTRIBUTE) {
            *seen.entry(public_id).or_default() += 1;
        }
    }
    seen.into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(id, count)| {
            warn!("Identifier {} occurs {} times", id, count);
            id.to_string()
        })
        .collect()
}

/// Owns the currently loaded document, if any
#[derive(Debug)]
pub struct DocumentStore {
    registry: SchemaRegistry,
    preferred: Option<String>,
    document: Option<InventoryDocument>,
}

impl DocumentStore {
    pub fn new(registry: SchemaRegistry) -> Self {
        Self {
            registry,
            preferred: None,
            document: None,
        }
    }

    /// Schema label tried before the latest when detection is inconclusive
    #[must_use]
    pub fn with_preferred(mut self, label: impl Into<String>) -> Self {
        self.preferred = Some(label.into());
        self
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Parse and resolve a file, replacing the current document on success.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`], [`Error::Parse`] or [`Error::Structure`]; the
    /// previously loaded document is kept in every failure case.
    pub fn load(&mut self, path: &Path) -> Result<&InventoryDocument> {
        let raw = std::fs::read_to_string(path)?;
        self.load_text(path, raw)
    }

    /// As [`load`](Self::load), with the file content already read
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] or [`Error::Structure`].
    pub fn load_text(&mut self, path: &Path, raw: String) -> Result<&InventoryDocument> {
        let tree = scinv_xml::parse_str(&raw, &path.display().to_string())?;

        let mut resolver = SchemaResolver::new(&self.registry);
        if let Some(label) = &self.preferred {
            resolver = resolver.with_preferred(label.clone());
        }
        let schema = resolver.resolve(&tree)?;
        let duplicates = scan_duplicates(&tree);

        info!(
            "Loaded {:?}: schema {} ({} nodes, {} duplicate identifiers)",
            path,
            schema.label(),
            tree.len(),
            duplicates.len()
        );
        Ok(self.document.insert(InventoryDocument {
            path: path.to_path_buf(),
            raw,
            tree,
            schema,
            duplicates,
        }))
    }

    pub fn document(&self) -> Option<&InventoryDocument> {
        self.document.as_ref()
    }

    pub fn document_mut(&mut self) -> Option<&mut InventoryDocument> {
        self.document.as_mut()
    }

    /// # Errors
    ///
    /// Returns [`Error::NoDocument`] if nothing is loaded.
    pub fn require(&self) -> Result<&InventoryDocument> {
        self.document.as_ref().ok_or(Error::NoDocument)
    }

    /// # Errors
    ///
    /// Returns [`Error::NoDocument`] if nothing is loaded.
    pub fn require_mut(&mut self) -> Result<&mut InventoryDocument> {
        self.document.as_mut().ok_or(Error::NoDocument)
    }

    pub fn is_loaded(&self) -> bool {
        self.document.is_some()
    }

    pub fn close(&mut self) {
        if let Some(doc) = self.document.take() {
            debug!("Closed {:?}", doc.path);
        }
    }

    fn children_of(&self, parent: Option<NodeId>, kind: EntityKind) -> Vec<NodeId> {
        match (&self.document, parent) {
            (Some(doc), Some(parent)) => {
                doc.tree.find_children(parent, doc.namespace(), kind.tag())
            }
            _ => Vec::new(),
        }
    }

    fn inventory(&self) -> Option<NodeId> {
        self.document.as_ref().map(|doc| doc.schema.inventory)
    }

    pub fn get_networks(&self) -> Vec<NodeId> {
        self.children_of(self.inventory(), EntityKind::Network)
    }

    pub fn get_stations(&self, network: NodeId) -> Vec<NodeId> {
        self.children_of(Some(network), EntityKind::Station)
    }

    pub fn get_locations(&self, station: NodeId) -> Vec<NodeId> {
        self.children_of(Some(station), EntityKind::SensorLocation)
    }

    pub fn get_streams(&self, location: NodeId) -> Vec<NodeId> {
        self.children_of(Some(location), EntityKind::Stream)
    }

    /// Every stream in the document, in document order
    pub fn all_streams(&self) -> Vec<NodeId> {
        self.get_networks()
            .into_iter()
            .flat_map(|n| self.get_stations(n))
            .flat_map(|s| self.get_locations(s))
            .flat_map(|l| self.get_streams(l))
            .collect()
    }

    pub fn get_sensors(&self) -> Vec<NodeId> {
        self.children_of(self.inventory(), EntityKind::Sensor)
    }

    pub fn get_dataloggers(&self) -> Vec<NodeId> {
        self.children_of(self.inventory(), EntityKind::Datalogger)
    }

    /// Text of a direct child field, or `default` when absent or empty
    pub fn get_field_text(&self, node: NodeId, tag: &str, default: &str) -> String {
        self.document
            .as_ref()
            .and_then(|doc| {
                doc.tree.get(node)?;
                doc.tree.child_text(node, doc.namespace(), tag)
            })
            .unwrap_or(default)
            .to_string()
    }

    /// Forward-only reader over the network blocks of the loaded file.
    /// Each call starts a fresh pass.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoDocument`] if nothing is loaded and [`Error::Io`]
    /// if the file cannot be opened.
    pub fn lazy_networks(&self) -> Result<NetworkReader<BufReader<File>>> {
        let doc = self.require()?;
        let reader = NetworkReader::open(&doc.path)?;
        Ok(reader.with_namespace(doc.namespace()))
    }

    /// Record the text a save wrote, so later saves patch from it
    pub(crate) fn replace_raw(&mut self, raw: String) {
        if let Some(doc) = self.document.as_mut() {
            doc.raw = raw;
        }
    }
}
