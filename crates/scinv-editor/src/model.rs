//! Typed inventory façade
//!
//! Reads go through the [`DocumentStore`]; updates are validated as a
//! whole record, applied to the in-memory tree and recorded in the change
//! tracker. Nothing touches the file until [`InventoryModel::save`].

use crate::addressing::AddressingStrategy;
use crate::config::EditorConfig;
use crate::debounce::SaveDebouncer;
use crate::persistence::{FileSystem, PersistenceController, Storage};
use crate::records::{
    DATE_FIELDS, DataloggerRecord, EmptyAttribute, EntityRecord, LocationRecord, NetworkRecord,
    SampleRate, SensorRecord, StationRecord, StreamRecord,
};
use crate::reference::{ReferenceIndex, StreamLink};
use crate::store::{DocumentStore, InventoryDocument};
use crate::{Error, Result};
use scinv_ir::{Document, Node, NodeId, Traversal};
use scinv_schema::{ComponentKind, EntityKind, LinkTarget, ReferenceAddressing};
use scinv_validation::{DateTimeNormalizer, ValidationEngine};
use scinv_xml::{ChangeTracker, NetworkReader};
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

const ID_ATTRIBUTE: &str = "publicID";

/// Outcome of a successful load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadSummary {
    pub path: PathBuf,
    pub schema: String,
    pub networks: usize,
    pub components: usize,
    /// Components left out of the reference index
    pub skipped: usize,
    pub duplicates: usize,
}

impl fmt::Display for LoadSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Loaded {} (schema {}, {} networks, {} components",
            self.path.display(),
            self.schema,
            self.networks,
            self.components
        )?;
        if self.skipped > 0 {
            write!(f, ", {} components not indexed", self.skipped)?;
        }
        if self.duplicates > 0 {
            write!(f, ", {} duplicate identifiers", self.duplicates)?;
        }
        write!(f, ")")
    }
}

/// Outcome of a successful save
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveSummary {
    pub path: PathBuf,
    /// Entities whose edits were written
    pub entities: usize,
}

impl fmt::Display for SaveSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Saved {} ({} entities changed)",
            self.path.display(),
            self.entities
        )
    }
}

/// Receives editable entities in document order, for building tree views
pub trait InventoryVisitor {
    /// `depth` is 0 for networks and components, 1 for stations and so on
    fn visit(&mut self, kind: EntityKind, public_id: Option<&str>, node: NodeId, depth: usize);
}

struct EntityWalker<'a, V> {
    namespace: &'a str,
    inventory: NodeId,
    visitor: &'a mut V,
}

impl<V: InventoryVisitor> Traversal for EntityWalker<'_, V> {
    fn visit(&mut self, doc: &Document, id: NodeId, path: &[String]) {
        let node = doc.node(id);
        if node.namespace.as_deref() != Some(self.namespace) {
            return;
        }
        let Some(kind) = EntityKind::from_tag(&node.name) else {
            return;
        };
        // Name-addressed streams have <sensor>/<datalogger> fields
        if kind.is_component() && doc.parent(id) != Some(self.inventory) {
            return;
        }
        self.visitor.visit(
            kind,
            node.attribute(ID_ATTRIBUTE),
            id,
            path.len().saturating_sub(1),
        );
    }
}

fn normalized(tag: &str, value: &str) -> String {
    let value = value.trim();
    if DATE_FIELDS.contains(&tag) {
        DateTimeNormalizer::normalize(value).unwrap_or_else(|_| value.to_string())
    } else {
        value.to_string()
    }
}

/// Stored dates in a looser accepted shape are left alone when equivalent
fn same_value(tag: &str, current: &str, value: &str) -> bool {
    current == value
        || (DATE_FIELDS.contains(&tag)
            && DateTimeNormalizer::normalize(current).is_ok_and(|c| c == value))
}

/// Set, replace or remove one child field. Returns true if the tree changed.
fn write_field(
    doc: &mut InventoryDocument,
    tracker: &mut ChangeTracker,
    node: NodeId,
    public_id: &str,
    tag: &str,
    value: &str,
) -> bool {
    let namespace = doc.namespace().to_string();
    let changed = match doc.tree.find_child(node, &namespace, tag) {
        Some(child) if value.is_empty() => doc.tree.remove_child(node, child),
        Some(child) => {
            let field = doc.tree.node_mut(child);
            if same_value(tag, field.trimmed_text(), value) {
                false
            } else {
                field.text = Some(value.to_string());
                true
            }
        }
        None if value.is_empty() => false,
        None => {
            let mut field = Node::in_namespace(tag, namespace).with_text(value);
            field.prefix.clone_from(&doc.tree.node(node).prefix);
            doc.tree.append_child(node, field);
            true
        }
    };
    if changed {
        tracker.record(public_id, tag, value);
    }
    changed
}

/// Set or remove an opening-tag attribute. Returns true if the tree changed.
fn write_attribute(
    doc: &mut InventoryDocument,
    tracker: &mut ChangeTracker,
    node: NodeId,
    public_id: &str,
    name: &str,
    value: Option<&str>,
) -> bool {
    let element = doc.tree.node_mut(node);
    match value {
        None => {
            let removed = element.remove_attribute(name).is_some();
            if removed {
                tracker.record_attribute_removal(public_id, name);
            }
            removed
        }
        Some(value) if element.attribute(name) == Some(value) => false,
        Some(value) => {
            element.set_attribute(name, value);
            tracker.record_attribute(public_id, name, value);
            true
        }
    }
}

fn write_link(
    doc: &mut InventoryDocument,
    tracker: &mut ChangeTracker,
    stream: NodeId,
    stream_id: &str,
    target: LinkTarget,
    value: &str,
) -> bool {
    match target {
        LinkTarget::Field(tag) => write_field(doc, tracker, stream, stream_id, tag, value),
        LinkTarget::Attribute(name) => {
            let value = (!value.is_empty()).then_some(value);
            write_attribute(doc, tracker, stream, stream_id, name, value)
        }
    }
}

/// The editing façade consumed by the presentation layer
#[derive(Debug)]
pub struct InventoryModel<S: Storage = FileSystem> {
    config: EditorConfig,
    store: DocumentStore,
    index: ReferenceIndex,
    tracker: ChangeTracker,
    validation: ValidationEngine,
    persistence: PersistenceController<S>,
    debouncer: SaveDebouncer,
}

impl InventoryModel {
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration names unknown schema
    /// versions.
    pub fn new(config: EditorConfig) -> Result<Self> {
        Self::with_storage(config, FileSystem)
    }
}

impl<S: Storage> InventoryModel<S> {
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration names unknown schema
    /// versions.
    pub fn with_storage(config: EditorConfig, storage: S) -> Result<Self> {
        let mut store = DocumentStore::new(config.registry()?);
        if let Some(label) = &config.default_schema {
            store = store.with_preferred(label.clone());
        }
        Ok(Self {
            persistence: PersistenceController::with_storage(&config, storage),
            debouncer: SaveDebouncer::new(config.debounce()),
            index: ReferenceIndex::new(ReferenceAddressing::default()),
            tracker: ChangeTracker::new(),
            validation: ValidationEngine::new(),
            store,
            config,
        })
    }

    /// Replace the field validation rules
    #[must_use]
    pub fn with_validation(mut self, engine: ValidationEngine) -> Self {
        self.validation = engine;
        self
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn references(&self) -> &ReferenceIndex {
        &self.index
    }

    pub fn persistence(&self) -> &PersistenceController<S> {
        &self.persistence
    }

    /// Edits recorded since the last load or save
    pub fn pending(&self) -> &ChangeTracker {
        &self.tracker
    }

    pub fn is_modified(&self) -> bool {
        !self.tracker.is_empty()
    }

    /// Load a file, replacing the current document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`], [`Error::Parse`] or [`Error::Structure`]. On
    /// failure the previously loaded document, index and pending edits are
    /// untouched.
    pub fn load(&mut self, path: &Path) -> Result<LoadSummary> {
        let raw = std::fs::read_to_string(path)?;
        self.load_text(path, raw)
    }

    /// As [`load`](Self::load), with the file content already read
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] or [`Error::Structure`].
    pub fn load_text(&mut self, path: &Path, raw: String) -> Result<LoadSummary> {
        self.store.load_text(path, raw)?;
        let doc = self.store.require()?;
        let (index, skipped) = ReferenceIndex::build(
            &doc.tree,
            &doc.schema,
            &self.store.get_sensors(),
            &self.store.get_dataloggers(),
            &self.store.all_streams(),
        );
        let summary = LoadSummary {
            path: doc.path.clone(),
            schema: doc.schema.label().to_string(),
            networks: self.store.get_networks().len(),
            components: index.len(),
            skipped: skipped.len(),
            duplicates: doc.duplicates().len(),
        };

        self.index = index;
        self.tracker.clear();
        self.debouncer.cancel();
        info!("{}", summary);
        Ok(summary)
    }

    pub fn close(&mut self) {
        self.store.close();
        self.index = ReferenceIndex::new(ReferenceAddressing::default());
        self.tracker.clear();
        self.debouncer.cancel();
    }

    /// Write pending edits into the file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoDocument`], [`Error::Write`] or [`Error::Patch`].
    /// Pending edits are kept when the save fails.
    pub fn save(&mut self) -> Result<SaveSummary> {
        let path = self.store.require()?.path.clone();
        let raw = self.persistence.save(&path, &self.tracker)?;
        let summary = SaveSummary {
            path,
            entities: self.tracker.len(),
        };
        self.store.replace_raw(raw);
        self.tracker.clear();
        self.debouncer.cancel();
        Ok(summary)
    }

    /// Save if the debounce period after the last edit has elapsed
    ///
    /// # Errors
    ///
    /// As [`save`](Self::save).
    pub fn save_if_due(&mut self, now: Instant) -> Result<Option<SaveSummary>> {
        if self.debouncer.take_due(now) {
            self.save().map(Some)
        } else {
            Ok(None)
        }
    }

    pub fn debouncer(&self) -> &SaveDebouncer {
        &self.debouncer
    }

    /// Swap the backup back in and reload it. Returns `false` if there is
    /// no backup.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoDocument`], or a write or load error.
    pub fn restore_backup(&mut self) -> Result<bool> {
        let path = self.store.require()?.path.clone();
        if !self.persistence.restore_backup(&path)? {
            return Ok(false);
        }
        self.load(&path)?;
        Ok(true)
    }

    /// Forward-only pass over the network blocks of the loaded file
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoDocument`] or [`Error::Io`].
    pub fn lazy_networks(&self) -> Result<NetworkReader<BufReader<File>>> {
        self.store.lazy_networks()
    }

    /// Visit networks, stations, locations, streams and components
    pub fn walk<V: InventoryVisitor>(&self, visitor: &mut V) {
        let Some(doc) = self.store.document() else {
            return;
        };
        let mut walker = EntityWalker {
            namespace: doc.namespace(),
            inventory: doc.schema.inventory,
            visitor,
        };
        scinv_ir::walk(&doc.tree, doc.schema.inventory, &mut walker);
    }

    /// `(label, key)` pairs for a sensor or datalogger picker
    pub fn component_choices(&self, kind: ComponentKind) -> Vec<(String, String)> {
        self.index.choices(kind)
    }

    /// # Errors
    ///
    /// Returns [`Error::State`] if the file cannot be written.
    pub fn save_reference_state(&self, path: &Path) -> Result<()> {
        self.index.save_state(path)
    }

    /// # Errors
    ///
    /// Returns [`Error::State`] if the file is unreadable or malformed.
    pub fn load_reference_state(&mut self, path: &Path) -> Result<()> {
        self.index.load_state(path)
    }

    // Reads

    fn entity<R: EntityRecord>(&self, node: NodeId) -> Result<&InventoryDocument> {
        let doc = self.store.require()?;
        let element = doc
            .tree
            .get(node)
            .filter(|_| doc.tree.is_attached(node))
            .ok_or_else(|| {
                Error::untracked(R::KIND.tag(), "node is not part of the loaded document")
            })?;
        if !element.matches(doc.namespace(), R::KIND.tag()) {
            return Err(Error::untracked(
                element.qualified_name(),
                format!("expected a {} element", R::KIND),
            ));
        }
        Ok(doc)
    }

    fn read<R: EntityRecord>(&self, node: NodeId) -> Result<R> {
        let doc = self.entity::<R>(node)?;
        let element = doc.tree.node(node);
        let mut record = R::default();
        for (name, _) in R::ATTRIBUTES {
            if let (Some(slot), Some(value)) = (record.slot(name), element.attribute(name)) {
                *slot = value.to_string();
            }
        }
        for tag in R::FIELDS {
            if let Some(slot) = record.slot(tag) {
                *slot = self.store.get_field_text(node, tag, "");
            }
        }
        Ok(record)
    }

    /// # Errors
    ///
    /// Returns [`Error::NoDocument`] or [`Error::UntrackedEntity`] if `node`
    /// is not a network of the loaded document.
    pub fn get_network_data(&self, node: NodeId) -> Result<NetworkRecord> {
        self.read(node)
    }

    /// # Errors
    ///
    /// As [`get_network_data`](Self::get_network_data).
    pub fn get_station_data(&self, node: NodeId) -> Result<StationRecord> {
        self.read(node)
    }

    /// # Errors
    ///
    /// As [`get_network_data`](Self::get_network_data).
    pub fn get_location_data(&self, node: NodeId) -> Result<LocationRecord> {
        self.read(node)
    }

    /// # Errors
    ///
    /// As [`get_network_data`](Self::get_network_data).
    pub fn get_sensor_data(&self, node: NodeId) -> Result<SensorRecord> {
        self.read(node)
    }

    /// # Errors
    ///
    /// As [`get_network_data`](Self::get_network_data).
    pub fn get_datalogger_data(&self, node: NodeId) -> Result<DataloggerRecord> {
        self.read(node)
    }

    /// Stream fields plus its sample rate in whichever encoding the element
    /// carries and its component links in the document's addressing.
    ///
    /// # Errors
    ///
    /// As [`get_network_data`](Self::get_network_data).
    pub fn get_stream_data(&self, node: NodeId) -> Result<StreamRecord> {
        let mut record: StreamRecord = self.read(node)?;
        let doc = self.store.require()?;
        let namespace = doc.namespace();
        let present = |tag| doc.tree.find_child(node, namespace, tag).is_some();
        let text = |tag| self.store.get_field_text(node, tag, "");

        record.sample_rate = if present(SampleRate::NUMERATOR) || present(SampleRate::DENOMINATOR) {
            SampleRate::Fraction {
                numerator: text(SampleRate::NUMERATOR),
                denominator: text(SampleRate::DENOMINATOR),
            }
        } else if present(SampleRate::SINGLE) {
            SampleRate::Single(text(SampleRate::SINGLE))
        } else {
            SampleRate::empty(doc.schema.sample_rate())
        };

        let strategy = self.index.strategy();
        record.sensor = strategy
            .read_link(&doc.tree, namespace, node, ComponentKind::Sensor)
            .unwrap_or_default();
        record.datalogger = strategy
            .read_link(&doc.tree, namespace, node, ComponentKind::Datalogger)
            .unwrap_or_default();
        Ok(record)
    }

    // Updates

    /// publicID of an updatable entity
    fn tracked_id<R: EntityRecord>(&self, node: NodeId) -> Result<String> {
        let doc = self.entity::<R>(node)?;
        let element = doc.tree.node(node);
        let public_id = element
            .attribute(ID_ATTRIBUTE)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::untracked(element.qualified_name(), "no publicID"))?;
        if self.config.reject_duplicate_ids && doc.is_duplicate(public_id) {
            return Err(Error::DuplicateIdentifier(public_id.to_string()));
        }
        Ok(public_id.to_string())
    }

    /// Validate the whole record, then apply attributes and fields
    fn update_record<R: EntityRecord>(
        &mut self,
        node: NodeId,
        record: &R,
        extra_fields: &[(&'static str, String)],
    ) -> Result<bool> {
        let public_id = self.tracked_id::<R>(node)?;

        let attributes: Vec<(&'static str, Option<String>)> = R::ATTRIBUTES
            .iter()
            .filter_map(|(name, empty)| {
                let value = record.value(name).unwrap_or_default().trim();
                match (value.is_empty(), empty) {
                    (true, EmptyAttribute::Ignore) => None,
                    (true, EmptyAttribute::Remove) => Some((*name, None)),
                    _ => Some((*name, Some(value.to_string()))),
                }
            })
            .collect();
        let mut fields: Vec<(&'static str, String)> = R::FIELDS
            .iter()
            .map(|tag| (*tag, normalized(tag, record.value(tag).unwrap_or_default())))
            .collect();
        fields.extend(extra_fields.iter().cloned());

        let checked = attributes
            .iter()
            .filter_map(|(name, value)| value.as_deref().map(|v| (*name, v)))
            .chain(fields.iter().map(|(tag, value)| (*tag, value.as_str())));
        let report = self.validation.validate_record(R::KIND, checked);
        if !report.is_valid() {
            return Err(Error::Validation(report));
        }
        for warning in report.warnings() {
            warn!("{} {}: {}", R::KIND, public_id, warning);
        }

        let doc = self.store.require_mut()?;
        let mut changed = false;
        for (name, value) in &attributes {
            changed |= write_attribute(
                doc,
                &mut self.tracker,
                node,
                &public_id,
                name,
                value.as_deref(),
            );
        }
        for (tag, value) in &fields {
            changed |= write_field(doc, &mut self.tracker, node, &public_id, tag, value);
        }

        if changed {
            debug!("Updated {} {}", R::KIND, public_id);
            self.debouncer.touch(Instant::now());
        }
        Ok(changed)
    }

    /// Write refreshed link values into dependent streams
    fn apply_links(&mut self, links: Vec<StreamLink>) -> Result<bool> {
        let doc = self.store.require_mut()?;
        let mut changed = false;
        for link in links {
            let Some(stream) = doc.find_by_id(&link.stream_id) else {
                warn!("Dependent stream {} is no longer in the document", link.stream_id);
                continue;
            };
            changed |= write_link(
                doc,
                &mut self.tracker,
                stream,
                &link.stream_id,
                link.target,
                &link.value,
            );
        }
        Ok(changed)
    }

    /// Bring the reference index in line with a component's edited serial
    /// number and name
    fn sync_component(&mut self, node: NodeId, kind: ComponentKind) -> Result<()> {
        let doc = self.store.require()?;
        let element = doc.tree.node(node);
        let Some(public_id) = element.attribute(ID_ATTRIBUTE).map(str::to_string) else {
            return Ok(());
        };
        let serial = doc
            .tree
            .child_text(node, doc.namespace(), "serialNumber")
            .unwrap_or_default()
            .to_string();
        let name = element.attribute("name").unwrap_or_default().to_string();

        let Some(mapping) = self.index.by_id(&public_id) else {
            // Not indexed at load; it may have gained its key now
            if let Err(err) = self.index.register(&doc.tree, doc.namespace(), node, kind) {
                debug!("{} still not indexed: {}", public_id, err);
            }
            return Ok(());
        };
        let (old_serial, old_name) = (mapping.serial_number.clone(), mapping.name.clone());

        let mut links = Vec::new();
        if old_serial != serial {
            links.extend(self.index.update_serial(&public_id, &serial)?);
        }
        if old_name != name {
            links.extend(self.index.update_name(&public_id, &name)?);
        }
        if !links.is_empty() {
            info!(
                "Refreshing {} stream links after {} was re-keyed",
                links.len(),
                public_id
            );
            self.apply_links(links)?;
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`Error::Validation`] if any value fails its rule, in which
    /// case nothing is written, or the lookup errors of
    /// [`get_network_data`](Self::get_network_data).
    pub fn update_network(&mut self, node: NodeId, record: &NetworkRecord) -> Result<bool> {
        self.update_record(node, record, &[])
    }

    /// An empty `name` removes the attribute.
    ///
    /// # Errors
    ///
    /// As [`update_network`](Self::update_network).
    pub fn update_station(&mut self, node: NodeId, record: &StationRecord) -> Result<bool> {
        self.update_record(node, record, &[])
    }

    /// # Errors
    ///
    /// As [`update_network`](Self::update_network).
    pub fn update_location(&mut self, node: NodeId, record: &LocationRecord) -> Result<bool> {
        self.update_record(node, record, &[])
    }

    /// Also re-keys the reference index when the serial number or name
    /// changes, refreshing the streams that address the sensor by it.
    ///
    /// # Errors
    ///
    /// As [`update_network`](Self::update_network).
    pub fn update_sensor(&mut self, node: NodeId, record: &SensorRecord) -> Result<bool> {
        let changed = self.update_record(node, record, &[])?;
        if changed {
            self.sync_component(node, ComponentKind::Sensor)?;
        }
        Ok(changed)
    }

    /// # Errors
    ///
    /// As [`update_network`](Self::update_network).
    pub fn update_datalogger(&mut self, node: NodeId, record: &DataloggerRecord) -> Result<bool> {
        let changed = self.update_record(node, record, &[])?;
        if changed {
            self.sync_component(node, ComponentKind::Datalogger)?;
        }
        Ok(changed)
    }

    /// Link changes in the record, resolved before anything is written
    fn plan_links(
        &self,
        node: NodeId,
        record: &StreamRecord,
    ) -> Result<Vec<(ComponentKind, Option<String>)>> {
        let doc = self.entity::<StreamRecord>(node)?;
        let strategy = self.index.strategy();
        let mut plan = Vec::new();
        for (kind, wanted) in [
            (ComponentKind::Sensor, record.sensor.trim()),
            (ComponentKind::Datalogger, record.datalogger.trim()),
        ] {
            let current = strategy
                .read_link(&doc.tree, doc.namespace(), node, kind)
                .unwrap_or_default();
            if current == wanted {
                continue;
            }
            if wanted.is_empty() {
                plan.push((kind, None));
                continue;
            }
            let mapping = self
                .index
                .resolve(kind, wanted)
                .ok_or_else(|| Error::UnknownComponent(wanted.to_string()))?;
            plan.push((kind, Some(mapping.public_id.clone())));
        }
        Ok(plan)
    }

    /// Sample rate is written in the record's encoding; changed sensor or
    /// datalogger links must name indexed components.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownComponent`] for unresolvable links, otherwise
    /// as [`update_network`](Self::update_network).
    pub fn update_stream(&mut self, node: NodeId, record: &StreamRecord) -> Result<bool> {
        let plan = self.plan_links(node, record)?;
        let rate: Vec<(&'static str, String)> = record
            .sample_rate
            .fields()
            .into_iter()
            .map(|(tag, value)| (tag, value.trim().to_string()))
            .collect();
        let mut changed = self.update_record(node, record, &rate)?;

        let stream_id = self.tracked_id::<StreamRecord>(node)?;
        for (kind, component) in plan {
            let (target, value) = match component {
                Some(component_id) => {
                    let link = self.index.link(&stream_id, &component_id)?;
                    (link.target, link.value)
                }
                None => {
                    self.index.unlink(&stream_id, kind);
                    (self.index.strategy().link_target(kind), String::new())
                }
            };
            let doc = self.store.require_mut()?;
            changed |= write_link(doc, &mut self.tracker, node, &stream_id, target, &value);
        }
        if changed {
            self.debouncer.touch(Instant::now());
        }
        Ok(changed)
    }

    /// Wire a stream to a component, writing the link value the document's
    /// addressing convention uses.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownComponent`] if the component is not indexed,
    /// or the lookup errors of [`get_stream_data`](Self::get_stream_data).
    pub fn link_stream(&mut self, stream: NodeId, component_id: &str) -> Result<bool> {
        let stream_id = self.tracked_id::<StreamRecord>(stream)?;
        let link = self.index.link(&stream_id, component_id)?;
        let doc = self.store.require_mut()?;
        let changed = write_link(
            doc,
            &mut self.tracker,
            stream,
            &stream_id,
            link.target,
            &link.value,
        );
        if changed {
            self.debouncer.touch(Instant::now());
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NS: &str = "http://geofon.gfz-potsdam.de/ns/seiscomp3-schema/0.12";

    fn xml() -> String {
        format!(
            r#"<seiscomp xmlns="{NS}">
  <Inventory>
    <sensor publicID="Sensor/1" name="STS-2">
      <serialNumber>S1</serialNumber>
      <lowFrequency>0.008</lowFrequency>
    </sensor>
    <datalogger publicID="Datalogger/1" name="Q330">
      <serialNumber>D1</serialNumber>
    </datalogger>
    <network publicID="Network/GE" code="GE">
      <station publicID="Station/GE.APE" code="APE" name="Apirathos">
        <sensorLocation publicID="Location/GE.APE." code="">
          <stream publicID="Stream/GE.APE..BHZ" code="BHZ">
            <sampleRate>20</sampleRate>
            <sensorSerialNumber>S1</sensorSerialNumber>
          </stream>
        </sensorLocation>
      </station>
    </network>
  </Inventory>
</seiscomp>"#
        )
    }

    fn model() -> InventoryModel {
        let mut model = InventoryModel::new(EditorConfig::default()).unwrap();
        model.load_text(Path::new("mem.xml"), xml()).unwrap();
        model
    }

    fn first_stream(model: &InventoryModel) -> NodeId {
        model.store().all_streams()[0]
    }

    #[derive(Default)]
    struct Collect(Vec<(EntityKind, usize)>);

    impl InventoryVisitor for Collect {
        fn visit(&mut self, kind: EntityKind, _: Option<&str>, _: NodeId, depth: usize) {
            self.0.push((kind, depth));
        }
    }

    #[test]
    fn test_load_summary() {
        let mut model = InventoryModel::new(EditorConfig::default()).unwrap();
        let summary = model.load_text(Path::new("mem.xml"), xml()).unwrap();
        assert_eq!(summary.schema, "0.12");
        assert_eq!(summary.networks, 1);
        assert_eq!(summary.components, 2);
        assert!(summary.to_string().starts_with("Loaded mem.xml"));
    }

    #[test]
    fn test_stream_read_picks_encoding_and_links() {
        let model = model();
        let record = model.get_stream_data(first_stream(&model)).unwrap();
        assert_eq!(record.code, "BHZ");
        assert_eq!(record.sample_rate, SampleRate::Single("20".into()));
        assert_eq!(record.sensor, "S1");
        assert_eq!(record.datalogger, "");
        assert_eq!(
            model
                .references()
                .by_serial("S1")
                .unwrap()
                .streams
                .iter()
                .next()
                .map(String::as_str),
            Some("Stream/GE.APE..BHZ")
        );
    }

    #[test]
    fn test_unchanged_record_reports_no_change() {
        let mut model = model();
        let stream = first_stream(&model);
        let record = model.get_stream_data(stream).unwrap();
        assert!(!model.update_stream(stream, &record).unwrap());
        assert!(!model.is_modified());
        assert!(!model.debouncer().is_pending());
    }

    #[test]
    fn test_dates_normalised_before_compare() {
        let mut model = model();
        let network = model.store().get_networks()[0];
        let mut record = model.get_network_data(network).unwrap();
        record.start = "2001-02-03".into();
        assert!(model.update_network(network, &record).unwrap());
        assert_eq!(
            model.get_network_data(network).unwrap().start,
            "2001-02-03T00:00:00.0000Z"
        );

        record.start = "2001-02-03T00:00:00Z".into();
        assert!(!model.update_network(network, &record).unwrap());
    }

    #[test]
    fn test_invalid_record_writes_nothing() {
        let mut model = model();
        let stream = first_stream(&model);
        let mut record = model.get_stream_data(stream).unwrap();
        record.gain = "1000".into();
        record.dip = "-120".into();

        let err = model.update_stream(stream, &record).unwrap_err();
        match err {
            Error::Validation(report) => assert_eq!(report.invalid_fields(), vec!["dip"]),
            other => panic!("expected validation error, got {other:?}"),
        }
        assert!(!model.is_modified());
        assert_eq!(model.get_stream_data(stream).unwrap().gain, "");
    }

    #[test]
    fn test_link_to_unknown_component_rejected() {
        let mut model = model();
        let stream = first_stream(&model);
        let mut record = model.get_stream_data(stream).unwrap();
        record.datalogger = "NOPE".into();
        assert!(matches!(
            model.update_stream(stream, &record),
            Err(Error::UnknownComponent(_))
        ));

        record.datalogger = "D1".into();
        assert!(model.update_stream(stream, &record).unwrap());
        let pending = model.pending().pending_for("Stream/GE.APE..BHZ").unwrap();
        assert_eq!(pending.field("dataloggerSerialNumber"), Some("D1"));
    }

    #[test]
    fn test_sensor_serial_change_refreshes_streams() {
        let mut model = model();
        let sensor = model.store().get_sensors()[0];
        let mut record = model.get_sensor_data(sensor).unwrap();
        record.serial_number = "S1-B".into();
        assert!(model.update_sensor(sensor, &record).unwrap());

        assert!(model.references().by_serial("S1").is_none());
        assert_eq!(
            model.references().by_serial("S1-B").unwrap().public_id,
            "Sensor/1"
        );
        let stream = first_stream(&model);
        assert_eq!(model.get_stream_data(stream).unwrap().sensor, "S1-B");
        assert_eq!(
            model
                .pending()
                .pending_for("Stream/GE.APE..BHZ")
                .unwrap()
                .field("sensorSerialNumber"),
            Some("S1-B")
        );
    }

    #[test]
    fn test_station_name_attribute_rules() {
        let mut model = model();
        let network = model.store().get_networks()[0];
        let station = model.store().get_stations(network)[0];
        let mut record = model.get_station_data(station).unwrap();
        record.code = String::new();
        record.name = String::new();
        assert!(model.update_station(station, &record).unwrap());

        let after = model.get_station_data(station).unwrap();
        assert_eq!(after.code, "APE");
        assert_eq!(after.name, "");
        let pending = model.pending().pending_for("Station/GE.APE").unwrap();
        assert_eq!(pending.attribute("name"), Some(None));
        assert_eq!(pending.attribute("code"), None);
    }

    #[test]
    fn test_wrong_kind_and_no_document() {
        let mut model = model();
        let network = model.store().get_networks()[0];
        assert!(matches!(
            model.get_sensor_data(network),
            Err(Error::UntrackedEntity { .. })
        ));

        model.close();
        assert!(matches!(model.get_network_data(network), Err(Error::NoDocument)));
        assert!(matches!(model.save(), Err(Error::NoDocument)));
    }

    #[test]
    fn test_walk_reports_hierarchy() {
        let model = model();
        let mut visitor = Collect::default();
        model.walk(&mut visitor);
        assert_eq!(
            visitor.0,
            vec![
                (EntityKind::Sensor, 0),
                (EntityKind::Datalogger, 0),
                (EntityKind::Network, 0),
                (EntityKind::Station, 1),
                (EntityKind::SensorLocation, 2),
                (EntityKind::Stream, 3),
            ]
        );
    }

    #[test]
    fn test_component_choices() {
        let model = model();
        assert_eq!(
            model.component_choices(ComponentKind::Sensor),
            vec![("STS-2 (S1)".to_string(), "S1".to_string())]
        );
    }
}
