//! Cross-entity reference index
//!
//! Maps sensors and dataloggers by serial number and by name, and records
//! which streams use each one. The index is a plain value owned by the
//! model, so several documents can be open side by side in tests.

use crate::addressing::{AddressingStrategy, strategy_for};
use crate::{Error, Result};
use scinv_ir::{Document, NodeId};
use scinv_schema::{ComponentKind, LinkTarget, ReferenceAddressing, ResolvedSchema};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use tracing::{debug, info, warn};

/// One registered sensor or datalogger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceMapping {
    pub public_id: String,
    pub serial_number: String,
    pub kind: ComponentKind,
    pub name: String,
    /// publicIDs of the streams wired to this component
    pub streams: BTreeSet<String>,
}

/// A link value that must be written into a stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamLink {
    pub stream_id: String,
    pub target: LinkTarget,
    pub value: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexState {
    references: BTreeMap<String, MappingState>,
    serial_map: BTreeMap<String, String>,
    #[serde(default)]
    name_map: BTreeMap<String, String>,
    namespaces: BTreeMap<String, String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct MappingState {
    serial_number: String,
    #[serde(rename = "type")]
    kind: ComponentKind,
    name: String,
    streams: BTreeSet<String>,
}

#[derive(Debug)]
pub struct ReferenceIndex {
    strategy: Box<dyn AddressingStrategy>,
    references: BTreeMap<String, ReferenceMapping>,
    serial_map: HashMap<String, String>,
    name_map: HashMap<String, String>,
    namespaces: BTreeMap<String, String>,
}

impl ReferenceIndex {
    pub fn new(addressing: ReferenceAddressing) -> Self {
        Self {
            strategy: strategy_for(addressing),
            references: BTreeMap::new(),
            serial_map: HashMap::new(),
            name_map: HashMap::new(),
            namespaces: BTreeMap::new(),
        }
    }

    /// Build the index for a freshly loaded document.
    ///
    /// Components that cannot be keyed are logged and skipped; their errors
    /// are returned alongside the index so the caller can report a degraded
    /// load.
    pub fn build(
        doc: &Document,
        schema: &ResolvedSchema,
        sensors: &[NodeId],
        dataloggers: &[NodeId],
        streams: &[NodeId],
    ) -> (Self, Vec<Error>) {
        let mut index = Self::new(schema.addressing());
        let prefix = doc.node(schema.inventory).prefix.as_deref().unwrap_or("sc3");
        index.add_namespace(prefix, schema.namespace());

        let mut skipped = Vec::new();
        let components = sensors
            .iter()
            .map(|n| (*n, ComponentKind::Sensor))
            .chain(dataloggers.iter().map(|n| (*n, ComponentKind::Datalogger)));
        for (node, kind) in components {
            if let Err(err) = index.register(doc, schema.namespace(), node, kind) {
                warn!("Skipping component: {}", err);
                skipped.push(err);
            }
        }

        for &stream in streams {
            let Some(stream_id) = doc.node(stream).attribute("publicID") else {
                continue;
            };
            for kind in [ComponentKind::Sensor, ComponentKind::Datalogger] {
                let Some(key) = index
                    .strategy
                    .read_link(doc, schema.namespace(), stream, kind)
                else {
                    continue;
                };
                match index.resolve(kind, &key).map(|m| m.public_id.clone()) {
                    Some(component_id) => {
                        if let Some(mapping) = index.references.get_mut(&component_id) {
                            mapping.streams.insert(stream_id.to_string());
                        }
                    }
                    None => debug!("Stream {} refers to unknown {} '{}'", stream_id, kind, key),
                }
            }
        }

        info!(
            "Indexed {} components ({} skipped) using {:?} addressing",
            index.len(),
            skipped.len(),
            index.addressing()
        );
        (index, skipped)
    }

    pub fn addressing(&self) -> ReferenceAddressing {
        self.strategy.addressing()
    }

    pub fn strategy(&self) -> &dyn AddressingStrategy {
        self.strategy.as_ref()
    }

    /// Register a sensor or datalogger node.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ComponentRegistration`] if the node has no
    /// `publicID` or lacks the key the addressing convention needs.
    pub fn register(
        &mut self,
        doc: &Document,
        namespace: &str,
        node: NodeId,
        kind: ComponentKind,
    ) -> Result<&ReferenceMapping> {
        let element = doc.node(node);
        let name = element.attribute("name").unwrap_or_default().trim();
        let public_id = match element.attribute("publicID") {
            Some(id) if !id.is_empty() => id,
            _ => return Err(Error::registration(kind, name, "missing publicID")),
        };

        let mapping = ReferenceMapping {
            public_id: public_id.to_string(),
            serial_number: doc
                .child_text(node, namespace, "serialNumber")
                .unwrap_or_default()
                .to_string(),
            kind,
            name: name.to_string(),
            streams: BTreeSet::new(),
        };
        if self.strategy.key(&mapping).is_empty() {
            return Err(Error::registration(
                kind,
                public_id,
                format!("missing {}", self.strategy.key_name()),
            ));
        }

        debug!(
            "Registered {}: {} -> {}",
            kind, mapping.serial_number, mapping.public_id
        );
        self.insert_keys(&mapping);
        let id = mapping.public_id.clone();
        self.references.insert(id.clone(), mapping);
        Ok(&self.references[&id])
    }

    fn insert_keys(&mut self, mapping: &ReferenceMapping) {
        if !mapping.serial_number.is_empty() {
            if let Some(previous) = self
                .serial_map
                .insert(mapping.serial_number.clone(), mapping.public_id.clone())
                .filter(|p| *p != mapping.public_id)
            {
                warn!(
                    "Serial number {} is shared by {} and {}",
                    mapping.serial_number, previous, mapping.public_id
                );
            }
        }
        if !mapping.name.is_empty() {
            self.name_map
                .insert(mapping.name.clone(), mapping.public_id.clone());
        }
    }

    pub fn by_id(&self, public_id: &str) -> Option<&ReferenceMapping> {
        self.references.get(public_id)
    }

    pub fn by_serial(&self, serial: &str) -> Option<&ReferenceMapping> {
        self.serial_map
            .get(serial)
            .and_then(|id| self.references.get(id))
    }

    pub fn by_name(&self, name: &str) -> Option<&ReferenceMapping> {
        self.name_map.get(name).and_then(|id| self.references.get(id))
    }

    /// Resolve a stored link value of the given component kind
    pub fn resolve(&self, kind: ComponentKind, key: &str) -> Option<&ReferenceMapping> {
        self.strategy
            .resolve(self, key)
            .filter(|mapping| mapping.kind == kind)
    }

    /// Record that `stream_id` uses `component_id`, dropping any earlier
    /// link of the stream to another component of the same kind.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownComponent`] if the component is not indexed.
    pub fn link(&mut self, stream_id: &str, component_id: &str) -> Result<StreamLink> {
        let kind = self
            .references
            .get(component_id)
            .map(|m| m.kind)
            .ok_or_else(|| Error::UnknownComponent(component_id.to_string()))?;
        self.unlink(stream_id, kind);

        let mapping = self
            .references
            .get_mut(component_id)
            .ok_or_else(|| Error::UnknownComponent(component_id.to_string()))?;
        mapping.streams.insert(stream_id.to_string());

        Ok(StreamLink {
            stream_id: stream_id.to_string(),
            target: self.strategy.link_target(kind),
            value: self.strategy.key(mapping).to_string(),
        })
    }

    /// Remove `stream_id` from every component of `kind`
    pub fn unlink(&mut self, stream_id: &str, kind: ComponentKind) {
        for mapping in self.references.values_mut().filter(|m| m.kind == kind) {
            mapping.streams.remove(stream_id);
        }
    }

    /// Component of `kind` currently used by `stream_id`
    pub fn linked(&self, stream_id: &str, kind: ComponentKind) -> Option<&ReferenceMapping> {
        self.references
            .values()
            .find(|m| m.kind == kind && m.streams.contains(stream_id))
    }

    /// Re-key a component's serial number.
    ///
    /// Returns the link values dependent streams must be refreshed with;
    /// empty unless streams address components by serial number.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownComponent`] if the component is not indexed.
    pub fn update_serial(&mut self, component_id: &str, serial: &str) -> Result<Vec<StreamLink>> {
        self.rekey(component_id, |mapping| {
            std::mem::replace(&mut mapping.serial_number, serial.to_string())
        })
    }

    /// Re-key a component's name, as [`update_serial`](Self::update_serial)
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownComponent`] if the component is not indexed.
    pub fn update_name(&mut self, component_id: &str, name: &str) -> Result<Vec<StreamLink>> {
        self.rekey(component_id, |mapping| {
            std::mem::replace(&mut mapping.name, name.to_string())
        })
    }

    fn rekey(
        &mut self,
        component_id: &str,
        change: impl FnOnce(&mut ReferenceMapping) -> String,
    ) -> Result<Vec<StreamLink>> {
        let mapping = self
            .references
            .get_mut(component_id)
            .ok_or_else(|| Error::UnknownComponent(component_id.to_string()))?;
        let old_key = self.strategy.key(mapping).to_string();
        let (old_serial, old_name) = (mapping.serial_number.clone(), mapping.name.clone());
        change(mapping);
        let mapping = mapping.clone();

        if old_serial != mapping.serial_number {
            release_slot(
                &mut self.serial_map,
                &self.references,
                &old_serial,
                component_id,
                |m| m.serial_number.as_str(),
            );
        }
        if old_name != mapping.name {
            release_slot(
                &mut self.name_map,
                &self.references,
                &old_name,
                component_id,
                |m| m.name.as_str(),
            );
        }
        self.insert_keys(&mapping);

        let new_key = self.strategy.key(&mapping);
        if new_key == old_key {
            return Ok(Vec::new());
        }
        debug!(
            "Re-keyed {} from '{}' to '{}', {} dependent streams",
            component_id,
            old_key,
            new_key,
            mapping.streams.len()
        );
        let target = self.strategy.link_target(mapping.kind);
        Ok(mapping
            .streams
            .iter()
            .map(|stream_id| StreamLink {
                stream_id: stream_id.clone(),
                target,
                value: new_key.to_string(),
            })
            .collect())
    }

    /// `(label, key)` pairs for a component picker, labels like
    /// `"STS-2 (S1)"`, ordered by label
    pub fn choices(&self, kind: ComponentKind) -> Vec<(String, String)> {
        let mut choices: Vec<(String, String)> = self
            .mappings(kind)
            .map(|m| {
                let label = match (m.name.is_empty(), m.serial_number.is_empty()) {
                    (false, false) => format!("{} ({})", m.name, m.serial_number),
                    (false, true) => m.name.clone(),
                    (true, false) => m.serial_number.clone(),
                    (true, true) => m.public_id.clone(),
                };
                (label, self.strategy.key(m).to_string())
            })
            .collect();
        choices.sort();
        choices
    }

    pub fn mappings(&self, kind: ComponentKind) -> impl Iterator<Item = &ReferenceMapping> {
        self.references.values().filter(move |m| m.kind == kind)
    }

    pub fn add_namespace(&mut self, prefix: impl Into<String>, uri: impl Into<String>) {
        self.namespaces.insert(prefix.into(), uri.into());
    }

    pub fn namespace(&self, prefix: &str) -> Option<&str> {
        self.namespaces.get(prefix).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.references.len()
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }

    /// Write the index as JSON
    ///
    /// # Errors
    ///
    /// Returns [`Error::State`] if serialisation or the write fails.
    pub fn save_state(&self, path: &Path) -> Result<()> {
        let state = IndexState {
            references: self
                .references
                .iter()
                .map(|(id, m)| {
                    (
                        id.clone(),
                        MappingState {
                            serial_number: m.serial_number.clone(),
                            kind: m.kind,
                            name: m.name.clone(),
                            streams: m.streams.clone(),
                        },
                    )
                })
                .collect(),
            serial_map: self.serial_map.clone().into_iter().collect(),
            name_map: self.name_map.clone().into_iter().collect(),
            namespaces: self.namespaces.clone(),
        };
        let json = serde_json::to_string_pretty(&state)
            .map_err(|e| Error::State(format!("cannot serialise index: {e}")))?;
        std::fs::write(path, json)
            .map_err(|e| Error::State(format!("cannot write {}: {e}", path.display())))?;
        debug!("Saved reference state to {:?}", path);
        Ok(())
    }

    /// Replace the index contents with a saved state. The addressing
    /// strategy is kept.
    ///
    /// # Errors
    ///
    /// Returns [`Error::State`] if the file is unreadable or malformed; the
    /// index is left unchanged in that case.
    pub fn load_state(&mut self, path: &Path) -> Result<()> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::State(format!("cannot read {}: {e}", path.display())))?;
        let state: IndexState = serde_json::from_str(&json)
            .map_err(|e| Error::State(format!("JSON parse error: {e}")))?;

        self.references = state
            .references
            .into_iter()
            .map(|(id, m)| {
                let mapping = ReferenceMapping {
                    public_id: id.clone(),
                    serial_number: m.serial_number,
                    kind: m.kind,
                    name: m.name,
                    streams: m.streams,
                };
                (id, mapping)
            })
            .collect();
        self.serial_map = state.serial_map.into_iter().collect();
        self.name_map = state.name_map.into_iter().collect();
        if self.name_map.is_empty() {
            self.name_map = self
                .references
                .values()
                .filter(|m| !m.name.is_empty())
                .map(|m| (m.name.clone(), m.public_id.clone()))
                .collect();
        }
        self.namespaces = state.namespaces;
        debug!("Loaded reference state from {:?}", path);
        Ok(())
    }
}

/// Take `component_id` out of the `key` slot. The slot passes to another
/// component still carrying that key, if there is one.
fn release_slot(
    map: &mut HashMap<String, String>,
    references: &BTreeMap<String, ReferenceMapping>,
    key: &str,
    component_id: &str,
    key_of: impl Fn(&ReferenceMapping) -> &str,
) {
    if map.get(key).map(String::as_str) != Some(component_id) {
        return;
    }
    match references
        .values()
        .find(|m| m.public_id != component_id && key_of(m) == key)
    {
        Some(other) => {
            debug!("Key '{}' now resolves to {}", key, other.public_id);
            map.insert(key.to_string(), other.public_id.clone());
        }
        None => {
            map.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scinv_ir::Node;

    const NS: &str = "urn:test";

    fn component(doc: &mut Document, tag: &str, id: &str, name: &str, serial: &str) -> NodeId {
        let root = doc.root();
        let mut node = Node::in_namespace(tag, NS).with_attribute("name", name);
        if !id.is_empty() {
            node = node.with_attribute("publicID", id);
        }
        let node = doc.append_child(root, node);
        if !serial.is_empty() {
            doc.append_child(node, Node::in_namespace("serialNumber", NS).with_text(serial));
        }
        node
    }

    fn index_with(addressing: ReferenceAddressing) -> (Document, ReferenceIndex) {
        let mut doc = Document::new(Node::in_namespace("Inventory", NS));
        let s1 = component(&mut doc, "sensor", "Sensor/1", "STS-2", "S1");
        let s2 = component(&mut doc, "sensor", "Sensor/2", "CMG-3T", "S2");
        let d1 = component(&mut doc, "datalogger", "Datalogger/1", "Q330", "D1");
        let mut index = ReferenceIndex::new(addressing);
        index.register(&doc, NS, s1, ComponentKind::Sensor).unwrap();
        index.register(&doc, NS, s2, ComponentKind::Sensor).unwrap();
        index.register(&doc, NS, d1, ComponentKind::Datalogger).unwrap();
        (doc, index)
    }

    #[test]
    fn test_lookup_by_serial_and_name() {
        let (_, index) = index_with(ReferenceAddressing::SerialNumber);
        assert_eq!(index.by_serial("S1").unwrap().public_id, "Sensor/1");
        assert_eq!(index.by_serial("S2").unwrap().public_id, "Sensor/2");
        assert!(index.by_serial("S3").is_none());
        assert_eq!(index.by_name("Q330").unwrap().kind, ComponentKind::Datalogger);
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_register_requires_key() {
        let mut doc = Document::new(Node::in_namespace("Inventory", NS));
        let anonymous = component(&mut doc, "sensor", "", "STS-2", "S1");
        let unserialised = component(&mut doc, "sensor", "Sensor/9", "STS-2", "");

        let mut index = ReferenceIndex::new(ReferenceAddressing::SerialNumber);
        let err = index
            .register(&doc, NS, anonymous, ComponentKind::Sensor)
            .unwrap_err();
        assert!(matches!(err, Error::ComponentRegistration { ref reason, .. } if reason == "missing publicID"));
        assert!(
            index
                .register(&doc, NS, unserialised, ComponentKind::Sensor)
                .is_err()
        );

        // Name addressing does not need a serial number
        let mut by_name = ReferenceIndex::new(ReferenceAddressing::ComponentName);
        assert!(
            by_name
                .register(&doc, NS, unserialised, ComponentKind::Sensor)
                .is_ok()
        );
        assert!(by_name.by_serial("").is_none());
    }

    #[test]
    fn test_link_moves_stream_between_components() {
        let (_, mut index) = index_with(ReferenceAddressing::SerialNumber);
        let link = index.link("Stream/1", "Sensor/1").unwrap();
        assert_eq!(link.target, LinkTarget::Field("sensorSerialNumber"));
        assert_eq!(link.value, "S1");

        index.link("Stream/1", "Sensor/2").unwrap();
        index.link("Stream/1", "Datalogger/1").unwrap();
        assert!(index.by_id("Sensor/1").unwrap().streams.is_empty());
        assert_eq!(
            index.linked("Stream/1", ComponentKind::Sensor).unwrap().public_id,
            "Sensor/2"
        );
        assert!(matches!(
            index.link("Stream/1", "Sensor/404"),
            Err(Error::UnknownComponent(_))
        ));
    }

    #[test]
    fn test_update_serial_rekeys_and_refreshes_dependents() {
        let (_, mut index) = index_with(ReferenceAddressing::SerialNumber);
        index.link("Stream/1", "Sensor/1").unwrap();
        index.link("Stream/2", "Sensor/1").unwrap();

        let links = index.update_serial("Sensor/1", "S1-NEW").unwrap();
        assert!(index.by_serial("S1").is_none());
        assert_eq!(index.by_serial("S1-NEW").unwrap().public_id, "Sensor/1");
        assert_eq!(links.len(), 2);
        assert!(links.iter().all(|l| l.value == "S1-NEW"));

        // Name addressing: serial changes do not touch streams
        let (_, mut by_name) = index_with(ReferenceAddressing::ComponentName);
        by_name.link("Stream/1", "Sensor/1").unwrap();
        assert!(by_name.update_serial("Sensor/1", "X").unwrap().is_empty());
        let links = by_name.update_name("Sensor/1", "STS-2.5").unwrap();
        assert_eq!(links[0].target, LinkTarget::Field("sensor"));
        assert!(by_name.by_name("STS-2").is_none());
    }

    #[test]
    fn test_shared_serial_survives_rekey() {
        let mut doc = Document::new(Node::in_namespace("Inventory", NS));
        let a = component(&mut doc, "sensor", "Sensor/A", "STS-2", "S1");
        let b = component(&mut doc, "sensor", "Sensor/B", "STS-2", "S1");
        let mut index = ReferenceIndex::new(ReferenceAddressing::SerialNumber);
        index.register(&doc, NS, a, ComponentKind::Sensor).unwrap();
        index.register(&doc, NS, b, ComponentKind::Sensor).unwrap();
        assert_eq!(index.by_serial("S1").unwrap().public_id, "Sensor/B");

        index.update_serial("Sensor/B", "S9").unwrap();
        assert_eq!(index.by_serial("S1").unwrap().public_id, "Sensor/A");
        assert_eq!(index.by_serial("S9").unwrap().public_id, "Sensor/B");
        assert_eq!(index.by_name("STS-2").unwrap().public_id, "Sensor/B");

        index.update_name("Sensor/B", "STS-2.5").unwrap();
        assert_eq!(index.by_name("STS-2").unwrap().public_id, "Sensor/A");

        index.update_serial("Sensor/A", "S2").unwrap();
        assert!(index.by_serial("S1").is_none());
    }

    #[test]
    fn test_choices_use_strategy_key() {
        let (_, index) = index_with(ReferenceAddressing::AttributeReference);
        assert_eq!(
            index.choices(ComponentKind::Sensor),
            vec![
                ("CMG-3T (S2)".to_string(), "Sensor/2".to_string()),
                ("STS-2 (S1)".to_string(), "Sensor/1".to_string()),
            ]
        );
    }

    #[test]
    fn test_state_file_round_trip() {
        let (_, mut index) = index_with(ReferenceAddressing::SerialNumber);
        index.add_namespace("sc3", "http://geofon.gfz-potsdam.de/ns/seiscomp3-schema/0.12");
        index.link("Stream/1", "Sensor/1").unwrap();

        let file = tempfile::NamedTempFile::new().unwrap();
        index.save_state(file.path()).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(file.path()).unwrap()).unwrap();
        assert_eq!(json["references"]["Sensor/1"]["type"], "sensor");
        assert_eq!(json["serial_map"]["D1"], "Datalogger/1");

        let mut restored = ReferenceIndex::new(ReferenceAddressing::SerialNumber);
        restored.load_state(file.path()).unwrap();
        assert_eq!(restored.by_serial("S1"), index.by_serial("S1"));
        assert_eq!(
            restored.namespace("sc3"),
            Some("http://geofon.gfz-potsdam.de/ns/seiscomp3-schema/0.12")
        );
    }

    #[test]
    fn test_load_state_rejects_garbage() {
        let (_, mut index) = index_with(ReferenceAddressing::SerialNumber);
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "{ nope").unwrap();
        assert!(matches!(index.load_state(file.path()), Err(Error::State(_))));
        assert_eq!(index.len(), 3);
    }
}
