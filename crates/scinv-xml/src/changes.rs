//! Pending edits keyed by entity identifier

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::trace;

/// Edits recorded against one entity since the last save.
///
/// Fields and attributes keep the order in which they were first recorded,
/// so newly inserted elements appear in a predictable sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EntityChanges {
    /// Child field name and new text; an empty value removes the field
    pub fields: Vec<(String, String)>,

    /// Attribute name and new value; `None` removes the attribute
    pub attributes: Vec<(String, Option<String>)>,
}

impl EntityChanges {
    /// Pending value for a field
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.as_str())
    }

    /// Pending value for an attribute; `Some(None)` means removal
    pub fn attribute(&self, name: &str) -> Option<Option<&str>> {
        self.attributes
            .iter()
            .find(|(attr, _)| attr == name)
            .map(|(_, value)| value.as_deref())
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.attributes.is_empty()
    }

    fn set_field(&mut self, name: String, value: String) {
        match self.fields.iter_mut().find(|(field, _)| *field == name) {
            Some(entry) => entry.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    fn set_attribute(&mut self, name: String, value: Option<String>) {
        match self.attributes.iter_mut().find(|(attr, _)| *attr == name) {
            Some(entry) => entry.1 = value,
            None => self.attributes.push((name, value)),
        }
    }
}

/// Records which fields of which entities changed, without touching the
/// tree or the source text
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChangeTracker {
    entities: BTreeMap<String, EntityChanges>,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a field value, replacing any earlier pending value for the
    /// same entity and field
    pub fn record(
        &mut self,
        entity_id: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<String>,
    ) {
        let (entity_id, field, value) = (entity_id.into(), field.into(), value.into());
        trace!("Pending {}.{} = {:?}", entity_id, field, value);
        self.entities
            .entry(entity_id)
            .or_default()
            .set_field(field, value);
    }

    /// Record an attribute value on the entity's opening tag
    pub fn record_attribute(
        &mut self,
        entity_id: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<String>,
    ) {
        let (entity_id, name) = (entity_id.into(), name.into());
        trace!("Pending {}@{}", entity_id, name);
        self.entities
            .entry(entity_id)
            .or_default()
            .set_attribute(name, Some(value.into()));
    }

    /// Record removal of an attribute from the entity's opening tag
    pub fn record_attribute_removal(
        &mut self,
        entity_id: impl Into<String>,
        name: impl Into<String>,
    ) {
        self.entities
            .entry(entity_id.into())
            .or_default()
            .set_attribute(name.into(), None);
    }

    pub fn pending_for(&self, entity_id: &str) -> Option<&EntityChanges> {
        self.entities.get(entity_id)
    }

    /// Entities with pending edits, ordered by identifier
    pub fn iter(&self) -> impl Iterator<Item = (&str, &EntityChanges)> {
        self.entities.iter().map(|(id, changes)| (id.as_str(), changes))
    }

    /// Number of entities with pending edits
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.values().all(EntityChanges::is_empty)
    }

    pub fn clear(&mut self) {
        self.entities.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_overwrites_same_field() {
        let mut tracker = ChangeTracker::new();
        tracker.record("Stream/1", "gain", "100");
        tracker.record("Stream/1", "gain", "200");
        tracker.record("Stream/1", "dip", "-90");

        let pending = tracker.pending_for("Stream/1").unwrap();
        assert_eq!(pending.field("gain"), Some("200"));
        assert_eq!(
            pending.fields,
            vec![
                ("gain".to_string(), "200".to_string()),
                ("dip".to_string(), "-90".to_string())
            ]
        );
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_attribute_channel() {
        let mut tracker = ChangeTracker::new();
        tracker.record_attribute("Station/1", "code", "APE");
        tracker.record_attribute_removal("Station/1", "name");

        let pending = tracker.pending_for("Station/1").unwrap();
        assert_eq!(pending.attribute("code"), Some(Some("APE")));
        assert_eq!(pending.attribute("name"), Some(None));
        assert_eq!(pending.attribute("publicID"), None);
        assert!(pending.fields.is_empty());
    }

    #[test]
    fn test_clear_and_empty() {
        let mut tracker = ChangeTracker::new();
        assert!(tracker.is_empty());
        tracker.record("Sensor/1", "model", "STS-2");
        assert!(!tracker.is_empty());
        assert!(tracker.pending_for("Sensor/2").is_none());
        tracker.clear();
        assert!(tracker.is_empty());
        assert_eq!(tracker.iter().count(), 0);
    }
}
