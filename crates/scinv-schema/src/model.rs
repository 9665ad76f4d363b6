//! Schema model definitions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Editable entity kinds of an inventory document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Network,
    Station,
    SensorLocation,
    Stream,
    Sensor,
    Datalogger,
}

impl EntityKind {
    /// Every kind, hierarchy first then components
    pub const ALL: [EntityKind; 6] = [
        EntityKind::Network,
        EntityKind::Station,
        EntityKind::SensorLocation,
        EntityKind::Stream,
        EntityKind::Sensor,
        EntityKind::Datalogger,
    ];

    /// Local element name
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            EntityKind::Network => "network",
            EntityKind::Station => "station",
            EntityKind::SensorLocation => "sensorLocation",
            EntityKind::Stream => "stream",
            EntityKind::Sensor => "sensor",
            EntityKind::Datalogger => "datalogger",
        }
    }

    /// Kind for a local element name
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.tag() == tag)
    }

    /// Sensors and dataloggers are shared components, not hierarchy levels
    #[must_use]
    pub fn is_component(self) -> bool {
        matches!(self, EntityKind::Sensor | EntityKind::Datalogger)
    }

    /// Kind one level down the hierarchy
    #[must_use]
    pub fn child_kind(self) -> Option<Self> {
        match self {
            EntityKind::Network => Some(EntityKind::Station),
            EntityKind::Station => Some(EntityKind::SensorLocation),
            EntityKind::SensorLocation => Some(EntityKind::Stream),
            _ => None,
        }
    }

    /// Nested element names that follow the plain fields of this kind.
    /// New fields are placed before the first of these, otherwise before
    /// the closing tag.
    #[must_use]
    pub fn insertion_markers(self) -> &'static [&'static str] {
        match self {
            EntityKind::Network => &["station", "comment"],
            EntityKind::Station => &["sensorLocation", "comment"],
            EntityKind::SensorLocation => &["stream", "comment"],
            EntityKind::Stream => &["comment"],
            EntityKind::Sensor => &["calibration", "comment"],
            EntityKind::Datalogger => &["decimation", "calibration", "comment"],
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// The two shared component kinds a stream is wired to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    Sensor,
    Datalogger,
}

impl ComponentKind {
    #[must_use]
    pub fn entity_kind(self) -> EntityKind {
        match self {
            ComponentKind::Sensor => EntityKind::Sensor,
            ComponentKind::Datalogger => EntityKind::Datalogger,
        }
    }

    #[must_use]
    pub fn from_entity_kind(kind: EntityKind) -> Option<Self> {
        match kind {
            EntityKind::Sensor => Some(ComponentKind::Sensor),
            EntityKind::Datalogger => Some(ComponentKind::Datalogger),
            _ => None,
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.entity_kind().tag())
    }
}

/// How a stream refers to the sensor and datalogger it uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceAddressing {
    /// Stream carries the component's serial number in a child field
    #[default]
    SerialNumber,
    /// Stream carries the component's publicID in an attribute
    AttributeReference,
    /// Stream carries the component's name in a child field
    ComponentName,
}

/// Where a stream stores its link to a component
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkTarget {
    /// Child element text
    Field(&'static str),
    /// Attribute on the stream element
    Attribute(&'static str),
}

impl LinkTarget {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            LinkTarget::Field(name) | LinkTarget::Attribute(name) => name,
        }
    }
}

impl ReferenceAddressing {
    /// Stream-side storage for a link to `component`
    #[must_use]
    pub fn link_target(self, component: ComponentKind) -> LinkTarget {
        match (self, component) {
            (ReferenceAddressing::SerialNumber, ComponentKind::Sensor) => {
                LinkTarget::Field("sensorSerialNumber")
            }
            (ReferenceAddressing::SerialNumber, ComponentKind::Datalogger) => {
                LinkTarget::Field("dataloggerSerialNumber")
            }
            (ReferenceAddressing::AttributeReference, ComponentKind::Sensor) => {
                LinkTarget::Attribute("sensor")
            }
            (ReferenceAddressing::AttributeReference, ComponentKind::Datalogger) => {
                LinkTarget::Attribute("datalogger")
            }
            (ReferenceAddressing::ComponentName, ComponentKind::Sensor) => {
                LinkTarget::Field("sensor")
            }
            (ReferenceAddressing::ComponentName, ComponentKind::Datalogger) => {
                LinkTarget::Field("datalogger")
            }
        }
    }
}

/// How a stream's sample rate is written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleRateEncoding {
    /// A single `sampleRate` field
    Single,
    /// `sampleRateNumerator` / `sampleRateDenominator` fields
    #[default]
    Fraction,
}

/// One supported namespace revision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaVersion {
    /// Short label, e.g. `0.12`
    pub label: String,
    /// Namespace URI
    pub namespace: String,
    /// Stream-to-component addressing convention
    pub addressing: ReferenceAddressing,
    /// Default sample-rate encoding when a stream carries neither form
    pub sample_rate: SampleRateEncoding,
}

impl SchemaVersion {
    pub fn new(label: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            namespace: namespace.into(),
            addressing: ReferenceAddressing::default(),
            sample_rate: SampleRateEncoding::default(),
        }
    }

    #[must_use]
    pub fn with_addressing(mut self, addressing: ReferenceAddressing) -> Self {
        self.addressing = addressing;
        self
    }

    #[must_use]
    pub fn with_sample_rate(mut self, sample_rate: SampleRateEncoding) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// True if `uri` names this revision. Declared URIs are matched by
    /// containment so decorated forms (trailing slash, schema location
    /// pairs) still resolve.
    #[must_use]
    pub fn matches_uri(&self, uri: &str) -> bool {
        uri.contains(self.namespace.as_str())
    }
}
