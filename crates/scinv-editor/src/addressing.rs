//! Stream-to-component addressing strategies
//!
//! Schema generations disagree on how a stream names the sensor and
//! datalogger it uses. Each convention is one [`AddressingStrategy`]; the
//! reference index and the model only talk to the trait.

use crate::reference::{ReferenceIndex, ReferenceMapping};
use scinv_ir::{Document, NodeId};
use scinv_schema::{ComponentKind, LinkTarget, ReferenceAddressing};
use std::fmt;

pub trait AddressingStrategy: fmt::Debug + Send + Sync {
    fn addressing(&self) -> ReferenceAddressing;

    /// Component property streams store, e.g. `serialNumber`
    fn key_name(&self) -> &'static str;

    /// The value a stream stores to point at `mapping`
    fn key<'a>(&self, mapping: &'a ReferenceMapping) -> &'a str;

    /// Find the component a stored link value points at
    fn resolve<'a>(&self, index: &'a ReferenceIndex, key: &str) -> Option<&'a ReferenceMapping>;

    /// Where a stream stores its link to a component of `kind`
    fn link_target(&self, kind: ComponentKind) -> LinkTarget {
        self.addressing().link_target(kind)
    }

    /// Link value currently stored on `stream`, if any
    fn read_link(
        &self,
        doc: &Document,
        namespace: &str,
        stream: NodeId,
        kind: ComponentKind,
    ) -> Option<String> {
        let value = match self.link_target(kind) {
            LinkTarget::Field(tag) => doc.child_text(stream, namespace, tag),
            LinkTarget::Attribute(name) => doc.node(stream).attribute(name).map(str::trim),
        };
        value.filter(|v| !v.is_empty()).map(str::to_string)
    }
}

/// Streams carry `sensorSerialNumber` / `dataloggerSerialNumber` fields
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialNumberAddressing;

impl AddressingStrategy for SerialNumberAddressing {
    fn addressing(&self) -> ReferenceAddressing {
        ReferenceAddressing::SerialNumber
    }

    fn key_name(&self) -> &'static str {
        "serialNumber"
    }

    fn key<'a>(&self, mapping: &'a ReferenceMapping) -> &'a str {
        &mapping.serial_number
    }

    fn resolve<'a>(&self, index: &'a ReferenceIndex, key: &str) -> Option<&'a ReferenceMapping> {
        index.by_serial(key)
    }
}

/// Streams carry `sensor` / `datalogger` attributes holding the publicID
#[derive(Debug, Clone, Copy, Default)]
pub struct AttributeReferenceAddressing;

impl AddressingStrategy for AttributeReferenceAddressing {
    fn addressing(&self) -> ReferenceAddressing {
        ReferenceAddressing::AttributeReference
    }

    fn key_name(&self) -> &'static str {
        "publicID"
    }

    fn key<'a>(&self, mapping: &'a ReferenceMapping) -> &'a str {
        &mapping.public_id
    }

    fn resolve<'a>(&self, index: &'a ReferenceIndex, key: &str) -> Option<&'a ReferenceMapping> {
        index.by_id(key)
    }
}

/// Streams carry `sensor` / `datalogger` fields holding the component name
#[derive(Debug, Clone, Copy, Default)]
pub struct ComponentNameAddressing;

impl AddressingStrategy for ComponentNameAddressing {
    fn addressing(&self) -> ReferenceAddressing {
        ReferenceAddressing::ComponentName
    }

    fn key_name(&self) -> &'static str {
        "name"
    }

    fn key<'a>(&self, mapping: &'a ReferenceMapping) -> &'a str {
        &mapping.name
    }

    fn resolve<'a>(&self, index: &'a ReferenceIndex, key: &str) -> Option<&'a ReferenceMapping> {
        index.by_name(key)
    }
}

/// Strategy for a schema version's addressing convention
pub fn strategy_for(addressing: ReferenceAddressing) -> Box<dyn AddressingStrategy> {
    match addressing {
        ReferenceAddressing::SerialNumber => Box::new(SerialNumberAddressing),
        ReferenceAddressing::AttributeReference => Box::new(AttributeReferenceAddressing),
        ReferenceAddressing::ComponentName => Box::new(ComponentNameAddressing),
    }
}
