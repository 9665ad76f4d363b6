#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

//! # scinv-editor
//!
//! Typed editing façade over a SeisComP inventory document.
//!
//! [`InventoryModel`] ties the layers together: the [`DocumentStore`] owns the
//! parsed tree and the raw text it came from, the [`ReferenceIndex`] tracks
//! which streams use which sensor and datalogger, edits are validated and
//! recorded in a change tracker, and the [`PersistenceController`] splices
//! them into the file with a backup-rename save.
//!
//! ```no_run
//! use scinv_editor::{EditorConfig, InventoryModel, status};
//! use std::path::Path;
//!
//! let mut model = InventoryModel::new(EditorConfig::default())?;
//! let (ok, message) = status(&model.load(Path::new("inventory.xml")));
//! assert!(ok, "{message}");
//!
//! for network in model.store().get_networks() {
//!     let mut record = model.get_network_data(network)?;
//!     record.description = "Reviewed".to_string();
//!     model.update_network(network, &record)?;
//! }
//! model.save()?;
//! # Ok::<(), scinv_editor::Error>(())
//! ```

pub mod addressing;
pub mod config;
pub mod debounce;
pub mod model;
pub mod persistence;
pub mod records;
pub mod reference;
pub mod store;

pub use addressing::{AddressingStrategy, strategy_for};
pub use config::EditorConfig;
pub use debounce::SaveDebouncer;
pub use model::{InventoryModel, InventoryVisitor, LoadSummary, SaveSummary};
pub use persistence::{FileSystem, PersistenceController, Storage};
pub use records::{
    DataloggerRecord, EntityRecord, LocationRecord, NetworkRecord, SampleRate, SensorRecord,
    StationRecord, StreamRecord,
};
pub use reference::{ReferenceIndex, ReferenceMapping, StreamLink};
pub use store::{DocumentStore, InventoryDocument};

use scinv_validation::ValidationReport;
use std::fmt;
use thiserror::Error;

/// Errors surfaced by the editing façade
#[derive(Error, Debug, Clone)]
pub enum Error {
    #[error("XML parse error: {0}")]
    Parse(String),

    #[error("{0}")]
    Structure(String),

    #[error("Cannot register {kind} '{id}': {reason}")]
    ComponentRegistration {
        kind: String,
        id: String,
        reason: String,
    },

    #[error("{0}")]
    Validation(ValidationReport),

    #[error("Write error during {operation} for '{path}': {message}")]
    Write {
        operation: String,
        path: String,
        message: String,
    },

    #[error("IO error: {0}")]
    Io(String),

    #[error("No file loaded")]
    NoDocument,

    #[error("Cannot track <{element}>: {reason}")]
    UntrackedEntity { element: String, reason: String },

    #[error("Identifier '{0}' occurs more than once in the document")]
    DuplicateIdentifier(String),

    #[error("Unknown component '{0}'")]
    UnknownComponent(String),

    #[error("Cannot patch entity '{entity}': {message}")]
    Patch { entity: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Reference state error: {0}")]
    State(String),
}

impl Error {
    pub fn write(
        operation: impl Into<String>,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Write {
            operation: operation.into(),
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn untracked(element: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UntrackedEntity {
            element: element.into(),
            reason: reason.into(),
        }
    }

    pub fn registration(
        kind: impl fmt::Display,
        id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::ComponentRegistration {
            kind: kind.to_string(),
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// True for failures that reject one operation but leave the loaded
    /// document usable: validation, lookups and bookkeeping refusals.
    /// Parse, structure, write and patch failures are not recoverable.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Validation(_)
                | Error::ComponentRegistration { .. }
                | Error::NoDocument
                | Error::UntrackedEntity { .. }
                | Error::DuplicateIdentifier(_)
                | Error::UnknownComponent(_)
        )
    }
}

impl From<scinv_xml::Error> for Error {
    fn from(err: scinv_xml::Error) -> Self {
        match err {
            scinv_xml::Error::Parse { .. } => Error::Parse(err.to_string()),
            scinv_xml::Error::Patch { entity, message } => Error::Patch { entity, message },
            scinv_xml::Error::Io(e) => Error::Io(e.to_string()),
        }
    }
}

impl From<scinv_schema::Error> for Error {
    fn from(err: scinv_schema::Error) -> Self {
        match err {
            scinv_schema::Error::Structure => Error::Structure(err.to_string()),
            scinv_schema::Error::NotFound(_) => Error::Config(err.to_string()),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Collapse a result into the `(success, message)` pair shown to operators
pub fn status<T: fmt::Display>(result: &Result<T>) -> (bool, String) {
    match result {
        Ok(value) => (true, value.to_string()),
        Err(err) => (false, err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scinv_schema::EntityKind;

    #[test]
    fn test_recoverable_split() {
        let mut report = ValidationReport::new(EntityKind::Stream);
        report.add_error("dip", "120", "must be between -90 and 90");
        assert!(Error::Validation(report).is_recoverable());
        assert!(Error::DuplicateIdentifier("Stream/1".into()).is_recoverable());
        assert!(!Error::Structure("bad".into()).is_recoverable());
        assert!(!Error::write("rename", "inv.xml", "denied").is_recoverable());
    }

    #[test]
    fn test_status_pairs() {
        let ok: Result<&str> = Ok("File saved successfully");
        assert_eq!(status(&ok), (true, "File saved successfully".to_string()));

        let err: Result<&str> = Err(Error::NoDocument);
        assert_eq!(status(&err), (false, "No file loaded".to_string()));
    }

    #[test]
    fn test_xml_errors_map_to_taxonomy() {
        let parse = Error::from(scinv_xml::Error::parse(3, 4, "mismatched tag"));
        assert!(matches!(parse, Error::Parse(ref m) if m.contains("line 3")));

        let structure = Error::from(scinv_schema::Error::Structure);
        assert!(matches!(structure, Error::Structure(_)));
    }
}
