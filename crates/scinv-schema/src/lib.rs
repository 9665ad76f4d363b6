//! # scinv-schema
//!
//! Schema generations, namespace resolution and reference addressing.
//!
//! Inventory documents come in several namespace revisions. This crate keeps
//! the closed table of supported revisions ([`SchemaRegistry`]), detects which
//! one a parsed document uses ([`SchemaResolver`]) and records the per-revision
//! conventions that differ between generations: how a stream addresses its
//! sensor and datalogger, and how sample rates are encoded.

pub mod model;
pub mod registry;
pub mod resolver;

pub use model::{
    ComponentKind, EntityKind, LinkTarget, ReferenceAddressing, SampleRateEncoding, SchemaVersion,
};
pub use registry::{SEISCOMP3_NAMESPACE_BASE, SchemaRegistry};
pub use resolver::{INVENTORY_ELEMENT, ResolvedSchema, SchemaResolver};

use thiserror::Error;

/// Message reported when no supported namespace yields an `Inventory` element
pub const STRUCTURE_ERROR_MESSAGE: &str =
    "Invalid inventory structure: no supported schema namespace contains an Inventory element";

/// Errors that can occur when working with schemas
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Schema version not found: {0}")]
    NotFound(String),

    #[error("{}", STRUCTURE_ERROR_MESSAGE)]
    Structure,
}

pub type Result<T> = std::result::Result<T, Error>;
