#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

//! # scinv-ir
//!
//! Arena tree, node model and traversal APIs for inventory documents.
//!
//! This crate provides a generic, namespace-aware element tree. Nodes live in
//! a single arena owned by [`Document`] and are addressed by copyable
//! [`NodeId`] handles, so higher layers can hold on to a node while mutating
//! the tree through the document.

/// Arena document container and structural queries.
pub mod document;
/// Source metadata and byte-offset positions.
pub mod metadata;
/// Element node model with ordered attributes.
pub mod node;
/// Visitor walks.
pub mod traversal;

/// Primary tree document type.
pub use document::{Descendants, Document, DocumentMetadata};
/// Load-time source information.
pub use metadata::{Position, SourceInfo};
/// Node primitives.
pub use node::{Attribute, Node, NodeId};
/// Traversal entry points.
pub use traversal::{Traversal, walk};

use thiserror::Error;

/// Errors that can occur when working with the tree
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Node {id} does not belong to this document")]
    ForeignNode { id: usize },
}

/// Crate-local result type for tree operations.
pub type Result<T> = std::result::Result<T, Error>;
