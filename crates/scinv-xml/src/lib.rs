#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

//! # scinv-xml
//!
//! Inventory XML wire format.
//!
//! Reading goes through quick-xml into the `scinv-ir` arena tree, either as a
//! whole document ([`parse_str`]) or one network block at a time
//! ([`NetworkReader`]). Writing never re-serialises the tree: the
//! [`ChangeTracker`] collects per-entity edits and the [`TextPatcher`] splices
//! them into the original text, leaving every untouched byte as it was.

pub mod changes;
pub mod parser;
pub mod patcher;
pub mod streaming;

pub use changes::{ChangeTracker, EntityChanges};
pub use parser::{parse_file, parse_str};
pub use patcher::TextPatcher;
pub use streaming::NetworkReader;

use thiserror::Error;

/// Errors that can occur when reading or patching inventory XML
#[derive(Error, Debug)]
pub enum Error {
    #[error("Parse error at line {line}, col {column}: {message}")]
    Parse {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("Cannot patch entity '{entity}': {message}")]
    Patch { entity: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn parse(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            column,
            message: message.into(),
        }
    }

    pub fn patch(entity: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Patch {
            entity: entity.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
