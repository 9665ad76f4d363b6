#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

//! # scinv-validation
//!
//! Field validation for inventory edits.
//!
//! Validators are data: a closed set of [`Validator`] kinds, grouped per
//! entity kind into a [`FieldRules`] catalog and run by the
//! [`ValidationEngine`] over a whole record before anything is written.
//! Timestamps go through the [`DateTimeNormalizer`], which also produces
//! the canonical wire form stored in documents.
//!
//! ## Example Usage
//!
//! ```rust
//! use scinv_schema::EntityKind;
//! use scinv_validation::{DateTimeNormalizer, ValidationEngine};
//!
//! assert_eq!(
//!     DateTimeNormalizer::convert("2023-05-01").unwrap(),
//!     "2023-05-01T00:00:00.0000Z"
//! );
//!
//! let engine = ValidationEngine::new();
//! let report = engine.validate_record(
//!     EntityKind::Station,
//!     [("code", "ABC"), ("latitude", "95.0")],
//! );
//! assert!(!report.is_valid());
//! ```

pub mod catalog;
pub mod datetime;
pub mod engine;
pub mod rules;

pub use catalog::{FieldRule, FieldRules};
pub use datetime::{CANONICAL_FORMAT, DateTimeNormalizer};
pub use engine::{Severity, ValidationEngine, ValidationIssue, ValidationReport};
pub use rules::{RuleResult, Validator};

use thiserror::Error;

/// Errors that can occur during validation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Unrecognised date-time '{input}': {reason}")]
    DateTime { input: String, reason: String },

    #[error("Invalid pattern '{pattern}': {reason}")]
    Pattern { pattern: String, reason: String },
}

impl Error {
    pub fn date_time(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DateTime {
            input: input.into(),
            reason: reason.into(),
        }
    }

    pub fn pattern(pattern: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Pattern {
            pattern: pattern.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
