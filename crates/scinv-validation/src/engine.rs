//! Validation engine

use crate::catalog::FieldRules;
use crate::datetime::DateTimeNormalizer;
use scinv_schema::EntityKind;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// Severity of a validation issue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Blocks the update
    Error,
    /// Reported but not blocking
    Warning,
}

/// One problem found in a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Field name as stored in the document
    pub field: String,
    /// Offending value
    pub value: String,
    pub message: String,
    pub severity: Severity,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Outcome of validating one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub kind: EntityKind,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    #[must_use]
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            issues: Vec::new(),
        }
    }

    /// True when no issue has [`Severity::Error`]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.issues.iter().any(|i| i.severity == Severity::Error)
    }

    #[must_use]
    pub fn has_warnings(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Warning)
    }

    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Warning)
    }

    /// Names of fields with blocking issues, deduplicated in report order
    #[must_use]
    pub fn invalid_fields(&self) -> Vec<&str> {
        let mut fields: Vec<&str> = Vec::new();
        for issue in self.errors() {
            if !fields.contains(&issue.field.as_str()) {
                fields.push(&issue.field);
            }
        }
        fields
    }

    pub fn add_error(&mut self, field: &str, value: &str, message: impl Into<String>) {
        self.push(field, value, message.into(), Severity::Error);
    }

    pub fn add_warning(&mut self, field: &str, value: &str, message: impl Into<String>) {
        self.push(field, value, message.into(), Severity::Warning);
    }

    fn push(&mut self, field: &str, value: &str, message: String, severity: Severity) {
        self.issues.push(ValidationIssue {
            field: field.to_string(),
            value: value.to_string(),
            message,
            severity,
        });
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let errors: Vec<String> = self.errors().map(ToString::to_string).collect();
        if errors.is_empty() {
            write!(f, "{} record is valid", self.kind)
        } else {
            write!(f, "invalid {} record: {}", self.kind, errors.join("; "))
        }
    }
}

/// Runs the per-kind catalog over whole records
#[derive(Debug, Clone)]
pub struct ValidationEngine {
    catalogs: HashMap<EntityKind, FieldRules>,
}

impl ValidationEngine {
    /// Engine with the built-in catalog for every kind
    #[must_use]
    pub fn new() -> Self {
        let catalogs = EntityKind::ALL
            .into_iter()
            .map(|kind| (kind, FieldRules::for_kind(kind)))
            .collect();
        Self { catalogs }
    }

    /// Replace the rule set for the kind `rules` covers
    #[must_use]
    pub fn with_rules(mut self, rules: FieldRules) -> Self {
        self.catalogs.insert(rules.kind(), rules);
        self
    }

    #[must_use]
    pub fn rules(&self, kind: EntityKind) -> Option<&FieldRules> {
        self.catalogs.get(&kind)
    }

    /// Validate every field of a record, plus the cross-field checks for
    /// its kind. Nothing is short-circuited so the report lists every issue.
    pub fn validate_record<'a, I>(&self, kind: EntityKind, fields: I) -> ValidationReport
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let fields: Vec<(&str, &str)> = fields.into_iter().collect();
        let mut report = ValidationReport::new(kind);

        if let Some(rules) = self.catalogs.get(&kind) {
            for (field, value) in &fields {
                for failure in rules.check(field, value) {
                    let message = failure
                        .message
                        .unwrap_or_else(|| "Invalid value".to_string());
                    report.add_error(field, value, message);
                }
            }
        }

        let lookup = |name: &str| {
            fields
                .iter()
                .find(|(field, _)| *field == name)
                .map(|(_, value)| *value)
                .filter(|v| !v.is_empty())
        };

        if let (Some(start), Some(end)) = (lookup("start"), lookup("end")) {
            if let (Ok(s), Ok(e)) = (DateTimeNormalizer::parse(start), DateTimeNormalizer::parse(end)) {
                if e < s {
                    report.add_warning("end", end, format!("End {end} precedes start {start}"));
                }
            }
        }

        if kind == EntityKind::Sensor {
            if let (Some(low), Some(high)) = (lookup("lowFrequency"), lookup("highFrequency")) {
                if let (Ok(l), Ok(h)) = (low.parse::<f64>(), high.parse::<f64>()) {
                    if h <= l {
                        report.add_error(
                            "highFrequency",
                            high,
                            format!("High frequency {high} must exceed low frequency {low}"),
                        );
                    }
                }
            }
        }

        if !report.is_valid() {
            debug!("{}", report);
        }
        report
    }
}

impl Default for ValidationEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Validator;

    #[test]
    fn test_valid_station() {
        let engine = ValidationEngine::new();
        let report = engine.validate_record(
            EntityKind::Station,
            [
                ("code", "ABC"),
                ("latitude", "52.38"),
                ("longitude", "13.06"),
                ("start", "2020-01-01"),
            ],
        );
        assert!(report.is_valid());
        assert!(report.issues.is_empty());
    }

    #[test]
    fn test_collects_every_issue() {
        let engine = ValidationEngine::new();
        let report = engine.validate_record(
            EntityKind::Station,
            [("code", ""), ("latitude", "95"), ("start", "2023-02-30")],
        );
        assert!(!report.is_valid());
        assert_eq!(report.invalid_fields(), vec!["code", "latitude", "start"]);
        let text = report.to_string();
        assert!(text.starts_with("invalid station record:"));
        assert!(text.contains("latitude"));
    }

    #[test]
    fn test_reversed_epoch_is_warning() {
        let engine = ValidationEngine::new();
        let report = engine.validate_record(
            EntityKind::Network,
            [("code", "GE"), ("start", "2021-01-01"), ("end", "2020-01-01")],
        );
        assert!(report.is_valid());
        assert!(report.has_warnings());
        assert_eq!(report.warnings().count(), 1);
    }

    #[test]
    fn test_sensor_band_must_be_ordered() {
        let engine = ValidationEngine::new();
        let report = engine.validate_record(
            EntityKind::Sensor,
            [
                ("name", "STS-2"),
                ("serialNumber", "S1"),
                ("lowFrequency", "50"),
                ("highFrequency", "0.01"),
            ],
        );
        assert_eq!(report.invalid_fields(), vec!["highFrequency"]);
    }

    #[test]
    fn test_with_rules_overrides_kind() {
        let engine = ValidationEngine::new().with_rules(
            FieldRules::new(EntityKind::Stream).rule("gainUnit", [Validator::Required]),
        );
        let report = engine.validate_record(EntityKind::Stream, [("code", ""), ("gainUnit", "")]);
        assert_eq!(report.invalid_fields(), vec!["gainUnit"]);
    }
}
