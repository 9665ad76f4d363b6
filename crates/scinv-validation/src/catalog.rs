//! Per-entity field rule catalog

use crate::rules::{RuleResult, Validator};
use regex::Regex;
use scinv_schema::EntityKind;
use std::sync::LazyLock;

static LOCATION_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9]*$").expect("location code pattern compiles")
});

/// Validators attached to one field
#[derive(Debug, Clone)]
pub struct FieldRule {
    pub field: String,
    pub validators: Vec<Validator>,
}

impl FieldRule {
    /// Run every validator, returning the failures
    #[must_use]
    pub fn check(&self, value: &str) -> Vec<RuleResult> {
        self.validators
            .iter()
            .map(|v| v.check(value))
            .filter(|r| !r.is_valid)
            .collect()
    }
}

/// The rule set for one entity kind
#[derive(Debug, Clone)]
pub struct FieldRules {
    kind: EntityKind,
    rules: Vec<FieldRule>,
}

impl FieldRules {
    /// Create an empty rule set
    #[must_use]
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            rules: Vec::new(),
        }
    }

    /// Builder-style: attach validators to a field
    #[must_use]
    pub fn rule<I>(mut self, field: &str, validators: I) -> Self
    where
        I: IntoIterator<Item = Validator>,
    {
        self.add(field, validators);
        self
    }

    /// Attach validators to a field, appending to any it already has
    pub fn add<I>(&mut self, field: &str, validators: I)
    where
        I: IntoIterator<Item = Validator>,
    {
        match self.rules.iter_mut().find(|r| r.field == field) {
            Some(existing) => existing.validators.extend(validators),
            None => self.rules.push(FieldRule {
                field: field.to_string(),
                validators: validators.into_iter().collect(),
            }),
        }
    }

    #[must_use]
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&FieldRule> {
        self.rules.iter().find(|r| r.field == field)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldRule> {
        self.rules.iter()
    }

    /// Failures for one field value; fields without rules always pass
    #[must_use]
    pub fn check(&self, field: &str, value: &str) -> Vec<RuleResult> {
        self.get(field).map(|r| r.check(value)).unwrap_or_default()
    }

    /// Built-in rules for an entity kind
    #[must_use]
    pub fn for_kind(kind: EntityKind) -> Self {
        let epochs = |rules: Self| {
            rules
                .rule("start", [Validator::DateTime])
                .rule("end", [Validator::DateTime])
        };

        match kind {
            EntityKind::Network => epochs(Self::new(kind).rule("code", [Validator::Required]))
                .rule("restricted", [Validator::boolean()])
                .rule("shared", [Validator::boolean()]),
            EntityKind::Station => epochs(Self::new(kind).rule("code", [Validator::Required]))
                .rule("latitude", [Validator::range(-90.0, 90.0)])
                .rule("longitude", [Validator::range(-180.0, 180.0)])
                .rule("elevation", [Validator::numeric()]),
            EntityKind::SensorLocation => epochs(
                Self::new(kind).rule("code", [Validator::Pattern(LOCATION_CODE.clone())]),
            )
            .rule("latitude", [Validator::range(-90.0, 90.0)])
            .rule("longitude", [Validator::range(-180.0, 180.0)])
            .rule("elevation", [Validator::numeric()])
            .rule("depth", [Validator::numeric()]),
            EntityKind::Stream => epochs(Self::new(kind).rule("code", [Validator::Required]))
                .rule("depth", [Validator::numeric()])
                .rule("azimuth", [Validator::range(0.0, 360.0)])
                .rule("dip", [Validator::range(-90.0, 90.0)])
                .rule("gain", [Validator::numeric()])
                .rule("gainFrequency", [Validator::non_negative()])
                .rule("sampleRate", [Validator::non_negative()])
                .rule("sampleRateNumerator", [Validator::count()])
                .rule("sampleRateDenominator", [Validator::count()]),
            EntityKind::Sensor => Self::new(kind)
                .rule("name", [Validator::Required])
                .rule("serialNumber", [Validator::Required])
                .rule("lowFrequency", [Validator::non_negative()])
                .rule("highFrequency", [Validator::non_negative()])
                .rule("calibrationDate", [Validator::DateTime])
                .rule("calibrationScale", [Validator::non_negative()]),
            EntityKind::Datalogger => Self::new(kind)
                .rule("name", [Validator::Required])
                .rule("serialNumber", [Validator::Required])
                .rule("maxClockDrift", [Validator::non_negative()])
                .rule("recordLength", [Validator::count()])
                .rule("sampleRate", [Validator::non_negative()])
                .rule("sampleRateMultiplier", [Validator::count()])
                .rule("sampleRateNumerator", [Validator::count()])
                .rule("sampleRateDenominator", [Validator::count()]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_kind_has_rules() {
        for kind in EntityKind::ALL {
            let rules = FieldRules::for_kind(kind);
            assert_eq!(rules.kind(), kind);
            assert!(rules.iter().count() > 0, "{kind}");
        }
    }

    #[test]
    fn test_location_code_may_be_empty() {
        let rules = FieldRules::for_kind(EntityKind::SensorLocation);
        assert!(rules.check("code", "").is_empty());
        assert!(rules.check("code", "00").is_empty());
        assert_eq!(rules.check("code", "0 0").len(), 1);
    }

    #[test]
    fn test_unknown_field_passes() {
        let rules = FieldRules::for_kind(EntityKind::Network);
        assert!(rules.check("institutions", "anything at all").is_empty());
    }

    #[test]
    fn test_add_appends_validators() {
        let mut rules = FieldRules::new(EntityKind::Stream).rule("code", [Validator::Required]);
        rules.add("code", [Validator::pattern("^[A-Z]{3}$").unwrap()]);
        assert_eq!(rules.get("code").map(|r| r.validators.len()), Some(2));
        assert_eq!(rules.check("code", "").len(), 1);
        assert_eq!(rules.check("code", "hhz").len(), 1);
        assert!(rules.check("code", "HHZ").is_empty());
    }
}
