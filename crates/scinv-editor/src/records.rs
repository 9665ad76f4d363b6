//! Typed records exchanged with the presentation layer
//!
//! Every value is kept as text, exactly as shown in an edit form. Missing
//! fields read as empty strings.

use scinv_schema::{EntityKind, SampleRateEncoding};
use serde::{Deserialize, Serialize};

/// How an empty attribute value in a record is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyAttribute {
    /// Leave the current attribute untouched
    Ignore,
    /// Remove the attribute
    Remove,
    /// Write the empty value
    Keep,
}

/// Fields holding timestamps, normalised before comparison and write
pub const DATE_FIELDS: &[&str] = &["start", "end", "calibrationDate"];

/// A record type mapped onto one entity element
pub trait EntityRecord: Default + Clone {
    const KIND: EntityKind;

    /// Opening-tag attributes the record carries
    const ATTRIBUTES: &'static [(&'static str, EmptyAttribute)];

    /// Child element fields, in the order new ones are written
    const FIELDS: &'static [&'static str];

    /// Value for an attribute or field name
    fn value(&self, name: &str) -> Option<&str>;

    /// Mutable slot for an attribute or field name
    fn slot(&mut self, name: &str) -> Option<&mut String>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NetworkRecord {
    pub code: String,
    pub start: String,
    pub end: String,
    pub description: String,
    pub institutions: String,
    pub region: String,
    #[serde(rename = "type")]
    pub network_type: String,
    pub net_class: String,
    pub archive: String,
    pub restricted: String,
    pub shared: String,
}

impl EntityRecord for NetworkRecord {
    const KIND: EntityKind = EntityKind::Network;
    const ATTRIBUTES: &'static [(&'static str, EmptyAttribute)] =
        &[("code", EmptyAttribute::Ignore)];
    const FIELDS: &'static [&'static str] = &[
        "start",
        "end",
        "description",
        "institutions",
        "region",
        "type",
        "netClass",
        "archive",
        "restricted",
        "shared",
    ];

    fn value(&self, name: &str) -> Option<&str> {
        let value = match name {
            "code" => &self.code,
            "start" => &self.start,
            "end" => &self.end,
            "description" => &self.description,
            "institutions" => &self.institutions,
            "region" => &self.region,
            "type" => &self.network_type,
            "netClass" => &self.net_class,
            "archive" => &self.archive,
            "restricted" => &self.restricted,
            "shared" => &self.shared,
            _ => return None,
        };
        Some(value.as_str())
    }

    fn slot(&mut self, name: &str) -> Option<&mut String> {
        let slot = match name {
            "code" => &mut self.code,
            "start" => &mut self.start,
            "end" => &mut self.end,
            "description" => &mut self.description,
            "institutions" => &mut self.institutions,
            "region" => &mut self.region,
            "type" => &mut self.network_type,
            "netClass" => &mut self.net_class,
            "archive" => &mut self.archive,
            "restricted" => &mut self.restricted,
            "shared" => &mut self.shared,
            _ => return None,
        };
        Some(slot)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StationRecord {
    pub code: String,
    pub name: String,
    pub description: String,
    pub start: String,
    pub end: String,
    pub latitude: String,
    pub longitude: String,
    pub elevation: String,
    pub place: String,
    pub country: String,
    pub affiliation: String,
}

impl EntityRecord for StationRecord {
    const KIND: EntityKind = EntityKind::Station;
    const ATTRIBUTES: &'static [(&'static str, EmptyAttribute)] = &[
        ("code", EmptyAttribute::Ignore),
        ("name", EmptyAttribute::Remove),
    ];
    const FIELDS: &'static [&'static str] = &[
        "description",
        "start",
        "end",
        "latitude",
        "longitude",
        "elevation",
        "place",
        "country",
        "affiliation",
    ];

    fn value(&self, name: &str) -> Option<&str> {
        let value = match name {
            "code" => &self.code,
            "name" => &self.name,
            "description" => &self.description,
            "start" => &self.start,
            "end" => &self.end,
            "latitude" => &self.latitude,
            "longitude" => &self.longitude,
            "elevation" => &self.elevation,
            "place" => &self.place,
            "country" => &self.country,
            "affiliation" => &self.affiliation,
            _ => return None,
        };
        Some(value.as_str())
    }

    fn slot(&mut self, name: &str) -> Option<&mut String> {
        let slot = match name {
            "code" => &mut self.code,
            "name" => &mut self.name,
            "description" => &mut self.description,
            "start" => &mut self.start,
            "end" => &mut self.end,
            "latitude" => &mut self.latitude,
            "longitude" => &mut self.longitude,
            "elevation" => &mut self.elevation,
            "place" => &mut self.place,
            "country" => &mut self.country,
            "affiliation" => &mut self.affiliation,
            _ => return None,
        };
        Some(slot)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LocationRecord {
    pub code: String,
    pub start: String,
    pub end: String,
    pub latitude: String,
    pub longitude: String,
    pub elevation: String,
    pub depth: String,
    pub country: String,
    pub description: String,
    pub affiliation: String,
}

impl EntityRecord for LocationRecord {
    const KIND: EntityKind = EntityKind::SensorLocation;
    // Blank location codes are common and meaningful
    const ATTRIBUTES: &'static [(&'static str, EmptyAttribute)] =
        &[("code", EmptyAttribute::Keep)];
    const FIELDS: &'static [&'static str] = &[
        "start",
        "end",
        "latitude",
        "longitude",
        "elevation",
        "depth",
        "country",
        "description",
        "affiliation",
    ];

    fn value(&self, name: &str) -> Option<&str> {
        let value = match name {
            "code" => &self.code,
            "start" => &self.start,
            "end" => &self.end,
            "latitude" => &self.latitude,
            "longitude" => &self.longitude,
            "elevation" => &self.elevation,
            "depth" => &self.depth,
            "country" => &self.country,
            "description" => &self.description,
            "affiliation" => &self.affiliation,
            _ => return None,
        };
        Some(value.as_str())
    }

    fn slot(&mut self, name: &str) -> Option<&mut String> {
        let slot = match name {
            "code" => &mut self.code,
            "start" => &mut self.start,
            "end" => &mut self.end,
            "latitude" => &mut self.latitude,
            "longitude" => &mut self.longitude,
            "elevation" => &mut self.elevation,
            "depth" => &mut self.depth,
            "country" => &mut self.country,
            "description" => &mut self.description,
            "affiliation" => &mut self.affiliation,
            _ => return None,
        };
        Some(slot)
    }
}

/// A stream's sample rate in either of its wire encodings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleRate {
    /// `sampleRate`
    Single(String),
    /// `sampleRateNumerator` / `sampleRateDenominator`
    Fraction {
        numerator: String,
        denominator: String,
    },
}

impl Default for SampleRate {
    fn default() -> Self {
        Self::empty(SampleRateEncoding::default())
    }
}

impl SampleRate {
    pub const SINGLE: &'static str = "sampleRate";
    pub const NUMERATOR: &'static str = "sampleRateNumerator";
    pub const DENOMINATOR: &'static str = "sampleRateDenominator";

    /// An unset rate in the given encoding
    pub fn empty(encoding: SampleRateEncoding) -> Self {
        match encoding {
            SampleRateEncoding::Single => SampleRate::Single(String::new()),
            SampleRateEncoding::Fraction => SampleRate::Fraction {
                numerator: String::new(),
                denominator: String::new(),
            },
        }
    }

    pub fn encoding(&self) -> SampleRateEncoding {
        match self {
            SampleRate::Single(_) => SampleRateEncoding::Single,
            SampleRate::Fraction { .. } => SampleRateEncoding::Fraction,
        }
    }

    /// Field values to write. Fields of the other encoding are cleared so a
    /// stream never carries both forms.
    pub fn fields(&self) -> [(&'static str, &str); 3] {
        match self {
            SampleRate::Single(rate) => [
                (Self::SINGLE, rate.as_str()),
                (Self::NUMERATOR, ""),
                (Self::DENOMINATOR, ""),
            ],
            SampleRate::Fraction {
                numerator,
                denominator,
            } => [
                (Self::SINGLE, ""),
                (Self::NUMERATOR, numerator.as_str()),
                (Self::DENOMINATOR, denominator.as_str()),
            ],
        }
    }

    /// Rate in Hz, if set and well-formed
    pub fn hertz(&self) -> Option<f64> {
        match self {
            SampleRate::Single(rate) => rate.trim().parse().ok(),
            SampleRate::Fraction {
                numerator,
                denominator,
            } => {
                let numerator: f64 = numerator.trim().parse().ok()?;
                let denominator: f64 = denominator.trim().parse().ok()?;
                (denominator != 0.0).then(|| numerator / denominator)
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StreamRecord {
    pub code: String,
    pub start: String,
    pub end: String,
    pub depth: String,
    pub azimuth: String,
    pub dip: String,
    pub gain: String,
    pub gain_frequency: String,
    pub gain_unit: String,
    pub flags: String,
    pub sample_rate: SampleRate,
    /// Sensor link value in the document's addressing convention
    pub sensor: String,
    /// Datalogger link value in the document's addressing convention
    pub datalogger: String,
}

impl EntityRecord for StreamRecord {
    const KIND: EntityKind = EntityKind::Stream;
    const ATTRIBUTES: &'static [(&'static str, EmptyAttribute)] =
        &[("code", EmptyAttribute::Ignore)];
    // Sample rate and component links are handled separately
    const FIELDS: &'static [&'static str] = &[
        "start",
        "end",
        "depth",
        "azimuth",
        "dip",
        "gain",
        "gainFrequency",
        "gainUnit",
        "flags",
    ];

    fn value(&self, name: &str) -> Option<&str> {
        let value = match name {
            "code" => &self.code,
            "start" => &self.start,
            "end" => &self.end,
            "depth" => &self.depth,
            "azimuth" => &self.azimuth,
            "dip" => &self.dip,
            "gain" => &self.gain,
            "gainFrequency" => &self.gain_frequency,
            "gainUnit" => &self.gain_unit,
            "flags" => &self.flags,
            _ => return None,
        };
        Some(value.as_str())
    }

    fn slot(&mut self, name: &str) -> Option<&mut String> {
        let slot = match name {
            "code" => &mut self.code,
            "start" => &mut self.start,
            "end" => &mut self.end,
            "depth" => &mut self.depth,
            "azimuth" => &mut self.azimuth,
            "dip" => &mut self.dip,
            "gain" => &mut self.gain,
            "gainFrequency" => &mut self.gain_frequency,
            "gainUnit" => &mut self.gain_unit,
            "flags" => &mut self.flags,
            _ => return None,
        };
        Some(slot)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SensorRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub sensor_type: String,
    pub model: String,
    pub manufacturer: String,
    pub serial_number: String,
    pub response: String,
    pub unit: String,
    pub low_frequency: String,
    pub high_frequency: String,
    pub calibration_date: String,
    pub calibration_scale: String,
}

impl EntityRecord for SensorRecord {
    const KIND: EntityKind = EntityKind::Sensor;
    const ATTRIBUTES: &'static [(&'static str, EmptyAttribute)] =
        &[("name", EmptyAttribute::Ignore)];
    const FIELDS: &'static [&'static str] = &[
        "type",
        "model",
        "manufacturer",
        "serialNumber",
        "response",
        "unit",
        "lowFrequency",
        "highFrequency",
        "calibrationDate",
        "calibrationScale",
    ];

    fn value(&self, name: &str) -> Option<&str> {
        let value = match name {
            "name" => &self.name,
            "type" => &self.sensor_type,
            "model" => &self.model,
            "manufacturer" => &self.manufacturer,
            "serialNumber" => &self.serial_number,
            "response" => &self.response,
            "unit" => &self.unit,
            "lowFrequency" => &self.low_frequency,
            "highFrequency" => &self.high_frequency,
            "calibrationDate" => &self.calibration_date,
            "calibrationScale" => &self.calibration_scale,
            _ => return None,
        };
        Some(value.as_str())
    }

    fn slot(&mut self, name: &str) -> Option<&mut String> {
        let slot = match name {
            "name" => &mut self.name,
            "type" => &mut self.sensor_type,
            "model" => &mut self.model,
            "manufacturer" => &mut self.manufacturer,
            "serialNumber" => &mut self.serial_number,
            "response" => &mut self.response,
            "unit" => &mut self.unit,
            "lowFrequency" => &mut self.low_frequency,
            "highFrequency" => &mut self.high_frequency,
            "calibrationDate" => &mut self.calibration_date,
            "calibrationScale" => &mut self.calibration_scale,
            _ => return None,
        };
        Some(slot)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DataloggerRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub datalogger_type: String,
    pub model: String,
    pub manufacturer: String,
    pub serial_number: String,
    pub description: String,
    pub max_clock_drift: String,
    pub record_length: String,
    pub sample_rate: String,
    pub sample_rate_multiplier: String,
}

impl EntityRecord for DataloggerRecord {
    const KIND: EntityKind = EntityKind::Datalogger;
    const ATTRIBUTES: &'static [(&'static str, EmptyAttribute)] =
        &[("name", EmptyAttribute::Ignore)];
    const FIELDS: &'static [&'static str] = &[
        "type",
        "model",
        "manufacturer",
        "serialNumber",
        "description",
        "maxClockDrift",
        "recordLength",
        "sampleRate",
        "sampleRateMultiplier",
    ];

    fn value(&self, name: &str) -> Option<&str> {
        let value = match name {
            "name" => &self.name,
            "type" => &self.datalogger_type,
            "model" => &self.model,
            "manufacturer" => &self.manufacturer,
            "serialNumber" => &self.serial_number,
            "description" => &self.description,
            "maxClockDrift" => &self.max_clock_drift,
            "recordLength" => &self.record_length,
            "sampleRate" => &self.sample_rate,
            "sampleRateMultiplier" => &self.sample_rate_multiplier,
            _ => return None,
        };
        Some(value.as_str())
    }

    fn slot(&mut self, name: &str) -> Option<&mut String> {
        let slot = match name {
            "name" => &mut self.name,
            "type" => &mut self.datalogger_type,
            "model" => &mut self.model,
            "manufacturer" => &mut self.manufacturer,
            "serialNumber" => &mut self.serial_number,
            "description" => &mut self.description,
            "maxClockDrift" => &mut self.max_clock_drift,
            "recordLength" => &mut self.record_length,
            "sampleRate" => &mut self.sample_rate,
            "sampleRateMultiplier" => &mut self.sample_rate_multiplier,
            _ => return None,
        };
        Some(slot)
    }
}
