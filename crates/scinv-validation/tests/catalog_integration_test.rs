use scinv_schema::EntityKind;
use scinv_validation::{DateTimeNormalizer, Severity, ValidationEngine};

#[test]
fn test_stream_record_from_form() {
    let engine = ValidationEngine::new();
    let report = engine.validate_record(
        EntityKind::Stream,
        [
            ("code", "HHZ"),
            ("start", "2019-03-01 00:00:00"),
            ("end", ""),
            ("depth", "0"),
            ("azimuth", "0"),
            ("dip", "-90"),
            ("gain", "1.5e9"),
            ("gainFrequency", "1"),
            ("gainUnit", "M/S"),
            ("sampleRateNumerator", "100"),
            ("sampleRateDenominator", "1"),
        ],
    );
    assert!(report.is_valid(), "{report}");
}

#[test]
fn test_stream_orientation_out_of_range() {
    let engine = ValidationEngine::new();
    let report = engine.validate_record(
        EntityKind::Stream,
        [("code", "HHN"), ("azimuth", "361"), ("dip", "-91")],
    );
    assert_eq!(report.invalid_fields(), vec!["azimuth", "dip"]);
    assert!(report.issues.iter().all(|i| i.severity == Severity::Error));
}

#[test]
fn test_datalogger_counts_are_whole_numbers() {
    let engine = ValidationEngine::new();
    let report = engine.validate_record(
        EntityKind::Datalogger,
        [
            ("name", "Q330"),
            ("serialNumber", "1234"),
            ("recordLength", "512.5"),
            ("maxClockDrift", "0.0001"),
        ],
    );
    assert_eq!(report.invalid_fields(), vec!["recordLength"]);
}

#[test]
fn test_network_flags_case_insensitive() {
    let engine = ValidationEngine::new();
    let ok = engine.validate_record(
        EntityKind::Network,
        [("code", "GE"), ("restricted", "False"), ("shared", "TRUE")],
    );
    assert!(ok.is_valid());

    let bad = engine.validate_record(EntityKind::Network, [("code", "GE"), ("shared", "maybe")]);
    assert_eq!(bad.invalid_fields(), vec!["shared"]);
}

#[test]
fn test_normalised_dates_validate() {
    let engine = ValidationEngine::new();
    let canonical = DateTimeNormalizer::convert("2024-02-29 12:30:00").unwrap();
    let report = engine.validate_record(
        EntityKind::Sensor,
        [
            ("name", "STS-2"),
            ("serialNumber", "S1"),
            ("calibrationDate", canonical.as_str()),
        ],
    );
    assert!(report.is_valid());
}
