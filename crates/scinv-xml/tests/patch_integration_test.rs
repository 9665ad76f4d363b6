//! Integration tests for parsing and formatting-preserving patches

use scinv_xml::{ChangeTracker, Error, NetworkReader, TextPatcher, parse_str};

const NS: &str = "http://geofon.gfz-potsdam.de/ns/seiscomp3-schema/0.12";

fn inventory() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<seiscomp xmlns="{NS}" version="0.12">
  <!-- hand maintained, do not reformat -->
  <Inventory>
    <sensor publicID="Sensor/S1" name="STS-2">
      <serialNumber>S1</serialNumber>
      <unit>M/S</unit>
    </sensor>
    <datalogger publicID="Datalogger/D1" name="Q330">
      <serialNumber>D1</serialNumber>
    </datalogger>
    <network publicID="Network/GE" code="GE">
      <start>2000-01-01T00:00:00.0000Z</start>
      <station publicID="Station/GE.APE" code="APE" name="Apirathos">
        <latitude>37.07</latitude>
        <sensorLocation publicID="Location/GE.APE." code="">
          <stream publicID="Stream/GE.APE..BHZ" code="BHZ">
            <gain>1500</gain>
            <sensorSerialNumber>S1</sensorSerialNumber>
          </stream>
        </sensorLocation>
      </station>
    </network>
  </Inventory>
</seiscomp>
"#
    )
}

fn changed_lines(before: &str, after: &str) -> Vec<(String, String)> {
    before
        .lines()
        .zip(after.lines())
        .filter(|(a, b)| a != b)
        .map(|(a, b)| (a.to_string(), b.to_string()))
        .collect()
}

#[test]
fn test_single_field_change_touches_one_line() {
    let raw = inventory();
    let mut tracker = ChangeTracker::new();
    tracker.record("Stream/GE.APE..BHZ", "gain", "2000");

    let patched = TextPatcher::new().patch(&raw, &tracker).unwrap();

    assert_eq!(raw.lines().count(), patched.lines().count());
    assert_eq!(
        changed_lines(&raw, &patched),
        vec![(
            "            <gain>1500</gain>".to_string(),
            "            <gain>2000</gain>".to_string()
        )]
    );
}

#[test]
fn test_patched_text_parses_with_new_values() {
    let raw = inventory();
    let mut tracker = ChangeTracker::new();
    tracker.record("Station/GE.APE", "longitude", "25.53");
    tracker.record("Sensor/S1", "unit", "");
    tracker.record("Sensor/S1", "model", "STS-2.5");
    tracker.record_attribute("Network/GE", "code", "GX");

    let patched = TextPatcher::new().patch(&raw, &tracker).unwrap();
    let doc = parse_str(&patched, "patched.xml").unwrap();

    let station = doc.find_descendants(doc.root(), NS, "station")[0];
    assert_eq!(doc.child_text(station, NS, "longitude"), Some("25.53"));

    let sensor = doc.find_descendants(doc.root(), NS, "sensor")[0];
    assert_eq!(doc.child_text(sensor, NS, "unit"), None);
    assert_eq!(doc.child_text(sensor, NS, "model"), Some("STS-2.5"));

    let network = doc.find_descendants(doc.root(), NS, "network")[0];
    assert_eq!(doc.node(network).attribute("code"), Some("GX"));

    // New station field lands before the nested location block
    let lon = patched.find("<longitude>").unwrap();
    let loc = patched.find("<sensorLocation").unwrap();
    assert!(lon < loc);
    assert!(patched.contains("<!-- hand maintained, do not reformat -->"));
}

#[test]
fn test_empty_tracker_is_identity() {
    let raw = inventory();
    let patched = TextPatcher::new().patch(&raw, &ChangeTracker::new()).unwrap();
    assert_eq!(patched, raw);
}

#[test]
fn test_unknown_entity_fails_whole_patch() {
    let raw = inventory();
    let mut tracker = ChangeTracker::new();
    tracker.record("Stream/GE.APE..BHZ", "gain", "1");
    tracker.record("Stream/XX.NONE..BHZ", "gain", "1");

    let result = TextPatcher::new().patch(&raw, &tracker);
    assert!(matches!(result, Err(Error::Patch { .. })));
}

#[test]
fn test_streamed_networks_match_full_parse() {
    let raw = inventory();
    let full = parse_str(&raw, "inv.xml").unwrap();
    let expected = full.find_descendants(full.root(), NS, "stream").len();

    let streamed: usize = NetworkReader::new(raw.as_bytes(), "inv.xml")
        .with_namespace(NS)
        .map(|block| {
            let block = block.unwrap();
            block.find_descendants(block.root(), NS, "stream").len()
        })
        .sum();
    assert_eq!(streamed, expected);
}
