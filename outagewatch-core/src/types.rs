//! Domain types for outagewatch.
//!
//! GeoJSON shapes follow RFC 7946: positions are `[lon, lat]`.
//! Snapshots are kept as JSON objects rather than [`OutageRecord`]s so that a
//! previously committed file with an older field set still diffs cleanly.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Stormcenter instance identifier (first feed identifier).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceId(pub String);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for InstanceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for InstanceId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Stormcenter view identifier (second feed identifier).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ViewId(pub String);

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ViewId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ViewId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Identity of an outage across fetches: latitude and longitude concatenated.
///
/// Two outages at identical coordinates share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DerivedKey(pub String);

impl DerivedKey {
    /// `format!("{lat}{lon}")` with shortest round-trip float formatting.
    pub fn from_coords(lat: f64, lon: f64) -> Self {
        Self(format!("{lat}{lon}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for DerivedKey {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// GeoJSON
// ---------------------------------------------------------------------------

/// A `[lon, lat]` position.
pub type Position = [f64; 2];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum FeatureCollectionTag {
    #[default]
    FeatureCollection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum FeatureTag {
    #[default]
    Feature,
}

/// Geometry of a single outage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: Position },
    Polygon { coordinates: Vec<Vec<Position>> },
}

/// One outage as emitted by the fetcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type", default)]
    pub tag: FeatureTag,
    pub geometry: Option<Geometry>,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl Feature {
    pub fn new(geometry: Geometry, properties: Map<String, Value>) -> Self {
        Self {
            tag: FeatureTag::Feature,
            geometry: Some(geometry),
            properties,
        }
    }
}

/// The raw artifact of a fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FeatureCollection {
    #[serde(rename = "type", default)]
    pub tag: FeatureCollectionTag,
    #[serde(default)]
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            tag: FeatureCollectionTag::FeatureCollection,
            features,
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Flat records
// ---------------------------------------------------------------------------

/// A single outage, flattened out of its feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutageRecord {
    #[serde(rename = "_id")]
    pub id: DerivedKey,
    pub lat: f64,
    pub lon: f64,
    pub source: Option<String>,
    pub cause: Option<String>,
    pub cause_orig: Option<String>,
    pub cluster: Option<bool>,
    pub crew_status: Option<String>,
    pub crew_status_orig: Option<String>,
    pub start_time: Option<String>,
    pub etr: Option<String>,
    pub n_out: Option<u64>,
    #[serde(rename = "type")]
    pub outage_type: Option<String>,
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Ordered records as observed at one fetch.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    records: Vec<Map<String, Value>>,
}

impl Snapshot {
    pub fn new(records: Vec<Map<String, Value>>) -> Self {
        Self { records }
    }

    pub fn from_records(records: &[OutageRecord]) -> Result<Self, serde_json::Error> {
        let mut out = Vec::with_capacity(records.len());
        for record in records {
            match serde_json::to_value(record)? {
                Value::Object(map) => out.push(map),
                other => {
                    return Err(serde::ser::Error::custom(format!(
                        "record serialized to non-object: {other}"
                    )))
                }
            }
        }
        Ok(Self { records: out })
    }

    pub fn records(&self) -> &[Map<String, Value>] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Pretty JSON with sorted keys and a trailing newline; the on-disk form.
    pub fn to_pretty_json(&self) -> Result<String, serde_json::Error> {
        let mut json = serde_json::to_string_pretty(&self.records)?;
        json.push('\n');
        Ok(json)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn newtype_display() {
        assert_eq!(InstanceId::from("abc").to_string(), "abc");
        assert_eq!(ViewId::from("def").to_string(), "def");
        assert_eq!(DerivedKey::from("k").to_string(), "k");
    }

    #[test]
    fn derived_key_concatenates_coordinates() {
        assert_eq!(DerivedKey::from_coords(30.1, -97.7).as_str(), "30.1-97.7");
        assert_eq!(DerivedKey::from_coords(30.0, -97.0).as_str(), "30-97");
    }

    #[test]
    fn geometry_uses_geojson_type_tag() {
        let point = Geometry::Point {
            coordinates: [-97.7, 30.1],
        };
        let value = serde_json::to_value(&point).expect("serialize");
        assert_eq!(value, json!({"type": "Point", "coordinates": [-97.7, 30.1]}));
    }

    #[test]
    fn feature_collection_parses_minimal_document() {
        let doc = r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","geometry":{"type":"Point","coordinates":[1.0,2.0]},"properties":{"a":1}}
        ]}"#;
        let fc: FeatureCollection = serde_json::from_str(doc).expect("parse");
        assert_eq!(fc.len(), 1);
        assert_eq!(fc.features[0].properties["a"], json!(1));
    }

    #[test]
    fn snapshot_serializes_with_sorted_keys() {
        let record = OutageRecord {
            id: DerivedKey::from_coords(1.5, 2.5),
            lat: 1.5,
            lon: 2.5,
            source: None,
            cause: Some("Weather".into()),
            cause_orig: None,
            cluster: Some(false),
            crew_status: None,
            crew_status_orig: None,
            start_time: None,
            etr: None,
            n_out: Some(3),
            outage_type: None,
        };
        let snapshot = Snapshot::from_records(&[record]).expect("snapshot");
        let json = snapshot.to_pretty_json().expect("json");
        let id_pos = json.find("\"_id\"").expect("_id");
        let type_pos = json.find("\"type\"").expect("type");
        assert!(id_pos < type_pos, "keys must be sorted");
        assert!(json.ends_with("]\n"));
    }
}
