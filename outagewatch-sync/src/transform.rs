//! GeoJSON features → flat outage records.

use serde_json::{Map, Value};

use outagewatch_core::types::Position;
use outagewatch_core::{DerivedKey, Feature, FeatureCollection, Geometry, OutageRecord};

use crate::error::TransformError;

pub const DEFAULT_LOCALE: &str = "EN-US";

/// Flatten every feature, preserving order.
///
/// The first malformed feature aborts the whole transform.
pub fn transform(
    collection: &FeatureCollection,
    locale: &str,
) -> Result<Vec<OutageRecord>, TransformError> {
    collection
        .features
        .iter()
        .enumerate()
        .map(|(index, feature)| transform_feature(index, feature, locale))
        .collect()
}

/// Flatten a single feature. `index` is only used in errors.
pub fn transform_feature(
    index: usize,
    feature: &Feature,
    locale: &str,
) -> Result<OutageRecord, TransformError> {
    let geometry = feature
        .geometry
        .as_ref()
        .ok_or_else(|| TransformError::new(index, "missing geometry"))?;
    let (lat, lon) = location(geometry).map_err(|reason| TransformError::new(index, reason))?;

    let props = &feature.properties;
    let desc = match props.get("desc") {
        None | Some(Value::Null) => None,
        Some(Value::Object(desc)) => Some(desc),
        Some(_) => return Err(TransformError::new(index, "`desc` is not an object")),
    };
    let fields = Fields { index, desc };

    Ok(OutageRecord {
        id: DerivedKey::from_coords(lat, lon),
        lat,
        lon,
        source: text(index, "source", props.get("source"))?,
        cause: fields.text(&["cause", locale])?,
        cause_orig: fields.text(&["cause", "orig"])?,
        cluster: fields.flag(&["cluster"])?,
        crew_status: fields.text(&["crew_status", locale])?,
        crew_status_orig: fields.text(&["crew_status", "orig"])?,
        start_time: fields.text(&["start_time"])?,
        etr: fields.text(&["etr"])?,
        n_out: fields.count(&["n_out"])?,
        outage_type: fields.text(&["outage_type"])?,
    })
}

// ---------------------------------------------------------------------------
// Location
// ---------------------------------------------------------------------------

/// `(lat, lon)` of a point, or of the centroid of a polygon's outer ring.
fn location(geometry: &Geometry) -> Result<(f64, f64), String> {
    let (lon, lat) = match geometry {
        Geometry::Point { coordinates } => (coordinates[0], coordinates[1]),
        Geometry::Polygon { coordinates } => {
            let ring = coordinates
                .first()
                .filter(|ring| !ring.is_empty())
                .ok_or("polygon has no outer ring")?;
            centroid(ring)
        }
    };
    if !lat.is_finite() || !lon.is_finite() {
        return Err(format!("non-finite coordinates [{lon}, {lat}]"));
    }
    Ok((lat, lon))
}

/// Area centroid of a ring as `(lon, lat)`; vertex mean for degenerate rings.
fn centroid(ring: &[Position]) -> (f64, f64) {
    let vertices = match ring {
        [first, .., last] if first == last => &ring[..ring.len() - 1],
        _ => ring,
    };

    let mut area = 0.0;
    let mut cx = 0.0;
    let mut cy = 0.0;
    for (i, a) in vertices.iter().enumerate() {
        let b = vertices[(i + 1) % vertices.len()];
        let cross = a[0] * b[1] - b[0] * a[1];
        area += cross;
        cx += (a[0] + b[0]) * cross;
        cy += (a[1] + b[1]) * cross;
    }
    area /= 2.0;

    if area.abs() < f64::EPSILON {
        let n = vertices.len() as f64;
        let lon = vertices.iter().map(|p| p[0]).sum::<f64>() / n;
        let lat = vertices.iter().map(|p| p[1]).sum::<f64>() / n;
        return (lon, lat);
    }
    (cx / (6.0 * area), cy / (6.0 * area))
}

// ---------------------------------------------------------------------------
// Attribute paths
// ---------------------------------------------------------------------------

struct Fields<'a> {
    index: usize,
    desc: Option<&'a Map<String, Value>>,
}

impl Fields<'_> {
    fn lookup(&self, path: &[&str]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        let mut value = self.desc?.get(*first)?;
        for key in rest {
            value = value.as_object()?.get(*key)?;
        }
        Some(value)
    }

    fn text(&self, path: &[&str]) -> Result<Option<String>, TransformError> {
        text(self.index, &display_path(path), self.lookup(path))
    }

    fn flag(&self, path: &[&str]) -> Result<Option<bool>, TransformError> {
        match self.lookup(path) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(TransformError::new(
                self.index,
                format!("`{}` is not a boolean: {other}", display_path(path)),
            )),
        }
    }

    fn count(&self, path: &[&str]) -> Result<Option<u64>, TransformError> {
        let parsed = match self.lookup(path) {
            None | Some(Value::Null) => return Ok(None),
            Some(Value::Number(n)) => n.as_u64(),
            Some(Value::String(s)) => s.trim().parse().ok(),
            Some(_) => None,
        };
        parsed.map(Some).ok_or_else(|| {
            TransformError::new(
                self.index,
                format!("`{}` is not a customer count", display_path(path)),
            )
        })
    }
}

/// Strings pass through; numbers and booleans are stringified.
fn text(index: usize, path: &str, value: Option<&Value>) -> Result<Option<String>, TransformError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(other) => Err(TransformError::new(
            index,
            format!("`{path}` is not text: {other}"),
        )),
    }
}

fn display_path(path: &[&str]) -> String {
    let mut out = String::from("desc");
    for key in path {
        out.push('.');
        out.push_str(key);
    }
    out
}
