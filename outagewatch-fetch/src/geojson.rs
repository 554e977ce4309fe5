//! Raw stormcenter outages → GeoJSON.

use serde_json::Value;

use outagewatch_core::{Feature, FeatureCollection, Geometry};

use crate::error::{shape_err, FetchError};
use crate::tiles::decode_polyline;

/// Convert raw outages to a feature collection, preserving order.
///
/// Each outage's `geom` is consumed; every other field becomes a property.
/// `geom.a` holds encoded polygon rings, otherwise `geom.p[0]` is a point.
pub fn to_feature_collection(outages: Vec<Value>) -> Result<FeatureCollection, FetchError> {
    let mut features = Vec::with_capacity(outages.len());
    for (index, outage) in outages.into_iter().enumerate() {
        features.push(to_feature(index, outage)?);
    }
    Ok(FeatureCollection::new(features))
}

fn to_feature(index: usize, outage: Value) -> Result<Feature, FetchError> {
    let origin = outage
        .get("source")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("outage #{index}"));

    let Value::Object(mut properties) = outage else {
        return Err(shape_err(&origin, "outage is not an object"));
    };
    let geom = properties
        .remove("geom")
        .ok_or_else(|| shape_err(&origin, "outage has no geom"))?;

    let geometry = match rings(&geom) {
        Some(rings) => polygon(&origin, rings)?,
        None => point(&origin, &geom)?,
    };
    Ok(Feature::new(geometry, properties))
}

fn rings(geom: &Value) -> Option<&Vec<Value>> {
    geom.get("a")
        .and_then(Value::as_array)
        .filter(|rings| !rings.is_empty())
}

fn polygon(origin: &str, rings: &[Value]) -> Result<Geometry, FetchError> {
    let mut coordinates = Vec::with_capacity(rings.len());
    for ring in rings {
        let encoded = ring
            .as_str()
            .ok_or_else(|| shape_err(origin, "polygon ring is not an encoded polyline"))?;
        let ring: Vec<[f64; 2]> = decode_polyline(encoded)?
            .into_iter()
            .map(|(lat, lon)| [lon, lat])
            .collect();
        coordinates.push(ring);
    }
    Ok(Geometry::Polygon { coordinates })
}

fn point(origin: &str, geom: &Value) -> Result<Geometry, FetchError> {
    let encoded = geom
        .pointer("/p/0")
        .and_then(Value::as_str)
        .ok_or_else(|| shape_err(origin, "geom has neither `a` nor `p`"))?;
    let (lat, lon) = decode_polyline(encoded)?
        .into_iter()
        .next()
        .ok_or_else(|| shape_err(origin, "point polyline is empty"))?;
    Ok(Geometry::Point {
        coordinates: [lon, lat],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn point_outage_becomes_point_feature() {
        let fc = to_feature_collection(vec![json!({
            "id": "o1",
            "desc": {"n_out": 4},
            "geom": {"p": ["_p~iF~ps|U"]},
            "source": "https://k/tile.json"
        })])
        .unwrap();

        assert_eq!(fc.len(), 1);
        let feature = &fc.features[0];
        assert_eq!(
            feature.geometry,
            Some(Geometry::Point {
                coordinates: [-120.2, 38.5]
            })
        );
        assert!(!feature.properties.contains_key("geom"));
        assert_eq!(feature.properties["desc"]["n_out"], json!(4));
        assert_eq!(feature.properties["source"], json!("https://k/tile.json"));
    }

    #[test]
    fn area_outage_becomes_polygon_with_lon_lat_positions() {
        let fc = to_feature_collection(vec![json!({
            "geom": {"a": ["_p~iF~ps|U_ulLnnqC_mqNvxq`@"], "p": ["ignored"]}
        })])
        .unwrap();

        match &fc.features[0].geometry {
            Some(Geometry::Polygon { coordinates }) => {
                assert_eq!(coordinates.len(), 1);
                assert_eq!(coordinates[0][0], [-120.2, 38.5]);
                assert_eq!(coordinates[0][2], [-126.453, 43.252]);
            }
            other => panic!("expected polygon, got {other:?}"),
        }
    }

    #[test]
    fn outage_without_geom_is_a_shape_error() {
        let err = to_feature_collection(vec![json!({"source": "https://k/t.json"})]).unwrap_err();
        assert!(matches!(err, FetchError::Shape { .. }));
        assert!(err.to_string().contains("https://k/t.json"));
    }

    #[test]
    fn order_is_preserved() {
        let fc = to_feature_collection(vec![
            json!({"id": "first", "geom": {"p": ["_p~iF~ps|U"]}}),
            json!({"id": "second", "geom": {"p": ["_ulLnnqC"]}}),
        ])
        .unwrap();
        let ids: Vec<_> = fc.features.iter().map(|f| f.properties["id"].clone()).collect();
        assert_eq!(ids, vec![json!("first"), json!("second")]);
    }
}
