//! Encoded polylines and web-mercator tile addressing.
//!
//! Polylines use the Google encoding at precision 5 and decode to
//! `(lat, lon)` pairs. Tiles follow the XYZ scheme; a quadkey's length is its
//! zoom level.

use std::f64::consts::PI;

use crate::error::FetchError;

const POLYLINE_FACTOR: f64 = 1e5;
const MAX_LATITUDE: f64 = 85.051_129;
const LL_EPSILON: f64 = 1e-11;
const TILE_EPSILON: f64 = 1e-14;

// ---------------------------------------------------------------------------
// Polyline
// ---------------------------------------------------------------------------

/// Decode an encoded polyline into `(lat, lon)` points.
pub fn decode_polyline(encoded: &str) -> Result<Vec<(f64, f64)>, FetchError> {
    let bytes = encoded.as_bytes();
    let mut points = Vec::new();
    let mut index = 0usize;
    let mut lat = 0i64;
    let mut lon = 0i64;

    while index < bytes.len() {
        lat += next_delta(bytes, &mut index)?;
        if index >= bytes.len() {
            return Err(FetchError::Polyline {
                offset: index,
                reason: "latitude without longitude",
            });
        }
        lon += next_delta(bytes, &mut index)?;
        points.push((lat as f64 / POLYLINE_FACTOR, lon as f64 / POLYLINE_FACTOR));
    }
    Ok(points)
}

fn next_delta(bytes: &[u8], index: &mut usize) -> Result<i64, FetchError> {
    let mut result = 0i64;
    let mut shift = 0u32;
    loop {
        let Some(&byte) = bytes.get(*index) else {
            return Err(FetchError::Polyline {
                offset: *index,
                reason: "truncated value",
            });
        };
        if !(63..=126).contains(&byte) {
            return Err(FetchError::Polyline {
                offset: *index,
                reason: "byte outside the encoding alphabet",
            });
        }
        if shift > 60 {
            return Err(FetchError::Polyline {
                offset: *index,
                reason: "value overflows 64 bits",
            });
        }
        *index += 1;
        let chunk = i64::from(byte - 63);
        result |= (chunk & 0x1f) << shift;
        shift += 5;
        if chunk < 0x20 {
            break;
        }
    }
    Ok(if result & 1 != 0 {
        !(result >> 1)
    } else {
        result >> 1
    })
}

// ---------------------------------------------------------------------------
// Bounding box
// ---------------------------------------------------------------------------

/// Geographic bounds in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl BoundingBox {
    /// Smallest box containing every `(lat, lon)` point, `None` if empty.
    pub fn from_points(points: &[(f64, f64)]) -> Option<Self> {
        let (&(lat0, lon0), rest) = points.split_first()?;
        let mut bbox = Self {
            west: lon0,
            south: lat0,
            east: lon0,
            north: lat0,
        };
        for &(lat, lon) in rest {
            bbox.west = bbox.west.min(lon);
            bbox.east = bbox.east.max(lon);
            bbox.south = bbox.south.min(lat);
            bbox.north = bbox.north.max(lat);
        }
        Some(bbox)
    }
}

// ---------------------------------------------------------------------------
// Tiles
// ---------------------------------------------------------------------------

/// An XYZ web-mercator tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tile {
    pub x: u32,
    pub y: u32,
    pub zoom: u8,
}

impl Tile {
    /// The tile containing `(lon, lat)` at `zoom`.
    pub fn containing(lon: f64, lat: f64, zoom: u8) -> Self {
        let x = lon / 360.0 + 0.5;
        let sin_lat = lat.to_radians().sin();
        let y = 0.5 - 0.25 * ((1.0 + sin_lat) / (1.0 - sin_lat)).ln() / PI;
        Self {
            x: tile_index(x, zoom),
            y: tile_index(y, zoom),
            zoom,
        }
    }

    pub fn quadkey(&self) -> String {
        let mut key = String::with_capacity(usize::from(self.zoom));
        for level in (1..=self.zoom).rev() {
            let mask = 1u32 << (level - 1);
            let mut digit = b'0';
            if self.x & mask != 0 {
                digit += 1;
            }
            if self.y & mask != 0 {
                digit += 2;
            }
            key.push(char::from(digit));
        }
        key
    }
}

fn tile_index(fraction: f64, zoom: u8) -> u32 {
    let size = 1u64 << zoom;
    if fraction <= 0.0 {
        0
    } else if fraction >= 1.0 {
        (size - 1) as u32
    } else {
        ((fraction + TILE_EPSILON) * size as f64).floor() as u32
    }
}

/// Every tile at `zoom` intersecting `bbox`, column-major (x outer, y inner).
pub fn tiles_covering(bbox: &BoundingBox, zoom: u8) -> Vec<Tile> {
    let west = bbox.west.max(-180.0);
    let south = bbox.south.max(-MAX_LATITUDE);
    let east = bbox.east.min(180.0);
    let north = bbox.north.min(MAX_LATITUDE);

    let upper_left = Tile::containing(west, north, zoom);
    let lower_right = Tile::containing(east - LL_EPSILON, south + LL_EPSILON, zoom);

    let mut tiles = Vec::new();
    for x in upper_left.x..=lower_right.x {
        for y in upper_left.y..=lower_right.y {
            tiles.push(Tile { x, y, zoom });
        }
    }
    tiles
}

/// The last three digits of a quadkey, reversed (`{qkh}` in tile templates).
pub fn quadkey_hash(quadkey: &str) -> String {
    quadkey.chars().rev().take(3).collect()
}
