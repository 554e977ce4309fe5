//! # outagewatch-fetch
//!
//! Scrapes a Kubra stormcenter deployment and emits its outages as a GeoJSON
//! [`FeatureCollection`](outagewatch_core::FeatureCollection).
//!
//! Call [`scrape`] for the raw outage list or [`fetch_feature_collection`] for
//! the full fetch stage. All HTTP goes through [`JsonSource`] so a
//! [`MemorySource`] can stand in for the network.

pub mod error;
pub mod geojson;
pub mod http;
pub mod kubra;
pub mod tiles;

pub use error::FetchError;
pub use geojson::to_feature_collection;
pub use http::{JsonSource, MemorySource, UreqSource};
pub use kubra::{fetch_feature_collection, scrape, Stormcenter};
