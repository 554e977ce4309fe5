//! outagewatch core library: domain types, config persistence, errors.
//!
//! Public API surface:
//! - [`types`]: feed identifiers, GeoJSON shapes, outage records, snapshots
//! - [`error`]: [`ConfigError`]
//! - [`config`]: load / save / init of `~/.outagewatch/config.yaml`

pub mod config;
pub mod error;
pub mod types;

pub use config::{CommitAuthor, WatchConfig};
pub use error::ConfigError;
pub use types::{
    DerivedKey, Feature, FeatureCollection, Geometry, InstanceId, OutageRecord, Snapshot, ViewId,
};
