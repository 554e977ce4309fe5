//! Kubra stormcenter scraper.
//!
//! A scrape is four steps: read the view's current state, resolve the cluster
//! tile URL template from the deployment configuration, cover the service area
//! with zoom-7 tiles, then descend into every tile that still contains
//! clusters until each outage is reported individually (or zoom 14 is hit).

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

use outagewatch_core::{FeatureCollection, InstanceId, ViewId};

use crate::error::{shape_err, FetchError};
use crate::geojson::to_feature_collection;
use crate::http::JsonSource;
use crate::tiles::{decode_polyline, quadkey_hash, tiles_covering, BoundingBox};

pub const MIN_ZOOM: u8 = 7;
pub const MAX_ZOOM: u8 = 14;

// ---------------------------------------------------------------------------
// Upstream documents
// ---------------------------------------------------------------------------

/// `currentState` for a view.
#[derive(Debug, Clone, Deserialize)]
pub struct CurrentState {
    #[serde(rename = "stormcenterDeploymentId", deserialize_with = "string_or_number")]
    pub deployment_id: String,
    pub data: StateData,
    #[serde(default)]
    pub datastatic: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StateData {
    pub interval_generation_data: String,
    pub cluster_interval_generation_data: String,
}

#[derive(Debug, Deserialize)]
struct DeploymentConfig {
    config: DeploymentConfigBody,
}

#[derive(Debug, Deserialize)]
struct DeploymentConfigBody {
    layers: Layers,
}

#[derive(Debug, Deserialize)]
struct Layers {
    data: LayerData,
}

#[derive(Debug, Deserialize)]
struct LayerData {
    interval_generation_data: Vec<LayerEntry>,
}

#[derive(Debug, Deserialize)]
struct LayerEntry {
    #[serde(rename = "type")]
    kind: String,
    id: String,
}

#[derive(Debug, Deserialize)]
struct Summary {
    #[serde(rename = "summaryFileData")]
    summary_file_data: SummaryFileData,
}

#[derive(Debug, Deserialize)]
struct SummaryFileData {
    totals: Vec<SummaryTotals>,
}

#[derive(Debug, Deserialize)]
struct SummaryTotals {
    total_outages: u64,
}

#[derive(Debug, Deserialize)]
struct ServiceAreas {
    file_data: Vec<ServiceAreaEntry>,
}

#[derive(Debug, Deserialize)]
struct ServiceAreaEntry {
    geom: ServiceAreaGeom,
}

#[derive(Debug, Deserialize)]
struct ServiceAreaGeom {
    a: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ClusterTile {
    file_data: Vec<Value>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

fn parse<T: DeserializeOwned>(url: &str, body: Value) -> Result<T, FetchError> {
    serde_json::from_value(body).map_err(|e| shape_err(url, e.to_string()))
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// A stormcenter view reached through some [`JsonSource`].
pub struct Stormcenter<S> {
    source: S,
    base_url: String,
    instance_id: InstanceId,
    view_id: ViewId,
}

impl<S: JsonSource> Stormcenter<S> {
    pub fn new(source: S, base_url: &str, instance_id: InstanceId, view_id: ViewId) -> Self {
        Self {
            source,
            base_url: base_url.trim_end_matches('/').to_string(),
            instance_id,
            view_id,
        }
    }

    fn view_url(&self) -> String {
        format!(
            "{}/stormcenter/api/v1/stormcenters/{}/views/{}",
            self.base_url, self.instance_id, self.view_id
        )
    }

    pub fn get_state(&self) -> Result<CurrentState, FetchError> {
        let url = format!("{}/currentState?preview=false", self.view_url());
        let body = self.source.require_json(&url)?;
        parse(&url, body)
    }

    /// Tile URL template containing `{quadkey}` (and possibly `{qkh}`).
    pub fn cluster_url_template(&self, state: &CurrentState) -> Result<String, FetchError> {
        let url = format!(
            "{}/configuration/{}?preview=false",
            self.view_url(),
            state.deployment_id
        );
        let config: DeploymentConfig = parse(&url, self.source.require_json(&url)?)?;
        let layer = config
            .config
            .layers
            .data
            .interval_generation_data
            .into_iter()
            .find(|layer| layer.kind.starts_with("CLUSTER_LAYER"))
            .ok_or_else(|| shape_err(&url, "no CLUSTER_LAYER in interval_generation_data"))?;

        Ok(format!(
            "{}/{}/public/{}/{{quadkey}}.json",
            self.base_url, state.data.cluster_interval_generation_data, layer.id
        ))
    }

    /// Total outage count the view's summary advertises.
    pub fn expected_outages(&self, state: &CurrentState) -> Result<u64, FetchError> {
        let url = format!(
            "{}/{}/public/summary-1/data.json",
            self.base_url, state.data.interval_generation_data
        );
        let summary: Summary = parse(&url, self.source.require_json(&url)?)?;
        summary
            .summary_file_data
            .totals
            .first()
            .map(|totals| totals.total_outages)
            .ok_or_else(|| shape_err(&url, "summaryFileData.totals is empty"))
    }

    /// Quadkeys of the zoom-7 tiles covering the service area.
    pub fn service_area_quadkeys(&self, state: &CurrentState) -> Result<Vec<String>, FetchError> {
        let state_url = format!("{}/currentState", self.view_url());
        let (regions_key, regions) = state
            .datastatic
            .iter()
            .next()
            .ok_or_else(|| shape_err(&state_url, "datastatic is empty"))?;
        let regions = regions
            .as_str()
            .ok_or_else(|| shape_err(&state_url, "datastatic entry is not a path"))?;

        let url = format!("{}/{}/{}/serviceareas.json", self.base_url, regions, regions_key);
        let areas: ServiceAreas = parse(&url, self.source.require_json(&url)?)?;
        let first = areas
            .file_data
            .first()
            .ok_or_else(|| shape_err(&url, "file_data is empty"))?;

        let mut points = Vec::new();
        for encoded in &first.geom.a {
            points.extend(decode_polyline(encoded)?);
        }
        let bbox = BoundingBox::from_points(&points)
            .ok_or_else(|| shape_err(&url, "service area has no points"))?;
        tracing::debug!(
            "service area bbox west={} south={} east={} north={}",
            bbox.west,
            bbox.south,
            bbox.east,
            bbox.north
        );

        Ok(tiles_covering(&bbox, MIN_ZOOM)
            .iter()
            .map(|tile| tile.quadkey())
            .collect())
    }

    /// Visit each quadkey, zooming into tiles that still hold clusters.
    ///
    /// Every returned outage carries a `source` field naming its tile URL.
    pub fn descend(&self, quadkeys: &[String], template: &str) -> Result<Vec<Value>, FetchError> {
        let mut outages = Vec::new();
        // Depth-first, children visited in digit order.
        let mut stack: Vec<String> = quadkeys.iter().rev().cloned().collect();
        while let Some(quadkey) = stack.pop() {
            let url = render_template(template, &quadkey);
            let Some(body) = self.source.get_json(&url)? else {
                continue;
            };
            let tile: ClusterTile = parse(&url, body)?;

            let has_clusters = tile.file_data.iter().any(is_cluster);
            if !has_clusters || quadkey.len() >= usize::from(MAX_ZOOM) {
                for outage in tile.file_data {
                    outages.push(with_source(outage, &url)?);
                }
            } else {
                tracing::debug!("descending into {quadkey}");
                for digit in ['3', '2', '1', '0'] {
                    stack.push(format!("{quadkey}{digit}"));
                }
            }
        }
        Ok(outages)
    }

    /// Every individually reported outage in the view, raw.
    pub fn scrape(&self) -> Result<Vec<Value>, FetchError> {
        let state = self.get_state()?;
        let template = self.cluster_url_template(&state)?;
        let quadkeys = self.service_area_quadkeys(&state)?;
        tracing::info!(
            "scraping {}/{}: {} root tiles",
            self.instance_id,
            self.view_id,
            quadkeys.len()
        );
        let outages = self.descend(&quadkeys, &template)?;

        match self.expected_outages(&state) {
            Ok(expected) if expected != outages.len() as u64 => tracing::warn!(
                "summary reports {expected} outages but {} were scraped",
                outages.len()
            ),
            Ok(_) => {}
            Err(err) => tracing::warn!("could not read outage summary: {err}"),
        }
        Ok(outages)
    }
}

fn render_template(template: &str, quadkey: &str) -> String {
    template
        .replace("{qkh}", &quadkey_hash(quadkey))
        .replace("{quadkey}", quadkey)
}

fn is_cluster(outage: &Value) -> bool {
    outage
        .pointer("/desc/cluster")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

fn with_source(outage: Value, url: &str) -> Result<Value, FetchError> {
    let Value::Object(mut map) = outage else {
        return Err(shape_err(url, "file_data entry is not an object"));
    };
    map.entry("source")
        .or_insert_with(|| Value::String(url.to_string()));
    Ok(Value::Object(map))
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Scrape a view and return the raw outage list.
pub fn scrape<S: JsonSource>(
    source: S,
    base_url: &str,
    instance_id: &InstanceId,
    view_id: &ViewId,
) -> Result<Vec<Value>, FetchError> {
    Stormcenter::new(source, base_url, instance_id.clone(), view_id.clone()).scrape()
}

/// The fetch stage: scrape a view and convert it to GeoJSON.
pub fn fetch_feature_collection<S: JsonSource>(
    source: S,
    base_url: &str,
    instance_id: &InstanceId,
    view_id: &ViewId,
) -> Result<FeatureCollection, FetchError> {
    let outages = scrape(source, base_url, instance_id, view_id)?;
    to_feature_collection(outages)
}
