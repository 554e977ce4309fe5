//! `outagewatch fetch [--instance <id> --view <id>] [--raw]`: scrape and print.

use anyhow::{Context, Result};
use clap::Args;

use outagewatch_core::{config, config::DEFAULT_BASE_URL, InstanceId, ViewId};
use outagewatch_fetch::{fetch_feature_collection, scrape, UreqSource};
use outagewatch_sync::writer::to_artifact_json;

/// Arguments for `outagewatch fetch`.
#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Instance id; defaults to the configured one.
    #[arg(long, requires = "view")]
    pub instance: Option<String>,

    /// View id; defaults to the configured one.
    #[arg(long, requires = "instance")]
    pub view: Option<String>,

    #[arg(long)]
    pub base_url: Option<String>,

    /// Print the outage list as Kubra serves it instead of GeoJSON.
    #[arg(long)]
    pub raw: bool,
}

struct Target {
    instance_id: InstanceId,
    view_id: ViewId,
    base_url: String,
}

impl FetchArgs {
    pub fn run(self) -> Result<()> {
        let target = self.target()?;
        let source = UreqSource::new();

        let output = if self.raw {
            let outages = scrape(
                &source,
                &target.base_url,
                &target.instance_id,
                &target.view_id,
            )
            .context("scrape failed")?;
            to_artifact_json(&outages)?
        } else {
            let collection = fetch_feature_collection(
                &source,
                &target.base_url,
                &target.instance_id,
                &target.view_id,
            )
            .context("fetch failed")?;
            to_artifact_json(&collection)?
        };
        print!("{output}");
        Ok(())
    }

    fn target(&self) -> Result<Target> {
        if let (Some(instance), Some(view)) = (&self.instance, &self.view) {
            return Ok(Target {
                instance_id: InstanceId::from(instance.as_str()),
                view_id: ViewId::from(view.as_str()),
                base_url: self
                    .base_url
                    .clone()
                    .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            });
        }

        let home = crate::home()?;
        let cfg = config::load_at(&home)
            .context("no --instance/--view given and no config to fall back on")?;
        Ok(Target {
            instance_id: cfg.instance_id,
            view_id: cfg.view_id,
            base_url: self.base_url.clone().unwrap_or(cfg.base_url),
        })
    }
}
