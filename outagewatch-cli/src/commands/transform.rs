//! `outagewatch transform <file>`: flatten a GeoJSON file into records.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use outagewatch_core::{FeatureCollection, Snapshot};
use outagewatch_sync::{transform, DEFAULT_LOCALE};

/// Arguments for `outagewatch transform`.
#[derive(Args, Debug)]
pub struct TransformArgs {
    /// GeoJSON feature collection, as written by `outagewatch fetch`.
    pub file: PathBuf,

    #[arg(long, default_value = DEFAULT_LOCALE)]
    pub locale: String,
}

impl TransformArgs {
    pub fn run(self) -> Result<()> {
        let text = std::fs::read_to_string(&self.file)
            .with_context(|| format!("cannot read '{}'", self.file.display()))?;
        let collection: FeatureCollection = serde_json::from_str(&text)
            .with_context(|| format!("'{}' is not a feature collection", self.file.display()))?;

        let records = transform(&collection, &self.locale)
            .with_context(|| format!("transform failed for '{}'", self.file.display()))?;
        let snapshot = Snapshot::from_records(&records).context("failed to serialize records")?;
        print!("{}", snapshot.to_pretty_json()?);
        Ok(())
    }
}
