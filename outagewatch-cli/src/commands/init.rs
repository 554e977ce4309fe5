//! `outagewatch init --instance <id> --view <id> --repo <path> [...]`

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use outagewatch_core::{config, CommitAuthor, InstanceId, ViewId};

/// Write the config for one outage map and its data repository.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Kubra stormcenter instance id.
    #[arg(long)]
    pub instance: String,

    /// Kubra view id.
    #[arg(long)]
    pub view: String,

    /// Working copy of the git repository the artifacts are committed to.
    #[arg(long)]
    pub repo: PathBuf,

    #[arg(long)]
    pub remote: Option<String>,

    #[arg(long)]
    pub branch: Option<String>,

    /// Locale used to pick cause and crew status translations.
    #[arg(long)]
    pub locale: Option<String>,

    /// Minutes between daemon runs.
    #[arg(long)]
    pub interval_minutes: Option<u64>,

    /// Override the Kubra base URL.
    #[arg(long)]
    pub base_url: Option<String>,

    /// Commit author name, used together with --author-email.
    #[arg(long, requires = "author_email")]
    pub author_name: Option<String>,

    #[arg(long, requires = "author_name")]
    pub author_email: Option<String>,

    /// Commit without pushing.
    #[arg(long)]
    pub no_push: bool,

    /// Overwrite an existing config.
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        let home = crate::home()?;
        let repo = self
            .repo
            .canonicalize()
            .with_context(|| format!("cannot resolve path '{}'", self.repo.display()))?;

        let path = config::config_path_at(&home);
        let existed = path.exists();
        let mut cfg = config::init_at(
            &home,
            InstanceId::from(self.instance),
            ViewId::from(self.view),
            repo,
            self.force,
        )
        .context("failed to initialize config")?;

        if existed && !self.force {
            println!("✓ Config already exists at {}", path.display());
            println!("  Pass --force to replace it.");
            return Ok(());
        }

        if let Some(remote) = self.remote {
            cfg.remote = remote;
        }
        if let Some(branch) = self.branch {
            cfg.branch = branch;
        }
        if let Some(locale) = self.locale {
            cfg.locale = locale;
        }
        if let Some(minutes) = self.interval_minutes {
            cfg.interval_minutes = minutes;
        }
        if let Some(base_url) = self.base_url {
            cfg.base_url = base_url;
        }
        if let (Some(name), Some(email)) = (self.author_name, self.author_email) {
            cfg.author = Some(CommitAuthor { name, email });
        }
        cfg.push = !self.no_push;
        cfg.validate().context("invalid config")?;
        config::save_at(&home, &cfg).context("failed to save config")?;

        println!(
            "✓ Watching {}/{} into {}",
            cfg.instance_id,
            cfg.view_id,
            cfg.repo.display()
        );
        println!("  Saved to: {}", path.display());
        Ok(())
    }
}
