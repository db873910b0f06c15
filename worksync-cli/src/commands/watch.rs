//! `worksync watch <dir> --context <id>`: live editing session.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use worksync_core::ContextId;
use worksync_daemon::{init_tracing, run_blocking};

use super::load_config;

/// Arguments for `worksync watch`.
#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Project directory to watch.
    pub dir: PathBuf,

    /// Remote context record to keep in sync.
    #[arg(long)]
    pub context: String,

    /// Files or directories to select (project-relative). Replaces the
    /// record's current file selection.
    #[arg(long = "select")]
    pub select: Vec<String>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    pub json_logs: bool,
}

impl WatchArgs {
    pub fn run(self) -> Result<()> {
        init_tracing(self.json_logs);
        let config = load_config()?;
        run_blocking(
            &self.dir,
            ContextId::from(self.context.as_str()),
            self.select,
            config,
        )
        .with_context(|| format!("editing session failed for {}", self.dir.display()))
    }
}
