//! `worksync diff <dir> --iteration <artifact.json>`: unified diffs of an
//! iteration against disk.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use worksync_core::preview::{preview_file, preview_iteration};
use worksync_core::LocalFileSystem;

use super::{load_artifact, load_config, pick_iteration};

/// Arguments for `worksync diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Project directory.
    pub dir: PathBuf,

    /// Artifact JSON holding the iteration.
    #[arg(long)]
    pub iteration: PathBuf,

    /// Iteration id inside the artifact (defaults to the last one).
    #[arg(long)]
    pub at: Option<String>,

    /// Restrict output to one file.
    #[arg(long)]
    pub path: Option<String>,
}

impl DiffArgs {
    pub fn run(self) -> Result<()> {
        let config = load_config()?;
        let fs = LocalFileSystem::new(&self.dir, config.ignore.clone());
        let artifact = load_artifact(&self.iteration)?;
        let iteration = pick_iteration(&artifact, self.at.as_deref())?;

        let previews = match &self.path {
            Some(path) => preview_file(&fs, iteration, path)
                .with_context(|| format!("diff failed for '{path}'"))?
                .into_iter()
                .collect::<Vec<_>>(),
            None => preview_iteration(&fs, iteration)
                .with_context(|| format!("diff failed for iteration '{}'", iteration.id))?,
        };

        if previews.is_empty() {
            println!("No differences for iteration '{}'.", iteration.id);
            return Ok(());
        }

        for preview in previews {
            print!("{}", preview.unified_diff);
            if !preview.unified_diff.ends_with('\n') {
                println!();
            }
        }
        Ok(())
    }
}
