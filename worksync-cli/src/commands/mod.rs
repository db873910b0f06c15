pub mod context;
pub mod diff;
pub mod generate;
pub mod history;
pub mod tree;
pub mod watch;

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};

use worksync_core::{config, Artifact, Config, Iteration, IterationId};

/// Work item id used when an artifact file is inspected offline.
pub const LOCAL_WORK_ITEM: &str = "local";

pub fn load_config() -> Result<Config> {
    config::load().context("failed to load ~/.worksync/config.yaml")
}

pub fn load_artifact(path: &Path) -> Result<Artifact> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read artifact {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse artifact {}", path.display()))
}

/// `at` when given, else the last iteration in the artifact.
pub fn pick_iteration<'a>(artifact: &'a Artifact, at: Option<&str>) -> Result<&'a Iteration> {
    match at {
        Some(id) => {
            let id = IterationId::from(id);
            artifact
                .iterations
                .iter()
                .find(|it| it.id == id)
                .with_context(|| format!("iteration '{id}' not found in artifact '{}'", artifact.id))
        }
        None => match artifact.iterations.last() {
            Some(iteration) => Ok(iteration),
            None => bail!("artifact '{}' has no iterations", artifact.id),
        },
    }
}

pub fn tokio_runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")
}
