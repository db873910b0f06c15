//! `worksync generate <artifact.json>`: request a new iteration.
//!
//! The artifact file is the local record of the session: it is read (when
//! present), handed to the generator and written back with the new
//! iteration appended.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use worksync_core::history::HistoryState;
use worksync_core::{Artifact, EditMode, IterationHistory, IterationId, WorkItemId};
use worksync_sync::{Generator, HttpGenerationService};

use super::{load_artifact, load_config, tokio_runtime};

/// Arguments for `worksync generate`.
#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Artifact JSON file; created when missing.
    pub artifact: PathBuf,

    /// Work item the session belongs to.
    #[arg(long)]
    pub work_item: String,

    /// Instruction for the model. Defaults to the edited iteration's prompt
    /// with `--edit`.
    #[arg(long)]
    pub prompt: Option<String>,

    /// Model provider. Defaults to the edited iteration's provider with
    /// `--edit`.
    #[arg(long)]
    pub provider: Option<String>,

    /// Personality ids to attach (repeatable).
    #[arg(long = "personality")]
    pub personalities: Vec<String>,

    /// Fork from this iteration instead of the latest one.
    #[arg(long, conflicts_with_all = ["edit", "new"])]
    pub from: Option<String>,

    /// Re-request this iteration: restarts the session for the root,
    /// forks from its predecessor otherwise.
    #[arg(long, conflicts_with = "new")]
    pub edit: Option<String>,

    /// Start a new session even when the artifact file exists.
    #[arg(long)]
    pub new: bool,
}

impl GenerateArgs {
    pub fn run(self) -> Result<()> {
        let config = load_config()?;
        let work_item = WorkItemId::from(self.work_item.as_str());
        let mut history = if self.artifact.exists() && !self.new {
            IterationHistory::from_artifact(work_item, load_artifact(&self.artifact)?)
        } else {
            IterationHistory::new(work_item)
        };

        let service = HttpGenerationService::from_config(&config)
            .context("failed to build HTTP client")?;
        let generator = Generator::new(Arc::new(service), config.generation_timeout());

        let runtime = tokio_runtime()?;
        let new_id = runtime.block_on(self.generate(&generator, &mut history))?;

        let artifact = history
            .to_artifact()
            .context("generation returned without a session")?;
        write_artifact(&self.artifact, &artifact)?;

        println!(
            "{} iteration {} ({} total) -> {}",
            "created".green(),
            new_id,
            artifact.iterations.len(),
            self.artifact.display()
        );
        Ok(())
    }

    async fn generate(
        &self,
        generator: &Generator,
        history: &mut IterationHistory,
    ) -> Result<IterationId> {
        if let Some(edit) = &self.edit {
            if !history.select_iteration(&IterationId::from(edit.as_str())) {
                bail!("iteration '{edit}' not found in {}", self.artifact.display());
            }
            let draft = history.edit_iteration()?;
            let prompt = self.prompt.clone().unwrap_or(draft.prompt);
            let provider = self
                .provider
                .clone()
                .or(draft.provider)
                .context("no provider recorded on the edited iteration; pass --provider")?;
            let personalities = if self.personalities.is_empty() {
                draft.personality_ids
            } else {
                self.personalities.clone()
            };
            if draft.mode == EditMode::RestartSession {
                println!("editing the root iteration restarts the session");
            }
            let id = generator
                .add_iteration(history, &prompt, &provider, personalities, None)
                .await?;
            return Ok(id);
        }

        let prompt = self.prompt.as_deref().context("--prompt is required")?;
        let provider = self.provider.as_deref().context("--provider is required")?;

        let id = match history.state() {
            HistoryState::NoSession => {
                generator
                    .create_session(history, prompt, provider, self.personalities.clone())
                    .await?
            }
            HistoryState::HasIterations => {
                let from = self.from.as_deref().map(IterationId::from);
                generator
                    .add_iteration(
                        history,
                        prompt,
                        provider,
                        self.personalities.clone(),
                        from.as_ref(),
                    )
                    .await?
            }
        };
        Ok(id)
    }
}

/// Write via a `.tmp` sibling and rename.
fn write_artifact(path: &Path, artifact: &Artifact) -> Result<()> {
    let payload = serde_json::to_string_pretty(artifact).context("failed to serialize artifact")?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, payload).with_context(|| format!("failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("failed to replace {}", path.display()))?;
    Ok(())
}
