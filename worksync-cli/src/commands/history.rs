//! `worksync history <artifact.json>`: iteration table.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use worksync_core::{IterationHistory, IterationId, WorkItemId};

use super::{load_artifact, LOCAL_WORK_ITEM};

const PROMPT_WIDTH: usize = 48;

/// Arguments for `worksync history`.
#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Artifact JSON file.
    pub artifact: PathBuf,

    /// Mark this iteration as selected instead of the tip.
    #[arg(long)]
    pub select: Option<String>,
}

#[derive(Tabled)]
struct IterationRow {
    #[tabled(rename = "")]
    marker: String,
    #[tabled(rename = "id")]
    id: String,
    #[tabled(rename = "from")]
    from: String,
    #[tabled(rename = "provider")]
    provider: String,
    #[tabled(rename = "files")]
    files: usize,
    #[tabled(rename = "prompt")]
    prompt: String,
}

impl HistoryArgs {
    pub fn run(self) -> Result<()> {
        let artifact = load_artifact(&self.artifact)?;
        let artifact_id = artifact.id.clone();
        let mut history = IterationHistory::from_artifact(WorkItemId::from(LOCAL_WORK_ITEM), artifact);

        if let Some(id) = &self.select {
            if !history.select_iteration(&IterationId::from(id.as_str())) {
                bail!("iteration '{id}' not found in artifact '{artifact_id}'");
            }
        }

        if history.iterations().is_empty() {
            println!("Artifact '{artifact_id}' has no iterations.");
            return Ok(());
        }

        let lineage: Vec<IterationId> = history
            .visible_history()
            .into_iter()
            .map(|it| it.id.clone())
            .collect();
        let selected = history.selected_id().cloned();

        let rows: Vec<IterationRow> = history
            .iterations()
            .iter()
            .map(|it| IterationRow {
                marker: if Some(&it.id) == selected.as_ref() {
                    "*".to_string()
                } else if lineage.contains(&it.id) {
                    "|".to_string()
                } else {
                    String::new()
                },
                id: it.id.to_string(),
                from: it
                    .start_from_iteration_id
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "-".to_string()),
                provider: it.provider.clone().unwrap_or_else(|| "-".to_string()),
                files: it.files.len(),
                prompt: truncate(&it.prompt, PROMPT_WIDTH),
            })
            .collect();

        println!(
            "{} {} | {} iterations",
            "artifact".bold(),
            artifact_id,
            rows.len()
        );
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        println!("* selected   | visible lineage");
        Ok(())
    }
}

fn truncate(text: &str, width: usize) -> String {
    let line = text.lines().next().unwrap_or_default();
    if line.chars().count() <= width {
        return line.to_string();
    }
    let mut cut: String = line.chars().take(width.saturating_sub(3)).collect();
    cut.push_str("...");
    cut
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_first_line_within_width() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("first\nsecond", 10), "first");
        assert_eq!(truncate("abcdefghijkl", 8), "abcde...");
    }
}
