//! `worksync tree <dir>`: print the (merged) project tree.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use worksync_core::tree::{count, sort_tree};
use worksync_core::{ChangeType, FileNode, FileSystemProvider, LocalFileSystem, Workspace};

use super::{load_artifact, load_config, pick_iteration};

/// Arguments for `worksync tree`.
#[derive(Args, Debug)]
pub struct TreeArgs {
    /// Project directory.
    pub dir: PathBuf,

    /// Artifact JSON whose iteration is overlaid on the tree.
    #[arg(long)]
    pub iteration: Option<PathBuf>,

    /// Iteration id inside the artifact (defaults to the last one).
    #[arg(long, requires = "iteration")]
    pub at: Option<String>,

    /// Show only changed files and their ancestors.
    #[arg(long)]
    pub changed_only: bool,

    /// Emit the tree as JSON.
    #[arg(long)]
    pub json: bool,
}

impl TreeArgs {
    pub fn run(self) -> Result<()> {
        let config = load_config()?;
        let fs = LocalFileSystem::new(&self.dir, config.ignore.clone());
        let base = fs
            .get_tree()
            .with_context(|| format!("failed to scan {}", self.dir.display()))?;

        let mut workspace = Workspace::new(base);
        if let Some(path) = &self.iteration {
            let artifact = load_artifact(path)?;
            let iteration = pick_iteration(&artifact, self.at.as_deref())?;
            workspace.show_iteration(Some(iteration));
        }
        workspace.set_changed_only(self.changed_only);

        let tree = sort_tree(workspace.visible());
        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&tree).context("failed to serialize tree")?
            );
            return Ok(());
        }

        println!("{}", tree.name.bold());
        for child in tree.children() {
            print_node(child, 1);
        }
        let (files, dirs) = count(&tree);
        println!("{files} files, {dirs} directories");
        Ok(())
    }
}

fn print_node(node: &FileNode, depth: usize) {
    let indent = "  ".repeat(depth);
    if node.is_dir() {
        println!("{indent}{}/", node.name.bold());
        for child in node.children() {
            print_node(child, depth + 1);
        }
        return;
    }
    let line = match node.change_type {
        Some(ChangeType::Added) => format!("{} [added]", node.name).green().to_string(),
        Some(ChangeType::Modified) => format!("{} [modified]", node.name).yellow().to_string(),
        Some(ChangeType::Deleted) => format!("{} [deleted]", node.name).red().to_string(),
        None => node.name.clone(),
    };
    println!("{indent}{line}");
}
