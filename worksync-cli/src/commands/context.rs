//! `worksync context <id>`: fetch and print a context record.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use worksync_core::ContextId;
use worksync_sync::{ContextService, HttpContextService};

use super::{load_config, tokio_runtime};

/// Arguments for `worksync context`.
#[derive(Args, Debug)]
pub struct ContextArgs {
    /// Context record id.
    pub id: String,

    /// Emit the raw record as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct FileRow {
    #[tabled(rename = "file")]
    path: String,
    #[tabled(rename = "lines")]
    lines: usize,
    #[tabled(rename = "bytes")]
    bytes: usize,
}

impl ContextArgs {
    pub fn run(self) -> Result<()> {
        let config = load_config()?;
        let service =
            HttpContextService::from_config(&config).context("failed to build HTTP client")?;
        let id = ContextId::from(self.id.as_str());

        let record = tokio_runtime()?
            .block_on(service.get(&id))
            .with_context(|| format!("failed to fetch context '{id}' from {}", config.server_url))?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&record).context("failed to serialize record")?
            );
            return Ok(());
        }

        println!("{} {}", "context".bold(), record.id);
        let rows: Vec<FileRow> = record
            .source_files
            .iter()
            .map(|f| FileRow {
                path: f.path.clone(),
                lines: f.content.lines().count(),
                bytes: f.content.len(),
            })
            .collect();
        if rows.is_empty() {
            println!("No source files selected.");
        } else {
            let mut table = Table::new(rows);
            table.with(Style::rounded());
            println!("{table}");
        }
        println!("rules:  {}", join_or_dash(record.text_block_ids.iter()));
        println!("images: {}", join_or_dash(record.image_ids.iter()));
        Ok(())
    }
}

fn join_or_dash<'a>(ids: impl Iterator<Item = &'a String>) -> String {
    let joined = ids.map(String::as_str).collect::<Vec<_>>().join(", ");
    if joined.is_empty() {
        "-".to_string()
    } else {
        joined
    }
}
