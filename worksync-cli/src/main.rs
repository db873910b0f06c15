//! Worksync: workspace synchronization CLI.
//!
//! # Usage
//!
//! ```text
//! worksync tree <dir> [--iteration <artifact.json>] [--at <id>] [--changed-only] [--json]
//! worksync diff <dir> --iteration <artifact.json> [--at <id>] [--path <p>]
//! worksync history <artifact.json> [--select <id>]
//! worksync generate <artifact.json> --work-item <id> [--prompt <text>] [--provider <p>]
//!                   [--personality <id>...] [--from <id> | --edit <id>] [--new]
//! worksync watch <dir> --context <id> [--select <path>...] [--json-logs]
//! worksync context <id> [--json]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    context::ContextArgs, diff::DiffArgs, generate::GenerateArgs, history::HistoryArgs,
    tree::TreeArgs, watch::WatchArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "worksync",
    version,
    about = "Merge AI-generated iterations with a project tree and keep its context in sync",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the project tree, optionally merged with a generated iteration.
    Tree(TreeArgs),

    /// Show unified diffs between disk and a generated iteration.
    Diff(DiffArgs),

    /// List the iterations stored in an artifact file.
    History(HistoryArgs),

    /// Request a new iteration from the generation service.
    Generate(GenerateArgs),

    /// Watch a project and keep a remote context record in sync.
    Watch(WatchArgs),

    /// Fetch and print a remote context record.
    Context(ContextArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Tree(args) => args.run(),
        Commands::Diff(args) => args.run(),
        Commands::History(args) => args.run(),
        Commands::Generate(args) => args.run(),
        Commands::Watch(args) => args.run(),
        Commands::Context(args) => args.run(),
    }
}
