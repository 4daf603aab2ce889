//! Docsnap - local version history for documents.
//!
//! This is the main entry point for the docsnap CLI.

mod commands;
mod config;
mod host;

use clap::{Parser, Subcommand};
use commands::*;
use std::path::PathBuf;
use tracing::debug;

#[derive(Parser)]
#[command(name = "docsnap")]
#[command(author, version, about = "Local version history for documents", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Directory holding snapshot histories
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Additional config file, applied last
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Subcommand
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Save a manual snapshot
    Save {
        /// Document file
        file: PathBuf,
        /// Label for the snapshot
        #[arg(short, long)]
        label: Option<String>,
    },
    /// List snapshots, newest first
    List {
        /// Document file
        file: PathBuf,
        /// List oldest first
        #[arg(long)]
        oldest_first: bool,
        /// Only the most recent few
        #[arg(short, long)]
        quick: bool,
        /// Print output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show snapshot details
    Show {
        /// Document file
        file: PathBuf,
        /// Snapshot ID or unique prefix
        id: String,
        /// Print the stored content
        #[arg(short, long)]
        content: bool,
        /// Print output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Restore a snapshot into the document
    Restore {
        /// Document file
        file: PathBuf,
        /// Snapshot ID or unique prefix
        id: String,
        /// Only rewrite the document after a failed restore
        #[arg(long)]
        retry: bool,
    },
    /// Word diff between two snapshots
    Diff {
        /// Document file
        file: PathBuf,
        /// Older snapshot
        from: String,
        /// Newer snapshot
        to: String,
        /// Print output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a snapshot
    Delete {
        /// Document file
        file: PathBuf,
        /// Snapshot ID or unique prefix
        id: String,
    },
    /// Delete all snapshots of a document
    Clear {
        /// Document file
        file: PathBuf,
        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Apply retention rules now
    Prune {
        /// Document file
        file: PathBuf,
    },
    /// Show storage statistics
    Stats {
        /// Document file
        file: PathBuf,
        /// Print output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Capture automatically until interrupted
    Watch {
        /// Document file
        file: PathBuf,
        /// Override the capture interval
        #[arg(long)]
        interval_ms: Option<u64>,
    },
    /// Show configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cwd = std::env::current_dir()?;

    let settings = Settings::load(&cwd, cli.config.as_deref(), cli.data_dir.clone()).await?;

    let foreground = matches!(cli.command, Commands::Watch { .. });
    if let Some(path) = init_logging(cli.verbose, foreground, settings.log_level()) {
        debug!(path = %path.display(), "Logging to file");
    }

    match cli.command {
        Commands::Save { file, label } => handle_save(&settings, &file, label).await,
        Commands::List {
            file,
            oldest_first,
            quick,
            json,
        } => handle_list(&settings, &file, oldest_first, quick, json).await,
        Commands::Show {
            file,
            id,
            content,
            json,
        } => handle_show(&settings, &file, &id, content, json).await,
        Commands::Restore { file, id, retry } => handle_restore(&settings, &file, &id, retry).await,
        Commands::Diff { file, from, to, json } => {
            handle_diff(&settings, &file, &from, &to, json).await
        }
        Commands::Delete { file, id } => handle_delete(&settings, &file, &id).await,
        Commands::Clear { file, yes } => handle_clear(&settings, &file, yes).await,
        Commands::Prune { file } => handle_prune(&settings, &file).await,
        Commands::Stats { file, json } => handle_stats(&settings, &file, json).await,
        Commands::Watch { file, interval_ms } => handle_watch(&settings, &file, interval_ms).await,
        Commands::Config => show_config(&settings).await,
    }
}
