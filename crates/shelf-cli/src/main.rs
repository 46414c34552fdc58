//! # Shelf CLI
//!
//! Command-line interface for the Shelf document indexer.
//!
//! ## Commands
//!
//! - `shelf index` - Run the startup pass (bulk index or reconcile)
//! - `shelf query [name]` - Search documents by file name and directory
//! - `shelf tree` - Print the watched root's directory structure
//! - `shelf watch` - Keep the index in step with filesystem changes
//! - `shelf status` - Show index status and statistics
//! - `shelf clear` - Remove the index
//!
//! ## Example Usage
//!
//! ```bash
//! # Index the documents directory
//! shelf index
//!
//! # Find every invoice under a reports folder
//! shelf query invoice --root ~/Documents/reports
//!
//! # List the files directly inside one directory
//! shelf query --root ~/Documents/reports --exact
//! ```

mod app;
mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Shelf - index a document directory and search it by name
#[derive(Parser)]
#[command(name = "shelf")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, env = "SHELF_CONFIG")]
    config: Option<PathBuf>,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Directory to index and watch (overrides the config file)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Directory holding the index files (overrides the config file)
    #[arg(long, global = true)]
    index_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bring the index in line with the watched root
    Index {
        /// Discard the existing index and rebuild from scratch
        #[arg(short, long)]
        force: bool,
    },

    /// Search for documents
    Query {
        /// Substring of the file name to match (case-insensitive)
        name: Option<String>,

        /// Only return documents under this directory
        #[arg(short = 'r', long = "in")]
        within: Option<String>,

        /// Only return documents directly inside the directory
        #[arg(short, long)]
        exact: bool,

        /// Maximum number of results to show
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        output: OutputFormat,
    },

    /// Print the directory tree of the watched root
    Tree {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        output: OutputFormat,
    },

    /// Index, then follow filesystem changes until interrupted
    Watch,

    /// Show index status and statistics
    Status,

    /// Clear the index and all data
    Clear {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Clone, Debug, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = match &cli.config {
        Some(path) => shelf_core::Config::load_from(path)?,
        None => shelf_core::Config::load()?,
    };
    if let Some(root) = cli.root {
        config.general.watched_root = Some(root);
    }
    if let Some(index_dir) = cli.index_dir {
        config.general.index_path = Some(index_dir);
    }

    // Setup logging
    let log_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => config.general.log_level.as_str(),
            1 => "debug",
            _ => "trace",
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)))
        .init();

    // Execute command
    match cli.command {
        Commands::Index { force } => commands::index::run(config, force),
        Commands::Query {
            name,
            within,
            exact,
            limit,
            output,
        } => commands::query::run(
            config,
            name.as_deref().unwrap_or(""),
            within.as_deref().unwrap_or(""),
            exact,
            limit,
            output,
        ),
        Commands::Tree { output } => commands::tree::run(config, output),
        Commands::Watch => commands::watch::run(config),
        Commands::Status => commands::status::run(config),
        Commands::Clear { yes } => commands::clear::run(config, yes),
    }
}
