//! CLI parser and dispatch.

mod analyze;
mod init;
mod jobs;
mod scrape;
mod source;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::Settings;

#[derive(Parser)]
#[command(name = "cardharvest")]
#[command(about = "Scrape card catalogs, mirror their images, and keep the catalog current")]
#[command(version)]
pub struct Cli {
    /// Config file path (defaults to ./cardharvest.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database and seed sources from the config file
    Init,

    /// Scrape sources (all active sources when no IDs are given)
    Scrape {
        /// Source IDs to scrape
        source_ids: Vec<String>,
    },

    /// Manage scrape sources
    Source {
        #[command(subcommand)]
        command: SourceCommands,
    },

    /// Show recent scrape jobs
    Jobs {
        /// Only show jobs for this source
        #[arg(short, long)]
        source: Option<String>,
        /// Number of jobs to show
        #[arg(short, long, default_value = "20")]
        limit: i64,
    },

    /// Ask the model whether a page lists cards and which selectors fit
    Analyze {
        /// Page URL
        url: String,
    },
}

/// Extraction strategy for a new source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Llm,
    Selector,
    Api,
}

#[derive(Subcommand)]
enum SourceCommands {
    /// List configured sources
    List,

    /// Add or replace a source
    Add {
        /// Unique source ID
        id: String,
        /// Page to scrape
        url: String,
        /// Display name (defaults to the ID)
        #[arg(short, long)]
        name: Option<String>,
        /// Extraction strategy
        #[arg(short, long, value_enum, default_value = "llm")]
        kind: KindArg,
        /// Group the cards belong to
        #[arg(short, long)]
        group: Option<String>,
        /// Card category
        #[arg(long)]
        category: Option<String>,
        /// Extraction instruction for llm sources
        #[arg(short, long)]
        prompt: Option<String>,
        /// Add the source disabled
        #[arg(long)]
        inactive: bool,
    },

    /// Enable a source
    Enable {
        /// Source ID
        id: String,
    },

    /// Disable a source
    Disable {
        /// Source ID
        id: String,
    },
}

/// Parse arguments, load configuration, and run the selected command.
pub async fn run() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Init => init::cmd_init(&settings).await,
        Commands::Scrape { source_ids } => scrape::cmd_scrape(&settings, &source_ids).await,
        Commands::Source { command } => match command {
            SourceCommands::List => source::cmd_source_list(&settings).await,
            SourceCommands::Add {
                id,
                url,
                name,
                kind,
                group,
                category,
                prompt,
                inactive,
            } => {
                let new_source = source::NewSourceArgs {
                    id,
                    url,
                    name,
                    kind,
                    group,
                    category,
                    prompt,
                    active: !inactive,
                };
                source::cmd_source_add(&settings, new_source).await
            }
            SourceCommands::Enable { id } => {
                source::cmd_source_set_active(&settings, &id, true).await
            }
            SourceCommands::Disable { id } => {
                source::cmd_source_set_active(&settings, &id, false).await
            }
        },
        Commands::Jobs { source, limit } => {
            jobs::cmd_jobs(&settings, source.as_deref(), limit).await
        }
        Commands::Analyze { url } => analyze::cmd_analyze(&settings, &url).await,
    }
}
