//! Atlas CLI - Command-line interface for Atlas
//!
//! Imports project relationships into a per-workspace graph store and walks
//! views over them.

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;

#[derive(Parser)]
#[command(name = "atlas")]
#[command(author = "Atlas Contributors")]
#[command(version)]
#[command(about = "Maven-style project relationship graphs", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Graph store location (overrides .atlas/config.json)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Workspace to operate on (overrides .atlas/config.json)
    #[arg(short, long, global = true)]
    workspace: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Options that shape a view.
#[derive(Args, Debug, Clone)]
pub struct ViewArgs {
    /// Root GAVs (group:artifact:version)
    #[arg(required = true, num_args = 1..)]
    pub roots: Vec<String>,

    /// Version selection, as `g:a=g:a:v` or `g:a:v=g:a:v2`
    #[arg(long = "select")]
    pub selections: Vec<String>,

    /// Only follow relationships read from this source
    #[arg(long = "source")]
    pub sources: Vec<String>,

    /// Only follow relationships declared in this POM
    #[arg(long = "pom-location")]
    pub pom_locations: Vec<String>,

    /// Follow dependencies visible from this scope
    #[arg(long)]
    pub scope: Option<String>,

    /// Follow parent relationships only
    #[arg(long, conflicts_with = "scope")]
    pub ancestry: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize Atlas in the current directory
    Init {
        /// Path to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Import relationships from a JSON file
    Import {
        /// JSON array of relationships
        file: PathBuf,

        /// Source the relationships were read from
        #[arg(long)]
        source: Option<String>,

        /// POM that declared the relationships
        #[arg(long)]
        pom_location: Option<String>,
    },

    /// Walk a view from its roots
    Walk {
        #[command(flatten)]
        view: ViewArgs,

        /// Walk towards the projects that declare the roots
        #[arg(long)]
        reverse: bool,

        /// Print traversal statistics
        #[arg(long)]
        stats: bool,

        /// Output as JSON instead of formatted text
        #[arg(long)]
        json: bool,
    },

    /// Print the identity of a view
    ViewId {
        #[command(flatten)]
        view: ViewArgs,
    },

    /// Show stored workspaces and statistics
    Info,

    /// Remove a workspace's graph
    Clear {
        /// Remove every workspace
        #[arg(long)]
        all: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(tracing_subscriber::EnvFilter::new(filter))
        .init();

    let settings = || config::Settings::resolve(cli.store.clone(), cli.workspace.clone());

    let result = match cli.command {
        Commands::Init { path } => commands::init(&path, cli.workspace.as_deref()),
        Commands::Import {
            file,
            source,
            pom_location,
        } => settings().and_then(|s| {
            commands::import(&s, &file, source.as_deref(), pom_location.as_deref())
        }),
        Commands::Walk {
            view,
            reverse,
            stats,
            json,
        } => settings().and_then(|s| commands::walk(&s, &view, reverse, stats, json)),
        Commands::ViewId { view } => settings().and_then(|s| commands::view_id(&s, &view)),
        Commands::Info => settings().and_then(|s| commands::info(&s)),
        Commands::Clear { all } => settings().and_then(|s| commands::clear(&s, all)),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}
