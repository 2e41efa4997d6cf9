//! topomirror CLI - inspect a topology through the mirror grapher
//!
//! Loads a topology snapshot into an in-memory store, builds a grapher over
//! it and runs read-only analysis on the resulting mirror.
//!
//! # Usage
//!
//! ```bash
//! # Show counts and verify mirror invariants
//! topomirror --topology topo.json stats --check
//!
//! # Nodes adjacent to a switch
//! topomirror --topology topo.json neighbors sw1
//!
//! # Hop-count paths from a node to everything reachable
//! topomirror --topology topo.json sssp sw1
//!
//! # Cheapest path using the "latency" link property
//! topomirror --topology topo.json path sw1 sw4 --weight latency
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use topomirror_config::{GraphMode, LogFormat, LoggingConfig};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod commands;

/// topomirror - live mirror of a network topology
#[derive(Parser, Debug)]
#[command(name = "topomirror")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOptions,
}

/// Global options available to all commands
#[derive(Args, Debug, Clone)]
struct GlobalOptions {
    /// Topology snapshot (JSON) to load
    #[arg(long, short = 't', global = true, env = "TOPOMIRROR_TOPOLOGY")]
    topology: Option<PathBuf>,

    /// Path to configuration file
    #[arg(long, short = 'c', global = true, env = "TOPOMIRROR_CONFIG")]
    config: Option<PathBuf>,

    /// Grapher mode (live, static)
    #[arg(long, global = true, value_parser = parse_mode)]
    mode: Option<GraphMode>,

    /// Link property to attach as an edge weight (repeatable)
    #[arg(long = "attach", global = true)]
    attach: Vec<String>,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    quiet: bool,
}

/// Parse grapher mode from string
fn parse_mode(s: &str) -> Result<GraphMode, String> {
    s.parse()
        .map_err(|e: topomirror_config::ConfigError| e.to_string())
}

impl GlobalOptions {
    /// Convert global options to config overrides
    pub fn to_config_overrides(&self) -> topomirror_config::ConfigOverrides {
        let log_level = if self.quiet {
            Some("error".to_string())
        } else if self.verbose {
            Some("debug".to_string())
        } else {
            None
        };

        topomirror_config::ConfigOverrides {
            mode: self.mode,
            topology: self.topology.clone(),
            log_level,
            weights: self.attach.clone(),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show mirror statistics
    Stats(commands::stats::StatsArgs),

    /// List nodes adjacent to a node
    Neighbors(commands::analyze::NeighborsArgs),

    /// Hop-count shortest paths from a node
    Sssp(commands::analyze::SsspArgs),

    /// Cheapest path between two nodes
    Path(commands::analyze::PathArgs),

    /// View and manage configuration
    #[command(subcommand)]
    Config(commands::config::ConfigCommand),
}

/// Install the global subscriber; `RUST_LOG` wins over the configured level.
fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.to_ascii_lowercase()));
    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match logging.format {
        LogFormat::Text => {
            tracing::subscriber::set_global_default(builder.with_ansi(true).finish())?
        }
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = commands::load_config(&cli.global)?;
    init_logging(&config.logging)?;

    match cli.command {
        Commands::Stats(args) => commands::stats::execute(args, config, cli.global).await,
        Commands::Neighbors(args) => {
            commands::analyze::execute_neighbors(args, config, cli.global).await
        }
        Commands::Sssp(args) => commands::analyze::execute_sssp(args, config, cli.global).await,
        Commands::Path(args) => commands::analyze::execute_path(args, config, cli.global).await,
        Commands::Config(cmd) => commands::config::execute(cmd, config, cli.global).await,
    }
}
