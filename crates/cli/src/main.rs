//! Advisor CLI
//!
//! Diagnostic front end over the retrieval core: inspect the catalog,
//! see how a query would be routed, and run searches against a local
//! document set.

mod commands;

use advisor_core::{config::AppConfig, logging, AppResult};
use clap::{Parser, Subcommand};
use commands::{CollectionsCommand, HealthCommand, RouteCommand, SearchCommand};
use std::path::PathBuf;

/// Advisor CLI - multi-collection retrieval diagnostics
#[derive(Parser, Debug)]
#[command(name = "advisor")]
#[command(about = "Multi-collection retrieval diagnostics", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "ADVISOR_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "ADVISOR_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List catalog collections in priority order
    Collections(CollectionsCommand),

    /// Show how a query would be routed
    Route(RouteCommand),

    /// Search a local document set
    Search(SearchCommand),

    /// Probe one collection
    Health(HealthCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse();

    let config = AppConfig::load()?.with_overrides(
        cli.workspace,
        cli.config,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    logging::init_logging(config.log_level.as_deref(), config.no_color)?;

    tracing::info!("Advisor CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);

    let command_name = match &cli.command {
        Commands::Collections(_) => "collections",
        Commands::Route(_) => "route",
        Commands::Search(_) => "search",
        Commands::Health(_) => "health",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Collections(cmd) => cmd.execute(&config).await,
        Commands::Route(cmd) => cmd.execute(&config).await,
        Commands::Search(cmd) => cmd.execute(&config).await,
        Commands::Health(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
