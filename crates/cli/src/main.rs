//! Planscope CLI
//!
//! Main entry point for the planscope command-line tool.
//! Ingests government-plan PDFs into retrieval-ready chunks.

mod commands;

use clap::{Parser, Subcommand};
use commands::{BatchCommand, ChunkCommand, CleanCommand, IngestCommand};
use planscope_core::{config::AppConfig, logging, AppResult, LogFormat};
use std::path::PathBuf;

/// Planscope - government plan ingestion for retrieval
#[derive(Parser, Debug)]
#[command(name = "planscope")]
#[command(about = "Clean, chunk and index government-plan PDFs", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "PLANSCOPE_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "PLANSCOPE_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Log line format (pretty, json)
    #[arg(long, global = true, env = "PLANSCOPE_LOG_FORMAT")]
    log_format: Option<LogFormat>,

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
    /// Ingest one PDF from a path or URL
    Ingest(IngestCommand),

    /// Ingest PDFs listed in a manifest or found in a directory
    Batch(BatchCommand),

    /// Print the cleaned text of a document
    Clean(CleanCommand),

    /// Print the chunks a document would produce
    Chunk(ChunkCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    let config = AppConfig::load()?.with_overrides(
        cli.workspace,
        cli.config,
        cli.log_level,
        cli.log_format,
        cli.verbose,
        cli.no_color,
    );

    logging::init_logging(config.log_level.as_deref(), config.no_color, config.log_format)?;

    tracing::info!("Planscope CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);

    config.ensure_state_dir()?;

    let command_name = match &cli.command {
        Commands::Ingest(_) => "ingest",
        Commands::Batch(_) => "batch",
        Commands::Clean(_) => "clean",
        Commands::Chunk(_) => "chunk",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Ingest(cmd) => cmd.execute(&config).await,
        Commands::Batch(cmd) => cmd.execute(&config).await,
        Commands::Clean(cmd) => cmd.execute().await,
        Commands::Chunk(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
