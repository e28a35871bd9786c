//! Glazing - streaming chat server for website widgets
//!
//! Main entry point for the Glazing CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{config, serve};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Glazing - streaming chat server for website widgets
#[derive(Parser)]
#[command(name = "glazing")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file (replaces discovered config files)
    #[arg(long, global = true, env = "GLAZING_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the chat server
    Serve(serve::ServeArgs),

    /// Show the effective configuration
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing: console (human-readable) + rotating JSON file
    let filter = if cli.verbose {
        "glazing=debug,glazing_llm=debug,glazing_server=debug,glazing_config=debug,tower_http=debug,info"
    } else {
        "glazing=info,glazing_llm=info,glazing_server=info,warn"
    };
    let console_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

    let log_dir = glazing_config::xdg_config_dir()
        .map(|d| d.join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"));
    let file_appender = tracing_appender::rolling::daily(&log_dir, "glazing.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_filter(console_filter),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "glazing=trace,glazing_llm=trace,glazing_server=trace,glazing_config=trace,info",
                )),
        )
        .init();

    // Create context for commands
    let ctx = commands::Context {
        config_path: cli.config,
        verbose: cli.verbose,
    };

    // Dispatch to command handlers
    match cli.command {
        Commands::Serve(args) => serve::run(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx).await,
    }
}
