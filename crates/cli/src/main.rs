//! webhound CLI — the main entry point.
//!
//! Commands:
//! - `serve`    — Start the HTTP research-agent server
//! - `onboard`  — Initialize the config file
//! - `doctor`   — Diagnose configuration and provider reachability

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "webhound",
    about = "webhound — asynchronous web research agent server",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Initialize configuration
    Onboard,

    /// Diagnose configuration and provider reachability
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Onboard => commands::onboard::run()?,
        Commands::Doctor => commands::doctor::run().await?,
    }

    Ok(())
}
