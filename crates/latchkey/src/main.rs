//! Latchkey CLI - OAuth 1.0a client.
//!
//! Provides commands for:
//! - `connect`: Run the three-legged handshake for a configured service
//! - `request`: Send a signed API request with an access credential
//! - `sign`: Print a signed request without sending it

mod commands;
mod error;
mod output;
mod service;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{ConnectArgs, RequestArgs, SignArgs};
use latchkey_config::Config;
use output::Output;

/// Latchkey - OAuth 1.0a client.
#[derive(Parser)]
#[command(name = "latchkey", version, about)]
struct Cli {
    /// Path to configuration file (default: auto-discover latchkey.toml).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect an account: obtain an access token interactively.
    Connect(ConnectArgs),
    /// Send a signed request using an access token.
    Request(RequestArgs),
    /// Print a signed request without sending it.
    Sign(SignArgs),
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    // --verbose enables INFO level, otherwise use RUST_LOG or default to WARN
    let filter = if cli.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = Config::load(cli.config.as_deref())
        .map_err(error::CliError::from)
        .and_then(|config| match cli.command {
            Commands::Connect(args) => args.execute(&config),
            Commands::Request(args) => args.execute(&config),
            Commands::Sign(args) => args.execute(&config),
        });

    if let Err(err) = result {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}
