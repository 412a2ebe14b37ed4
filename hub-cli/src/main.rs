//! Hub: validate, inspect and run capability-hub configurations.
//!
//! # Usage
//!
//! ```text
//! hub validate [--config <path>] [--json]
//! hub providers [--dir <path>] [--json]
//! hub run [--config <path>] [--providers <dir>] [--best-effort]
//! ```
//!
//! `--config` defaults to `$AGENTS_CONFIG_FILE`, then `agents.yaml`.
//! `--dir` / `--providers` default to `~/.hub/providers`.

mod commands;
mod logging;
mod runtime;
mod signals;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{providers::ProvidersArgs, run::RunArgs, validate::ValidateArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "hub",
    version,
    about = "Validate and run multi-process capability hubs",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load and validate a configuration without starting anything.
    Validate(ValidateArgs),

    /// List installed provider packages and their capability types.
    Providers(ProvidersArgs),

    /// Start every capability server and run until interrupted.
    Run(RunArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Validate(args) => args.run(),
        Commands::Providers(args) => args.run(),
        Commands::Run(args) => args.run(),
    }
}
