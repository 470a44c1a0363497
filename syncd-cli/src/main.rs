//! Sync Daemon: polls configured sources and runs after-sync commands.
//!
//! # Usage
//!
//! ```text
//! sync-daemon [--config <path>] [--config-auto-reload <bool>] [--log-level <level>]
//! sync-daemon check [--config <path>] [--json]
//! ```

mod commands;

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{check::CheckArgs, run::RunArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "sync-daemon",
    version,
    about = "Poll sync sources on a schedule and run after-sync commands",
    long_about = None,
    args_conflicts_with_subcommands = true,
)]
struct Cli {
    #[command(flatten)]
    run: RunArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate a configuration file and print its sources and rules.
    Check(CheckArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = Cli::parse();
    match dispatch(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Sync Daemon error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Some(Commands::Check(args)) => args.run(),
        None => cli.run.run(),
    }
}
