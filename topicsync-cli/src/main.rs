//! topicsync — keep chat channel topics in sync with on-call schedules.
//!
//! # Usage
//!
//! ```text
//! topicsync sync [--channel <id>] [--dry-run]
//! topicsync diff [--channel <id>]
//! topicsync config list [--json]
//! topicsync config show <channel>
//! topicsync config add <channel> --schedule <ID>=<Name> [--schedule ...]
//! topicsync config remove <channel> [--schedule <ID>]
//! topicsync daemon start [--interval <secs>] [--dry-run] | stop | status | sync
//! ```
//!
//! Credentials come from `PAGERDUTY_API_KEY` and `SLACK_API_KEY`; setting
//! `DRY_RUN` (to any value) disables topic writes.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{config::ConfigCommand, daemon::DaemonCommand, diff::DiffArgs, sync::SyncArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "topicsync",
    version,
    about = "Show who is on call in chat channel topics",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve on-call people and update every configured channel topic once.
    Sync(SyncArgs),

    /// Show a unified diff of the topic changes a sync would make.
    Diff(DiffArgs),

    /// Manage per-channel schedule configs.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Run or control the background sync daemon.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Sync(args) => args.run(),
        Commands::Diff(args) => args.run(),
        Commands::Config { command } => commands::config::run(command),
        Commands::Daemon { command } => commands::daemon::run(command),
    }
}
