//! `topicsync daemon` — background sync lifecycle.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use serde::Serialize;

use topicsync_daemon::{
    start_blocking, ChannelStatus, DaemonClient, DaemonError, DaemonOptions, RunRecord,
};

use super::{home_dir, load_settings};

#[derive(Subcommand, Debug)]
pub enum DaemonCommand {
    /// Run the daemon in the foreground (interval trigger + socket server).
    Start(StartArgs),
    /// Request graceful daemon shutdown over the Unix socket.
    Stop,
    /// Query daemon runtime status and the last run over the Unix socket.
    Status,
    /// Ask the running daemon to sync now and wait for the result.
    Sync(DaemonSyncArgs),
}

#[derive(Args, Debug)]
pub struct StartArgs {
    /// Seconds between scheduled runs.
    #[arg(long, default_value_t = 60, value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: u64,

    /// Never write topics. Same as setting `DRY_RUN`.
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args, Debug)]
pub struct DaemonSyncArgs {
    /// Only sync this channel.
    #[arg(long, short = 'c')]
    pub channel: Option<String>,

    /// Print the run record as JSON instead of one line per channel.
    #[arg(long)]
    pub json: bool,
}

/// `daemon status` output when nothing is listening.
#[derive(Serialize)]
struct NotRunning<'a> {
    running: bool,
    socket: &'a std::path::Path,
}

pub fn run(command: DaemonCommand) -> Result<()> {
    let home = home_dir()?;

    match command {
        DaemonCommand::Start(args) => {
            let settings = load_settings()?.with_dry_run(args.dry_run);
            let options = DaemonOptions {
                interval: Duration::from_secs(args.interval),
            };
            start_blocking(&home, &settings, options).context("daemon exited with error")?;
        }
        DaemonCommand::Stop => match DaemonClient::for_home(&home).stop() {
            Ok(()) => println!("daemon stop requested"),
            Err(DaemonError::NotRunning { .. }) => println!("daemon is not running"),
            Err(err) => return Err(err).context("failed to stop daemon"),
        },
        DaemonCommand::Status => {
            let client = DaemonClient::for_home(&home);
            match client.status() {
                Ok(status) => print_json(&status)?,
                Err(DaemonError::NotRunning { socket }) => print_json(&NotRunning {
                    running: false,
                    socket: &socket,
                })?,
                Err(err) => return Err(err).context("failed to query daemon status"),
            }
        }
        DaemonCommand::Sync(args) => {
            let record = DaemonClient::for_home(&home)
                .sync(args.channel)
                .context("daemon sync failed")?;
            if args.json {
                print_json(&record)?;
            } else {
                print_record(&record);
            }

            let failed = record.failed_channels().count();
            if failed > 0 {
                bail!(
                    "{failed} of {} channel(s) failed in the daemon run",
                    record.channels.len()
                );
            }
        }
    }

    Ok(())
}

fn print_record(record: &RunRecord) {
    let prefix = if record.dry_run { "[dry-run] " } else { "" };
    for status in &record.channels {
        println!("{prefix}{} {}  {}", status_mark(status), status.channel, status.detail);
    }
    let summary = &record.summary;
    println!(
        "{} applied, {} dry-run, {} unchanged, {} failed ({} ms)",
        summary.applied, summary.dry_run, summary.unchanged, summary.failed, record.duration_ms
    );
}

fn status_mark(status: &ChannelStatus) -> colored::ColoredString {
    match status.status.as_str() {
        "applied" => "✎".green().bold(),
        "dry_run" => "~".yellow().bold(),
        "unchanged" => "·".bright_black(),
        _ => "✗".red().bold(),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("failed to render daemon JSON")?
    );
    Ok(())
}
