//! `topicsync sync` — one run over the configured channels.

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use topicsync_core::ConfigLoadFailure;
use topicsync_daemon::init_tracing;
use topicsync_sync::{ChannelReport, RunSummary, SyncEngine, UpdateOutcome};

use super::{home_dir, load_settings, load_targets, runtime};

/// Arguments for `topicsync sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Only sync this channel.
    #[arg(long, short = 'c')]
    pub channel: Option<String>,

    /// Resolve and decide, but never write topics. Same as setting `DRY_RUN`.
    #[arg(long)]
    pub dry_run: bool,
}

impl SyncArgs {
    pub fn run(self) -> Result<()> {
        init_tracing();
        let home = home_dir()?;
        let settings = load_settings()?.with_dry_run(self.dry_run);

        let listing = load_targets(&home, self.channel.as_deref())?;
        if listing.is_empty() {
            println!("No channels configured. Run `topicsync config add <channel> --schedule <ID>=<Name>` first.");
            return Ok(());
        }

        let engine = SyncEngine::from_settings(&settings).context("failed to build sync engine")?;
        let reports = runtime()?.block_on(engine.run_once(&listing.configs));

        let mut summary = RunSummary::from_reports(&reports);
        summary.failed += listing.failures.len();
        print_reports(&reports, settings.dry_run);
        print_load_failures(&listing.failures);
        println!(
            "{} applied, {} dry-run, {} unchanged, {} failed",
            summary.applied, summary.dry_run, summary.unchanged, summary.failed
        );

        if summary.failed > 0 {
            bail!("{} of {} channel(s) failed to sync", summary.failed, summary.total());
        }
        Ok(())
    }
}

fn print_reports(reports: &[ChannelReport], dry_run: bool) {
    let prefix = if dry_run { "[dry-run] " } else { "" };
    for report in reports {
        match &report.outcome {
            Ok(UpdateOutcome::Applied { topic }) => {
                println!("{prefix}{} {}  {topic}", "✎".green().bold(), report.channel);
            }
            Ok(UpdateOutcome::DryRun { topic }) => {
                println!("{prefix}{} {}  {topic}", "~".yellow().bold(), report.channel);
            }
            Ok(UpdateOutcome::NoChangeNeeded) => {
                println!("{prefix}{} {}  up to date", "·".bright_black(), report.channel);
            }
            Err(err) => {
                println!("{prefix}{} {}  {err}", "✗".red().bold(), report.channel);
            }
        }
    }
}

fn print_load_failures(failures: &[ConfigLoadFailure]) {
    for failure in failures {
        println!("{} {}  {}", "✗".red().bold(), failure.channel, failure.error);
    }
}
