//! `topicsync config list|show|add|remove`

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use topicsync_core::{store, ChannelId, ScheduleEntry, ScheduleId, SyncConfig};

/// Manage per-channel schedule configs.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// List every configured channel.
    List(ListArgs),

    /// Print one channel's schedules in topic order.
    Show {
        /// Channel id (e.g. C0123ABCD).
        channel: String,
    },

    /// Append schedules to a channel, creating its config if needed.
    Add(AddArgs),

    /// Remove one schedule from a channel, or the whole channel config.
    Remove(RemoveArgs),
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Channel id (e.g. C0123ABCD).
    pub channel: String,

    /// Schedule to show, as `<SCHEDULE_ID>=<Name>`. Repeat to add several.
    #[arg(long = "schedule", short = 's', required = true, value_parser = parse_schedule)]
    pub schedules: Vec<ScheduleEntry>,
}

#[derive(Args, Debug)]
pub struct RemoveArgs {
    /// Channel id.
    pub channel: String,

    /// Schedule id to remove. Without it the whole channel config is deleted.
    #[arg(long, short = 's')]
    pub schedule: Option<String>,
}

pub fn run(cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::List(args) => list(args),
        ConfigCommand::Show { channel } => show(&ChannelId::from(channel)),
        ConfigCommand::Add(args) => add(args),
        ConfigCommand::Remove(args) => remove(args),
    }
}

fn parse_schedule(raw: &str) -> std::result::Result<ScheduleEntry, String> {
    let (id, name) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected <SCHEDULE_ID>=<Name>, got '{raw}'"))?;
    let (id, name) = (id.trim(), name.trim());
    if id.is_empty() || name.is_empty() {
        return Err(format!("schedule id and name must be non-empty in '{raw}'"));
    }
    Ok(ScheduleEntry::new(id, name))
}

#[derive(Tabled)]
struct ConfigRow {
    #[tabled(rename = "channel")]
    channel: String,
    #[tabled(rename = "schedules")]
    count: usize,
    #[tabled(rename = "topic order")]
    order: String,
}

#[derive(Serialize)]
struct ConfigListJson<'a> {
    channels: &'a [SyncConfig],
    invalid: Vec<InvalidConfigJson>,
}

#[derive(Serialize)]
struct InvalidConfigJson {
    channel: String,
    error: String,
}

fn list(args: ListArgs) -> Result<()> {
    let listing = store::list_configs().context("failed to load channel configs")?;
    let configs = &listing.configs;

    if args.json {
        let invalid = listing
            .failures
            .iter()
            .map(|failure| InvalidConfigJson {
                channel: failure.channel.0.clone(),
                error: failure.error.to_string(),
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&ConfigListJson {
                channels: configs,
                invalid,
            })
            .context("failed to serialize config JSON")?
        );
        return Ok(());
    }

    for failure in &listing.failures {
        eprintln!("warning: skipping config for '{}': {}", failure.channel, failure.error);
    }

    if configs.is_empty() {
        println!("No channels configured.");
        println!("Run: topicsync config add <channel> --schedule <ID>=<Name>");
        return Ok(());
    }

    let rows: Vec<ConfigRow> = configs
        .iter()
        .map(|config| ConfigRow {
            channel: config.channel.0.clone(),
            count: config.schedules.len(),
            order: config
                .schedules
                .iter()
                .map(|entry| format!("{} ({})", entry.name, entry.schedule))
                .collect::<Vec<_>>()
                .join(", "),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    Ok(())
}

fn show(channel: &ChannelId) -> Result<()> {
    let config = store::load_config(channel)
        .with_context(|| format!("failed to load config for '{channel}'"))?;

    println!("Channel: {}", config.channel);
    if config.schedules.is_empty() {
        println!("  (no schedules; the on-call segment will be empty)");
    }
    for (idx, entry) in config.schedules.iter().enumerate() {
        println!("  {}. {}  [{}]", idx + 1, entry.name, entry.schedule);
    }
    Ok(())
}

fn add(args: AddArgs) -> Result<()> {
    let channel = ChannelId::from(args.channel);

    for entry in args.schedules {
        let description = format!("{} as '{}'", entry.schedule, entry.name);
        store::add_schedule(&channel, entry)
            .with_context(|| format!("failed to add schedule {description} to '{channel}'"))?;
        println!("✓ added schedule {description} to '{channel}'");
    }
    Ok(())
}

fn remove(args: RemoveArgs) -> Result<()> {
    let channel = ChannelId::from(args.channel);

    match args.schedule {
        Some(schedule) => {
            let schedule = ScheduleId::from(schedule);
            let config = store::remove_schedule(&channel, &schedule)
                .with_context(|| format!("failed to remove schedule {schedule} from '{channel}'"))?;
            println!(
                "✓ removed schedule {schedule} from '{channel}' ({} left)",
                config.schedules.len()
            );
        }
        None => {
            store::remove_config(&channel)
                .with_context(|| format!("failed to remove config for '{channel}'"))?;
            println!("✓ removed config for '{channel}'");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_argument_splits_on_first_equals() {
        let entry = parse_schedule("PABC123=Primary = EU").expect("parse");
        assert_eq!(entry, ScheduleEntry::new("PABC123", "Primary = EU"));
    }

    #[test]
    fn schedule_argument_requires_both_parts() {
        assert!(parse_schedule("PABC123").is_err());
        assert!(parse_schedule("=Primary").is_err());
        assert!(parse_schedule("PABC123= ").is_err());
    }
}
