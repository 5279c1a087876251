//! `topicsync diff` — show the topic changes a sync would make.

use anyhow::{bail, Context, Result};
use clap::Args;

use topicsync_sync::{unified_topic_diff, SyncEngine};

use super::{home_dir, load_settings, load_targets, runtime};

/// Arguments for `topicsync diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Only diff this channel.
    #[arg(long, short = 'c')]
    pub channel: Option<String>,
}

impl DiffArgs {
    pub fn run(self) -> Result<()> {
        let home = home_dir()?;
        let settings = load_settings()?;
        let listing = load_targets(&home, self.channel.as_deref())?;
        if listing.is_empty() {
            println!("No channels configured.");
            return Ok(());
        }
        let engine = SyncEngine::from_settings(&settings).context("failed to build sync engine")?;

        let previews = runtime()?.block_on(async {
            let mut previews = Vec::with_capacity(listing.configs.len());
            for config in &listing.configs {
                previews.push((config.channel.clone(), engine.preview(config).await));
            }
            previews
        });

        let mut failed = listing.failures.len();
        for failure in &listing.failures {
            eprintln!("diff failed for '{}': {}", failure.channel, failure.error);
        }
        for (channel, preview) in previews {
            match preview {
                Ok(preview) => match preview.proposed {
                    None => println!("No differences for '{channel}'."),
                    Some(proposed) => {
                        let diff = unified_topic_diff(&channel.0, &preview.current, &proposed);
                        print!("{diff}");
                        if !diff.ends_with('\n') {
                            println!();
                        }
                    }
                },
                Err(err) => {
                    failed += 1;
                    eprintln!("diff failed for '{channel}': {err}");
                }
            }
        }

        if failed > 0 {
            bail!("{failed} channel(s) could not be previewed");
        }
        Ok(())
    }
}
