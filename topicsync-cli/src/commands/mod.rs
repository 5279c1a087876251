pub mod config;
pub mod daemon;
pub mod diff;
pub mod sync;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use topicsync_core::{store, ConfigListing, Settings};

pub(crate) fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().context("could not determine home directory")
}

pub(crate) fn load_settings() -> Result<Settings> {
    Settings::from_env().context("invalid topicsync environment")
}

/// Configs to run over: every stored channel, or just `channel`.
///
/// Files that fail to load come back in `failures` so callers can report
/// them per channel and still run the rest.
pub(crate) fn load_targets(home: &Path, channel: Option<&str>) -> Result<ConfigListing> {
    let mut listing = store::list_configs_at(home).context("failed to load channel configs")?;
    if let Some(channel) = channel {
        if !listing.retain_channel(channel) {
            bail!("no config for channel '{channel}'; add one with `topicsync config add`");
        }
    }
    Ok(listing)
}

pub(crate) fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")
}
