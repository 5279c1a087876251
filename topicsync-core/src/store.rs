//! Per-channel YAML config store.
//!
//! # Storage layout
//!
//! ```text
//! ~/.topicsync/
//!   channels/
//!     <channel>.yaml   (one file per channel — mode 0600)
//! ```
//!
//! # API pattern
//!
//! Every function has two forms:
//! - `fn_at(home: &Path, …)` — explicit home; used in tests with `TempDir`
//! - `fn(…)` — derives home from `dirs::home_dir()`, delegates to `_at`
//!
//! Tests must NEVER call the no-arg wrappers; always use `_at`.

use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::types::{ChannelId, ScheduleEntry, ScheduleId, SyncConfig};

// ---------------------------------------------------------------------------
// 1. Path helpers
// ---------------------------------------------------------------------------

/// `<home>/.topicsync/`
pub fn root_at(home: &Path) -> PathBuf {
    home.join(".topicsync")
}

/// `<home>/.topicsync/channels/`
pub fn channels_dir_at(home: &Path) -> PathBuf {
    root_at(home).join("channels")
}

/// `<home>/.topicsync/channels/<channel>.yaml`. Pure, no I/O.
pub fn config_path_at(home: &Path, channel: &ChannelId) -> PathBuf {
    channels_dir_at(home).join(format!("{}.yaml", channel.0))
}

/// Reject channel ids that cannot be used verbatim as a file stem.
pub fn validate_channel(channel: &ChannelId) -> Result<(), StoreError> {
    let ok = !channel.0.is_empty()
        && channel
            .0
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(StoreError::InvalidChannel(channel.0.clone()))
    }
}

// ---------------------------------------------------------------------------
// 2. Load
// ---------------------------------------------------------------------------

/// Load the config for a single channel.
///
/// Returns `StoreError::ConfigNotFound` if absent,
/// `StoreError::Parse` (with path + line context) if malformed YAML and
/// `StoreError::ChannelMismatch` if the file declares another channel.
pub fn load_config_at(home: &Path, channel: &ChannelId) -> Result<SyncConfig, StoreError> {
    validate_channel(channel)?;
    let path = config_path_at(home, channel);
    if !path.exists() {
        return Err(StoreError::ConfigNotFound { path });
    }
    read_config(&path, channel)
}

/// `load_config_at` convenience wrapper.
pub fn load_config(channel: &ChannelId) -> Result<SyncConfig, StoreError> {
    load_config_at(&home()?, channel)
}

/// A channel config file that could not be loaded during a listing.
#[derive(Debug)]
pub struct ConfigLoadFailure {
    /// Taken from the file name.
    pub channel: ChannelId,
    pub error: StoreError,
}

/// Everything found under `channels/`: the readable configs and the files
/// that failed, both sorted by file name.
#[derive(Debug, Default)]
pub struct ConfigListing {
    pub configs: Vec<SyncConfig>,
    pub failures: Vec<ConfigLoadFailure>,
}

impl ConfigListing {
    pub fn is_empty(&self) -> bool {
        self.configs.is_empty() && self.failures.is_empty()
    }

    /// Keep only entries for `channel`. Returns `false` when nothing matched.
    pub fn retain_channel(&mut self, channel: &str) -> bool {
        self.configs.retain(|config| config.channel.0 == channel);
        self.failures.retain(|failure| failure.channel.0 == channel);
        !self.is_empty()
    }
}

/// Read every `<home>/.topicsync/channels/*.yaml`, sorted by file name so
/// that runs are deterministic.
///
/// A bad file only affects its own channel: it is reported in
/// [`ConfigListing::failures`] and the other configs still load. The call
/// itself fails only when the directory cannot be read.
pub fn list_configs_at(home: &Path) -> Result<ConfigListing, StoreError> {
    let dir = channels_dir_at(home);
    if !dir.exists() {
        return Ok(ConfigListing::default());
    }

    let mut paths: Vec<PathBuf> = std::fs::read_dir(&dir)?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "yaml"))
        .collect();
    paths.sort();

    let mut listing = ConfigListing::default();
    for path in paths {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let channel = ChannelId::from(stem);
        let loaded = validate_channel(&channel).and_then(|()| read_config(&path, &channel));
        match loaded {
            Ok(config) => listing.configs.push(config),
            Err(error) => listing.failures.push(ConfigLoadFailure { channel, error }),
        }
    }
    Ok(listing)
}

/// `list_configs_at` convenience wrapper.
pub fn list_configs() -> Result<ConfigListing, StoreError> {
    list_configs_at(&home()?)
}

fn read_config(path: &Path, expected: &ChannelId) -> Result<SyncConfig, StoreError> {
    let contents = std::fs::read_to_string(path)?;
    let config: SyncConfig =
        serde_yaml::from_str(&contents).map_err(|source| StoreError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    if &config.channel != expected {
        return Err(StoreError::ChannelMismatch {
            path: path.to_path_buf(),
            expected: expected.0.clone(),
            found: config.channel.0,
        });
    }
    Ok(config)
}

// ---------------------------------------------------------------------------
// 3. Save (atomic)
// ---------------------------------------------------------------------------

/// Atomically save a channel config.
///
/// Write flow: serialize → `.yaml.tmp` sibling → `chmod 0600` → `rename`.
pub fn save_config_at(home: &Path, config: &SyncConfig) -> Result<(), StoreError> {
    validate_channel(&config.channel)?;
    ensure_channels_dir(home)?;
    let path = config_path_at(home, &config.channel);
    let tmp_path = path.with_file_name(format!("{}.yaml.tmp", config.channel.0));

    let yaml = serde_yaml::to_string(config)?;
    std::fs::write(&tmp_path, yaml)?;
    set_file_permissions(&tmp_path)?;
    if let Err(e) = std::fs::rename(&tmp_path, &path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e.into());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// 4. Edit
// ---------------------------------------------------------------------------

/// Append a schedule to a channel, creating the channel config if needed.
///
/// Schedule order is preserved; it is the order shown in the topic.
pub fn add_schedule_at(
    home: &Path,
    channel: &ChannelId,
    entry: ScheduleEntry,
) -> Result<SyncConfig, StoreError> {
    let mut config = match load_config_at(home, channel) {
        Ok(config) => config,
        Err(StoreError::ConfigNotFound { .. }) => SyncConfig::new(channel.clone(), vec![]),
        Err(err) => return Err(err),
    };

    if config.schedules.iter().any(|s| s.schedule == entry.schedule) {
        return Err(StoreError::DuplicateSchedule {
            channel: channel.0.clone(),
            schedule: entry.schedule.0,
        });
    }

    config.schedules.push(entry);
    save_config_at(home, &config)?;
    Ok(config)
}

/// `add_schedule_at` convenience wrapper.
pub fn add_schedule(channel: &ChannelId, entry: ScheduleEntry) -> Result<SyncConfig, StoreError> {
    add_schedule_at(&home()?, channel, entry)
}

/// Remove one schedule from a channel; the channel config stays, possibly empty.
pub fn remove_schedule_at(
    home: &Path,
    channel: &ChannelId,
    schedule: &ScheduleId,
) -> Result<SyncConfig, StoreError> {
    let mut config = load_config_at(home, channel)?;
    let before = config.schedules.len();
    config.schedules.retain(|s| &s.schedule != schedule);
    if config.schedules.len() == before {
        return Err(StoreError::ScheduleNotFound {
            channel: channel.0.clone(),
            schedule: schedule.0.clone(),
        });
    }
    save_config_at(home, &config)?;
    Ok(config)
}

/// `remove_schedule_at` convenience wrapper.
pub fn remove_schedule(channel: &ChannelId, schedule: &ScheduleId) -> Result<SyncConfig, StoreError> {
    remove_schedule_at(&home()?, channel, schedule)
}

/// Delete a channel config entirely.
pub fn remove_config_at(home: &Path, channel: &ChannelId) -> Result<(), StoreError> {
    validate_channel(channel)?;
    let path = config_path_at(home, channel);
    if !path.exists() {
        return Err(StoreError::ConfigNotFound { path });
    }
    std::fs::remove_file(&path)?;
    Ok(())
}

/// `remove_config_at` convenience wrapper.
pub fn remove_config(channel: &ChannelId) -> Result<(), StoreError> {
    remove_config_at(&home()?, channel)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn home() -> Result<PathBuf, StoreError> {
    dirs::home_dir().ok_or(StoreError::HomeNotFound)
}

fn ensure_channels_dir(home: &Path) -> Result<(), StoreError> {
    let dir = channels_dir_at(home);
    if !dir.exists() {
        std::fs::create_dir_all(&dir)?;
        set_dir_permissions(&root_at(home))?;
        set_dir_permissions(&dir)?;
    }
    Ok(())
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
