//! Error types for topicsync-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from config store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying I/O failure (permission denied, disk full, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization error (save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load, with the file path and serde_yaml line context.
    #[error("failed to parse channel config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// No config file exists for the requested channel.
    #[error("channel config not found at {path}")]
    ConfigNotFound { path: PathBuf },

    /// The schedule is already listed for this channel.
    #[error("schedule '{schedule}' is already configured for channel '{channel}'")]
    DuplicateSchedule { channel: String, schedule: String },

    /// The schedule is not listed for this channel.
    #[error("schedule '{schedule}' is not configured for channel '{channel}'")]
    ScheduleNotFound { channel: String, schedule: String },

    /// Channel ids double as file stems and must be plain identifiers.
    #[error("invalid channel id '{0}': expected letters, digits, '-' or '_'")]
    InvalidChannel(String),

    /// The `channel:` field inside a config file disagrees with its file name.
    #[error("channel config at {path} declares channel '{found}', expected '{expected}'")]
    ChannelMismatch {
        path: PathBuf,
        expected: String,
        found: String,
    },
}

/// Startup configuration problems. Fatal for the whole run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{var} is not set")]
    MissingCredential { var: &'static str },

    #[error("{var} has invalid value '{value}'")]
    InvalidValue { var: &'static str, value: String },
}
