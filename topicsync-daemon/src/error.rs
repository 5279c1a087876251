use std::fmt::Display;
use std::path::PathBuf;

use thiserror::Error;

use topicsync_core::StoreError;
use topicsync_sync::SyncError;

/// Failures of the daemon process and of CLI calls into it.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Nothing is listening on the control socket.
    #[error("daemon is not running (no listener on {})", socket.display())]
    NotRunning { socket: PathBuf },

    /// Another daemon already owns the control socket.
    #[error("a daemon is already listening on {}", socket.display())]
    AlreadyRunning { socket: PathBuf },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read channel configs: {0}")]
    Store(#[from] StoreError),

    #[error("failed to build sync engine: {0}")]
    Engine(#[from] SyncError),

    /// A control-socket line could not be encoded or decoded.
    #[error("bad control message: {0}")]
    Json(#[from] serde_json::Error),

    /// A `sync` request named a channel with no config file.
    #[error("no config for channel '{0}'")]
    UnknownChannel(String),

    /// The run queue or its reply channel went away during shutdown.
    #[error("run queue closed ({0})")]
    QueueClosed(&'static str),

    /// The daemon answered with `ok: false`.
    #[error("daemon rejected the request: {0}")]
    Rejected(String),

    /// A background task ended abnormally.
    #[error("{task} task failed: {detail}")]
    Task { task: &'static str, detail: String },

    #[error("control protocol violation: {0}")]
    Protocol(String),
}

impl DaemonError {
    pub(crate) fn io(context: impl Display, source: std::io::Error) -> Self {
        DaemonError::Io {
            context: context.to_string(),
            source,
        }
    }
}
