//! Error types for topicsync-sync.

use std::time::Duration;

use thiserror::Error;

use topicsync_core::ConfigError;

/// All errors that can arise while syncing one channel.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Unusable startup configuration, e.g. a base URL override that does not parse.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The paging service does not know this schedule (HTTP 404).
    #[error("invalid schedule {schedule}")]
    ScheduleNotFound { schedule: String },

    /// The chat service does not know this channel.
    #[error("could not find channel {channel}; ensure the bot is in this channel")]
    ChannelNotFound { channel: String },

    /// The channel exists but cannot be read with the configured credential.
    #[error("cannot access channel {channel}: {reason}")]
    Access { channel: String, reason: String },

    /// The chat service rejected the topic write.
    #[error("failed to update topic for {channel}: {body}")]
    Write { channel: String, body: String },

    /// Network-level failure on an outbound call.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Unexpected non-success status from a read call.
    #[error("{service} returned HTTP {status}: {body}")]
    Http {
        service: &'static str,
        status: u16,
        body: String,
    },

    /// A response body lacked a field the protocol guarantees.
    #[error("malformed {service} response: {detail}")]
    MalformedResponse {
        service: &'static str,
        detail: String,
    },

    /// The channel pipeline did not finish in time.
    #[error("sync for {channel} timed out after {after:?}")]
    Timeout { channel: String, after: Duration },
}

impl SyncError {
    /// Short machine-friendly label used in logs and status payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::Config(_) => "config",
            SyncError::ScheduleNotFound { .. } => "not_found",
            SyncError::ChannelNotFound { .. } => "channel_not_found",
            SyncError::Access { .. } => "access",
            SyncError::Write { .. } => "write",
            SyncError::Transport(_) => "transport",
            SyncError::Http { .. } => "http",
            SyncError::MalformedResponse { .. } => "malformed_response",
            SyncError::Timeout { .. } => "timeout",
        }
    }
}
