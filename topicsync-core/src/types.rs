//! Domain types for topicsync channel configs.
//!
//! All types are serializable/deserializable via serde + serde_yaml. The
//! field names of [`ScheduleEntry`] match the persisted records
//! (`schedule`, `name`).

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A chat channel identifier (e.g. a Slack conversation id `C0123ABCD`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub String);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ChannelId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ChannelId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// A paging-service schedule identifier (e.g. PagerDuty `PABC123`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScheduleId(pub String);

impl fmt::Display for ScheduleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ScheduleId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ScheduleId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One schedule shown in a channel topic, under a human-facing name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub schedule: ScheduleId,
    /// Label shown before the on-call name, e.g. `Primary`.
    pub name: String,
}

impl ScheduleEntry {
    pub fn new(schedule: impl Into<ScheduleId>, name: impl Into<String>) -> Self {
        Self {
            schedule: schedule.into(),
            name: name.into(),
        }
    }
}

/// A channel and the ordered schedules whose on-call people it advertises.
///
/// An empty `schedules` list is valid and yields an empty on-call segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    pub channel: ChannelId,
    #[serde(default)]
    pub schedules: Vec<ScheduleEntry>,
}

impl SyncConfig {
    pub fn new(channel: impl Into<ChannelId>, schedules: Vec<ScheduleEntry>) -> Self {
        Self {
            channel: channel.into(),
            schedules,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
