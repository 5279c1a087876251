//! # topicsync-sync
//!
//! The topic synchronization engine.
//!
//! [`SyncEngine::run_once`] takes a batch of channel configs and, for each,
//! resolves the current on-call person per schedule ([`OncallResolver`]),
//! composes the on-call segment ([`compose`]), and rewrites the channel topic
//! only when that segment changed ([`TopicWriter`]). The text after the first
//! `|` in a topic is never touched.

pub mod chat;
pub mod compose;
pub mod diff;
pub mod error;
pub mod oncall;
pub mod paging;
pub mod pipeline;
pub mod writer;

pub use chat::{ChatService, Slack};
pub use compose::compose;
pub use diff::unified_topic_diff;
pub use error::SyncError;
pub use oncall::{OncallResolver, OncallResult};
pub use paging::{Assignee, PagerDuty, PagingService, TimeWindow};
pub use pipeline::{ChannelReport, RunSummary, SyncEngine, TopicPreview};
pub use writer::{TopicWriter, UpdateOutcome};
