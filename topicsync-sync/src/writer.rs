//! Topic update decision and apply.
//!
//! ## `sync_topic` — protocol
//!
//! 1. Read the channel's current topic (never cached).
//! 2. Substitute [`EMPTY_TOPIC_PLACEHOLDER`] for an empty topic.
//! 3. Split at the first [`SEPARATOR`]: before is the previous on-call
//!    segment (right-trimmed), after is the suffix to keep (left-trimmed).
//! 4. Previous segment == desired segment → [`UpdateOutcome::NoChangeNeeded`].
//! 5. Otherwise the new topic is `desired + " | " + suffix`.
//! 6. Dry-run → log and return [`UpdateOutcome::DryRun`].
//! 7. Write → [`UpdateOutcome::Applied`].
//!
//! A topic without any separator is treated as entirely free-form suffix:
//! it is kept after the new segment unless it already equals the desired
//! segment exactly.

use std::sync::Arc;

use topicsync_core::ChannelId;

use crate::chat::ChatService;
use crate::error::SyncError;

/// Separates the on-call segment from the human-authored suffix.
pub const SEPARATOR: char = '|';

/// Stand-in for an empty topic so the first write still has a suffix.
pub const EMPTY_TOPIC_PLACEHOLDER: &str = ".";

// ---------------------------------------------------------------------------
// Decision
// ---------------------------------------------------------------------------

/// A topic split into its managed and unmanaged parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitTopic<'a> {
    /// Text before the first separator, right-trimmed. `None` when the topic
    /// has no separator.
    pub segment: Option<&'a str>,
    /// Text after the first separator, left-trimmed; the whole topic when
    /// there is no separator.
    pub suffix: &'a str,
}

/// Split `topic` at the first [`SEPARATOR`].
pub fn split_topic(topic: &str) -> SplitTopic<'_> {
    match topic.find(SEPARATOR) {
        Some(idx) => SplitTopic {
            segment: Some(topic[..idx].trim_end()),
            suffix: topic[idx + SEPARATOR.len_utf8()..].trim_start(),
        },
        None => SplitTopic {
            segment: None,
            suffix: topic.trim_start(),
        },
    }
}

/// What a sync would do to a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicPlan {
    Unchanged,
    Replace { topic: String },
}

/// Decide whether `current` must change to carry `desired`.
pub fn plan_update(current: &str, desired: &str) -> TopicPlan {
    let current = if current.is_empty() {
        EMPTY_TOPIC_PLACEHOLDER
    } else {
        current
    };

    let split = split_topic(current);
    let unchanged = match split.segment {
        Some(previous) => previous == desired,
        None => current == desired,
    };
    if unchanged {
        return TopicPlan::Unchanged;
    }

    TopicPlan::Replace {
        topic: format!("{desired} {SEPARATOR} {}", split.suffix),
    }
}

// ---------------------------------------------------------------------------
// Apply
// ---------------------------------------------------------------------------

/// Outcome of syncing one channel topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The on-call segment already matched; nothing was written.
    NoChangeNeeded,
    /// The topic was rewritten.
    Applied { topic: String },
    /// Dry-run mode: the topic *would* have been rewritten.
    DryRun { topic: String },
}

impl UpdateOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            UpdateOutcome::NoChangeNeeded => "unchanged",
            UpdateOutcome::Applied { .. } => "applied",
            UpdateOutcome::DryRun { .. } => "dry_run",
        }
    }

    /// The topic written (or that would have been written).
    pub fn topic(&self) -> Option<&str> {
        match self {
            UpdateOutcome::NoChangeNeeded => None,
            UpdateOutcome::Applied { topic } | UpdateOutcome::DryRun { topic } => Some(topic),
        }
    }
}

/// Reads, compares and rewrites channel topics through a [`ChatService`].
#[derive(Clone)]
pub struct TopicWriter {
    chat: Arc<dyn ChatService>,
    dry_run: bool,
}

impl TopicWriter {
    pub fn new(chat: Arc<dyn ChatService>, dry_run: bool) -> Self {
        Self { chat, dry_run }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Read the current topic and decide, without writing.
    pub async fn plan(
        &self,
        channel: &ChannelId,
        desired: &str,
    ) -> Result<(String, TopicPlan), SyncError> {
        let current = self.chat.read_topic(channel).await?;
        let plan = plan_update(&current, desired);
        Ok((current, plan))
    }

    /// Bring the on-call segment of `channel` to `desired`, keeping its suffix.
    pub async fn sync_topic(
        &self,
        channel: &ChannelId,
        desired: &str,
    ) -> Result<UpdateOutcome, SyncError> {
        let (_, plan) = self.plan(channel, desired).await?;
        let topic = match plan {
            TopicPlan::Unchanged => {
                tracing::debug!(channel = %channel, "no topic update required");
                return Ok(UpdateOutcome::NoChangeNeeded);
            }
            TopicPlan::Replace { topic } => topic,
        };

        if self.dry_run {
            tracing::info!(channel = %channel, topic = %topic, "[dry-run] would update topic");
            return Ok(UpdateOutcome::DryRun { topic });
        }

        self.chat.set_topic(channel, &topic).await?;
        tracing::info!(channel = %channel, topic = %topic, "updated topic");
        Ok(UpdateOutcome::Applied { topic })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rstest::rstest;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingChat {
        topic: Mutex<String>,
        writes: Mutex<Vec<String>>,
    }

    impl RecordingChat {
        fn with_topic(topic: &str) -> Arc<Self> {
            Arc::new(Self {
                topic: Mutex::new(topic.to_string()),
                writes: Mutex::default(),
            })
        }

        fn writes(&self) -> Vec<String> {
            self.writes.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatService for RecordingChat {
        async fn read_topic(&self, _channel: &ChannelId) -> Result<String, SyncError> {
            Ok(self.topic.lock().unwrap().clone())
        }

        async fn set_topic(&self, _channel: &ChannelId, topic: &str) -> Result<(), SyncError> {
            *self.topic.lock().unwrap() = topic.to_string();
            self.writes.lock().unwrap().push(topic.to_string());
            Ok(())
        }
    }

    #[rstest]
    #[case("Primary: Alice | Ask in #ops", Some("Primary: Alice"), "Ask in #ops")]
    #[case("A|B|C", Some("A"), "B|C")]
    #[case("  seg   |   rest  ", Some("  seg"), "rest  ")]
    #[case("seg |", Some("seg"), "")]
    #[case("no separator here", None, "no separator here")]
    fn split_at_first_separator(
        #[case] topic: &str,
        #[case] segment: Option<&str>,
        #[case] suffix: &str,
    ) {
        let split = split_topic(topic);
        assert_eq!(split.segment, segment);
        assert_eq!(split.suffix, suffix);
    }

    #[test]
    fn matching_segment_is_unchanged() {
        assert_eq!(
            plan_update("Primary: Alice   | Ask in #ops", "Primary: Alice"),
            TopicPlan::Unchanged
        );
    }

    #[test]
    fn differing_segment_keeps_suffix() {
        assert_eq!(
            plan_update("Bob: Eve | Ask in #ops", "Primary: Alice"),
            TopicPlan::Replace {
                topic: "Primary: Alice | Ask in #ops".into()
            }
        );
    }

    #[test]
    fn empty_topic_gets_placeholder_suffix() {
        assert_eq!(
            plan_update("", "Primary: Alice"),
            TopicPlan::Replace {
                topic: "Primary: Alice | .".into()
            }
        );
    }

    #[test]
    fn topic_without_separator_becomes_suffix() {
        assert_eq!(
            plan_update("Welcome to ops", "Primary: Alice"),
            TopicPlan::Replace {
                topic: "Primary: Alice | Welcome to ops".into()
            }
        );
        assert_eq!(
            plan_update("Primary: Alice", "Primary: Alice"),
            TopicPlan::Unchanged
        );
    }

    #[test]
    fn comparison_is_exact() {
        assert!(matches!(
            plan_update("primary: alice | x", "Primary: Alice"),
            TopicPlan::Replace { .. }
        ));
    }

    #[tokio::test]
    async fn unchanged_segment_issues_no_write() {
        let chat = RecordingChat::with_topic("Primary: Alice | Ask in #ops");
        let writer = TopicWriter::new(chat.clone(), false);
        let outcome = writer
            .sync_topic(&ChannelId::from("C1"), "Primary: Alice")
            .await
            .expect("sync");
        assert_eq!(outcome, UpdateOutcome::NoChangeNeeded);
        assert!(chat.writes().is_empty());
    }

    #[tokio::test]
    async fn changed_segment_writes_once_and_is_then_idempotent() {
        let chat = RecordingChat::with_topic("Bob: Eve | Ask in #ops");
        let writer = TopicWriter::new(chat.clone(), false);
        let channel = ChannelId::from("C1");

        let first = writer.sync_topic(&channel, "Primary: Alice").await.expect("first");
        assert_eq!(
            first,
            UpdateOutcome::Applied {
                topic: "Primary: Alice | Ask in #ops".into()
            }
        );
        let second = writer.sync_topic(&channel, "Primary: Alice").await.expect("second");
        assert_eq!(second, UpdateOutcome::NoChangeNeeded);
        assert_eq!(chat.writes(), vec!["Primary: Alice | Ask in #ops".to_string()]);
    }

    #[tokio::test]
    async fn dry_run_never_writes() {
        let chat = RecordingChat::with_topic("Bob: Eve | Ask in #ops");
        let writer = TopicWriter::new(chat.clone(), true);
        let channel = ChannelId::from("C1");

        let changed = writer.sync_topic(&channel, "Primary: Alice").await.expect("changed");
        assert_eq!(
            changed,
            UpdateOutcome::DryRun {
                topic: "Primary: Alice | Ask in #ops".into()
            }
        );
        let same = writer.sync_topic(&channel, "Bob: Eve").await.expect("same");
        assert_eq!(same, UpdateOutcome::NoChangeNeeded);
        assert!(chat.writes().is_empty());
    }
}
