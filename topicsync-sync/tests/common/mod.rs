//! In-memory paging and chat services for engine tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use topicsync_core::{ChannelId, ScheduleId};
use topicsync_sync::{
    Assignee, ChatService, OncallResolver, PagingService, SyncEngine, SyncError, TimeWindow,
    TopicWriter,
};

#[derive(Clone, Default)]
pub struct FakeSchedule {
    pub users: Vec<Assignee>,
    pub overridden: bool,
    pub delay: Duration,
}

impl FakeSchedule {
    pub fn oncall(name: &str) -> Self {
        Self {
            users: vec![Assignee::named(name)],
            ..Self::default()
        }
    }

    pub fn nobody() -> Self {
        Self::default()
    }

    pub fn overridden(mut self) -> Self {
        self.overridden = true;
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Unknown schedule ids answer like a 404.
#[derive(Default)]
pub struct FakePaging {
    schedules: HashMap<String, FakeSchedule>,
}

impl FakePaging {
    pub fn with(mut self, schedule: &str, fake: FakeSchedule) -> Self {
        self.schedules.insert(schedule.to_string(), fake);
        self
    }

    fn lookup(&self, schedule: &ScheduleId) -> Result<FakeSchedule, SyncError> {
        self.schedules
            .get(&schedule.0)
            .cloned()
            .ok_or_else(|| SyncError::ScheduleNotFound {
                schedule: schedule.0.clone(),
            })
    }
}

#[async_trait]
impl PagingService for FakePaging {
    async fn oncall_users(
        &self,
        schedule: &ScheduleId,
        _window: &TimeWindow,
    ) -> Result<Vec<Assignee>, SyncError> {
        let fake = self.lookup(schedule)?;
        tokio::time::sleep(fake.delay).await;
        Ok(fake.users)
    }

    async fn has_override(
        &self,
        schedule: &ScheduleId,
        _window: &TimeWindow,
    ) -> Result<bool, SyncError> {
        Ok(self.lookup(schedule)?.overridden)
    }
}

/// Unknown channels answer `channel_not_found`.
#[derive(Default)]
pub struct FakeChat {
    topics: Mutex<HashMap<String, String>>,
    writes: Mutex<Vec<(String, String)>>,
    reject_writes: bool,
}

impl FakeChat {
    pub fn with_topic(self, channel: &str, topic: &str) -> Self {
        self.topics
            .lock()
            .unwrap()
            .insert(channel.to_string(), topic.to_string());
        self
    }

    pub fn rejecting_writes(mut self) -> Self {
        self.reject_writes = true;
        self
    }

    pub fn topic(&self, channel: &str) -> Option<String> {
        self.topics.lock().unwrap().get(channel).cloned()
    }

    pub fn writes(&self) -> Vec<(String, String)> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatService for FakeChat {
    async fn read_topic(&self, channel: &ChannelId) -> Result<String, SyncError> {
        self.topic(&channel.0).ok_or_else(|| SyncError::ChannelNotFound {
            channel: channel.0.clone(),
        })
    }

    async fn set_topic(&self, channel: &ChannelId, topic: &str) -> Result<(), SyncError> {
        if self.reject_writes {
            return Err(SyncError::Write {
                channel: channel.0.clone(),
                body: "restricted_action".to_string(),
            });
        }
        self.writes
            .lock()
            .unwrap()
            .push((channel.0.clone(), topic.to_string()));
        self.topics
            .lock()
            .unwrap()
            .insert(channel.0.clone(), topic.to_string());
        Ok(())
    }
}

pub fn engine(paging: FakePaging, chat: Arc<FakeChat>, dry_run: bool) -> SyncEngine {
    SyncEngine::new(
        OncallResolver::new(Arc::new(paging)),
        TopicWriter::new(chat, dry_run),
    )
}
