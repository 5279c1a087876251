//! Shared sync pipeline entrypoint used by CLI and daemon.

use std::sync::Arc;
use std::time::Duration;

use futures::future::{join_all, try_join_all};
use serde::{Deserialize, Serialize};

use topicsync_core::settings::{CHAT_URL_VAR, PAGING_URL_VAR};
use topicsync_core::{ChannelId, ConfigError, Settings, SyncConfig};

use crate::chat::Slack;
use crate::compose::compose;
use crate::error::SyncError;
use crate::oncall::OncallResolver;
use crate::paging::PagerDuty;
use crate::writer::{TopicPlan, TopicWriter, UpdateOutcome};

/// Upper bound for one channel's whole pipeline (lookups, read, write).
pub const DEFAULT_PIPELINE_TIMEOUT: Duration = Duration::from_secs(30);

/// Outcome of syncing a single channel within a run.
#[derive(Debug)]
pub struct ChannelReport {
    pub channel: ChannelId,
    pub outcome: Result<UpdateOutcome, SyncError>,
}

impl ChannelReport {
    /// `applied`, `dry_run`, `unchanged` or `failed`.
    pub fn status(&self) -> &'static str {
        match &self.outcome {
            Ok(outcome) => outcome.label(),
            Err(_) => "failed",
        }
    }

    /// Written topic for successes, error message for failures.
    pub fn detail(&self) -> String {
        match &self.outcome {
            Ok(outcome) => outcome.topic().unwrap_or_default().to_string(),
            Err(err) => err.to_string(),
        }
    }
}

/// Per-status counts for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub applied: usize,
    pub dry_run: usize,
    pub unchanged: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn from_reports(reports: &[ChannelReport]) -> Self {
        let mut summary = Self::default();
        for report in reports {
            match &report.outcome {
                Ok(UpdateOutcome::Applied { .. }) => summary.applied += 1,
                Ok(UpdateOutcome::DryRun { .. }) => summary.dry_run += 1,
                Ok(UpdateOutcome::NoChangeNeeded) => summary.unchanged += 1,
                Err(_) => summary.failed += 1,
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.applied + self.dry_run + self.unchanged + self.failed
    }
}

/// What a sync would do to one channel, without writing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicPreview {
    pub channel: ChannelId,
    pub current: String,
    /// `None` when the on-call segment is already up to date.
    pub proposed: Option<String>,
}

/// Runs the resolve → compose → write pipeline for a batch of channels.
#[derive(Clone)]
pub struct SyncEngine {
    resolver: OncallResolver,
    writer: TopicWriter,
    timeout: Duration,
}

impl SyncEngine {
    pub fn new(resolver: OncallResolver, writer: TopicWriter) -> Self {
        Self {
            resolver,
            writer,
            timeout: DEFAULT_PIPELINE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Wire PagerDuty and Slack clients from validated settings.
    ///
    /// Both base URLs must parse as absolute URLs; a bad override fails here
    /// with [`SyncError::Config`] instead of on the first request.
    pub fn from_settings(settings: &Settings) -> Result<Self, SyncError> {
        check_base_url(PAGING_URL_VAR, &settings.paging_base_url)?;
        check_base_url(CHAT_URL_VAR, &settings.chat_base_url)?;

        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .user_agent(concat!("topicsync/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let paging = PagerDuty::new(
            client.clone(),
            settings.paging_base_url.clone(),
            settings.paging_token.clone(),
        );
        let chat = Slack::new(
            client,
            settings.chat_base_url.clone(),
            settings.chat_token.clone(),
        );

        Ok(Self::new(
            OncallResolver::new(Arc::new(paging)),
            TopicWriter::new(Arc::new(chat), settings.dry_run),
        ))
    }

    pub fn is_dry_run(&self) -> bool {
        self.writer.is_dry_run()
    }

    /// Sync every config concurrently.
    ///
    /// A failure in one channel never stops the others; reports come back in
    /// input order, one per config.
    pub async fn run_once(&self, configs: &[SyncConfig]) -> Vec<ChannelReport> {
        let runs = configs.iter().map(|config| async move {
            let outcome = self.sync_bounded(config).await;
            log_report(&config.channel, &outcome);
            ChannelReport {
                channel: config.channel.clone(),
                outcome,
            }
        });
        join_all(runs).await
    }

    /// Sync one config without a pipeline deadline.
    pub async fn sync_config(&self, config: &SyncConfig) -> Result<UpdateOutcome, SyncError> {
        let segment = self.desired_segment(config).await?;
        self.writer.sync_topic(&config.channel, &segment).await
    }

    /// Resolve all schedules of `config` and compose the on-call segment.
    ///
    /// Lookups run concurrently; results are recombined in schedule order.
    pub async fn desired_segment(&self, config: &SyncConfig) -> Result<String, SyncError> {
        let lookups = config.schedules.iter().map(|entry| async move {
            let oncall = self.resolver.resolve(&entry.schedule).await?;
            Ok::<_, SyncError>((entry.clone(), oncall))
        });
        let resolved = try_join_all(lookups).await?;
        Ok(compose(&resolved))
    }

    /// Perform every read and the update decision, but never write.
    pub async fn preview(&self, config: &SyncConfig) -> Result<TopicPreview, SyncError> {
        let work = async {
            let segment = self.desired_segment(config).await?;
            let (current, plan) = self.writer.plan(&config.channel, &segment).await?;
            let proposed = match plan {
                TopicPlan::Unchanged => None,
                TopicPlan::Replace { topic } => Some(topic),
            };
            Ok::<_, SyncError>(TopicPreview {
                channel: config.channel.clone(),
                current,
                proposed,
            })
        };
        self.bounded(&config.channel, work).await
    }

    async fn sync_bounded(&self, config: &SyncConfig) -> Result<UpdateOutcome, SyncError> {
        self.bounded(&config.channel, self.sync_config(config)).await
    }

    async fn bounded<T, F>(&self, channel: &ChannelId, work: F) -> Result<T, SyncError>
    where
        F: std::future::Future<Output = Result<T, SyncError>>,
    {
        match tokio::time::timeout(self.timeout, work).await {
            Ok(result) => result,
            Err(_) => Err(SyncError::Timeout {
                channel: channel.0.clone(),
                after: self.timeout,
            }),
        }
    }
}

fn check_base_url(var: &'static str, value: &str) -> Result<(), SyncError> {
    match reqwest::Url::parse(value) {
        Ok(url) if !url.cannot_be_a_base() => Ok(()),
        _ => Err(ConfigError::InvalidValue {
            var,
            value: value.to_string(),
        }
        .into()),
    }
}

fn log_report(channel: &ChannelId, outcome: &Result<UpdateOutcome, SyncError>) {
    match outcome {
        Ok(UpdateOutcome::NoChangeNeeded) => {
            tracing::info!(channel = %channel, outcome = "unchanged", "channel synced");
        }
        Ok(UpdateOutcome::Applied { topic }) => {
            tracing::info!(channel = %channel, outcome = "applied", topic = %topic, "channel synced");
        }
        Ok(UpdateOutcome::DryRun { topic }) => {
            tracing::info!(channel = %channel, outcome = "dry_run", topic = %topic, "channel synced");
        }
        Err(err) => {
            tracing::error!(
                channel = %channel,
                outcome = "failed",
                kind = err.kind(),
                error = %err,
                "channel sync failed"
            );
        }
    }
}
