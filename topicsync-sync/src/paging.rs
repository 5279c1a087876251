//! Paging service client (PagerDuty REST API v2).

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{StatusCode, Url};
use serde::Deserialize;

use topicsync_core::settings::PAGING_URL_VAR;
use topicsync_core::{ConfigError, ScheduleId};

use crate::error::SyncError;

const SERVICE: &str = "PagerDuty";
const PAGERDUTY_ACCEPT: &str = "application/vnd.pagerduty+json;version=2";

/// Width of the lookup window ending at "now".
///
/// PagerDuty returns everyone on call anywhere inside `[since, until]`, so a
/// narrow window approximates "who is on call right now".
pub const ONCALL_WINDOW_SECS: i64 = 5;

/// The `[since, until]` range sent with every schedule lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
}

impl TimeWindow {
    pub fn ending_at(until: DateTime<Utc>) -> Self {
        Self {
            since: until - Duration::seconds(ONCALL_WINDOW_SECS),
            until,
        }
    }

    pub fn now() -> Self {
        Self::ending_at(Utc::now())
    }

    /// Query parameters, RFC 3339 with millisecond precision and `Z` suffix.
    pub fn query(&self) -> [(&'static str, String); 2] {
        [
            ("since", self.since.to_rfc3339_opts(SecondsFormat::Millis, true)),
            ("until", self.until.to_rfc3339_opts(SecondsFormat::Millis, true)),
        ]
    }
}

/// A user returned as on call. `name` is absent for deactivated users.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Assignee {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl Assignee {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: Some(name.into()),
        }
    }

    pub fn deactivated() -> Self {
        Self {
            id: None,
            name: None,
        }
    }
}

/// Read-only view of a paging service.
#[async_trait]
pub trait PagingService: Send + Sync {
    /// Users on call for `schedule` within `window`, first entry first.
    async fn oncall_users(
        &self,
        schedule: &ScheduleId,
        window: &TimeWindow,
    ) -> Result<Vec<Assignee>, SyncError>;

    /// Whether any override is active for `schedule` within `window`.
    async fn has_override(
        &self,
        schedule: &ScheduleId,
        window: &TimeWindow,
    ) -> Result<bool, SyncError>;
}

#[derive(Debug, Deserialize)]
struct UsersResponse {
    users: Option<Vec<Assignee>>,
}

#[derive(Debug, Deserialize)]
struct OverridesResponse {
    overrides: Option<Vec<serde_json::Value>>,
}

/// PagerDuty client authenticated with a REST API key.
#[derive(Clone)]
pub struct PagerDuty {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl PagerDuty {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            token: token.into(),
        }
    }

    async fn get_schedule_resource(
        &self,
        schedule: &ScheduleId,
        resource: &str,
        window: &TimeWindow,
    ) -> Result<String, SyncError> {
        let url = schedule_url(&self.base_url, schedule, resource)?;
        let resp = self
            .client
            .get(url)
            .header(ACCEPT, PAGERDUTY_ACCEPT)
            .header(AUTHORIZATION, format!("Token token={}", self.token))
            .query(&window.query())
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(SyncError::ScheduleNotFound {
                schedule: schedule.0.clone(),
            });
        }
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(SyncError::Http {
                service: SERVICE,
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

#[async_trait]
impl PagingService for PagerDuty {
    async fn oncall_users(
        &self,
        schedule: &ScheduleId,
        window: &TimeWindow,
    ) -> Result<Vec<Assignee>, SyncError> {
        let body = self.get_schedule_resource(schedule, "users", window).await?;
        let parsed: UsersResponse = parse(&body)?;
        parsed.users.ok_or_else(|| SyncError::MalformedResponse {
            service: SERVICE,
            detail: format!("schedule {schedule} users response has no `users` field"),
        })
    }

    async fn has_override(
        &self,
        schedule: &ScheduleId,
        window: &TimeWindow,
    ) -> Result<bool, SyncError> {
        let body = self.get_schedule_resource(schedule, "overrides", window).await?;
        let parsed: OverridesResponse = parse(&body)?;
        parsed
            .overrides
            .map(|overrides| !overrides.is_empty())
            .ok_or_else(|| SyncError::MalformedResponse {
                service: SERVICE,
                detail: format!("schedule {schedule} overrides response has no `overrides` field"),
            })
    }
}

/// `{base}/schedules/{id}/{resource}` with the id percent-encoded as a
/// single path segment.
fn schedule_url(base: &str, schedule: &ScheduleId, resource: &str) -> Result<Url, SyncError> {
    let invalid_base = || {
        SyncError::Config(ConfigError::InvalidValue {
            var: PAGING_URL_VAR,
            value: base.to_string(),
        })
    };
    let mut url = Url::parse(base).map_err(|_| invalid_base())?;
    url.path_segments_mut()
        .map_err(|_| invalid_base())?
        .pop_if_empty()
        .extend(["schedules", schedule.0.as_str(), resource]);
    Ok(url)
}

fn parse<'a, T: Deserialize<'a>>(body: &'a str) -> Result<T, SyncError> {
    serde_json::from_str(body).map_err(|e| SyncError::MalformedResponse {
        service: SERVICE,
        detail: e.to_string(),
    })
}
