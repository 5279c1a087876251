//! Resolve who is on call for a schedule right now.

use std::fmt;
use std::sync::Arc;

use topicsync_core::ScheduleId;

use crate::error::SyncError;
use crate::paging::{PagingService, TimeWindow};

/// Label used when a schedule has nobody on call.
pub const NO_ONE_LABEL: &str = "No one :panic:";
/// Label used when the on-call user has no resolvable name.
pub const DEACTIVATED_LABEL: &str = "Deactivated user :panic:";
/// Appended to the label while an override is active.
pub const OVERRIDE_SUFFIX: &str = " (Override)";

/// Resolved on-call identity for one schedule. Sentinel labels are valid data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OncallResult {
    pub display_name: String,
    pub is_overridden: bool,
}

impl OncallResult {
    pub fn new(display_name: impl Into<String>, is_overridden: bool) -> Self {
        Self {
            display_name: display_name.into(),
            is_overridden,
        }
    }

    /// Text shown in the topic after `"<schedule name>: "`.
    pub fn label(&self) -> String {
        if self.is_overridden {
            format!("{}{}", self.display_name, OVERRIDE_SUFFIX)
        } else {
            self.display_name.clone()
        }
    }
}

impl fmt::Display for OncallResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Looks up the current on-call person through a [`PagingService`].
#[derive(Clone)]
pub struct OncallResolver {
    paging: Arc<dyn PagingService>,
}

impl OncallResolver {
    pub fn new(paging: Arc<dyn PagingService>) -> Self {
        Self { paging }
    }

    /// Resolve `schedule` for a window ending now.
    pub async fn resolve(&self, schedule: &ScheduleId) -> Result<OncallResult, SyncError> {
        self.resolve_in(schedule, &TimeWindow::now()).await
    }

    /// Resolve `schedule` for an explicit window.
    ///
    /// The assignee and override lookups are independent and run concurrently.
    /// Only the first assignee counts.
    pub async fn resolve_in(
        &self,
        schedule: &ScheduleId,
        window: &TimeWindow,
    ) -> Result<OncallResult, SyncError> {
        let (users, is_overridden) = tokio::try_join!(
            self.paging.oncall_users(schedule, window),
            self.paging.has_override(schedule, window),
        )?;

        let display_name = match users.into_iter().next() {
            None => NO_ONE_LABEL.to_string(),
            Some(user) => match user.name {
                Some(name) if !name.is_empty() => name,
                _ => DEACTIVATED_LABEL.to_string(),
            },
        };

        tracing::debug!(
            schedule = %schedule,
            oncall = %display_name,
            overridden = is_overridden,
            "resolved on-call"
        );
        Ok(OncallResult {
            display_name,
            is_overridden,
        })
    }
}
