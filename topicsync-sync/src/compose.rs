//! Build the on-call segment of a topic.

use topicsync_core::ScheduleEntry;

use crate::oncall::OncallResult;

/// Join `"<name>: <label>"` pairs with `", "`, in input order.
///
/// The order is visible in the topic and must be stable between runs, or
/// the unchanged-segment check in the writer would never match.
pub fn compose(results: &[(ScheduleEntry, OncallResult)]) -> String {
    results
        .iter()
        .map(|(entry, oncall)| format!("{}: {}", entry.name, oncall.label()))
        .collect::<Vec<_>>()
        .join(", ")
}
