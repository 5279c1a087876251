//! Unified diff rendering for `topicsync diff`.

use similar::TextDiff;

/// Render a unified diff between the current and proposed topic of `channel`.
///
/// Returns an empty string when the topics are identical.
pub fn unified_topic_diff(channel: &str, current: &str, proposed: &str) -> String {
    if current == proposed {
        return String::new();
    }

    let current = with_trailing_newline(current);
    let proposed = with_trailing_newline(proposed);
    let old_header = format!("a/{channel}");
    let new_header = format!("b/{channel}");

    TextDiff::from_lines(&current, &proposed)
        .unified_diff()
        .context_radius(1)
        .header(&old_header, &new_header)
        .to_string()
}

fn with_trailing_newline(topic: &str) -> String {
    if topic.ends_with('\n') {
        topic.to_string()
    } else {
        format!("{topic}\n")
    }
}
