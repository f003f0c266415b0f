//! Mapping between local todo content and remote task content.
//!
//! Remote tasks have no priority field, so priority rides in `notes` as a
//! leading marker token: `[HIGH]` or `[LOW]`, nothing for medium. Anything
//! that isn't exactly one of those markers decodes as medium. That loses
//! information if someone edits the notes by hand on the remote side, and
//! round-trips depend on it staying that way.

use chrono::{DateTime, Utc};

use super::provider::{RemoteTask, TaskDraft};
use crate::todo::{Priority, TodoFields, TodoItem};

pub const HIGH_MARKER: &str = "[HIGH]";
pub const LOW_MARKER: &str = "[LOW]";

fn marker_for(priority: Priority) -> Option<&'static str> {
    match priority {
        Priority::High => Some(HIGH_MARKER),
        Priority::Low => Some(LOW_MARKER),
        Priority::Medium => None,
    }
}

/// Build a notes value carrying `priority`, followed by `rest` if any.
pub fn encode_notes(priority: Priority, rest: Option<&str>) -> Option<String> {
    let rest = rest.map(str::trim).filter(|r| !r.is_empty());
    match (marker_for(priority), rest) {
        (Some(marker), Some(rest)) => Some(format!("{marker} {rest}")),
        (Some(marker), None) => Some(marker.to_string()),
        (None, Some(rest)) => Some(rest.to_string()),
        (None, None) => None,
    }
}

/// Read the priority marker from the first token of `notes`.
pub fn decode_priority(notes: Option<&str>) -> Priority {
    let first = notes.and_then(|n| n.split_whitespace().next());
    match first {
        Some(HIGH_MARKER) => Priority::High,
        Some(LOW_MARKER) => Priority::Low,
        _ => Priority::Medium,
    }
}

/// Parse an RFC3339 timestamp from the wire. Malformed values become
/// `None` rather than an error so one bad record can't stop a batch.
pub fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?;
    match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => Some(dt.with_timezone(&Utc)),
        Err(e) => {
            tracing::debug!(value = raw, error = %e, "ignoring unparsable remote timestamp");
            None
        }
    }
}

/// Format a timestamp the way task APIs expect (RFC3339, millisecond, `Z`).
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Remote content for a local item.
pub fn draft_from_item(item: &TodoItem) -> TaskDraft {
    TaskDraft {
        title: item.text.clone(),
        notes: encode_notes(item.priority, None),
        completed: item.is_completed,
        due: item.due_date,
    }
}

/// Local content for a remote task. Whole record: every synced field comes
/// from the remote side.
pub fn fields_from_remote(task: &RemoteTask) -> TodoFields {
    TodoFields {
        text: task.title.clone(),
        is_completed: task.completed,
        priority: decode_priority(task.notes.as_deref()),
        due_date: task.due,
    }
}
