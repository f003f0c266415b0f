//! Durable local ⇄ remote correlations and per-list sync bookkeeping.
//!
//! A [`TaskMapping`]'s watermarks record each side's `updated` time as of
//! the last successful reconciliation. They are not live mirrors: comparing
//! a side's current timestamp against its watermark is how the engine
//! decides whether that side changed.

pub mod store;

pub use store::{truncate_error, MappingStore, MappingUpdate, MAX_SYNC_ERROR_CHARS};

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingStatus {
    Synced,
    /// Local side is ahead of remote (e.g. a failed incremental call).
    Pending,
    /// Both sides changed and the winning write could not be applied.
    Conflict,
    Error,
}

impl MappingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MappingStatus::Synced => "synced",
            MappingStatus::Pending => "pending",
            MappingStatus::Conflict => "conflict",
            MappingStatus::Error => "error",
        }
    }

    /// Unknown stored values read as `Pending` so the next full sync
    /// revisits the mapping.
    pub fn parse(s: &str) -> Self {
        match s {
            "synced" => MappingStatus::Synced,
            "conflict" => MappingStatus::Conflict,
            "error" => MappingStatus::Error,
            _ => MappingStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LastSyncStatus {
    Success,
    /// The pass finished but some items failed.
    Partial,
    Error,
}

impl LastSyncStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            LastSyncStatus::Success => "success",
            LastSyncStatus::Partial => "partial",
            LastSyncStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(LastSyncStatus::Success),
            "partial" => Some(LastSyncStatus::Partial),
            "error" => Some(LastSyncStatus::Error),
            _ => None,
        }
    }
}

/// One local item's correlation with one remote task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskMapping {
    pub id: i64,
    pub local_item_id: i64,
    pub remote_item_id: String,
    pub remote_list_id: String,
    pub account_id: String,
    pub list_id: String,
    pub local_updated_at: DateTime<Utc>,
    /// `None` when the remote side never reported a parsable `updated`.
    pub remote_updated_at: Option<DateTime<Utc>>,
    pub last_sync_at: DateTime<Utc>,
    pub sync_status: MappingStatus,
}

/// Sync settings and last outcome for one (account, list).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncConfig {
    pub account_id: String,
    pub list_id: String,
    pub sync_tasks: bool,
    pub sync_calendar: bool,
    pub remote_list_id: Option<String>,
    pub remote_list_name: Option<String>,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub last_sync_status: Option<LastSyncStatus>,
    pub last_sync_error: Option<String>,
}
