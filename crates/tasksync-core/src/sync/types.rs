//! Types shared by the sync engine and its callers.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::DatabaseError;
use crate::mapping::LastSyncStatus;
use crate::remote::ProviderError;

/// Options for [`crate::sync::SyncEngine::enable_sync`].
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Remote list to sync with. `None` uses the configured default name.
    pub remote_list_name: Option<String>,
    pub sync_calendar: bool,
}

/// Which side a failed item operation was touching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOp {
    Push,
    Pull,
    DeleteLocal,
    DeleteRemote,
}

/// One item that failed during a pass. The pass itself carried on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncItemError {
    pub op: SyncOp,
    pub local_item_id: Option<i64>,
    pub remote_item_id: Option<String>,
    pub message: String,
}

impl std::fmt::Display for SyncItemError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.op)?;
        if let Some(id) = self.local_item_id {
            write!(f, " local={id}")?;
        }
        if let Some(id) = &self.remote_item_id {
            write!(f, " remote={id}")?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Counters and per-item failures of one full sync.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncResult {
    pub pushed: usize,
    pub pulled: usize,
    /// Items where both sides had changed since the last reconciliation.
    pub conflicts: usize,
    pub deleted_local: usize,
    pub deleted_remote: usize,
    pub errors: Vec<SyncItemError>,
}

impl SyncResult {
    pub fn status(&self) -> LastSyncStatus {
        if self.errors.is_empty() {
            LastSyncStatus::Success
        } else {
            LastSyncStatus::Partial
        }
    }

    /// Joined error messages for `last_sync_error`, `None` when clean.
    pub fn error_summary(&self) -> Option<String> {
        if self.errors.is_empty() {
            return None;
        }
        let joined = self
            .errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        Some(joined)
    }
}

/// What an incremental hook did. Never an error: the local mutation it
/// follows has already committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncrementalOutcome {
    /// Sync not enabled for the item's list, or nothing to do.
    Skipped,
    Pushed,
    Removed,
    Failed(String),
}

/// Per-list sync status for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncStatusReport {
    pub account_id: String,
    pub list_id: String,
    pub enabled: bool,
    pub remote_list_id: Option<String>,
    pub remote_list_name: Option<String>,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub last_sync_status: Option<LastSyncStatus>,
    pub last_sync_error: Option<String>,
    pub mapped_items: usize,
}

/// Errors that end a sync operation as a whole.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// No usable credential, or the provider rejected it. Task sync for the
    /// list has been switched off; the user must log in and re-enable.
    #[error("Authentication required for account '{account}'")]
    AuthenticationRequired { account: String },

    /// The access token could not be refreshed right now. Sync stays
    /// enabled; the next attempt retries the refresh.
    #[error("Credential for account '{account}' temporarily unavailable: {message}")]
    CredentialUnavailable { account: String, message: String },

    #[error("Sync is not enabled for {account}/{list}")]
    NotEnabled { account: String, list: String },

    /// Failure resolving the remote list or enumerating remote tasks.
    #[error("Remote provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}
