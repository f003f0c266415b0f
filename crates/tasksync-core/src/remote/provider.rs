//! Provider-agnostic remote task API.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A remote task list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteTaskList {
    pub id: String,
    pub title: String,
}

/// A remote task, already decoded from the provider's wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteTask {
    pub id: String,
    pub title: String,
    pub notes: Option<String>,
    pub completed: bool,
    pub due: Option<DateTime<Utc>>,
    /// Server-assigned modification time. `None` when the provider sent
    /// something unparsable; such a task never counts as changed.
    pub updated: Option<DateTime<Utc>>,
}

/// Content to write to a remote task on create or update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDraft {
    pub title: String,
    pub notes: Option<String>,
    pub completed: bool,
    pub due: Option<DateTime<Utc>>,
}

/// Remote call failures, classified the way the sync engine reacts to them.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// 401: credential invalid, expired or revoked.
    #[error("Authentication rejected by remote provider")]
    Unauthorized,

    /// 404 on the addressed resource.
    #[error("Remote resource not found: {0}")]
    NotFound(String),

    /// The per-call timeout elapsed.
    #[error("Remote call timed out")]
    Timeout,

    /// 5xx from the provider.
    #[error("Remote server error: {status}")]
    Server { status: u16 },

    /// Any other non-success status.
    #[error("Remote API error: {status} - {body}")]
    Api { status: u16, body: String },

    /// Transport failure (DNS, connection reset, TLS).
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    /// Response body did not match the expected shape.
    #[error("Failed to decode remote response: {0}")]
    Decode(String),
}

impl ProviderError {
    pub fn is_auth(&self) -> bool {
        matches!(self, ProviderError::Unauthorized)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ProviderError::NotFound(_))
    }

    /// Timeouts, 5xx, 429 and transport failures; the next pass may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Timeout | ProviderError::Server { .. } | ProviderError::Network(_) => {
                true
            }
            ProviderError::Api { status, .. } => *status == 429,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout
        } else if err.is_decode() {
            ProviderError::Decode(err.to_string())
        } else {
            ProviderError::Network(err)
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::Decode(err.to_string())
    }
}

/// One implementation per concrete task API, selected from configuration.
///
/// Every call takes the bearer access token explicitly; obtaining a valid
/// one is the caller's job (see [`crate::credentials::CredentialStore`]).
#[async_trait]
pub trait RemoteTaskProvider: Send + Sync {
    /// Short identifier, e.g. "google_tasks".
    fn name(&self) -> &str;

    async fn list_task_lists(&self, token: &str) -> Result<Vec<RemoteTaskList>, ProviderError>;

    async fn create_task_list(
        &self,
        token: &str,
        title: &str,
    ) -> Result<RemoteTaskList, ProviderError>;

    /// Delete a list. A missing list counts as deleted.
    async fn delete_task_list(&self, token: &str, list_id: &str) -> Result<(), ProviderError>;

    async fn list_tasks(
        &self,
        token: &str,
        list_id: &str,
        include_completed: bool,
    ) -> Result<Vec<RemoteTask>, ProviderError>;

    async fn create_task(
        &self,
        token: &str,
        list_id: &str,
        draft: &TaskDraft,
    ) -> Result<RemoteTask, ProviderError>;

    /// Overwrite a task's title, notes, status and due date.
    async fn update_task(
        &self,
        token: &str,
        list_id: &str,
        task_id: &str,
        draft: &TaskDraft,
    ) -> Result<RemoteTask, ProviderError>;

    /// Delete a task. A 404 counts as success.
    async fn delete_task(
        &self,
        token: &str,
        list_id: &str,
        task_id: &str,
    ) -> Result<(), ProviderError>;

    async fn complete_task(
        &self,
        token: &str,
        list_id: &str,
        task_id: &str,
    ) -> Result<RemoteTask, ProviderError>;

    /// Find a list whose title equals `name` exactly (case-sensitive), or
    /// create one. The flag is `true` when the list was created.
    async fn get_or_create_task_list(
        &self,
        token: &str,
        name: &str,
    ) -> Result<(RemoteTaskList, bool), ProviderError> {
        let lists = self.list_task_lists(token).await?;
        if let Some(found) = lists.into_iter().find(|l| l.title == name) {
            return Ok((found, false));
        }
        let created = self.create_task_list(token, name).await?;
        Ok((created, true))
    }
}
