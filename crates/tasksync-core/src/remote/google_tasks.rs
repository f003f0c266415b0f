//! Google Tasks REST client.
//!
//! Wire fields: `id`, `title`, `notes`, `status` (`needsAction` |
//! `completed`), `due` and `updated` (RFC3339, `updated` is server-assigned).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use super::codec::{format_timestamp, parse_timestamp};
use super::provider::{ProviderError, RemoteTask, RemoteTaskList, RemoteTaskProvider, TaskDraft};

const STATUS_NEEDS_ACTION: &str = "needsAction";
const STATUS_COMPLETED: &str = "completed";
const PAGE_SIZE: &str = "100";

#[derive(Debug, Deserialize)]
struct WireTaskList {
    id: String,
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
struct WireTask {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    status: String,
    #[serde(default)]
    due: Option<String>,
    #[serde(default)]
    updated: Option<String>,
    #[serde(default)]
    deleted: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Page<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    #[serde(default)]
    next_page_token: Option<String>,
}

impl From<WireTaskList> for RemoteTaskList {
    fn from(w: WireTaskList) -> Self {
        Self {
            id: w.id,
            title: w.title,
        }
    }
}

impl From<WireTask> for RemoteTask {
    fn from(w: WireTask) -> Self {
        Self {
            completed: w.status == STATUS_COMPLETED,
            due: parse_timestamp(w.due.as_deref()),
            updated: parse_timestamp(w.updated.as_deref()),
            id: w.id,
            title: w.title,
            notes: w.notes,
        }
    }
}

/// Request body for create/update. `completed: null` is what reopens a
/// completed task on the Google side.
fn task_body(draft: &TaskDraft) -> Value {
    let mut body = json!({
        "title": draft.title,
        "notes": draft.notes,
        "status": if draft.completed { STATUS_COMPLETED } else { STATUS_NEEDS_ACTION },
        "due": draft.due.as_ref().map(format_timestamp),
    });
    if !draft.completed {
        body["completed"] = Value::Null;
    }
    body
}

/// Google Tasks API client.
pub struct GoogleTasksClient {
    http: Client,
    base_url: String,
}

impl GoogleTasksClient {
    /// Create a client against `base_url` (e.g.
    /// `https://tasks.googleapis.com/tasks/v1`). Every request is bounded
    /// by `timeout`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn lists_url(&self) -> String {
        format!("{}/users/@me/lists", self.base_url)
    }

    fn list_url(&self, list_id: &str) -> String {
        format!("{}/{}", self.lists_url(), urlencoding::encode(list_id))
    }

    fn tasks_url(&self, list_id: &str) -> String {
        format!("{}/lists/{}/tasks", self.base_url, urlencoding::encode(list_id))
    }

    fn task_url(&self, list_id: &str, task_id: &str) -> String {
        format!("{}/{}", self.tasks_url(list_id), urlencoding::encode(task_id))
    }

    /// Send and classify the response status.
    async fn send(&self, req: RequestBuilder, resource: &str) -> Result<Response, ProviderError> {
        let resp = req.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        match status {
            StatusCode::UNAUTHORIZED => Err(ProviderError::Unauthorized),
            StatusCode::NOT_FOUND => Err(ProviderError::NotFound(resource.to_string())),
            s if s.is_server_error() => Err(ProviderError::Server { status: s.as_u16() }),
            s => {
                let body = resp.text().await.unwrap_or_default();
                Err(ProviderError::Api {
                    status: s.as_u16(),
                    body,
                })
            }
        }
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        req: RequestBuilder,
        resource: &str,
    ) -> Result<T, ProviderError> {
        let resp = self.send(req, resource).await?;
        let body = resp.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Follow `nextPageToken` until exhausted.
    async fn paginate<T: DeserializeOwned>(
        &self,
        token: &str,
        url: &str,
        query: &[(&str, &str)],
        resource: &str,
    ) -> Result<Vec<T>, ProviderError> {
        let mut out = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut req = self
                .http
                .get(url)
                .bearer_auth(token)
                .query(query)
                .query(&[("maxResults", PAGE_SIZE)]);
            if let Some(pt) = &page_token {
                req = req.query(&[("pageToken", pt.as_str())]);
            }
            let page: Page<T> = self.send_json(req, resource).await?;
            out.extend(page.items);
            match page.next_page_token {
                Some(next) if !next.is_empty() => page_token = Some(next),
                _ => break,
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl RemoteTaskProvider for GoogleTasksClient {
    fn name(&self) -> &str {
        "google_tasks"
    }

    async fn list_task_lists(&self, token: &str) -> Result<Vec<RemoteTaskList>, ProviderError> {
        let lists: Vec<WireTaskList> = self
            .paginate(token, &self.lists_url(), &[], "task lists")
            .await?;
        Ok(lists.into_iter().map(Into::into).collect())
    }

    async fn create_task_list(
        &self,
        token: &str,
        title: &str,
    ) -> Result<RemoteTaskList, ProviderError> {
        let req = self
            .http
            .post(self.lists_url())
            .bearer_auth(token)
            .json(&json!({ "title": title }));
        let list: WireTaskList = self.send_json(req, "task lists").await?;
        Ok(list.into())
    }

    async fn delete_task_list(&self, token: &str, list_id: &str) -> Result<(), ProviderError> {
        let req = self.http.delete(self.list_url(list_id)).bearer_auth(token);
        match self.send(req, list_id).await {
            Ok(_) => Ok(()),
            Err(ProviderError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn list_tasks(
        &self,
        token: &str,
        list_id: &str,
        include_completed: bool,
    ) -> Result<Vec<RemoteTask>, ProviderError> {
        let flag = if include_completed { "true" } else { "false" };
        let tasks: Vec<WireTask> = self
            .paginate(
                token,
                &self.tasks_url(list_id),
                &[("showCompleted", flag), ("showHidden", flag)],
                list_id,
            )
            .await?;
        Ok(tasks
            .into_iter()
            .filter(|t| !t.deleted)
            .map(Into::into)
            .collect())
    }

    async fn create_task(
        &self,
        token: &str,
        list_id: &str,
        draft: &TaskDraft,
    ) -> Result<RemoteTask, ProviderError> {
        let req = self
            .http
            .post(self.tasks_url(list_id))
            .bearer_auth(token)
            .json(&task_body(draft));
        let task: WireTask = self.send_json(req, list_id).await?;
        Ok(task.into())
    }

    async fn update_task(
        &self,
        token: &str,
        list_id: &str,
        task_id: &str,
        draft: &TaskDraft,
    ) -> Result<RemoteTask, ProviderError> {
        let req = self
            .http
            .patch(self.task_url(list_id, task_id))
            .bearer_auth(token)
            .json(&task_body(draft));
        let task: WireTask = self.send_json(req, task_id).await?;
        Ok(task.into())
    }

    async fn delete_task(
        &self,
        token: &str,
        list_id: &str,
        task_id: &str,
    ) -> Result<(), ProviderError> {
        let req = self
            .http
            .delete(self.task_url(list_id, task_id))
            .bearer_auth(token);
        match self.send(req, task_id).await {
            Ok(_) => Ok(()),
            Err(ProviderError::NotFound(_)) => {
                tracing::debug!(task_id, "remote task already gone");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn complete_task(
        &self,
        token: &str,
        list_id: &str,
        task_id: &str,
    ) -> Result<RemoteTask, ProviderError> {
        let req = self
            .http
            .patch(self.task_url(list_id, task_id))
            .bearer_auth(token)
            .json(&json!({ "status": STATUS_COMPLETED }));
        let task: WireTask = self.send_json(req, task_id).await?;
        Ok(task.into())
    }
}
