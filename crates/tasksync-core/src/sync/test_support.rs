//! In-memory remote provider and fixtures for engine tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::credentials::{CredentialStore, OAuthConfig, TokenSet};
use crate::remote::{ProviderError, RemoteTask, RemoteTaskList, RemoteTaskProvider, TaskDraft};
use crate::storage::Database;

pub const ACCOUNT: &str = "acct";
pub const LIST: &str = "inbox";

#[derive(Default)]
struct FakeState {
    next_id: u64,
    lists: Vec<RemoteTaskList>,
    tasks: HashMap<String, Vec<RemoteTask>>,
    unauthorized: bool,
    failing_titles: HashSet<String>,
    failing_deletes: bool,
    item_auth_rejected: bool,
    creates: usize,
    item_calls: usize,
}

impl FakeState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}{}", self.next_id)
    }

    fn check(&self) -> Result<(), ProviderError> {
        if self.unauthorized {
            Err(ProviderError::Unauthorized)
        } else {
            Ok(())
        }
    }

    /// Per-task write; counted even when it fails.
    fn check_item(&mut self) -> Result<(), ProviderError> {
        self.item_calls += 1;
        self.check()?;
        if self.item_auth_rejected {
            Err(ProviderError::Unauthorized)
        } else {
            Ok(())
        }
    }

    fn check_title(&self, title: &str) -> Result<(), ProviderError> {
        if self.failing_titles.contains(title) {
            Err(ProviderError::Timeout)
        } else {
            Ok(())
        }
    }

    fn task_mut(&mut self, list_id: &str, task_id: &str) -> Result<&mut RemoteTask, ProviderError> {
        self.tasks
            .get_mut(list_id)
            .and_then(|tasks| tasks.iter_mut().find(|t| t.id == task_id))
            .ok_or_else(|| ProviderError::NotFound(task_id.to_string()))
    }
}

/// Remote provider held entirely in memory. Clones share state, so a test
/// can keep a handle after giving one to the engine.
#[derive(Clone, Default)]
pub struct FakeProvider {
    state: Arc<Mutex<FakeState>>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    pub fn list_id(&self, title: &str) -> Option<String> {
        self.with(|s| s.lists.iter().find(|l| l.title == title).map(|l| l.id.clone()))
    }

    pub fn has_list(&self, list_id: &str) -> bool {
        self.with(|s| s.lists.iter().any(|l| l.id == list_id))
    }

    pub fn tasks(&self, list_id: &str) -> Vec<RemoteTask> {
        self.with(|s| s.tasks.get(list_id).cloned().unwrap_or_default())
    }

    pub fn creates(&self) -> usize {
        self.with(|s| s.creates)
    }

    /// Create, update and delete calls made, successful or not.
    pub fn item_calls(&self) -> usize {
        self.with(|s| s.item_calls)
    }

    /// Add a task out-of-band, as another client would.
    pub fn insert_task(
        &self,
        list_id: &str,
        title: &str,
        notes: Option<&str>,
        updated: DateTime<Utc>,
    ) -> String {
        self.with(|s| {
            let id = s.next_id("t");
            s.tasks.entry(list_id.to_string()).or_default().push(RemoteTask {
                id: id.clone(),
                title: title.into(),
                notes: notes.map(String::from),
                completed: false,
                due: None,
                updated: Some(updated),
            });
            id
        })
    }

    /// Edit a task out-of-band. `updated` is left to the caller.
    pub fn edit_task(&self, list_id: &str, task_id: &str, f: impl FnOnce(&mut RemoteTask)) {
        self.with(|s| f(s.task_mut(list_id, task_id).unwrap()));
    }

    pub fn remove_task(&self, list_id: &str, task_id: &str) {
        self.with(|s| {
            if let Some(tasks) = s.tasks.get_mut(list_id) {
                tasks.retain(|t| t.id != task_id);
            }
        });
    }

    pub fn set_unauthorized(&self, on: bool) {
        self.with(|s| s.unauthorized = on);
    }

    /// Reject task creates, updates and deletes with 401 while list calls
    /// keep working, as when a token is revoked mid-pass.
    pub fn reject_item_writes(&self) {
        self.with(|s| s.item_auth_rejected = true);
    }

    /// Creates and updates carrying this title time out.
    pub fn fail_title(&self, title: &str) {
        self.with(|s| {
            s.failing_titles.insert(title.to_string());
        });
    }

    pub fn clear_failures(&self) {
        self.with(|s| {
            s.failing_titles.clear();
            s.failing_deletes = false;
        });
    }

    pub fn fail_deletes(&self) {
        self.with(|s| s.failing_deletes = true);
    }
}

fn apply_draft(task: &mut RemoteTask, draft: &TaskDraft) {
    task.title = draft.title.clone();
    task.notes = draft.notes.clone();
    task.completed = draft.completed;
    task.due = draft.due;
    task.updated = Some(Utc::now());
}

#[async_trait]
impl RemoteTaskProvider for FakeProvider {
    fn name(&self) -> &str {
        "fake"
    }

    async fn list_task_lists(&self, _token: &str) -> Result<Vec<RemoteTaskList>, ProviderError> {
        self.with(|s| {
            s.check()?;
            Ok(s.lists.clone())
        })
    }

    async fn create_task_list(
        &self,
        _token: &str,
        title: &str,
    ) -> Result<RemoteTaskList, ProviderError> {
        self.with(|s| {
            s.check()?;
            let list = RemoteTaskList {
                id: s.next_id("l"),
                title: title.into(),
            };
            s.lists.push(list.clone());
            Ok(list)
        })
    }

    async fn delete_task_list(&self, _token: &str, list_id: &str) -> Result<(), ProviderError> {
        self.with(|s| {
            s.check()?;
            s.lists.retain(|l| l.id != list_id);
            s.tasks.remove(list_id);
            Ok(())
        })
    }

    async fn list_tasks(
        &self,
        _token: &str,
        list_id: &str,
        include_completed: bool,
    ) -> Result<Vec<RemoteTask>, ProviderError> {
        self.with(|s| {
            s.check()?;
            let tasks = s.tasks.get(list_id).cloned().unwrap_or_default();
            Ok(tasks
                .into_iter()
                .filter(|t| include_completed || !t.completed)
                .collect())
        })
    }

    async fn create_task(
        &self,
        _token: &str,
        list_id: &str,
        draft: &TaskDraft,
    ) -> Result<RemoteTask, ProviderError> {
        tokio::task::yield_now().await;
        self.with(|s| {
            s.check_item()?;
            s.check_title(&draft.title)?;
            let mut task = RemoteTask {
                id: s.next_id("t"),
                title: String::new(),
                notes: None,
                completed: false,
                due: None,
                updated: None,
            };
            apply_draft(&mut task, draft);
            s.tasks.entry(list_id.to_string()).or_default().push(task.clone());
            s.creates += 1;
            Ok(task)
        })
    }

    async fn update_task(
        &self,
        _token: &str,
        list_id: &str,
        task_id: &str,
        draft: &TaskDraft,
    ) -> Result<RemoteTask, ProviderError> {
        self.with(|s| {
            s.check_item()?;
            s.check_title(&draft.title)?;
            let task = s.task_mut(list_id, task_id)?;
            apply_draft(task, draft);
            Ok(task.clone())
        })
    }

    async fn delete_task(
        &self,
        _token: &str,
        list_id: &str,
        task_id: &str,
    ) -> Result<(), ProviderError> {
        self.with(|s| {
            s.check_item()?;
            if s.failing_deletes {
                return Err(ProviderError::Server { status: 503 });
            }
            if let Some(tasks) = s.tasks.get_mut(list_id) {
                tasks.retain(|t| t.id != task_id);
            }
            Ok(())
        })
    }

    async fn complete_task(
        &self,
        _token: &str,
        list_id: &str,
        task_id: &str,
    ) -> Result<RemoteTask, ProviderError> {
        self.with(|s| {
            s.check()?;
            let task = s.task_mut(list_id, task_id)?;
            task.completed = true;
            task.updated = Some(Utc::now());
            Ok(task.clone())
        })
    }
}

/// Credential store whose endpoints are unreachable; tests store a
/// long-lived token so it never needs them.
pub fn credential_store() -> CredentialStore {
    let base = "http://127.0.0.1:9";
    let oauth = OAuthConfig {
        client_id: "cid".into(),
        client_secret: "secret".into(),
        auth_url: format!("{base}/auth"),
        token_url: format!("{base}/token"),
        revoke_url: format!("{base}/revoke"),
        userinfo_url: format!("{base}/userinfo"),
        scopes: vec!["tasks".into()],
        redirect_port: 19821,
    };
    CredentialStore::new(oauth, 60).unwrap()
}

pub fn login(store: &CredentialStore, db: &Database, account: &str) {
    let tokens = TokenSet {
        access_token: "tok".into(),
        refresh_token: Some("rt".into()),
        expires_at: Some(Utc::now() + chrono::Duration::hours(1)),
        scopes: vec!["tasks".into()],
    };
    store.store(db, account, &tokens, None).unwrap();
}
