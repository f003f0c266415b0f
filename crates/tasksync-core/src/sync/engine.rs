//! Full and incremental reconciliation between the local todo store and a
//! remote task provider.
//!
//! A full sync enumerates both sides and diffs them against the mapping
//! table; incremental hooks push one local mutation at a time. Every
//! per-item change is durable on its own, so a pass cut short leaves valid
//! partial progress behind.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex as AsyncMutex;

use super::conflict::{self, Resolution};
use super::types::{
    IncrementalOutcome, SyncError, SyncItemError, SyncOp, SyncOptions, SyncResult,
    SyncStatusReport,
};
use crate::credentials::CredentialStore;
use crate::error::{CoreError, CredentialError, DatabaseError};
use crate::mapping::{
    LastSyncStatus, MappingStatus, MappingStore, MappingUpdate, SyncConfig, TaskMapping,
};
use crate::remote::codec::{draft_from_item, fields_from_remote};
use crate::remote::{build_provider, ProviderError, RemoteTask, RemoteTaskProvider};
use crate::storage::{Config, Database};
use crate::todo::{TodoEvent, TodoItem, TodoStore};

type PassKey = (String, String);

/// Everything one full-sync pass needs to touch a single item.
struct Pass<'a> {
    db: &'a Database,
    account: &'a str,
    list: &'a str,
    token: &'a str,
    remote_list_id: &'a str,
}

/// Resolved remote target for an incremental push.
struct Target {
    token: String,
    remote_list_id: String,
}

/// Auth failures end the pass; anything else is a per-item message.
fn item_failure(account: &str, err: ProviderError) -> Result<String, SyncError> {
    if err.is_auth() {
        Err(SyncError::AuthenticationRequired {
            account: account.to_string(),
        })
    } else {
        Ok(err.to_string())
    }
}

fn abort(account: &str, err: ProviderError) -> SyncError {
    if err.is_auth() {
        SyncError::AuthenticationRequired {
            account: account.to_string(),
        }
    } else {
        SyncError::Provider(err)
    }
}

/// Run `f` as one SQLite transaction; none of its writes survive a failure.
fn atomically<T>(
    db: &Database,
    f: impl FnOnce() -> Result<T, DatabaseError>,
) -> Result<T, DatabaseError> {
    let tx = db.conn().unchecked_transaction()?;
    let value = f()?;
    tx.commit()?;
    Ok(value)
}

fn failure(
    op: SyncOp,
    local_item_id: Option<i64>,
    remote_item_id: Option<&str>,
    message: impl Into<String>,
) -> SyncItemError {
    SyncItemError {
        op,
        local_item_id,
        remote_item_id: remote_item_id.map(str::to_string),
        message: message.into(),
    }
}

/// Orchestrates reconciliation. The only writer of task mappings.
pub struct SyncEngine {
    provider: Box<dyn RemoteTaskProvider>,
    credentials: CredentialStore,
    todos: TodoStore,
    mappings: MappingStore,
    default_list_name: String,
    passes: Mutex<HashMap<PassKey, Arc<AsyncMutex<()>>>>,
}

impl SyncEngine {
    pub fn new(
        provider: Box<dyn RemoteTaskProvider>,
        credentials: CredentialStore,
        default_list_name: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            credentials,
            todos: TodoStore::new(),
            mappings: MappingStore::new(),
            default_list_name: default_list_name.into(),
            passes: Mutex::new(HashMap::new()),
        }
    }

    /// Build the configured provider and credential store.
    pub fn from_config(config: &Config) -> Result<Self, CoreError> {
        let provider = build_provider(config)?;
        let credentials = CredentialStore::from_config(config)?;
        Ok(Self::new(
            provider,
            credentials,
            config.remote.default_list_name.clone(),
        ))
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn provider(&self) -> &dyn RemoteTaskProvider {
        self.provider.as_ref()
    }

    fn pass_lock(&self, account: &str, list: &str) -> Arc<AsyncMutex<()>> {
        let mut passes = self.passes.lock().unwrap_or_else(PoisonError::into_inner);
        passes
            .entry((account.to_string(), list.to_string()))
            .or_default()
            .clone()
    }

    /// `Ok(None)` means the account must log in again.
    async fn access_token(
        &self,
        db: &Database,
        account: &str,
    ) -> Result<Option<String>, SyncError> {
        match self.credentials.get_valid_credential(db, account).await {
            Ok(cred) => Ok(cred.map(|c| c.access_token)),
            Err(CredentialError::Transient(e)) => Err(SyncError::CredentialUnavailable {
                account: account.to_string(),
                message: e.to_string(),
            }),
            Err(CredentialError::Database(e)) => Err(e.into()),
        }
    }

    /// Switch task sync off for the list and record why. Returns the error
    /// to hand back to the caller.
    fn fail_auth(
        &self,
        db: &Database,
        account: &str,
        list: &str,
    ) -> Result<SyncError, DatabaseError> {
        tracing::error!(account, list, "credential rejected, disabling task sync until re-login");
        self.mappings.pause_tasks(db, account, list)?;
        self.mappings.record_result(
            db,
            account,
            list,
            LastSyncStatus::Error,
            Some("authentication required: log in again and re-enable sync"),
        )?;
        Ok(SyncError::AuthenticationRequired {
            account: account.to_string(),
        })
    }

    /// Record a failed pass without touching the enable flags.
    fn record_failure(
        &self,
        db: &Database,
        account: &str,
        list: &str,
        err: SyncError,
    ) -> SyncError {
        tracing::error!(account, list, error = %err, "full sync failed");
        let message = err.to_string();
        if let Err(db_err) =
            self.mappings
                .record_result(db, account, list, LastSyncStatus::Error, Some(&message))
        {
            tracing::warn!(error = %db_err, "failed to record sync failure");
        }
        err
    }

    fn enabled_config(
        &self,
        db: &Database,
        account: &str,
        list: &str,
    ) -> Result<Option<SyncConfig>, DatabaseError> {
        Ok(self
            .mappings
            .get_config(db, account, list)?
            .filter(|c| c.sync_tasks))
    }

    /// Turn task sync on for a list. Choosing a different remote list than
    /// before drops the old mappings so items are pushed afresh.
    pub fn enable_sync(
        &self,
        db: &Database,
        account: &str,
        list: &str,
        options: &SyncOptions,
    ) -> Result<SyncConfig, SyncError> {
        let name = options
            .remote_list_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.default_list_name)
            .to_string();

        if let Some(previous) = self.mappings.get_config(db, account, list)? {
            if previous.remote_list_name.as_deref() != Some(name.as_str()) {
                let dropped = self.mappings.delete_for_list(db, account, list)?;
                tracing::info!(account, list, dropped, "remote list changed, dropped old mappings");
            }
        }

        let config = self
            .mappings
            .enable_tasks(db, account, list, &name, options.sync_calendar)?;
        tracing::info!(account, list, remote_list = %name, "task sync enabled");
        Ok(config)
    }

    /// Turn sync off for a list and forget its mappings. With
    /// `delete_remote_list` the remote list is deleted too, best effort.
    /// Returns whether the list had a sync config.
    pub async fn disable_sync(
        &self,
        db: &Database,
        account: &str,
        list: &str,
        delete_remote_list: bool,
    ) -> Result<bool, SyncError> {
        let lock = self.pass_lock(account, list);
        let _pass = lock.lock().await;

        let Some(config) = self.mappings.get_config(db, account, list)? else {
            return Ok(false);
        };

        if delete_remote_list {
            if let Some(remote_list_id) = config.remote_list_id.as_deref() {
                match self.access_token(db, account).await {
                    Ok(Some(token)) => {
                        let deleted = self.provider.delete_task_list(&token, remote_list_id).await;
                        if let Err(e) = deleted {
                            tracing::warn!(
                                account,
                                list,
                                remote_list_id,
                                error = %e,
                                "failed to delete remote list"
                            );
                        }
                    }
                    Ok(None) => {
                        tracing::warn!(
                            account,
                            list,
                            "no valid credential, remote list left in place"
                        );
                    }
                    Err(e @ SyncError::CredentialUnavailable { .. }) => {
                        tracing::warn!(account, list, error = %e, "remote list left in place");
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        let removed = self.mappings.delete_for_list(db, account, list)?;
        self.mappings.disable(db, account, list)?;
        tracing::info!(account, list, removed, "sync disabled");
        Ok(true)
    }

    /// Reconcile every item of one list with its remote list.
    ///
    /// Passes for the same (account, list) run one at a time. Per-item
    /// failures are collected in [`SyncResult::errors`]; only an
    /// authentication failure ends the pass early.
    #[tracing::instrument(skip(self, db), fields(provider = self.provider.name()))]
    pub async fn full_sync(
        &self,
        db: &Database,
        account: &str,
        list: &str,
    ) -> Result<SyncResult, SyncError> {
        let lock = self.pass_lock(account, list);
        let _pass = lock.lock().await;

        let Some(config) = self.enabled_config(db, account, list)? else {
            return Err(SyncError::NotEnabled {
                account: account.to_string(),
                list: list.to_string(),
            });
        };
        let token = match self.access_token(db, account).await {
            Ok(Some(token)) => token,
            Ok(None) => return Err(self.fail_auth(db, account, list)?),
            Err(e) => return Err(self.record_failure(db, account, list, e)),
        };

        match self.run_pass(db, &config, &token).await {
            Ok(result) => {
                self.mappings.record_result(
                    db,
                    account,
                    list,
                    result.status(),
                    result.error_summary().as_deref(),
                )?;
                tracing::info!(
                    pushed = result.pushed,
                    pulled = result.pulled,
                    conflicts = result.conflicts,
                    deleted_local = result.deleted_local,
                    deleted_remote = result.deleted_remote,
                    errors = result.errors.len(),
                    "full sync finished"
                );
                Ok(result)
            }
            Err(SyncError::AuthenticationRequired { .. }) => {
                Err(self.fail_auth(db, account, list)?)
            }
            Err(e) => Err(self.record_failure(db, account, list, e)),
        }
    }

    async fn run_pass(
        &self,
        db: &Database,
        config: &SyncConfig,
        token: &str,
    ) -> Result<SyncResult, SyncError> {
        let account = config.account_id.as_str();
        let list = config.list_id.as_str();
        let list_name = config
            .remote_list_name
            .as_deref()
            .unwrap_or(&self.default_list_name);

        let (remote_list, created) = self
            .provider
            .get_or_create_task_list(token, list_name)
            .await
            .map_err(|e| abort(account, e))?;
        if created {
            tracing::info!(
                remote_list_id = %remote_list.id,
                title = %remote_list.title,
                "created remote list"
            );
        }
        if config.remote_list_id.as_deref() != Some(remote_list.id.as_str()) {
            self.mappings
                .set_remote_list(db, account, list, &remote_list.id, &remote_list.title)?;
        }

        let locals = self.todos.get_items(db, account, list)?;
        let remotes = self
            .provider
            .list_tasks(token, &remote_list.id, true)
            .await
            .map_err(|e| abort(account, e))?;
        let mappings = self.mappings.for_list(db, account, list)?;

        let remote_by_id: HashMap<&str, &RemoteTask> =
            remotes.iter().map(|t| (t.id.as_str(), t)).collect();
        let mapping_by_local: HashMap<i64, &TaskMapping> =
            mappings.iter().map(|m| (m.local_item_id, m)).collect();
        let mapped_remote: HashSet<&str> = mappings
            .iter()
            .filter(|m| m.remote_list_id == remote_list.id)
            .map(|m| m.remote_item_id.as_str())
            .collect();
        let local_ids: HashSet<i64> = locals.iter().map(|i| i.id).collect();

        let pass = Pass {
            db,
            account,
            list,
            token,
            remote_list_id: &remote_list.id,
        };
        let mut result = SyncResult::default();

        for item in &locals {
            match mapping_by_local.get(&item.id) {
                Some(mapping) if mapping.remote_list_id != remote_list.id => {
                    tracing::debug!(
                        item_id = item.id,
                        "mapping points at another remote list, pushing afresh"
                    );
                    self.push_new(&pass, item, &mut result).await?;
                }
                Some(mapping) => match remote_by_id.get(mapping.remote_item_id.as_str()) {
                    Some(remote) => {
                        self.reconcile(&pass, item, remote, mapping, &mut result)
                            .await?
                    }
                    None => self.delete_local(&pass, item, &mut result),
                },
                None => self.push_new(&pass, item, &mut result).await?,
            }
        }

        for mapping in mappings.iter().filter(|m| !local_ids.contains(&m.local_item_id)) {
            self.delete_orphan(&pass, mapping, &mut result).await?;
        }

        for remote in remotes.iter().filter(|t| !mapped_remote.contains(t.id.as_str())) {
            self.pull_new(&pass, remote, &mut result);
        }

        Ok(result)
    }

    fn write_mapping(
        &self,
        pass: &Pass<'_>,
        local_item_id: i64,
        remote_item_id: &str,
        local_updated_at: DateTime<Utc>,
        remote_updated_at: Option<DateTime<Utc>>,
    ) -> Result<TaskMapping, DatabaseError> {
        self.mappings.upsert(
            pass.db,
            &MappingUpdate {
                local_item_id,
                remote_item_id,
                remote_list_id: pass.remote_list_id,
                account_id: pass.account,
                list_id: pass.list,
                local_updated_at,
                remote_updated_at,
                status: MappingStatus::Synced,
            },
        )
    }

    /// Create the remote counterpart of an unmapped local item.
    async fn push_new(
        &self,
        pass: &Pass<'_>,
        item: &TodoItem,
        result: &mut SyncResult,
    ) -> Result<(), SyncError> {
        let draft = draft_from_item(item);
        match self.provider.create_task(pass.token, pass.remote_list_id, &draft).await {
            Ok(task) => {
                match self.write_mapping(pass, item.id, &task.id, item.updated_at, task.updated) {
                    Ok(_) => result.pushed += 1,
                    Err(e) => result
                        .errors
                        .push(failure(SyncOp::Push, Some(item.id), Some(&task.id), e.to_string())),
                }
            }
            Err(e) => {
                let message = item_failure(pass.account, e)?;
                tracing::warn!(item_id = item.id, error = %message, "push failed");
                result
                    .errors
                    .push(failure(SyncOp::Push, Some(item.id), None, message));
            }
        }
        Ok(())
    }

    /// Resolve and apply one mapped pair.
    async fn reconcile(
        &self,
        pass: &Pass<'_>,
        item: &TodoItem,
        remote: &RemoteTask,
        mapping: &TaskMapping,
        result: &mut SyncResult,
    ) -> Result<(), SyncError> {
        let decision = conflict::resolve(
            item.updated_at,
            mapping.local_updated_at,
            remote.updated,
            mapping.remote_updated_at,
        );
        if decision.conflict {
            result.conflicts += 1;
            tracing::debug!(
                item_id = item.id,
                resolution = ?decision.resolution,
                "both sides changed"
            );
        }
        let failed_status = if decision.conflict {
            MappingStatus::Conflict
        } else {
            MappingStatus::Error
        };

        let outcome = match decision.resolution {
            Resolution::Noop => {
                if mapping.sync_status != MappingStatus::Synced {
                    let marked = self.mappings.set_status(pass.db, item.id, MappingStatus::Synced);
                    if let Err(e) = marked {
                        result.errors.push(failure(
                            SyncOp::Push,
                            Some(item.id),
                            Some(&remote.id),
                            e.to_string(),
                        ));
                    }
                }
                return Ok(());
            }
            Resolution::Push => {
                let draft = draft_from_item(item);
                match self
                    .provider
                    .update_task(pass.token, pass.remote_list_id, &remote.id, &draft)
                    .await
                {
                    Ok(task) => self
                        .write_mapping(pass, item.id, &task.id, item.updated_at, task.updated)
                        .map(|_| result.pushed += 1)
                        .map_err(|e| (SyncOp::Push, e.to_string())),
                    Err(e) if e.is_not_found() => {
                        tracing::debug!(item_id = item.id, "remote task vanished mid-pass");
                        return Ok(());
                    }
                    Err(e) => Err((SyncOp::Push, item_failure(pass.account, e)?)),
                }
            }
            Resolution::Pull => {
                let fields = fields_from_remote(remote);
                match self.todos.replace_from_remote(pass.db, item.id, &fields) {
                    Ok(updated) => self
                        .write_mapping(
                            pass,
                            item.id,
                            &remote.id,
                            updated.updated_at,
                            remote.updated,
                        )
                        .map(|_| result.pulled += 1)
                        .map_err(|e| (SyncOp::Pull, e.to_string())),
                    Err(e) => Err((SyncOp::Pull, e.to_string())),
                }
            }
        };

        if let Err((op, message)) = outcome {
            tracing::warn!(item_id = item.id, ?op, error = %message, "reconcile failed");
            if let Err(e) = self.mappings.set_status(pass.db, item.id, failed_status) {
                tracing::warn!(item_id = item.id, error = %e, "failed to mark mapping");
            }
            result
                .errors
                .push(failure(op, Some(item.id), Some(&remote.id), message));
        }
        Ok(())
    }

    /// The remote task is gone: drop the local item and its mapping.
    fn delete_local(&self, pass: &Pass<'_>, item: &TodoItem, result: &mut SyncResult) {
        let deleted = atomically(pass.db, || {
            self.todos.delete_from_remote(pass.db, item.id)?;
            self.mappings.delete_by_local(pass.db, item.id)
        });
        match deleted {
            Ok(_) => result.deleted_local += 1,
            Err(e) => result
                .errors
                .push(failure(SyncOp::DeleteLocal, Some(item.id), None, e.to_string())),
        }
    }

    /// The local item is gone but its mapping remained: finish the delete
    /// on the remote side.
    async fn delete_orphan(
        &self,
        pass: &Pass<'_>,
        mapping: &TaskMapping,
        result: &mut SyncResult,
    ) -> Result<(), SyncError> {
        let local = Some(mapping.local_item_id);
        let remote = Some(mapping.remote_item_id.as_str());
        match self
            .provider
            .delete_task(pass.token, &mapping.remote_list_id, &mapping.remote_item_id)
            .await
        {
            Ok(()) => match self.mappings.delete_by_local(pass.db, mapping.local_item_id) {
                Ok(_) => result.deleted_remote += 1,
                Err(e) => result
                    .errors
                    .push(failure(SyncOp::DeleteRemote, local, remote, e.to_string())),
            },
            Err(e) => {
                let message = item_failure(pass.account, e)?;
                result
                    .errors
                    .push(failure(SyncOp::DeleteRemote, local, remote, message));
            }
        }
        Ok(())
    }

    /// Create a local item for an unmapped remote task.
    fn pull_new(&self, pass: &Pass<'_>, remote: &RemoteTask, result: &mut SyncResult) {
        let fields = fields_from_remote(remote);
        let pulled = atomically(pass.db, || {
            let item = self
                .todos
                .create_from_remote(pass.db, pass.account, pass.list, &fields)?;
            self.write_mapping(pass, item.id, &remote.id, item.updated_at, remote.updated)
        });
        match pulled {
            Ok(_) => result.pulled += 1,
            Err(e) => result
                .errors
                .push(failure(SyncOp::Pull, None, Some(&remote.id), e.to_string())),
        }
    }

    /// Token and remote list for an incremental push, or `None` when sync
    /// is off for the list.
    async fn incremental_target(
        &self,
        db: &Database,
        account: &str,
        list: &str,
    ) -> Result<Option<Target>, SyncError> {
        let Some(config) = self.enabled_config(db, account, list)? else {
            return Ok(None);
        };
        let Some(token) = self.access_token(db, account).await? else {
            return Err(SyncError::AuthenticationRequired {
                account: account.to_string(),
            });
        };
        let remote_list_id = match config.remote_list_id {
            Some(id) => id,
            None => {
                let name = config
                    .remote_list_name
                    .as_deref()
                    .unwrap_or(&self.default_list_name);
                let (remote_list, _) = self
                    .provider
                    .get_or_create_task_list(&token, name)
                    .await
                    .map_err(|e| abort(account, e))?;
                self.mappings
                    .set_remote_list(db, account, list, &remote_list.id, &remote_list.title)?;
                remote_list.id
            }
        };
        Ok(Some(Target {
            token,
            remote_list_id,
        }))
    }

    /// Push the current state of `changed`. Holds the list's pass lock so a
    /// concurrent full sync can't create the same remote task.
    async fn push_item(
        &self,
        db: &Database,
        changed: &TodoItem,
        toggled: bool,
    ) -> Result<IncrementalOutcome, SyncError> {
        let lock = self.pass_lock(&changed.account_id, &changed.list_id);
        let _pass = lock.lock().await;

        let Some(item) = self.todos.get_item(db, changed.id)? else {
            return Ok(IncrementalOutcome::Skipped);
        };
        let Some(target) = self
            .incremental_target(db, &item.account_id, &item.list_id)
            .await?
        else {
            return Ok(IncrementalOutcome::Skipped);
        };

        let mapping = self
            .mappings
            .get_by_local(db, item.id)?
            .filter(|m| m.remote_list_id == target.remote_list_id);
        let token = target.token.as_str();
        let remote_list_id = target.remote_list_id.as_str();

        let pushed = match &mapping {
            None => {
                self.provider
                    .create_task(token, remote_list_id, &draft_from_item(&item))
                    .await
            }
            Some(m) if toggled && item.is_completed => {
                self.provider
                    .complete_task(token, remote_list_id, &m.remote_item_id)
                    .await
            }
            Some(m) => {
                self.provider
                    .update_task(token, remote_list_id, &m.remote_item_id, &draft_from_item(&item))
                    .await
            }
        };

        match pushed {
            Ok(task) => {
                self.mappings.upsert(
                    db,
                    &MappingUpdate {
                        local_item_id: item.id,
                        remote_item_id: &task.id,
                        remote_list_id,
                        account_id: &item.account_id,
                        list_id: &item.list_id,
                        local_updated_at: item.updated_at,
                        remote_updated_at: task.updated,
                        status: MappingStatus::Synced,
                    },
                )?;
                Ok(IncrementalOutcome::Pushed)
            }
            Err(e) if e.is_not_found() && mapping.is_some() => {
                tracing::debug!(
                    item_id = item.id,
                    "remote task already gone, next full sync reconciles"
                );
                Ok(IncrementalOutcome::Skipped)
            }
            Err(e) => {
                if mapping.is_some() {
                    self.mappings.set_status(db, item.id, MappingStatus::Pending)?;
                }
                Err(abort(&item.account_id, e))
            }
        }
    }

    async fn remove_item(
        &self,
        db: &Database,
        item: &TodoItem,
    ) -> Result<IncrementalOutcome, SyncError> {
        let lock = self.pass_lock(&item.account_id, &item.list_id);
        let _pass = lock.lock().await;

        let Some(mapping) = self.mappings.get_by_local(db, item.id)? else {
            return Ok(IncrementalOutcome::Skipped);
        };
        // Stays pending until the remote delete lands; full sync cleans up orphans.
        self.mappings.set_status(db, item.id, MappingStatus::Pending)?;

        let Some(target) = self
            .incremental_target(db, &item.account_id, &item.list_id)
            .await?
        else {
            return Ok(IncrementalOutcome::Skipped);
        };

        self.provider
            .delete_task(&target.token, &mapping.remote_list_id, &mapping.remote_item_id)
            .await
            .map_err(|e| abort(&item.account_id, e))?;
        self.mappings.delete_by_local(db, item.id)?;
        Ok(IncrementalOutcome::Removed)
    }

    fn settle(
        &self,
        db: &Database,
        item: &TodoItem,
        event: &str,
        outcome: Result<IncrementalOutcome, SyncError>,
    ) -> IncrementalOutcome {
        match outcome {
            Ok(outcome) => {
                tracing::debug!(item_id = item.id, event, ?outcome, "incremental sync");
                outcome
            }
            Err(SyncError::AuthenticationRequired { .. }) => {
                if let Err(e) = self.fail_auth(db, &item.account_id, &item.list_id) {
                    tracing::warn!(error = %e, "failed to record auth failure");
                }
                IncrementalOutcome::Failed("authentication required".into())
            }
            Err(e) => {
                tracing::warn!(item_id = item.id, event, error = %e, "incremental sync failed");
                IncrementalOutcome::Failed(e.to_string())
            }
        }
    }

    /// Push a newly created item.
    pub async fn on_item_created(&self, db: &Database, item: &TodoItem) -> IncrementalOutcome {
        let outcome = self.push_item(db, item, false).await;
        self.settle(db, item, "created", outcome)
    }

    /// Push an edited item, creating its remote counterpart if unmapped.
    pub async fn on_item_updated(&self, db: &Database, item: &TodoItem) -> IncrementalOutcome {
        let outcome = self.push_item(db, item, false).await;
        self.settle(db, item, "updated", outcome)
    }

    pub async fn on_item_toggled(&self, db: &Database, item: &TodoItem) -> IncrementalOutcome {
        let outcome = self.push_item(db, item, true).await;
        self.settle(db, item, "toggled", outcome)
    }

    /// Delete the remote counterpart of a deleted item. A failure leaves the
    /// mapping pending for the next full sync.
    pub async fn on_item_deleted(&self, db: &Database, item: &TodoItem) -> IncrementalOutcome {
        let outcome = self.remove_item(db, item).await;
        self.settle(db, item, "deleted", outcome)
    }

    /// Dispatch a local mutation event to its hook.
    pub async fn handle_event(&self, db: &Database, event: &TodoEvent) -> IncrementalOutcome {
        match event {
            TodoEvent::Created(item) => self.on_item_created(db, item).await,
            TodoEvent::Updated(item) => self.on_item_updated(db, item).await,
            TodoEvent::Toggled(item) => self.on_item_toggled(db, item).await,
            TodoEvent::Deleted(item) => self.on_item_deleted(db, item).await,
        }
    }

    /// Sync state of one list, `None` if sync was never set up for it.
    pub fn status(
        &self,
        db: &Database,
        account: &str,
        list: &str,
    ) -> Result<Option<SyncStatusReport>, DatabaseError> {
        let Some(config) = self.mappings.get_config(db, account, list)? else {
            return Ok(None);
        };
        let mapped_items = self.mappings.for_list(db, account, list)?.len();
        Ok(Some(SyncStatusReport {
            account_id: config.account_id,
            list_id: config.list_id,
            enabled: config.sync_tasks,
            remote_list_id: config.remote_list_id,
            remote_list_name: config.remote_list_name,
            last_sync_at: config.last_sync_at,
            last_sync_status: config.last_sync_status,
            last_sync_error: config.last_sync_error,
            mapped_items,
        }))
    }
}
