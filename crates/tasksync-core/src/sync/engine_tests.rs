//! Sync engine behaviour against the in-memory provider.

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, Utc};

    use super::super::engine::SyncEngine;
    use super::super::test_support::{credential_store, login, FakeProvider, ACCOUNT, LIST};
    use super::super::types::{IncrementalOutcome, SyncError, SyncOp, SyncOptions, SyncResult};
    use crate::credentials::TokenSet;
    use crate::mapping::{LastSyncStatus, MappingStatus, MappingStore, MappingUpdate, TaskMapping};
    use crate::storage::Database;
    use crate::todo::{event_channel, NewTodo, Priority, TodoItem, TodoPatch, TodoStore};

    const REMOTE_LIST: &str = "Todos";

    struct Harness {
        db: Database,
        engine: SyncEngine,
        remote: FakeProvider,
        todos: TodoStore,
        mappings: MappingStore,
    }

    fn harness() -> Harness {
        harness_with(FakeProvider::new())
    }

    fn harness_with(remote: FakeProvider) -> Harness {
        let db = Database::open_memory().unwrap();
        let credentials = credential_store();
        login(&credentials, &db, ACCOUNT);
        let engine = SyncEngine::new(Box::new(remote.clone()), credentials, REMOTE_LIST);
        Harness {
            db,
            engine,
            remote,
            todos: TodoStore::new(),
            mappings: MappingStore::new(),
        }
    }

    impl Harness {
        fn add(&self, text: &str, priority: Priority) -> TodoItem {
            self.todos
                .create_item(
                    &self.db,
                    NewTodo {
                        account_id: ACCOUNT.into(),
                        list_id: LIST.into(),
                        text: text.into(),
                        priority,
                        ..Default::default()
                    },
                )
                .unwrap()
        }

        fn enable(&self) {
            self.engine
                .enable_sync(&self.db, ACCOUNT, LIST, &SyncOptions::default())
                .unwrap();
        }

        async fn sync(&self) -> SyncResult {
            self.engine.full_sync(&self.db, ACCOUNT, LIST).await.unwrap()
        }

        fn remote_list(&self) -> String {
            self.remote.list_id(REMOTE_LIST).unwrap()
        }

        fn mapping(&self, item_id: i64) -> Option<TaskMapping> {
            self.mappings.get_by_local(&self.db, item_id).unwrap()
        }

        /// Pin both watermarks of an existing mapping to `at`.
        fn set_watermarks(&self, item_id: i64, at: DateTime<Utc>) {
            let m = self.mapping(item_id).unwrap();
            self.mappings
                .upsert(
                    &self.db,
                    &MappingUpdate {
                        local_item_id: item_id,
                        remote_item_id: &m.remote_item_id,
                        remote_list_id: &m.remote_list_id,
                        account_id: ACCOUNT,
                        list_id: LIST,
                        local_updated_at: at,
                        remote_updated_at: Some(at),
                        status: MappingStatus::Synced,
                    },
                )
                .unwrap();
        }

        fn sync_enabled(&self) -> bool {
            self.mappings
                .get_config(&self.db, ACCOUNT, LIST)
                .unwrap()
                .is_some_and(|c| c.sync_tasks)
        }

        fn local_count(&self) -> usize {
            self.todos.get_items(&self.db, ACCOUNT, LIST).unwrap().len()
        }

        fn last_status(&self) -> Option<LastSyncStatus> {
            self.mappings
                .get_config(&self.db, ACCOUNT, LIST)
                .unwrap()
                .and_then(|c| c.last_sync_status)
        }
    }

    #[tokio::test]
    async fn enable_then_sync_pushes_existing_item() {
        let h = harness();
        let item = h.add("Buy milk", Priority::High);
        assert_eq!(
            h.engine.on_item_created(&h.db, &item).await,
            IncrementalOutcome::Skipped
        );

        h.enable();
        let result = h.sync().await;
        assert_eq!(result.pushed, 1);

        let tasks = h.remote.tasks(&h.remote_list());
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "Buy milk");
        assert!(tasks[0].notes.as_deref().unwrap().contains("[HIGH]"));

        let mapping = h.mapping(item.id).unwrap();
        assert_eq!(mapping.sync_status, MappingStatus::Synced);
        assert_eq!(mapping.remote_item_id, tasks[0].id);
    }

    #[tokio::test]
    async fn second_sync_without_changes_does_nothing() {
        let h = harness();
        h.add("Buy milk", Priority::High);
        h.add("Call mom", Priority::Low);
        h.enable();
        assert_eq!(h.sync().await.pushed, 2);

        h.remote
            .insert_task(&h.remote_list(), "Water plants", None, Utc::now());
        let second = h.sync().await;
        assert_eq!((second.pushed, second.pulled), (0, 1));

        assert_eq!(h.sync().await, SyncResult::default());
        assert_eq!(h.todos.get_items(&h.db, ACCOUNT, LIST).unwrap().len(), 3);
    }

    #[tokio::test]
    async fn content_survives_round_trip_through_remote() {
        let first = harness();
        let item = first.add("Call mom", Priority::High);
        first.todos.toggle_item(&first.db, item.id).unwrap();
        first.enable();
        first.sync().await;

        let second = harness_with(first.remote.clone());
        second.enable();
        let result = second.sync().await;
        assert_eq!(result.pulled, 1);

        let items = second.todos.get_items(&second.db, ACCOUNT, LIST).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].text, "Call mom");
        assert_eq!(items[0].priority, Priority::High);
        assert!(items[0].is_completed);
    }

    #[tokio::test]
    async fn later_local_edit_wins_when_both_changed() {
        let h = harness();
        let item = h.add("Buy milk", Priority::Medium);
        h.enable();
        h.sync().await;
        let remote_id = h.mapping(item.id).unwrap().remote_item_id;

        let t0 = Utc::now() - Duration::hours(1);
        let t1 = t0 + Duration::seconds(20);
        let t2 = t0 + Duration::seconds(10);
        h.set_watermarks(item.id, t0);

        h.todos
            .update_item(
                &h.db,
                item.id,
                TodoPatch {
                    text: Some("Buy oat milk".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        h.todos.set_updated_at(&h.db, item.id, t1);
        h.remote.edit_task(&h.remote_list(), &remote_id, |t| {
            t.title = "Buy soy milk".into();
            t.updated = Some(t2);
        });

        let result = h.sync().await;
        assert_eq!((result.pushed, result.pulled, result.conflicts), (1, 0, 1));
        assert_eq!(h.remote.tasks(&h.remote_list())[0].title, "Buy oat milk");
        assert_eq!(h.mapping(item.id).unwrap().local_updated_at, t1);
    }

    #[tokio::test]
    async fn newer_remote_replaces_whole_local_record() {
        let h = harness();
        let item = h.add("Buy milk", Priority::Medium);
        h.enable();
        h.sync().await;
        let remote_id = h.mapping(item.id).unwrap().remote_item_id;

        let t90 = Utc::now() - Duration::hours(1);
        h.set_watermarks(item.id, t90);
        h.todos
            .update_item(
                &h.db,
                item.id,
                TodoPatch {
                    text: Some("Buy milk and eggs".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        h.todos
            .set_updated_at(&h.db, item.id, t90 + Duration::seconds(10));
        h.remote.edit_task(&h.remote_list(), &remote_id, |t| {
            t.completed = true;
            t.updated = Some(t90 + Duration::seconds(15));
        });

        let result = h.sync().await;
        assert_eq!((result.pushed, result.pulled, result.conflicts), (0, 1, 1));

        let local = h.todos.get_item(&h.db, item.id).unwrap().unwrap();
        assert!(local.is_completed);
        assert_eq!(local.text, "Buy milk");
        assert_eq!(h.mapping(item.id).unwrap().local_updated_at, local.updated_at);
    }

    #[tokio::test]
    async fn remote_deletion_removes_local_item() {
        let h = harness();
        let item = h.add("Buy milk", Priority::Medium);
        h.enable();
        h.sync().await;
        let remote_id = h.mapping(item.id).unwrap().remote_item_id;

        h.remote.remove_task(&h.remote_list(), &remote_id);
        let result = h.sync().await;

        assert_eq!(result.deleted_local, 1);
        assert!(h.todos.get_item(&h.db, item.id).unwrap().is_none());
        assert!(h.mapping(item.id).is_none());
    }

    #[tokio::test]
    async fn deleting_item_whose_remote_is_already_gone() {
        let h = harness();
        let item = h.add("Buy milk", Priority::Medium);
        h.enable();
        h.sync().await;
        let remote_id = h.mapping(item.id).unwrap().remote_item_id;
        h.remote.remove_task(&h.remote_list(), &remote_id);

        let deleted = h.todos.delete_item(&h.db, item.id).unwrap().unwrap();
        assert_eq!(
            h.engine.on_item_deleted(&h.db, &deleted).await,
            IncrementalOutcome::Removed
        );
        assert!(h.todos.get_item(&h.db, item.id).unwrap().is_none());
        assert!(h.mapping(item.id).is_none());
    }

    #[tokio::test]
    async fn rejected_credential_aborts_and_disables_sync() {
        let h = harness();
        h.add("Buy milk", Priority::Medium);
        h.enable();
        h.sync().await;
        h.add("Call mom", Priority::Medium);

        h.remote.set_unauthorized(true);
        let err = h.engine.full_sync(&h.db, ACCOUNT, LIST).await.unwrap_err();
        assert!(matches!(err, SyncError::AuthenticationRequired { .. }));

        let config = h.mappings.get_config(&h.db, ACCOUNT, LIST).unwrap().unwrap();
        assert!(!config.sync_tasks);
        assert_eq!(config.last_sync_status, Some(LastSyncStatus::Error));
        assert!(config.last_sync_error.is_some());

        let again = h.engine.full_sync(&h.db, ACCOUNT, LIST).await.unwrap_err();
        assert!(matches!(again, SyncError::NotEnabled { .. }));
    }

    #[tokio::test]
    async fn missing_credential_aborts() {
        let h = harness();
        h.engine
            .enable_sync(&h.db, "nobody", LIST, &SyncOptions::default())
            .unwrap();
        let err = h.engine.full_sync(&h.db, "nobody", LIST).await.unwrap_err();
        assert!(matches!(err, SyncError::AuthenticationRequired { .. }));
        assert_eq!(h.remote.creates(), 0);
    }

    #[tokio::test]
    async fn sync_requires_enable() {
        let h = harness();
        let err = h.engine.full_sync(&h.db, ACCOUNT, LIST).await.unwrap_err();
        assert!(matches!(err, SyncError::NotEnabled { .. }));
    }

    #[tokio::test]
    async fn one_failing_item_does_not_stop_the_pass() {
        let h = harness();
        h.add("Buy milk", Priority::Medium);
        let flaky = h.add("flaky", Priority::Medium);
        h.remote.fail_title("flaky");
        h.enable();

        let result = h.sync().await;
        assert_eq!(result.pushed, 1);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].op, SyncOp::Push);
        assert_eq!(result.errors[0].local_item_id, Some(flaky.id));
        assert_eq!(h.last_status(), Some(LastSyncStatus::Partial));
        let config = h.mappings.get_config(&h.db, ACCOUNT, LIST).unwrap().unwrap();
        assert!(config.last_sync_error.unwrap().contains("timed out"));

        h.remote.clear_failures();
        let retry = h.sync().await;
        assert_eq!(retry.pushed, 1);
        assert!(retry.errors.is_empty());
        assert_eq!(h.last_status(), Some(LastSyncStatus::Success));
    }

    #[tokio::test]
    async fn failed_incremental_delete_is_finished_by_full_sync() {
        let h = harness();
        let item = h.add("Buy milk", Priority::Medium);
        h.enable();
        h.sync().await;

        h.remote.fail_deletes();
        let deleted = h.todos.delete_item(&h.db, item.id).unwrap().unwrap();
        let outcome = h.engine.on_item_deleted(&h.db, &deleted).await;
        assert!(matches!(outcome, IncrementalOutcome::Failed(_)));
        assert!(h.todos.get_item(&h.db, item.id).unwrap().is_none());
        assert_eq!(h.mapping(item.id).unwrap().sync_status, MappingStatus::Pending);

        h.remote.clear_failures();
        let result = h.sync().await;
        assert_eq!(result.deleted_remote, 1);
        assert!(h.remote.tasks(&h.remote_list()).is_empty());
        assert!(h.mapping(item.id).is_none());
    }

    #[tokio::test]
    async fn incremental_hooks_follow_local_mutations() {
        let h = harness();
        h.enable();
        h.sync().await;

        let item = h.add("Buy milk", Priority::Medium);
        assert_eq!(h.engine.on_item_created(&h.db, &item).await, IncrementalOutcome::Pushed);
        assert_eq!(h.remote.tasks(&h.remote_list()).len(), 1);

        let edited = h
            .todos
            .update_item(
                &h.db,
                item.id,
                TodoPatch {
                    text: Some("Buy oat milk".into()),
                    priority: Some(Priority::Low),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(h.engine.on_item_updated(&h.db, &edited).await, IncrementalOutcome::Pushed);
        let task = &h.remote.tasks(&h.remote_list())[0];
        assert_eq!(task.title, "Buy oat milk");
        assert_eq!(task.notes.as_deref(), Some("[LOW]"));

        let toggled = h.todos.toggle_item(&h.db, item.id).unwrap();
        assert_eq!(h.engine.on_item_toggled(&h.db, &toggled).await, IncrementalOutcome::Pushed);
        assert!(h.remote.tasks(&h.remote_list())[0].completed);

        assert_eq!(h.sync().await, SyncResult::default());
    }

    #[tokio::test]
    async fn events_drive_incremental_sync() {
        let db = Database::open_memory().unwrap();
        let remote = FakeProvider::new();
        let credentials = credential_store();
        login(&credentials, &db, ACCOUNT);
        let engine = SyncEngine::new(Box::new(remote.clone()), credentials, REMOTE_LIST);
        engine
            .enable_sync(&db, ACCOUNT, LIST, &SyncOptions::default())
            .unwrap();

        let (tx, mut rx) = event_channel();
        let todos = TodoStore::with_events(tx);
        let item = todos
            .create_item(
                &db,
                NewTodo {
                    account_id: ACCOUNT.into(),
                    list_id: LIST.into(),
                    text: "Buy milk".into(),
                    ..Default::default()
                },
            )
            .unwrap();
        todos.delete_item(&db, item.id).unwrap();

        let mut outcomes = Vec::new();
        while let Ok(event) = rx.try_recv() {
            outcomes.push(engine.handle_event(&db, &event).await);
        }
        // The item is gone before its create event is handled.
        assert_eq!(outcomes, [IncrementalOutcome::Skipped, IncrementalOutcome::Skipped]);
        assert_eq!(remote.creates(), 0);
    }

    #[tokio::test]
    async fn update_of_unmapped_item_creates_it() {
        let h = harness();
        h.enable();
        let item = h.add("Buy milk", Priority::Medium);
        assert_eq!(h.engine.on_item_updated(&h.db, &item).await, IncrementalOutcome::Pushed);
        assert_eq!(h.remote.creates(), 1);
        assert!(h.mapping(item.id).is_some());
    }

    #[tokio::test]
    async fn concurrent_passes_for_one_list_do_not_double_push() {
        let h = harness();
        h.add("Buy milk", Priority::Medium);
        h.enable();

        let (a, b) = tokio::join!(
            h.engine.full_sync(&h.db, ACCOUNT, LIST),
            h.engine.full_sync(&h.db, ACCOUNT, LIST),
        );
        assert_eq!(a.unwrap().pushed + b.unwrap().pushed, 1);
        assert_eq!(h.remote.creates(), 1);
    }

    #[tokio::test]
    async fn unparsable_remote_timestamp_is_not_a_change() {
        let h = harness();
        let item = h.add("Buy milk", Priority::Medium);
        h.enable();
        h.sync().await;
        let remote_id = h.mapping(item.id).unwrap().remote_item_id;

        h.remote.edit_task(&h.remote_list(), &remote_id, |t| {
            t.title = "Changed elsewhere".into();
            t.updated = None;
        });
        assert_eq!(h.sync().await, SyncResult::default());
        let local = h.todos.get_item(&h.db, item.id).unwrap().unwrap();
        assert_eq!(local.text, "Buy milk");
    }

    #[tokio::test]
    async fn disable_forgets_mappings_and_can_delete_remote_list() {
        let h = harness();
        h.add("Buy milk", Priority::Medium);
        h.enable();
        h.sync().await;
        let remote_list = h.remote_list();

        assert!(h.engine.disable_sync(&h.db, ACCOUNT, LIST, true).await.unwrap());
        assert!(!h.remote.has_list(&remote_list));
        assert!(h.mappings.for_list(&h.db, ACCOUNT, LIST).unwrap().is_empty());
        let status = h.engine.status(&h.db, ACCOUNT, LIST).unwrap().unwrap();
        assert!(!status.enabled);

        assert!(!h.engine.disable_sync(&h.db, ACCOUNT, "other", false).await.unwrap());
    }

    #[tokio::test]
    async fn switching_remote_list_pushes_afresh() {
        let h = harness();
        h.add("Buy milk", Priority::Medium);
        h.enable();
        h.sync().await;

        let options = SyncOptions {
            remote_list_name: Some("Work".into()),
            ..Default::default()
        };
        h.engine.enable_sync(&h.db, ACCOUNT, LIST, &options).unwrap();
        assert!(h.mappings.for_list(&h.db, ACCOUNT, LIST).unwrap().is_empty());

        let result = h.sync().await;
        assert_eq!(result.pushed, 1);
        let work = h.remote.list_id("Work").unwrap();
        assert_eq!(h.remote.tasks(&work).len(), 1);
    }

    #[tokio::test]
    async fn status_reports_last_pass() {
        let h = harness();
        assert!(h.engine.status(&h.db, ACCOUNT, LIST).unwrap().is_none());

        h.add("Buy milk", Priority::Medium);
        h.enable();
        h.sync().await;

        let status = h.engine.status(&h.db, ACCOUNT, LIST).unwrap().unwrap();
        assert!(status.enabled);
        assert_eq!(status.last_sync_status, Some(LastSyncStatus::Success));
        assert_eq!(status.remote_list_name.as_deref(), Some(REMOTE_LIST));
        assert_eq!(status.mapped_items, 1);
        assert!(status.last_sync_at.is_some());
    }

    #[tokio::test]
    async fn unreachable_token_endpoint_keeps_sync_enabled() {
        let h = harness();
        h.add("Buy milk", Priority::Medium);
        h.enable();
        let expired = TokenSet {
            access_token: "stale".into(),
            refresh_token: Some("rt".into()),
            expires_at: Some(Utc::now() - Duration::minutes(10)),
            scopes: vec!["tasks".into()],
        };
        h.engine
            .credentials()
            .store(&h.db, ACCOUNT, &expired, None)
            .unwrap();

        let err = h.engine.full_sync(&h.db, ACCOUNT, LIST).await.unwrap_err();
        assert!(matches!(err, SyncError::CredentialUnavailable { .. }));
        assert!(h.sync_enabled());
        assert_eq!(h.last_status(), Some(LastSyncStatus::Error));
        let credential = h.engine.credentials().get(&h.db, ACCOUNT).unwrap().unwrap();
        assert!(credential.enabled);
        assert_eq!(h.remote.creates(), 0);

        let item = h.add("Call mom", Priority::Medium);
        let outcome = h.engine.on_item_created(&h.db, &item).await;
        assert!(matches!(outcome, IncrementalOutcome::Failed(_)));
        assert!(h.sync_enabled());
    }

    #[tokio::test]
    async fn hook_racing_full_sync_creates_one_remote_task() {
        let h = harness();
        h.enable();
        h.sync().await;
        let item = h.add("Buy milk", Priority::Medium);

        let (pass, outcome) = tokio::join!(
            h.engine.full_sync(&h.db, ACCOUNT, LIST),
            h.engine.on_item_created(&h.db, &item),
        );
        pass.unwrap();
        assert_eq!(outcome, IncrementalOutcome::Pushed);
        assert_eq!(h.remote.creates(), 1);
        assert_eq!(h.remote.tasks(&h.remote_list()).len(), 1);

        let after = h.sync().await;
        assert_eq!(after.pulled, 0);
        assert_eq!(after.pushed, 0);
        assert_eq!(h.local_count(), 1);
    }

    #[tokio::test]
    async fn unauthorized_create_aborts_pass() {
        let h = harness();
        h.add("Buy milk", Priority::Medium);
        h.add("Call mom", Priority::Medium);
        h.enable();
        h.remote.reject_item_writes();

        let err = h.engine.full_sync(&h.db, ACCOUNT, LIST).await.unwrap_err();
        assert!(matches!(err, SyncError::AuthenticationRequired { .. }));
        assert_eq!(h.remote.item_calls(), 1);
        assert!(h.mappings.for_list(&h.db, ACCOUNT, LIST).unwrap().is_empty());
        assert!(!h.sync_enabled());
        assert_eq!(h.last_status(), Some(LastSyncStatus::Error));
    }

    #[tokio::test]
    async fn unauthorized_update_aborts_pass() {
        let h = harness();
        let first = h.add("Buy milk", Priority::Medium);
        let second = h.add("Call mom", Priority::Medium);
        h.enable();
        h.sync().await;

        for (id, text) in [(first.id, "Buy oat milk"), (second.id, "Call dad")] {
            h.todos
                .update_item(
                    &h.db,
                    id,
                    TodoPatch {
                        text: Some(text.into()),
                        ..Default::default()
                    },
                )
                .unwrap();
        }
        h.remote.reject_item_writes();
        let calls = h.remote.item_calls();

        let err = h.engine.full_sync(&h.db, ACCOUNT, LIST).await.unwrap_err();
        assert!(matches!(err, SyncError::AuthenticationRequired { .. }));
        assert_eq!(h.remote.item_calls(), calls + 1);
        let titles: Vec<String> = h
            .remote
            .tasks(&h.remote_list())
            .into_iter()
            .map(|t| t.title)
            .collect();
        assert_eq!(titles, ["Buy milk", "Call mom"]);
        assert!(!h.sync_enabled());
        assert_eq!(h.last_status(), Some(LastSyncStatus::Error));
    }

    #[tokio::test]
    async fn unauthorized_orphan_delete_aborts_pass() {
        let h = harness();
        let first = h.add("Buy milk", Priority::Medium);
        let second = h.add("Call mom", Priority::Medium);
        h.enable();
        h.sync().await;

        h.todos.delete_item(&h.db, first.id).unwrap();
        h.todos.delete_item(&h.db, second.id).unwrap();
        h.remote.reject_item_writes();
        let calls = h.remote.item_calls();

        let err = h.engine.full_sync(&h.db, ACCOUNT, LIST).await.unwrap_err();
        assert!(matches!(err, SyncError::AuthenticationRequired { .. }));
        assert_eq!(h.remote.item_calls(), calls + 1);
        assert_eq!(h.mappings.for_list(&h.db, ACCOUNT, LIST).unwrap().len(), 2);
        assert_eq!(h.remote.tasks(&h.remote_list()).len(), 2);
        assert!(!h.sync_enabled());
        assert_eq!(h.last_status(), Some(LastSyncStatus::Error));
    }

    #[tokio::test]
    async fn failed_pull_leaves_no_local_item() {
        let h = harness();
        h.enable();
        h.sync().await;
        let remote_id = h
            .remote
            .insert_task(&h.remote_list(), "From phone", None, Utc::now());
        h.db.conn()
            .execute_batch(&format!(
                "CREATE TRIGGER reject_mapping BEFORE INSERT ON task_mappings
                 WHEN NEW.remote_item_id = '{remote_id}'
                 BEGIN SELECT RAISE(ABORT, 'mapping rejected'); END;"
            ))
            .unwrap();

        let result = h.sync().await;
        assert_eq!(result.pulled, 0);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].op, SyncOp::Pull);
        assert_eq!(h.local_count(), 0);

        h.db.conn().execute_batch("DROP TRIGGER reject_mapping").unwrap();
        let retry = h.sync().await;
        assert_eq!(retry.pulled, 1);
        assert_eq!(retry.pushed, 0);
        assert_eq!(h.local_count(), 1);
        assert_eq!(h.remote.creates(), 0);
        assert_eq!(h.remote.tasks(&h.remote_list()).len(), 1);
    }

    #[tokio::test]
    async fn failed_remote_deletion_keeps_local_item() {
        let h = harness();
        let item = h.add("Buy milk", Priority::Medium);
        h.enable();
        h.sync().await;
        let remote_id = h.mapping(item.id).unwrap().remote_item_id;
        h.remote.remove_task(&h.remote_list(), &remote_id);
        h.db.conn()
            .execute_batch(
                "CREATE TRIGGER keep_mapping BEFORE DELETE ON task_mappings
                 BEGIN SELECT RAISE(ABORT, 'mapping pinned'); END;",
            )
            .unwrap();

        let result = h.sync().await;
        assert_eq!(result.deleted_local, 0);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].op, SyncOp::DeleteLocal);
        assert!(h.todos.get_item(&h.db, item.id).unwrap().is_some());
        assert!(h.mapping(item.id).is_some());

        h.db.conn().execute_batch("DROP TRIGGER keep_mapping").unwrap();
        let retry = h.sync().await;
        assert_eq!(retry.deleted_local, 1);
        assert!(h.todos.get_item(&h.db, item.id).unwrap().is_none());
        assert!(h.mapping(item.id).is_none());
    }
}
