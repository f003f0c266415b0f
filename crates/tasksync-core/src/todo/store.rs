//! SQLite-backed CRUD for local todo items.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::events::{TodoEvent, TodoEventSender};
use super::{Priority, TodoItem};
use crate::error::{CoreError, DatabaseError, ValidationError};
use crate::storage::database::{opt_ts_from_sql, ts_from_sql, ts_to_sql};
use crate::storage::Database;

const ITEM_COLUMNS: &str = "id, account_id, list_id, text, is_completed, priority, due_date,
     parent_goal_id, created_at, updated_at";

/// Input for [`TodoStore::create_item`].
#[derive(Debug, Clone, Default)]
pub struct NewTodo {
    pub account_id: String,
    pub list_id: String,
    pub text: String,
    pub priority: Priority,
    pub due_date: Option<DateTime<Utc>>,
    pub parent_goal_id: Option<i64>,
}

/// Partial update for [`TodoStore::update_item`]. `None` leaves a field alone.
#[derive(Debug, Clone, Default)]
pub struct TodoPatch {
    pub text: Option<String>,
    pub is_completed: Option<bool>,
    pub priority: Option<Priority>,
    pub due_date: Option<Option<DateTime<Utc>>>,
}

/// The synced content of an item, written as a whole when pulling from remote.
#[derive(Debug, Clone, PartialEq)]
pub struct TodoFields {
    pub text: String,
    pub is_completed: bool,
    pub priority: Priority,
    pub due_date: Option<DateTime<Utc>>,
}

/// Local todo CRUD.
///
/// User-facing mutations publish a [`TodoEvent`] after the write commits.
/// The `*_from_remote` writes used by sync never publish, so a pull can't
/// echo back as a push.
#[derive(Debug, Clone, Default)]
pub struct TodoStore {
    events: Option<TodoEventSender>,
}

fn row_to_item(row: &Row<'_>) -> rusqlite::Result<TodoItem> {
    Ok(TodoItem {
        id: row.get(0)?,
        account_id: row.get(1)?,
        list_id: row.get(2)?,
        text: row.get(3)?,
        is_completed: row.get::<_, i64>(4)? != 0,
        priority: Priority::from_i64(row.get(5)?),
        due_date: opt_ts_from_sql(6, row.get(6)?)?,
        parent_goal_id: row.get(7)?,
        created_at: ts_from_sql(8, &row.get::<_, String>(8)?)?,
        updated_at: ts_from_sql(9, &row.get::<_, String>(9)?)?,
    })
}

fn not_found(id: i64) -> CoreError {
    ValidationError::NotFound {
        entity: "todo item".into(),
        id: id.to_string(),
    }
    .into()
}

impl TodoStore {
    /// A store that publishes nothing.
    pub fn new() -> Self {
        Self { events: None }
    }

    /// A store that publishes every user mutation on `sender`.
    pub fn with_events(sender: TodoEventSender) -> Self {
        Self {
            events: Some(sender),
        }
    }

    fn publish(&self, event: TodoEvent) {
        if let Some(tx) = &self.events {
            // A dropped receiver means nobody is syncing; the write stands.
            if tx.send(event).is_err() {
                tracing::debug!("todo event dropped: no subscriber");
            }
        }
    }

    /// All items of one list, oldest first.
    pub fn get_items(
        &self,
        db: &Database,
        account_id: &str,
        list_id: &str,
    ) -> Result<Vec<TodoItem>, DatabaseError> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM todo_items
             WHERE account_id = ?1 AND list_id = ?2
             ORDER BY id"
        );
        let mut stmt = db.conn().prepare(&sql)?;
        let items = stmt
            .query_map(params![account_id, list_id], row_to_item)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(items)
    }

    pub fn get_item(&self, db: &Database, id: i64) -> Result<Option<TodoItem>, DatabaseError> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM todo_items WHERE id = ?1");
        let item = db
            .conn()
            .query_row(&sql, params![id], row_to_item)
            .optional()?;
        Ok(item)
    }

    /// Create an item and publish [`TodoEvent::Created`].
    pub fn create_item(&self, db: &Database, new: NewTodo) -> Result<TodoItem, CoreError> {
        if new.text.trim().is_empty() {
            return Err(ValidationError::Empty("text".into()).into());
        }
        let item = self.insert(
            db,
            &new.account_id,
            &new.list_id,
            &TodoFields {
                text: new.text,
                is_completed: false,
                priority: new.priority,
                due_date: new.due_date,
            },
            new.parent_goal_id,
        )?;
        self.publish(TodoEvent::Created(item.clone()));
        Ok(item)
    }

    /// Apply a partial update and publish [`TodoEvent::Updated`].
    pub fn update_item(
        &self,
        db: &Database,
        id: i64,
        patch: TodoPatch,
    ) -> Result<TodoItem, CoreError> {
        let current = self.get_item(db, id)?.ok_or_else(|| not_found(id))?;
        if let Some(text) = &patch.text {
            if text.trim().is_empty() {
                return Err(ValidationError::Empty("text".into()).into());
            }
        }
        let fields = TodoFields {
            text: patch.text.unwrap_or(current.text),
            is_completed: patch.is_completed.unwrap_or(current.is_completed),
            priority: patch.priority.unwrap_or(current.priority),
            due_date: patch.due_date.unwrap_or(current.due_date),
        };
        let item = self.write_fields(db, id, &fields)?;
        self.publish(TodoEvent::Updated(item.clone()));
        Ok(item)
    }

    /// Flip `is_completed` and publish [`TodoEvent::Toggled`].
    pub fn toggle_item(&self, db: &Database, id: i64) -> Result<TodoItem, CoreError> {
        let current = self.get_item(db, id)?.ok_or_else(|| not_found(id))?;
        let fields = TodoFields {
            is_completed: !current.is_completed,
            text: current.text,
            priority: current.priority,
            due_date: current.due_date,
        };
        let item = self.write_fields(db, id, &fields)?;
        self.publish(TodoEvent::Toggled(item.clone()));
        Ok(item)
    }

    /// Delete an item and publish [`TodoEvent::Deleted`] with its last state.
    ///
    /// Returns `None` if the item did not exist.
    pub fn delete_item(&self, db: &Database, id: i64) -> Result<Option<TodoItem>, DatabaseError> {
        let Some(item) = self.get_item(db, id)? else {
            return Ok(None);
        };
        db.conn()
            .execute("DELETE FROM todo_items WHERE id = ?1", params![id])?;
        self.publish(TodoEvent::Deleted(item.clone()));
        Ok(Some(item))
    }

    /// Insert an item pulled from remote. Publishes nothing.
    pub fn create_from_remote(
        &self,
        db: &Database,
        account_id: &str,
        list_id: &str,
        fields: &TodoFields,
    ) -> Result<TodoItem, DatabaseError> {
        self.insert(db, account_id, list_id, fields, None)
    }

    /// Replace an item's synced fields with remote content. Publishes nothing.
    pub fn replace_from_remote(
        &self,
        db: &Database,
        id: i64,
        fields: &TodoFields,
    ) -> Result<TodoItem, DatabaseError> {
        self.write_fields(db, id, fields)
    }

    /// Delete an item whose remote counterpart is gone. Publishes nothing.
    pub fn delete_from_remote(&self, db: &Database, id: i64) -> Result<bool, DatabaseError> {
        let n = db
            .conn()
            .execute("DELETE FROM todo_items WHERE id = ?1", params![id])?;
        Ok(n > 0)
    }

    fn insert(
        &self,
        db: &Database,
        account_id: &str,
        list_id: &str,
        fields: &TodoFields,
        parent_goal_id: Option<i64>,
    ) -> Result<TodoItem, DatabaseError> {
        let now = ts_to_sql(&Utc::now());
        db.conn().execute(
            "INSERT INTO todo_items
                (account_id, list_id, text, is_completed, priority, due_date, parent_goal_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
            params![
                account_id,
                list_id,
                fields.text,
                fields.is_completed as i64,
                fields.priority.as_i64(),
                fields.due_date.as_ref().map(ts_to_sql),
                parent_goal_id,
                now,
            ],
        )?;
        let id = db.conn().last_insert_rowid();
        self.get_item(db, id)?
            .ok_or_else(|| {
                DatabaseError::QueryFailed(format!("todo item {id} vanished after insert"))
            })
    }

    fn write_fields(
        &self,
        db: &Database,
        id: i64,
        fields: &TodoFields,
    ) -> Result<TodoItem, DatabaseError> {
        let changed = db.conn().execute(
            "UPDATE todo_items
             SET text = ?1, is_completed = ?2, priority = ?3, due_date = ?4, updated_at = ?5
             WHERE id = ?6",
            params![
                fields.text,
                fields.is_completed as i64,
                fields.priority.as_i64(),
                fields.due_date.as_ref().map(ts_to_sql),
                ts_to_sql(&Utc::now()),
                id,
            ],
        )?;
        if changed == 0 {
            return Err(DatabaseError::QueryFailed(format!("todo item {id} not found")));
        }
        self.get_item(db, id)?
            .ok_or_else(|| DatabaseError::QueryFailed(format!("todo item {id} not found")))
    }

    /// Force `updated_at` to a fixed instant, for time-sensitive tests.
    #[cfg(test)]
    pub(crate) fn set_updated_at(&self, db: &Database, id: i64, at: DateTime<Utc>) {
        db.conn()
            .execute(
                "UPDATE todo_items SET updated_at = ?1 WHERE id = ?2",
                params![ts_to_sql(&at), id],
            )
            .unwrap();
    }
}
