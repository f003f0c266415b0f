//! Database schema migrations for tasksync.
//!
//! Migrations are versioned and applied automatically when opening the database.
//! The `schema_version` table tracks the current migration version.

use rusqlite::{Connection, Result as SqliteResult};

/// Current schema version.
///
/// Increment this when adding new migrations.
pub const SCHEMA_VERSION: i32 = 2;

/// Apply all pending migrations to bring the database to the current schema version.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = get_schema_version(conn);

    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Get the current schema version from the database.
///
/// Returns 0 if no version is set (initial database).
fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    })
    .unwrap_or_else(|e| {
        if !matches!(e, rusqlite::Error::QueryReturnedNoRows) {
            tracing::warn!(error = %e, "failed to read schema_version, assuming 0");
        }
        0
    })
}

fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Migration v1: local todo items.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS todo_items (
            id             INTEGER PRIMARY KEY AUTOINCREMENT,
            account_id     TEXT NOT NULL,
            list_id        TEXT NOT NULL,
            text           TEXT NOT NULL,
            is_completed   INTEGER NOT NULL DEFAULT 0,
            priority       INTEGER NOT NULL DEFAULT 2,
            due_date       TEXT,
            parent_goal_id INTEGER,
            created_at     TEXT NOT NULL,
            updated_at     TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_todo_items_account_list ON todo_items(account_id, list_id);",
    )?;

    set_schema_version(&tx, 1)?;
    tx.commit()
}

/// Migration v2: credentials and sync bookkeeping.
///
/// `task_mappings.local_item_id` is UNIQUE: one mapping per local item.
/// There is deliberately no foreign key to `todo_items`; a mapping outlives
/// its local item until the remote side has been cleaned up.
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS credentials (
            account_id    TEXT PRIMARY KEY,
            access_token  TEXT NOT NULL,
            refresh_token TEXT,
            expires_at    TEXT,
            scopes        TEXT NOT NULL DEFAULT '',
            email         TEXT,
            enabled       INTEGER NOT NULL DEFAULT 1,
            created_at    TEXT NOT NULL,
            updated_at    TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS sync_configs (
            account_id       TEXT NOT NULL,
            list_id          TEXT NOT NULL,
            sync_tasks       INTEGER NOT NULL DEFAULT 0,
            sync_calendar    INTEGER NOT NULL DEFAULT 0,
            remote_list_id   TEXT,
            remote_list_name TEXT,
            last_sync_at     TEXT,
            last_sync_status TEXT,
            last_sync_error  TEXT,
            PRIMARY KEY (account_id, list_id)
        );

        CREATE TABLE IF NOT EXISTS task_mappings (
            id                INTEGER PRIMARY KEY AUTOINCREMENT,
            local_item_id     INTEGER NOT NULL UNIQUE,
            remote_item_id    TEXT NOT NULL,
            remote_list_id    TEXT NOT NULL,
            account_id        TEXT NOT NULL,
            list_id           TEXT NOT NULL,
            local_updated_at  TEXT NOT NULL,
            remote_updated_at TEXT,
            last_sync_at      TEXT NOT NULL,
            sync_status       TEXT NOT NULL DEFAULT 'synced'
        );

        CREATE INDEX IF NOT EXISTS idx_task_mappings_remote ON task_mappings(remote_list_id, remote_item_id);
        CREATE INDEX IF NOT EXISTS idx_task_mappings_account_list ON task_mappings(account_id, list_id);",
    )?;

    set_schema_version(&tx, 2)?;
    tx.commit()
}
