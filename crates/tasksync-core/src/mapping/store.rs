//! SQLite persistence for task mappings and per-list sync configuration.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::{LastSyncStatus, MappingStatus, SyncConfig, TaskMapping};
use crate::error::DatabaseError;
use crate::storage::database::{opt_ts_from_sql, ts_from_sql, ts_to_sql};
use crate::storage::Database;

/// Longest `last_sync_error` kept, in characters.
pub const MAX_SYNC_ERROR_CHARS: usize = 500;

const MAPPING_COLUMNS: &str = "id, local_item_id, remote_item_id, remote_list_id, account_id, list_id,
     local_updated_at, remote_updated_at, last_sync_at, sync_status";
const CONFIG_COLUMNS: &str = "account_id, list_id, sync_tasks, sync_calendar, remote_list_id,
     remote_list_name, last_sync_at, last_sync_status, last_sync_error";

/// Everything needed to write a mapping after a reconciled push or pull.
#[derive(Debug, Clone)]
pub struct MappingUpdate<'a> {
    pub local_item_id: i64,
    pub remote_item_id: &'a str,
    pub remote_list_id: &'a str,
    pub account_id: &'a str,
    pub list_id: &'a str,
    pub local_updated_at: DateTime<Utc>,
    pub remote_updated_at: Option<DateTime<Utc>>,
    pub status: MappingStatus,
}

fn row_to_mapping(row: &Row<'_>) -> rusqlite::Result<TaskMapping> {
    let status: String = row.get(9)?;
    Ok(TaskMapping {
        id: row.get(0)?,
        local_item_id: row.get(1)?,
        remote_item_id: row.get(2)?,
        remote_list_id: row.get(3)?,
        account_id: row.get(4)?,
        list_id: row.get(5)?,
        local_updated_at: ts_from_sql(6, &row.get::<_, String>(6)?)?,
        remote_updated_at: opt_ts_from_sql(7, row.get(7)?)?,
        last_sync_at: ts_from_sql(8, &row.get::<_, String>(8)?)?,
        sync_status: MappingStatus::parse(&status),
    })
}

fn row_to_config(row: &Row<'_>) -> rusqlite::Result<SyncConfig> {
    let status: Option<String> = row.get(7)?;
    Ok(SyncConfig {
        account_id: row.get(0)?,
        list_id: row.get(1)?,
        sync_tasks: row.get::<_, i64>(2)? != 0,
        sync_calendar: row.get::<_, i64>(3)? != 0,
        remote_list_id: row.get(4)?,
        remote_list_name: row.get(5)?,
        last_sync_at: opt_ts_from_sql(6, row.get(6)?)?,
        last_sync_status: status.as_deref().and_then(LastSyncStatus::parse),
        last_sync_error: row.get(8)?,
    })
}

/// Cut `msg` to at most [`MAX_SYNC_ERROR_CHARS`] characters.
pub fn truncate_error(msg: &str) -> String {
    match msg.char_indices().nth(MAX_SYNC_ERROR_CHARS) {
        Some((byte_idx, _)) => msg[..byte_idx].to_string(),
        None => msg.to_string(),
    }
}

/// Sole owner of `task_mappings` and `sync_configs` rows.
#[derive(Debug, Clone, Copy, Default)]
pub struct MappingStore;

impl MappingStore {
    pub fn new() -> Self {
        Self
    }

    pub fn get_by_local(
        &self,
        db: &Database,
        local_item_id: i64,
    ) -> Result<Option<TaskMapping>, DatabaseError> {
        let sql = format!("SELECT {MAPPING_COLUMNS} FROM task_mappings WHERE local_item_id = ?1");
        let mapping = db
            .conn()
            .query_row(&sql, params![local_item_id], row_to_mapping)
            .optional()?;
        Ok(mapping)
    }

    pub fn get_by_remote(
        &self,
        db: &Database,
        remote_list_id: &str,
        remote_item_id: &str,
    ) -> Result<Option<TaskMapping>, DatabaseError> {
        let sql = format!(
            "SELECT {MAPPING_COLUMNS} FROM task_mappings
             WHERE remote_list_id = ?1 AND remote_item_id = ?2"
        );
        let mapping = db
            .conn()
            .query_row(&sql, params![remote_list_id, remote_item_id], row_to_mapping)
            .optional()?;
        Ok(mapping)
    }

    /// All mappings of one local list.
    pub fn for_list(
        &self,
        db: &Database,
        account_id: &str,
        list_id: &str,
    ) -> Result<Vec<TaskMapping>, DatabaseError> {
        let sql = format!(
            "SELECT {MAPPING_COLUMNS} FROM task_mappings
             WHERE account_id = ?1 AND list_id = ?2
             ORDER BY id"
        );
        let mut stmt = db.conn().prepare(&sql)?;
        let rows = stmt.query_map(params![account_id, list_id], row_to_mapping)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Create or overwrite the mapping for `update.local_item_id`.
    /// `last_sync_at` is stamped now.
    pub fn upsert(
        &self,
        db: &Database,
        update: &MappingUpdate<'_>,
    ) -> Result<TaskMapping, DatabaseError> {
        db.conn().execute(
            "INSERT INTO task_mappings
                (local_item_id, remote_item_id, remote_list_id, account_id, list_id,
                 local_updated_at, remote_updated_at, last_sync_at, sync_status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(local_item_id) DO UPDATE SET
                remote_item_id = excluded.remote_item_id,
                remote_list_id = excluded.remote_list_id,
                account_id = excluded.account_id,
                list_id = excluded.list_id,
                local_updated_at = excluded.local_updated_at,
                remote_updated_at = excluded.remote_updated_at,
                last_sync_at = excluded.last_sync_at,
                sync_status = excluded.sync_status",
            params![
                update.local_item_id,
                update.remote_item_id,
                update.remote_list_id,
                update.account_id,
                update.list_id,
                ts_to_sql(&update.local_updated_at),
                update.remote_updated_at.as_ref().map(ts_to_sql),
                ts_to_sql(&Utc::now()),
                update.status.as_str(),
            ],
        )?;
        self.get_by_local(db, update.local_item_id)?.ok_or_else(|| {
            DatabaseError::QueryFailed(format!(
                "mapping for item {} vanished after write",
                update.local_item_id
            ))
        })
    }

    /// Change only the status of a mapping. Watermarks stay where they were.
    pub fn set_status(
        &self,
        db: &Database,
        local_item_id: i64,
        status: MappingStatus,
    ) -> Result<(), DatabaseError> {
        db.conn().execute(
            "UPDATE task_mappings SET sync_status = ?1 WHERE local_item_id = ?2",
            params![status.as_str(), local_item_id],
        )?;
        Ok(())
    }

    pub fn delete_by_local(
        &self,
        db: &Database,
        local_item_id: i64,
    ) -> Result<bool, DatabaseError> {
        let n = db.conn().execute(
            "DELETE FROM task_mappings WHERE local_item_id = ?1",
            params![local_item_id],
        )?;
        Ok(n > 0)
    }

    /// Remove every mapping of one local list. Returns how many were removed.
    pub fn delete_for_list(
        &self,
        db: &Database,
        account_id: &str,
        list_id: &str,
    ) -> Result<usize, DatabaseError> {
        let n = db.conn().execute(
            "DELETE FROM task_mappings WHERE account_id = ?1 AND list_id = ?2",
            params![account_id, list_id],
        )?;
        Ok(n)
    }

    pub fn get_config(
        &self,
        db: &Database,
        account_id: &str,
        list_id: &str,
    ) -> Result<Option<SyncConfig>, DatabaseError> {
        let sql = format!(
            "SELECT {CONFIG_COLUMNS} FROM sync_configs WHERE account_id = ?1 AND list_id = ?2"
        );
        let config = db
            .conn()
            .query_row(&sql, params![account_id, list_id], row_to_config)
            .optional()?;
        Ok(config)
    }

    /// Turn task sync on for a list, targeting the remote list called
    /// `remote_list_name`. A changed name forgets the resolved remote id.
    pub fn enable_tasks(
        &self,
        db: &Database,
        account_id: &str,
        list_id: &str,
        remote_list_name: &str,
        sync_calendar: bool,
    ) -> Result<SyncConfig, DatabaseError> {
        db.conn().execute(
            "INSERT INTO sync_configs (account_id, list_id, sync_tasks, sync_calendar, remote_list_name)
             VALUES (?1, ?2, 1, ?3, ?4)
             ON CONFLICT(account_id, list_id) DO UPDATE SET
                sync_tasks = 1,
                sync_calendar = excluded.sync_calendar,
                remote_list_id = CASE
                    WHEN sync_configs.remote_list_name IS excluded.remote_list_name
                    THEN sync_configs.remote_list_id
                    ELSE NULL
                END,
                remote_list_name = excluded.remote_list_name",
            params![account_id, list_id, sync_calendar as i64, remote_list_name],
        )?;
        self.require_config(db, account_id, list_id)
    }

    /// Persist the resolved remote list.
    pub fn set_remote_list(
        &self,
        db: &Database,
        account_id: &str,
        list_id: &str,
        remote_list_id: &str,
        remote_list_name: &str,
    ) -> Result<(), DatabaseError> {
        db.conn().execute(
            "UPDATE sync_configs SET remote_list_id = ?3, remote_list_name = ?4
             WHERE account_id = ?1 AND list_id = ?2",
            params![account_id, list_id, remote_list_id, remote_list_name],
        )?;
        Ok(())
    }

    /// Clear only the task-sync flag. Used when the credential is rejected.
    pub fn pause_tasks(
        &self,
        db: &Database,
        account_id: &str,
        list_id: &str,
    ) -> Result<(), DatabaseError> {
        db.conn().execute(
            "UPDATE sync_configs SET sync_tasks = 0 WHERE account_id = ?1 AND list_id = ?2",
            params![account_id, list_id],
        )?;
        Ok(())
    }

    /// Clear both sync flags and the resolved remote list. Returns whether a
    /// config existed.
    pub fn disable(
        &self,
        db: &Database,
        account_id: &str,
        list_id: &str,
    ) -> Result<bool, DatabaseError> {
        let n = db.conn().execute(
            "UPDATE sync_configs SET sync_tasks = 0, sync_calendar = 0, remote_list_id = NULL
             WHERE account_id = ?1 AND list_id = ?2",
            params![account_id, list_id],
        )?;
        Ok(n > 0)
    }

    /// Record the outcome of a pass. `error` is truncated before storing.
    pub fn record_result(
        &self,
        db: &Database,
        account_id: &str,
        list_id: &str,
        status: LastSyncStatus,
        error: Option<&str>,
    ) -> Result<(), DatabaseError> {
        db.conn().execute(
            "UPDATE sync_configs
             SET last_sync_at = ?3, last_sync_status = ?4, last_sync_error = ?5
             WHERE account_id = ?1 AND list_id = ?2",
            params![
                account_id,
                list_id,
                ts_to_sql(&Utc::now()),
                status.as_str(),
                error.map(truncate_error),
            ],
        )?;
        Ok(())
    }

    fn require_config(
        &self,
        db: &Database,
        account_id: &str,
        list_id: &str,
    ) -> Result<SyncConfig, DatabaseError> {
        self.get_config(db, account_id, list_id)?.ok_or_else(|| {
            DatabaseError::QueryFailed(format!(
                "sync config {account_id}/{list_id} vanished after write"
            ))
        })
    }
}
