//! SQLite persistence for archived snapshots.
//!
//! # Storage layout
//!
//! | column           | type    | description                         |
//! |------------------|---------|-------------------------------------|
//! | id               | TEXT    | snapshot id (primary key)           |
//! | position         | INTEGER | archive order, oldest first         |
//! | created_at       | TEXT    | RFC-3339 creation time (UTC)        |
//! | last_accessed_at | TEXT    | RFC-3339 last access time (UTC)     |
//! | access_count     | INTEGER | number of reads                     |
//! | parent_id        | TEXT    | active snapshot at creation, if any |
//! | metric           | REAL    | optional quality metric             |
//! | state            | TEXT    | JSON-encoded state                  |
//!
//! A `vault_meta` key/value table holds the archive's active snapshot id
//! under the key `active`.

use crate::archive::Snapshot;
use chrono::{DateTime, Utc};
use engram_types::Item;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

// ─────────────────────────────────────────────────────────────────────────────
// Error type
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum VaultError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Corrupt row for snapshot '{id}': {reason}")]
    Corrupt { id: String, reason: String },
}

// ─────────────────────────────────────────────────────────────────────────────
// SnapshotVault
// ─────────────────────────────────────────────────────────────────────────────

pub struct SnapshotVault {
    conn: Connection,
}

impl SnapshotVault {
    /// Open (or create) a persistent database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, VaultError> {
        let conn = Connection::open(path)?;
        let vault = Self { conn };
        vault.init_schema()?;
        Ok(vault)
    }

    pub fn open_in_memory() -> Result<Self, VaultError> {
        let conn = Connection::open_in_memory()?;
        let vault = Self { conn };
        vault.init_schema()?;
        Ok(vault)
    }

    fn init_schema(&self) -> Result<(), VaultError> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS snapshots (
                id               TEXT NOT NULL PRIMARY KEY,
                position         INTEGER NOT NULL,
                created_at       TEXT NOT NULL,
                last_accessed_at TEXT NOT NULL,
                access_count     INTEGER NOT NULL,
                parent_id        TEXT,
                metric           REAL,
                state            TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS vault_meta (
                key   TEXT NOT NULL PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    /// Replace the vault contents with `snapshots`, in order, and the
    /// active pointer, atomically.
    pub fn save_all(&mut self, snapshots: &[Item<Snapshot>], active: Option<&str>) -> Result<(), VaultError> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM snapshots", [])?;
        tx.execute("DELETE FROM vault_meta WHERE key = 'active'", [])?;
        if let Some(id) = active {
            tx.execute("INSERT INTO vault_meta (key, value) VALUES ('active', ?1)", params![id])?;
        }
        for (position, item) in snapshots.iter().enumerate() {
            tx.execute(
                "INSERT INTO snapshots
                     (id, position, created_at, last_accessed_at, access_count, parent_id, metric, state)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    item.id,
                    position as i64,
                    item.created_at.to_rfc3339(),
                    item.last_accessed_at.to_rfc3339(),
                    item.access_count as i64,
                    item.content.parent_id,
                    item.content.metric,
                    serde_json::to_string(&item.content.state)?,
                ],
            )?;
        }
        tx.commit()?;
        debug!(count = snapshots.len(), active = ?active, "snapshots saved to vault");
        Ok(())
    }

    /// All snapshots in archive order.
    pub fn load_all(&self) -> Result<Vec<Item<Snapshot>>, VaultError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, created_at, last_accessed_at, access_count, parent_id, metric, state
             FROM snapshots
             ORDER BY position ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, Option<f64>>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (id, created, accessed, count, parent_id, metric, state) = row?;
            let created_at = parse_time(&id, &created)?;
            let last_accessed_at = parse_time(&id, &accessed)?;
            out.push(Item {
                content: Snapshot {
                    state: serde_json::from_str(&state)?,
                    metric,
                    parent_id,
                },
                created_at,
                last_accessed_at,
                access_count: count.max(0) as u64,
                priority: 1.0,
                relevance: 1.0,
                id,
            });
        }
        Ok(out)
    }

    /// Active snapshot id as last saved, if any.
    pub fn active(&self) -> Result<Option<String>, VaultError> {
        let value = self
            .conn
            .query_row("SELECT value FROM vault_meta WHERE key = 'active'", [], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    pub fn count(&self) -> Result<usize, VaultError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM snapshots", [], |row| row.get(0))?;
        Ok(n.max(0) as usize)
    }
}

fn parse_time(id: &str, raw: &str) -> Result<DateTime<Utc>, VaultError> {
    raw.parse::<DateTime<Utc>>().map_err(|e| VaultError::Corrupt {
        id: id.to_string(),
        reason: e.to_string(),
    })
}
