// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Persistent emulator state backed by SQLite.
//
// Holds the persisted subset of the device state as a single JSON row and a
// history of committed prints.  Image bytes live in print storage, not here.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use instax_core::error::{InstaxError, Result};
use instax_core::{JobId, Model, PrintRecord};

use crate::device_state::PersistedState;

const CREATE_TABLES_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS device_state (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        snapshot TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS prints (
        id TEXT PRIMARY KEY,
        file_name TEXT NOT NULL,
        bytes_received INTEGER NOT NULL,
        expected_size INTEGER NOT NULL,
        sha256 TEXT NOT NULL,
        model TEXT NOT NULL,
        completed_at TEXT NOT NULL
    );
"#;

fn db_err(context: &str) -> impl FnOnce(rusqlite::Error) -> InstaxError + '_ {
    move |e| InstaxError::Database(format!("{context}: {e}"))
}

/// SQLite-backed state store.
///
/// Synchronous like `rusqlite`; async callers hold it behind a mutex and keep
/// calls short.
pub struct StateStore {
    conn: Connection,
}

impl StateStore {
    /// Open (or create) the store at `path` in WAL mode.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref()).map_err(db_err("open"))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(db_err("WAL pragma"))?;
        conn.execute_batch(CREATE_TABLES_SQL)
            .map_err(db_err("create tables"))?;
        info!("state store opened");
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err("open in-memory"))?;
        conn.execute_batch(CREATE_TABLES_SQL)
            .map_err(db_err("create tables"))?;
        debug!("in-memory state store opened");
        Ok(Self { conn })
    }

    // -- Device state --

    #[instrument(skip_all, fields(model = %state.model))]
    pub fn save_state(&self, state: &PersistedState) -> Result<()> {
        let json = serde_json::to_string(state)?;
        self.conn
            .execute(
                "INSERT INTO device_state (id, snapshot, updated_at) VALUES (1, ?1, ?2)
                 ON CONFLICT(id) DO UPDATE SET snapshot = excluded.snapshot,
                                               updated_at = excluded.updated_at",
                params![json, Utc::now().to_rfc3339()],
            )
            .map_err(db_err("save state"))?;
        debug!("device state saved");
        Ok(())
    }

    /// The saved snapshot, or `None` on first start.
    #[instrument(skip_all)]
    pub fn load_state(&self) -> Result<Option<PersistedState>> {
        let json: Option<String> = self
            .conn
            .query_row("SELECT snapshot FROM device_state WHERE id = 1", [], |row| row.get(0))
            .optional()
            .map_err(db_err("load state"))?;
        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    // -- Print history --

    #[instrument(skip_all, fields(job_id = %record.id))]
    pub fn record_print(&self, record: &PrintRecord) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO prints (id, file_name, bytes_received, expected_size, sha256, model, completed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.id.to_string(),
                    record.file_name,
                    record.bytes_received,
                    record.expected_size,
                    record.sha256,
                    record.model.as_str(),
                    // Fixed width keeps ORDER BY completed_at chronological.
                    record.completed_at.to_rfc3339_opts(SecondsFormat::Micros, true),
                ],
            )
            .map_err(db_err("record print"))?;
        info!(file = %record.file_name, bytes = record.bytes_received, "print recorded");
        Ok(())
    }

    /// Most recent prints first.
    pub fn recent_prints(&self, limit: usize) -> Result<Vec<PrintRecord>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, file_name, bytes_received, expected_size, sha256, model, completed_at
                 FROM prints ORDER BY completed_at DESC, rowid DESC LIMIT ?1",
            )
            .map_err(db_err("prepare recent prints"))?;

        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, u32>(2)?,
                    row.get::<_, u32>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                ))
            })
            .map_err(db_err("query recent prints"))?;

        let mut records = Vec::new();
        for row in rows {
            let (id, file_name, bytes_received, expected_size, sha256, model, completed_at) =
                row.map_err(db_err("read print row"))?;
            records.push(PrintRecord {
                id: JobId(
                    Uuid::parse_str(&id).map_err(|e| InstaxError::Database(format!("bad print id {id}: {e}")))?,
                ),
                file_name,
                bytes_received,
                expected_size,
                sha256,
                model: model.parse::<Model>()?,
                completed_at: DateTime::parse_from_rfc3339(&completed_at)
                    .map_err(|e| InstaxError::Database(format!("bad timestamp {completed_at}: {e}")))?
                    .with_timezone(&Utc),
            });
        }
        Ok(records)
    }

    pub fn print_count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM prints", [], |row| row.get(0))
            .map_err(db_err("count prints"))?;
        Ok(count as u64)
    }
}
