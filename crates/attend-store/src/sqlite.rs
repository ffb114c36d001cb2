//! SQLite-backed [`IdentityStore`] and [`EventLog`].

use crate::codec::{blob_to_embedding, embedding_to_blob, format_timestamp, parse_timestamp};
use attend_core::{
    AttendanceEntry, DateRange, Embedding, EventLog, IdentityRecord, IdentityStore, NewIdentity,
    ScanEvent, StoreError,
};
use rusqlite::{params, Connection};
use std::path::Path;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Identity gallery and scan event log in one SQLite database.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the database at `path`, creating parent directories.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(StoreError::backend)?;
            }
        }

        let conn = Connection::open(path).map_err(StoreError::backend)?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;",
        )
        .map_err(StoreError::backend)?;

        let store = Self { conn };
        store.init_schema()?;
        tracing::info!(path = %path.display(), "opened attendance database");
        Ok(store)
    }

    /// Create an in-memory store.
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(StoreError::backend)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        // AUTOINCREMENT keeps ids of deleted identities from being reused, so
        // their remaining scan events are never attributed to someone else.
        // Events carry no foreign key: they outlive their identity.
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS identities (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    code TEXT NOT NULL UNIQUE,
                    name TEXT NOT NULL,
                    department TEXT NOT NULL DEFAULT '',
                    embedding BLOB NOT NULL,
                    model_version TEXT,
                    created_at TEXT NOT NULL
                );
                CREATE TABLE IF NOT EXISTS scan_events (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    identity_id INTEGER NOT NULL,
                    ts TEXT NOT NULL,
                    device TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_scan_events_ts ON scan_events(ts);
                CREATE INDEX IF NOT EXISTS idx_scan_events_identity ON scan_events(identity_id);",
            )
            .map_err(StoreError::backend)
    }
}

/// Identity row before blob and timestamp decoding.
struct RawIdentity {
    id: i64,
    code: String,
    name: String,
    department: String,
    embedding: Vec<u8>,
    model_version: Option<String>,
    created_at: String,
}

impl RawIdentity {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            code: row.get(1)?,
            name: row.get(2)?,
            department: row.get(3)?,
            embedding: row.get(4)?,
            model_version: row.get(5)?,
            created_at: row.get(6)?,
        })
    }

    fn decode(self) -> Result<IdentityRecord, StoreError> {
        Ok(IdentityRecord {
            id: self.id,
            embedding: Embedding {
                values: blob_to_embedding(self.id, &self.embedding)?,
                model_version: self.model_version,
            },
            code: self.code,
            display_name: self.name,
            department: self.department,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

impl IdentityStore for SqliteStore {
    fn add(&mut self, identity: &NewIdentity, embedding: &Embedding) -> Result<i64, StoreError> {
        let created_at = chrono::Local::now().naive_local();
        let result = self.conn.execute(
            "INSERT INTO identities (code, name, department, embedding, model_version, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                identity.code,
                identity.display_name,
                identity.department,
                embedding_to_blob(&embedding.values),
                embedding.model_version,
                format_timestamp(&created_at),
            ],
        );

        match result {
            Ok(_) => Ok(self.conn.last_insert_rowid()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
            {
                Err(StoreError::DuplicateCode(identity.code.clone()))
            }
            Err(e) => Err(StoreError::backend(e)),
        }
    }

    fn delete(&mut self, id: i64) -> Result<bool, StoreError> {
        let removed = self
            .conn
            .execute("DELETE FROM identities WHERE id = ?1", params![id])
            .map_err(StoreError::backend)?;
        Ok(removed > 0)
    }

    fn list_all(&self) -> Result<Vec<IdentityRecord>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, code, name, department, embedding, model_version, created_at
                 FROM identities ORDER BY id",
            )
            .map_err(StoreError::backend)?;

        let rows = stmt
            .query_map([], RawIdentity::from_row)
            .map_err(StoreError::backend)?;

        let mut identities = Vec::new();
        for row in rows {
            identities.push(row.map_err(StoreError::backend)?.decode()?);
        }
        Ok(identities)
    }
}

impl EventLog for SqliteStore {
    fn append(&mut self, event: &ScanEvent) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT INTO scan_events (identity_id, ts, device) VALUES (?1, ?2, ?3)",
                params![
                    event.identity_id,
                    format_timestamp(&event.timestamp),
                    event.source_device
                ],
            )
            .map_err(StoreError::backend)?;
        tracing::debug!(identity_id = event.identity_id, ts = %event.timestamp, "scan event appended");
        Ok(())
    }

    fn query(&self, range: &DateRange) -> Result<Vec<AttendanceEntry>, StoreError> {
        let start = range.start().map(|d| d.format(DATE_FORMAT).to_string());
        let end = range.end().map(|d| d.format(DATE_FORMAT).to_string());

        let mut stmt = self
            .conn
            .prepare(
                "SELECT e.identity_id, i.name, i.department, e.ts, e.device
                 FROM scan_events e
                 LEFT JOIN identities i ON i.id = e.identity_id
                 WHERE (?1 IS NULL OR date(e.ts) >= ?1)
                   AND (?2 IS NULL OR date(e.ts) <= ?2)
                 ORDER BY e.identity_id, e.ts",
            )
            .map_err(StoreError::backend)?;

        let rows = stmt
            .query_map(params![start, end], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })
            .map_err(StoreError::backend)?;

        let mut entries = Vec::new();
        for row in rows {
            let (identity_id, name, department, ts, source_device) =
                row.map_err(StoreError::backend)?;
            entries.push(AttendanceEntry {
                identity_id,
                name,
                department,
                timestamp: parse_timestamp(&ts)?,
                source_device,
            });
        }

        tracing::debug!(range = %range, count = entries.len(), "scan events queried");
        Ok(entries)
    }
}
