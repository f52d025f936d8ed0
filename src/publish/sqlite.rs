//! SQLite status store

use super::traits::{StatusRecord, StatusStore, StoreError, StoreResult};
use crate::status::StatusValue;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// SQLite-backed status store
///
/// One table keyed by entity key. Thread-safe via internal mutex on the
/// connection.
pub struct SqliteStatusStore {
    conn: Mutex<Connection>,
}

impl SqliteStatusStore {
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> StoreResult<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS statuses (
                key TEXT PRIMARY KEY,
                status TEXT NOT NULL,
                status_code INTEGER NOT NULL,
                display_name TEXT NOT NULL,
                address TEXT NOT NULL,
                county TEXT NOT NULL,
                city TEXT NOT NULL,
                url TEXT,
                cumulative_count INTEGER NOT NULL,
                tags_json TEXT NOT NULL,
                evidence_digest TEXT,
                evidence BLOB NOT NULL DEFAULT x'',
                content_url TEXT,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_statuses_status
                ON statuses(status_code);

            PRAGMA journal_mode = WAL;
            "#,
        )?;
        Ok(())
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    pub fn get(&self, key: &str) -> StoreResult<Option<StatusRecord>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT key, status, display_name, address, county, city, url,
                        cumulative_count, tags_json, evidence_digest, evidence, content_url,
                        updated_at
                 FROM statuses WHERE key = ?1",
                params![key],
                RawRecord::from_row,
            )
            .optional()?;

        row.map(RawRecord::into_record).transpose()
    }

    /// All records, ordered by key
    pub fn list(&self) -> StoreResult<Vec<StatusRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT key, status, display_name, address, county, city, url,
                    cumulative_count, tags_json, evidence_digest, evidence, content_url,
                    updated_at
             FROM statuses ORDER BY key",
        )?;
        let rows = stmt
            .query_map([], RawRecord::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(RawRecord::into_record).collect()
    }

    pub fn count(&self) -> StoreResult<usize> {
        let conn = self.lock()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM statuses", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}

/// Row as stored, before parsing status and timestamp
struct RawRecord {
    key: String,
    status: String,
    display_name: String,
    address: String,
    county: String,
    city: String,
    url: Option<String>,
    cumulative_count: i64,
    tags_json: String,
    evidence_digest: Option<String>,
    evidence: Vec<u8>,
    content_url: Option<String>,
    updated_at: String,
}

impl RawRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            key: row.get(0)?,
            status: row.get(1)?,
            display_name: row.get(2)?,
            address: row.get(3)?,
            county: row.get(4)?,
            city: row.get(5)?,
            url: row.get(6)?,
            cumulative_count: row.get(7)?,
            tags_json: row.get(8)?,
            evidence_digest: row.get(9)?,
            evidence: row.get(10)?,
            content_url: row.get(11)?,
            updated_at: row.get(12)?,
        })
    }

    fn into_record(self) -> StoreResult<StatusRecord> {
        let status: StatusValue = self
            .status
            .parse()
            .map_err(|e: crate::status::ParseStatusError| StoreError::Corrupt(e.to_string()))?;
        Ok(StatusRecord {
            key: self.key,
            status,
            display_name: self.display_name,
            address: self.address,
            county: self.county,
            city: self.city,
            url: self.url,
            cumulative_count: u32::try_from(self.cumulative_count).unwrap_or(u32::MAX),
            tags: serde_json::from_str(&self.tags_json)?,
            evidence_digest: self.evidence_digest,
            evidence: self.evidence,
            content_url: self.content_url,
            updated_at: chrono::DateTime::parse_from_rfc3339(&self.updated_at)
                .map_err(|e| StoreError::DateParse(e.to_string()))?
                .with_timezone(&chrono::Utc),
        })
    }
}

#[async_trait]
impl StatusStore for SqliteStatusStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn upsert(&self, record: &StatusRecord) -> StoreResult<()> {
        let tags_json = serde_json::to_string(&record.tags)?;
        let conn = self.lock()?;

        // updated_at only moves when the status actually changes
        conn.execute(
            r#"
            INSERT INTO statuses (key, status, status_code, display_name, address, county, city,
                                  url, cumulative_count, tags_json, evidence_digest, evidence,
                                  content_url, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            ON CONFLICT(key) DO UPDATE SET
                status = excluded.status,
                status_code = excluded.status_code,
                display_name = excluded.display_name,
                address = excluded.address,
                county = excluded.county,
                city = excluded.city,
                url = excluded.url,
                cumulative_count = excluded.cumulative_count,
                tags_json = excluded.tags_json,
                evidence_digest = excluded.evidence_digest,
                evidence = excluded.evidence,
                content_url = excluded.content_url,
                updated_at = CASE WHEN statuses.status = excluded.status
                                  THEN statuses.updated_at
                                  ELSE excluded.updated_at END
            "#,
            params![
                record.key,
                record.status.as_str(),
                record.status.code(),
                record.display_name,
                record.address,
                record.county,
                record.city,
                record.url,
                record.cumulative_count,
                tags_json,
                record.evidence_digest,
                record.evidence,
                record.content_url,
                record.updated_at.to_rfc3339(),
            ],
        )?;

        Ok(())
    }
}
