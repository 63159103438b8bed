//! SQLite-backed [`LocalStore`].

use crate::error::{StorageError, StorageResult};
use crate::store::{attachment_ref_for, LocalStore};
use async_trait::async_trait;
use fieldlog_types::{PreferenceSet, Record, RecordId, Timestamp};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::debug;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS records (
        id TEXT PRIMARY KEY,
        is_deleted INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        json TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS attachments (
        local_ref TEXT PRIMARY KEY,
        data BLOB NOT NULL,
        size INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS preferences (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        json TEXT NOT NULL
    );
";

const UPSERT_RECORD: &str = "
    INSERT INTO records (id, is_deleted, updated_at, json) VALUES (?1, ?2, ?3, ?4)
    ON CONFLICT(id) DO UPDATE SET
        is_deleted = excluded.is_deleted,
        updated_at = excluded.updated_at,
        json = excluded.json
";

/// Local store backed by a single SQLite file.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens (or creates) a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let conn = Connection::open(path.as_ref())?;
        Self::with_connection(conn)
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory() -> StorageResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StorageResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `f` against the connection on the blocking pool.
    async fn run<T, F>(&self, f: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> StorageResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| StorageError::Task("connection mutex poisoned".to_string()))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| StorageError::Task(e.to_string()))?
    }
}

/// SQLite integers are signed; later instants saturate so ordering holds.
fn millis_column(ts: Timestamp) -> i64 {
    i64::try_from(ts.as_millis()).unwrap_or(i64::MAX)
}

fn upsert(conn: &Connection, record: &Record) -> StorageResult<()> {
    let json = serde_json::to_string(record)?;
    conn.execute(
        UPSERT_RECORD,
        params![
            record.id.as_str(),
            record.is_deleted,
            millis_column(record.updated_at),
            json
        ],
    )?;
    Ok(())
}

fn decode(json: &str) -> StorageResult<Record> {
    serde_json::from_str(json)
        .map_err(|e| StorageError::InvalidData(format!("corrupt record row: {e}")))
}

#[async_trait]
impl LocalStore for SqliteStore {
    async fn get_all_records(&self) -> StorageResult<Vec<Record>> {
        self.run(|conn| {
            let mut stmt = conn.prepare("SELECT json FROM records ORDER BY rowid")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            let mut records = Vec::new();
            for row in rows {
                records.push(decode(&row?)?);
            }
            Ok(records)
        })
        .await
    }

    async fn get_record(&self, id: &RecordId) -> StorageResult<Option<Record>> {
        let id = id.clone();
        self.run(move |conn| {
            let json: Option<String> = conn
                .query_row(
                    "SELECT json FROM records WHERE id = ?1",
                    params![id.as_str()],
                    |row| row.get(0),
                )
                .optional()?;
            json.map(|j| decode(&j)).transpose()
        })
        .await
    }

    async fn put_record(&self, record: &Record) -> StorageResult<()> {
        let record = record.clone();
        self.run(move |conn| {
            upsert(conn, &record)?;
            debug!("Stored record {}", record.id);
            Ok(())
        })
        .await
    }

    async fn delete_record(&self, id: &RecordId) -> StorageResult<()> {
        let id = id.clone();
        self.run(move |conn| {
            conn.execute("DELETE FROM records WHERE id = ?1", params![id.as_str()])?;
            Ok(())
        })
        .await
    }

    async fn replace_all_records(&self, records: &[Record]) -> StorageResult<()> {
        let records = records.to_vec();
        self.run(move |conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM records", [])?;
            for record in &records {
                upsert(&tx, record)?;
            }
            tx.commit()?;
            debug!("Replaced local record set ({} records)", records.len());
            Ok(())
        })
        .await
    }

    async fn get_attachment(&self, local_ref: &str) -> StorageResult<Option<Vec<u8>>> {
        let local_ref = local_ref.to_string();
        self.run(move |conn| {
            let data = conn
                .query_row(
                    "SELECT data FROM attachments WHERE local_ref = ?1",
                    params![local_ref],
                    |row| row.get::<_, Vec<u8>>(0),
                )
                .optional()?;
            Ok(data)
        })
        .await
    }

    async fn put_attachment(&self, data: &[u8]) -> StorageResult<String> {
        let data = data.to_vec();
        self.run(move |conn| {
            let local_ref = attachment_ref_for(&data);
            conn.execute(
                "INSERT OR IGNORE INTO attachments (local_ref, data, size) VALUES (?1, ?2, ?3)",
                params![local_ref, data, data.len() as i64],
            )?;
            debug!("Stored attachment {} ({} bytes)", local_ref, data.len());
            Ok(local_ref)
        })
        .await
    }

    async fn get_preferences(&self) -> StorageResult<PreferenceSet> {
        self.run(|conn| {
            let json: Option<String> = conn
                .query_row("SELECT json FROM preferences WHERE id = 1", [], |row| {
                    row.get(0)
                })
                .optional()?;
            match json {
                Some(j) => Ok(serde_json::from_str(&j)?),
                None => Ok(PreferenceSet::default()),
            }
        })
        .await
    }

    async fn put_preferences(&self, preferences: &PreferenceSet) -> StorageResult<()> {
        let json = serde_json::to_string(preferences)?;
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO preferences (id, json) VALUES (1, ?1)
                 ON CONFLICT(id) DO UPDATE SET json = excluded.json",
                params![json],
            )?;
            Ok(())
        })
        .await
    }

    async fn purge_tombstones(&self, cutoff: Timestamp) -> StorageResult<usize> {
        self.run(move |conn| {
            let removed = conn.execute(
                "DELETE FROM records WHERE is_deleted = 1 AND updated_at < ?1",
                params![millis_column(cutoff)],
            )?;
            Ok(removed)
        })
        .await
    }
}
