//! SQLite-backed key/value storage

use std::path::Path;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension};

use super::{migrations, ContextId, StorageBackend, StorageError};

/// How long a write waits for another process holding the database lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Key/value entries in a `SQLite` database file.
///
/// Several processes may open the same file; each sees the others' writes on
/// its next read. There is no change feed.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Open a database at the given path, creating it if it doesn't exist
    ///
    /// Runs migrations automatically.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database (useful for testing)
    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(mut conn: Connection) -> Result<Self, StorageError> {
        Self::configure(&conn)?;
        migrations::run(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn configure(conn: &Connection) -> rusqlite::Result<()> {
        // In-memory databases reject WAL; that is fine.
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })
        .ok();
        conn.pragma_update(None, "synchronous", "NORMAL").ok();
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(())
    }

    /// Context that wrote `key` last, with the write time (Unix ms).
    pub fn last_writer(&self, key: &str) -> Result<Option<(String, i64)>, StorageError> {
        let conn = self.lock();
        let row = conn
            .query_row(
                "SELECT origin, updated_at FROM kv_entries WHERE key = ?1 AND origin IS NOT NULL",
                params![key],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()?;
        Ok(row)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StorageBackend for SqliteStorage {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let conn = self.lock();
        let value = conn
            .query_row(
                "SELECT value FROM kv_entries WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str, origin: ContextId) -> Result<(), StorageError> {
        let now = chrono::Utc::now().timestamp_millis();
        let conn = self.lock();
        conn.execute(
            "INSERT INTO kv_entries (key, value, updated_at, origin) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at,
                origin = excluded.origin",
            params![key, value, now, origin.to_string()],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_get_missing_key() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        assert_eq!(storage.get("appointments").unwrap(), None);
    }

    #[test]
    fn test_upsert_replaces_value_and_records_writer() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let first = ContextId::new();
        let second = ContextId::new();

        storage.set("k", "[1]", first).unwrap();
        storage.set("k", "[2]", second).unwrap();

        assert_eq!(storage.get("k").unwrap().as_deref(), Some("[2]"));
        let (writer, updated_at) = storage.last_writer("k").unwrap().unwrap();
        assert_eq!(writer, second.to_string());
        assert!(updated_at > 0);
    }

    #[test]
    fn test_two_connections_share_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("carebook.db");

        let writer = SqliteStorage::open(&path).unwrap();
        let reader = SqliteStorage::open(&path).unwrap();

        writer.set("k", "[]", ContextId::new()).unwrap();
        assert_eq!(reader.get("k").unwrap().as_deref(), Some("[]"));
    }
}
