//! Durable key-value storage backing the `KeyValue` capability.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use crux_kv::{KeyValueOperation, KeyValueResult};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use tracing::debug;

use crate::capabilities::{
    deleted_result, failed_result, io_error, other_error, read_result, validate_key,
    written_result, KeyValueError, MAX_VALUE_SIZE,
};

const SCHEMA: &str = r"
    CREATE TABLE IF NOT EXISTS kv (
        key TEXT PRIMARY KEY,
        value BLOB NOT NULL
    );
";

/// Writes and deletes return the value that was replaced, if any.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KeyValueError>;
    async fn set(&self, key: &str, value: &[u8]) -> Result<Option<Vec<u8>>, KeyValueError>;
    async fn delete(&self, key: &str) -> Result<Option<Vec<u8>>, KeyValueError>;
}

/// Carry out one storage operation against `store`.
pub async fn execute(store: &dyn KeyValueStore, operation: &KeyValueOperation) -> KeyValueResult {
    apply(store, operation).await.unwrap_or_else(failed_result)
}

async fn apply(
    store: &dyn KeyValueStore,
    operation: &KeyValueOperation,
) -> Result<KeyValueResult, KeyValueError> {
    match operation {
        KeyValueOperation::Get { key } => {
            validate_key(key)?;
            Ok(read_result(store.get(key).await?))
        }
        KeyValueOperation::Set { key, value } => {
            validate_key(key)?;
            if value.len() > MAX_VALUE_SIZE {
                return Err(other_error(format!(
                    "value of {} bytes exceeds maximum of {MAX_VALUE_SIZE} bytes",
                    value.len()
                )));
            }
            Ok(written_result(store.set(key, value).await?))
        }
        KeyValueOperation::Delete { key } => {
            validate_key(key)?;
            Ok(deleted_result(store.delete(key).await?))
        }
        _ => Err(other_error("unsupported key-value operation")),
    }
}

#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KeyValueError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<Option<Vec<u8>>, KeyValueError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.insert(key.to_string(), value.to_vec()))
    }

    async fn delete(&self, key: &str) -> Result<Option<Vec<u8>>, KeyValueError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.remove(key))
    }
}

/// SQLite-backed store. One table, one row per key.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, KeyValueError> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(storage_error)?;
        debug!(path = %path.display(), "opened key-value database");
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self, KeyValueError> {
        Self::with_connection(Connection::open_in_memory().map_err(storage_error)?)
    }

    fn with_connection(conn: Connection) -> Result<Self, KeyValueError> {
        conn.execute_batch(SCHEMA).map_err(storage_error)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T, KeyValueError> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        f(&conn).map_err(storage_error)
    }
}

fn select(conn: &Connection, key: &str) -> rusqlite::Result<Option<Vec<u8>>> {
    conn.query_row(
        "SELECT value FROM kv WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KeyValueError> {
        self.with_conn(|conn| select(conn, key))
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<Option<Vec<u8>>, KeyValueError> {
        self.with_conn(|conn| {
            let previous = select(conn, key)?;
            conn.execute(
                "INSERT INTO kv (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )?;
            Ok(previous)
        })
    }

    async fn delete(&self, key: &str) -> Result<Option<Vec<u8>>, KeyValueError> {
        self.with_conn(|conn| {
            let previous = select(conn, key)?;
            conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
            Ok(previous)
        })
    }
}

fn storage_error(error: rusqlite::Error) -> KeyValueError {
    match error.sqlite_error_code() {
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => KeyValueError::Timeout,
        Some(ErrorCode::DatabaseCorrupt | ErrorCode::NotADatabase) => {
            other_error(format!("corrupted database: {error}"))
        }
        _ => io_error(error.to_string()),
    }
}
