use rusqlite::{Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::error::StorageError;

/// One durable key-value slot holding the serialized record collection.
///
/// The whole collection is written as one blob after every mutation.
/// There are no delta writes.
pub trait SnapshotSlot: Send {
    /// Read the stored blob. `Ok(None)` means nothing was ever written.
    fn read(&self) -> Result<Option<String>, StorageError>;

    /// Replace the stored blob
    fn write(&self, blob: &str) -> Result<(), StorageError>;

    /// Human-readable location, for logs
    fn describe(&self) -> String;
}

/// Snapshot slot backed by a SQLite key-value table.
pub struct SqliteSlot {
    conn: Connection,
    key: String,
    db_path: Option<PathBuf>,
}

impl SqliteSlot {
    /// Open (or create) the database file and the slot table.
    pub fn open(db_path: impl AsRef<Path>, key: impl Into<String>) -> Result<Self, StorageError> {
        let db_path = db_path.as_ref().to_path_buf();

        // Ensure the parent directory exists
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(&db_path)?;
        let mut slot = SqliteSlot {
            conn,
            key: key.into(),
            db_path: Some(db_path),
        };
        slot.init_schema()?;

        tracing::debug!(path = %slot.describe(), "snapshot slot opened");
        Ok(slot)
    }

    /// Slot in a private in-memory database; lost when dropped.
    pub fn in_memory(key: impl Into<String>) -> Result<Self, StorageError> {
        let mut slot = SqliteSlot {
            conn: Connection::open_in_memory()?,
            key: key.into(),
            db_path: None,
        };
        slot.init_schema()?;
        Ok(slot)
    }

    fn init_schema(&mut self) -> Result<(), StorageError> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key             TEXT PRIMARY KEY,
                value           TEXT NOT NULL,
                updated_at      INTEGER NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    /// Get the path to the database file (`None` for in-memory slots)
    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl SnapshotSlot for SqliteSlot {
    fn read(&self) -> Result<Option<String>, StorageError> {
        let blob = self
            .conn
            .query_row(
                "SELECT value FROM kv WHERE key = ?1",
                rusqlite::params![self.key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(blob)
    }

    fn write(&self, blob: &str) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            rusqlite::params![self.key, blob, chrono::Utc::now().timestamp()],
        )?;
        Ok(())
    }

    fn describe(&self) -> String {
        match &self.db_path {
            Some(path) => format!("{}#{}", path.display(), self.key),
            None => format!(":memory:#{}", self.key),
        }
    }
}

// Implement Debug for better error messages
impl std::fmt::Debug for SqliteSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteSlot")
            .field("db_path", &self.db_path)
            .field("key", &self.key)
            .finish()
    }
}

#[derive(Debug, Default)]
struct MemoryCell {
    blob: Option<String>,
    fail_reads: bool,
    fail_writes: bool,
}

/// Shared in-memory slot. Clones see the same blob, so a second store
/// opened on a clone behaves like a fresh process reading the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemorySlot {
    cell: Arc<Mutex<MemoryCell>>,
}

impl MemorySlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot pre-filled with a raw blob
    pub fn with_blob(blob: impl Into<String>) -> Self {
        let slot = Self::new();
        slot.lock().blob = Some(blob.into());
        slot
    }

    /// The currently stored blob
    pub fn blob(&self) -> Option<String> {
        self.lock().blob.clone()
    }

    /// Make subsequent reads fail with `StorageError::Unavailable`
    pub fn set_fail_reads(&self, fail: bool) {
        self.lock().fail_reads = fail;
    }

    /// Make subsequent writes fail with `StorageError::Unavailable`
    pub fn set_fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryCell> {
        // A poisoned cell still holds a whole blob; keep using it.
        self.cell.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SnapshotSlot for MemorySlot {
    fn read(&self) -> Result<Option<String>, StorageError> {
        let cell = self.lock();
        if cell.fail_reads {
            return Err(StorageError::Unavailable("read refused".to_string()));
        }
        Ok(cell.blob.clone())
    }

    fn write(&self, blob: &str) -> Result<(), StorageError> {
        let mut cell = self.lock();
        if cell.fail_writes {
            return Err(StorageError::Unavailable("write refused".to_string()));
        }
        cell.blob = Some(blob.to_string());
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_slot_roundtrip() {
        let slot = SqliteSlot::in_memory("trashReports").unwrap();
        assert_eq!(slot.read().unwrap(), None);

        slot.write("[]").unwrap();
        slot.write("[{\"id\":\"1\"}]").unwrap();
        assert_eq!(slot.read().unwrap().as_deref(), Some("[{\"id\":\"1\"}]"));
    }

    #[test]
    fn test_sqlite_slot_keys_are_independent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("pinboard.db");

        let reports = SqliteSlot::open(&path, "trashReports").unwrap();
        reports.write("[1]").unwrap();

        let works = SqliteSlot::open(&path, "imery-works").unwrap();
        assert_eq!(works.read().unwrap(), None);
        assert_eq!(reports.read().unwrap().as_deref(), Some("[1]"));
        assert_eq!(works.path(), Some(path.as_path()));
    }

    #[test]
    fn test_memory_slot_shared_between_clones() {
        let slot = MemorySlot::new();
        let other = slot.clone();
        slot.write("[]").unwrap();
        assert_eq!(other.read().unwrap().as_deref(), Some("[]"));

        other.set_fail_writes(true);
        assert!(matches!(slot.write("[1]"), Err(StorageError::Unavailable(_))));
        assert_eq!(slot.blob().as_deref(), Some("[]"));
    }
}
