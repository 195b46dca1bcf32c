//! Key-value backend trait and implementations.
//!
//! This module provides different storage backends for mission data:
//! - `MemoryStore` - In-process map (tests, dry runs)
//! - `FileStore` - One file per key under the data directory
//! - `SqliteStore` - A single `kv` table in `waypoint.db` (default)

use crate::{Error, Result};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Trait for backends that persist raw bytes under string keys.
///
/// A missing key is `Ok(None)`, never an error.
pub trait KeyValueStore: Send {
    /// Read the value stored under `key`.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&mut self, key: &str, value: &[u8]) -> Result<()>;

    /// Remove `key`. Removing a missing key succeeds.
    fn delete(&mut self, key: &str) -> Result<()>;

    /// Store `value` only if the current value equals `expected` (`None` meaning
    /// absent). Returns whether the write happened.
    ///
    /// The default reads then writes, which is only safe within one process.
    /// Backends shared between processes override it with an atomic version.
    fn compare_and_set(&mut self, key: &str, expected: Option<&[u8]>, value: &[u8]) -> Result<bool> {
        if self.get(key)?.as_deref() != expected {
            return Ok(false);
        }
        self.set(key, value)?;
        Ok(true)
    }

    /// Get the storage location description (for display purposes).
    fn location(&self) -> String;

    /// Get the backend type.
    fn backend_type(&self) -> BackendType;
}

/// Available storage backend types.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BackendType {
    /// In-process map, lost on exit
    Memory,
    /// One file per key
    File,
    /// SQLite database (default)
    #[default]
    Sqlite,
}

impl BackendType {
    /// Parse a backend type from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "memory" | "mem" => Some(Self::Memory),
            "file" | "files" => Some(Self::File),
            "sqlite" | "db" | "default" => Some(Self::Sqlite),
            _ => None,
        }
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::File => "file",
            Self::Sqlite => "sqlite",
        }
    }

    /// Open a backend of this type rooted at `data_dir`.
    pub fn open(&self, data_dir: &Path) -> Result<Box<dyn KeyValueStore>> {
        Ok(match self {
            Self::Memory => Box::new(MemoryStore::new()),
            Self::File => Box::new(FileStore::open(data_dir)?),
            Self::Sqlite => Box::new(SqliteStore::open(&data_dir.join("waypoint.db"))?),
        })
    }
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Backend holding values in a process-local map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: HashMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &[u8]) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }

    fn backend_type(&self) -> BackendType {
        BackendType::Memory
    }
}

/// Backend storing each key as `<root>/<key>.json`.
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open (creating if needed) a file store under `root`.
    pub fn open(root: &Path) -> Result<Self> {
        fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty()
            || !key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            return Err(Error::InvalidInput(format!("Invalid storage key: {}", key)));
        }
        Ok(self.root.join(format!("{}.json", key)))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&mut self, key: &str, value: &[u8]) -> Result<()> {
        let path = self.path_for(key)?;
        // Write to a sibling temp file and rename so readers never see a partial value
        let mut tmp = tempfile::NamedTempFile::new_in(&self.root)?;
        tmp.write_all(value)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn location(&self) -> String {
        self.root.display().to_string()
    }

    fn backend_type(&self) -> BackendType {
        BackendType::File
    }
}

/// Backend storing values in a SQLite `kv` table.
pub struct SqliteStore {
    path: PathBuf,
    conn: Connection,
}

impl SqliteStore {
    /// Open or create the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            path: path.to_path_buf(),
            conn,
        })
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value BLOB NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| {
                row.get::<_, Vec<u8>>(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set(&mut self, key: &str, value: &[u8]) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![key, value, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<()> {
        self.conn.execute("DELETE FROM kv WHERE key = ?1", [key])?;
        Ok(())
    }

    fn compare_and_set(&mut self, key: &str, expected: Option<&[u8]>, value: &[u8]) -> Result<bool> {
        // IMMEDIATE takes the write lock up front so no other connection can
        // write between the read and the update
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let current = tx
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| {
                row.get::<_, Vec<u8>>(0)
            })
            .optional()?;
        if current.as_deref() != expected {
            return Ok(false);
        }
        tx.execute(
            "INSERT OR REPLACE INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![key, value, chrono::Utc::now().to_rfc3339()],
        )?;
        tx.commit()?;
        Ok(true)
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }

    fn backend_type(&self) -> BackendType {
        BackendType::Sqlite
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn exercise(store: &mut dyn KeyValueStore) {
        assert_eq!(store.get("alpha").unwrap(), None);
        store.set("alpha", b"one").unwrap();
        assert_eq!(store.get("alpha").unwrap(), Some(b"one".to_vec()));
        store.set("alpha", b"two").unwrap();
        assert_eq!(store.get("alpha").unwrap(), Some(b"two".to_vec()));
        store.delete("alpha").unwrap();
        assert_eq!(store.get("alpha").unwrap(), None);
        // Deleting again is not an error
        store.delete("alpha").unwrap();
    }

    fn exercise_compare_and_set(store: &mut dyn KeyValueStore) {
        assert!(store.compare_and_set("beta", None, b"one").unwrap());
        // Creating over an existing value fails
        assert!(!store.compare_and_set("beta", None, b"two").unwrap());
        assert!(!store.compare_and_set("beta", Some(&b"zero"[..]), b"two").unwrap());
        assert_eq!(store.get("beta").unwrap(), Some(b"one".to_vec()));
        assert!(store.compare_and_set("beta", Some(&b"one"[..]), b"two").unwrap());
        assert_eq!(store.get("beta").unwrap(), Some(b"two".to_vec()));
    }

    #[test]
    fn test_compare_and_set_contract() {
        exercise_compare_and_set(&mut MemoryStore::new());
        exercise_compare_and_set(&mut SqliteStore::open_in_memory().unwrap());

        let dir = TempDir::new().unwrap();
        exercise_compare_and_set(&mut FileStore::open(dir.path()).unwrap());
    }

    #[test]
    fn test_sqlite_compare_and_set_sees_other_connection() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("waypoint.db");
        let mut first = SqliteStore::open(&path).unwrap();
        let mut second = SqliteStore::open(&path).unwrap();

        first.set("k", b"v1").unwrap();
        let seen = second.get("k").unwrap();
        first.set("k", b"v2").unwrap();

        // The second connection's view is stale
        assert!(!second.compare_and_set("k", seen.as_deref(), b"v3").unwrap());
        assert_eq!(first.get("k").unwrap(), Some(b"v2".to_vec()));
    }

    #[test]
    fn test_memory_store_contract() {
        exercise(&mut MemoryStore::new());
    }

    #[test]
    fn test_file_store_contract() {
        let dir = TempDir::new().unwrap();
        let mut store = FileStore::open(dir.path()).unwrap();
        exercise(&mut store);
        assert_eq!(store.backend_type(), BackendType::File);
    }

    #[test]
    fn test_file_store_rejects_path_like_keys() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        assert!(matches!(
            store.get("../escape"),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_sqlite_store_contract() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        exercise(&mut store);
    }

    #[test]
    fn test_sqlite_store_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("waypoint.db");
        {
            let mut store = SqliteStore::open(&path).unwrap();
            store.set("k", b"v").unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.get("k").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn test_backend_type_parse() {
        assert_eq!(BackendType::parse("SQLite"), Some(BackendType::Sqlite));
        assert_eq!(BackendType::parse("file"), Some(BackendType::File));
        assert_eq!(BackendType::parse("memory"), Some(BackendType::Memory));
        assert_eq!(BackendType::parse("redis"), None);
        assert_eq!(BackendType::default().to_string(), "sqlite");
    }
}
