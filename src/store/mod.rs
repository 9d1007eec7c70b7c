//! Persistent index store on SQLite.
//!
//! A single database file holds both tiers of the index. The
//! connection is configured with:
//!
//! - `journal_mode = WAL` for concurrent readers and a single writer.
//! - `synchronous = NORMAL` as a balance between safety and speed.
//! - `foreign_keys = ON` so cascade chains do the referential cleanup.
//! - `busy_timeout` to avoid transient `database is locked` errors.
//!
//! The `Store` handle is shared across indexing workers, resolution
//! tasks, and query readers; an internal mutex serializes access to the
//! connection, which keeps writer semantics simple while WAL keeps
//! on-disk readers cheap.

mod extraction;
pub mod models;
mod queries;
mod resolution;
pub mod schema;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, OpenFlags};
use thiserror::Error;

pub use models::*;
pub use resolution::ResolvedLocation;

/// Errors surfaced by the store layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("corrupt index: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Shared handle to the on-disk index.
pub struct Store {
    path: Option<PathBuf>,
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (or create) the index database at the given path.
    pub fn open(db_path: &Path) -> StoreResult<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Corrupt(format!(
                        "cannot create index directory {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE;
        let conn = Connection::open_with_flags(db_path, flags)?;
        Self::configure(&conn)?;
        schema::initialize(&conn)?;

        Ok(Self {
            path: Some(db_path.to_path_buf()),
            conn: Mutex::new(conn),
        })
    }

    /// Open a throwaway in-memory index, used by tests.
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::configure(&conn)?;
        schema::initialize(&conn)?;
        Ok(Self {
            path: None,
            conn: Mutex::new(conn),
        })
    }

    fn configure(conn: &Connection) -> StoreResult<()> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        // In-memory databases reject WAL; ignore the pragma there.
        let _ = conn.pragma_update(None, "journal_mode", "WAL");
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.busy_timeout(std::time::Duration::from_millis(5000))?;
        Ok(())
    }

    /// Path of the backing database file, if on disk.
    pub fn db_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Read a metadata value.
    pub fn get_metadata(&self, key: &str) -> StoreResult<Option<String>> {
        let conn = self.lock();
        let mut stmt = conn.prepare("SELECT value FROM meta WHERE key = ?1")?;
        let value = stmt
            .query_row([key], |row| row.get::<_, String>(0))
            .map(Some)
            .or_else(|err| match err {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;
        Ok(value)
    }

    /// Write a metadata value, replacing any previous one.
    pub fn set_metadata(&self, key: &str, value: &str) -> StoreResult<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            [key, value],
        )?;
        Ok(())
    }

    /// Drop every row from every table except the schema-version stamp.
    ///
    /// Used for the full rebuild triggered by an analyzer-bundle hash
    /// mismatch.
    pub fn clear_all(&self) -> StoreResult<()> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        // Child tables cascade from these two roots; deleting files
        // first keeps the cascade work small.
        tx.execute("DELETE FROM files", [])?;
        tx.execute("DELETE FROM symbols", [])?;
        tx.execute("DELETE FROM meta WHERE key <> 'schema_version'", [])?;
        tx.commit()?;
        Ok(())
    }
}

/// Convert a stored enum string with the given parser, mapping unknown
/// values to a conversion error instead of panicking.
pub(crate) fn parse_stored<T>(
    value: String,
    parse: impl Fn(&str) -> Option<T>,
    what: &'static str,
) -> rusqlite::Result<T> {
    parse(&value).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            format!("unknown {what} in index: {value}").into(),
        )
    })
}

/// Join a modifier set for storage. Modifiers are space-separated and
/// kept in extraction order.
pub(crate) fn modifiers_to_text(modifiers: &[String]) -> String {
    modifiers.join(" ")
}

/// Split a stored modifier set.
pub(crate) fn modifiers_from_text(text: &str) -> Vec<String> {
    text.split_whitespace().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_round_trips_and_overwrites() {
        let store = Store::open_in_memory().expect("store");
        assert_eq!(store.get_metadata("scripts_hash").expect("get"), None);

        store.set_metadata("scripts_hash", "abc").expect("set");
        assert_eq!(
            store.get_metadata("scripts_hash").expect("get"),
            Some("abc".to_string())
        );

        store.set_metadata("scripts_hash", "def").expect("set");
        assert_eq!(
            store.get_metadata("scripts_hash").expect("get"),
            Some("def".to_string())
        );
    }

    #[test]
    fn schema_initialization_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = dir.path().join("index.db");
        {
            let _store = Store::open(&db).expect("first open");
        }
        let store = Store::open(&db).expect("second open");
        assert!(store.db_path().is_some());
    }

    #[test]
    fn clear_all_preserves_schema_version() {
        let store = Store::open_in_memory().expect("store");
        store.set_metadata("scripts_hash", "abc").expect("set");
        store.clear_all().expect("clear");
        assert_eq!(store.get_metadata("scripts_hash").expect("get"), None);
        assert_eq!(
            store.get_metadata("schema_version").expect("get"),
            Some(schema::SCHEMA_VERSION.to_string())
        );
    }

    #[test]
    fn modifier_text_round_trips() {
        let mods = vec!["static".to_string(), "async".to_string()];
        assert_eq!(modifiers_from_text(&modifiers_to_text(&mods)), mods);
        assert!(modifiers_from_text("").is_empty());
    }
}
