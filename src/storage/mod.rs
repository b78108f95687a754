use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::config::{ConfigPaths, StorageOptions};

mod schema;

pub const NOTES_KEY: &str = "notes";
pub const CURRENT_NOTE_KEY: &str = "currentNote";
pub const SELECTED_INDEX_KEY: &str = "selectedNoteIndex";
pub const DARK_MODE_KEY: &str = "darkMode";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("opening database {}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },
    #[error("sqlite error accessing `{key}`")]
    Sqlite {
        key: String,
        #[source]
        source: rusqlite::Error,
    },
    #[error("serialising `{key}`")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("storage quota exceeded writing `{key}`: {required} bytes needed, {quota} allowed")]
    QuotaExceeded { key: String, required: u64, quota: u64 },
}

/// Everything the application restores at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistedState {
    pub notes: Vec<String>,
    pub current_note: String,
    pub selected_note_index: Option<usize>,
    pub dark_mode: bool,
}

#[derive(Clone)]
pub struct StorageHandle {
    db_path: Arc<PathBuf>,
    options: Arc<StorageOptions>,
}

impl StorageHandle {
    fn connect(&self) -> Result<Connection, StorageError> {
        let conn = Connection::open(&*self.db_path).map_err(|source| StorageError::Open {
            path: self.db_path.to_path_buf(),
            source,
        })?;
        prepare_connection(&conn, &self.options).map_err(|source| StorageError::Open {
            path: self.db_path.to_path_buf(),
            source,
        })?;
        Ok(conn)
    }

    fn with_connection<F, T>(&self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&Connection) -> Result<T, StorageError>,
    {
        let conn = self.connect()?;
        f(&conn)
    }

    pub fn get_raw(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.with_connection(|conn| {
            conn.query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| {
                row.get::<_, String>(0)
            })
            .optional()
            .map_err(|source| sqlite_error(key, source))
        })
    }

    /// Stores `value` under `key`. Fails without touching the previous value
    /// when the write would push total usage past the configured quota.
    pub fn set_raw(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let quota = self.options.quota_bytes;
        self.with_connection(|conn| {
            let others: i64 = conn
                .query_row(
                    "SELECT COALESCE(SUM(LENGTH(CAST(key AS BLOB)) + LENGTH(CAST(value AS BLOB))), 0)
                     FROM kv WHERE key != ?1",
                    [key],
                    |row| row.get(0),
                )
                .map_err(|source| sqlite_error(key, source))?;
            let required = others.max(0) as u64 + key.len() as u64 + value.len() as u64;
            if required > quota {
                return Err(StorageError::QuotaExceeded {
                    key: key.to_string(),
                    required,
                    quota,
                });
            }
            conn.execute(
                "INSERT INTO kv (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )
            .map_err(|source| sqlite_error(key, source))?;
            Ok(())
        })
    }

    #[cfg(test)]
    fn usage_bytes(&self) -> Result<u64, StorageError> {
        self.with_connection(|conn| {
            let used: i64 = conn
                .query_row(
                    "SELECT COALESCE(SUM(LENGTH(CAST(key AS BLOB)) + LENGTH(CAST(value AS BLOB))), 0) FROM kv",
                    [],
                    |row| row.get(0),
                )
                .map_err(|source| sqlite_error("*", source))?;
            Ok(used.max(0) as u64)
        })
    }

    fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let encoded = serde_json::to_string(value).map_err(|source| StorageError::Serialize {
            key: key.to_string(),
            source,
        })?;
        self.set_raw(key, &encoded)
    }

    pub fn save_notes(&self, notes: &[String]) -> Result<(), StorageError> {
        self.set_json(NOTES_KEY, notes)
    }

    pub fn save_current_note(&self, body: &str) -> Result<(), StorageError> {
        self.set_raw(CURRENT_NOTE_KEY, body)
    }

    pub fn save_selected_index(&self, index: Option<usize>) -> Result<(), StorageError> {
        self.set_json(SELECTED_INDEX_KEY, &index)
    }

    pub fn save_dark_mode(&self, enabled: bool) -> Result<(), StorageError> {
        self.set_json(DARK_MODE_KEY, &enabled)
    }

    /// Restores every persisted slice. Missing or malformed entries fall back
    /// to their defaults individually; this never fails.
    pub fn load_state(&self) -> PersistedState {
        let notes: Vec<String> = self.load_json(NOTES_KEY).unwrap_or_default();
        let current_note = match self.get_raw(CURRENT_NOTE_KEY) {
            Ok(value) => value.unwrap_or_default(),
            Err(err) => {
                tracing::warn!(?err, key = CURRENT_NOTE_KEY, "failed to read stored value");
                String::new()
            }
        };
        let stored_index: Option<serde_json::Value> = self.load_json(SELECTED_INDEX_KEY);
        let selected_note_index = stored_index.and_then(|value| validate_index(&value, notes.len()));
        let dark_mode = self.load_json(DARK_MODE_KEY).unwrap_or(false);

        PersistedState {
            notes,
            current_note,
            selected_note_index,
            dark_mode,
        }
    }

    fn load_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.get_raw(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                tracing::warn!(?err, key, "failed to read stored value");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(?err, key, "ignoring malformed stored value");
                None
            }
        }
    }
}

fn validate_index(value: &serde_json::Value, len: usize) -> Option<usize> {
    if value.is_null() {
        return None;
    }
    match value.as_i64() {
        Some(index) if index >= 0 && (index as u64) < len as u64 => Some(index as usize),
        _ => {
            tracing::warn!(%value, len, "stored selection is out of range, ignoring");
            None
        }
    }
}

fn sqlite_error(key: &str, source: rusqlite::Error) -> StorageError {
    StorageError::Sqlite {
        key: key.to_string(),
        source,
    }
}

pub fn init(paths: &ConfigPaths, storage: &StorageOptions) -> Result<StorageHandle> {
    let db_path = &paths.database_path;
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating data directory {}", parent.display()))?;
    }
    let conn = Connection::open(db_path)
        .with_context(|| format!("opening database {}", db_path.display()))?;
    prepare_connection(&conn, storage).context("configuring sqlite connection")?;
    schema::apply(&conn)?;
    tracing::debug!(path = %db_path.display(), "storage ready");
    Ok(StorageHandle {
        db_path: Arc::new(db_path.clone()),
        options: Arc::new(storage.clone()),
    })
}

fn prepare_connection(conn: &Connection, storage: &StorageOptions) -> rusqlite::Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(
        None,
        "wal_autocheckpoint",
        storage.wal_autocheckpoint.to_string(),
    )?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tempfile::TempDir;

    pub(crate) fn init_storage_with_quota(quota_bytes: u64) -> anyhow::Result<(TempDir, StorageHandle)> {
        let temp = TempDir::new()?;
        let paths = ConfigPaths::rooted_at(temp.path());
        paths.ensure_directories()?;
        let mut options = StorageOptions::default();
        options.database_path = paths.database_path.clone();
        options.quota_bytes = quota_bytes;
        let storage = init(&paths, &options)?;
        Ok((temp, storage))
    }

    pub(crate) fn init_storage() -> anyhow::Result<(TempDir, StorageHandle)> {
        init_storage_with_quota(crate::config::DEFAULT_QUOTA_BYTES)
    }

    #[test]
    fn empty_store_loads_defaults() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        assert_eq!(storage.load_state(), PersistedState::default());
        Ok(())
    }

    #[test]
    fn saved_slices_round_trip() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        let notes = vec!["# One".to_string(), "two".to_string()];
        storage.save_notes(&notes)?;
        storage.save_current_note("two")?;
        storage.save_selected_index(Some(1))?;
        storage.save_dark_mode(true)?;

        let state = storage.load_state();
        assert_eq!(state.notes, notes);
        assert_eq!(state.current_note, "two");
        assert_eq!(state.selected_note_index, Some(1));
        assert!(state.dark_mode);

        assert_eq!(storage.get_raw(SELECTED_INDEX_KEY)?.as_deref(), Some("1"));
        storage.save_selected_index(None)?;
        assert_eq!(storage.get_raw(SELECTED_INDEX_KEY)?.as_deref(), Some("null"));
        Ok(())
    }

    #[test]
    fn current_note_is_stored_raw() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        storage.save_current_note("\"quoted\" text")?;
        assert_eq!(
            storage.get_raw(CURRENT_NOTE_KEY)?.as_deref(),
            Some("\"quoted\" text")
        );
        Ok(())
    }

    #[test]
    fn malformed_entries_fall_back_to_defaults() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        storage.set_raw(NOTES_KEY, "{not json")?;
        storage.set_raw(DARK_MODE_KEY, "\"yes\"")?;
        storage.set_raw(SELECTED_INDEX_KEY, "\"zero\"")?;

        let state = storage.load_state();
        assert!(state.notes.is_empty());
        assert!(!state.dark_mode);
        assert_eq!(state.selected_note_index, None);
        Ok(())
    }

    #[test]
    fn out_of_range_selection_is_dropped_on_load() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        storage.save_notes(&["only".to_string()])?;
        storage.set_raw(SELECTED_INDEX_KEY, "3")?;
        assert_eq!(storage.load_state().selected_note_index, None);

        storage.set_raw(SELECTED_INDEX_KEY, "-1")?;
        assert_eq!(storage.load_state().selected_note_index, None);

        storage.set_raw(SELECTED_INDEX_KEY, "0")?;
        assert_eq!(storage.load_state().selected_note_index, Some(0));
        Ok(())
    }

    #[test]
    fn quota_rejects_oversized_write_and_keeps_previous_value() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage_with_quota(64)?;
        storage.save_current_note("short")?;

        let err = storage
            .save_current_note(&"x".repeat(128))
            .expect_err("write above quota");
        assert_matches!(err, StorageError::QuotaExceeded { ref key, quota: 64, .. } if key == CURRENT_NOTE_KEY);
        assert_eq!(storage.get_raw(CURRENT_NOTE_KEY)?.as_deref(), Some("short"));
        Ok(())
    }

    #[test]
    fn quota_counts_replaced_value_once() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage_with_quota(40)?;
        // key (11 bytes) + 20 bytes fits; overwriting with the same size must too.
        storage.save_current_note(&"a".repeat(20))?;
        storage.save_current_note(&"b".repeat(20))?;
        assert_eq!(storage.usage_bytes()?, 31);
        Ok(())
    }
}
