//! Session history persistence
//!
//! The core only needs get/set-by-key semantics from storage. Two keys are
//! used: the most recent session record, and the append-only list of every
//! session record. Reading is lenient (corrupt data reads as empty) and writing
//! never fails the caller; problems are logged and the session flow continues.

use crate::error::TrackerError;
use crate::types::SessionRecord;
use log::{debug, warn};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Key holding the most recent session record
pub const LAST_SESSION_KEY: &str = "lastSession";

/// Key holding the full session history list
pub const HISTORY_KEY: &str = "sessions";

/// Durable key-value storage holding JSON blobs
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, TrackerError>;
    fn set(&self, key: &str, value: &str) -> Result<(), TrackerError>;
}

/// In-memory store. Clones share the same contents.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, TrackerError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| TrackerError::Storage("memory store lock poisoned".to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), TrackerError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| TrackerError::Storage("memory store lock poisoned".to_string()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Directory-backed store: one `<key>.json` file per key
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, TrackerError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), TrackerError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

/// Which writes of [`persist_session`] succeeded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PersistReport {
    pub last_session_saved: bool,
    pub history_saved: bool,
}

/// Overwrite the most-recent slot and append `record` to the history list.
///
/// Never fails: each write is attempted independently and failures are logged.
pub fn persist_session(store: &dyn KeyValueStore, record: &SessionRecord) -> PersistReport {
    let last_session_saved = match record.to_json() {
        Ok(json) => match store.set(LAST_SESSION_KEY, &json) {
            Ok(()) => true,
            Err(e) => {
                warn!("Could not save last session: {e}");
                false
            }
        },
        Err(e) => {
            warn!("Could not encode last session: {e}");
            false
        }
    };

    let history_saved = match append_to_history(store, record) {
        Ok(len) => {
            debug!("session history now holds {len} records");
            true
        }
        Err(e) => {
            warn!("Could not save sessions history: {e}");
            false
        }
    };

    PersistReport {
        last_session_saved,
        history_saved,
    }
}

/// Append to the raw history list, keeping entries this version cannot parse
fn append_to_history(
    store: &dyn KeyValueStore,
    record: &SessionRecord,
) -> Result<usize, TrackerError> {
    let mut entries = match store.get(HISTORY_KEY) {
        Ok(raw) => raw.map(|raw| raw_history_entries(&raw)).unwrap_or_default(),
        Err(e) => {
            warn!("Couldn't read sessions history; starting fresh: {e}");
            Vec::new()
        }
    };
    entries.push(serde_json::to_value(record)?);
    store.set(HISTORY_KEY, &serde_json::to_string(&entries)?)?;
    Ok(entries.len())
}

/// Elements of a stored history list; anything other than a JSON array is empty
fn raw_history_entries(raw: &str) -> Vec<Value> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(entries)) => entries,
        Ok(_) => {
            warn!("Stored sessions history is not a list; starting fresh");
            Vec::new()
        }
        Err(e) => {
            warn!("Couldn't parse sessions array; starting fresh: {e}");
            Vec::new()
        }
    }
}

/// Parse a stored history list, skipping malformed entries
pub fn parse_history(raw: &str) -> Vec<SessionRecord> {
    raw_history_entries(raw)
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| match serde_json::from_value(entry) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Skipping malformed session record at index {index}: {e}");
                None
            }
        })
        .collect()
}

/// Read the full history. Missing, unreadable or corrupt data reads as empty.
pub fn load_history(store: &dyn KeyValueStore) -> Vec<SessionRecord> {
    match store.get(HISTORY_KEY) {
        Ok(Some(raw)) => parse_history(&raw),
        Ok(None) => Vec::new(),
        Err(e) => {
            warn!("Unable to read sessions: {e}");
            Vec::new()
        }
    }
}

/// Read the most recent session record, if a valid one is stored
pub fn load_last_session(store: &dyn KeyValueStore) -> Option<SessionRecord> {
    match store.get(LAST_SESSION_KEY) {
        Ok(Some(raw)) => match SessionRecord::from_json(&raw) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Unable to parse lastSession: {e}");
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            warn!("Unable to read lastSession: {e}");
            None
        }
    }
}
