//! Durable key-value persistence for the two client collections.
//!
//! Each key maps to one JSON file under the base directory; collections are
//! always written whole. Anything unreadable at load time is logged and
//! treated as absent so a corrupt file can never break startup.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

pub const CHAT_HISTORY_KEY: &str = "chat_history";
pub const LIBRARY_KEY: &str = "library";

#[derive(Debug, Clone)]
pub struct PersistentStore {
    base_dir: PathBuf,
}

impl PersistentStore {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// The platform data directory, e.g. `~/.local/share/lia` on Linux.
    pub fn open_default() -> Result<Self> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow!("Could not determine data directory"))?;
        Ok(Self::new(data_dir.join("lia")))
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.base_dir.join(format!("{key}.json"))
    }

    /// Returns `None` for a missing key or for any read/parse failure.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let path = self.path_for(key);
        if !path.exists() {
            return None;
        }
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(key, %err, "failed to read persisted state");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(key, %err, "persisted state is corrupt, treating as empty");
                None
            }
        }
    }

    /// Serializes the whole collection and replaces whatever was stored
    /// under `key`. Write failures are logged, not surfaced; the in-memory
    /// state stays authoritative for the rest of the session.
    pub fn save<T: Serialize>(&self, key: &str, value: &T) {
        if let Err(err) = self.try_save(key, value) {
            warn!(key, %err, "failed to persist state");
        }
    }

    fn try_save<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        fs::create_dir_all(&self.base_dir)?;
        let serialized = serde_json::to_string_pretty(value)?;
        fs::write(self.path_for(key), serialized)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChatMessage;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn store() -> (PersistentStore, TempDir) {
        let dir = TempDir::new().unwrap();
        (PersistentStore::new(dir.path().to_path_buf()), dir)
    }

    #[test]
    fn load_missing_key_returns_none() {
        let (store, _dir) = store();
        assert!(store.load::<Vec<ChatMessage>>(CHAT_HISTORY_KEY).is_none());
    }

    #[test]
    fn load_unparsable_data_returns_none() {
        let (store, dir) = store();
        std::fs::write(dir.path().join("chat_history.json"), "not json").unwrap();
        assert!(store.load::<Vec<ChatMessage>>(CHAT_HISTORY_KEY).is_none());
    }

    #[test]
    fn save_then_load_reconstructs_timestamps() {
        let (store, _dir) = store();
        let messages = vec![ChatMessage {
            id: "1".to_string(),
            text: "hello".to_string(),
            is_user: true,
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 45).unwrap(),
        }];
        store.save(CHAT_HISTORY_KEY, &messages);
        let loaded: Vec<ChatMessage> = store.load(CHAT_HISTORY_KEY).unwrap();
        assert_eq!(loaded, messages);
    }

    #[test]
    fn save_overwrites_the_previous_value() {
        let (store, _dir) = store();
        store.save(LIBRARY_KEY, &vec!["a".to_string(), "b".to_string()]);
        store.save(LIBRARY_KEY, &vec!["c".to_string()]);
        let loaded: Vec<String> = store.load(LIBRARY_KEY).unwrap();
        assert_eq!(loaded, vec!["c".to_string()]);
    }
}
