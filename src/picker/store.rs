//! Host-provided key/value storage for state shared between picker views
//!
//! Status and the playing song are expensive to fetch on every view switch,
//! so the picker keeps them in a store the host owns. A picker without a
//! store behaves as if the store were empty.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

/// Key holding the last parsed daemon status
pub const STATUS_KEY: &str = "status";
/// Key holding the record of the playing song
pub const CURRENT_SONG_KEY: &str = "current_song";

pub trait StateStore: Send {
    fn get_persisted(&self, key: &str) -> Option<Value>;

    /// Set `key`, or remove it when `value` is `None`.
    fn set_persisted(&mut self, key: &str, value: Option<Value>);
}

/// In-process store backed by a map
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: HashMap<String, Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStore {
    fn get_persisted(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }

    fn set_persisted(&mut self, key: &str, value: Option<Value>) {
        match value {
            Some(value) => {
                self.values.insert(key.to_string(), value);
            }
            None => {
                self.values.remove(key);
            }
        }
    }
}

/// Read a typed value; unreadable values are treated as absent.
pub fn load<T: DeserializeOwned>(store: &dyn StateStore, key: &str) -> Option<T> {
    let value = store.get_persisted(key)?;
    match serde_json::from_value(value) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!("Ignoring unreadable persisted {}: {}", key, e);
            None
        }
    }
}

/// Write a typed value; `None` clears the key.
pub fn save<T: Serialize>(store: &mut dyn StateStore, key: &str, value: Option<&T>) {
    let encoded = match value.map(serde_json::to_value).transpose() {
        Ok(encoded) => encoded,
        Err(e) => {
            warn!("Failed to persist {}: {}", key, e);
            return;
        }
    };
    store.set_persisted(key, encoded);
}
