mod config;
pub mod database;
pub mod snapshot;

pub use config::{Config, NotificationsConfig, TimeSyncConfig};
pub use database::{Database, SessionRecord, Stats};
pub use snapshot::PersistedSession;

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::{ConfigError, Result};

/// Returns `~/.config/focus[-dev]/` based on FOCUS_ENV.
///
/// Set FOCUS_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("FOCUS_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("focus-dev")
    } else {
        base_dir.join("focus")
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}

/// String key-value store the session snapshot is persisted in.
pub trait KeyValueStore {
    fn kv_get(&self, key: &str) -> Result<Option<String>>;
    fn kv_set(&self, key: &str, value: &str) -> Result<()>;
    fn kv_remove(&self, key: &str) -> Result<()>;

    /// Apply every entry or none: `Some` sets the key, `None` removes it.
    fn kv_write_batch(&self, entries: &[(&str, Option<&str>)]) -> Result<()>;
}

/// Process-local store, for tests and hosts without durable storage.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RefCell<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn kv_get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn kv_set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn kv_remove(&self, key: &str) -> Result<()> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }

    fn kv_write_batch(&self, entries: &[(&str, Option<&str>)]) -> Result<()> {
        let mut map = self.entries.borrow_mut();
        for (key, value) in entries {
            match value {
                Some(v) => map.insert(key.to_string(), v.to_string()),
                None => map.remove(*key),
            };
        }
        Ok(())
    }
}
