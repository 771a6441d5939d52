//! Persistent key-value storage for tokens, the device id and preferences.
//!
//! This is the native counterpart of browser local storage: string keys,
//! string values, last writer wins. Nothing coordinates two processes sharing
//! the same file; a logout in one process is not observed by another.

use crate::error::{Error, Result};
use parking_lot::RwLock;
use std::{
    collections::BTreeMap,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::debug;

pub const DEVICE_ID_KEY: &str = "device_id";
pub const USER_ACCESS_TOKEN_KEY: &str = "user_access_token";
pub const USER_REFRESH_TOKEN_KEY: &str = "user_refresh_token";
pub const ADMIN_ACCESS_TOKEN_KEY: &str = "access_token";
pub const ADMIN_REFRESH_TOKEN_KEY: &str = "refresh_token";
pub const ADMIN_FLAG_KEY: &str = "is_admin_user";
pub const CONTRACT_NUMBER_KEY: &str = "contract_number";
pub const LANGUAGE_KEY: &str = "language";

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    /// # Errors
    /// Returns `Error::Storage` if the value cannot be persisted.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// # Errors
    /// Returns `Error::Storage` if the removal cannot be persisted.
    fn remove(&self, key: &str) -> Result<()>;
}

/// Process-local store, lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .write()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }
}

/// Store backed by a JSON object on disk.
///
/// Every mutation rewrites the whole file through a temporary sibling and a
/// rename, so readers never observe a half-written document.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, String>>,
}

impl FileStore {
    /// Opens the store at `path`; a missing file is an empty store.
    ///
    /// # Errors
    /// Returns `Error::Storage` if the file exists but cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let entries = match fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => BTreeMap::new(),
            Ok(raw) => serde_json::from_str(&raw)
                .map_err(|err| Error::Storage(format!("{}: {err}", path.display())))?,
            Err(err) if err.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(Error::Storage(format!("{}: {err}", path.display()))),
        };

        debug!("opened state file {} ({} keys)", path.display(), entries.len());

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let payload = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("tmp");

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|err| Error::Storage(format!("{}: {err}", parent.display())))?;
        }

        fs::write(&tmp, payload)
            .map_err(|err| Error::Storage(format!("{}: {err}", tmp.display())))?;
        fs::rename(&tmp, &self.path)
            .map_err(|err| Error::Storage(format!("{}: {err}", self.path.display())))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.write();
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.write();
        if entries.remove(key).is_some() {
            self.persist(&entries)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn temp_path(label: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("purbank-store-test-{label}-{}", Uuid::new_v4()))
            .join("state.json")
    }

    #[test]
    fn memory_store_set_get_remove() -> Result<()> {
        let store = MemoryStore::new();
        assert_eq!(store.get(DEVICE_ID_KEY), None);

        store.set(DEVICE_ID_KEY, "abc")?;
        store.set(DEVICE_ID_KEY, "def")?;
        assert_eq!(store.get(DEVICE_ID_KEY), Some("def".to_string()));

        store.remove(DEVICE_ID_KEY)?;
        assert_eq!(store.get(DEVICE_ID_KEY), None);
        Ok(())
    }

    #[test]
    fn file_store_survives_reopen() -> Result<()> {
        let path = temp_path("reopen");

        {
            let store = FileStore::open(&path)?;
            store.set(USER_ACCESS_TOKEN_KEY, "access")?;
            store.set(LANGUAGE_KEY, "en")?;
            store.remove(LANGUAGE_KEY)?;
        }

        let store = FileStore::open(&path)?;
        assert_eq!(store.get(USER_ACCESS_TOKEN_KEY), Some("access".to_string()));
        assert_eq!(store.get(LANGUAGE_KEY), None);

        if let Some(dir) = path.parent() {
            let _ = fs::remove_dir_all(dir);
        }
        Ok(())
    }

    #[test]
    fn file_store_missing_file_is_empty() -> Result<()> {
        let store = FileStore::open(temp_path("missing"))?;
        assert_eq!(store.get(DEVICE_ID_KEY), None);
        Ok(())
    }

    #[test]
    fn file_store_rejects_corrupt_file() {
        let path = temp_path("corrupt");
        if let Some(dir) = path.parent() {
            let _ = fs::create_dir_all(dir);
        }
        let _ = fs::write(&path, "not json");

        let result = FileStore::open(&path);
        assert!(matches!(result, Err(Error::Storage(_))));

        if let Some(dir) = path.parent() {
            let _ = fs::remove_dir_all(dir);
        }
    }
}
