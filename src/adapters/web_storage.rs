//! In-memory Web Storage (local/session) backend.
//!
//! Behaves like the browser's `Storage` object: string keys and values,
//! an optional byte quota, and a switch that simulates storage being
//! disabled by the user agent (private mode, blocked third-party storage).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use indexmap::IndexMap;

use crate::domain::errors::{StorageError, StorageResult};
use crate::domain::models::BackendKind;
use crate::domain::ports::StorageBackend;

/// Thread-safe in-memory key/value storage.
#[derive(Debug)]
pub struct MemoryWebStorage {
    kind: BackendKind,
    entries: Mutex<IndexMap<String, String>>,
    quota_bytes: Option<usize>,
    enabled: AtomicBool,
}

impl MemoryWebStorage {
    /// Create storage reporting the given kind.
    ///
    /// Cookies have their own backend; passing [`BackendKind::Cookie`] here
    /// produces a plain key/value store that merely reports that kind.
    pub fn new(kind: BackendKind) -> Self {
        Self {
            kind,
            entries: Mutex::new(IndexMap::new()),
            quota_bytes: None,
            enabled: AtomicBool::new(true),
        }
    }

    pub fn local() -> Self {
        Self::new(BackendKind::Local)
    }

    pub fn session() -> Self {
        Self::new(BackendKind::Session)
    }

    /// Limit the total size of keys plus values, in bytes.
    #[must_use]
    pub fn with_quota(mut self, bytes: usize) -> Self {
        self.quota_bytes = Some(bytes);
        self
    }

    /// Enable or disable every operation, as a user agent would.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Read a value bypassing the enable switch.
    pub fn raw_get(&self, key: &str) -> Option<String> {
        self.lock().ok()?.get(key).cloned()
    }

    /// Write a value bypassing the enable switch and quota.
    pub fn raw_set(&self, key: &str, value: &str) {
        if let Ok(mut entries) = self.lock() {
            entries.insert(key.to_string(), value.to_string());
        }
    }

    pub fn len(&self) -> usize {
        self.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, IndexMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| StorageError::Unavailable(format!("{} lock poisoned", self.kind)))
    }

    fn check_enabled(&self) -> StorageResult<()> {
        if self.is_enabled() {
            Ok(())
        } else {
            Err(StorageError::AccessDenied(format!("{} is disabled", self.kind)))
        }
    }
}

fn used_bytes(entries: &IndexMap<String, String>) -> usize {
    entries.iter().map(|(k, v)| k.len() + v.len()).sum()
}

impl StorageBackend for MemoryWebStorage {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn read(&self, key: &str) -> StorageResult<Option<String>> {
        self.check_enabled()?;
        Ok(self.lock()?.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str, _expires_at: i64) -> StorageResult<()> {
        self.check_enabled()?;
        let mut entries = self.lock()?;

        if let Some(limit) = self.quota_bytes {
            let replaced = entries.get(key).map_or(0, |old| key.len() + old.len());
            let used = used_bytes(&entries) - replaced + key.len() + value.len();
            if used > limit {
                return Err(StorageError::QuotaExceeded { used, limit });
            }
        }

        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.check_enabled()?;
        self.lock()?.shift_remove(key);
        Ok(())
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        self.check_enabled()?;
        Ok(self.lock()?.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::PROBE_KEY;

    #[test]
    fn test_read_write_remove() {
        let storage = MemoryWebStorage::local();
        storage.write("pz_last", "{}", 0).unwrap();
        assert_eq!(storage.read("pz_last").unwrap().as_deref(), Some("{}"));
        assert_eq!(storage.keys().unwrap(), vec!["pz_last"]);

        storage.remove("pz_last").unwrap();
        assert_eq!(storage.read("pz_last").unwrap(), None);
        storage.remove("pz_last").unwrap();
    }

    #[test]
    fn test_disabled_storage_fails_probe() {
        let storage = MemoryWebStorage::session();
        assert!(storage.probe());
        assert!(storage.is_empty(), "probe key must be cleaned up");

        storage.set_enabled(false);
        assert!(!storage.probe());
        assert!(matches!(
            storage.write("k", "v", 0),
            Err(StorageError::AccessDenied(_))
        ));
        assert!(storage.read("k").is_err());
    }

    #[test]
    fn test_quota_exceeded() {
        let storage = MemoryWebStorage::local().with_quota(16);
        storage.write("abc", "1234567890", 0).unwrap();
        assert!(matches!(
            storage.write("def", "1234567890", 0),
            Err(StorageError::QuotaExceeded { limit: 16, .. })
        ));
        // Overwriting an existing key only counts the difference
        storage.write("abc", "123456789012", 0).unwrap();
    }

    #[test]
    fn test_full_quota_fails_probe() {
        let storage = MemoryWebStorage::local().with_quota(PROBE_KEY.len());
        assert!(!storage.probe());
    }
}
