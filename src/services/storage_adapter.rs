//! Prioritized multi-backend storage with TTL expiry and fallback.
//!
//! Every operation is best-effort: backend failures are logged and the
//! chain moves on, so callers only ever see "stored / not stored" and
//! "found / not found".

use std::sync::Arc;

use tracing::{debug, warn};

use super::cookie_backend::CookieBackend;
use crate::domain::models::{BackendChain, BackendKind, CapturedRecord, StoredItem};
use crate::domain::ports::{Clock, CookieJar, StorageBackend};

/// The storage mechanisms the host environment supports.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    local: Option<Arc<dyn StorageBackend>>,
    session: Option<Arc<dyn StorageBackend>>,
    cookies: Option<Arc<dyn CookieJar>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_local(mut self, backend: Arc<dyn StorageBackend>) -> Self {
        self.local = Some(backend);
        self
    }

    #[must_use]
    pub fn with_session(mut self, backend: Arc<dyn StorageBackend>) -> Self {
        self.session = Some(backend);
        self
    }

    #[must_use]
    pub fn with_cookie_jar(mut self, jar: Arc<dyn CookieJar>) -> Self {
        self.cookies = Some(jar);
        self
    }

    /// Build the backend for `kind`, if the environment supports it.
    pub fn resolve(
        &self,
        kind: BackendKind,
        cookie_domain: Option<&str>,
    ) -> Option<Arc<dyn StorageBackend>> {
        match kind {
            BackendKind::Local => self.local.clone(),
            BackendKind::Session => self.session.clone(),
            BackendKind::Cookie => self.cookies.as_ref().map(|jar| {
                Arc::new(CookieBackend::new(jar.clone(), cookie_domain)) as Arc<dyn StorageBackend>
            }),
        }
    }

    pub fn supports(&self, kind: BackendKind) -> bool {
        match kind {
            BackendKind::Local => self.local.is_some(),
            BackendKind::Session => self.session.is_some(),
            BackendKind::Cookie => self.cookies.is_some(),
        }
    }
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let supported: Vec<&str> = BackendKind::ALL
            .iter()
            .filter(|k| self.supports(**k))
            .map(BackendKind::as_str)
            .collect();
        f.debug_struct("BackendRegistry")
            .field("supported", &supported)
            .finish()
    }
}

/// Ordered chain of storage backends sharing one key prefix.
pub struct StorageChain {
    chain: Vec<Arc<dyn StorageBackend>>,
    supported: Vec<Arc<dyn StorageBackend>>,
    prefix: String,
    clock: Arc<dyn Clock>,
}

impl StorageChain {
    /// Resolve the configured chain against the environment.
    ///
    /// Kinds the environment does not support are dropped from the chain.
    pub fn new(
        chain: &BackendChain,
        registry: &BackendRegistry,
        prefix: &str,
        cookie_domain: Option<&str>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let resolved: Vec<Arc<dyn StorageBackend>> = chain
            .iter()
            .filter_map(|kind| {
                let backend = registry.resolve(kind, cookie_domain);
                if backend.is_none() {
                    warn!(target: "paramtrail::storage", backend = %kind, "backend not supported by environment, skipping");
                }
                backend
            })
            .collect();

        let supported = BackendKind::ALL
            .iter()
            .filter_map(|kind| registry.resolve(*kind, cookie_domain))
            .collect();

        debug!(target: "paramtrail::storage", chain = %chain, "storage initialized");

        Self {
            chain: resolved,
            supported,
            prefix: prefix.to_string(),
            clock,
        }
    }

    /// Kinds in the active chain, in priority order.
    pub fn backends(&self) -> Vec<BackendKind> {
        self.chain.iter().map(|b| b.kind()).collect()
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn key(&self, name: &str) -> String {
        format!("{}{name}", self.prefix)
    }

    /// Persist `record` under `name` in the first available backend.
    ///
    /// Returns false when no backend accepted the write.
    pub fn set(&self, name: &str, record: &CapturedRecord, ttl_days: u32) -> bool {
        let key = self.key(name);
        let item = StoredItem::new(record.clone(), ttl_days, self.clock.now_millis());
        let payload = match item.to_payload() {
            Ok(payload) => payload,
            Err(err) => {
                warn!(target: "paramtrail::storage", record = name, error = %err, "failed to serialize record");
                return false;
            }
        };

        for backend in &self.chain {
            if !backend.probe() {
                debug!(target: "paramtrail::storage", backend = %backend.kind(), "backend unavailable");
                continue;
            }
            match backend.write(&key, &payload, item.expires_at) {
                Ok(()) => {
                    debug!(target: "paramtrail::storage", record = name, backend = %backend.kind(), "stored");
                    return true;
                }
                Err(err) => {
                    debug!(target: "paramtrail::storage", record = name, backend = %backend.kind(), error = %err, "write failed");
                }
            }
        }

        warn!(target: "paramtrail::storage", record = name, "failed to store - no available backend");
        false
    }

    /// Fetch the first live record stored under `name`.
    ///
    /// Expired items are deleted from the backend holding them and the scan
    /// continues; unparseable payloads count as absent.
    pub fn get(&self, name: &str) -> Option<CapturedRecord> {
        let key = self.key(name);

        for backend in &self.chain {
            if !backend.probe() {
                continue;
            }
            if let Some(item) = self.read_live(backend.as_ref(), &key) {
                debug!(target: "paramtrail::storage", record = name, backend = %backend.kind(), "retrieved");
                return Some(item.data);
            }
        }

        None
    }

    fn read_live(&self, backend: &dyn StorageBackend, key: &str) -> Option<StoredItem> {
        let raw = match backend.read(key) {
            Ok(Some(raw)) if !raw.is_empty() => raw,
            Ok(_) => return None,
            Err(err) => {
                debug!(target: "paramtrail::storage", backend = %backend.kind(), error = %err, "read failed");
                return None;
            }
        };

        let item = match StoredItem::from_payload(&raw) {
            Ok(item) => item,
            Err(err) => {
                debug!(target: "paramtrail::storage", backend = %backend.kind(), key, error = %err, "malformed payload ignored");
                return None;
            }
        };

        if item.is_expired(self.clock.now_millis()) {
            debug!(target: "paramtrail::storage", backend = %backend.kind(), key, "data expired");
            if let Err(err) = backend.remove(key) {
                debug!(target: "paramtrail::storage", backend = %backend.kind(), error = %err, "failed to remove expired item");
            }
            return None;
        }

        Some(item)
    }

    /// Delete `name` from every backend in the chain.
    pub fn remove(&self, name: &str) {
        let key = self.key(name);
        for backend in &self.chain {
            if let Err(err) = backend.remove(&key) {
                debug!(target: "paramtrail::storage", backend = %backend.kind(), error = %err, "remove failed");
            }
        }
        debug!(target: "paramtrail::storage", record = name, "removed from all backends");
    }

    /// Delete every prefixed key from every backend the environment supports.
    pub fn clear_all(&self) {
        for backend in &self.supported {
            let keys = match backend.keys() {
                Ok(keys) => keys,
                Err(err) => {
                    debug!(target: "paramtrail::storage", backend = %backend.kind(), error = %err, "cannot list keys");
                    continue;
                }
            };
            for key in keys.iter().filter(|k| k.starts_with(&self.prefix)) {
                if let Err(err) = backend.remove(key) {
                    debug!(target: "paramtrail::storage", backend = %backend.kind(), key, error = %err, "remove failed");
                }
            }
        }
        debug!(target: "paramtrail::storage", "cleared all data");
    }
}

impl std::fmt::Debug for StorageChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageChain")
            .field("backends", &self.backends())
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{ManualClock, MemoryCookieJar, MemoryWebStorage};
    use crate::domain::models::{ParamSet, MS_PER_DAY};

    const NOW: i64 = 1_700_000_000_000;

    struct Fixture {
        clock: Arc<ManualClock>,
        local: Arc<MemoryWebStorage>,
        session: Arc<MemoryWebStorage>,
        jar: Arc<MemoryCookieJar>,
        registry: BackendRegistry,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::new(NOW));
        let local = Arc::new(MemoryWebStorage::local());
        let session = Arc::new(MemoryWebStorage::session());
        let jar = Arc::new(MemoryCookieJar::new(clock.clone()));
        let registry = BackendRegistry::new()
            .with_local(local.clone())
            .with_session(session.clone())
            .with_cookie_jar(jar.clone());
        Fixture {
            clock,
            local,
            session,
            jar,
            registry,
        }
    }

    fn chain(f: &Fixture, spec: &str) -> StorageChain {
        StorageChain::new(
            &BackendChain::parse(spec).unwrap(),
            &f.registry,
            "pz_",
            None,
            f.clock.clone(),
        )
    }

    fn record(source: &str) -> CapturedRecord {
        let mut params = ParamSet::new();
        params.insert("utm_source".to_string(), source.to_string());
        CapturedRecord::new(params, NOW)
    }

    #[test]
    fn test_set_writes_first_available_backend_only() {
        let f = fixture();
        let storage = chain(&f, "localStorage|sessionStorage");

        assert!(storage.set("last", &record("google"), 30));
        assert!(f.local.raw_get("pz_last").is_some());
        assert!(f.session.raw_get("pz_last").is_none());
        assert_eq!(storage.get("last"), Some(record("google")));
    }

    #[test]
    fn test_fallback_when_primary_unavailable() {
        let f = fixture();
        let storage = chain(&f, "localStorage|sessionStorage");

        f.local.set_enabled(false);
        assert!(storage.set("last", &record("google"), 30));
        assert!(f.session.raw_get("pz_last").is_some());

        // Primary recovers: the record is still found in the fallback
        f.local.set_enabled(true);
        assert_eq!(storage.get("last"), Some(record("google")));
    }

    #[test]
    fn test_set_fails_when_nothing_available() {
        let f = fixture();
        let storage = chain(&f, "localStorage|sessionStorage");
        f.local.set_enabled(false);
        f.session.set_enabled(false);

        assert!(!storage.set("last", &record("google"), 30));
        assert_eq!(storage.get("last"), None);
    }

    #[test]
    fn test_write_failure_falls_through() {
        let f = fixture();
        let storage = chain(&f, "cookie|localStorage");
        let mut params = ParamSet::new();
        params.insert("utm_content".to_string(), "x".repeat(5000));
        let big = CapturedRecord::new(params, NOW);

        assert!(storage.set("last", &big, 30));
        assert!(f.jar.is_empty());
        assert!(f.local.raw_get("pz_last").is_some());
    }

    #[test]
    fn test_expired_item_removed_and_scan_continues() {
        let f = fixture();
        let storage = chain(&f, "localStorage|sessionStorage");

        let expired = StoredItem::new(record("old"), 1, NOW - 2 * MS_PER_DAY);
        f.local.raw_set("pz_last", &expired.to_payload().unwrap());
        let live = StoredItem::new(record("fresh"), 1, NOW);
        f.session.raw_set("pz_last", &live.to_payload().unwrap());

        assert_eq!(storage.get("last"), Some(record("fresh")));
        assert!(f.local.raw_get("pz_last").is_none());
    }

    #[test]
    fn test_ttl_expiry_after_time_passes() {
        let f = fixture();
        let storage = chain(&f, "localStorage");
        storage.set("last", &record("google"), 1);

        f.clock.advance(MS_PER_DAY);
        assert!(storage.get("last").is_some());

        f.clock.advance(1);
        assert_eq!(storage.get("last"), None);
        assert!(f.local.raw_get("pz_last").is_none());
    }

    #[test]
    fn test_malformed_payload_treated_as_absent() {
        let f = fixture();
        let storage = chain(&f, "localStorage|sessionStorage");
        f.local.raw_set("pz_last", "{broken");
        f.session.raw_set("pz_last", &StoredItem::new(record("s"), 0, NOW).to_payload().unwrap());

        assert_eq!(storage.get("last"), Some(record("s")));
    }

    #[test]
    fn test_remove_hits_every_backend() {
        let f = fixture();
        let storage = chain(&f, "localStorage|sessionStorage");
        let payload = StoredItem::new(record("a"), 0, NOW).to_payload().unwrap();
        f.local.raw_set("pz_last", &payload);
        f.session.raw_set("pz_last", &payload);

        storage.remove("last");
        assert!(f.local.raw_get("pz_last").is_none());
        assert!(f.session.raw_get("pz_last").is_none());
    }

    #[test]
    fn test_clear_all_removes_only_prefixed_keys_everywhere() {
        let f = fixture();
        // Chain only lists localStorage, but clear_all sweeps every kind
        let storage = chain(&f, "localStorage");
        f.local.raw_set("pz_first", "1");
        f.local.raw_set("unrelated", "keep");
        f.session.raw_set("pz_last", "1");
        f.jar.set_cookie("pz_last=1; path=/").unwrap();
        f.jar.set_cookie("session_id=abc").unwrap();

        storage.clear_all();
        assert!(f.local.raw_get("pz_first").is_none());
        assert_eq!(f.local.raw_get("unrelated").as_deref(), Some("keep"));
        assert!(f.session.raw_get("pz_last").is_none());
        assert!(f.jar.get("pz_last").is_none());
        assert!(f.jar.get("session_id").is_some());
    }

    #[test]
    fn test_unsupported_kinds_dropped_from_chain() {
        let clock = Arc::new(ManualClock::new(NOW));
        let registry = BackendRegistry::new().with_session(Arc::new(MemoryWebStorage::session()));
        let storage = StorageChain::new(
            &BackendChain::parse("cookie|sessionStorage").unwrap(),
            &registry,
            "pz_",
            None,
            clock,
        );
        assert_eq!(storage.backends(), vec![BackendKind::Session]);
    }
}
