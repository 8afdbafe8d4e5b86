use crate::domain::errors::StorageResult;
use crate::domain::models::BackendKind;

/// Key written and removed by the availability probe.
pub const PROBE_KEY: &str = "__pz_test__";

/// A single string-only key/value storage mechanism.
///
/// Implementations report failures (quota, disabled storage, security
/// restrictions) as [`StorageError`](crate::domain::errors::StorageError);
/// the storage chain treats every error as "this backend did not help" and
/// moves on to the next one.
pub trait StorageBackend: Send + Sync {
    /// Which kind of backend this is
    fn kind(&self) -> BackendKind;

    /// Read the raw payload stored under `key`
    fn read(&self, key: &str) -> StorageResult<Option<String>>;

    /// Store `value` under `key`
    ///
    /// `expires_at` is the item's expiry in Unix milliseconds (`0` for
    /// never). Backends with native expiry (cookies) may use it; others
    /// ignore it and rely on the expiry recorded inside the payload.
    fn write(&self, key: &str, value: &str, expires_at: i64) -> StorageResult<()>;

    /// Delete `key`, succeeding if it was already absent
    fn remove(&self, key: &str) -> StorageResult<()>;

    /// List every key currently held
    fn keys(&self) -> StorageResult<Vec<String>>;

    /// Check the backend works right now with a write/read/delete cycle.
    ///
    /// Called before every use; results are never cached.
    fn probe(&self) -> bool {
        if self.write(PROBE_KEY, "1", 0).is_err() {
            return false;
        }
        let readable = matches!(self.read(PROBE_KEY), Ok(Some(ref v)) if v == "1");
        let removed = self.remove(PROBE_KEY).is_ok();
        readable && removed
    }
}
