//! Attribution snapshots and their persisted envelope.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Milliseconds in one day, used to turn TTL days into an expiry instant.
pub const MS_PER_DAY: i64 = 86_400_000;

/// Captured parameter name to value mapping.
///
/// Insertion order is kept so serialized payloads are deterministic.
pub type ParamSet = IndexMap<String, String>;

/// One attribution snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedRecord {
    /// Captured parameters (never empty for records produced by capture)
    pub params: ParamSet,

    /// Capture time in Unix milliseconds
    pub timestamp: i64,
}

impl CapturedRecord {
    pub fn new(params: ParamSet, timestamp: i64) -> Self {
        Self { params, timestamp }
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

/// The unit written to a storage backend.
///
/// Serialized as `{"data":{"params":{..},"timestamp":..},"expiresAt":..}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredItem {
    pub data: CapturedRecord,

    /// Expiry in Unix milliseconds, `0` means never
    pub expires_at: i64,
}

impl StoredItem {
    /// Sentinel for items without expiry.
    pub const NEVER_EXPIRES: i64 = 0;

    /// Wrap a record, computing the expiry from a TTL in days.
    pub fn new(data: CapturedRecord, ttl_days: u32, now_ms: i64) -> Self {
        let expires_at = if ttl_days > 0 {
            now_ms.saturating_add(i64::from(ttl_days).saturating_mul(MS_PER_DAY))
        } else {
            Self::NEVER_EXPIRES
        };
        Self { data, expires_at }
    }

    pub fn is_expired(&self, now_ms: i64) -> bool {
        self.expires_at > 0 && now_ms > self.expires_at
    }

    pub fn to_payload(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_payload(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> CapturedRecord {
        let mut params = ParamSet::new();
        params.insert("utm_source".to_string(), "google".to_string());
        params.insert("utm_medium".to_string(), "cpc".to_string());
        CapturedRecord::new(params, 1_700_000_000_000)
    }

    #[test]
    fn test_expiry_from_ttl_days() {
        let item = StoredItem::new(record(), 30, 1_000);
        assert_eq!(item.expires_at, 1_000 + 30 * MS_PER_DAY);

        let forever = StoredItem::new(record(), 0, 1_000);
        assert_eq!(forever.expires_at, StoredItem::NEVER_EXPIRES);
        assert!(!forever.is_expired(i64::MAX));
    }

    #[test]
    fn test_is_expired_only_after_deadline() {
        let item = StoredItem::new(record(), 1, 0);
        assert!(!item.is_expired(MS_PER_DAY));
        assert!(item.is_expired(MS_PER_DAY + 1));
    }

    #[test]
    fn test_payload_layout() {
        let item = StoredItem::new(record(), 0, 0);
        let payload = item.to_payload().unwrap();
        assert_eq!(
            payload,
            r#"{"data":{"params":{"utm_source":"google","utm_medium":"cpc"},"timestamp":1700000000000},"expiresAt":0}"#
        );
        assert_eq!(StoredItem::from_payload(&payload).unwrap(), item);
    }

    #[test]
    fn test_malformed_payload_is_error() {
        assert!(StoredItem::from_payload("{not json").is_err());
        assert!(StoredItem::from_payload(r#"{"data":{}}"#).is_err());
    }
}
