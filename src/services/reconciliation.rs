//! Reconciliation of new captures with stored attribution.
//!
//! [`reconcile`] is the pure policy: given the prior record and a new
//! capture it decides what to persist. [`HorizonPolicy`] applies it to the
//! two stored horizons, "first" (write-once) and "last" (configured mode),
//! each with its own TTL.

use tracing::{debug, warn};

use super::storage_adapter::StorageChain;
use crate::domain::models::{CapturedRecord, Config, ReconcileMode};

/// Storage name of the write-once horizon.
pub const FIRST_TOUCH_KEY: &str = "first";

/// Storage name of the continuously updated horizon.
pub const LAST_TOUCH_KEY: &str = "last";

/// Separator between accumulated values under [`ReconcileMode::Merge`].
pub const MERGE_DELIMITER: char = '|';

/// Policy decision for one horizon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// Persist `record`, replacing whatever was stored
    Write {
        record: CapturedRecord,
        is_first_touch: bool,
    },
    /// Discard the capture; nothing is written
    Unchanged,
}

/// Decide what to persist for a new capture.
pub fn reconcile(
    mode: ReconcileMode,
    prior: Option<&CapturedRecord>,
    incoming: CapturedRecord,
) -> Reconciliation {
    let Some(prior) = prior else {
        return Reconciliation::Write {
            record: incoming,
            is_first_touch: true,
        };
    };

    match mode {
        ReconcileMode::FirstTouch => Reconciliation::Unchanged,
        ReconcileMode::LastTouch => Reconciliation::Write {
            record: incoming,
            is_first_touch: false,
        },
        ReconcileMode::Merge => Reconciliation::Write {
            record: merge(prior, &incoming),
            is_first_touch: false,
        },
    }
}

/// Fold `incoming` into `prior`, appending values not already present.
///
/// Incoming values are split on [`MERGE_DELIMITER`] so each part is
/// deduplicated on its own. The prior timestamp is kept.
pub fn merge(prior: &CapturedRecord, incoming: &CapturedRecord) -> CapturedRecord {
    let mut merged = prior.clone();
    for (name, value) in &incoming.params {
        let mut parts = value.split(MERGE_DELIMITER).filter(|part| !part.is_empty()).peekable();
        if parts.peek().is_none() {
            continue;
        }
        let existing = merged.params.entry(name.clone()).or_default();
        for part in parts {
            if existing.split(MERGE_DELIMITER).any(|v| v == part) {
                continue;
            }
            if !existing.is_empty() {
                existing.push(MERGE_DELIMITER);
            }
            existing.push_str(part);
        }
    }
    merged
}

/// Result of recording a capture across both horizons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CaptureOutcome {
    /// At least one horizon was persisted
    pub written: bool,
    /// This capture is the visitor's first touch
    pub is_first_touch: bool,
}

/// Horizon settings taken from the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HorizonPolicy {
    pub enable_first: bool,
    pub enable_last: bool,
    pub mode: ReconcileMode,
    pub first_ttl_days: u32,
    pub last_ttl_days: u32,
}

impl HorizonPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            enable_first: config.enable_first_touch,
            enable_last: config.enable_last_touch,
            mode: config.reconcile_mode,
            first_ttl_days: config.first_touch_ttl,
            last_ttl_days: config.last_touch_ttl,
        }
    }

    /// Reconcile `incoming` with each enabled horizon and persist the result.
    ///
    /// `is_first_touch` comes from the "first" horizon when it is enabled,
    /// otherwise from the "last" horizon.
    pub fn record(&self, storage: &StorageChain, incoming: &CapturedRecord) -> CaptureOutcome {
        let mut outcome = CaptureOutcome::default();

        if self.enable_first {
            let decision = reconcile(
                ReconcileMode::FirstTouch,
                storage.get(FIRST_TOUCH_KEY).as_ref(),
                incoming.clone(),
            );
            if let Some(first_touch) = Self::persist(storage, FIRST_TOUCH_KEY, decision, self.first_ttl_days) {
                outcome.written = true;
                outcome.is_first_touch = first_touch;
            }
        }

        if self.enable_last {
            let decision = reconcile(
                self.mode,
                storage.get(LAST_TOUCH_KEY).as_ref(),
                incoming.clone(),
            );
            if let Some(first_touch) = Self::persist(storage, LAST_TOUCH_KEY, decision, self.last_ttl_days) {
                outcome.written = true;
                if !self.enable_first {
                    outcome.is_first_touch = first_touch;
                }
            }
        }

        outcome
    }

    fn persist(
        storage: &StorageChain,
        name: &str,
        decision: Reconciliation,
        ttl_days: u32,
    ) -> Option<bool> {
        match decision {
            Reconciliation::Unchanged => {
                debug!(target: "paramtrail::reconcile", horizon = name, "existing record kept");
                None
            }
            Reconciliation::Write {
                record,
                is_first_touch,
            } => {
                if storage.set(name, &record, ttl_days) {
                    Some(is_first_touch)
                } else {
                    warn!(target: "paramtrail::reconcile", horizon = name, "record could not be persisted");
                    None
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::ParamSet;

    fn record(pairs: &[(&str, &str)], timestamp: i64) -> CapturedRecord {
        let params: ParamSet = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        CapturedRecord::new(params, timestamp)
    }

    #[test]
    fn test_no_prior_always_writes_first_touch() {
        for mode in [ReconcileMode::FirstTouch, ReconcileMode::LastTouch, ReconcileMode::Merge] {
            let incoming = record(&[("utm_source", "google")], 1);
            assert_eq!(
                reconcile(mode, None, incoming.clone()),
                Reconciliation::Write {
                    record: incoming,
                    is_first_touch: true
                }
            );
        }
    }

    #[test]
    fn test_first_touch_discards_later_captures() {
        let prior = record(&[("utm_source", "google")], 1);
        let incoming = record(&[("utm_source", "bing")], 2);
        assert_eq!(
            reconcile(ReconcileMode::FirstTouch, Some(&prior), incoming),
            Reconciliation::Unchanged
        );
    }

    #[test]
    fn test_last_touch_replaces() {
        let prior = record(&[("utm_source", "google"), ("utm_medium", "cpc")], 1);
        let incoming = record(&[("utm_source", "bing")], 2);
        assert_eq!(
            reconcile(ReconcileMode::LastTouch, Some(&prior), incoming.clone()),
            Reconciliation::Write {
                record: incoming,
                is_first_touch: false
            }
        );
    }

    #[test]
    fn test_merge_accumulates_without_duplicates() {
        let prior = record(&[("source", "google")], 1);
        let merged = merge(&prior, &record(&[("source", "facebook"), ("medium", "social")], 2));
        assert_eq!(merged.get("source"), Some("google|facebook"));
        assert_eq!(merged.get("medium"), Some("social"));
        assert_eq!(merged.timestamp, 1);

        let again = merge(&merged, &record(&[("source", "google")], 3));
        assert_eq!(again.get("source"), Some("google|facebook"));
        let again = merge(&again, &record(&[("source", "facebook")], 4));
        assert_eq!(again.get("source"), Some("google|facebook"));
    }

    #[test]
    fn test_merge_matches_whole_values_only() {
        let prior = record(&[("source", "googleads")], 1);
        let merged = merge(&prior, &record(&[("source", "google")], 2));
        assert_eq!(merged.get("source"), Some("googleads|google"));
    }

    #[test]
    fn test_merge_splits_delimited_incoming_values() {
        let prior = record(&[("source", "a")], 1);
        let merged = merge(&prior, &record(&[("source", "a|b")], 2));
        assert_eq!(merged.get("source"), Some("a|b"));

        let again = merge(&merged, &record(&[("source", "a|b")], 3));
        assert_eq!(again.get("source"), Some("a|b"));

        let fresh = merge(&prior, &record(&[("medium", "x||x|y")], 2));
        assert_eq!(fresh.get("medium"), Some("x|y"));

        let blank = merge(&prior, &record(&[("medium", "|")], 2));
        assert_eq!(blank.get("medium"), None);
    }

    #[test]
    fn test_failed_persist_is_not_reported_as_written() {
        use std::sync::Arc;

        use crate::adapters::{ManualClock, MemoryWebStorage};
        use crate::domain::models::BackendChain;
        use crate::services::storage_adapter::BackendRegistry;

        let local = Arc::new(MemoryWebStorage::local());
        let storage = StorageChain::new(
            &BackendChain::parse("localStorage").unwrap(),
            &BackendRegistry::new().with_local(local.clone()),
            "pz_",
            None,
            Arc::new(ManualClock::new(1)),
        );
        let policy = HorizonPolicy::from_config(&Config::default());
        let incoming = record(&[("utm_source", "google")], 1);

        local.set_enabled(false);
        assert_eq!(policy.record(&storage, &incoming), CaptureOutcome::default());

        local.set_enabled(true);
        let outcome = policy.record(&storage, &incoming);
        assert!(outcome.written);
        assert!(outcome.is_first_touch);
    }

    #[test]
    fn test_merge_mode_reports_not_first_touch() {
        let prior = record(&[("source", "google")], 1);
        match reconcile(ReconcileMode::Merge, Some(&prior), record(&[("source", "google")], 2)) {
            Reconciliation::Write {
                record,
                is_first_touch,
            } => {
                assert!(!is_first_touch);
                assert_eq!(record, prior);
            }
            Reconciliation::Unchanged => panic!("merge always writes"),
        }
    }
}
