//! Extraction of attribution parameters from a query string.
//!
//! A parameter is eligible when its name is listed exactly or starts with
//! one of the configured prefixes, and is not explicitly excluded.
//! Exclusion always wins.

use std::sync::Arc;

use tracing::debug;
use url::form_urlencoded;

use crate::domain::models::{CapturedRecord, Config, ParamSet};
use crate::domain::ports::Clock;

/// Decode a query string (with or without the leading `?`).
///
/// Later occurrences of a name overwrite earlier ones while keeping the
/// position of the first occurrence.
pub fn parse_query(query: &str) -> ParamSet {
    let query = query.strip_prefix('?').unwrap_or(query);
    let mut params = ParamSet::new();
    for (name, value) in form_urlencoded::parse(query.as_bytes()) {
        params.insert(name.into_owned(), value.into_owned());
    }
    params
}

/// Captures eligible parameters into records.
pub struct CaptureEngine {
    params: Vec<String>,
    prefixes: Vec<String>,
    exclude: Vec<String>,
    clock: Arc<dyn Clock>,
}

impl CaptureEngine {
    pub fn new(config: &Config, clock: Arc<dyn Clock>) -> Self {
        Self {
            params: config.params.clone(),
            prefixes: config.param_prefixes.clone(),
            exclude: config.exclude_params.clone(),
            clock,
        }
    }

    pub fn update_config(&mut self, config: &Config) {
        self.params.clone_from(&config.params);
        self.prefixes.clone_from(&config.param_prefixes);
        self.exclude.clone_from(&config.exclude_params);
    }

    pub fn should_capture(&self, name: &str) -> bool {
        if self.exclude.iter().any(|e| e == name) {
            return false;
        }
        if self.params.iter().any(|p| p == name) {
            return true;
        }
        self.prefixes.iter().any(|prefix| name.starts_with(prefix.as_str()))
    }

    /// Capture eligible, non-empty parameters.
    ///
    /// Returns `None` rather than an empty record when nothing qualifies.
    pub fn capture(&self, query: &str) -> Option<CapturedRecord> {
        let captured: ParamSet = parse_query(query)
            .into_iter()
            .filter(|(name, value)| !value.is_empty() && self.should_capture(name))
            .collect();

        if captured.is_empty() {
            debug!(target: "paramtrail::capture", "no matching params in URL");
            return None;
        }

        debug!(target: "paramtrail::capture", params = ?captured, "captured");
        Some(CapturedRecord::new(captured, self.clock.now_millis()))
    }

    /// True if any eligible parameter is present, even with an empty value.
    pub fn has_params(&self, query: &str) -> bool {
        parse_query(query).keys().any(|name| self.should_capture(name))
    }
}

impl std::fmt::Debug for CaptureEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureEngine")
            .field("params", &self.params)
            .field("prefixes", &self.prefixes)
            .field("exclude", &self.exclude)
            .finish_non_exhaustive()
    }
}
