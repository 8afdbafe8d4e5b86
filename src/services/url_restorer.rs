//! Restores stored attribution onto a page URL that arrived without it.

use tracing::{debug, warn};

use super::capture_engine::CaptureEngine;
use crate::domain::models::{CapturedRecord, Config};
use crate::domain::ports::Page;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UrlRestorer {
    enabled: bool,
    only_if_empty: bool,
}

impl UrlRestorer {
    pub fn new(config: &Config) -> Self {
        Self {
            enabled: config.enable_url_restoration,
            only_if_empty: config.restore_only_if_empty,
        }
    }

    pub fn update_config(&mut self, config: &Config) {
        *self = Self::new(config);
    }

    /// Add stored parameters missing from the page URL, replacing the
    /// current history entry. Returns true if the URL was modified.
    pub fn restore<P: Page + ?Sized>(
        &self,
        page: &mut P,
        capture: &CaptureEngine,
        stored: Option<&CapturedRecord>,
    ) -> bool {
        if !self.enabled {
            return false;
        }
        let Some(stored) = stored.filter(|r| !r.is_empty()) else {
            return false;
        };

        if self.only_if_empty && capture.has_params(&page.query()) {
            debug!(target: "paramtrail::restorer", "URL already has params, skipping restoration");
            return false;
        }

        let mut url = page.location();
        let present: Vec<String> = url.query_pairs().map(|(name, _)| name.into_owned()).collect();
        let missing: Vec<(&String, &String)> = stored
            .params
            .iter()
            .filter(|(name, _)| !present.contains(name))
            .collect();
        if missing.is_empty() {
            return false;
        }

        url.query_pairs_mut().extend_pairs(missing);
        match page.replace_location(&url) {
            Ok(()) => {
                debug!(target: "paramtrail::restorer", url = %url, "restored params to URL");
                true
            }
            Err(err) => {
                warn!(target: "paramtrail::restorer", error = %err, "failed to restore URL");
                false
            }
        }
    }
}
