//! The attribution context: one instance per embedding.
//!
//! [`Attribution`] owns the configuration and every engine component. A
//! page load runs capture (or restoration when nothing was captured),
//! decorates the page's links and starts the dynamic observer. The host
//! then drives re-decoration:
//!
//! ```ignore
//! let mut attribution = Attribution::builder()
//!     .registry(registry)
//!     .navigation_source(navigation)
//!     .build()?;
//! LoggerImpl::init(&attribution.log_config())?;
//! attribution.initialize(&mut page);
//! while let Some(action) = attribution.next_trigger().await {
//!     attribution.handle_trigger(action, &mut page);
//! }
//! ```

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::capture_engine::CaptureEngine;
use super::dynamic_observer::{DynamicObserver, ObserverSettings, TriggerAction};
use super::link_decorator::LinkDecorator;
use super::reconciliation::{HorizonPolicy, FIRST_TOUCH_KEY, LAST_TOUCH_KEY};
use super::storage_adapter::{BackendRegistry, StorageChain};
use super::url_restorer::UrlRestorer;
use crate::adapters::SystemClock;
use crate::domain::errors::{ConfigError, DomainResult};
use crate::domain::models::{CapturedRecord, Config, ConfigPatch, ParamSet};
use crate::domain::ports::{Clock, MutationSource, NavigationSource, Page};
use crate::infrastructure::logging::LogConfig;

/// Called with the captured params and whether this was the first touch.
pub type CaptureCallback = Box<dyn Fn(&ParamSet, bool) -> anyhow::Result<()> + Send + Sync>;

/// Called with a swallowed error and the operation it came from.
pub type ErrorCallback = Box<dyn Fn(&anyhow::Error, &str) + Send + Sync>;

/// Builder for [`Attribution`].
#[derive(Default)]
pub struct AttributionBuilder {
    config: Config,
    registry: BackendRegistry,
    clock: Option<Arc<dyn Clock>>,
    on_capture: Option<CaptureCallback>,
    on_error: Option<ErrorCallback>,
    mutations: Option<Arc<dyn MutationSource>>,
    navigation: Option<Arc<dyn NavigationSource>>,
}

impl AttributionBuilder {
    #[must_use]
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn registry(mut self, registry: BackendRegistry) -> Self {
        self.registry = registry;
        self
    }

    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    #[must_use]
    pub fn on_capture<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ParamSet, bool) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_capture = Some(Box::new(callback));
        self
    }

    #[must_use]
    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(&anyhow::Error, &str) + Send + Sync + 'static,
    {
        self.on_error = Some(Box::new(callback));
        self
    }

    #[must_use]
    pub fn mutation_source(mut self, source: Arc<dyn MutationSource>) -> Self {
        self.mutations = Some(source);
        self
    }

    #[must_use]
    pub fn navigation_source(mut self, source: Arc<dyn NavigationSource>) -> Self {
        self.navigation = Some(source);
        self
    }

    /// Validate the configuration and assemble the components.
    pub fn build(self) -> DomainResult<Attribution> {
        self.config.validate()?;
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let config = self.config;

        Ok(Attribution {
            storage: storage_chain(&config, &self.registry, &clock),
            capture: CaptureEngine::new(&config, clock.clone()),
            horizons: HorizonPolicy::from_config(&config),
            decorator: LinkDecorator::new(&config),
            restorer: UrlRestorer::new(&config),
            observer: DynamicObserver::new(
                ObserverSettings::from_config(&config),
                self.mutations,
                self.navigation,
            ),
            registry: self.registry,
            clock,
            config,
            on_capture: self.on_capture,
            on_error: self.on_error,
            initialized: false,
        })
    }
}

fn storage_chain(config: &Config, registry: &BackendRegistry, clock: &Arc<dyn Clock>) -> StorageChain {
    StorageChain::new(
        &config.storage,
        registry,
        &config.storage_prefix,
        config.cookie_domain(),
        clock.clone(),
    )
}

pub struct Attribution {
    config: Config,
    registry: BackendRegistry,
    clock: Arc<dyn Clock>,
    storage: StorageChain,
    capture: CaptureEngine,
    horizons: HorizonPolicy,
    decorator: LinkDecorator,
    restorer: UrlRestorer,
    observer: DynamicObserver,
    on_capture: Option<CaptureCallback>,
    on_error: Option<ErrorCallback>,
    initialized: bool,
}

impl Attribution {
    pub fn builder() -> AttributionBuilder {
        AttributionBuilder::default()
    }

    /// Context over `registry` with the system clock and no triggers.
    pub fn new(config: Config, registry: BackendRegistry) -> DomainResult<Self> {
        Self::builder().config(config).registry(registry).build()
    }

    /// Process the page: capture or restore, decorate, start observing.
    ///
    /// Does nothing when disabled by configuration.
    pub fn initialize<P: Page + ?Sized>(&mut self, page: &mut P) {
        debug!(target: "paramtrail", config = ?self.config, "initializing");
        if !self.config.enabled {
            info!(target: "paramtrail", "disabled by config");
            return;
        }

        if self.capture(page).is_none() {
            let stored = self.current_record();
            self.restorer
                .restore(page, &self.capture, stored.as_ref());
        }

        if self.config.enable_link_decoration {
            self.decorate_links(page);
        }

        self.observer.start();
        self.initialized = true;
        debug!(target: "paramtrail", "initialized");
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Logging settings for the `debug` flag, for [`LoggerImpl::init`].
    ///
    /// [`LoggerImpl::init`]: crate::infrastructure::logging::LoggerImpl::init
    pub fn log_config(&self) -> LogConfig {
        LogConfig::from_debug_flag(self.config.debug)
    }

    /// Merge a partial update and propagate it to every component.
    ///
    /// On error the previous configuration stays in effect.
    pub fn configure(&mut self, patch: ConfigPatch) -> Result<(), ConfigError> {
        self.config.apply(patch)?;

        self.storage = storage_chain(&self.config, &self.registry, &self.clock);
        self.capture.update_config(&self.config);
        self.horizons = HorizonPolicy::from_config(&self.config);
        self.decorator.update_config(&self.config);
        self.restorer.update_config(&self.config);
        self.observer.update_config(&self.config);
        debug!(target: "paramtrail", "config updated");
        Ok(())
    }

    /// The write-once record; always `None` while disabled.
    pub fn first_touch(&self) -> Option<CapturedRecord> {
        if !self.config.enabled {
            return None;
        }
        self.storage.get(FIRST_TOUCH_KEY)
    }

    pub fn last_touch(&self) -> Option<CapturedRecord> {
        if !self.config.enabled {
            return None;
        }
        self.storage.get(LAST_TOUCH_KEY)
    }

    fn current_record(&self) -> Option<CapturedRecord> {
        self.last_touch().or_else(|| self.first_touch())
    }

    /// Params from the "last" record, falling back to "first".
    pub fn current_params(&self) -> ParamSet {
        self.current_record()
            .map(|record| record.params)
            .unwrap_or_default()
    }

    pub fn param(&self, name: &str) -> Option<String> {
        self.current_params().shift_remove(name)
    }

    /// Capture from the page URL and record it in each enabled horizon.
    ///
    /// Returns the captured params, or `None` if the URL carried none or
    /// the context is disabled.
    pub fn capture<P: Page + ?Sized>(&mut self, page: &P) -> Option<ParamSet> {
        if !self.config.enabled {
            return None;
        }
        let record = self.capture.capture(&page.query())?;
        let outcome = self.horizons.record(&self.storage, &record);

        if outcome.written {
            if let Some(callback) = &self.on_capture {
                if let Err(err) = callback(&record.params, outcome.is_first_touch) {
                    self.report(&err, "on_capture");
                }
            }
        }

        Some(record.params)
    }

    /// Decorate every eligible link with the current params.
    pub fn decorate_links<P: Page + ?Sized>(&mut self, page: &mut P) -> usize {
        if !self.config.enabled {
            return 0;
        }
        let params = self.current_params();
        self.decorator.decorate_all(page, &params)
    }

    /// Put stored params back onto the page URL.
    pub fn restore_url<P: Page + ?Sized>(&mut self, page: &mut P) -> bool {
        if !self.config.enabled {
            return false;
        }
        let stored = self.current_record();
        self.restorer.restore(page, &self.capture, stored.as_ref())
    }

    /// Remove all stored attribution and start a new decoration epoch.
    pub fn clear(&mut self) {
        self.storage.clear_all();
        self.decorator.reset();
        info!(target: "paramtrail", "cleared all data");
    }

    pub fn is_active(&self) -> bool {
        self.config.enabled && self.initialized
    }

    /// Stop observing. Stored data is kept.
    pub fn teardown(&mut self) {
        self.observer.stop();
        self.initialized = false;
        debug!(target: "paramtrail", "destroyed");
    }

    /// Wait for the next debounced trigger; `None` after teardown.
    pub async fn next_trigger(&mut self) -> Option<TriggerAction> {
        self.observer.next_action().await
    }

    /// Apply a trigger, returning how many links were decorated.
    pub fn handle_trigger<P: Page + ?Sized>(&mut self, action: TriggerAction, page: &mut P) -> usize {
        if action == TriggerAction::NewEpoch {
            self.decorator.reset();
        }
        if !self.config.enabled || !self.config.enable_link_decoration {
            return 0;
        }
        self.decorate_links(page)
    }

    fn report(&self, err: &anyhow::Error, context: &str) {
        warn!(target: "paramtrail", context, error = %err, "callback failed");
        if let Some(on_error) = &self.on_error {
            on_error(err, context);
        }
    }
}

impl std::fmt::Debug for Attribution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attribution")
            .field("config", &self.config)
            .field("storage", &self.storage)
            .field("initialized", &self.initialized)
            .finish_non_exhaustive()
    }
}
