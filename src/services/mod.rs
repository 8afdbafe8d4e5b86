//! Attribution engine services.

pub mod attribution;
pub mod capture_engine;
pub mod cookie_backend;
pub mod dynamic_observer;
pub mod link_decorator;
pub mod pattern_matcher;
pub mod reconciliation;
pub mod storage_adapter;
pub mod url_restorer;

pub use attribution::{Attribution, AttributionBuilder, CaptureCallback, ErrorCallback};
pub use capture_engine::{parse_query, CaptureEngine};
pub use cookie_backend::{CookieBackend, MAX_COOKIE_PAYLOAD};
pub use dynamic_observer::{DynamicObserver, ObserverSettings, TriggerAction};
pub use link_decorator::{apply_params, LinkDecorator, SkipReason};
pub use pattern_matcher::{match_any_glob, match_domain, match_glob, GlobSet};
pub use reconciliation::{
    merge, reconcile, CaptureOutcome, HorizonPolicy, Reconciliation, FIRST_TOUCH_KEY,
    LAST_TOUCH_KEY, MERGE_DELIMITER,
};
pub use storage_adapter::{BackendRegistry, StorageChain};
pub use url_restorer::UrlRestorer;
