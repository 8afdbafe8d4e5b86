pub mod config;
pub mod link;
pub mod params;
pub mod selector;

pub use config::{
    BackendChain, BackendKind, Config, ConfigPatch, ExistingParamBehavior, ReconcileMode,
    DEFAULT_EXCLUDE_PATTERNS,
};
pub use link::LinkId;
pub use params::{CapturedRecord, ParamSet, StoredItem, MS_PER_DAY};
pub use selector::{LinkSelector, DEFAULT_EXCLUDE_SELECTOR};
