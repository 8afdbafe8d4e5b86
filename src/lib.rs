//! Paramtrail - Marketing Parameter Attribution
//!
//! Paramtrail captures marketing query parameters (`utm_*`, click IDs) from
//! the page URL, persists them through a prioritized chain of storage
//! backends, reconciles repeat visits under a first-touch, last-touch or
//! merge policy, and propagates the stored parameters onto outbound links,
//! including links that appear after client-side navigation.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Models, errors and the ports the host implements
//! - **Adapters** (`adapters`): In-memory host bindings (storage, cookies, page, triggers)
//! - **Service Layer** (`services`): The attribution engine
//! - **Infrastructure Layer** (`infrastructure`): Configuration loading and logging
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use paramtrail::{Attribution, BackendRegistry, Config, InMemoryPage, MemoryWebStorage};
//!
//! let registry = BackendRegistry::new().with_local(Arc::new(MemoryWebStorage::local()));
//! let mut attribution = Attribution::new(Config::default(), registry)?;
//! let mut page = InMemoryPage::new("https://shop.example.com/?utm_source=google")?;
//! attribution.initialize(&mut page);
//! assert_eq!(attribution.param("utm_source").as_deref(), Some("google"));
//! ```

pub mod adapters;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use adapters::{
    Anchor, InMemoryPage, ManualClock, ManualMutationSource, ManualNavigationSource,
    MemoryCookieJar, MemoryWebStorage, SystemClock,
};
pub use domain::errors::{ConfigError, DomainError, DomainResult, StorageError};
pub use domain::models::{
    BackendChain, BackendKind, CapturedRecord, Config, ConfigPatch, ExistingParamBehavior,
    LinkSelector, ParamSet, ReconcileMode,
};
pub use domain::ports::{
    Clock, CookieJar, LinkElement, MutationSource, NavigationKind, NavigationSource, Page,
    StorageBackend,
};
pub use infrastructure::config::ConfigLoader;
pub use infrastructure::logging::{LogConfig, LoggerImpl};
pub use services::{
    match_any_glob, match_domain, match_glob, Attribution, AttributionBuilder, BackendRegistry,
    LinkDecorator, StorageChain, TriggerAction,
};
