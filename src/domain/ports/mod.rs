//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines the interfaces the host environment must implement:
//! - StorageBackend: one key/value storage mechanism (local/session storage)
//! - CookieJar: the document cookie string
//! - Page / LinkElement: current location, history replace, anchor elements
//! - NavigationSource / MutationSource: registerable trigger listeners
//! - Clock: wall-clock milliseconds
//!
//! These traits keep the engine independent of any concrete browser binding.

pub mod clock;
pub mod cookie_jar;
pub mod navigation;
pub mod page;
pub mod storage_backend;

pub use clock::Clock;
pub use cookie_jar::CookieJar;
pub use navigation::{
    ListenerId, MutationListener, MutationRecord, MutationSource, NavigationKind,
    NavigationListener, NavigationSource,
};
pub use page::{LinkElement, Page};
pub use storage_backend::{StorageBackend, PROBE_KEY};
