//! Common test utilities for integration tests
//!
//! Provides shared fixtures for building an attribution context over
//! in-memory host adapters.

use std::sync::Arc;

use paramtrail::{
    Attribution, BackendRegistry, Config, InMemoryPage, ManualClock, MemoryCookieJar,
    MemoryWebStorage,
};

/// 2023-11-14T22:13:20Z
#[allow(dead_code)]
pub const NOW: i64 = 1_700_000_000_000;

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
/// Call this at the beginning of tests that need logging.
#[allow(dead_code)]
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Every host storage mechanism, in memory, sharing one clock.
#[allow(dead_code)]
pub struct Host {
    pub clock: Arc<ManualClock>,
    pub local: Arc<MemoryWebStorage>,
    pub session: Arc<MemoryWebStorage>,
    pub cookies: Arc<MemoryCookieJar>,
}

#[allow(dead_code)]
impl Host {
    pub fn new() -> Self {
        let clock = Arc::new(ManualClock::new(NOW));
        Self {
            cookies: Arc::new(MemoryCookieJar::new(clock.clone())),
            local: Arc::new(MemoryWebStorage::local()),
            session: Arc::new(MemoryWebStorage::session()),
            clock,
        }
    }

    pub fn registry(&self) -> BackendRegistry {
        BackendRegistry::new()
            .with_local(self.local.clone())
            .with_session(self.session.clone())
            .with_cookie_jar(self.cookies.clone())
    }

    pub fn attribution(&self, config: Config) -> Attribution {
        Attribution::builder()
            .config(config)
            .registry(self.registry())
            .clock(self.clock.clone())
            .build()
            .expect("valid config")
    }
}

/// Page at `url`, panicking on a malformed fixture
#[allow(dead_code)]
pub fn page(url: &str) -> InMemoryPage {
    InMemoryPage::new(url).expect("valid fixture URL")
}
