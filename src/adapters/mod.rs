//! Host-side adapters for the domain ports.
//!
//! In-memory implementations used for embedding the engine outside a
//! browser binding and for tests.

pub mod clock;
pub mod cookie_jar;
pub mod page;
pub mod triggers;
pub mod web_storage;

pub use clock::{ManualClock, SystemClock};
pub use cookie_jar::{MemoryCookieJar, StoredCookie};
pub use page::{Anchor, InMemoryPage};
pub use triggers::{ListenerRegistry, ManualMutationSource, ManualNavigationSource};
pub use web_storage::MemoryWebStorage;
