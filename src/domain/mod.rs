//! Domain layer for the paramtrail attribution engine
//!
//! This module contains the data model (parameter sets, captured records,
//! stored items, configuration) and the port traits the host environment
//! implements (storage backends, cookie jar, page, navigation sources).

pub mod errors;
pub mod models;
pub mod ports;

// Re-export error types for convenient access
pub use errors::{ConfigError, DomainError, DomainResult, StorageError, StorageResult};
