//! Domain errors for the paramtrail attribution engine.

use thiserror::Error;

/// Failures raised by a single storage backend.
///
/// These never escape the storage chain: the chain logs them and falls
/// through to the next backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("Storage backend unavailable: {0}")]
    Unavailable(String),

    #[error("Storage quota exceeded: {used} bytes used, limit {limit}")]
    QuotaExceeded { used: usize, limit: usize },

    #[error("Payload of {size} bytes exceeds the {limit} byte budget")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("Storage access denied: {0}")]
    AccessDenied(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

/// Configuration validation errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Unknown storage backend: {0}. Must be one of: localStorage, sessionStorage, cookie")]
    UnknownBackend(String),

    #[error("Storage backend chain cannot be empty")]
    EmptyBackendChain,

    #[error("Storage prefix cannot be empty")]
    EmptyStoragePrefix,

    #[error("Parameter prefix cannot be empty")]
    EmptyParamPrefix,

    #[error("Invalid exclude selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("Invalid allowed domain: '{0}'")]
    InvalidDomain(String),

    #[error("Invalid debounce delay for {0}: must be greater than zero")]
    InvalidDebounce(&'static str),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Errors reported by host-side collaborators (page location, history).
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("History update rejected: {0}")]
    HistoryRejected(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}
