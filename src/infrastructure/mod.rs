//! Infrastructure layer module
//!
//! - Configuration loading (figment: defaults, YAML, environment)
//! - Logging setup (tracing-subscriber)

pub mod config;
pub mod logging;
