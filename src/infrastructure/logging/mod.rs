//! Logging infrastructure
//!
//! Structured logging using tracing and tracing-subscriber, with JSON or
//! pretty stdout output. Engine events use `paramtrail::*` targets.

pub mod config;
pub mod logger;

pub use config::{LogConfig, LogFormat};
pub use logger::{parse_log_level, LoggerImpl};
