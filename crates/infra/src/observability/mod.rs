//! Observability infrastructure
//!
//! Structured logging to stdout and a daily-rolling file.

pub mod logging;

pub use logging::{init_logging, LoggingGuard};
