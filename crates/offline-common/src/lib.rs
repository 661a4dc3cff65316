//! # Offline Common
//!
//! Logging configuration shared by the offline worker crates.
//!
//! ## Features
//!
//! - `tracing` subscriber setup with `EnvFilter` support
//! - Pretty, compact and JSON output formats

use thiserror::Error;

pub mod logging;

pub use logging::{init_logging, try_init_logging, LogConfig, LogFormat};

/// Errors raised while configuring logging.
#[derive(Error, Debug)]
pub enum LoggingError {
    /// The filter directive could not be parsed.
    #[error("Invalid log filter '{filter}': {message}")]
    InvalidFilter { filter: String, message: String },

    /// The log format name is unknown.
    #[error("Unknown log format: {0}")]
    UnknownFormat(String),

    /// A global subscriber was already installed.
    #[error("Logging already initialized: {0}")]
    AlreadyInitialized(String),
}
