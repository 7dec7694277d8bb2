//! # Core Error Types
//!
//! Tick-path operations never fail: inconsistencies degrade to logged
//! no-ops. Errors only surface while loading configuration.

use thiserror::Error;

/// Errors that can occur while setting up the core.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The configuration text is not valid TOML for the expected schema.
    #[error("failed to parse configuration: {0}")]
    ConfigParse(String),

    /// The configuration file could not be read.
    #[error("failed to read configuration from {path}: {message}")]
    ConfigIo {
        /// Path that was read.
        path: String,
        /// Underlying I/O error.
        message: String,
    },
}

/// Result type for core setup operations.
pub type CoreResult<T> = Result<T, CoreError>;
