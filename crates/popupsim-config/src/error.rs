// SPDX-License-Identifier: Apache-2.0
//! Error type for scenario ingestion and validation.

use thiserror::Error;

/// Everything that can go wrong turning a scenario file (or CSV directory)
/// into a validated [`popupsim_core::scenario::Scenario`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The scenario path is neither a readable file nor a directory.
    #[error("scenario path not found: {0}")]
    NotFound(String),
    /// Reading the scenario file(s) failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// The JSON body did not match the expected scenario shape.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    /// A CSV row did not match the expected shape for its file.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    /// A date field was not valid ISO-8601.
    #[error("invalid date: {0}")]
    Date(String),
    /// Structural validation (§4.14) rejected the scenario.
    #[error("{field_path}: {message}")]
    Validation {
        /// Dotted path to the offending field, e.g. `routes[2].path`.
        field_path: String,
        /// Human-readable description of the failure.
        message: String,
    },
}

/// Convenience alias for this crate's fallible operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
