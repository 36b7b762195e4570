// SPDX-License-Identifier: Apache-2.0
//! Error type for report export.

use thiserror::Error;

/// Everything that can go wrong writing a finished run's event log or KPI
/// report to disk.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Writing the output file failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// JSON encoding failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    /// CSV encoding failed.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

/// Convenience alias for this crate's fallible operations.
pub type ReportResult<T> = Result<T, ReportError>;
