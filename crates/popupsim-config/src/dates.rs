// SPDX-License-Identifier: Apache-2.0
//! ISO-8601 date handling for the scenario horizon.
//!
//! The core engine only ever sees minutes from a `0.0` start (§1); this
//! module is where the wall-clock `start_date`/`end_date` pair gets
//! collapsed down to that single `horizon_minutes` float.

use chrono::{DateTime, NaiveDate, Utc};

use crate::error::ConfigError;

const MINUTES_PER_DAY: f64 = 24.0 * 60.0;
const WARN_HORIZON_DAYS: f64 = 365.0;
const MIN_HORIZON_DAYS: f64 = 1.0;

/// Parses an ISO-8601 date or date-time string, coercing to UTC.
///
/// Accepts both a full RFC 3339 timestamp (`2026-01-05T00:00:00Z`) and a
/// bare calendar date (`2026-01-05`), matching the two forms scenario
/// authors actually write by hand.
pub fn parse_date(raw: &str) -> Result<DateTime<Utc>, ConfigError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return Ok(DateTime::from_naive_utc_and_offset(dt, Utc));
        }
    }
    Err(ConfigError::Date(raw.to_string()))
}

/// Computes the simulation horizon in minutes and any non-fatal warning
/// message (§4.14: a span over 365 days warns rather than fails).
pub fn horizon_minutes(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(f64, Option<String>), ConfigError> {
    if end <= start {
        return Err(ConfigError::Validation {
            field_path: "end_date".into(),
            message: "end_date must be strictly after start_date".into(),
        });
    }
    let minutes = (end - start).num_seconds() as f64 / 60.0;
    let days = minutes / MINUTES_PER_DAY;
    if days < MIN_HORIZON_DAYS {
        return Err(ConfigError::Validation {
            field_path: "end_date".into(),
            message: format!("horizon of {days:.2} days is below the 1-day minimum"),
        });
    }
    let warning = (days > WARN_HORIZON_DAYS).then(|| format!("horizon of {days:.1} days exceeds the 365-day guideline"));
    Ok((minutes, warning))
}
