// SPDX-License-Identifier: Apache-2.0
//! Structural validation (§4.14), run before a [`popupsim_core::scenario::Scenario`]
//! is ever constructed.
//!
//! Coupler and strategy fields are already constrained to their valid
//! enumerations by `serde` at parse time, so only the numeric and
//! cross-referential checks need to happen here.

use std::collections::HashSet;

use popupsim_core::model::TrackKind;

use crate::error::{ConfigError, ConfigResult};
use crate::raw::RawScenario;

fn fail(field_path: impl Into<String>, message: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field_path: field_path.into(),
        message: message.into(),
    }
}

/// Validates cross-references and numeric constraints across the whole
/// scenario. Does not validate the date range; see [`crate::dates::horizon_minutes`]
/// for that, which is run separately because it needs parsed dates.
pub fn validate(raw: &RawScenario) -> ConfigResult<()> {
    let track_ids: HashSet<&str> = raw.tracks.iter().map(|t| t.id.as_str()).collect();

    for (i, track) in raw.tracks.iter().enumerate() {
        if track.length <= 0.0 {
            return Err(fail(format!("tracks[{i}].length"), "must be greater than 0"));
        }
        if !(0.0..=1.0).contains(&track.fillfactor) || track.fillfactor <= 0.0 {
            return Err(fail(format!("tracks[{i}].fillfactor"), "must be in (0, 1]"));
        }
    }

    for (i, route) in raw.routes.iter().enumerate() {
        if route.path.len() < 2 {
            return Err(fail(format!("routes[{i}].path"), "must have at least 2 entries"));
        }
        if route.duration < 0.0 {
            return Err(fail(format!("routes[{i}].duration"), "must be non-negative"));
        }
        for (j, track_id) in route.path.iter().enumerate() {
            if !track_ids.contains(track_id.as_str()) {
                return Err(fail(format!("routes[{i}].path[{j}]"), format!("unknown track {track_id}")));
            }
        }
    }

    for (i, loco) in raw.locomotives.iter().enumerate() {
        if !track_ids.contains(loco.home_track.as_str()) {
            return Err(fail(format!("locomotives[{i}].home_track"), format!("unknown track {}", loco.home_track)));
        }
    }

    for (i, workshop) in raw.workshops.iter().enumerate() {
        if workshop.retrofit_stations < 1 {
            return Err(fail(format!("workshops[{i}].retrofit_stations"), "must be at least 1"));
        }
        let Some(track) = raw.tracks.iter().find(|t| t.id == workshop.track) else {
            return Err(fail(format!("workshops[{i}].track"), format!("unknown track {}", workshop.track)));
        };
        if track.kind != TrackKind::Workshop {
            return Err(fail(format!("workshops[{i}].track"), format!("track {} is not of type workshop", workshop.track)));
        }
    }

    for (ti, train) in raw.trains.iter().enumerate() {
        if let Some(arrival_track) = &train.arrival_track {
            if !track_ids.contains(arrival_track.as_str()) {
                return Err(fail(format!("trains[{ti}].arrival_track"), format!("unknown track {arrival_track}")));
            }
        }
        for (wi, wagon) in train.wagons.iter().enumerate() {
            if wagon.length <= 0.0 {
                return Err(fail(format!("trains[{ti}].wagons[{wi}].length"), "must be greater than 0"));
            }
        }
    }

    Ok(())
}
