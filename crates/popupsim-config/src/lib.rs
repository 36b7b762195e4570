// SPDX-License-Identifier: Apache-2.0
//! Scenario ingestion for PopUpSim.
//!
//! [`load_scenario`] turns a JSON file or a CSV directory into a validated
//! [`popupsim_core::scenario::Scenario`]. `popupsim-core` itself never
//! touches the filesystem or parses structured text; this crate is the
//! adapter that does, mirroring the boundary the engine draws between
//! itself and its external collaborators.
#![warn(missing_docs)]

pub mod csv;
pub mod dates;
pub mod error;
pub mod json;
pub mod raw;
pub mod validate;

use std::path::Path;

use popupsim_core::scenario::Scenario;

use crate::error::ConfigResult;
use crate::raw::RawScenario;

/// Loads, validates, and converts a scenario from `path`.
///
/// A file path is read as JSON; a directory path is read as the CSV
/// variant (§6's `tracks.csv`/`routes.csv`/... sibling-file layout).
pub fn load_scenario(path: &Path) -> ConfigResult<Scenario> {
    let raw = if path.is_dir() {
        csv::load(path)?
    } else if path.is_file() {
        json::load(path)?
    } else {
        return Err(crate::error::ConfigError::NotFound(path.display().to_string()));
    };
    raw_to_scenario(raw)
}

/// Runs structural validation and date coercion on an already-parsed
/// [`RawScenario`], producing the core engine's input type.
///
/// Split out from [`load_scenario`] so tests can build a `RawScenario` by
/// hand without touching the filesystem.
pub fn raw_to_scenario(raw: RawScenario) -> ConfigResult<Scenario> {
    validate::validate(&raw)?;

    let start = dates::parse_date(&raw.start_date)?;
    let end = dates::parse_date(&raw.end_date)?;
    let (horizon_minutes, warning) = dates::horizon_minutes(start, end)?;
    if let Some(message) = warning {
        tracing::warn!(scenario_id = %raw.scenario_id, message);
    }

    Ok(Scenario {
        scenario_id: raw.scenario_id,
        start_minutes: 0.0,
        horizon_minutes,
        track_selection_strategy: raw.track_selection_strategy,
        retrofit_selection_strategy: raw.retrofit_selection_strategy,
        parking_selection_strategy: raw.parking_selection_strategy,
        loco_delivery_strategy: raw.loco_delivery_strategy,
        parking_normal_threshold: raw.parking_normal_threshold,
        parking_critical_threshold: raw.parking_critical_threshold,
        parking_idle_check_interval: raw.parking_idle_check_interval,
        random_seed: raw.random_seed,
        tracks: raw.tracks,
        routes: raw.routes,
        locomotives: raw.locomotives,
        workshops: raw.workshops,
        trains: raw.trains,
        process_times: raw.process_times,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use popupsim_core::ids::{LocoId, RouteId, TrackId, TrainId, WorkshopId};
    use popupsim_core::model::{Coupler, TrackKind};
    use popupsim_core::scenario::{
        LocoDeliveryStrategy, LocomotiveSpec, ProcessTimes, RouteSpec, SelectionStrategy, TrackSpec, TrainSpec, WorkshopSpec,
    };

    fn minimal_raw() -> RawScenario {
        RawScenario {
            scenario_id: "s1".into(),
            start_date: "2026-01-01".into(),
            end_date: "2026-01-03".into(),
            track_selection_strategy: SelectionStrategy::FirstAvailable,
            retrofit_selection_strategy: SelectionStrategy::FirstAvailable,
            parking_selection_strategy: SelectionStrategy::FirstAvailable,
            loco_delivery_strategy: LocoDeliveryStrategy::ReturnToParking,
            parking_strategy: None,
            parking_normal_threshold: 0.7,
            parking_critical_threshold: 0.9,
            parking_idle_check_interval: 30.0,
            random_seed: 1,
            tracks: vec![
                TrackSpec {
                    id: TrackId::new("C1"),
                    kind: TrackKind::Collection,
                    length: 500.0,
                    fillfactor: 0.9,
                    max_wagons: None,
                },
                TrackSpec {
                    id: TrackId::new("W1"),
                    kind: TrackKind::Workshop,
                    length: 100.0,
                    fillfactor: 0.9,
                    max_wagons: Some(4),
                },
            ],
            routes: vec![RouteSpec {
                id: RouteId::new("R1"),
                path: vec![TrackId::new("C1"), TrackId::new("W1")],
                duration: 5.0,
            }],
            locomotives: vec![LocomotiveSpec {
                id: LocoId::new("L1"),
                home_track: TrackId::new("C1"),
                coupler_front: Coupler::Screw,
                coupler_back: Coupler::Screw,
            }],
            workshops: vec![WorkshopSpec {
                id: WorkshopId::new("WS1"),
                track: TrackId::new("W1"),
                retrofit_stations: 2,
            }],
            trains: vec![TrainSpec {
                train_id: TrainId::new("T1"),
                arrival_time: 0.0,
                arrival_track: Some(TrackId::new("C1")),
                wagons: vec![],
            }],
            process_times: ProcessTimes {
                train_to_hump_delay: 5.0,
                wagon_hump_interval: 1.0,
                screw_coupling_time: 2.0,
                screw_decoupling_time: 2.0,
                dac_coupling_time: 1.0,
                dac_decoupling_time: 1.0,
                wagon_retrofit_time: 60.0,
                loco_parking_delay: 3.0,
            },
        }
    }

    #[test]
    fn converts_a_valid_scenario() {
        let result = raw_to_scenario(minimal_raw());
        assert!(result.is_ok());
        if let Ok(scenario) = result {
            assert_eq!(scenario.scenario_id, "s1");
            assert!((scenario.horizon_minutes - 2880.0).abs() < 1e-6);
        }
    }

    #[test]
    fn rejects_unknown_route_endpoint() {
        let mut raw = minimal_raw();
        raw.routes[0].path = vec![TrackId::new("C1"), TrackId::new("GHOST")];
        assert!(matches!(raw_to_scenario(raw), Err(error::ConfigError::Validation { .. })));
    }

    #[test]
    fn rejects_workshop_on_non_workshop_track() {
        let mut raw = minimal_raw();
        raw.workshops[0].track = TrackId::new("C1");
        assert!(matches!(raw_to_scenario(raw), Err(error::ConfigError::Validation { .. })));
    }

    #[test]
    fn rejects_horizon_under_one_day() {
        let mut raw = minimal_raw();
        raw.end_date = "2026-01-01T06:00:00Z".into();
        assert!(matches!(raw_to_scenario(raw), Err(error::ConfigError::Validation { .. })));
    }
}
