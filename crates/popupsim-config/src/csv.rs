// SPDX-License-Identifier: Apache-2.0
//! CSV scenario loading: a directory of sibling files, one per scenario
//! section, per `original_source`'s `csv_data_source_adapter.py`.
//!
//! `routes.csv`'s `path` column is the one field with no natural flat CSV
//! representation; it is written as a `|`-separated list of track ids
//! (`T1|T2|T3`), in traversal order.

use std::path::Path;

use serde::Deserialize;

use popupsim_core::ids::{LocoId, RouteId, TrackId, TrainId, WorkshopId};
use popupsim_core::model::{Coupler, TrackKind};
use popupsim_core::scenario::{
    LocoDeliveryStrategy, LocomotiveSpec, ProcessTimes, RouteSpec, SelectionStrategy, TrackSpec,
    TrainSpec, WagonManifestEntry, WorkshopSpec,
};

use crate::error::ConfigResult;
use crate::raw::RawScenario;

#[derive(Debug, Deserialize)]
struct ScenarioRow {
    scenario_id: String,
    start_date: String,
    end_date: String,
    track_selection_strategy: SelectionStrategy,
    retrofit_selection_strategy: SelectionStrategy,
    parking_selection_strategy: SelectionStrategy,
    loco_delivery_strategy: LocoDeliveryStrategy,
    parking_normal_threshold: f64,
    parking_critical_threshold: f64,
    parking_idle_check_interval: f64,
    #[serde(default)]
    random_seed: u64,
}

#[derive(Debug, Deserialize)]
struct TrackRow {
    id: TrackId,
    #[serde(rename = "type")]
    kind: TrackKind,
    length: f64,
    fillfactor: f64,
    max_wagons: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RouteRow {
    id: RouteId,
    path: String,
    duration: f64,
}

#[derive(Debug, Deserialize)]
struct LocomotiveRow {
    id: LocoId,
    home_track: TrackId,
    coupler_front: Coupler,
    coupler_back: Coupler,
}

#[derive(Debug, Deserialize)]
struct WorkshopRow {
    id: WorkshopId,
    track: TrackId,
    retrofit_stations: u32,
}

#[derive(Debug, Deserialize)]
struct TrainRow {
    train_id: TrainId,
    arrival_time: f64,
    arrival_track: Option<TrackId>,
}

#[derive(Debug, Deserialize)]
struct WagonRow {
    train_id: TrainId,
    id: String,
    length: f64,
    is_loaded: bool,
    needs_retrofit: bool,
    coupler_a: Coupler,
    coupler_b: Coupler,
}

fn read_rows<T>(path: &Path) -> ConfigResult<Vec<T>>
where
    T: for<'de> Deserialize<'de>,
{
    let mut reader = ::csv::Reader::from_path(path)?;
    let mut rows = Vec::new();
    for record in reader.deserialize() {
        rows.push(record?);
    }
    Ok(rows)
}

/// Reads the eight sibling CSV files under `dir` and assembles them into a
/// [`RawScenario`], the same shape the JSON loader produces.
pub fn load(dir: &Path) -> ConfigResult<RawScenario> {
    let scenario_rows: Vec<ScenarioRow> = read_rows(&dir.join("scenario.csv"))?;
    let scenario = scenario_rows.into_iter().next().ok_or_else(|| crate::error::ConfigError::Validation {
        field_path: "scenario.csv".into(),
        message: "must contain exactly one row".into(),
    })?;

    let tracks = read_rows::<TrackRow>(&dir.join("tracks.csv"))?
        .into_iter()
        .map(|r| TrackSpec {
            id: r.id,
            kind: r.kind,
            length: r.length,
            fillfactor: r.fillfactor,
            max_wagons: r.max_wagons,
        })
        .collect();

    let routes = read_rows::<RouteRow>(&dir.join("routes.csv"))?
        .into_iter()
        .map(|r| RouteSpec {
            id: r.id,
            path: r.path.split('|').map(TrackId::from).collect(),
            duration: r.duration,
        })
        .collect();

    let locomotives = read_rows::<LocomotiveRow>(&dir.join("locomotives.csv"))?
        .into_iter()
        .map(|r| LocomotiveSpec {
            id: r.id,
            home_track: r.home_track,
            coupler_front: r.coupler_front,
            coupler_back: r.coupler_back,
        })
        .collect();

    let workshops = read_rows::<WorkshopRow>(&dir.join("workshops.csv"))?
        .into_iter()
        .map(|r| WorkshopSpec {
            id: r.id,
            track: r.track,
            retrofit_stations: r.retrofit_stations,
        })
        .collect();

    let train_rows = read_rows::<TrainRow>(&dir.join("trains.csv"))?;
    let wagon_rows = read_rows::<WagonRow>(&dir.join("wagons.csv"))?;
    let trains = train_rows
        .into_iter()
        .map(|t| TrainSpec {
            wagons: wagon_rows
                .iter()
                .filter(|w| w.train_id == t.train_id)
                .map(|w| WagonManifestEntry {
                    id: w.id.clone(),
                    length: w.length,
                    is_loaded: w.is_loaded,
                    needs_retrofit: w.needs_retrofit,
                    coupler_a: w.coupler_a,
                    coupler_b: w.coupler_b,
                })
                .collect(),
            train_id: t.train_id,
            arrival_time: t.arrival_time,
            arrival_track: t.arrival_track,
        })
        .collect();

    let process_times: Vec<ProcessTimes> = read_rows(&dir.join("process_times.csv"))?;
    let process_times = process_times.into_iter().next().ok_or_else(|| crate::error::ConfigError::Validation {
        field_path: "process_times.csv".into(),
        message: "must contain exactly one row".into(),
    })?;

    Ok(RawScenario {
        scenario_id: scenario.scenario_id,
        start_date: scenario.start_date,
        end_date: scenario.end_date,
        track_selection_strategy: scenario.track_selection_strategy,
        retrofit_selection_strategy: scenario.retrofit_selection_strategy,
        parking_selection_strategy: scenario.parking_selection_strategy,
        loco_delivery_strategy: scenario.loco_delivery_strategy,
        parking_strategy: None,
        parking_normal_threshold: scenario.parking_normal_threshold,
        parking_critical_threshold: scenario.parking_critical_threshold,
        parking_idle_check_interval: scenario.parking_idle_check_interval,
        random_seed: scenario.random_seed,
        tracks,
        routes,
        locomotives,
        workshops,
        trains,
        process_times,
    })
}
