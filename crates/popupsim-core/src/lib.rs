// SPDX-License-Identifier: Apache-2.0
//! Discrete-event simulation of a pop-up DAC retrofit yard.
//!
//! A [`scenario::Scenario`] describes the yard topology, fleet, and process
//! timings; [`run_scenario`] builds the runtime state, drives the four
//! coordinator processes to completion (or the simulation horizon,
//! whichever comes first), and returns the resulting event log plus the
//! derived KPI report. Everything in between — the scheduler, the resource
//! model, the coordinators themselves — is `pub` only where another crate
//! (`popupsim-config`, `popupsim-report`, `popupsim-cli`) needs it.
#![warn(missing_docs)]

pub mod batching;
pub mod coordination;
pub mod coordinators;
pub mod coupling;
pub mod error;
pub mod event;
pub mod executor;
pub mod ids;
pub mod metrics;
pub mod model;
pub mod scenario;
pub mod selector;
pub mod simulation;
pub mod time;

use std::collections::HashMap;

use crate::coordinators::{ArrivalCoordinator, CollectionCoordinator, ParkingCoordinator, WorkshopCoordinator};
use crate::error::SimResult;
use crate::event::EventLog;
use crate::ids::{LocoId, TrackId, WorkshopId};
use crate::model::{Locomotive, RouteTable, Track, TrackKind, Workshop};
use crate::scenario::Scenario;
use crate::selector::Selectors;
use crate::simulation::Simulation;
use crate::time::SimTime;

fn build_simulation(scenario: &Scenario) -> Simulation {
    let track_order: Vec<TrackId> = scenario.tracks.iter().map(|t| t.id.clone()).collect();
    let tracks: HashMap<TrackId, Track> = scenario
        .tracks
        .iter()
        .map(|t| (t.id.clone(), Track::new(t.id.clone(), t.kind, t.length, t.fillfactor, t.max_wagons)))
        .collect();
    let locomotives: HashMap<LocoId, Locomotive> = scenario
        .locomotives
        .iter()
        .map(|l| (l.id.clone(), Locomotive::new(l.id.clone(), l.home_track.clone(), l.coupler_front, l.coupler_back)))
        .collect();
    let workshop_order: Vec<WorkshopId> = scenario.workshops.iter().map(|w| w.id.clone()).collect();
    let workshops: HashMap<WorkshopId, Workshop> = scenario
        .workshops
        .iter()
        .map(|w| (w.id.clone(), Workshop::new(w.id.clone(), w.track.clone(), w.retrofit_stations)))
        .collect();

    let mut routes = RouteTable::new();
    for route in &scenario.routes {
        if let (Some(from), Some(to)) = (route.path.first(), route.path.last()) {
            routes.insert(from.clone(), to.clone(), route.duration);
        }
    }

    let selectors = Selectors::from_scenario(scenario);
    let accumulator_capacity = scenario
        .trains
        .iter()
        .flat_map(|train| &train.wagons)
        .filter(|wagon| wagon.needs_retrofit && !wagon.is_loaded)
        .count()
        .max(1);

    Simulation::new(
        SimTime::from_minutes(scenario.horizon_minutes),
        track_order,
        tracks,
        locomotives,
        workshop_order,
        workshops,
        routes,
        selectors,
        scenario.process_times,
        accumulator_capacity,
    )
}

/// Runs one scenario to completion (or to its horizon) and returns the
/// event log alongside the derived KPI report.
///
/// The event log is always returned, even if the run ended in a fatal
/// error (§7): whatever activity was recorded before the failure is still
/// useful. The report is only computable from a log that reached a
/// consistent state, so it carries its own `Result`.
#[must_use]
pub fn run_scenario(scenario: Scenario) -> (EventLog, SimResult<metrics::Report>) {
    let mut sim = build_simulation(&scenario);

    sim.spawn(ArrivalCoordinator::new(scenario.trains.clone()));
    for track in scenario.tracks.iter().filter(|t| t.kind == TrackKind::Collection) {
        sim.spawn(CollectionCoordinator::new(track.id.clone()));
    }
    for track in scenario.tracks.iter().filter(|t| t.kind == TrackKind::Retrofit) {
        sim.spawn(WorkshopCoordinator::new(track.id.clone()));
    }
    sim.spawn(ParkingCoordinator::new(
        scenario.parking_normal_threshold,
        scenario.parking_critical_threshold,
        scenario.parking_idle_check_interval,
    ));

    let run_result = sim.run();
    let report = run_result.and_then(|()| {
        metrics::aggregate(
            sim.events(),
            &sim.wagons,
            &sim.locomotives,
            &sim.workshops,
            &sim.tracks,
            scenario.horizon_minutes,
        )
    });
    (sim.events().clone(), report)
}
