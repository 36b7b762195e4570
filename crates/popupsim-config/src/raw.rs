// SPDX-License-Identifier: Apache-2.0
//! The JSON wire shape of a scenario file, before date coercion and
//! structural validation.
//!
//! Most fields are already shaped exactly like their
//! [`popupsim_core::scenario`] counterparts (the core crate's types derive
//! `Serialize`/`Deserialize` for this reason) and are reused here verbatim.
//! Only the two date fields and the legacy `parking_strategy` field (kept
//! for forward compatibility with scenario files that still carry it, but
//! unused — the per-dimension `*_selection_strategy` fields are
//! authoritative) differ from the core shape.

use serde::Deserialize;

use popupsim_core::scenario::{
    LocoDeliveryStrategy, LocomotiveSpec, ProcessTimes, RouteSpec, SelectionStrategy, TrackSpec,
    TrainSpec, WorkshopSpec,
};

/// A scenario exactly as it appears in a JSON file or an assembled CSV set.
#[derive(Debug, Deserialize)]
pub struct RawScenario {
    /// Scenario identifier, carried through to reports.
    pub scenario_id: String,
    /// Simulation start, ISO-8601.
    pub start_date: String,
    /// Simulation end, ISO-8601.
    pub end_date: String,
    /// Strategy for choosing a collection track.
    pub track_selection_strategy: SelectionStrategy,
    /// Strategy for choosing a retrofit track.
    pub retrofit_selection_strategy: SelectionStrategy,
    /// Strategy for choosing a parking track.
    pub parking_selection_strategy: SelectionStrategy,
    /// How locomotives return after a parking delivery.
    pub loco_delivery_strategy: LocoDeliveryStrategy,
    /// Legacy field, accepted but unused.
    #[serde(default)]
    pub parking_strategy: Option<String>,
    /// Fraction of accumulator capacity that triggers a normal-priority run.
    pub parking_normal_threshold: f64,
    /// Fraction of accumulator capacity that triggers a critical run.
    pub parking_critical_threshold: f64,
    /// Minutes of parking inactivity before an idle-timer trigger fires.
    pub parking_idle_check_interval: f64,
    /// RNG seed for the `random` selection strategy.
    #[serde(default)]
    pub random_seed: u64,
    /// Declared tracks.
    pub tracks: Vec<TrackSpec>,
    /// Declared routes.
    pub routes: Vec<RouteSpec>,
    /// Declared locomotives.
    pub locomotives: Vec<LocomotiveSpec>,
    /// Declared workshops.
    pub workshops: Vec<WorkshopSpec>,
    /// Scheduled trains.
    pub trains: Vec<TrainSpec>,
    /// Fixed process durations.
    pub process_times: ProcessTimes,
}
