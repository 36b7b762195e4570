// SPDX-License-Identifier: Apache-2.0
//! The fully-parsed, validated input to a run.
//!
//! `Scenario` is constructed by an adapter (`popupsim-config`); this crate
//! never parses JSON or CSV itself, only consumes the resulting plain Rust
//! value.

use serde::{Deserialize, Serialize};

use crate::ids::{LocoId, RouteId, TrackId, TrainId, WorkshopId};
use crate::model::{Coupler, TrackKind};

/// A track-selection strategy, used independently for the collection,
/// retrofit, and parking dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    /// Pick the candidate with the lowest occupied fraction.
    LeastOccupied,
    /// Pick the first candidate, in declaration order, that fits.
    FirstAvailable,
    /// Cycle through candidates, remembering the index across calls.
    RoundRobin,
    /// Uniform random choice, seeded from the scenario.
    Random,
    /// Pick the candidate with the least free space that still fits.
    BestFit,
}

/// How a locomotive returns after delivering retrofitted wagons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocoDeliveryStrategy {
    /// Return to the locomotive-parking pool after delivery.
    ReturnToParking,
    /// Deliver directly and remain in place.
    ///
    /// Treated as equivalent to [`Self::ReturnToParking`] until a scenario
    /// defines a divergent delivery path (open question, see `DESIGN.md`).
    DirectDelivery,
}

/// The scenario-wide table of fixed process durations, all in minutes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProcessTimes {
    /// Delay after a train's scheduled arrival before its first wagon is
    /// released onto the collection track.
    pub train_to_hump_delay: f64,
    /// Delay between successive wagons of the same train being released.
    pub wagon_hump_interval: f64,
    /// Time to couple a screw coupler.
    pub screw_coupling_time: f64,
    /// Time to decouple a screw coupler.
    pub screw_decoupling_time: f64,
    /// Time to couple a DAC.
    pub dac_coupling_time: f64,
    /// Time to decouple a DAC.
    pub dac_decoupling_time: f64,
    /// Time to retrofit one wagon in a bay.
    pub wagon_retrofit_time: f64,
    /// Delay for a locomotive returning to the parking pool.
    pub loco_parking_delay: f64,
}

impl ProcessTimes {
    /// Coupling time for the given coupler type, by workflow stage.
    #[must_use]
    pub fn coupling_time(&self, coupler: Coupler) -> f64 {
        match coupler {
            Coupler::Dac => self.dac_coupling_time,
            Coupler::Screw | Coupler::Hybrid => self.screw_coupling_time,
        }
    }

    /// Decoupling time for the given coupler type, by workflow stage.
    #[must_use]
    pub fn decoupling_time(&self, coupler: Coupler) -> f64 {
        match coupler {
            Coupler::Dac => self.dac_decoupling_time,
            Coupler::Screw | Coupler::Hybrid => self.screw_decoupling_time,
        }
    }
}

/// A track's declared shape, before being built into a `Track`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackSpec {
    /// Identifier.
    pub id: TrackId,
    /// Role in the topology.
    #[serde(rename = "type")]
    pub kind: TrackKind,
    /// Physical length in metres.
    pub length: f64,
    /// Usable fraction of `length`.
    pub fillfactor: f64,
    /// Hard occupant-count cap, workshop tracks only.
    pub max_wagons: Option<u32>,
}

/// A directed multi-hop route, as declared in the scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteSpec {
    /// Identifier.
    pub id: RouteId,
    /// Ordered track path; only the first and last entries matter to the
    /// simulator (no track geometry is modeled).
    pub path: Vec<TrackId>,
    /// Total duration of the route, in minutes.
    pub duration: f64,
}

/// A locomotive's declared shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocomotiveSpec {
    /// Identifier.
    pub id: LocoId,
    /// Track the locomotive starts at.
    pub home_track: TrackId,
    /// Front coupler.
    pub coupler_front: Coupler,
    /// Back coupler.
    pub coupler_back: Coupler,
}

/// A workshop's declared shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkshopSpec {
    /// Identifier.
    pub id: WorkshopId,
    /// Track the workshop is located on.
    pub track: TrackId,
    /// Number of parallel retrofit bays.
    pub retrofit_stations: u32,
}

/// A wagon as declared in a train's manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WagonManifestEntry {
    /// Identifier.
    pub id: String,
    /// Length in metres.
    pub length: f64,
    /// Whether the wagon is loaded.
    pub is_loaded: bool,
    /// Whether the wagon needs a DAC retrofit.
    pub needs_retrofit: bool,
    /// Leading-end coupler.
    pub coupler_a: Coupler,
    /// Trailing-end coupler.
    pub coupler_b: Coupler,
}

/// A scheduled train, as declared in the scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainSpec {
    /// Identifier.
    pub train_id: TrainId,
    /// Scheduled arrival time, in minutes from simulation start.
    pub arrival_time: f64,
    /// Track the train arrives on, if pinned.
    pub arrival_track: Option<TrackId>,
    /// Wagons carried, in manifest order.
    pub wagons: Vec<WagonManifestEntry>,
}

/// The fully-parsed, structurally valid input to one simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario identifier, carried through to reports.
    pub scenario_id: String,
    /// Simulation start, in minutes; `0.0` by convention.
    pub start_minutes: f64,
    /// Simulation horizon, in minutes from start.
    pub horizon_minutes: f64,
    /// Strategy for choosing a collection track.
    pub track_selection_strategy: SelectionStrategy,
    /// Strategy for choosing a retrofit track.
    pub retrofit_selection_strategy: SelectionStrategy,
    /// Strategy for choosing a parking track.
    pub parking_selection_strategy: SelectionStrategy,
    /// How locomotives return after a parking delivery.
    pub loco_delivery_strategy: LocoDeliveryStrategy,
    /// Fraction of accumulator capacity that triggers a normal-priority
    /// parking run.
    pub parking_normal_threshold: f64,
    /// Fraction of accumulator capacity that triggers a critical,
    /// pre-empting parking run.
    pub parking_critical_threshold: f64,
    /// Minutes of parking inactivity before an idle-timer trigger fires.
    pub parking_idle_check_interval: f64,
    /// RNG seed for the `random` selection strategy.
    pub random_seed: u64,
    /// Declared tracks.
    pub tracks: Vec<TrackSpec>,
    /// Declared routes.
    pub routes: Vec<RouteSpec>,
    /// Declared locomotives.
    pub locomotives: Vec<LocomotiveSpec>,
    /// Declared workshops.
    pub workshops: Vec<WorkshopSpec>,
    /// Scheduled trains, in arrival order.
    pub trains: Vec<TrainSpec>,
    /// Fixed process durations.
    pub process_times: ProcessTimes,
}
