// SPDX-License-Identifier: Apache-2.0
//! Property-based tests for the invariants named in the design notes:
//! capacity is never oversubscribed (P1), arrivals close over parked,
//! rejected, and in-process wagons (R1), and a replay with a fixed seed
//! reproduces the same event log (R3).

use popupsim_core::event::Event;
use popupsim_core::ids::{LocoId, RouteId, TrackId, TrainId, WorkshopId};
use popupsim_core::model::{Coupler, TrackKind};
use popupsim_core::scenario::{LocoDeliveryStrategy, LocomotiveSpec, ProcessTimes, RouteSpec, Scenario, SelectionStrategy, TrackSpec, TrainSpec, WagonManifestEntry, WorkshopSpec};
use proptest::prelude::*;

fn scenario_with_wagons(lengths: &[f64], collection_capacity: f64, strategy: SelectionStrategy, seed: u64) -> Scenario {
    let wagons = lengths
        .iter()
        .enumerate()
        .map(|(i, &length)| WagonManifestEntry {
            id: format!("w{i}"),
            length,
            is_loaded: false,
            needs_retrofit: true,
            coupler_a: Coupler::Screw,
            coupler_b: Coupler::Screw,
        })
        .collect();

    Scenario {
        scenario_id: "property-test".into(),
        start_minutes: 0.0,
        horizon_minutes: 100_000.0,
        track_selection_strategy: strategy,
        retrofit_selection_strategy: SelectionStrategy::FirstAvailable,
        parking_selection_strategy: SelectionStrategy::FirstAvailable,
        loco_delivery_strategy: LocoDeliveryStrategy::ReturnToParking,
        parking_normal_threshold: 0.7,
        parking_critical_threshold: 0.85,
        parking_idle_check_interval: 5.0,
        random_seed: seed,
        tracks: vec![
            TrackSpec { id: TrackId::new("collection"), kind: TrackKind::Collection, length: collection_capacity, fillfactor: 1.0, max_wagons: None },
            TrackSpec { id: TrackId::new("retrofit"), kind: TrackKind::Retrofit, length: 1000.0, fillfactor: 1.0, max_wagons: None },
            TrackSpec { id: TrackId::new("workshop_track"), kind: TrackKind::Workshop, length: 1000.0, fillfactor: 1.0, max_wagons: None },
            TrackSpec { id: TrackId::new("retrofitted"), kind: TrackKind::Retrofitted, length: 1000.0, fillfactor: 1.0, max_wagons: None },
            TrackSpec { id: TrackId::new("parking"), kind: TrackKind::Parking, length: 1000.0, fillfactor: 1.0, max_wagons: None },
        ],
        routes: vec![
            RouteSpec { id: RouteId::new("r1"), path: vec![TrackId::new("collection"), TrackId::new("retrofit")], duration: 2.0 },
            RouteSpec { id: RouteId::new("r2"), path: vec![TrackId::new("retrofit"), TrackId::new("workshop_track")], duration: 2.0 },
            RouteSpec { id: RouteId::new("r3"), path: vec![TrackId::new("workshop_track"), TrackId::new("retrofitted")], duration: 2.0 },
            RouteSpec { id: RouteId::new("r4"), path: vec![TrackId::new("retrofitted"), TrackId::new("parking")], duration: 2.0 },
        ],
        locomotives: vec![LocomotiveSpec {
            id: LocoId::new("loco1"),
            home_track: TrackId::new("collection"),
            coupler_front: Coupler::Screw,
            coupler_back: Coupler::Screw,
        }],
        workshops: vec![WorkshopSpec { id: WorkshopId::new("ws1"), track: TrackId::new("workshop_track"), retrofit_stations: 2 }],
        trains: vec![TrainSpec {
            train_id: TrainId::new("t1"),
            arrival_time: 0.0,
            arrival_track: None,
            wagons,
        }],
        process_times: ProcessTimes {
            train_to_hump_delay: 0.0,
            wagon_hump_interval: 1.0,
            screw_coupling_time: 1.0,
            screw_decoupling_time: 1.0,
            dac_coupling_time: 1.0,
            dac_decoupling_time: 1.0,
            wagon_retrofit_time: 5.0,
            loco_parking_delay: 0.0,
        },
    }
}

fn events_equal(a: &[Event], b: &[Event]) -> bool {
    a.len() == b.len()
        && a.iter().zip(b.iter()).all(|(x, y)| {
            x.timestamp.as_minutes() == y.timestamp.as_minutes()
                && x.kind == y.kind
                && x.subject_id == y.subject_id
                && x.event_type == y.event_type
                && x.from == y.from
                && x.to == y.to
                && x.extra == y.extra
        })
}

proptest! {
    /// P1 (indirectly): capacity bookkeeping never overflows, no matter how
    /// tightly the collection track is sized against the wagon manifest.
    /// A `CapacityOverflow` would surface as a fatal run error.
    #[test]
    fn capacity_never_overflows(lengths in prop::collection::vec(5.0_f64..20.0, 1..8), capacity in 20.0_f64..80.0) {
        let scenario = scenario_with_wagons(&lengths, capacity, SelectionStrategy::FirstAvailable, 11);
        let (_log, report) = popupsim_core::run_scenario(scenario);
        prop_assert!(report.is_ok());
    }

    /// R1: every accepted wagon is eventually parked or rejected, with none
    /// left dangling once the horizon is generous enough to drain them all.
    #[test]
    fn arrivals_close_over_parked_and_rejected(lengths in prop::collection::vec(5.0_f64..20.0, 1..6)) {
        let scenario = scenario_with_wagons(&lengths, 500.0, SelectionStrategy::FirstAvailable, 23);
        let (_log, report) = popupsim_core::run_scenario(scenario);
        if let Ok(report) = report {
            prop_assert_eq!(report.throughput.arrived, report.throughput.parked + report.throughput.rejected);
            prop_assert_eq!(report.throughput.arrived as usize, lengths.len());
        }
    }

    /// R3: replaying the same scenario (same seed) produces an identical
    /// event log.
    #[test]
    fn replay_is_deterministic(lengths in prop::collection::vec(5.0_f64..20.0, 1..6), seed in any::<u64>()) {
        let first = scenario_with_wagons(&lengths, 40.0, SelectionStrategy::Random, seed);
        let second = scenario_with_wagons(&lengths, 40.0, SelectionStrategy::Random, seed);
        let (log_a, _) = popupsim_core::run_scenario(first);
        let (log_b, _) = popupsim_core::run_scenario(second);
        prop_assert!(events_equal(log_a.events(), log_b.events()));
    }
}
