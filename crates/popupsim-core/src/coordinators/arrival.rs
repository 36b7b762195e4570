// SPDX-License-Identifier: Apache-2.0
use tracing::debug;

use crate::error::{SimError, SimResult};
use crate::executor::{Process, Wait};
use crate::ids::{TrackId, WagonId};
use crate::model::{TrackKind, Wagon};
use crate::scenario::{TrainSpec, WagonManifestEntry};
use crate::selector::track_ids_of_kind;
use crate::simulation::Simulation;
use crate::time::SimTime;

enum Phase {
    /// Waiting for `trains[index]`'s scheduled arrival.
    WaitingForTrain(usize),
    /// Staggering the release of an arrived train's accepted wagons onto
    /// their collection tracks, per `train_to_hump_delay`/`wagon_hump_interval`.
    Releasing {
        train_index: usize,
        train_arrival: SimTime,
        accepted: Vec<WagonManifestEntry>,
        next: usize,
    },
    /// A release was blocked on collection-track capacity; the simulation
    /// has already reserved the metres on our behalf once granted.
    AwaitingCapacity {
        train_index: usize,
        train_arrival: SimTime,
        accepted: Vec<WagonManifestEntry>,
        next: usize,
        track: TrackId,
    },
}

/// Consumes the train schedule, classifies each arriving wagon, and
/// distributes accepted wagons across collection tracks (§4.9).
pub struct ArrivalCoordinator {
    trains: Vec<TrainSpec>,
    phase: Phase,
}

impl ArrivalCoordinator {
    /// Builds the coordinator from the scenario's train schedule, which
    /// must be in non-decreasing arrival-time order.
    #[must_use]
    pub fn new(trains: Vec<TrainSpec>) -> Self {
        Self {
            trains,
            phase: Phase::WaitingForTrain(0),
        }
    }

    fn wait_for_train(&self, sim: &Simulation, index: usize) -> Wait {
        match self.trains.get(index) {
            None => Wait::Done,
            Some(train) => Wait::Delay((train.arrival_time - sim.now().as_minutes()).max(0.0)),
        }
    }

    fn classify(&self, sim: &mut Simulation, train: &TrainSpec) -> Vec<WagonManifestEntry> {
        let now = SimTime::from_minutes(train.arrival_time);
        let mut accepted = Vec::new();
        for entry in &train.wagons {
            if entry.is_loaded {
                sim.log(crate::event::Event::wagon(now, &WagonId::new(entry.id.clone()), "rejected").with_extra("reason", "loaded"));
                debug!(wagon = %entry.id, "rejected: loaded");
            } else if !entry.needs_retrofit {
                sim.log(
                    crate::event::Event::wagon(now, &WagonId::new(entry.id.clone()), "rejected")
                        .with_extra("reason", "no_retrofit_needed"),
                );
                debug!(wagon = %entry.id, "rejected: no retrofit needed");
            } else {
                accepted.push(entry.clone());
            }
        }
        accepted
    }

    fn collection_candidates<'a>(&self, sim: &'a Simulation, pinned: Option<&TrackId>) -> Vec<&'a crate::model::Track> {
        let order = &sim.track_order;
        let ids: Vec<&TrackId> = match pinned {
            Some(track_id) => vec![track_id],
            None => track_ids_of_kind(order, &sim.tracks, TrackKind::Collection),
        };
        ids.into_iter().filter_map(|id| sim.tracks.get(id)).collect()
    }

    /// Places one wagon onto a chosen collection track, or returns the
    /// track it needs to wait for if capacity is unavailable right now.
    fn try_place(
        &mut self,
        sim: &mut Simulation,
        train_arrival: SimTime,
        entry: &WagonManifestEntry,
        pinned_track: Option<&TrackId>,
    ) -> SimResult<Result<(), TrackId>> {
        let candidates = self.collection_candidates(sim, pinned_track);
        let Some(chosen) = sim.selectors.collection.select(&candidates, entry.length) else {
            return Err(SimError::Invariant(format!(
                "no collection track can ever fit wagon {} (length {})",
                entry.id, entry.length
            )));
        };
        let track_id = chosen.id.clone();
        if sim.track_try_reserve(&track_id, entry.length)? {
            self.finalize_placement(sim, train_arrival, entry, &track_id)?;
            Ok(Ok(()))
        } else {
            Ok(Err(track_id))
        }
    }

    fn finalize_placement(&mut self, sim: &mut Simulation, train_arrival: SimTime, entry: &WagonManifestEntry, track_id: &TrackId) -> SimResult<()> {
        let wagon_id = WagonId::new(entry.id.clone());
        let mut wagon = Wagon::new(
            wagon_id.clone(),
            entry.length,
            entry.coupler_a,
            entry.coupler_b,
            entry.is_loaded,
            entry.needs_retrofit,
            train_arrival,
        );
        wagon.status = crate::model::WagonStatus::Collection;
        sim.insert_wagon(wagon);
        sim.track_finalize_add(track_id, std::slice::from_ref(&wagon_id))?;
        sim.log(crate::event::Event::wagon(sim.now(), &wagon_id, "arrived").with_to(track_id.to_string()));
        Ok(())
    }

}

impl Process for ArrivalCoordinator {
    fn resume(&mut self, sim: &mut Simulation, _pid: crate::executor::ProcessId) -> SimResult<Wait> {
        match std::mem::replace(&mut self.phase, Phase::WaitingForTrain(usize::MAX)) {
            Phase::WaitingForTrain(index) => {
                let Some(train) = self.trains.get(index).cloned() else {
                    return Ok(Wait::Done);
                };
                let arrival = SimTime::from_minutes(train.arrival_time);
                let accepted = self.classify(sim, &train);
                if accepted.is_empty() {
                    self.phase = Phase::WaitingForTrain(index + 1);
                    return Ok(self.wait_for_train(sim, index + 1));
                }
                self.phase = Phase::Releasing {
                    train_index: index,
                    train_arrival: arrival,
                    accepted,
                    next: 0,
                };
                Ok(Wait::Delay(sim.process_times.train_to_hump_delay))
            }
            Phase::Releasing {
                train_index,
                train_arrival,
                accepted,
                next,
            } => {
                let entry = accepted[next].clone();
                let pinned = self.trains[train_index].arrival_track.clone();
                match self.try_place(sim, train_arrival, &entry, pinned.as_ref())? {
                    Ok(()) => self.next_after(sim, train_index, train_arrival, accepted, next + 1),
                    Err(track) => {
                        self.phase = Phase::AwaitingCapacity {
                            train_index,
                            train_arrival,
                            accepted,
                            next,
                            track: track.clone(),
                        };
                        Ok(Wait::TrackCapacity(track, entry.length))
                    }
                }
            }
            Phase::AwaitingCapacity {
                train_index,
                train_arrival,
                accepted,
                next,
                track,
            } => {
                let entry = accepted[next].clone();
                self.finalize_placement(sim, train_arrival, &entry, &track)?;
                self.next_after(sim, train_index, train_arrival, accepted, next + 1)
            }
        }
    }

    fn label(&self) -> &str {
        "arrival"
    }
}

impl ArrivalCoordinator {
    fn next_after(&mut self, sim: &mut Simulation, train_index: usize, train_arrival: SimTime, accepted: Vec<WagonManifestEntry>, next: usize) -> SimResult<Wait> {
        if next < accepted.len() {
            let interval = sim.process_times.wagon_hump_interval;
            self.phase = Phase::Releasing {
                train_index,
                train_arrival,
                accepted,
                next,
            };
            Ok(Wait::Delay(interval))
        } else {
            let following = train_index + 1;
            self.phase = Phase::WaitingForTrain(following);
            Ok(self.wait_for_train(sim, following))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::model::{Coupler, RouteTable};
    use crate::scenario::SelectionStrategy;
    use crate::selector::{Selectors, TrackSelector};

    fn empty_simulation() -> Simulation {
        Simulation::new(
            SimTime::from_minutes(1000.0),
            Vec::new(),
            HashMap::new(),
            HashMap::new(),
            Vec::new(),
            HashMap::new(),
            RouteTable::new(),
            Selectors {
                collection: TrackSelector::new(SelectionStrategy::FirstAvailable, 1),
                retrofit: TrackSelector::new(SelectionStrategy::FirstAvailable, 1),
                parking: TrackSelector::new(SelectionStrategy::FirstAvailable, 1),
            },
            crate::scenario::ProcessTimes {
                train_to_hump_delay: 0.0,
                wagon_hump_interval: 0.0,
                screw_coupling_time: 0.0,
                screw_decoupling_time: 0.0,
                dac_coupling_time: 0.0,
                dac_decoupling_time: 0.0,
                wagon_retrofit_time: 0.0,
                loco_parking_delay: 0.0,
            },
            1,
        )
    }

    fn manifest(id: &str, is_loaded: bool, needs_retrofit: bool) -> WagonManifestEntry {
        WagonManifestEntry {
            id: id.into(),
            length: 10.0,
            is_loaded,
            needs_retrofit,
            coupler_a: Coupler::Screw,
            coupler_b: Coupler::Screw,
        }
    }

    #[test]
    fn classify_rejects_loaded_and_no_retrofit_wagons() {
        let mut sim = empty_simulation();
        let coordinator = ArrivalCoordinator::new(Vec::new());
        let train = TrainSpec {
            train_id: crate::ids::TrainId::new("t1"),
            arrival_time: 0.0,
            arrival_track: None,
            wagons: vec![manifest("loaded", true, true), manifest("no_retrofit", false, false), manifest("ok", false, true)],
        };

        let accepted = coordinator.classify(&mut sim, &train);

        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].id, "ok");
        assert_eq!(sim.events().len(), 2);
    }

    #[test]
    fn wait_for_train_is_done_past_the_last_train() {
        let sim = empty_simulation();
        let coordinator = ArrivalCoordinator::new(Vec::new());
        assert!(matches!(coordinator.wait_for_train(&sim, 0), Wait::Done));
    }
}
