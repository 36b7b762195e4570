// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;

use crate::batching::pack_by_capacity;
use crate::coupling;
use crate::error::SimResult;
use crate::event::Event;
use crate::executor::{Process, ProcessId, Wait};
use crate::ids::{LocoId, TrackId, WagonId};
use crate::model::{LocoStatus, TrackKind, WagonStatus};
use crate::selector::track_ids_of_kind;
use crate::simulation::Simulation;

/// Delay before retrying rake formation after a coupling-validator failure.
const RAKE_RETRY_DELAY: f64 = 1.0;

enum Phase {
    WaitForWagons,
    AwaitLocomotive,
    /// No retrofit track could accept even the lead wagon; released the
    /// locomotive and is waiting for `track` to free up before retrying.
    AwaitRouteCapacity { track: TrackId },
    /// Hauling the batch to the retrofit track; the locomotive is in
    /// `Moving` status for the route's travel time.
    Underway {
        loco: LocoId,
        batch: Vec<WagonId>,
        retrofit_track: TrackId,
        batch_length: f64,
    },
    /// Coupling the batch at the retrofit track.
    CouplingUp {
        loco: LocoId,
        batch: Vec<WagonId>,
        retrofit_track: TrackId,
        batch_length: f64,
    },
    /// Decoupling complete, the batch has arrived with a validated batch.
    Arriving {
        loco: LocoId,
        batch: Vec<WagonId>,
        retrofit_track: TrackId,
        batch_length: f64,
    },
    /// Route complete, blocked on destination capacity.
    AwaitRetrofitCapacity {
        loco: LocoId,
        batch: Vec<WagonId>,
        retrofit_track: TrackId,
        batch_length: f64,
    },
}

/// One instance per collection track (§4.10): drains its FIFO onto a
/// retrofit track in batches, via a borrowed locomotive.
pub struct CollectionCoordinator {
    track: TrackId,
    phase: Phase,
}

impl CollectionCoordinator {
    /// Builds a coordinator bound to one collection track.
    #[must_use]
    pub fn new(track: TrackId) -> Self {
        Self {
            track,
            phase: Phase::WaitForWagons,
        }
    }

    fn wait_for_wagons(&mut self, sim: &mut Simulation) -> SimResult<Wait> {
        if sim.track_queue_len(&self.track)? == 0 {
            self.phase = Phase::WaitForWagons;
            return Ok(Wait::TrackQueueNonEmpty(self.track.clone()));
        }
        match sim.loco_try_allocate() {
            Some(loco) => self.plan_and_move(sim, loco),
            None => {
                self.phase = Phase::AwaitLocomotive;
                Ok(Wait::Locomotive)
            }
        }
    }

    fn plan_and_move(&mut self, sim: &mut Simulation, loco: LocoId) -> SimResult<Wait> {
        let queue_ids: Vec<WagonId> = sim.track(&self.track)?.queue.iter().cloned().collect();
        if queue_ids.is_empty() {
            sim.loco_release(&loco);
            self.phase = Phase::WaitForWagons;
            return Ok(Wait::TrackQueueNonEmpty(self.track.clone()));
        }
        let mut lengths = HashMap::with_capacity(queue_ids.len());
        for id in &queue_ids {
            lengths.insert(id.clone(), sim.wagon(id)?.length);
        }
        let first_len = lengths[&queue_ids[0]];

        let retrofit_ids = track_ids_of_kind(&sim.track_order, &sim.tracks, TrackKind::Retrofit);
        let candidates: Vec<&crate::model::Track> = retrofit_ids.into_iter().filter_map(|id| sim.tracks.get(id)).collect();

        let Some(chosen) = sim.selectors.retrofit.select(&candidates, first_len) else {
            sim.loco_release(&loco);
            let Some(fallback) = candidates.first() else {
                return Err(crate::error::SimError::Invariant("no retrofit track is configured".into()));
            };
            let track = fallback.id.clone();
            self.phase = Phase::AwaitRouteCapacity { track: track.clone() };
            return Ok(Wait::TrackCapacity(track, first_len));
        };
        let retrofit_track = chosen.id.clone();
        let free = chosen.free();

        let mut batch = pack_by_capacity(&queue_ids, &|id| lengths[id], free);
        if batch.is_empty() {
            sim.loco_release(&loco);
            self.phase = Phase::AwaitRouteCapacity {
                track: retrofit_track.clone(),
            };
            return Ok(Wait::TrackCapacity(retrofit_track, first_len));
        }

        let loco_coupler = sim
            .locomotives
            .get(&loco)
            .map(|l| l.coupler_front)
            .ok_or_else(|| crate::error::SimError::UnknownLocomotive(loco.clone()))?;
        let wagon_refs: Vec<&crate::model::Wagon> = batch.iter().map(|id| sim.wagon(id)).collect::<SimResult<_>>()?;
        match coupling::validate(loco_coupler, &wagon_refs) {
            Ok(()) => {}
            Err(0) => {
                sim.loco_release(&loco);
                self.phase = Phase::WaitForWagons;
                return Ok(Wait::Delay(RAKE_RETRY_DELAY));
            }
            Err(valid_prefix) => batch.truncate(valid_prefix),
        }

        let batch_length: f64 = batch.iter().map(|id| lengths[id]).sum();
        sim.loco_transition(&loco, LocoStatus::Moving);
        sim.log(Event::locomotive(sim.now(), &loco, "moving").with_from(self.track.to_string()).with_to(retrofit_track.to_string()));
        let route_minutes = sim.routes.duration(&self.track, &retrofit_track)?;

        self.phase = Phase::Underway {
            loco,
            batch,
            retrofit_track,
            batch_length,
        };
        Ok(Wait::Delay(route_minutes))
    }

    fn begin_coupling(&mut self, sim: &mut Simulation, loco: LocoId, batch: Vec<WagonId>, retrofit_track: TrackId, batch_length: f64) -> SimResult<Wait> {
        sim.loco_transition(&loco, LocoStatus::Coupling);
        let mut coupling_minutes = 0.0;
        for id in &batch {
            let coupler = sim.wagon(id)?.coupler_a;
            let minutes = sim.process_times.coupling_time(coupler);
            coupling_minutes += minutes;
            sim.log(Event::wagon(sim.now(), id, "coupling").with_extra("minutes", minutes.to_string()));
        }
        self.phase = Phase::CouplingUp {
            loco,
            batch,
            retrofit_track,
            batch_length,
        };
        Ok(Wait::Delay(coupling_minutes))
    }

    fn begin_decoupling(&mut self, sim: &mut Simulation, loco: LocoId, batch: Vec<WagonId>, retrofit_track: TrackId, batch_length: f64) -> SimResult<Wait> {
        sim.loco_transition(&loco, LocoStatus::Decoupling);
        let mut decoupling_minutes = 0.0;
        for id in &batch {
            let coupler = sim.wagon(id)?.coupler_a;
            let minutes = sim.process_times.decoupling_time(coupler);
            decoupling_minutes += minutes;
            sim.log(Event::wagon(sim.now(), id, "decoupling").with_extra("minutes", minutes.to_string()));
        }
        self.phase = Phase::Arriving {
            loco,
            batch,
            retrofit_track,
            batch_length,
        };
        Ok(Wait::Delay(decoupling_minutes))
    }

    fn finalize(&mut self, sim: &mut Simulation, loco: LocoId, batch: Vec<WagonId>, retrofit_track: TrackId, batch_length: f64) -> SimResult<Wait> {
        sim.track_remove(&self.track, &batch, batch_length)?;
        sim.track_finalize_add(&retrofit_track, &batch)?;
        for id in &batch {
            sim.wagon_mut(id)?.status = WagonStatus::WaitingRetrofit;
        }
        sim.log(Event::locomotive(sim.now(), &loco, "arrived").with_to(retrofit_track.to_string()));
        sim.loco_release(&loco);
        self.wait_for_wagons(sim)
    }
}

impl Process for CollectionCoordinator {
    fn resume(&mut self, sim: &mut Simulation, pid: ProcessId) -> SimResult<Wait> {
        match std::mem::replace(&mut self.phase, Phase::WaitForWagons) {
            Phase::WaitForWagons => self.wait_for_wagons(sim),
            Phase::AwaitLocomotive => {
                let loco = sim.take_loco_grant(pid)?;
                if sim.track_queue_len(&self.track)? == 0 {
                    sim.loco_release(&loco);
                    self.phase = Phase::WaitForWagons;
                    return Ok(Wait::TrackQueueNonEmpty(self.track.clone()));
                }
                self.plan_and_move(sim, loco)
            }
            Phase::AwaitRouteCapacity { .. } => self.wait_for_wagons(sim),
            Phase::Underway {
                loco,
                batch,
                retrofit_track,
                batch_length,
            } => self.begin_coupling(sim, loco, batch, retrofit_track, batch_length),
            Phase::CouplingUp {
                loco,
                batch,
                retrofit_track,
                batch_length,
            } => self.begin_decoupling(sim, loco, batch, retrofit_track, batch_length),
            Phase::Arriving {
                loco,
                batch,
                retrofit_track,
                batch_length,
            } => {
                if sim.track_try_reserve(&retrofit_track, batch_length)? {
                    self.finalize(sim, loco, batch, retrofit_track, batch_length)
                } else {
                    self.phase = Phase::AwaitRetrofitCapacity {
                        loco,
                        batch,
                        retrofit_track: retrofit_track.clone(),
                        batch_length,
                    };
                    Ok(Wait::TrackCapacity(retrofit_track, batch_length))
                }
            }
            Phase::AwaitRetrofitCapacity {
                loco,
                batch,
                retrofit_track,
                batch_length,
            } => self.finalize(sim, loco, batch, retrofit_track, batch_length),
        }
    }

    fn label(&self) -> &str {
        "collection"
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::model::{Coupler, Locomotive, RouteTable, Track, Wagon};
    use crate::scenario::{ProcessTimes, SelectionStrategy};
    use crate::selector::{Selectors, TrackSelector};
    use crate::time::SimTime;

    fn process_times() -> ProcessTimes {
        ProcessTimes {
            train_to_hump_delay: 0.0,
            wagon_hump_interval: 1.0,
            screw_coupling_time: 1.0,
            screw_decoupling_time: 1.0,
            dac_coupling_time: 1.0,
            dac_decoupling_time: 1.0,
            wagon_retrofit_time: 5.0,
            loco_parking_delay: 0.0,
        }
    }

    fn simulation_with_one_wagon(wagon_length: f64, collection_capacity: f64, retrofit_capacity: f64) -> Simulation {
        let collection = TrackId::new("collection");
        let retrofit = TrackId::new("retrofit");
        let loco = LocoId::new("loco1");

        let mut tracks = HashMap::new();
        tracks.insert(collection.clone(), Track::new(collection.clone(), TrackKind::Collection, collection_capacity, 1.0, None));
        tracks.insert(retrofit.clone(), Track::new(retrofit.clone(), TrackKind::Retrofit, retrofit_capacity, 1.0, None));

        let mut locomotives = HashMap::new();
        locomotives.insert(loco.clone(), Locomotive::new(loco, collection.clone(), Coupler::Screw, Coupler::Screw));

        let mut routes = RouteTable::new();
        routes.insert(collection.clone(), retrofit.clone(), 2.0);

        let mut sim = Simulation::new(
            SimTime::from_minutes(1000.0),
            vec![collection.clone(), retrofit.clone()],
            tracks,
            locomotives,
            Vec::new(),
            HashMap::new(),
            routes,
            Selectors {
                collection: TrackSelector::new(SelectionStrategy::FirstAvailable, 1),
                retrofit: TrackSelector::new(SelectionStrategy::FirstAvailable, 1),
                parking: TrackSelector::new(SelectionStrategy::FirstAvailable, 1),
            },
            process_times(),
            1,
        );

        let wagon_id = WagonId::new("w1");
        let mut wagon = Wagon::new(wagon_id.clone(), wagon_length, Coupler::Screw, Coupler::Screw, false, true, SimTime::ZERO);
        wagon.status = WagonStatus::Collection;
        sim.insert_wagon(wagon);
        assert!(matches!(sim.track_try_reserve(&collection, wagon_length), Ok(true)));
        assert!(sim.track_finalize_add(&collection, std::slice::from_ref(&wagon_id)).is_ok());

        sim
    }

    #[test]
    fn wait_for_wagons_allocates_a_locomotive_and_moves_the_batch() {
        let mut sim = simulation_with_one_wagon(10.0, 100.0, 100.0);
        let mut coordinator = CollectionCoordinator::new(TrackId::new("collection"));

        let result = coordinator.wait_for_wagons(&mut sim);

        assert!(matches!(result, Ok(Wait::Delay(_))));
        assert!(matches!(coordinator.phase, Phase::Underway { .. }));
        assert_eq!(sim.locomotives[&LocoId::new("loco1")].status, LocoStatus::Moving);
    }

    #[test]
    fn plan_and_move_releases_the_locomotive_when_queue_is_empty() {
        let mut sim = simulation_with_one_wagon(10.0, 100.0, 100.0);
        if let Some(track) = sim.tracks.get_mut(&TrackId::new("collection")) {
            track.queue.clear();
        }
        let mut coordinator = CollectionCoordinator::new(TrackId::new("collection"));

        let result = coordinator.plan_and_move(&mut sim, LocoId::new("loco1"));

        assert!(matches!(result, Ok(Wait::TrackQueueNonEmpty(_))));
        assert_eq!(sim.locomotives[&LocoId::new("loco1")].status, LocoStatus::Parking);
    }

    #[test]
    fn plan_and_move_waits_on_retrofit_capacity_when_the_destination_is_full() {
        let mut sim = simulation_with_one_wagon(10.0, 100.0, 5.0);
        let mut coordinator = CollectionCoordinator::new(TrackId::new("collection"));

        let result = coordinator.plan_and_move(&mut sim, LocoId::new("loco1"));

        assert!(matches!(&result, Ok(Wait::TrackCapacity(track, _)) if *track == TrackId::new("retrofit")));
        assert!(matches!(coordinator.phase, Phase::AwaitRouteCapacity { .. }));
    }
}
