// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;

use crate::batching::pack_by_capacity;
use crate::error::SimResult;
use crate::event::Event;
use crate::executor::{Process, ProcessId, Wait};
use crate::ids::{LocoId, TrackId, WagonId};
use crate::model::{LocoStatus, Track, TrackKind, WagonStatus};
use crate::selector::track_ids_of_kind;
use crate::simulation::Simulation;

enum Phase {
    /// No parking run underway; re-checks the accumulator every
    /// `idle_check_interval` minutes (§4.12's idle-timer trigger, which also
    /// upper-bounds the latency of the threshold/critical triggers).
    Idle,
    /// A run is underway; waiting on a parking track to have room for even
    /// the batch's lead wagon.
    AwaitRouteCapacity,
    AwaitLocomotive {
        batch: Vec<WagonId>,
        parking_track: TrackId,
    },
    /// Hauling the batch to the parking track; the locomotive is in
    /// `Moving` status for the route's travel time.
    Underway {
        loco: LocoId,
        batch: Vec<WagonId>,
        parking_track: TrackId,
        batch_length: f64,
    },
    CouplingUp {
        loco: LocoId,
        batch: Vec<WagonId>,
        parking_track: TrackId,
        batch_length: f64,
    },
    /// Decoupling complete, the batch has arrived at `parking_track`.
    Arrived {
        loco: LocoId,
        batch: Vec<WagonId>,
        parking_track: TrackId,
        batch_length: f64,
    },
    AwaitParkingCapacity {
        loco: LocoId,
        batch: Vec<WagonId>,
        parking_track: TrackId,
        batch_length: f64,
    },
}

/// Drains the retrofitted-wagon accumulator onto parking tracks, triggered
/// by threshold, critical, or idle-timer conditions (§4.12).
pub struct ParkingCoordinator {
    normal_threshold: f64,
    critical_threshold: f64,
    idle_check_interval: f64,
    phase: Phase,
}

impl ParkingCoordinator {
    /// Builds a coordinator from the scenario's priority-protocol constants.
    #[must_use]
    pub fn new(normal_threshold: f64, critical_threshold: f64, idle_check_interval: f64) -> Self {
        Self {
            normal_threshold,
            critical_threshold,
            idle_check_interval,
            phase: Phase::Idle,
        }
    }

    fn idle_check(&mut self, sim: &mut Simulation) -> SimResult<Wait> {
        if sim.coordination.accumulator_is_empty() {
            self.phase = Phase::Idle;
            Ok(Wait::Delay(self.idle_check_interval))
        } else {
            self.plan(sim)
        }
    }

    fn plan(&mut self, sim: &mut Simulation) -> SimResult<Wait> {
        if sim.coordination.accumulator_is_empty() {
            sim.coordination.finish_parking();
            sim.wake_coordination_gate();
            self.phase = Phase::Idle;
            return Ok(Wait::Delay(self.idle_check_interval));
        }
        if !sim.coordination.parking_in_progress() {
            let fraction = sim.coordination.accumulator_fraction();
            let trigger = if fraction > self.critical_threshold {
                "critical"
            } else if fraction > self.normal_threshold {
                "threshold"
            } else {
                "idle"
            };
            sim.coordination.begin_parking();
            sim.log(Event::batch(sim.now(), "parking", "triggered").with_extra("reason", trigger));
        }

        let candidates: Vec<WagonId> = sim.coordination.accumulator().to_vec();
        let mut lengths = HashMap::with_capacity(candidates.len());
        for id in &candidates {
            lengths.insert(id.clone(), sim.wagon(id)?.length);
        }
        let first_len = lengths[&candidates[0]];

        let parking_ids = track_ids_of_kind(&sim.track_order, &sim.tracks, TrackKind::Parking);
        let parking_tracks: Vec<&Track> = parking_ids.into_iter().filter_map(|id| sim.tracks.get(id)).collect();
        let Some(chosen) = sim.selectors.parking.select(&parking_tracks, first_len) else {
            self.phase = Phase::AwaitRouteCapacity;
            let Some(fallback) = parking_tracks.first() else {
                return Err(crate::error::SimError::Invariant("no parking track is configured".into()));
            };
            return Ok(Wait::TrackCapacity(fallback.id.clone(), first_len));
        };
        let parking_track = chosen.id.clone();
        let batch = pack_by_capacity(&candidates, &|id| lengths[id], chosen.free());
        if batch.is_empty() {
            self.phase = Phase::AwaitRouteCapacity;
            return Ok(Wait::TrackCapacity(parking_track, first_len));
        }

        match sim.loco_try_allocate() {
            Some(loco) => self.move_batch(sim, loco, batch, parking_track),
            None => {
                self.phase = Phase::AwaitLocomotive { batch, parking_track };
                Ok(Wait::Locomotive)
            }
        }
    }

    fn move_batch(&mut self, sim: &mut Simulation, loco: LocoId, batch: Vec<WagonId>, parking_track: TrackId) -> SimResult<Wait> {
        let retrofitted_track = sim.single_track_of_kind(TrackKind::Retrofitted)?;
        let mut batch_length = 0.0;
        for id in &batch {
            batch_length += sim.wagon(id)?.length;
        }
        sim.loco_transition(&loco, LocoStatus::Moving);
        sim.log(Event::locomotive(sim.now(), &loco, "moving").with_from(retrofitted_track.to_string()).with_to(parking_track.to_string()));
        let route_minutes = sim.routes.duration(&retrofitted_track, &parking_track)?;

        self.phase = Phase::Underway {
            loco,
            batch,
            parking_track,
            batch_length,
        };
        Ok(Wait::Delay(route_minutes))
    }

    fn begin_coupling(&mut self, sim: &mut Simulation, loco: LocoId, batch: Vec<WagonId>, parking_track: TrackId, batch_length: f64) -> SimResult<Wait> {
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
            parking_track,
            batch_length,
        };
        Ok(Wait::Delay(coupling_minutes))
    }

    fn begin_decoupling(&mut self, sim: &mut Simulation, loco: LocoId, batch: Vec<WagonId>, parking_track: TrackId, batch_length: f64) -> SimResult<Wait> {
        sim.loco_transition(&loco, LocoStatus::Decoupling);
        let mut decoupling_minutes = 0.0;
        for id in &batch {
            let coupler = sim.wagon(id)?.coupler_a;
            let minutes = sim.process_times.decoupling_time(coupler);
            decoupling_minutes += minutes;
            sim.log(Event::wagon(sim.now(), id, "decoupling").with_extra("minutes", minutes.to_string()));
        }
        self.phase = Phase::Arrived {
            loco,
            batch,
            parking_track,
            batch_length,
        };
        Ok(Wait::Delay(decoupling_minutes))
    }

    fn finalize(&mut self, sim: &mut Simulation, loco: LocoId, batch: Vec<WagonId>, parking_track: TrackId, batch_length: f64) -> SimResult<Wait> {
        let retrofitted_track = sim.single_track_of_kind(TrackKind::Retrofitted)?;
        sim.track_remove(&retrofitted_track, &batch, batch_length)?;
        sim.track_finalize_add(&parking_track, &batch)?;
        let now = sim.now();
        for id in &batch {
            let wagon = sim.wagon_mut(id)?;
            wagon.current_track = Some(parking_track.clone());
            wagon.status = WagonStatus::Parked;
        }
        sim.coordination.remove_from_accumulator(&batch);
        sim.log(Event::locomotive(now, &loco, "arrived").with_to(parking_track.to_string()));
        for id in &batch {
            sim.log(Event::wagon(now, id, "parked"));
        }
        sim.loco_release(&loco);

        if sim.coordination.accumulator_fraction() <= self.normal_threshold || sim.coordination.accumulator_is_empty() {
            sim.coordination.finish_parking();
            sim.wake_coordination_gate();
            self.phase = Phase::Idle;
            Ok(Wait::Delay(self.idle_check_interval))
        } else {
            self.idle_check(sim)
        }
    }
}

impl Process for ParkingCoordinator {
    fn resume(&mut self, sim: &mut Simulation, pid: ProcessId) -> SimResult<Wait> {
        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Idle => self.idle_check(sim),
            Phase::AwaitRouteCapacity => self.plan(sim),
            Phase::AwaitLocomotive { batch, parking_track } => {
                let loco = sim.take_loco_grant(pid)?;
                self.move_batch(sim, loco, batch, parking_track)
            }
            Phase::Underway {
                loco,
                batch,
                parking_track,
                batch_length,
            } => self.begin_coupling(sim, loco, batch, parking_track, batch_length),
            Phase::CouplingUp {
                loco,
                batch,
                parking_track,
                batch_length,
            } => self.begin_decoupling(sim, loco, batch, parking_track, batch_length),
            Phase::Arrived {
                loco,
                batch,
                parking_track,
                batch_length,
            } => {
                if sim.track_try_reserve(&parking_track, batch_length)? {
                    self.finalize(sim, loco, batch, parking_track, batch_length)
                } else {
                    self.phase = Phase::AwaitParkingCapacity {
                        loco,
                        batch,
                        parking_track: parking_track.clone(),
                        batch_length,
                    };
                    Ok(Wait::TrackCapacity(parking_track, batch_length))
                }
            }
            Phase::AwaitParkingCapacity {
                loco,
                batch,
                parking_track,
                batch_length,
            } => self.finalize(sim, loco, batch, parking_track, batch_length),
        }
    }

    fn label(&self) -> &str {
        "parking"
    }
}
