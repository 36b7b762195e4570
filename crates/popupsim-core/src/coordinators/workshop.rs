// SPDX-License-Identifier: Apache-2.0
use crate::coupling;
use crate::error::{SimError, SimResult};
use crate::event::Event;
use crate::executor::{Process, ProcessId, Wait};
use crate::ids::{LocoId, TrackId, WagonId, WorkshopId};
use crate::model::{Coupler, LocoStatus, TrackKind, WagonStatus};
use crate::simulation::Simulation;

/// Delay before retrying when a batch could not be formed (no workshop with
/// free bays, or a bay admission race lost to another workshop coordinator).
const RETRY_DELAY: f64 = 1.0;

enum Phase {
    WaitGate,
    WaitForWagons,
    AwaitLocomotive,
    AwaitWorkshop,
    Underway {
        loco: LocoId,
        batch: Vec<WagonId>,
        workshop_id: WorkshopId,
        workshop_track: TrackId,
        batch_length: f64,
    },
    CouplingUp {
        loco: LocoId,
        batch: Vec<WagonId>,
        workshop_id: WorkshopId,
        workshop_track: TrackId,
        batch_length: f64,
    },
    Arriving {
        loco: LocoId,
        batch: Vec<WagonId>,
        workshop_id: WorkshopId,
        workshop_track: TrackId,
        batch_length: f64,
    },
    AwaitBayAdmission {
        loco: LocoId,
        batch: Vec<WagonId>,
        workshop_id: WorkshopId,
        workshop_track: TrackId,
        batch_length: f64,
    },
    Retrofitting {
        batch: Vec<WagonId>,
        workshop_id: WorkshopId,
        workshop_track: TrackId,
    },
    AwaitDeliveryLocomotive {
        batch: Vec<WagonId>,
        workshop_track: TrackId,
    },
    DeliveryUnderway {
        loco: LocoId,
        batch: Vec<WagonId>,
        retrofitted_track: TrackId,
        batch_length: f64,
    },
    DeliveryCouplingUp {
        loco: LocoId,
        batch: Vec<WagonId>,
        retrofitted_track: TrackId,
        batch_length: f64,
    },
    Delivering {
        loco: LocoId,
        batch: Vec<WagonId>,
        retrofitted_track: TrackId,
        batch_length: f64,
    },
    AwaitDeliveryCapacity {
        loco: LocoId,
        batch: Vec<WagonId>,
        retrofitted_track: TrackId,
        batch_length: f64,
    },
}

/// One instance per retrofit track (§4.11): drains it into whichever
/// workshop has room, retrofits in parallel bays, then delivers finished
/// wagons onward to the retrofitted track.
pub struct WorkshopCoordinator {
    retrofit_track: TrackId,
    workshop_rr_index: usize,
    phase: Phase,
}

impl WorkshopCoordinator {
    /// Builds a coordinator bound to one retrofit track, drawing from the
    /// simulation's whole workshop pool.
    #[must_use]
    pub fn new(retrofit_track: TrackId) -> Self {
        Self {
            retrofit_track,
            workshop_rr_index: 0,
            phase: Phase::WaitGate,
        }
    }

    fn check_gate(&mut self, sim: &mut Simulation) -> SimResult<Wait> {
        if sim.coordination.workshop_may_proceed() {
            self.wait_for_wagons(sim)
        } else {
            self.phase = Phase::WaitGate;
            Ok(Wait::CoordinationGate)
        }
    }

    fn wait_for_wagons(&mut self, sim: &mut Simulation) -> SimResult<Wait> {
        if sim.track_queue_len(&self.retrofit_track)? == 0 {
            self.phase = Phase::WaitForWagons;
            return Ok(Wait::TrackQueueNonEmpty(self.retrofit_track.clone()));
        }
        match sim.loco_try_allocate() {
            Some(loco) => self.plan_and_move(sim, loco),
            None => {
                self.phase = Phase::AwaitLocomotive;
                Ok(Wait::Locomotive)
            }
        }
    }

    fn pick_workshop(&mut self, sim: &Simulation) -> Option<WorkshopId> {
        let order = &sim.workshop_order;
        if order.is_empty() {
            return None;
        }
        for offset in 0..order.len() {
            let idx = (self.workshop_rr_index + offset) % order.len();
            let id = &order[idx];
            if sim.workshops.get(id).is_some_and(|w| w.free_bays() > 0) {
                self.workshop_rr_index = (idx + 1) % order.len();
                return Some(id.clone());
            }
        }
        None
    }

    fn plan_and_move(&mut self, sim: &mut Simulation, loco: LocoId) -> SimResult<Wait> {
        let queue_ids: Vec<WagonId> = sim.track(&self.retrofit_track)?.queue.iter().cloned().collect();
        if queue_ids.is_empty() {
            sim.loco_release(&loco);
            self.phase = Phase::WaitForWagons;
            return Ok(Wait::TrackQueueNonEmpty(self.retrofit_track.clone()));
        }

        let Some(workshop_id) = self.pick_workshop(sim) else {
            sim.loco_release(&loco);
            self.phase = Phase::AwaitWorkshop;
            return Ok(Wait::Delay(RETRY_DELAY));
        };
        let workshop = sim
            .workshops
            .get(&workshop_id)
            .ok_or_else(|| SimError::Invariant(format!("unknown workshop {workshop_id}")))?;
        let workshop_track = workshop.track_id.clone();
        let batch_size = (workshop.free_bays() as usize).min(queue_ids.len());
        let mut batch: Vec<WagonId> = queue_ids[..batch_size].to_vec();

        let loco_coupler = sim
            .locomotives
            .get(&loco)
            .map(|l| l.coupler_front)
            .ok_or_else(|| SimError::UnknownLocomotive(loco.clone()))?;
        let wagon_refs: Vec<&crate::model::Wagon> = batch.iter().map(|id| sim.wagon(id)).collect::<SimResult<_>>()?;
        match coupling::validate(loco_coupler, &wagon_refs) {
            Ok(()) => {}
            Err(0) => {
                sim.loco_release(&loco);
                self.phase = Phase::WaitForWagons;
                return Ok(Wait::Delay(RETRY_DELAY));
            }
            Err(valid_prefix) => batch.truncate(valid_prefix),
        }

        let mut batch_length = 0.0;
        for id in &batch {
            batch_length += sim.wagon(id)?.length;
        }
        sim.loco_transition(&loco, LocoStatus::Moving);
        sim.log(Event::locomotive(sim.now(), &loco, "moving").with_from(self.retrofit_track.to_string()).with_to(workshop_track.to_string()));
        let route_minutes = sim.routes.duration(&self.retrofit_track, &workshop_track)?;

        self.phase = Phase::Underway {
            loco,
            batch,
            workshop_id,
            workshop_track,
            batch_length,
        };
        Ok(Wait::Delay(route_minutes))
    }

    fn begin_coupling(
        &mut self,
        sim: &mut Simulation,
        loco: LocoId,
        batch: Vec<WagonId>,
        workshop_id: WorkshopId,
        workshop_track: TrackId,
        batch_length: f64,
    ) -> SimResult<Wait> {
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
            workshop_id,
            workshop_track,
            batch_length,
        };
        Ok(Wait::Delay(coupling_minutes))
    }

    fn begin_decoupling(
        &mut self,
        sim: &mut Simulation,
        loco: LocoId,
        batch: Vec<WagonId>,
        workshop_id: WorkshopId,
        workshop_track: TrackId,
        batch_length: f64,
    ) -> SimResult<Wait> {
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
            workshop_id,
            workshop_track,
            batch_length,
        };
        Ok(Wait::Delay(decoupling_minutes))
    }

    fn try_admit(&mut self, sim: &mut Simulation, loco: LocoId, batch: Vec<WagonId>, workshop_id: WorkshopId, workshop_track: TrackId, batch_length: f64) -> SimResult<Wait> {
        let admitted = sim.workshop_try_admit(&workshop_id, u32::try_from(batch.len()).unwrap_or(u32::MAX))?;
        if !admitted {
            self.phase = Phase::AwaitBayAdmission {
                loco,
                batch,
                workshop_id,
                workshop_track,
                batch_length,
            };
            return Ok(Wait::Delay(RETRY_DELAY));
        }
        sim.track_remove(&self.retrofit_track, &batch, batch_length)?;
        let now = sim.now();
        for id in &batch {
            let wagon = sim.wagon_mut(id)?;
            wagon.current_track = Some(workshop_track.clone());
            wagon.status = WagonStatus::Retrofitting;
            wagon.retrofit_start = Some(now);
        }
        sim.log(Event::locomotive(now, &loco, "arrived").with_to(workshop_track.to_string()));
        sim.loco_release(&loco);
        self.phase = Phase::Retrofitting {
            batch,
            workshop_id,
            workshop_track,
        };
        Ok(Wait::Delay(sim.process_times.wagon_retrofit_time))
    }

}

impl Process for WorkshopCoordinator {
    fn resume(&mut self, sim: &mut Simulation, pid: ProcessId) -> SimResult<Wait> {
        match std::mem::replace(&mut self.phase, Phase::WaitGate) {
            Phase::WaitGate => self.check_gate(sim),
            Phase::WaitForWagons => self.wait_for_wagons(sim),
            Phase::AwaitWorkshop => self.wait_for_wagons(sim),
            Phase::AwaitLocomotive => {
                let loco = sim.take_loco_grant(pid)?;
                if sim.track_queue_len(&self.retrofit_track)? == 0 {
                    sim.loco_release(&loco);
                    self.phase = Phase::WaitForWagons;
                    return Ok(Wait::TrackQueueNonEmpty(self.retrofit_track.clone()));
                }
                self.plan_and_move(sim, loco)
            }
            Phase::Underway {
                loco,
                batch,
                workshop_id,
                workshop_track,
                batch_length,
            } => self.begin_coupling(sim, loco, batch, workshop_id, workshop_track, batch_length),
            Phase::CouplingUp {
                loco,
                batch,
                workshop_id,
                workshop_track,
                batch_length,
            } => self.begin_decoupling(sim, loco, batch, workshop_id, workshop_track, batch_length),
            Phase::Arriving {
                loco,
                batch,
                workshop_id,
                workshop_track,
                batch_length,
            }
            | Phase::AwaitBayAdmission {
                loco,
                batch,
                workshop_id,
                workshop_track,
                batch_length,
            } => self.try_admit(sim, loco, batch, workshop_id, workshop_track, batch_length),
            Phase::Retrofitting {
                batch,
                workshop_id,
                workshop_track,
            } => {
                let now = sim.now();
                for id in &batch {
                    let wagon = sim.wagon_mut(id)?;
                    wagon.coupler_a = Coupler::Dac;
                    wagon.coupler_b = Coupler::Dac;
                    wagon.status = WagonStatus::Retrofitted;
                    wagon.retrofit_end = Some(now);
                }
                sim.workshop_release_bays(&workshop_id, u32::try_from(batch.len()).unwrap_or(u32::MAX))?;
                match sim.loco_try_allocate() {
                    Some(loco) => self.deliver(sim, loco, batch, workshop_track),
                    None => {
                        self.phase = Phase::AwaitDeliveryLocomotive { batch, workshop_track };
                        Ok(Wait::Locomotive)
                    }
                }
            }
            Phase::AwaitDeliveryLocomotive { batch, workshop_track } => {
                let loco = sim.take_loco_grant(pid)?;
                self.deliver(sim, loco, batch, workshop_track)
            }
            Phase::DeliveryUnderway {
                loco,
                batch,
                retrofitted_track,
                batch_length,
            } => self.begin_delivery_coupling(sim, loco, batch, retrofitted_track, batch_length),
            Phase::DeliveryCouplingUp {
                loco,
                batch,
                retrofitted_track,
                batch_length,
            } => self.begin_delivery_decoupling(sim, loco, batch, retrofitted_track, batch_length),
            Phase::Delivering {
                loco,
                batch,
                retrofitted_track,
                batch_length,
            } => {
                if sim.track_try_reserve(&retrofitted_track, batch_length)? {
                    self.finish_delivery(sim, loco, batch, retrofitted_track)
                } else {
                    self.phase = Phase::AwaitDeliveryCapacity {
                        loco,
                        batch,
                        retrofitted_track: retrofitted_track.clone(),
                        batch_length,
                    };
                    Ok(Wait::TrackCapacity(retrofitted_track, batch_length))
                }
            }
            Phase::AwaitDeliveryCapacity {
                loco,
                batch,
                retrofitted_track,
                batch_length: _,
            } => self.finish_delivery(sim, loco, batch, retrofitted_track),
        }
    }

    fn label(&self) -> &str {
        "workshop"
    }
}

impl WorkshopCoordinator {
    fn deliver(&mut self, sim: &mut Simulation, loco: LocoId, batch: Vec<WagonId>, workshop_track: TrackId) -> SimResult<Wait> {
        let retrofitted_track = sim.single_track_of_kind(TrackKind::Retrofitted)?;
        let mut batch_length = 0.0;
        for id in &batch {
            batch_length += sim.wagon(id)?.length;
        }
        sim.loco_transition(&loco, LocoStatus::Moving);
        sim.log(Event::locomotive(sim.now(), &loco, "moving").with_from(workshop_track.to_string()).with_to(retrofitted_track.to_string()));
        let route_minutes = sim.routes.duration(&workshop_track, &retrofitted_track)?;

        self.phase = Phase::DeliveryUnderway {
            loco,
            batch,
            retrofitted_track,
            batch_length,
        };
        Ok(Wait::Delay(route_minutes))
    }

    fn begin_delivery_coupling(&mut self, sim: &mut Simulation, loco: LocoId, batch: Vec<WagonId>, retrofitted_track: TrackId, batch_length: f64) -> SimResult<Wait> {
        sim.loco_transition(&loco, LocoStatus::Coupling);
        let mut coupling_minutes = 0.0;
        for id in &batch {
            let coupler = sim.wagon(id)?.coupler_a;
            let minutes = sim.process_times.coupling_time(coupler);
            coupling_minutes += minutes;
            sim.log(Event::wagon(sim.now(), id, "coupling").with_extra("minutes", minutes.to_string()));
        }
        self.phase = Phase::DeliveryCouplingUp {
            loco,
            batch,
            retrofitted_track,
            batch_length,
        };
        Ok(Wait::Delay(coupling_minutes))
    }

    fn begin_delivery_decoupling(&mut self, sim: &mut Simulation, loco: LocoId, batch: Vec<WagonId>, retrofitted_track: TrackId, batch_length: f64) -> SimResult<Wait> {
        sim.loco_transition(&loco, LocoStatus::Decoupling);
        let mut decoupling_minutes = 0.0;
        for id in &batch {
            let coupler = sim.wagon(id)?.coupler_a;
            let minutes = sim.process_times.decoupling_time(coupler);
            decoupling_minutes += minutes;
            sim.log(Event::wagon(sim.now(), id, "decoupling").with_extra("minutes", minutes.to_string()));
        }
        self.phase = Phase::Delivering {
            loco,
            batch,
            retrofitted_track,
            batch_length,
        };
        Ok(Wait::Delay(decoupling_minutes))
    }

    fn finish_delivery(&mut self, sim: &mut Simulation, loco: LocoId, batch: Vec<WagonId>, retrofitted_track: TrackId) -> SimResult<Wait> {
        sim.track_finalize_add(&retrofitted_track, &batch)?;
        let now = sim.now();
        for id in &batch {
            sim.wagon_mut(id)?.current_track = Some(retrofitted_track.clone());
        }
        sim.log(Event::locomotive(now, &loco, "arrived").with_to(retrofitted_track.to_string()));
        sim.loco_release(&loco);
        sim.coordination.accumulate(batch.iter().cloned());
        self.phase = Phase::WaitGate;
        self.check_gate(sim)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::model::{RouteTable, Track, Workshop};
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

    fn bare_simulation() -> Simulation {
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
            process_times(),
            1,
        )
    }

    #[test]
    fn pick_workshop_skips_full_workshops_and_advances_round_robin() {
        let mut sim = bare_simulation();
        let full = WorkshopId::new("full");
        let open = WorkshopId::new("open");
        sim.workshop_order = vec![full.clone(), open.clone()];
        sim.workshops.insert(full.clone(), Workshop::new(full.clone(), TrackId::new("wt1"), 1));
        if let Some(workshop) = sim.workshops.get_mut(&full) {
            workshop.bays_busy = 1;
        }
        sim.workshops.insert(open.clone(), Workshop::new(open.clone(), TrackId::new("wt2"), 2));

        let mut coordinator = WorkshopCoordinator::new(TrackId::new("retrofit"));
        let chosen = coordinator.pick_workshop(&sim);

        assert_eq!(chosen, Some(open));
    }

    #[test]
    fn pick_workshop_returns_none_when_every_bay_is_busy() {
        let mut sim = bare_simulation();
        let ws = WorkshopId::new("ws1");
        sim.workshop_order = vec![ws.clone()];
        sim.workshops.insert(ws.clone(), Workshop::new(ws.clone(), TrackId::new("wt1"), 1));
        if let Some(workshop) = sim.workshops.get_mut(&ws) {
            workshop.bays_busy = 1;
        }

        let mut coordinator = WorkshopCoordinator::new(TrackId::new("retrofit"));
        assert_eq!(coordinator.pick_workshop(&sim), None);
    }

    #[test]
    fn try_admit_reserves_bays_and_starts_the_retrofit_clock() {
        let mut sim = bare_simulation();
        let ws_id = WorkshopId::new("ws1");
        let workshop_track = TrackId::new("workshop_track");
        sim.tracks.insert(workshop_track.clone(), Track::new(workshop_track.clone(), TrackKind::Workshop, 100.0, 1.0, None));
        sim.workshops.insert(ws_id.clone(), Workshop::new(ws_id.clone(), workshop_track.clone(), 2));

        let retrofit_track = TrackId::new("retrofit");
        sim.tracks.insert(retrofit_track.clone(), Track::new(retrofit_track.clone(), TrackKind::Retrofit, 100.0, 1.0, None));
        let wagon_id = WagonId::new("w1");
        let mut wagon = crate::model::Wagon::new(wagon_id.clone(), 10.0, Coupler::Screw, Coupler::Screw, false, true, SimTime::ZERO);
        wagon.status = WagonStatus::WaitingRetrofit;
        sim.insert_wagon(wagon);
        assert!(matches!(sim.track_try_reserve(&retrofit_track, 10.0), Ok(true)));
        assert!(sim.track_finalize_add(&retrofit_track, std::slice::from_ref(&wagon_id)).is_ok());

        let loco_id = LocoId::new("loco1");
        sim.locomotives.insert(loco_id.clone(), crate::model::Locomotive::new(loco_id.clone(), retrofit_track.clone(), Coupler::Screw, Coupler::Screw));

        let mut coordinator = WorkshopCoordinator::new(retrofit_track);
        let result = coordinator.try_admit(&mut sim, loco_id, vec![wagon_id.clone()], ws_id.clone(), workshop_track, 10.0);

        assert!(matches!(result, Ok(Wait::Delay(minutes)) if minutes == process_times().wagon_retrofit_time));
        assert_eq!(sim.workshops[&ws_id].bays_busy, 1);
        assert!(matches!(sim.wagon(&wagon_id), Ok(w) if w.status == WagonStatus::Retrofitting));
    }
}
