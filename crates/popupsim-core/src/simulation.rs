// SPDX-License-Identifier: Apache-2.0
//! The top-level simulation state: the scheduler plus every shared,
//! mutable resource a coordinator can touch.
//!
//! Per §9's "global mutable state" note, this single value is what gets
//! passed explicitly to every coordinator instead of scattering shared
//! state across globals.

use std::collections::{HashMap, VecDeque};

use tracing::{debug, info, warn};

use crate::coordination::CoordinationService;
use crate::error::{SimError, SimResult};
use crate::event::{Event, EventLog};
use crate::executor::{Process, ProcessId, Wait, WakeQueue};
use crate::ids::{LocoId, TrackId, WagonId, WorkshopId};
use crate::model::{LocoStatus, Locomotive, RouteTable, Track, TrackKind, Wagon, Workshop};
use crate::scenario::{ProcessTimes, Scenario};
use crate::selector::Selectors;
use crate::time::SimTime;

/// The whole of a run's shared state: scheduler plus domain resources.
pub struct Simulation {
    clock: SimTime,
    horizon: SimTime,
    wake_queue: WakeQueue,
    processes: HashMap<ProcessId, Box<dyn Process>>,
    next_pid: ProcessId,
    fatal: Option<SimError>,

    /// Declaration order of tracks, for selectors and deterministic output.
    pub track_order: Vec<TrackId>,
    pub(crate) tracks: HashMap<TrackId, Track>,

    pub(crate) locomotives: HashMap<LocoId, Locomotive>,
    loco_idle: VecDeque<LocoId>,
    loco_waiters: VecDeque<ProcessId>,
    loco_grants: HashMap<ProcessId, LocoId>,

    /// Declaration order of workshops.
    pub workshop_order: Vec<WorkshopId>,
    pub(crate) workshops: HashMap<WorkshopId, Workshop>,

    pub(crate) wagons: HashMap<WagonId, Wagon>,
    pub(crate) routes: RouteTable,
    pub(crate) coordination: CoordinationService,
    coordination_gate_waiters: VecDeque<ProcessId>,
    pub(crate) selectors: Selectors,
    pub(crate) process_times: ProcessTimes,
    pub(crate) events: EventLog,
}

impl Simulation {
    /// Builds the initial, empty-of-activity simulation state from a
    /// validated scenario. Spawning the four coordinator kinds is the
    /// caller's job (`run_scenario`), keeping this constructor a pure data
    /// transform.
    #[must_use]
    pub fn new(
        horizon: SimTime,
        track_order: Vec<TrackId>,
        tracks: HashMap<TrackId, Track>,
        locomotives: HashMap<LocoId, Locomotive>,
        workshop_order: Vec<WorkshopId>,
        workshops: HashMap<WorkshopId, Workshop>,
        routes: RouteTable,
        selectors: Selectors,
        process_times: ProcessTimes,
        accumulator_capacity: usize,
    ) -> Self {
        let loco_idle = locomotives.keys().cloned().collect();
        Self {
            clock: SimTime::ZERO,
            horizon,
            wake_queue: WakeQueue::default(),
            processes: HashMap::new(),
            next_pid: 0,
            fatal: None,
            track_order,
            tracks,
            locomotives,
            loco_idle,
            loco_waiters: VecDeque::new(),
            loco_grants: HashMap::new(),
            workshop_order,
            workshops,
            wagons: HashMap::new(),
            routes,
            coordination: CoordinationService::new(accumulator_capacity),
            coordination_gate_waiters: VecDeque::new(),
            selectors,
            process_times,
            events: EventLog::new(),
        }
    }

    /// Current virtual time.
    #[must_use]
    pub fn now(&self) -> SimTime {
        self.clock
    }

    /// Appends an event to the log.
    pub fn log(&mut self, event: Event) {
        self.events.push(event);
    }

    /// Borrows the event log.
    #[must_use]
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Borrows a wagon by id.
    pub fn wagon(&self, id: &WagonId) -> SimResult<&Wagon> {
        self.wagons.get(id).ok_or_else(|| SimError::UnknownWagon(id.clone()))
    }

    /// Mutably borrows a wagon by id.
    pub fn wagon_mut(&mut self, id: &WagonId) -> SimResult<&mut Wagon> {
        self.wagons
            .get_mut(id)
            .ok_or_else(|| SimError::UnknownWagon(id.clone()))
    }

    /// Registers a newly-arrived wagon.
    pub fn insert_wagon(&mut self, wagon: Wagon) {
        self.wagons.insert(wagon.id.clone(), wagon);
    }

    /// Borrows a track by id.
    pub fn track(&self, id: &TrackId) -> SimResult<&Track> {
        self.tracks.get(id).ok_or_else(|| SimError::UnknownTrack(id.clone()))
    }

    /// Finds the (assumed unique) track of a given kind, in declaration
    /// order. Used for the single retrofitted-output track topology assumed
    /// by the workshop and parking coordinators.
    pub(crate) fn single_track_of_kind(&self, kind: TrackKind) -> SimResult<TrackId> {
        self.track_order
            .iter()
            .find(|id| self.tracks.get(*id).is_some_and(|t| t.kind == kind))
            .cloned()
            .ok_or_else(|| SimError::Invariant(format!("no track of kind {kind:?} is configured")))
    }

    // ---- scheduler -----------------------------------------------------

    /// Spawns a process, scheduling its first `resume` at the current
    /// instant.
    pub fn spawn<P: Process + 'static>(&mut self, process: P) -> ProcessId {
        let pid = self.next_pid;
        self.next_pid += 1;
        self.processes.insert(pid, Box::new(process));
        let now = self.clock;
        self.wake_queue.push(now, pid);
        pid
    }

    /// Runs the scheduler until no events remain or the horizon is reached.
    /// Returns the fatal error, if one was raised by a coordinator.
    pub fn run(&mut self) -> SimResult<()> {
        while let Some(wake) = self.wake_queue.pop() {
            if wake.time > self.horizon {
                break;
            }
            self.clock = wake.time;
            let Some(mut process) = self.processes.remove(&wake.pid) else {
                continue;
            };
            match process.resume(self, wake.pid) {
                Ok(Wait::Done) => {
                    debug!(pid = wake.pid, label = process.label(), "process finished");
                }
                Ok(other) => {
                    self.register_wait(wake.pid, other);
                    self.processes.insert(wake.pid, process);
                }
                Err(err) => {
                    warn!(pid = wake.pid, label = process.label(), error = %err, "process raised a fatal error");
                    self.fatal = Some(err);
                    break;
                }
            }
        }
        match self.fatal.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn register_wait(&mut self, pid: ProcessId, wait: Wait) {
        match wait {
            Wait::Delay(minutes) => {
                let at = self.clock.after(minutes);
                self.wake_queue.push(at, pid);
            }
            Wait::TrackQueueNonEmpty(track_id) => {
                if let Some(track) = self.tracks.get_mut(&track_id) {
                    track.queue_waiters.push_back(pid);
                }
            }
            Wait::TrackCapacity(track_id, metres) => {
                if let Some(track) = self.tracks.get_mut(&track_id) {
                    track.capacity_waiters.push_back(crate::model::CapacityWaiter {
                        process: pid,
                        requested: metres,
                    });
                }
            }
            Wait::Locomotive => self.loco_waiters.push_back(pid),
            Wait::CoordinationGate => self.coordination_gate_waiters.push_back(pid),
            Wait::Done => unreachable!("Done is handled by the caller before register_wait"),
        }
    }

    fn wake_now(&mut self, pid: ProcessId) {
        let now = self.clock;
        self.wake_queue.push(now, pid);
    }

    // ---- track capacity --------------------------------------------------

    /// Attempts to reserve `metres` on `track_id` right now. FIFO-fair: if
    /// anyone is already waiting on this track's capacity, a fresh request
    /// must also wait, even if it would technically fit.
    pub fn track_try_reserve(&mut self, track_id: &TrackId, metres: f64) -> SimResult<bool> {
        let (has_waiters, fits) = {
            let track = self
                .tracks
                .get(track_id)
                .ok_or_else(|| SimError::UnknownTrack(track_id.clone()))?;
            (!track.capacity_waiters.is_empty(), metres <= track.free() + 1e-9)
        };
        if has_waiters || !fits {
            self.log_capacity_blocked(track_id, metres);
            return Ok(false);
        }
        if let Some(track) = self.tracks.get_mut(track_id) {
            track.used += metres;
        }
        Ok(true)
    }

    /// Logs the point a request for `metres` on `track_id` had to queue
    /// behind existing occupants or waiters, before its eventual
    /// `capacity_reserved`.
    fn log_capacity_blocked(&mut self, track_id: &TrackId, metres: f64) {
        let now = self.now();
        let (used, queue_len) = self
            .tracks
            .get(track_id)
            .map_or((0.0, 0), |track| (track.used, track.len()));
        self.log(
            Event::resource_track(now, track_id, "capacity_blocked")
                .with_extra("requested", metres.to_string())
                .with_extra("used", used.to_string())
                .with_extra("queue_len", queue_len.to_string()),
        );
    }

    /// Finalizes a reserved add: moves `wagons` onto `track_id`'s FIFO and
    /// sets their `current_track`. Capacity must already be reserved, either
    /// by [`Self::track_try_reserve`] or by the wait-list grant performed in
    /// [`Self::track_remove`].
    pub fn track_finalize_add(&mut self, track_id: &TrackId, wagon_ids: &[WagonId]) -> SimResult<()> {
        let now = self.now();
        for id in wagon_ids {
            let wagon = self.wagon_mut(id)?;
            wagon.current_track = Some(track_id.clone());
        }
        let track = self
            .tracks
            .get_mut(track_id)
            .ok_or_else(|| SimError::UnknownTrack(track_id.clone()))?;
        for id in wagon_ids {
            track.queue.push_back(id.clone());
        }
        let (used, queue_len) = (track.used, track.len());
        self.log(
            Event::resource_track(now, track_id, "capacity_reserved")
                .with_extra("count", wagon_ids.len().to_string())
                .with_extra("used", used.to_string())
                .with_extra("queue_len", queue_len.to_string()),
        );
        self.notify_queue_waiters(track_id);
        Ok(())
    }

    /// Removes `wagon_ids` (must currently be at the front of the track's
    /// FIFO, in order) and frees their metres, waking capacity waiters that
    /// now fit, in arrival order.
    pub fn track_remove(&mut self, track_id: &TrackId, wagon_ids: &[WagonId], total_length: f64) -> SimResult<()> {
        let now = self.now();
        let track = self
            .tracks
            .get_mut(track_id)
            .ok_or_else(|| SimError::UnknownTrack(track_id.clone()))?;
        for id in wagon_ids {
            let front = track.queue.pop_front();
            if front.as_ref() != Some(id) {
                return Err(SimError::Invariant(format!(
                    "track {track_id} FIFO violated: expected to remove {id} from the front"
                )));
            }
        }
        let overshoot = total_length - track.used;
        if overshoot > 0.1 {
            return Err(SimError::CapacityOverflow {
                track: track_id.clone(),
                requested: total_length,
                available: track.used,
            });
        }
        track.used = (track.used - total_length).max(0.0);
        let (used, queue_len) = (track.used, track.len());
        self.log(
            Event::resource_track(now, track_id, "capacity_released")
                .with_extra("count", wagon_ids.len().to_string())
                .with_extra("used", used.to_string())
                .with_extra("queue_len", queue_len.to_string()),
        );
        self.grant_capacity_waiters(track_id);
        Ok(())
    }

    fn grant_capacity_waiters(&mut self, track_id: &TrackId) {
        let Some(track) = self.tracks.get_mut(track_id) else {
            return;
        };
        let mut granted = Vec::new();
        loop {
            let fits = track.capacity_waiters.front().is_some_and(|w| w.requested <= track.free() + 1e-9);
            if !fits {
                break;
            }
            let Some(waiter) = track.capacity_waiters.pop_front() else {
                break;
            };
            track.used += waiter.requested;
            granted.push(waiter.process);
        }
        for pid in granted {
            self.wake_now(pid);
        }
    }

    fn notify_queue_waiters(&mut self, track_id: &TrackId) {
        let Some(track) = self.tracks.get_mut(track_id) else {
            return;
        };
        let waiters: Vec<ProcessId> = track.queue_waiters.drain(..).collect();
        for pid in waiters {
            self.wake_now(pid);
        }
    }

    /// Number of wagons currently queued on a track.
    pub fn track_queue_len(&self, track_id: &TrackId) -> SimResult<usize> {
        Ok(self.track(track_id)?.len())
    }

    /// Pops up to `n` wagons from the front of a track's FIFO.
    pub fn track_dequeue_front(&mut self, track_id: &TrackId, n: usize) -> SimResult<Vec<WagonId>> {
        let track = self
            .tracks
            .get_mut(track_id)
            .ok_or_else(|| SimError::UnknownTrack(track_id.clone()))?;
        let take = n.min(track.queue.len());
        Ok((0..take).filter_map(|_| track.queue.pop_front()).collect())
    }

    /// Re-pushes wagon ids to the *front* of a track's FIFO, preserving
    /// their relative order, when a batch partially fails and the
    /// remainder must be re-queued ahead of later arrivals.
    pub fn track_requeue_front(&mut self, track_id: &TrackId, wagon_ids: &[WagonId]) -> SimResult<()> {
        let track = self
            .tracks
            .get_mut(track_id)
            .ok_or_else(|| SimError::UnknownTrack(track_id.clone()))?;
        for id in wagon_ids.iter().rev() {
            track.queue.push_front(id.clone());
        }
        self.notify_queue_waiters(track_id);
        Ok(())
    }

    // ---- locomotive pool -------------------------------------------------

    /// Attempts to allocate an idle locomotive (FIFO: longest-idle first).
    pub fn loco_try_allocate(&mut self) -> Option<LocoId> {
        if !self.loco_waiters.is_empty() {
            return None;
        }
        let loco_id = self.loco_idle.pop_front()?;
        let now = self.clock;
        if let Some(loco) = self.locomotives.get_mut(&loco_id) {
            loco.transition(now, LocoStatus::Moving);
        }
        self.log(Event::locomotive(now, &loco_id, "allocated"));
        Some(loco_id)
    }

    /// Fetches the locomotive granted to a process that was woken from
    /// [`Wait::Locomotive`].
    pub fn take_loco_grant(&mut self, pid: ProcessId) -> SimResult<LocoId> {
        self.loco_grants
            .remove(&pid)
            .ok_or_else(|| SimError::Invariant("resumed from Wait::Locomotive without a grant".into()))
    }

    /// Returns a locomotive to the pool (or to a waiter, FIFO-fair),
    /// transitioning it to parking status.
    pub fn loco_release(&mut self, loco_id: &LocoId) {
        let now = self.clock;
        if let Some(loco) = self.locomotives.get_mut(loco_id) {
            loco.transition(now, LocoStatus::Parking);
        }
        self.log(Event::locomotive(now, loco_id, "released"));
        if let Some(pid) = self.loco_waiters.pop_front() {
            self.loco_grants.insert(pid, loco_id.clone());
            self.wake_now(pid);
        } else {
            self.loco_idle.push_back(loco_id.clone());
        }
    }

    /// Transitions a locomotive's activity status, recording the change for
    /// utilization derivation.
    pub fn loco_transition(&mut self, loco_id: &LocoId, status: LocoStatus) {
        let now = self.clock;
        if let Some(loco) = self.locomotives.get_mut(loco_id) {
            loco.transition(now, status);
        }
    }

    // ---- workshop bays -----------------------------------------------------

    /// Attempts to admit `n` wagons to bays at `workshop_id` right now.
    pub fn workshop_try_admit(&mut self, workshop_id: &WorkshopId, n: u32) -> SimResult<bool> {
        let now = self.now();
        let workshop = self
            .workshops
            .get_mut(workshop_id)
            .ok_or_else(|| SimError::Invariant(format!("unknown workshop {workshop_id}")))?;
        if workshop.free_bays() < n {
            return Ok(false);
        }
        workshop.bays_busy += n;
        self.log(
            Event::resource_workshop(now, workshop_id, "bay_occupied")
                .with_extra("busy", workshop.bays_busy.to_string())
                .with_extra("total", workshop.bays_total.to_string()),
        );
        Ok(true)
    }

    /// Releases `n` bays at `workshop_id`, waking anything waiting on the
    /// workshop's own arrival queue (handled by the workshop coordinator
    /// re-checking `free_bays` itself; see §4.11 step 3's cooperative
    /// yield).
    pub fn workshop_release_bays(&mut self, workshop_id: &WorkshopId, n: u32) -> SimResult<()> {
        let now = self.now();
        let workshop = self
            .workshops
            .get_mut(workshop_id)
            .ok_or_else(|| SimError::Invariant(format!("unknown workshop {workshop_id}")))?;
        workshop.bays_busy = workshop.bays_busy.saturating_sub(n);
        self.log(
            Event::resource_workshop(now, workshop_id, "bay_released")
                .with_extra("busy", workshop.bays_busy.to_string())
                .with_extra("total", workshop.bays_total.to_string()),
        );
        Ok(())
    }

    // ---- coordination gate --------------------------------------------------

    /// Wakes anything waiting for the workshop gate, called after
    /// `finish_parking` clears the accumulator.
    pub fn wake_coordination_gate(&mut self) {
        let waiters: Vec<ProcessId> = self.coordination_gate_waiters.drain(..).collect();
        for pid in waiters {
            self.wake_now(pid);
        }
    }

    /// Logs a train/batch/scenario-level informational line. A thin
    /// wrapper so coordinators don't each import `tracing` separately.
    pub fn note(&self, message: &str) {
        info!("{message}");
    }
}
