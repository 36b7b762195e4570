// SPDX-License-Identifier: Apache-2.0
use crate::ids::{LocoId, TrackId};
use crate::model::coupler::Coupler;
use crate::time::SimTime;

/// Activity state of a locomotive. A locomotive is always in exactly one of
/// these, or idle in the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocoStatus {
    /// Idle at a track, not currently allocated.
    Parking,
    /// Hauling a rake between tracks.
    Moving,
    /// Coupling to a rake.
    Coupling,
    /// Decoupling from a rake.
    Decoupling,
}

/// A named locomotive plus its status history for utilization derivation.
#[derive(Debug, Clone)]
pub struct Locomotive {
    /// Unique identifier.
    pub id: LocoId,
    /// Track the locomotive is based at when idle.
    pub home_track: TrackId,
    /// Coupler fitted to the front (rake-facing on pickup).
    pub coupler_front: Coupler,
    /// Coupler fitted to the back.
    pub coupler_back: Coupler,
    /// Current activity state.
    pub status: LocoStatus,
    /// `(time, status)` pairs recording every status transition, in order.
    /// Used by the metrics aggregator to compute per-state utilization; the
    /// locomotive itself never derives utilization from this.
    pub status_history: Vec<(SimTime, LocoStatus)>,
}

impl Locomotive {
    /// Constructs a locomotive starting idle in its home track's pool.
    #[must_use]
    pub fn new(
        id: LocoId,
        home_track: TrackId,
        coupler_front: Coupler,
        coupler_back: Coupler,
    ) -> Self {
        Self {
            id,
            home_track,
            coupler_front,
            coupler_back,
            status: LocoStatus::Parking,
            status_history: vec![(SimTime::ZERO, LocoStatus::Parking)],
        }
    }

    /// Records a status transition at `now`.
    pub fn transition(&mut self, now: SimTime, status: LocoStatus) {
        self.status = status;
        self.status_history.push((now, status));
    }
}
