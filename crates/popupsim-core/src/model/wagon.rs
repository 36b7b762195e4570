// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};

use crate::ids::{TrackId, WagonId};
use crate::model::coupler::Coupler;
use crate::time::SimTime;

/// Lifecycle status of a wagon. Transitions form a DAG terminating at
/// `Parked` or `Rejected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WagonStatus {
    /// Not yet classified by the arrival coordinator.
    Unknown,
    /// Sitting on a collection track, FIFO-queued for pickup.
    Collection,
    /// Delivered to a retrofit track, queued for a workshop bay.
    WaitingRetrofit,
    /// Occupying a workshop bay.
    Retrofitting,
    /// Retrofit complete, awaiting transport to a parking track.
    Retrofitted,
    /// Terminal: parked.
    Parked,
    /// Terminal: rejected at arrival (loaded, or no retrofit needed).
    Rejected,
}

/// A single freight wagon tracked for the duration of a run.
///
/// Length and identity are immutable; everything else mutates as the wagon
/// moves through the retrofit workflow.
#[derive(Debug, Clone)]
pub struct Wagon {
    /// Unique identifier.
    pub id: WagonId,
    /// Length in metres. Invariant: `> 0`.
    pub length: f64,
    /// Current lifecycle status.
    pub status: WagonStatus,
    /// Track the wagon currently occupies, if any. A wagon occupies at most
    /// one track at a time.
    pub current_track: Option<TrackId>,
    /// Coupler fitted to the leading (A) end.
    pub coupler_a: Coupler,
    /// Coupler fitted to the trailing (B) end.
    pub coupler_b: Coupler,
    /// Whether the wagon arrived loaded (always rejected if so).
    pub is_loaded: bool,
    /// Whether the wagon requires a DAC retrofit at all.
    pub needs_retrofit: bool,
    /// Time the wagon's train arrived.
    pub arrival: SimTime,
    /// Time the wagon entered a workshop bay, once known.
    pub retrofit_start: Option<SimTime>,
    /// Time the wagon's retrofit completed, once known.
    pub retrofit_end: Option<SimTime>,
}

impl Wagon {
    /// Constructs a newly-arrived, not-yet-classified wagon.
    #[must_use]
    pub fn new(
        id: WagonId,
        length: f64,
        coupler_a: Coupler,
        coupler_b: Coupler,
        is_loaded: bool,
        needs_retrofit: bool,
        arrival: SimTime,
    ) -> Self {
        Self {
            id,
            length,
            status: WagonStatus::Unknown,
            current_track: None,
            coupler_a,
            coupler_b,
            is_loaded,
            needs_retrofit,
            arrival,
            retrofit_start: None,
            retrofit_end: None,
        }
    }

    /// Flow time: time from arrival to retrofit completion. `None` until the
    /// wagon has finished retrofitting.
    #[must_use]
    pub fn flow_time(&self) -> Option<f64> {
        self.retrofit_end
            .map(|end| end.as_minutes() - self.arrival.as_minutes())
    }

    /// Waiting time: time from arrival to the start of retrofitting. `None`
    /// until the wagon has entered a bay.
    #[must_use]
    pub fn waiting_time(&self) -> Option<f64> {
        self.retrofit_start
            .map(|start| start.as_minutes() - self.arrival.as_minutes())
    }
}
