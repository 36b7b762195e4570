// SPDX-License-Identifier: Apache-2.0
use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::executor::ProcessId;
use crate::ids::{TrackId, WagonId};

/// The role a track plays in the yard topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackKind {
    /// Where incoming wagons are first placed.
    Collection,
    /// Staging track feeding a workshop.
    Retrofit,
    /// The track a workshop sits on.
    Workshop,
    /// Output track between workshop and parking.
    Retrofitted,
    /// Terminal track for retrofitted wagons.
    Parking,
    /// Through track, not used for staging.
    Mainline,
    /// Idle-locomotive storage.
    Locoparking,
}

/// A waiter blocked on `add`, recorded with the metres it requested so the
/// capacity manager can grant fairly as space frees (§4.2).
#[derive(Debug, Clone, Copy)]
pub(crate) struct CapacityWaiter {
    pub process: ProcessId,
    pub requested: f64,
}

/// A float-metre capacity container with a FIFO occupant queue.
///
/// `used` only ever changes through [`crate::executor::Simulation`]'s
/// `track_*` methods, which are the sole place fairness and the 0.1 m
/// clamp are enforced.
#[derive(Debug, Clone)]
pub struct Track {
    /// Unique identifier.
    pub id: TrackId,
    /// Role in the yard topology.
    pub kind: TrackKind,
    /// Physical length in metres.
    pub length: f64,
    /// Usable fraction of `length`, in `(0, 1]`.
    pub fill_factor: f64,
    /// Optional hard cap on occupant count (workshop tracks only).
    pub max_wagons: Option<u32>,
    /// Metres currently reserved by occupants.
    pub(crate) used: f64,
    /// Wagons occupying the track, in arrival order.
    pub(crate) queue: VecDeque<WagonId>,
    /// Processes blocked waiting for the FIFO queue to become non-empty.
    pub(crate) queue_waiters: VecDeque<ProcessId>,
    /// Processes blocked waiting for free capacity, in arrival order.
    pub(crate) capacity_waiters: VecDeque<CapacityWaiter>,
}

impl Track {
    /// Constructs an empty track.
    #[must_use]
    pub fn new(
        id: TrackId,
        kind: TrackKind,
        length: f64,
        fill_factor: f64,
        max_wagons: Option<u32>,
    ) -> Self {
        Self {
            id,
            kind,
            length,
            fill_factor,
            max_wagons,
            used: 0.0,
            queue: VecDeque::new(),
            queue_waiters: VecDeque::new(),
            capacity_waiters: VecDeque::new(),
        }
    }

    /// Effective maximum capacity: `length * fill_factor`.
    #[must_use]
    pub fn effective_capacity(&self) -> f64 {
        self.length * self.fill_factor
    }

    /// Metres currently free.
    #[must_use]
    pub fn free(&self) -> f64 {
        (self.effective_capacity() - self.used).max(0.0)
    }

    /// Fraction of effective capacity currently occupied, in `[0, 1]`.
    #[must_use]
    pub fn occupied_fraction(&self) -> f64 {
        if self.effective_capacity() <= 0.0 {
            0.0
        } else {
            self.used / self.effective_capacity()
        }
    }

    /// Non-blocking check: would `length` metres fit right now, also
    /// respecting `max_wagons` if set?
    #[must_use]
    pub fn can_fit(&self, length: f64) -> bool {
        if let Some(max) = self.max_wagons {
            if self.queue.len() as u32 >= max {
                return false;
            }
        }
        length <= self.free() + f64::EPSILON
    }

    /// Number of wagons currently queued.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
