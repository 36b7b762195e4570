// SPDX-License-Identifier: Apache-2.0
use std::collections::VecDeque;

use crate::executor::ProcessId;
use crate::ids::{TrackId, WagonId, WorkshopId};

/// A pop-up retrofit facility: a fixed number of parallel bays on a track,
/// plus a FIFO of wagons that arrived but found every bay occupied.
#[derive(Debug, Clone)]
pub struct Workshop {
    /// Unique identifier.
    pub id: WorkshopId,
    /// Track the workshop is located on.
    pub track_id: TrackId,
    /// Total number of parallel retrofit bays.
    pub bays_total: u32,
    /// Bays currently occupied.
    pub(crate) bays_busy: u32,
    /// Wagons that arrived at the workshop premises but could not
    /// immediately claim a bay.
    pub(crate) queue: VecDeque<WagonId>,
    /// Processes blocked waiting for enough free bays.
    pub(crate) bay_waiters: VecDeque<ProcessId>,
}

impl Workshop {
    /// Constructs an idle workshop with no wagons queued.
    #[must_use]
    pub fn new(id: WorkshopId, track_id: TrackId, bays_total: u32) -> Self {
        Self {
            id,
            track_id,
            bays_total,
            bays_busy: 0,
            queue: VecDeque::new(),
            bay_waiters: VecDeque::new(),
        }
    }

    /// Bays currently free.
    #[must_use]
    pub fn free_bays(&self) -> u32 {
        self.bays_total - self.bays_busy
    }
}
