// SPDX-License-Identifier: Apache-2.0
use crate::ids::{LocoId, WagonId};

/// An ordered run of coupled wagons behind a locomotive, valid only for the
/// duration of one movement between two tracks.
///
/// Rake validity (adjacent-coupler compatibility, including loco-to-first
/// wagon) is checked by [`crate::coupling::validate`] at formation time, not
/// re-checked here; a `Rake` value is only ever constructed once that check
/// has passed.
#[derive(Debug, Clone)]
pub struct Rake {
    /// Locomotive hauling this rake.
    pub locomotive: LocoId,
    /// Wagons in coupling order.
    pub wagons: Vec<WagonId>,
}

impl Rake {
    /// Constructs a rake. Callers must have already validated coupler
    /// compatibility.
    #[must_use]
    pub fn new(locomotive: LocoId, wagons: Vec<WagonId>) -> Self {
        Self { locomotive, wagons }
    }
}
