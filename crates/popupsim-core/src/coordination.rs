// SPDX-License-Identifier: Apache-2.0
//! The workshop/parking priority protocol (§4.8).

use std::collections::HashSet;

use crate::ids::WagonId;

/// Global coordination state arbitrating between the workshop and parking
/// coordinators.
///
/// Collection may always proceed and has no gate here. Parking may always
/// proceed too; it only *sets* state that the workshop gate reads.
#[derive(Debug, Default)]
pub struct CoordinationService {
    parking_in_progress: bool,
    retrofitted_accumulator: Vec<WagonId>,
    accumulator_members: HashSet<WagonId>,
    /// Capacity used to turn the raw accumulator length into a fraction for
    /// the parking coordinator's threshold triggers; the count of wagons
    /// the scenario expects to need retrofitting.
    accumulator_capacity: usize,
}

impl CoordinationService {
    /// Constructs coordination state with the accumulator's notional
    /// capacity (total wagons expected to pass through retrofit).
    #[must_use]
    pub fn new(accumulator_capacity: usize) -> Self {
        Self {
            accumulator_capacity: accumulator_capacity.max(1),
            ..Self::default()
        }
    }

    /// Whether the workshop coordinator may proceed: no parking run is in
    /// progress and the accumulator has been fully drained.
    #[must_use]
    pub fn workshop_may_proceed(&self) -> bool {
        !self.parking_in_progress && self.retrofitted_accumulator.is_empty()
    }

    /// Marks a parking run as starting.
    pub fn begin_parking(&mut self) {
        self.parking_in_progress = true;
    }

    /// Marks a parking run as finished: clears the flag and empties the
    /// accumulator (§4.8).
    pub fn finish_parking(&mut self) {
        self.parking_in_progress = false;
        self.retrofitted_accumulator.clear();
        self.accumulator_members.clear();
    }

    /// Whether a parking run is currently underway.
    #[must_use]
    pub fn parking_in_progress(&self) -> bool {
        self.parking_in_progress
    }

    /// Appends freshly-retrofitted wagon ids to the accumulator.
    pub fn accumulate(&mut self, wagons: impl IntoIterator<Item = WagonId>) {
        for wagon in wagons {
            if self.accumulator_members.insert(wagon.clone()) {
                self.retrofitted_accumulator.push(wagon);
            }
        }
    }

    /// Removes wagon ids from the accumulator once parked.
    pub fn remove_from_accumulator(&mut self, wagons: &[WagonId]) {
        for id in wagons {
            if self.accumulator_members.remove(id) {
                self.retrofitted_accumulator.retain(|w| w != id);
            }
        }
    }

    /// Current accumulator fill fraction, against its notional capacity.
    #[must_use]
    pub fn accumulator_fraction(&self) -> f64 {
        self.retrofitted_accumulator.len() as f64 / self.accumulator_capacity as f64
    }

    /// Snapshot of the accumulator's current contents, oldest first.
    #[must_use]
    pub fn accumulator(&self) -> &[WagonId] {
        &self.retrofitted_accumulator
    }

    /// Whether the accumulator is empty.
    #[must_use]
    pub fn accumulator_is_empty(&self) -> bool {
        self.retrofitted_accumulator.is_empty()
    }
}
