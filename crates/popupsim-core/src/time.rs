// SPDX-License-Identifier: Apache-2.0
//! Virtual simulation time.

use std::cmp::Ordering;
use std::fmt;
use std::ops::Add;

use serde::{Deserialize, Serialize};

/// A point in virtual simulation time, measured in minutes.
///
/// Backed by `f64`. The simulator never produces `NaN`, so `Ord` is derived
/// from `f64::total_cmp` rather than the partial order `f64` normally gives.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SimTime(f64);

impl SimTime {
    /// The start of simulated time.
    pub const ZERO: Self = Self(0.0);

    /// Constructs a time from a minute offset.
    #[must_use]
    pub const fn from_minutes(minutes: f64) -> Self {
        Self(minutes)
    }

    /// Returns the underlying minute value.
    #[must_use]
    pub const fn as_minutes(self) -> f64 {
        self.0
    }

    /// Returns this time advanced by `delta_minutes` (must be non-negative).
    #[must_use]
    pub fn after(self, delta_minutes: f64) -> Self {
        debug_assert!(delta_minutes >= 0.0, "delay must be non-negative");
        Self(self.0 + delta_minutes)
    }
}

impl Eq for SimTime {}

impl Ord for SimTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Add<f64> for SimTime {
    type Output = Self;

    fn add(self, rhs: f64) -> Self {
        self.after(rhs)
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}", self.0)
    }
}
