// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;

use crate::error::{SimError, SimResult};
use crate::ids::TrackId;

/// Flattened lookup of directed point-to-point route durations.
///
/// A scenario route is a multi-hop `path`, but the simulator has no track
/// geometry (Non-goals, §1): only the endpoints and the path's total
/// duration matter, so the table is indexed by `(path.first(), path.last())`.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    durations: HashMap<(TrackId, TrackId), f64>,
}

impl RouteTable {
    /// Constructs an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a directed route's duration.
    pub fn insert(&mut self, from: TrackId, to: TrackId, duration_minutes: f64) {
        self.durations.insert((from, to), duration_minutes);
    }

    /// Looks up the duration from `from` to `to`. Errors if undefined.
    pub fn duration(&self, from: &TrackId, to: &TrackId) -> SimResult<f64> {
        self.durations
            .get(&(from.clone(), to.clone()))
            .copied()
            .ok_or_else(|| SimError::NoRoute {
                from: from.clone(),
                to: to.clone(),
            })
    }
}
