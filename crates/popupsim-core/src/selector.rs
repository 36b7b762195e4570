// SPDX-License-Identifier: Apache-2.0
//! Track selection strategies (§4.5).
//!
//! A separate [`TrackSelector`] instance is kept per selection dimension
//! (collection, retrofit, parking) since round-robin and random state must
//! not be shared across dimensions.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::ids::TrackId;
use crate::model::Track;
use crate::scenario::SelectionStrategy;

/// Chooses among eligible tracks by a configured strategy, keeping whatever
/// per-dimension state (round-robin index, RNG) the strategy needs.
#[derive(Debug)]
pub struct TrackSelector {
    strategy: SelectionStrategy,
    round_robin_index: usize,
    rng: ChaCha8Rng,
}

impl TrackSelector {
    /// Constructs a selector for one dimension, seeded from the scenario.
    #[must_use]
    pub fn new(strategy: SelectionStrategy, seed: u64) -> Self {
        Self {
            strategy,
            round_robin_index: 0,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Picks a track from `candidates` able to fit `length` metres (and, for
    /// workshop tracks, within `max_wagons`). Returns `None` if nothing
    /// fits. Declaration order in `candidates` is the tie-break order.
    pub fn select<'a>(&mut self, candidates: &[&'a Track], length: f64) -> Option<&'a Track> {
        let fitting: Vec<&'a Track> = candidates.iter().copied().filter(|t| t.can_fit(length)).collect();
        if fitting.is_empty() {
            return None;
        }
        let chosen = match self.strategy {
            SelectionStrategy::FirstAvailable => fitting[0],
            SelectionStrategy::LeastOccupied => {
                let mut best = fitting[0];
                for candidate in &fitting[1..] {
                    if candidate.occupied_fraction() < best.occupied_fraction() {
                        best = candidate;
                    }
                }
                best
            }
            SelectionStrategy::BestFit => {
                let mut best = fitting[0];
                for candidate in &fitting[1..] {
                    if candidate.free() < best.free() {
                        best = candidate;
                    }
                }
                best
            }
            SelectionStrategy::RoundRobin => {
                // Round-robins over the *declared candidate set*, skipping
                // ones that don't currently fit, remembering the index
                // across calls so repeated invocations keep cycling.
                let start = self.round_robin_index % candidates.len();
                let mut pick = fitting[0];
                for offset in 0..candidates.len() {
                    let idx = (start + offset) % candidates.len();
                    if candidates[idx].can_fit(length) {
                        pick = candidates[idx];
                        self.round_robin_index = (idx + 1) % candidates.len();
                        break;
                    }
                }
                pick
            }
            SelectionStrategy::Random => {
                use rand::Rng;
                let idx = self.rng.gen_range(0..fitting.len());
                fitting[idx]
            }
        };
        Some(chosen)
    }

    /// The candidate track ids in whatever order the strategy would have
    /// considered them, for tests that assert on distribution.
    #[must_use]
    pub fn strategy(&self) -> SelectionStrategy {
        self.strategy
    }
}

/// Per-dimension selector state: one selector each for collection, retrofit,
/// and parking track choice, as required by §4.5.
#[derive(Debug)]
pub struct Selectors {
    /// Selector for collection-track choice on arrival.
    pub collection: TrackSelector,
    /// Selector for retrofit-track choice by the collection coordinator.
    pub retrofit: TrackSelector,
    /// Selector for parking-track choice by the parking coordinator.
    pub parking: TrackSelector,
}

impl Selectors {
    /// Builds the three selectors from the scenario's configured strategies
    /// and seed.
    #[must_use]
    pub fn from_scenario(scenario: &crate::scenario::Scenario) -> Self {
        Self {
            collection: TrackSelector::new(scenario.track_selection_strategy, scenario.random_seed),
            retrofit: TrackSelector::new(scenario.retrofit_selection_strategy, scenario.random_seed ^ 0x5151),
            parking: TrackSelector::new(scenario.parking_selection_strategy, scenario.random_seed ^ 0xC3C3),
        }
    }
}

/// Picks the eligible [`TrackId`]s of a given kind, in declaration order.
///
/// `order` is the scenario's declaration order (`Simulation::track_order`);
/// `tracks` is the id-keyed lookup table.
#[must_use]
pub fn track_ids_of_kind<'a>(
    order: &'a [TrackId],
    tracks: &std::collections::HashMap<TrackId, Track>,
    kind: crate::model::TrackKind,
) -> Vec<&'a TrackId> {
    order
        .iter()
        .filter(|id| tracks.get(*id).is_some_and(|t| t.kind == kind))
        .collect()
}
