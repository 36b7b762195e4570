// SPDX-License-Identifier: Apache-2.0
//! Simulation-time error taxonomy.
//!
//! Configuration errors are raised by `popupsim-config` before a
//! [`crate::simulation::Simulation`] ever exists and are out of scope here;
//! see that crate's `ConfigError` instead.

use thiserror::Error;

use crate::ids::{LocoId, TrackId, WagonId};

/// Errors that can propagate out of a running simulation.
///
/// Per the error-handling design, coupling failures are **not** represented
/// here: they are recovered locally (the batch is discarded, the coordinator
/// retries) and only ever show up as a `batch` event with a rejection
/// outcome in the event log.
#[derive(Debug, Error)]
pub enum SimError {
    /// A capacity removal asked for more metres than the track had reserved,
    /// beyond the 0.1 m floating-point tolerance.
    #[error("capacity overflow on track {track}: attempted to remove {requested:.3}m but only {available:.3}m reserved")]
    CapacityOverflow {
        /// Track the overflow occurred on.
        track: TrackId,
        /// Metres the caller attempted to remove.
        requested: f64,
        /// Metres actually reserved on the track.
        available: f64,
    },

    /// No route exists between the requested pair of tracks.
    #[error("no route from {from} to {to}")]
    NoRoute {
        /// Origin track.
        from: TrackId,
        /// Destination track.
        to: TrackId,
    },

    /// The metrics aggregator found the event log internally inconsistent.
    #[error("kpi calculation error: {0}")]
    KpiCalculation(String),

    /// An internal invariant the scheduler relies on was violated.
    ///
    /// Reaching this variant indicates a bug in the engine, not a bad
    /// scenario; it exists so invariant checks (P1-P8) fail loudly instead
    /// of silently producing a wrong event log.
    #[error("internal invariant violated: {0}")]
    Invariant(String),

    /// A wagon was referenced that the simulation has no record of.
    #[error("unknown wagon {0}")]
    UnknownWagon(WagonId),

    /// A locomotive was referenced that the simulation has no record of.
    #[error("unknown locomotive {0}")]
    UnknownLocomotive(LocoId),

    /// A track was referenced that the simulation has no record of.
    #[error("unknown track {0}")]
    UnknownTrack(TrackId),
}

/// Convenience alias for results within the core engine.
pub type SimResult<T> = Result<T, SimError>;
