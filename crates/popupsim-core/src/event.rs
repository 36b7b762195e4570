// SPDX-License-Identifier: Apache-2.0
//! The append-only event log.
//!
//! Coordinators never compute metrics themselves; everything the metrics
//! aggregator reports is derived from a single replay over this log (§4.13).

use serde::{Deserialize, Serialize};

use crate::ids::{LocoId, TrackId, WagonId, WorkshopId};
use crate::time::SimTime;

/// The four event kinds named in the data model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A wagon's journey through the workflow.
    Wagon,
    /// A locomotive allocation, release, or movement.
    Locomotive,
    /// A resource (track capacity, workshop bay) state change.
    Resource,
    /// A batch/rake formation attempt, successful or rejected.
    Batch,
}

/// A single append-only log record.
///
/// `extra` carries kind-specific detail that does not warrant its own
/// column (e.g. a rejection reason, a batch's wagon count) as free-form
/// key/value pairs so the report adapter can flatten them without the core
/// crate knowing about CSV or JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Simulated time the event was emitted.
    pub timestamp: SimTime,
    /// Which of the four kinds this is.
    pub kind: EventKind,
    /// The primary entity this event is about (a wagon, locomotive, etc).
    pub subject_id: String,
    /// A short, kind-specific type tag, e.g. `"arrived"`, `"retrofit_start"`.
    pub event_type: String,
    /// Origin track/entity, when the event describes a transition.
    pub from: Option<String>,
    /// Destination track/entity, when the event describes a transition.
    pub to: Option<String>,
    /// Additional detail as ordered key/value pairs.
    pub extra: Vec<(String, String)>,
}

impl Event {
    /// Constructs an event with no `from`/`to`/`extra` detail.
    #[must_use]
    pub fn new(timestamp: SimTime, kind: EventKind, subject_id: impl Into<String>, event_type: impl Into<String>) -> Self {
        Self {
            timestamp,
            kind,
            subject_id: subject_id.into(),
            event_type: event_type.into(),
            from: None,
            to: None,
            extra: Vec::new(),
        }
    }

    /// Builder-style: sets `from`.
    #[must_use]
    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    /// Builder-style: sets `to`.
    #[must_use]
    pub fn with_to(mut self, to: impl Into<String>) -> Self {
        self.to = Some(to.into());
        self
    }

    /// Builder-style: appends one `(key, value)` pair to `extra`.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.push((key.into(), value.into()));
        self
    }
}

/// Helpers for building events for a specific subject kind without having
/// to spell out `EventKind` and `to_string()` everywhere.
impl Event {
    /// A wagon-journey event.
    #[must_use]
    pub fn wagon(timestamp: SimTime, id: &WagonId, event_type: impl Into<String>) -> Self {
        Self::new(timestamp, EventKind::Wagon, id.to_string(), event_type)
    }

    /// A locomotive-movement event.
    #[must_use]
    pub fn locomotive(timestamp: SimTime, id: &LocoId, event_type: impl Into<String>) -> Self {
        Self::new(timestamp, EventKind::Locomotive, id.to_string(), event_type)
    }

    /// A track-capacity or bay resource-state-change event.
    #[must_use]
    pub fn resource_track(timestamp: SimTime, id: &TrackId, event_type: impl Into<String>) -> Self {
        Self::new(timestamp, EventKind::Resource, id.to_string(), event_type)
    }

    /// A workshop-bay resource-state-change event.
    #[must_use]
    pub fn resource_workshop(timestamp: SimTime, id: &WorkshopId, event_type: impl Into<String>) -> Self {
        Self::new(timestamp, EventKind::Resource, id.to_string(), event_type)
    }

    /// A batch/rake formation event.
    #[must_use]
    pub fn batch(timestamp: SimTime, subject_id: impl Into<String>, event_type: impl Into<String>) -> Self {
        Self::new(timestamp, EventKind::Batch, subject_id, event_type)
    }
}

/// Append-only store of emitted events, in emission order.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    /// Constructs an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event. Never fails, never mutates prior entries.
    pub fn push(&mut self, event: Event) {
        self.events.push(event);
    }

    /// Borrows the log in emission order.
    #[must_use]
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Number of events recorded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether no events have been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
