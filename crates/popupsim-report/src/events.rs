// SPDX-License-Identifier: Apache-2.0
//! Event log export (§4.15/§6): CSV with a stable column set, or JSON as the
//! log's native `serde` shape.

use std::io::Write;

use serde::Serialize;

use popupsim_core::event::{Event, EventLog};

use crate::error::ReportResult;

/// One flattened CSV row: `{timestamp_minutes, event_kind, entity_id,
/// event_type, from, to, extra}`. `extra`'s key/value pairs are joined as
/// `key=value` pairs separated by `;` so every kind shares one column set.
#[derive(Debug, Serialize)]
struct EventRow<'a> {
    timestamp_minutes: f64,
    event_kind: &'static str,
    entity_id: &'a str,
    event_type: &'a str,
    from: &'a str,
    to: &'a str,
    extra: String,
}

fn event_kind_label(event: &Event) -> &'static str {
    match event.kind {
        popupsim_core::event::EventKind::Wagon => "wagon",
        popupsim_core::event::EventKind::Locomotive => "locomotive",
        popupsim_core::event::EventKind::Resource => "resource",
        popupsim_core::event::EventKind::Batch => "batch",
    }
}

fn flatten_extra(event: &Event) -> String {
    event.extra.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join(";")
}

fn row(event: &Event) -> EventRow<'_> {
    EventRow {
        timestamp_minutes: event.timestamp.as_minutes(),
        event_kind: event_kind_label(event),
        entity_id: event.subject_id.as_str(),
        event_type: event.event_type.as_str(),
        from: event.from.as_deref().unwrap_or(""),
        to: event.to.as_deref().unwrap_or(""),
        extra: flatten_extra(event),
    }
}

/// Writes the event log as CSV to `writer`, one row per event in emission
/// order.
pub fn write_csv<W: Write>(log: &EventLog, writer: W) -> ReportResult<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for event in log.events() {
        wtr.serialize(row(event))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes the event log as a JSON array, in emission order.
pub fn write_json<W: Write>(log: &EventLog, writer: W) -> ReportResult<()> {
    serde_json::to_writer_pretty(writer, log.events())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use popupsim_core::event::EventKind;
    use popupsim_core::time::SimTime;

    fn sample_log() -> EventLog {
        let mut log = EventLog::new();
        log.push(Event::new(SimTime::ZERO, EventKind::Wagon, "w1", "arrived").with_to("C1").with_extra("note", "on time"));
        log
    }

    #[test]
    fn csv_round_trips_through_a_buffer() {
        let mut buf = Vec::new();
        let result = write_csv(&sample_log(), &mut buf);
        assert!(result.is_ok());
        let text = String::from_utf8_lossy(&buf);
        assert!(text.contains("w1"));
        assert!(text.contains("note=on time"));
    }

    #[test]
    fn json_round_trips_through_a_buffer() {
        let mut buf = Vec::new();
        let result = write_json(&sample_log(), &mut buf);
        assert!(result.is_ok());
        let text = String::from_utf8_lossy(&buf);
        assert!(text.contains("\"arrived\""));
    }
}
