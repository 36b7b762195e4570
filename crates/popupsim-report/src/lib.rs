// SPDX-License-Identifier: Apache-2.0
//! CSV/JSON export for PopUpSim's event log and KPI report.
//!
//! `popupsim-core` never serializes its own output to a file; this crate is
//! the adapter that renders an [`popupsim_core::event::EventLog`] and a
//! [`popupsim_core::metrics::Report`] to either format, mirroring
//! `popupsim-config`'s role on the input side.
#![warn(missing_docs)]

pub mod error;
pub mod events;
pub mod kpi;

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use popupsim_core::event::EventLog;
use popupsim_core::metrics::Report;

use crate::error::ReportResult;

/// Writes `events.csv`, `events.json`, `kpi.csv`, and `kpi.json` under
/// `output_dir`. The CLI adapter calls this once per run.
pub fn write_all(output_dir: &Path, log: &EventLog, report: &Report) -> ReportResult<()> {
    events::write_csv(log, BufWriter::new(File::create(output_dir.join("events.csv"))?))?;
    events::write_json(log, BufWriter::new(File::create(output_dir.join("events.json"))?))?;
    kpi::write_csv(report, BufWriter::new(File::create(output_dir.join("kpi.csv"))?))?;
    kpi::write_json(report, BufWriter::new(File::create(output_dir.join("kpi.json"))?))?;
    Ok(())
}
