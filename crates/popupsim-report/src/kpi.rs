// SPDX-License-Identifier: Apache-2.0
//! KPI report export (§4.15/§6): one CSV row per metric, grouped by
//! category, plus a JSON rendering of the report's native shape.

use std::io::Write;

use serde::Serialize;

use popupsim_core::metrics::Report;

use crate::error::ReportResult;

#[derive(Debug, Serialize)]
struct KpiRow<'a> {
    category: &'a str,
    label: String,
    value: f64,
    severity: &'a str,
    description: &'a str,
}

fn rows(report: &Report) -> Vec<KpiRow<'_>> {
    let mut out = Vec::new();
    let t = &report.throughput;
    out.push(KpiRow { category: "throughput", label: "arrived".into(), value: t.arrived as f64, severity: "", description: "" });
    out.push(KpiRow { category: "throughput", label: "retrofitted".into(), value: t.retrofitted as f64, severity: "", description: "" });
    out.push(KpiRow { category: "throughput", label: "rejected".into(), value: t.rejected as f64, severity: "", description: "" });
    out.push(KpiRow { category: "throughput", label: "parked".into(), value: t.parked as f64, severity: "", description: "" });
    out.push(KpiRow { category: "throughput", label: "per_hour".into(), value: t.per_hour, severity: "", description: "" });
    out.push(KpiRow { category: "throughput", label: "per_day".into(), value: t.per_day, severity: "", description: "" });

    for w in &report.workshop_utilization {
        out.push(KpiRow {
            category: "workshop_utilization",
            label: w.workshop.to_string(),
            value: w.utilization,
            severity: "",
            description: "",
        });
    }
    for b in &report.bay_utilization {
        out.push(KpiRow {
            category: "bay_utilization",
            label: b.workshop.to_string(),
            value: b.utilization,
            severity: "",
            description: "",
        });
    }
    for l in &report.locomotive_utilization {
        out.push(KpiRow {
            category: "locomotive_utilization",
            label: l.locomotive.to_string(),
            value: l.utilization,
            severity: "",
            description: "",
        });
    }

    let f = &report.flow_waiting;
    out.push(KpiRow { category: "flow_waiting", label: "mean_flow_minutes".into(), value: f.mean_flow_minutes, severity: "", description: "" });
    out.push(KpiRow { category: "flow_waiting", label: "p90_flow_minutes".into(), value: f.p90_flow_minutes, severity: "", description: "" });
    out.push(KpiRow { category: "flow_waiting", label: "mean_waiting_minutes".into(), value: f.mean_waiting_minutes, severity: "", description: "" });
    out.push(KpiRow { category: "flow_waiting", label: "p90_waiting_minutes".into(), value: f.p90_waiting_minutes, severity: "", description: "" });
    out.push(KpiRow { category: "flow_waiting", label: "sample_count".into(), value: f.sample_count as f64, severity: "", description: "" });

    for b in &report.bottlenecks {
        out.push(KpiRow {
            category: "bottleneck",
            label: format!("{}:{}", b.kind, b.location),
            value: b.impact_wagons_per_hour,
            severity: match b.severity {
                popupsim_core::metrics::Severity::Low => "low",
                popupsim_core::metrics::Severity::Medium => "medium",
                popupsim_core::metrics::Severity::High => "high",
            },
            description: b.description.as_str(),
        });
    }
    out
}

/// Writes the KPI report as CSV, one row per metric.
pub fn write_csv<W: Write>(report: &Report, writer: W) -> ReportResult<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows(report) {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes the KPI report as JSON, in its native (non-flattened) shape.
pub fn write_json<W: Write>(report: &Report, writer: W) -> ReportResult<()> {
    serde_json::to_writer_pretty(writer, report)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use popupsim_core::metrics::{FlowWaitingSummary, Report, Throughput};

    fn sample_report() -> Report {
        Report {
            throughput: Throughput {
                arrived: 10,
                retrofitted: 8,
                rejected: 1,
                parked: 8,
                per_hour: 0.5,
                per_day: 12.0,
            },
            workshop_utilization: Vec::new(),
            bay_utilization: Vec::new(),
            locomotive_utilization: Vec::new(),
            flow_waiting: FlowWaitingSummary::default(),
            bottlenecks: Vec::new(),
        }
    }

    #[test]
    fn csv_includes_throughput_rows() {
        let mut buf = Vec::new();
        let result = write_csv(&sample_report(), &mut buf);
        assert!(result.is_ok());
        let text = String::from_utf8_lossy(&buf);
        assert!(text.contains("throughput"));
        assert!(text.contains("arrived"));
    }

    #[test]
    fn json_contains_throughput_field() {
        let mut buf = Vec::new();
        let result = write_json(&sample_report(), &mut buf);
        assert!(result.is_ok());
        let text = String::from_utf8_lossy(&buf);
        assert!(text.contains("\"throughput\""));
    }
}
