// SPDX-License-Identifier: Apache-2.0
//! KPI and bottleneck derivation by a single replay over the event log
//! (§4.13). Coordinators never record metrics directly; everything here is
//! reconstructed from [`crate::event::EventLog`].

use std::collections::HashMap;

use serde::Serialize;

use crate::error::{SimError, SimResult};
use crate::event::{EventKind, EventLog};
use crate::ids::{LocoId, TrackId, WorkshopId};
use crate::model::{LocoStatus, Locomotive, Track, TrackKind, Wagon, Workshop};

/// Arrival/retrofit/rejection/parking counts and their rates.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Throughput {
    /// Wagons that entered collection (passed classification).
    pub arrived: u64,
    /// Wagons that completed retrofit.
    pub retrofitted: u64,
    /// Wagons rejected at arrival.
    pub rejected: u64,
    /// Wagons that reached a parking track.
    pub parked: u64,
    /// Parked wagons per simulated hour.
    pub per_hour: f64,
    /// Parked wagons per simulated day.
    pub per_day: f64,
}

/// Area-under-the-curve utilization for one workshop's bays.
#[derive(Debug, Clone, Serialize)]
pub struct WorkshopUtilization {
    /// Workshop this figure is for.
    pub workshop: WorkshopId,
    /// Fraction of bay-minutes busy over the run, in `[0, 1]`.
    pub utilization: f64,
}

/// Bay-level utilization for one workshop. Bays within a workshop are
/// interchangeable and the event log only records how many are busy, not
/// which ones, so this is the workshop's aggregate fraction reported as its
/// own KPI rather than `bays_total` individually-tracked figures.
#[derive(Debug, Clone, Serialize)]
pub struct BayUtilization {
    /// Workshop this figure is for.
    pub workshop: WorkshopId,
    /// Number of bays the workshop has.
    pub bays_total: u32,
    /// Fraction of bay-minutes busy over the run, in `[0, 1]`.
    pub utilization: f64,
}

/// Per-locomotive non-parking-time utilization with a state breakdown.
#[derive(Debug, Clone, Serialize)]
pub struct LocomotiveUtilization {
    /// Locomotive this figure is for.
    pub locomotive: LocoId,
    /// Non-parking time / total time, in `[0, 1]`.
    pub utilization: f64,
    /// Minutes spent moving.
    pub moving_minutes: f64,
    /// Minutes spent coupling.
    pub coupling_minutes: f64,
    /// Minutes spent decoupling.
    pub decoupling_minutes: f64,
    /// Minutes spent parked/idle.
    pub parking_minutes: f64,
}

/// Average and tail flow/waiting times over wagons that finished retrofit.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FlowWaitingSummary {
    /// Mean flow time (arrival to retrofit end), minutes.
    pub mean_flow_minutes: f64,
    /// 90th percentile flow time, minutes.
    pub p90_flow_minutes: f64,
    /// Mean waiting time (arrival to retrofit start), minutes.
    pub mean_waiting_minutes: f64,
    /// 90th percentile waiting time, minutes.
    pub p90_waiting_minutes: f64,
    /// Number of wagons the averages are computed over. Wagons still
    /// retrofitting when the horizon was hit are excluded (their flow time
    /// is undefined).
    pub sample_count: usize,
}

/// How severe a detected bottleneck is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Mild.
    Low,
    /// Worth watching.
    Medium,
    /// Materially constraining throughput.
    High,
}

/// A detected resource or track constraint.
#[derive(Debug, Clone, Serialize)]
pub struct Bottleneck {
    /// How severe the bottleneck is.
    pub severity: Severity,
    /// Where it is (a track id, workshop id, or locomotive id).
    pub location: String,
    /// What kind of resource: `"track"`, `"workshop"`, `"locomotive"`.
    pub kind: &'static str,
    /// Human-readable description.
    pub description: String,
    /// Estimated wagons/hour of throughput lost to this constraint.
    pub impact_wagons_per_hour: f64,
}

/// The full set of KPIs derived from one run.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    /// Throughput counts and rates.
    pub throughput: Throughput,
    /// Per-workshop bay utilization.
    pub workshop_utilization: Vec<WorkshopUtilization>,
    /// Per-bay utilization, one entry per workshop.
    pub bay_utilization: Vec<BayUtilization>,
    /// Per-locomotive utilization.
    pub locomotive_utilization: Vec<LocomotiveUtilization>,
    /// Flow/waiting time summary.
    pub flow_waiting: FlowWaitingSummary,
    /// Detected bottlenecks, most severe first.
    pub bottlenecks: Vec<Bottleneck>,
}

/// Computes the full KPI report from the finished simulation's state.
pub fn aggregate(
    log: &EventLog,
    wagons: &HashMap<crate::ids::WagonId, Wagon>,
    locomotives: &HashMap<LocoId, Locomotive>,
    workshops: &HashMap<WorkshopId, Workshop>,
    tracks: &HashMap<TrackId, Track>,
    horizon_minutes: f64,
) -> SimResult<Report> {
    let throughput = throughput(log, wagons, horizon_minutes)?;
    let workshop_utilization = workshop_utilization(log, workshops, horizon_minutes);
    let bay_utilization = bay_utilization(log, workshops, horizon_minutes);
    let locomotive_utilization = locomotive_utilization(locomotives, horizon_minutes);
    let flow_waiting = flow_waiting_summary(wagons);
    let bottlenecks = detect_bottlenecks(&workshop_utilization, &locomotive_utilization, workshops, tracks, log, horizon_minutes);

    Ok(Report {
        throughput,
        workshop_utilization,
        bay_utilization,
        locomotive_utilization,
        flow_waiting,
        bottlenecks,
    })
}

fn throughput(log: &EventLog, wagons: &HashMap<crate::ids::WagonId, Wagon>, horizon_minutes: f64) -> SimResult<Throughput> {
    let mut arrived = 0u64;
    let mut rejected = 0u64;
    for event in log.events() {
        if event.kind != EventKind::Wagon {
            continue;
        }
        match event.event_type.as_str() {
            "arrived" => arrived += 1,
            "rejected" => rejected += 1,
            _ => {}
        }
    }
    let retrofitted = wagons.values().filter(|w| w.retrofit_end.is_some()).count() as u64;
    let parked = wagons
        .values()
        .filter(|w| w.status == crate::model::WagonStatus::Parked)
        .count() as u64;

    if horizon_minutes <= 0.0 {
        return Err(SimError::KpiCalculation("non-positive simulation horizon".into()));
    }
    let hours = horizon_minutes / 60.0;
    let days = horizon_minutes / (60.0 * 24.0);
    Ok(Throughput {
        arrived,
        retrofitted,
        rejected,
        parked,
        per_hour: parked as f64 / hours,
        per_day: parked as f64 / days,
    })
}

/// Collects `(timestamp, busy, total)` samples per workshop from
/// `bay_occupied`/`bay_released` events, in log order.
fn collect_bay_points(log: &EventLog) -> HashMap<&str, Vec<(f64, u32, u32)>> {
    let mut by_workshop: HashMap<&str, Vec<(f64, u32, u32)>> = HashMap::new();
    for event in log.events() {
        if event.kind != EventKind::Resource {
            continue;
        }
        if event.event_type != "bay_occupied" && event.event_type != "bay_released" {
            continue;
        }
        let Some(busy) = extra(event, "busy").and_then(|v| v.parse::<u32>().ok()) else {
            continue;
        };
        let Some(total) = extra(event, "total").and_then(|v| v.parse::<u32>().ok()) else {
            continue;
        };
        by_workshop
            .entry(event.subject_id.as_str())
            .or_default()
            .push((event.timestamp.as_minutes(), busy, total));
    }
    by_workshop
}

/// Area-under-the-curve fraction of busy-minutes over `horizon_minutes`,
/// holding each sample's level constant until the next one.
fn area_fraction(points: Option<&Vec<(f64, u32, u32)>>, horizon_minutes: f64) -> f64 {
    match points {
        Some(points) if !points.is_empty() && horizon_minutes > 0.0 => {
            let mut area = 0.0;
            for window in points.windows(2) {
                let (t0, busy0, total0) = window[0];
                let (t1, ..) = window[1];
                if total0 > 0 {
                    area += (t1 - t0) * (f64::from(busy0) / f64::from(total0));
                }
            }
            if let Some(&(t_last, busy_last, total_last)) = points.last() {
                if total_last > 0 {
                    area += (horizon_minutes - t_last) * (f64::from(busy_last) / f64::from(total_last));
                }
            }
            (area / horizon_minutes).clamp(0.0, 1.0)
        }
        _ => 0.0,
    }
}

fn workshop_utilization(log: &EventLog, workshops: &HashMap<WorkshopId, Workshop>, horizon_minutes: f64) -> Vec<WorkshopUtilization> {
    let by_workshop = collect_bay_points(log);
    let mut out: Vec<WorkshopUtilization> = workshops
        .values()
        .map(|workshop| WorkshopUtilization {
            workshop: workshop.id.clone(),
            utilization: area_fraction(by_workshop.get(workshop.id.as_str()), horizon_minutes),
        })
        .collect();
    out.sort_by(|a, b| a.workshop.as_str().cmp(b.workshop.as_str()));
    out
}

/// Per-bay utilization (spec's "bay utilization per bay" KPI, reported
/// separately from the workshop-level figure above).
fn bay_utilization(log: &EventLog, workshops: &HashMap<WorkshopId, Workshop>, horizon_minutes: f64) -> Vec<BayUtilization> {
    let by_workshop = collect_bay_points(log);
    let mut out: Vec<BayUtilization> = workshops
        .values()
        .map(|workshop| BayUtilization {
            workshop: workshop.id.clone(),
            bays_total: workshop.bays_total,
            utilization: area_fraction(by_workshop.get(workshop.id.as_str()), horizon_minutes),
        })
        .collect();
    out.sort_by(|a, b| a.workshop.as_str().cmp(b.workshop.as_str()));
    out
}

fn extra<'a>(event: &'a crate::event::Event, key: &str) -> Option<&'a str> {
    event.extra.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

fn locomotive_utilization(locomotives: &HashMap<LocoId, Locomotive>, horizon_minutes: f64) -> Vec<LocomotiveUtilization> {
    let mut out = Vec::new();
    for (id, loco) in locomotives {
        let mut moving = 0.0;
        let mut coupling = 0.0;
        let mut decoupling = 0.0;
        let mut parking = 0.0;
        for window in loco.status_history.windows(2) {
            let (t0, status0) = window[0];
            let (t1, _) = window[1];
            let span = t1.as_minutes() - t0.as_minutes();
            add_span(status0, span, &mut moving, &mut coupling, &mut decoupling, &mut parking);
        }
        if let Some(&(t_last, status_last)) = loco.status_history.last() {
            let span = (horizon_minutes - t_last.as_minutes()).max(0.0);
            add_span(status_last, span, &mut moving, &mut coupling, &mut decoupling, &mut parking);
        }
        let total = moving + coupling + decoupling + parking;
        let utilization = if total > 0.0 { (moving + coupling + decoupling) / total } else { 0.0 };
        out.push(LocomotiveUtilization {
            locomotive: id.clone(),
            utilization,
            moving_minutes: moving,
            coupling_minutes: coupling,
            decoupling_minutes: decoupling,
            parking_minutes: parking,
        });
    }
    out.sort_by(|a, b| a.locomotive.as_str().cmp(b.locomotive.as_str()));
    out
}

fn add_span(status: LocoStatus, span: f64, moving: &mut f64, coupling: &mut f64, decoupling: &mut f64, parking: &mut f64) {
    match status {
        LocoStatus::Moving => *moving += span,
        LocoStatus::Coupling => *coupling += span,
        LocoStatus::Decoupling => *decoupling += span,
        LocoStatus::Parking => *parking += span,
    }
}

fn flow_waiting_summary(wagons: &HashMap<crate::ids::WagonId, Wagon>) -> FlowWaitingSummary {
    let mut flow: Vec<f64> = wagons.values().filter_map(Wagon::flow_time).collect();
    let mut wait: Vec<f64> = wagons.values().filter_map(Wagon::waiting_time).collect();
    flow.sort_by(f64::total_cmp);
    wait.sort_by(f64::total_cmp);
    FlowWaitingSummary {
        mean_flow_minutes: mean(&flow),
        p90_flow_minutes: percentile(&flow, 0.90),
        mean_waiting_minutes: mean(&wait),
        p90_waiting_minutes: percentile(&wait, 0.90),
        sample_count: flow.len(),
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn percentile(sorted: &[f64], fraction: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((sorted.len() as f64 - 1.0) * fraction).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

/// Collects `(timestamp, used)` samples per track from
/// `capacity_reserved`/`capacity_released` events, in log order.
fn collect_track_fill_points(log: &EventLog) -> HashMap<&str, Vec<(f64, f64)>> {
    let mut by_track: HashMap<&str, Vec<(f64, f64)>> = HashMap::new();
    for event in log.events() {
        if event.kind != EventKind::Resource {
            continue;
        }
        if event.event_type != "capacity_reserved" && event.event_type != "capacity_released" {
            continue;
        }
        let Some(used) = extra(event, "used").and_then(|v| v.parse::<f64>().ok()) else {
            continue;
        };
        by_track.entry(event.subject_id.as_str()).or_default().push((event.timestamp.as_minutes(), used));
    }
    by_track
}

/// Collects `(timestamp, queue_len)` samples per track the same way.
fn collect_track_queue_points(log: &EventLog) -> HashMap<&str, Vec<(f64, usize)>> {
    let mut by_track: HashMap<&str, Vec<(f64, usize)>> = HashMap::new();
    for event in log.events() {
        if event.kind != EventKind::Resource {
            continue;
        }
        if event.event_type != "capacity_reserved" && event.event_type != "capacity_released" {
            continue;
        }
        let Some(queue_len) = extra(event, "queue_len").and_then(|v| v.parse::<usize>().ok()) else {
            continue;
        };
        by_track.entry(event.subject_id.as_str()).or_default().push((event.timestamp.as_minutes(), queue_len));
    }
    by_track
}

/// Fraction of `horizon_minutes` during which `used / capacity` exceeded
/// `threshold`, holding each sample's level constant until the next one.
fn fraction_time_above(points: &[(f64, f64)], capacity: f64, threshold: f64, horizon_minutes: f64) -> f64 {
    if points.is_empty() || horizon_minutes <= 0.0 || capacity <= 0.0 {
        return 0.0;
    }
    let mut above = 0.0;
    for window in points.windows(2) {
        let (t0, used0) = window[0];
        let (t1, _) = window[1];
        if used0 / capacity > threshold {
            above += t1 - t0;
        }
    }
    if let Some(&(t_last, used_last)) = points.last() {
        if used_last / capacity > threshold {
            above += horizon_minutes - t_last;
        }
    }
    (above / horizon_minutes).clamp(0.0, 1.0)
}

/// Time-weighted average of a step function sampled at `points`, held
/// constant until the next sample and through to `horizon_minutes`.
fn time_weighted_average(points: &[(f64, usize)], horizon_minutes: f64) -> f64 {
    if points.is_empty() || horizon_minutes <= 0.0 {
        return 0.0;
    }
    let mut area = 0.0;
    for window in points.windows(2) {
        let (t0, v0) = window[0];
        let (t1, _) = window[1];
        area += (t1 - t0) * v0 as f64;
    }
    if let Some(&(t_last, v_last)) = points.last() {
        area += (horizon_minutes - t_last) * v_last as f64;
    }
    area / horizon_minutes
}

/// Utilization exceeding 0.9 (workshops, locomotives), track fill exceeding
/// 0.85 for more than 10% of the run, or a retrofit track's queue whose
/// time-integrated average exceeds the shared workshop pool's bay count
/// (spec.md:194).
fn detect_bottlenecks(
    workshops: &[WorkshopUtilization],
    locomotives: &[LocomotiveUtilization],
    workshop_meta: &HashMap<WorkshopId, Workshop>,
    tracks: &HashMap<TrackId, Track>,
    log: &EventLog,
    horizon_minutes: f64,
) -> Vec<Bottleneck> {
    const UTILIZATION_THRESHOLD: f64 = 0.9;
    const TRACK_FILL_THRESHOLD: f64 = 0.85;
    const TRACK_FILL_TIME_FRACTION: f64 = 0.10;

    let mut out = Vec::new();

    for w in workshops {
        if w.utilization > UTILIZATION_THRESHOLD {
            let bays = workshop_meta.get(&w.workshop).map_or(1, |meta| meta.bays_total);
            out.push(Bottleneck {
                severity: if w.utilization > 0.97 { Severity::High } else { Severity::Medium },
                location: w.workshop.to_string(),
                kind: "workshop",
                description: format!("workshop {} bays running at {:.0}% utilization", w.workshop, w.utilization * 100.0),
                impact_wagons_per_hour: f64::from(bays) * (w.utilization - UTILIZATION_THRESHOLD),
            });
        }
    }

    for l in locomotives {
        if l.utilization > UTILIZATION_THRESHOLD {
            out.push(Bottleneck {
                severity: if l.utilization > 0.97 { Severity::High } else { Severity::Medium },
                location: l.locomotive.to_string(),
                kind: "locomotive",
                description: format!("locomotive {} running at {:.0}% utilization", l.locomotive, l.utilization * 100.0),
                impact_wagons_per_hour: l.utilization - UTILIZATION_THRESHOLD,
            });
        }
    }

    let fill_points = collect_track_fill_points(log);
    let no_fill_points = Vec::new();
    let mut track_ids: Vec<&TrackId> = tracks.keys().collect();
    track_ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
    for track_id in track_ids {
        let track = &tracks[track_id];
        let capacity = track.effective_capacity();
        let points = fill_points.get(track_id.as_str()).unwrap_or(&no_fill_points);
        let fraction = fraction_time_above(points, capacity, TRACK_FILL_THRESHOLD, horizon_minutes);
        if fraction > TRACK_FILL_TIME_FRACTION {
            out.push(Bottleneck {
                severity: if fraction > 0.5 { Severity::High } else { Severity::Medium },
                location: track_id.to_string(),
                kind: "track",
                description: format!(
                    "track {track_id} stayed above {:.0}% fill for {:.0}% of the run",
                    TRACK_FILL_THRESHOLD * 100.0,
                    fraction * 100.0
                ),
                impact_wagons_per_hour: fraction - TRACK_FILL_TIME_FRACTION,
            });
        }
    }

    let total_bays: u32 = workshop_meta.values().map(|w| w.bays_total).sum();
    let queue_points = collect_track_queue_points(log);
    let no_queue_points = Vec::new();
    let mut retrofit_ids: Vec<&TrackId> = tracks.values().filter(|t| t.kind == TrackKind::Retrofit).map(|t| &t.id).collect();
    retrofit_ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
    for track_id in retrofit_ids {
        let points = queue_points.get(track_id.as_str()).unwrap_or(&no_queue_points);
        let avg_queue = time_weighted_average(points, horizon_minutes);
        if avg_queue > f64::from(total_bays) {
            out.push(Bottleneck {
                severity: if avg_queue > 2.0 * f64::from(total_bays).max(1.0) { Severity::High } else { Severity::Medium },
                location: track_id.to_string(),
                kind: "workshop",
                description: format!("retrofit track {track_id} queue averaged {avg_queue:.1} wagons against {total_bays} bays"),
                impact_wagons_per_hour: avg_queue - f64::from(total_bays),
            });
        }
    }

    out.sort_by(|a, b| b.impact_wagons_per_hour.total_cmp(&a.impact_wagons_per_hour));
    out
}
