//! Aggregation and ranking
//!
//! Rolls joined per-session telemetry up into cohort safety rates, driver
//! leaderboards, and fleet summaries. All functions here are pure over the
//! rows they are handed; fetching and joining happen in the engine.
//!
//! Two distinct incident notions coexist and must not be conflated:
//! - session scoring (`penalty`) accumulates incident *magnitudes*;
//! - the cohort rates here count incident *presence*: one occurrence per
//!   telemetry row whose count field is above zero.

use std::collections::{HashMap, HashSet};

use crate::classify::{demographic_label, district_label, hour_window, window_rank, DISTRICT_FALLBACK};
use crate::penalty::score_session;
use crate::types::{
    DrivingSession, DrowsinessEvent, FleetSummary, GroupStat, RankedDriver, TelemetrySample,
    VehicleProfile,
};

/// One session joined with its telemetry rows, drowsiness events, and (when
/// the join target exists) the vehicle profile.
#[derive(Debug, Clone, Default)]
pub struct SessionRecord {
    pub session: DrivingSession,
    pub samples: Vec<TelemetrySample>,
    pub events: Vec<DrowsinessEvent>,
    pub profile: Option<VehicleProfile>,
}

#[derive(Debug, Default)]
struct CohortAcc {
    data_points: u64,
    rapid_accel_incidents: u64,
    rapid_decel_incidents: u64,
    drowsy_incidents: u64,
    sessions: HashSet<String>,
}

impl CohortAcc {
    fn add_record(&mut self, record: &SessionRecord) {
        self.data_points += record.samples.len() as u64;
        for sample in &record.samples {
            if sample.rapid_accel.unwrap_or(0) > 0 {
                self.rapid_accel_incidents += 1;
            }
            if sample.rapid_decel.unwrap_or(0) > 0 {
                self.rapid_decel_incidents += 1;
            }
        }
        self.drowsy_incidents += record.events.len() as u64;
        self.sessions.insert(record.session.session_id.clone());
    }

    fn incidents(&self) -> u64 {
        self.rapid_accel_incidents + self.rapid_decel_incidents + self.drowsy_incidents
    }

    fn into_stat(self, group: String, rate: f64) -> GroupStat {
        GroupStat {
            group,
            safety_rate: rate,
            data_points: self.data_points,
            rapid_accel_incidents: self.rapid_accel_incidents,
            rapid_decel_incidents: self.rapid_decel_incidents,
            drowsy_incidents: self.drowsy_incidents,
            session_count: self.sessions.len() as u64,
        }
    }
}

/// Safety rate per administrative district.
///
/// An empty cohort reports 100.0 through the explicit `data_points > 0`
/// branch (empty cohort is maximally safe).
pub fn district_safety(records: &[SessionRecord]) -> Vec<GroupStat> {
    let stats = group_by_session_label(records, |record| {
        record
            .profile
            .as_ref()
            .and_then(|p| p.location.as_deref())
            .map(district_label)
            .unwrap_or_else(|| DISTRICT_FALLBACK.to_string())
    });
    finalize_guarded(stats)
}

/// Safety rate per demographic group (age bracket / sex).
pub fn demographic_safety(records: &[SessionRecord]) -> Vec<GroupStat> {
    let stats = group_by_session_label(records, |record| {
        let profile = record.profile.as_ref();
        demographic_label(
            profile.and_then(|p| p.driver_age),
            profile.and_then(|p| p.driver_sex.as_deref()),
        )
    });
    finalize_guarded(stats)
}

/// Safety rate per hour-of-day window.
///
/// Unlike the session-level breakdowns, rows are assigned to windows
/// individually, and the rate uses a `max(1, n)` denominator rather than the
/// guarded branch. Output follows the fixed window order; unknown labels
/// sort last.
pub fn hourly_safety(records: &[SessionRecord]) -> Vec<GroupStat> {
    let mut cohorts: HashMap<&'static str, CohortAcc> = HashMap::new();

    for record in records {
        for sample in &record.samples {
            let acc = cohorts.entry(hour_window(sample.report_hour())).or_default();
            acc.data_points += 1;
            if sample.rapid_accel.unwrap_or(0) > 0 {
                acc.rapid_accel_incidents += 1;
            }
            if sample.rapid_decel.unwrap_or(0) > 0 {
                acc.rapid_decel_incidents += 1;
            }
            acc.sessions.insert(record.session.session_id.clone());
        }
        for event in &record.events {
            let window = hour_window(event.detected_at.map(|t| chrono::Timelike::hour(&t)));
            let acc = cohorts.entry(window).or_default();
            acc.drowsy_incidents += 1;
            acc.sessions.insert(record.session.session_id.clone());
        }
    }

    let mut stats: Vec<GroupStat> = cohorts
        .into_iter()
        .map(|(label, acc)| {
            let denominator = acc.data_points.max(1) as f64;
            let rate = ((1.0 - acc.incidents() as f64 / denominator) * 100.0).clamp(0.0, 100.0);
            acc.into_stat(label.to_string(), round1(rate))
        })
        .collect();
    stats.sort_by_key(|s| window_rank(&s.group));
    stats
}

fn group_by_session_label<F>(records: &[SessionRecord], label_of: F) -> HashMap<String, CohortAcc>
where
    F: Fn(&SessionRecord) -> String,
{
    let mut cohorts: HashMap<String, CohortAcc> = HashMap::new();
    for record in records {
        cohorts.entry(label_of(record)).or_default().add_record(record);
    }
    cohorts
}

fn finalize_guarded(cohorts: HashMap<String, CohortAcc>) -> Vec<GroupStat> {
    let mut stats: Vec<GroupStat> = cohorts
        .into_iter()
        .map(|(label, acc)| {
            let rate = if acc.data_points > 0 {
                let unsafe_ratio = acc.incidents() as f64 / acc.data_points as f64;
                ((1.0 - unsafe_ratio) * 100.0).clamp(0.0, 100.0)
            } else {
                100.0
            };
            acc.into_stat(label, round1(rate))
        })
        .collect();
    stats.sort_by(|a, b| a.group.cmp(&b.group));
    stats
}

#[derive(Debug, Default)]
struct VehicleAcc {
    vehicle_id: String,
    profile: Option<VehicleProfile>,
    rapid_accel_total: u64,
    rapid_decel_total: u64,
    eye_closure_total: u64,
    presence_incidents: u64,
    data_points: u64,
    total_travel: f64,
    session_count: u64,
}

/// Accumulate per-vehicle totals, preserving first-seen vehicle order so the
/// later stable sorts break ties by underlying row order.
fn accumulate_vehicles(records: &[SessionRecord]) -> Vec<VehicleAcc> {
    let mut order: Vec<VehicleAcc> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for record in records {
        let vehicle_id = record.session.vehicle_id.clone();
        let slot = *index.entry(vehicle_id.clone()).or_insert_with(|| {
            order.push(VehicleAcc {
                vehicle_id,
                ..Default::default()
            });
            order.len() - 1
        });
        let acc = &mut order[slot];

        if acc.profile.is_none() {
            acc.profile = record.profile.clone();
        }
        acc.session_count += 1;
        acc.data_points += record.samples.len() as u64;
        for sample in &record.samples {
            let accel = u64::from(sample.rapid_accel.unwrap_or(0));
            let decel = u64::from(sample.rapid_decel.unwrap_or(0));
            acc.rapid_accel_total += accel;
            acc.rapid_decel_total += decel;
            if accel > 0 {
                acc.presence_incidents += 1;
            }
            if decel > 0 {
                acc.presence_incidents += 1;
            }
            acc.total_travel += sample.travel_m.unwrap_or(0.0);
        }
        for event in &record.events {
            acc.eye_closure_total += u64::from(event.eye_closure_count);
        }
        acc.presence_incidents += record.events.len() as u64;
    }

    order
}

fn ranked_row(rank: u32, acc: &VehicleAcc, incident_rate: f64, driver_score: f64) -> RankedDriver {
    let profile = acc.profile.as_ref();
    RankedDriver {
        rank,
        vehicle_id: acc.vehicle_id.clone(),
        brand: profile.and_then(|p| p.brand.clone()),
        model: profile.and_then(|p| p.model.clone()),
        driver_age: profile.and_then(|p| p.driver_age),
        driver_sex: profile.and_then(|p| p.driver_sex.clone()),
        location: profile.and_then(|p| p.location.clone()),
        rapid_accel_total: acc.rapid_accel_total,
        rapid_decel_total: acc.rapid_decel_total,
        eye_closure_total: acc.eye_closure_total,
        session_count: acc.session_count,
        incident_rate: round4(incident_rate),
        driver_score: round2(driver_score),
    }
}

/// Rate-based leaderboard: incidents per session on a 1000-point scale.
///
/// `incident_rate = (accel + decel + eye closures) / session_count` with the
/// session count floored to 1; `driver_score = max(0, 1000 - rate * 1000)`.
/// Sorted ascending by the unrounded rate (stable, so ties keep row order),
/// truncated to `limit`.
pub fn rank_by_incident_rate(records: &[SessionRecord], limit: usize) -> Vec<RankedDriver> {
    let vehicles = accumulate_vehicles(records);

    let mut rated: Vec<(f64, &VehicleAcc)> = vehicles
        .iter()
        .map(|acc| {
            let incidents =
                acc.rapid_accel_total + acc.rapid_decel_total + acc.eye_closure_total;
            let rate = incidents as f64 / acc.session_count.max(1) as f64;
            (rate, acc)
        })
        .collect();
    rated.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

    rated
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(idx, (rate, acc))| {
            let driver_score = (1000.0 - rate * 1000.0).max(0.0);
            ranked_row(idx as u32 + 1, acc, rate, driver_score)
        })
        .collect()
}

/// Score-based leaderboard: 100-point ratio score with activity bonuses.
///
/// Base score is the fleet ratio formula over the vehicle's own rows, plus a
/// session-count bonus `min(3, sessions / 50)` and a travel bonus
/// `min(2, travel / 500)`, capped at 100. Sorted descending by the unrounded
/// final score, truncated to `limit`.
pub fn rank_by_score(records: &[SessionRecord], limit: usize) -> Vec<RankedDriver> {
    let vehicles = accumulate_vehicles(records);

    let mut scored: Vec<(f64, f64, &VehicleAcc)> = vehicles
        .iter()
        .map(|acc| {
            let presence_ratio = acc.presence_incidents as f64 / acc.data_points.max(1) as f64;
            let base = ((1.0 - presence_ratio) * 100.0).clamp(0.0, 100.0);
            let session_bonus = (acc.session_count as f64 / 50.0).min(3.0);
            let travel_bonus = (acc.total_travel / 500.0).min(2.0);
            let score = (base + session_bonus + travel_bonus).min(100.0);
            (score, presence_ratio, acc)
        })
        .collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    scored
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(idx, (score, ratio, acc))| ranked_row(idx as u32 + 1, acc, ratio, score))
        .collect()
}

/// Fleet-wide monthly summary over the given records.
///
/// With no sessions in the window both rates report 100.0.
pub fn fleet_summary(records: &[SessionRecord], year: i32, month: u32) -> FleetSummary {
    let mut fleet = CohortAcc::default();
    let mut vehicles: HashSet<&str> = HashSet::new();
    let mut score_sum = 0u64;

    for record in records {
        fleet.add_record(record);
        vehicles.insert(record.session.vehicle_id.as_str());
        score_sum +=
            u64::from(score_session(&record.session, &record.samples, &record.events).safety_score);
    }

    let safety_rate =
        ((1.0 - fleet.incidents() as f64 / fleet.data_points.max(1) as f64) * 100.0).clamp(0.0, 100.0);
    let average_safety_score = if records.is_empty() {
        100.0
    } else {
        score_sum as f64 / records.len() as f64
    };

    FleetSummary {
        year,
        month,
        session_count: fleet.sessions.len() as u64,
        vehicle_count: vehicles.len() as u64,
        data_points: fleet.data_points,
        rapid_accel_incidents: fleet.rapid_accel_incidents,
        rapid_decel_incidents: fleet.rapid_decel_incidents,
        drowsy_incidents: fleet.drowsy_incidents,
        safety_rate: round1(safety_rate),
        average_safety_score: round1(average_safety_score),
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}
