//! Scoring pipeline orchestration
//!
//! This module provides the public API of safedrive-core. Each call fetches
//! the telemetry rows it needs through the injected [`TelemetryReader`],
//! joins them in memory, and runs the pure scoring/aggregation stages:
//! bucketing → penalties → aggregation, with the classifier supplying group
//! keys. There is no cross-call state and no caching; every result is
//! recomputed from raw telemetry.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use chrono::{Datelike, Utc};
use log::debug;

use crate::aggregate::{
    demographic_safety, district_safety, fleet_summary, hourly_safety, rank_by_incident_rate,
    rank_by_score, SessionRecord,
};
use crate::error::ScoreError;
use crate::penalty::score_session;
use crate::reader::{SessionFilter, TelemetryReader};
use crate::types::{
    FleetSummary, GroupBy, GroupStat, RankedDriver, RankingVariant, SessionScore,
};

/// Engine tuning passed in at construction; no process-wide settings object.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Leaderboard size for the rate-based ranking
    pub rate_leaderboard_size: usize,
    /// Default leaderboard size for the score-based ranking
    pub score_leaderboard_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rate_leaderboard_size: 10,
            score_leaderboard_size: 5,
        }
    }
}

/// The scoring engine: a [`TelemetryReader`] plus configuration.
pub struct ScoreEngine<R: TelemetryReader> {
    reader: R,
    config: EngineConfig,
}

impl<R: TelemetryReader> ScoreEngine<R> {
    pub fn new(reader: R) -> Self {
        Self::with_config(reader, EngineConfig::default())
    }

    pub fn with_config(reader: R, config: EngineConfig) -> Self {
        Self { reader, config }
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    /// Score one session from its raw telemetry.
    pub fn session_score(&self, session_id: &str) -> Result<SessionScore, ScoreError> {
        let session = self
            .reader
            .sessions(&SessionFilter::for_session(session_id))?
            .into_iter()
            .next()
            .ok_or_else(|| ScoreError::UnknownSession(session_id.to_string()))?;
        let samples = self.reader.samples(session_id)?;
        let events = self.reader.drowsiness_events(session_id)?;
        Ok(score_session(&session, &samples, &events))
    }

    /// Scores for every session of the given vehicles in a calendar month.
    pub fn monthly_session_scores(
        &self,
        vehicle_ids: &[String],
        year: i32,
        month: u32,
    ) -> Result<Vec<SessionScore>, ScoreError> {
        check_month(month)?;
        if vehicle_ids.is_empty() {
            return Ok(Vec::new());
        }
        let filter = SessionFilter {
            vehicle_ids: Some(vehicle_ids.to_vec()),
            ..Default::default()
        };
        let mut scores = Vec::new();
        for session in self.reader.sessions(&filter)? {
            if !in_month(&session, year, month) {
                continue;
            }
            let samples = self.reader.samples(&session.session_id)?;
            let events = self.reader.drowsiness_events(&session.session_id)?;
            scores.push(score_session(&session, &samples, &events));
        }
        Ok(scores)
    }

    /// Cohort safety rates for a calendar month, grouped by the requested
    /// dimension. Year and month default to the current UTC month.
    pub fn monthly_safety_rate(
        &self,
        year: Option<i32>,
        month: Option<u32>,
        group_by: GroupBy,
    ) -> Result<Vec<GroupStat>, ScoreError> {
        let (year, month) = resolve_month(year, month)?;
        let records = self.month_records(year, month)?;
        Ok(match group_by {
            GroupBy::District => district_safety(&records),
            GroupBy::Demographic => demographic_safety(&records),
            GroupBy::Hour => hourly_safety(&records),
        })
    }

    /// Monthly best-driver leaderboard in the requested variant.
    ///
    /// `limit` overrides the variant's configured size when given.
    pub fn best_drivers(
        &self,
        year: Option<i32>,
        month: Option<u32>,
        limit: Option<usize>,
        variant: RankingVariant,
    ) -> Result<Vec<RankedDriver>, ScoreError> {
        let (year, month) = resolve_month(year, month)?;
        let records = self.month_records(year, month)?;
        Ok(match variant {
            RankingVariant::Rate => {
                rank_by_incident_rate(&records, limit.unwrap_or(self.config.rate_leaderboard_size))
            }
            RankingVariant::Score => {
                rank_by_score(&records, limit.unwrap_or(self.config.score_leaderboard_size))
            }
        })
    }

    /// Fleet-wide summary for a calendar month (defaults to the current UTC
    /// month).
    pub fn fleet_stats(
        &self,
        year: Option<i32>,
        month: Option<u32>,
    ) -> Result<FleetSummary, ScoreError> {
        let (year, month) = resolve_month(year, month)?;
        let records = self.month_records(year, month)?;
        Ok(fleet_summary(&records, year, month))
    }

    /// Batch-fetch every session in the month and join samples, events, and
    /// profiles in memory. Profiles are fetched once per vehicle; a missing
    /// profile keeps the session and falls back to sentinel labels later.
    fn month_records(&self, year: i32, month: u32) -> Result<Vec<SessionRecord>, ScoreError> {
        let sessions = self.reader.sessions(&SessionFilter::default())?;
        let mut profiles: HashMap<String, Option<crate::types::VehicleProfile>> = HashMap::new();
        let mut records = Vec::new();

        for session in sessions {
            if !in_month(&session, year, month) {
                continue;
            }
            let samples = self.reader.samples(&session.session_id)?;
            let events = self.reader.drowsiness_events(&session.session_id)?;
            let profile = match profiles.entry(session.vehicle_id.clone()) {
                Entry::Occupied(entry) => entry.get().clone(),
                Entry::Vacant(slot) => {
                    let fetched = self.reader.vehicle_profile(&session.vehicle_id)?;
                    if fetched.is_none() {
                        debug!(
                            "no profile for vehicle {}, grouping with sentinel labels",
                            session.vehicle_id
                        );
                    }
                    slot.insert(fetched).clone()
                }
            };
            records.push(SessionRecord {
                session,
                samples,
                events,
                profile,
            });
        }

        debug!("joined {} session records for {year}-{month:02}", records.len());
        Ok(records)
    }
}

fn in_month(session: &crate::types::DrivingSession, year: i32, month: u32) -> bool {
    session
        .window_time()
        .map(|t| t.year() == year && t.month() == month)
        .unwrap_or(false)
}

fn check_month(month: u32) -> Result<(), ScoreError> {
    if (1..=12).contains(&month) {
        Ok(())
    } else {
        Err(ScoreError::InvalidMonth(month))
    }
}

/// Explicit year+month when both are given, otherwise the current UTC month.
fn resolve_month(year: Option<i32>, month: Option<u32>) -> Result<(i32, u32), ScoreError> {
    match (year, month) {
        (Some(y), Some(m)) => {
            check_month(m)?;
            Ok((y, m))
        }
        _ => {
            let now = Utc::now();
            Ok((now.year(), now.month()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::{MemoryTelemetry, TelemetrySnapshot};
    use crate::types::{DrivingSession, DrowsinessEvent, TelemetrySample, VehicleProfile};
    use chrono::{TimeZone, Utc};

    fn ts(day: u32, hour: u32, min: u32) -> Option<chrono::DateTime<Utc>> {
        Utc.with_ymd_and_hms(2024, 3, day, hour, min, 0).single()
    }

    fn make_engine() -> ScoreEngine<MemoryTelemetry> {
        let snapshot = TelemetrySnapshot {
            sessions: vec![
                DrivingSession {
                    session_id: "s-1".into(),
                    vehicle_id: "v-1".into(),
                    start_time: ts(10, 5, 0),
                    end_time: ts(10, 6, 0),
                    created_at: ts(10, 6, 0),
                },
                DrivingSession {
                    session_id: "s-2".into(),
                    vehicle_id: "v-2".into(),
                    start_time: ts(11, 21, 0),
                    end_time: ts(11, 22, 0),
                    created_at: ts(11, 22, 0),
                },
                // outside the March window
                DrivingSession {
                    session_id: "s-feb".into(),
                    vehicle_id: "v-1".into(),
                    start_time: Utc.with_ymd_and_hms(2024, 2, 10, 9, 0, 0).single(),
                    end_time: None,
                    created_at: None,
                },
            ],
            samples: vec![
                TelemetrySample {
                    session_id: "s-1".into(),
                    captured_at: ts(10, 5, 55),
                    rapid_accel: Some(3),
                    rapid_decel: Some(3),
                    ..Default::default()
                },
                TelemetrySample {
                    session_id: "s-1".into(),
                    captured_at: ts(10, 5, 56),
                    rapid_accel: Some(2),
                    rapid_decel: Some(3),
                    ..Default::default()
                },
                TelemetrySample {
                    session_id: "s-1".into(),
                    captured_at: ts(10, 5, 57),
                    rapid_accel: Some(4),
                    rapid_decel: Some(6),
                    ..Default::default()
                },
                TelemetrySample {
                    session_id: "s-2".into(),
                    captured_at: ts(11, 21, 10),
                    rapid_accel: Some(0),
                    rapid_decel: Some(0),
                    ..Default::default()
                },
            ],
            drowsiness_events: vec![DrowsinessEvent {
                session_id: "s-2".into(),
                detected_at: ts(11, 21, 20),
                duration_sec: 12,
                eye_closure_count: 2,
                ..Default::default()
            }],
            profiles: vec![
                VehicleProfile {
                    vehicle_id: "v-1".into(),
                    driver_age: Some(34),
                    driver_sex: Some("여".into()),
                    location: Some("부산시 해운대구".into()),
                    brand: Some("현대".into()),
                    model: Some("아반떼".into()),
                    ..Default::default()
                },
                VehicleProfile {
                    vehicle_id: "v-2".into(),
                    driver_age: Some(52),
                    driver_sex: Some("남".into()),
                    location: Some("부산시 수영구".into()),
                    ..Default::default()
                },
            ],
        };
        ScoreEngine::new(MemoryTelemetry::new(snapshot))
    }

    #[test]
    fn test_session_score_end_to_end() {
        let engine = make_engine();
        let score = engine.session_score("s-1").unwrap();
        // one 05:50 bucket totalling 21, no drowsiness
        assert_eq!(score.rapid_penalty, 21);
        assert_eq!(score.drowsy_penalty, 0);
        assert_eq!(score.safety_score, 79);
        assert_eq!(score.rapid_buckets.len(), 1);
    }

    #[test]
    fn test_session_score_unknown_session() {
        let engine = make_engine();
        let err = engine.session_score("nope").unwrap_err();
        assert!(matches!(err, ScoreError::UnknownSession(_)));
    }

    #[test]
    fn test_monthly_session_scores_filters_vehicle_and_month() {
        let engine = make_engine();
        let scores = engine
            .monthly_session_scores(&["v-1".to_string()], 2024, 3)
            .unwrap();
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].session_id, "s-1");

        let none = engine.monthly_session_scores(&[], 2024, 3).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_monthly_session_scores_rejects_bad_month() {
        let engine = make_engine();
        let err = engine
            .monthly_session_scores(&["v-1".to_string()], 2024, 13)
            .unwrap_err();
        assert!(matches!(err, ScoreError::InvalidMonth(13)));
    }

    #[test]
    fn test_monthly_safety_rate_by_district() {
        let engine = make_engine();
        let stats = engine
            .monthly_safety_rate(Some(2024), Some(3), GroupBy::District)
            .unwrap();
        // February session excluded; two districts in March
        let labels: Vec<&str> = stats.iter().map(|s| s.group.as_str()).collect();
        assert_eq!(labels, vec!["수영구", "해운대구"]);

        let haeundae = stats.iter().find(|s| s.group == "해운대구").unwrap();
        // every sample row carries incidents: 3 rows, 3 accel + 3 decel presences
        assert_eq!(haeundae.data_points, 3);
        assert_eq!(haeundae.rapid_accel_incidents, 3);
        assert_eq!(haeundae.rapid_decel_incidents, 3);
        assert_eq!(haeundae.safety_rate, 0.0);

        let suyeong = stats.iter().find(|s| s.group == "수영구").unwrap();
        assert_eq!(suyeong.drowsy_incidents, 1);
        // (1 - 1/1) * 100
        assert_eq!(suyeong.safety_rate, 0.0);
    }

    #[test]
    fn test_monthly_safety_rate_by_demographic() {
        let engine = make_engine();
        let stats = engine
            .monthly_safety_rate(Some(2024), Some(3), GroupBy::Demographic)
            .unwrap();
        let labels: Vec<&str> = stats.iter().map(|s| s.group.as_str()).collect();
        assert_eq!(labels, vec!["30s/female", "50s+/male"]);
    }

    #[test]
    fn test_monthly_safety_rate_by_hour() {
        let engine = make_engine();
        let stats = engine
            .monthly_safety_rate(Some(2024), Some(3), GroupBy::Hour)
            .unwrap();
        let labels: Vec<&str> = stats.iter().map(|s| s.group.as_str()).collect();
        assert_eq!(labels, vec!["03-06", "21-24"]);
    }

    #[test]
    fn test_best_drivers_rate_variant() {
        let engine = make_engine();
        let ranked = engine
            .best_drivers(Some(2024), Some(3), None, RankingVariant::Rate)
            .unwrap();
        assert_eq!(ranked.len(), 2);
        // v-2: incidents 0 accel + 0 decel + 2 eye closures over 1 session -> 2.0
        // v-1: 9 + 12 + 0 over 1 session -> 21.0
        assert_eq!(ranked[0].vehicle_id, "v-2");
        assert_eq!(ranked[0].incident_rate, 2.0);
        // both rates exceed 1.0, so both scores floor at 0
        assert_eq!(ranked[0].driver_score, 0.0);
        assert_eq!(ranked[1].vehicle_id, "v-1");
        assert_eq!(ranked[1].driver_score, 0.0);
    }

    #[test]
    fn test_best_drivers_score_variant_defaults_to_top_5() {
        let engine = make_engine();
        let ranked = engine
            .best_drivers(Some(2024), Some(3), None, RankingVariant::Score)
            .unwrap();
        assert!(ranked.len() <= 5);
        assert_eq!(ranked[0].rank, 1);
    }

    #[test]
    fn test_fleet_stats_for_month() {
        let engine = make_engine();
        let summary = engine.fleet_stats(Some(2024), Some(3)).unwrap();
        assert_eq!(summary.session_count, 2);
        assert_eq!(summary.vehicle_count, 2);
        assert_eq!(summary.data_points, 4);
        assert_eq!(summary.drowsy_incidents, 1);
    }

    #[test]
    fn test_fleet_stats_empty_month() {
        let engine = make_engine();
        let summary = engine.fleet_stats(Some(2023), Some(1)).unwrap();
        assert_eq!(summary.session_count, 0);
        assert_eq!(summary.safety_rate, 100.0);
        assert_eq!(summary.average_safety_score, 100.0);
    }
}
