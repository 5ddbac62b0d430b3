//! Core types for the safedrive scoring pipeline
//!
//! This module defines the data that flows through each stage of the
//! pipeline: raw telemetry rows, transient time buckets, per-session scores,
//! and aggregated report rows.

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// One continuous vehicle trip.
///
/// Produced by the ingestion pipeline; read-only here. A session with no end
/// time (or an end time in the future) is still in progress.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DrivingSession {
    /// Opaque unique session identifier
    pub session_id: String,
    /// Vehicle the trip belongs to
    pub vehicle_id: String,
    /// Trip start time (UTC)
    pub start_time: Option<DateTime<Utc>>,
    /// Trip end time (UTC); None means in progress
    pub end_time: Option<DateTime<Utc>>,
    /// Ingestion timestamp; preferred over start_time for month selection
    pub created_at: Option<DateTime<Utc>>,
}

impl DrivingSession {
    /// Timestamp that places the session in a calendar month:
    /// `created_at` when the ingestion pipeline recorded one, else
    /// `start_time`.
    pub fn window_time(&self) -> Option<DateTime<Utc>> {
        self.created_at.or(self.start_time)
    }
}

/// One periodic reading within a session.
///
/// The incident counts are what scoring consumes; the remaining fields are
/// contextual and only ever used as grouping keys.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelemetrySample {
    /// Session this reading belongs to
    pub session_id: String,
    /// Capture timestamp; rows without one never enter any bucket
    pub captured_at: Option<DateTime<Utc>>,
    /// Rapid-acceleration incidents detected in this reading
    pub rapid_accel: Option<u32>,
    /// Rapid-deceleration incidents detected in this reading
    pub rapid_decel: Option<u32>,
    /// Hour of day reported by the ingestion pipeline (grouping only)
    pub hour_of_day: Option<u32>,
    /// Distance covered since the previous reading (grouping/bonus only)
    pub travel_m: Option<f64>,
    /// Road name at capture (grouping only)
    pub road_name: Option<String>,
}

impl TelemetrySample {
    /// Hour used for the hourly breakdown: the reported hour of day when
    /// present, otherwise the capture timestamp's hour.
    pub fn report_hour(&self) -> Option<u32> {
        self.hour_of_day.or_else(|| self.captured_at.map(|t| t.hour()))
    }
}

/// One detected drowsy-driving episode within a session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DrowsinessEvent {
    /// Session this episode belongs to
    pub session_id: String,
    /// Detection timestamp
    pub detected_at: Option<DateTime<Utc>>,
    /// Episode duration in seconds
    pub duration_sec: u32,
    /// Eye-closure detections during the episode
    pub eye_closure_count: u32,
    /// Head-drop detections during the episode
    pub head_drop_count: u32,
    /// Yawn detections during the episode
    pub yawn_count: u32,
}

impl DrowsinessEvent {
    /// Whether the episode crossed the penalty threshold or fired any
    /// per-frame flag.
    pub fn is_abnormal(&self) -> bool {
        self.duration_sec >= 5
            || self.eye_closure_count > 0
            || self.head_drop_count > 0
            || self.yawn_count > 0
    }
}

/// Demographic and vehicle metadata keyed by vehicle id.
///
/// Used only as a join key for grouping; never mutated by this crate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VehicleProfile {
    pub vehicle_id: String,
    pub driver_age: Option<i32>,
    pub driver_sex: Option<String>,
    /// Free-text home location, fed to the district classifier
    pub location: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub plate: Option<String>,
}

/// Wall-clock key of a ten-minute bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BucketKey {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    /// Ten-minute slot within the hour (minute / 10, so 0-5)
    pub slot: u32,
}

impl BucketKey {
    pub fn from_timestamp(ts: &DateTime<Utc>) -> Self {
        Self {
            year: ts.year(),
            month: ts.month(),
            day: ts.day(),
            hour: ts.hour(),
            slot: ts.minute() / 10,
        }
    }

    /// Display label for per-bucket breakdowns, e.g. "05:50".
    pub fn label(&self) -> String {
        format!("{:02}:{:02}", self.hour, self.slot * 10)
    }
}

/// Accumulated rapid-maneuver counts for one ten-minute window.
///
/// Created transiently during scoring; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBucket {
    pub key: BucketKey,
    pub accel_sum: u64,
    pub decel_sum: u64,
}

impl TimeBucket {
    pub fn total(&self) -> u64 {
        self.accel_sum + self.decel_sum
    }
}

/// Per-episode drowsiness breakdown attached to a session score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrowsyEpisodeDetail {
    pub detected_at: Option<DateTime<Utc>>,
    pub duration_sec: u32,
    pub penalty: u32,
    pub eye_closure_count: u32,
    pub head_drop_count: u32,
    pub yawn_count: u32,
}

/// Per-bucket rapid-maneuver breakdown attached to a session score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketDetail {
    /// "HH:MM" start of the ten-minute window
    pub window: String,
    pub accel_sum: u64,
    pub decel_sum: u64,
    /// accel_sum + decel_sum; equals this bucket's penalty contribution
    pub total: u64,
}

/// Safety score for one session, with the penalty breakdown behind it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionScore {
    pub session_id: String,
    pub vehicle_id: String,
    /// 0-100; 100 minus accumulated penalties, floored at 0
    pub safety_score: u32,
    pub drowsy_penalty: u32,
    pub rapid_penalty: u64,
    pub total_penalty: u64,
    pub eye_closure_count: u64,
    pub head_drop_count: u64,
    pub yawn_count: u64,
    pub rapid_accel_total: u64,
    pub rapid_decel_total: u64,
    pub drowsy_episodes: Vec<DrowsyEpisodeDetail>,
    pub rapid_buckets: Vec<BucketDetail>,
}

/// Aggregated safety statistics for one cohort (district, demographic group,
/// or hour-of-day window).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupStat {
    /// Cohort label; sentinel labels are kept, never dropped
    pub group: String,
    /// (1 - unsafe ratio) * 100, clamped to [0, 100], 1 decimal place
    pub safety_rate: f64,
    /// Telemetry rows counted for this cohort
    pub data_points: u64,
    /// Rows with at least one rapid-acceleration incident
    pub rapid_accel_incidents: u64,
    /// Rows with at least one rapid-deceleration incident
    pub rapid_decel_incidents: u64,
    /// Drowsiness episodes in this cohort
    pub drowsy_incidents: u64,
    /// Distinct sessions contributing to this cohort
    pub session_count: u64,
}

/// One leaderboard row from either ranking variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedDriver {
    /// 1-based leaderboard position
    pub rank: u32,
    pub vehicle_id: String,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub driver_age: Option<i32>,
    pub driver_sex: Option<String>,
    pub location: Option<String>,
    pub rapid_accel_total: u64,
    pub rapid_decel_total: u64,
    pub eye_closure_total: u64,
    pub session_count: u64,
    /// Incidents per session (rate variant) or incident-presence ratio
    /// (score variant), 4 decimal places
    pub incident_rate: f64,
    /// 1000-point scale for the rate variant, 100-point scale for the score
    /// variant; 2 decimal places
    pub driver_score: f64,
}

/// Fleet-wide monthly summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetSummary {
    pub year: i32,
    pub month: u32,
    pub session_count: u64,
    pub vehicle_count: u64,
    pub data_points: u64,
    pub rapid_accel_incidents: u64,
    pub rapid_decel_incidents: u64,
    pub drowsy_incidents: u64,
    /// Ratio-based cohort rate over the whole fleet, 1 decimal place
    pub safety_rate: f64,
    /// Mean of per-session safety scores, 1 decimal place
    pub average_safety_score: f64,
}

/// Cohort dimension for the monthly safety-rate report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
    District,
    Demographic,
    Hour,
}

/// Which best-driver formula to apply.
///
/// The platform historically shipped both; neither is authoritative, so both
/// survive as named variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingVariant {
    /// 1000-point scale from incidents per session, ascending-rate top 10
    Rate,
    /// 100-point scale with session-count and travel bonuses, top 5
    Score,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_bucket_key_from_timestamp() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 15, 5, 57, 12).unwrap();
        let key = BucketKey::from_timestamp(&ts);
        assert_eq!(
            key,
            BucketKey {
                year: 2024,
                month: 3,
                day: 15,
                hour: 5,
                slot: 5
            }
        );
        assert_eq!(key.label(), "05:50");
    }

    #[test]
    fn test_window_time_prefers_created_at() {
        let created = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let started = Utc.with_ymd_and_hms(2024, 1, 31, 23, 50, 0).unwrap();
        let session = DrivingSession {
            session_id: "s-1".into(),
            vehicle_id: "v-1".into(),
            start_time: Some(started),
            created_at: Some(created),
            ..Default::default()
        };
        assert_eq!(session.window_time(), Some(created));

        let session = DrivingSession {
            created_at: None,
            ..session
        };
        assert_eq!(session.window_time(), Some(started));
    }

    #[test]
    fn test_drowsiness_abnormal_flag() {
        let quiet = DrowsinessEvent {
            duration_sec: 3,
            ..Default::default()
        };
        assert!(!quiet.is_abnormal());

        let long = DrowsinessEvent {
            duration_sec: 5,
            ..Default::default()
        };
        assert!(long.is_abnormal());

        let flagged = DrowsinessEvent {
            duration_sec: 2,
            yawn_count: 1,
            ..Default::default()
        };
        assert!(flagged.is_abnormal());
    }

    #[test]
    fn test_report_hour_falls_back_to_timestamp() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 15, 14, 5, 0).unwrap();
        let sample = TelemetrySample {
            captured_at: Some(ts),
            hour_of_day: None,
            ..Default::default()
        };
        assert_eq!(sample.report_hour(), Some(14));

        let overridden = TelemetrySample {
            hour_of_day: Some(9),
            ..sample
        };
        assert_eq!(overridden.report_hour(), Some(9));
    }
}
