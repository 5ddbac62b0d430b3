//! Detection corrections and resolution log
//!
//! Automated detections (missing-person sightings, tax-arrears vehicle
//! sightings) are produced by the ingestion pipeline and read-only here.
//! Manual follow-up lives in the [`ResolutionLog`]: result corrections and
//! the at-most-once "resolved" transition, plus the statistics the reporting
//! layer builds on top of both.

use chrono::{DateTime, Datelike, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ScoreError;

/// Sentinel subject id for detections whose subject could not be read
pub const UNKNOWN_SUBJECT: &str = "unknown";

/// Which detection family a row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionKind {
    MissingPerson,
    Arrears,
}

/// One automated detection row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    pub detection_id: String,
    /// Missing-person id or arrears plate number; None when unreadable
    pub subject_id: Option<String>,
    pub kind: DetectionKind,
    /// None means the detection is still unconfirmed
    pub success: Option<bool>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub detected_at: Option<DateTime<Utc>>,
}

impl Detection {
    /// Subject id with the sentinel applied.
    pub fn subject(&self) -> &str {
        self.subject_id.as_deref().unwrap_or(UNKNOWN_SUBJECT)
    }
}

/// One audit row: a manual correction and/or resolution of a detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionModification {
    /// Generated audit-row id
    pub id: String,
    pub detection_id: String,
    pub subject_id: String,
    /// Detection result before the correction; None when unconfirmed or when
    /// the row was created by a bare resolve
    pub previous_result: Option<bool>,
    /// Detection result after the correction
    pub new_result: Option<bool>,
    /// User who made the change
    pub modified_by: String,
    pub is_resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Append-only audit log of manual detection follow-up.
///
/// One row per (detection, subject) pair; corrections and resolutions update
/// the same row. The resolved transition happens at most once: `resolve` is
/// a single conditional update, not a separate check followed by a write.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolutionLog {
    records: Vec<DetectionModification>,
}

impl ResolutionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the log from its JSON representation.
    pub fn from_json(json: &str) -> Result<Self, ScoreError> {
        serde_json::from_str(json)
            .map_err(|e| ScoreError::Parse(format!("Failed to parse resolution log: {e}")))
    }

    /// Serialize the log to JSON.
    pub fn to_json(&self) -> Result<String, ScoreError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn records(&self) -> &[DetectionModification] {
        &self.records
    }

    /// Record a manual correction of a detection result.
    ///
    /// Upserts the audit row for this detection; `is_resolved`/`resolved_at`
    /// are left untouched; resolution is a separate transition.
    pub fn record_correction(
        &mut self,
        detection: &Detection,
        new_result: bool,
        modified_by: &str,
        at: DateTime<Utc>,
    ) -> DetectionModification {
        let subject = detection.subject().to_string();
        match self.position(&detection.detection_id, &subject) {
            Some(idx) => {
                let record = &mut self.records[idx];
                record.previous_result = detection.success;
                record.new_result = Some(new_result);
                record.modified_by = modified_by.to_string();
                record.updated_at = at;
                record.clone()
            }
            None => {
                let record = DetectionModification {
                    id: Uuid::new_v4().to_string(),
                    detection_id: detection.detection_id.clone(),
                    subject_id: subject,
                    previous_result: detection.success,
                    new_result: Some(new_result),
                    modified_by: modified_by.to_string(),
                    is_resolved: false,
                    resolved_at: None,
                    created_at: at,
                    updated_at: at,
                };
                debug!("new correction row for detection {}", detection.detection_id);
                self.records.push(record.clone());
                record
            }
        }
    }

    /// Mark a detection resolved, at most once.
    ///
    /// Rejects with [`ScoreError::AlreadyResolved`] when the audit row is
    /// already resolved. A bare resolve (no prior correction) creates the
    /// row, carrying the detection's current result and no previous result.
    pub fn resolve(
        &mut self,
        detection: &Detection,
        modified_by: &str,
        at: DateTime<Utc>,
    ) -> Result<DetectionModification, ScoreError> {
        let subject = detection.subject().to_string();
        match self.position(&detection.detection_id, &subject) {
            Some(idx) => {
                let record = &mut self.records[idx];
                if record.is_resolved {
                    return Err(ScoreError::AlreadyResolved(detection.detection_id.clone()));
                }
                record.is_resolved = true;
                record.resolved_at = Some(at);
                record.updated_at = at;
                Ok(record.clone())
            }
            None => {
                let record = DetectionModification {
                    id: Uuid::new_v4().to_string(),
                    detection_id: detection.detection_id.clone(),
                    subject_id: subject,
                    previous_result: None,
                    new_result: detection.success,
                    modified_by: modified_by.to_string(),
                    is_resolved: true,
                    resolved_at: Some(at),
                    created_at: at,
                    updated_at: at,
                };
                self.records.push(record.clone());
                Ok(record)
            }
        }
    }

    /// Whether any audit row marks this detection resolved.
    pub fn is_resolved(&self, detection_id: &str) -> bool {
        self.records
            .iter()
            .any(|r| r.detection_id == detection_id && r.is_resolved)
    }

    /// Resolutions whose `resolved_at` falls in the given calendar month.
    pub fn resolutions_in(&self, year: i32, month: u32) -> u64 {
        self.records
            .iter()
            .filter(|r| r.is_resolved)
            .filter(|r| {
                r.resolved_at
                    .map(|t| t.year() == year && t.month() == month)
                    .unwrap_or(false)
            })
            .count() as u64
    }

    /// Corrections that flipped a detection to "not detected".
    pub fn corrected_to_false(&self) -> u64 {
        self.records
            .iter()
            .filter(|r| r.new_result == Some(false))
            .count() as u64
    }

    fn position(&self, detection_id: &str, subject_id: &str) -> Option<usize> {
        self.records
            .iter()
            .position(|r| r.detection_id == detection_id && r.subject_id == subject_id)
    }
}

/// Headline detection counters for one reference instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionStats {
    /// Successful detections on the reference UTC date
    pub detected_today: u64,
    /// Successful detections in the reference month
    pub detected_in_month: u64,
    /// Resolutions in the reference month
    pub resolved_in_month: u64,
}

/// Compute headline counters.
///
/// Only detections with `success == true` count; rows corrected to "not
/// detected" were false positives and stay out of the totals. The month
/// defaults to `now`'s month when not given.
pub fn detection_stats(
    detections: &[Detection],
    log: &ResolutionLog,
    now: DateTime<Utc>,
    year: Option<i32>,
    month: Option<u32>,
) -> DetectionStats {
    let today = now.date_naive();
    let (year, month) = match (year, month) {
        (Some(y), Some(m)) => (y, m),
        _ => (now.year(), now.month()),
    };

    let detected_today = detections
        .iter()
        .filter(|d| d.success == Some(true))
        .filter(|d| d.detected_at.map(|t| t.date_naive() == today).unwrap_or(false))
        .count() as u64;

    let detected_in_month = detections
        .iter()
        .filter(|d| d.success == Some(true))
        .filter(|d| in_month(d.detected_at, year, month))
        .count() as u64;

    DetectionStats {
        detected_today,
        detected_in_month,
        resolved_in_month: log.resolutions_in(year, month),
    }
}

/// Whole-log summary, independent of any time window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionSummary {
    pub total: u64,
    /// Detections confirmed successful
    pub confirmed: u64,
    /// Detections still awaiting confirmation
    pub unconfirmed: u64,
    /// Corrections that flipped a detection to "not detected"
    pub corrected_to_false: u64,
    /// Detections with a resolved audit row
    pub resolved: u64,
}

pub fn detection_summary(detections: &[Detection], log: &ResolutionLog) -> DetectionSummary {
    DetectionSummary {
        total: detections.len() as u64,
        confirmed: detections.iter().filter(|d| d.success == Some(true)).count() as u64,
        unconfirmed: detections.iter().filter(|d| d.success.is_none()).count() as u64,
        corrected_to_false: log.corrected_to_false(),
        resolved: detections
            .iter()
            .filter(|d| log.is_resolved(&d.detection_id))
            .count() as u64,
    }
}

/// One month of the detection trend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub year: i32,
    pub month: u32,
    /// All detections reported in the month
    pub reports: u64,
    /// Detections confirmed successful in the month
    pub found: u64,
    /// Resolutions in the month
    pub resolved: u64,
}

/// Number of months in the rolling trend window
pub const TREND_WINDOW_MONTHS: u32 = 7;

/// Detection trend over the trailing seven calendar months ending at the
/// reference month, oldest first.
///
/// Each month aggregates independently; months with no rows report zeros
/// rather than being omitted, and the window wraps year boundaries in both
/// directions.
pub fn monthly_trend(
    detections: &[Detection],
    log: &ResolutionLog,
    year: i32,
    month: u32,
) -> Result<Vec<TrendPoint>, ScoreError> {
    if !(1..=12).contains(&month) {
        return Err(ScoreError::InvalidMonth(month));
    }

    let mut points = Vec::with_capacity(TREND_WINDOW_MONTHS as usize);
    for back in (0..TREND_WINDOW_MONTHS).rev() {
        let (y, m) = months_back(year, month, back);
        let reports = detections
            .iter()
            .filter(|d| in_month(d.detected_at, y, m))
            .count() as u64;
        let found = detections
            .iter()
            .filter(|d| d.success == Some(true))
            .filter(|d| in_month(d.detected_at, y, m))
            .count() as u64;
        points.push(TrendPoint {
            year: y,
            month: m,
            reports,
            found,
            resolved: log.resolutions_in(y, m),
        });
    }
    Ok(points)
}

fn in_month(ts: Option<DateTime<Utc>>, year: i32, month: u32) -> bool {
    ts.map(|t| t.year() == year && t.month() == month).unwrap_or(false)
}

/// The calendar month `back` months before (year, month), wrapping years.
fn months_back(year: i32, month: u32, back: u32) -> (i32, u32) {
    let zero_based = year * 12 + month as i32 - 1 - back as i32;
    (zero_based.div_euclid(12), (zero_based.rem_euclid(12) + 1) as u32)
}
