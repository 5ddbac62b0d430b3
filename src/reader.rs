//! Telemetry store access
//!
//! The scoring engine reads raw telemetry through the [`TelemetryReader`]
//! trait; the backing store (the municipal telemetry database) lives behind
//! it. [`MemoryTelemetry`] is the snapshot-backed implementation used by
//! tests and the CLI.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ScoreError;
use crate::types::{DrivingSession, DrowsinessEvent, TelemetrySample, VehicleProfile};

/// Filter for session listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionFilter {
    /// Restrict to these vehicles
    pub vehicle_ids: Option<Vec<String>>,
    /// Restrict to one session
    pub session_id: Option<String>,
    /// Sessions starting at or after this time
    pub from: Option<DateTime<Utc>>,
    /// Sessions starting at or before this time
    pub to: Option<DateTime<Utc>>,
}

impl SessionFilter {
    /// Filter matching a single session id.
    pub fn for_session(session_id: &str) -> Self {
        Self {
            session_id: Some(session_id.to_string()),
            ..Default::default()
        }
    }

    fn matches(&self, session: &DrivingSession) -> bool {
        if let Some(id) = &self.session_id {
            if *id != session.session_id {
                return false;
            }
        }
        if let Some(ids) = &self.vehicle_ids {
            if !ids.iter().any(|v| *v == session.vehicle_id) {
                return false;
            }
        }
        if let Some(from) = self.from {
            match session.start_time {
                Some(start) if start >= from => {}
                _ => return false,
            }
        }
        if let Some(to) = self.to {
            match session.start_time {
                Some(start) if start <= to => {}
                _ => return false,
            }
        }
        true
    }
}

/// Read-only access to raw telemetry.
///
/// Infrastructure failures surface as [`ScoreError::Store`] and abort only
/// the aggregation call that hit them.
pub trait TelemetryReader {
    /// Sessions matching the filter.
    fn sessions(&self, filter: &SessionFilter) -> Result<Vec<DrivingSession>, ScoreError>;

    /// Samples for one session, ascending by capture timestamp.
    fn samples(&self, session_id: &str) -> Result<Vec<TelemetrySample>, ScoreError>;

    /// Drowsiness episodes for one session.
    fn drowsiness_events(&self, session_id: &str) -> Result<Vec<DrowsinessEvent>, ScoreError>;

    /// Profile for one vehicle, when the join target exists.
    fn vehicle_profile(&self, vehicle_id: &str) -> Result<Option<VehicleProfile>, ScoreError>;
}

/// Serializable point-in-time view of the telemetry store.
///
/// This is the interchange format the CLI loads from disk and the fixture
/// format tests build in memory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    #[serde(default)]
    pub sessions: Vec<DrivingSession>,
    #[serde(default)]
    pub samples: Vec<TelemetrySample>,
    #[serde(default)]
    pub drowsiness_events: Vec<DrowsinessEvent>,
    #[serde(default)]
    pub profiles: Vec<VehicleProfile>,
}

/// In-memory [`TelemetryReader`] over a [`TelemetrySnapshot`].
///
/// Construction takes the snapshot by value; there is no process-wide store
/// handle. Samples and events are indexed per session at construction and
/// sorted ascending by timestamp so readers see the order the trait
/// guarantees.
#[derive(Debug, Clone, Default)]
pub struct MemoryTelemetry {
    sessions: Vec<DrivingSession>,
    samples_by_session: HashMap<String, Vec<TelemetrySample>>,
    events_by_session: HashMap<String, Vec<DrowsinessEvent>>,
    profiles: HashMap<String, VehicleProfile>,
}

impl MemoryTelemetry {
    pub fn new(snapshot: TelemetrySnapshot) -> Self {
        let mut samples_by_session: HashMap<String, Vec<TelemetrySample>> = HashMap::new();
        for sample in snapshot.samples {
            samples_by_session
                .entry(sample.session_id.clone())
                .or_default()
                .push(sample);
        }
        for samples in samples_by_session.values_mut() {
            samples.sort_by_key(|s| s.captured_at);
        }

        let mut events_by_session: HashMap<String, Vec<DrowsinessEvent>> = HashMap::new();
        for event in snapshot.drowsiness_events {
            events_by_session
                .entry(event.session_id.clone())
                .or_default()
                .push(event);
        }
        for events in events_by_session.values_mut() {
            events.sort_by_key(|e| e.detected_at);
        }

        let profiles = snapshot
            .profiles
            .into_iter()
            .map(|p| (p.vehicle_id.clone(), p))
            .collect();

        Self {
            sessions: snapshot.sessions,
            samples_by_session,
            events_by_session,
            profiles,
        }
    }

    /// Load a snapshot from its JSON representation.
    pub fn from_json(json: &str) -> Result<Self, ScoreError> {
        let snapshot: TelemetrySnapshot = serde_json::from_str(json)
            .map_err(|e| ScoreError::Parse(format!("Failed to parse telemetry snapshot: {e}")))?;
        Ok(Self::new(snapshot))
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

impl TelemetryReader for MemoryTelemetry {
    fn sessions(&self, filter: &SessionFilter) -> Result<Vec<DrivingSession>, ScoreError> {
        Ok(self
            .sessions
            .iter()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect())
    }

    fn samples(&self, session_id: &str) -> Result<Vec<TelemetrySample>, ScoreError> {
        Ok(self
            .samples_by_session
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }

    fn drowsiness_events(&self, session_id: &str) -> Result<Vec<DrowsinessEvent>, ScoreError> {
        Ok(self
            .events_by_session
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }

    fn vehicle_profile(&self, vehicle_id: &str) -> Result<Option<VehicleProfile>, ScoreError> {
        Ok(self.profiles.get(vehicle_id).cloned())
    }
}
