//! safedrive-core - scoring and aggregation engine for municipal
//! driving-safety telemetry
//!
//! Converts raw per-vehicle telemetry (driving sessions, drowsiness
//! detections, rapid-acceleration samples) into safety scores, cohort
//! rates, and leaderboards through a deterministic pipeline:
//! telemetry read → ten-minute bucketing → penalty calculation →
//! aggregation & ranking, with district/demographic classification applied
//! while grouping.
//!
//! ## Modules
//!
//! - **engine**: public pipeline API over an injected [`TelemetryReader`]
//! - **bucket / penalty / classify / aggregate**: the pure computation stages
//! - **detections**: manual-correction audit log and detection statistics

pub mod aggregate;
pub mod bucket;
pub mod classify;
pub mod detections;
pub mod engine;
pub mod error;
pub mod penalty;
pub mod reader;
pub mod types;

pub use engine::{EngineConfig, ScoreEngine};
pub use error::ScoreError;
pub use reader::{MemoryTelemetry, SessionFilter, TelemetryReader, TelemetrySnapshot};
pub use types::{
    DrivingSession, DrowsinessEvent, FleetSummary, GroupBy, GroupStat, RankedDriver,
    RankingVariant, SessionScore, TelemetrySample, VehicleProfile,
};

/// Engine version embedded in CLI report envelopes
pub const CORE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for CLI report envelopes
pub const PRODUCER_NAME: &str = "safedrive-core";
