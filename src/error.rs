//! Error types for safedrive-core

use thiserror::Error;

/// Errors that can occur during scoring and aggregation
#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("Failed to parse telemetry payload: {0}")]
    Parse(String),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown session: {0}")]
    UnknownSession(String),

    #[error("Unknown detection: {0}")]
    UnknownDetection(String),

    #[error("Detection already resolved: {0}")]
    AlreadyResolved(String),

    #[error("Month out of range (expected 1-12): {0}")]
    InvalidMonth(u32),

    #[error("Telemetry store error: {0}")]
    Store(String),
}
