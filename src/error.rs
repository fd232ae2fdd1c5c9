//! Error types for loaders, the remote projection seam and the pipeline.
//!
//! Per-sample derivations never fail; malformed input is coerced to a
//! safe default instead. Only loading static data (track configuration,
//! GPX outlines, racing-line tables), the optional remote projection
//! service and talking to a stopped pipeline can produce errors.

use thiserror::Error;

/// Failure while loading static session data.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("GPX parse error: {0}")]
    Gpx(String),

    #[error("invalid data: {0}")]
    Invalid(String),
}

/// Failure of the remote projection service.
///
/// Every variant resolves to the local projection; none of them reach
/// the render path.
#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("projection service unavailable")]
    Unavailable,

    #[error("projection request timed out after {0} ms")]
    Timeout(u64),

    #[error("projection request failed: {0}")]
    Failed(String),
}

/// The processing task is gone.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("pipeline is not running")]
    Closed,

    #[error("pipeline task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
