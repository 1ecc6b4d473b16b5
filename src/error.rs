//! Error types for the vibe engine

use thiserror::Error;

/// Errors surfaced by the engine's public API
#[derive(Debug, Error)]
pub enum VibeError {
    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid feed: {0}")]
    InvalidFeed(String),

    #[error("Collection loop is already running")]
    AlreadyRunning,

    #[error("No tokio runtime available to run the collection loop")]
    NoRuntime,
}

/// Errors raised by an individual signal collector.
///
/// These never escape a collection tick; the orchestrator logs them and treats
/// the collector as absent for that tick.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CollectorError {
    #[error("Collector unavailable: {0}")]
    Unavailable(String),

    #[error("Collection failed: {0}")]
    Failed(String),

    #[error("Collection timed out after {0}ms")]
    Timeout(u64),
}
