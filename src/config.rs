//! Orchestrator configuration

use crate::error::VibeError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Delay between the end of one tick and the start of the next
pub const DEFAULT_INTERVAL_MS: u64 = 5_000;

/// Snapshot window capacity (~10 minutes at the default cadence)
pub const DEFAULT_WINDOW_CAPACITY: usize = 120;

/// Age limit for snapshots that feed the vibe point
pub const DEFAULT_RECENT_WINDOW_SECS: i64 = 60;

/// Upper bound for `recent_window_secs` (one week)
pub const MAX_RECENT_WINDOW_SECS: i64 = 7 * 24 * 3600;

/// Snapshots included in the engine state
pub const DEFAULT_RECENT_SNAPSHOT_COUNT: usize = 10;

/// Per-collector deadline within a tick
pub const DEFAULT_COLLECTOR_TIMEOUT_MS: u64 = 10_000;

/// How collectors are polled within a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionMode {
    /// One after another, in registration order
    #[default]
    Sequential,
    /// All at once; results are still recorded in registration order
    Concurrent,
}

/// Tunables for [`SignalOrchestrator`](crate::orchestrator::SignalOrchestrator)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub interval_ms: u64,
    pub window_capacity: usize,
    pub recent_window_secs: i64,
    pub recent_snapshot_count: usize,
    pub collection_mode: CollectionMode,
    /// `None` waits on collectors indefinitely
    pub collector_timeout_ms: Option<u64>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_INTERVAL_MS,
            window_capacity: DEFAULT_WINDOW_CAPACITY,
            recent_window_secs: DEFAULT_RECENT_WINDOW_SECS,
            recent_snapshot_count: DEFAULT_RECENT_SNAPSHOT_COUNT,
            collection_mode: CollectionMode::Sequential,
            collector_timeout_ms: Some(DEFAULT_COLLECTOR_TIMEOUT_MS),
        }
    }
}

impl OrchestratorConfig {
    /// Default configuration with a specific window capacity
    pub fn with_window_capacity(capacity: usize) -> Self {
        Self {
            window_capacity: capacity,
            ..Self::default()
        }
    }

    /// Default configuration with concurrent collection
    pub fn concurrent() -> Self {
        Self {
            collection_mode: CollectionMode::Concurrent,
            ..Self::default()
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn collector_timeout(&self) -> Option<Duration> {
        self.collector_timeout_ms.map(Duration::from_millis)
    }

    pub fn recent_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.recent_window_secs.clamp(1, MAX_RECENT_WINDOW_SECS))
    }

    /// Reject settings the loop cannot run with
    pub fn validate(&self) -> Result<(), VibeError> {
        if self.interval_ms == 0 {
            return Err(VibeError::InvalidConfig("interval_ms must be > 0".to_string()));
        }
        if self.window_capacity == 0 {
            return Err(VibeError::InvalidConfig(
                "window_capacity must be > 0".to_string(),
            ));
        }
        if self.recent_window_secs <= 0 || self.recent_window_secs > MAX_RECENT_WINDOW_SECS {
            return Err(VibeError::InvalidConfig(format!(
                "recent_window_secs must be in 1..={}",
                MAX_RECENT_WINDOW_SECS
            )));
        }
        if self.collector_timeout_ms == Some(0) {
            return Err(VibeError::InvalidConfig(
                "collector_timeout_ms must be > 0 when set".to_string(),
            ));
        }
        Ok(())
    }

    /// Load and validate configuration from JSON
    pub fn from_json(json: &str) -> Result<Self, VibeError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config =
            OrchestratorConfig::from_json(r#"{"window_capacity": 30, "collection_mode": "concurrent"}"#)
                .unwrap();
        assert_eq!(config.window_capacity, 30);
        assert_eq!(config.collection_mode, CollectionMode::Concurrent);
        assert_eq!(config.interval_ms, DEFAULT_INTERVAL_MS);
        assert_eq!(config.collector_timeout_ms, Some(DEFAULT_COLLECTOR_TIMEOUT_MS));
    }

    #[test]
    fn test_null_timeout_disables_deadline() {
        let config = OrchestratorConfig::from_json(r#"{"collector_timeout_ms": null}"#).unwrap();
        assert!(config.collector_timeout().is_none());
    }

    #[test]
    fn test_validation() {
        assert!(OrchestratorConfig::from_json(r#"{"interval_ms": 0}"#).is_err());
        assert!(OrchestratorConfig::with_window_capacity(0).validate().is_err());
        assert!(OrchestratorConfig::default().validate().is_ok());
    }

    #[test]
    fn test_oversized_recent_window_rejected() {
        let err = OrchestratorConfig::from_json(r#"{"recent_window_secs": 1000000000000000}"#);
        assert!(matches!(err, Err(VibeError::InvalidConfig(_))));

        // Unvalidated values are clamped rather than overflowing
        let config = OrchestratorConfig {
            recent_window_secs: i64::MAX,
            ..OrchestratorConfig::default()
        };
        assert_eq!(
            config.recent_window(),
            chrono::Duration::seconds(MAX_RECENT_WINDOW_SECS)
        );
    }

    #[test]
    fn test_roundtrip() {
        let config = OrchestratorConfig::concurrent();
        let loaded = OrchestratorConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(config, loaded);
    }
}
