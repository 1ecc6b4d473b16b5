//! Core types for the vibe engine
//!
//! This module defines the data that flows through a collection tick: per-modality
//! signals, the snapshot built from them, and the derived vibe point and engine state.

use crate::error::VibeError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Baseline energy used when there is nothing better to go on
pub const BASELINE_ENERGY: f64 = 0.3;

/// Confidence reported alongside the baseline energy
pub const BASELINE_CONFIDENCE: f64 = 0.1;

/// Signal modality
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    Location,
    Movement,
    Temporal,
    Behavioral,
}

impl SignalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::Location => "location",
            SignalKind::Movement => "movement",
            SignalKind::Temporal => "temporal",
            SignalKind::Behavioral => "behavioral",
        }
    }
}

/// A venue recognized near the user's position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenueMatch {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Match confidence (0-1)
    pub confidence: f64,
}

/// Location reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationSignal {
    /// Density of the surrounding area (0-1, 1 = dense urban core)
    pub urban_density: f64,
    #[serde(default)]
    pub venue: Option<VenueMatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    /// Horizontal accuracy in meters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy_m: Option<f64>,
}

/// Coarse activity classification from motion sensors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementActivity {
    Stationary,
    Walking,
    Running,
    Transit,
    Unknown,
}

/// Movement reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementSignal {
    pub activity: MovementActivity,
    /// Speed in meters per second
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_mps: Option<f64>,
}

/// Time-of-day reading, in the user's local time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalSignal {
    /// Local hour of day (0-23)
    pub hour: u32,
    pub is_weekend: bool,
    /// Local day of week (0 = Monday)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_of_week: Option<u32>,
}

/// Learned behavior pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    SocialNight,
    Adventure,
    Exploration,
    Routine,
    #[serde(other)]
    Other,
}

/// A behavior pattern matched against the current context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternMatch {
    pub kind: PatternKind,
    /// Match confidence (0-1)
    pub confidence: f64,
}

/// Behavioral reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehavioralSignal {
    #[serde(default)]
    pub pattern: Option<PatternMatch>,
}

/// A single collector's payload for one tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Signal {
    Location(LocationSignal),
    Movement(MovementSignal),
    Temporal(TemporalSignal),
    Behavioral(BehavioralSignal),
}

impl Signal {
    pub fn kind(&self) -> SignalKind {
        match self {
            Signal::Location(_) => SignalKind::Location,
            Signal::Movement(_) => SignalKind::Movement,
            Signal::Temporal(_) => SignalKind::Temporal,
            Signal::Behavioral(_) => SignalKind::Behavioral,
        }
    }
}

/// Aggregation of every collector's output at one instant.
///
/// Built once per collection tick and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalSnapshot {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    /// Payloads of collectors that were available and returned data
    pub sources: BTreeMap<String, Signal>,
    /// Mean quality of the contributing collectors (0-1)
    pub quality: f64,
    /// Availability of every registered collector at this tick
    pub availability: BTreeMap<String, bool>,
}

impl SignalSnapshot {
    /// Distinct signal kinds carried by this snapshot
    pub fn kinds(&self) -> impl Iterator<Item = SignalKind> + '_ {
        self.sources.values().map(Signal::kind)
    }

    /// Check the invariants every stored snapshot holds: at least one source,
    /// every source listed in `availability`, and quality in (0, 1]
    pub fn validate(&self) -> Result<(), VibeError> {
        if self.sources.is_empty() {
            return Err(VibeError::InvalidFeed(format!(
                "snapshot {} has no sources",
                self.id
            )));
        }
        if let Some(name) = self
            .sources
            .keys()
            .find(|name| !self.availability.contains_key(*name))
        {
            return Err(VibeError::InvalidFeed(format!(
                "snapshot {} source '{}' missing from availability",
                self.id, name
            )));
        }
        if !(self.quality > 0.0 && self.quality <= 1.0) {
            return Err(VibeError::InvalidFeed(format!(
                "snapshot {} quality {} outside (0, 1]",
                self.id, self.quality
            )));
        }
        Ok(())
    }
}

/// Derived energy estimate with its confidence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VibePoint {
    pub t: DateTime<Utc>,
    /// Energy (0-1)
    pub energy: f64,
    /// Trust in `energy` (0-1)
    pub confidence: f64,
    /// Sources that contributed to the recent window
    pub sources: Vec<String>,
}

impl VibePoint {
    /// Low-confidence neutral point used when no recent data exists
    pub fn baseline(t: DateTime<Utc>) -> Self {
        Self {
            t,
            energy: BASELINE_ENERGY,
            confidence: BASELINE_CONFIDENCE,
            sources: Vec::new(),
        }
    }
}

/// Consumer-facing view of the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VibeEngineState {
    pub current_vibe: VibePoint,
    /// Most recent snapshots, oldest first
    pub recent_snapshots: Vec<SignalSnapshot>,
    /// Current quality per registered collector (0 if unavailable)
    pub signal_health: BTreeMap<String, f64>,
    pub last_update: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_tagged_serialization() {
        let signal = Signal::Movement(MovementSignal {
            activity: MovementActivity::Walking,
            speed_mps: None,
        });
        let json = serde_json::to_value(&signal).unwrap();
        assert_eq!(json["type"], "movement");
        assert_eq!(json["activity"], "walking");

        let parsed: Signal = serde_json::from_str(
            r#"{"type":"behavioral","pattern":{"kind":"social_night","confidence":0.8}}"#,
        )
        .unwrap();
        assert_eq!(parsed.kind(), SignalKind::Behavioral);
    }

    #[test]
    fn test_unknown_pattern_kind_maps_to_other() {
        let parsed: PatternMatch =
            serde_json::from_str(r#"{"kind":"brunch","confidence":0.5}"#).unwrap();
        assert_eq!(parsed.kind, PatternKind::Other);
    }

    #[test]
    fn test_snapshot_validation() {
        let mut snapshot = SignalSnapshot {
            id: "s1".to_string(),
            timestamp: Utc::now(),
            sources: BTreeMap::new(),
            quality: 0.8,
            availability: BTreeMap::new(),
        };
        assert!(snapshot.validate().is_err());

        snapshot.sources.insert(
            "temporal".to_string(),
            Signal::Temporal(TemporalSignal {
                hour: 20,
                is_weekend: false,
                day_of_week: None,
            }),
        );
        assert!(snapshot.validate().is_err());

        snapshot.availability.insert("temporal".to_string(), true);
        assert!(snapshot.validate().is_ok());

        snapshot.quality = 0.0;
        assert!(snapshot.validate().is_err());
        snapshot.quality = f64::NAN;
        assert!(snapshot.validate().is_err());
    }

    #[test]
    fn test_baseline_point() {
        let point = VibePoint::baseline(Utc::now());
        assert_eq!(point.energy, 0.3);
        assert_eq!(point.confidence, 0.1);
        assert!(point.sources.is_empty());
    }
}
