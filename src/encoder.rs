//! State encoding
//!
//! Wraps engine state in an envelope carrying producer metadata, for NDJSON
//! output and downstream consumers.

use crate::types::{VibeEngineState, VibePoint};
use crate::{PRODUCER_NAME, VIBE_VERSION};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Envelope schema version
pub const STATE_SCHEMA_VERSION: &str = "vibe.state.v1";

/// Producer metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Producer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Encoded engine state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateEnvelope {
    pub schema_version: String,
    pub producer: Producer,
    pub encoded_at_utc: DateTime<Utc>,
    /// Seconds since the last window update
    pub freshness_sec: i64,
    pub state: VibeEngineState,
}

/// Encoded standalone vibe point
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointEnvelope {
    pub schema_version: String,
    pub producer: Producer,
    pub point: VibePoint,
}

/// Encoder for producing state envelopes
pub struct StateEncoder {
    instance_id: String,
}

impl Default for StateEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl StateEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    fn producer(&self) -> Producer {
        Producer {
            name: PRODUCER_NAME.to_string(),
            version: VIBE_VERSION.to_string(),
            instance_id: self.instance_id.clone(),
        }
    }

    /// Wrap `state` as of `now`
    pub fn encode(&self, state: &VibeEngineState, now: DateTime<Utc>) -> StateEnvelope {
        StateEnvelope {
            schema_version: STATE_SCHEMA_VERSION.to_string(),
            producer: self.producer(),
            encoded_at_utc: now,
            freshness_sec: (now - state.last_update).num_seconds().max(0),
            state: state.clone(),
        }
    }

    pub fn encode_point(&self, point: &VibePoint) -> PointEnvelope {
        PointEnvelope {
            schema_version: STATE_SCHEMA_VERSION.to_string(),
            producer: self.producer(),
            point: point.clone(),
        }
    }

    /// Encode to a single JSON line
    pub fn encode_to_json(
        &self,
        state: &VibeEngineState,
        now: DateTime<Utc>,
    ) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.encode(state, now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use std::collections::BTreeMap;

    fn make_state(last_update: DateTime<Utc>) -> VibeEngineState {
        let mut signal_health = BTreeMap::new();
        signal_health.insert("temporal".to_string(), 1.0);
        VibeEngineState {
            current_vibe: VibePoint {
                t: last_update,
                energy: 0.5,
                confidence: 0.4,
                sources: vec!["temporal".to_string()],
            },
            recent_snapshots: vec![],
            signal_health,
            last_update,
        }
    }

    #[test]
    fn test_encode_state() {
        let t = Utc.with_ymd_and_hms(2024, 1, 15, 20, 0, 0).unwrap();
        let encoder = StateEncoder::with_instance_id("instance-1".to_string());

        let envelope = encoder.encode(&make_state(t), t + Duration::seconds(12));
        assert_eq!(envelope.schema_version, STATE_SCHEMA_VERSION);
        assert_eq!(envelope.producer.name, "floq-vibe");
        assert_eq!(envelope.producer.instance_id, "instance-1");
        assert_eq!(envelope.freshness_sec, 12);
    }

    #[test]
    fn test_encode_to_json() {
        let t = Utc.with_ymd_and_hms(2024, 1, 15, 20, 0, 0).unwrap();
        let encoder = StateEncoder::new();
        let json = encoder.encode_to_json(&make_state(t), t).unwrap();

        assert!(!json.contains('\n'));
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["state"]["current_vibe"]["energy"], 0.5);
        assert_eq!(value["state"]["signal_health"]["temporal"], 1.0);
        assert_eq!(value["producer"]["instance_id"], encoder.instance_id());
    }
}
