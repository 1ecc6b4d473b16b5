//! Scripted replay collector
//!
//! Plays back a recorded feed of readings, one per `collect()` call. Feeds are
//! NDJSON files where each line is a [`FeedReading`].
//!
//! The collector stays available while readings remain so every poll advances
//! the feed; a reading recorded as unavailable surfaces as
//! [`CollectorError::Unavailable`] from `collect()`.

use crate::error::{CollectorError, VibeError};
use crate::types::Signal;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use super::SignalCollector;

fn default_available() -> bool {
    true
}

fn default_quality() -> f64 {
    1.0
}

/// One recorded reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedReading {
    #[serde(default = "default_available")]
    pub available: bool,
    #[serde(default = "default_quality")]
    pub quality: f64,
    /// Payload; absent means the collector had nothing to report
    #[serde(default)]
    pub signal: Option<Signal>,
    /// Makes `collect()` fail with this message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Simulated collection latency
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<u64>,
}

impl FeedReading {
    pub fn signal(signal: Signal, quality: f64) -> Self {
        Self {
            available: true,
            quality,
            signal: Some(signal),
            error: None,
            delay_ms: None,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            quality: 0.0,
            signal: None,
            error: None,
            delay_ms: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            available: true,
            quality: 0.0,
            signal: None,
            error: Some(message.into()),
            delay_ms: None,
        }
    }
}

#[derive(Debug)]
struct FeedState {
    pending: VecDeque<FeedReading>,
    last: Option<FeedReading>,
}

/// Collector that replays a fixed feed
#[derive(Debug)]
pub struct ReplayCollector {
    name: String,
    state: Mutex<FeedState>,
    /// Original feed, re-queued when drained if set
    cycle: Option<Vec<FeedReading>>,
}

impl ReplayCollector {
    /// Play `readings` once; afterwards the collector reports unavailable
    pub fn new(name: impl Into<String>, readings: Vec<FeedReading>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(FeedState {
                pending: readings.into(),
                last: None,
            }),
            cycle: None,
        }
    }

    /// Play `readings` in a loop forever
    pub fn cycling(name: impl Into<String>, readings: Vec<FeedReading>) -> Self {
        let cycle = if readings.is_empty() {
            None
        } else {
            Some(readings.clone())
        };
        Self {
            cycle,
            ..Self::new(name, readings)
        }
    }

    /// Parse an NDJSON feed
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<FeedReading>, VibeError> {
        let mut readings = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<FeedReading>(trimmed) {
                Ok(reading) => readings.push(reading),
                Err(e) => {
                    return Err(VibeError::InvalidFeed(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        Ok(readings)
    }

    /// Readings not yet played
    pub fn remaining(&self) -> usize {
        self.lock().pending.len()
    }

    /// True once a non-cycling feed has been fully played
    pub fn is_drained(&self) -> bool {
        self.cycle.is_none() && self.lock().pending.is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FeedState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn next_reading(&self) -> Option<FeedReading> {
        let mut state = self.lock();
        if state.pending.is_empty() {
            if let Some(cycle) = &self.cycle {
                state.pending.extend(cycle.iter().cloned());
            }
        }
        let reading = state.pending.pop_front()?;
        state.last = Some(reading.clone());
        Some(reading)
    }
}

#[async_trait]
impl SignalCollector for ReplayCollector {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        self.cycle.is_some() || !self.lock().pending.is_empty()
    }

    async fn collect(&self) -> Result<Option<Signal>, CollectorError> {
        let reading = self
            .next_reading()
            .ok_or_else(|| CollectorError::Unavailable(format!("feed '{}' drained", self.name)))?;

        if let Some(delay) = reading.delay_ms {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if let Some(message) = reading.error {
            return Err(CollectorError::Failed(message));
        }
        if !reading.available {
            return Err(CollectorError::Unavailable(format!(
                "feed '{}' recorded no reading",
                self.name
            )));
        }
        Ok(reading.signal)
    }

    fn quality(&self) -> Result<f64, CollectorError> {
        let state = self.lock();
        state
            .last
            .as_ref()
            .or(state.pending.front())
            .map(|r| r.quality)
            .ok_or_else(|| CollectorError::Unavailable(format!("feed '{}' is empty", self.name)))
    }
}
