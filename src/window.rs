//! Snapshot window
//!
//! This module keeps the rolling window of snapshots the vibe point is derived from.
//! The window is bounded; once full, the oldest snapshot is evicted first.

use crate::config::DEFAULT_WINDOW_CAPACITY;
use crate::error::VibeError;
use crate::types::SignalSnapshot;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Bounded FIFO of snapshots, oldest first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotWindow {
    snapshots: VecDeque<SignalSnapshot>,
    capacity: usize,
}

impl Default for SnapshotWindow {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_CAPACITY)
    }
}

impl SnapshotWindow {
    /// Create an empty window holding at most `capacity` snapshots
    pub fn new(capacity: usize) -> Self {
        Self {
            snapshots: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a snapshot, evicting the oldest entries past capacity.
    ///
    /// Returns how many snapshots were evicted.
    pub fn push(&mut self, snapshot: SignalSnapshot) -> usize {
        self.snapshots.push_back(snapshot);
        let mut evicted = 0;
        while self.snapshots.len() > self.capacity {
            self.snapshots.pop_front();
            evicted += 1;
        }
        evicted
    }

    /// Snapshots no older than `horizon` relative to `now`.
    ///
    /// A horizon reaching past the representable range covers the whole window.
    pub fn recent(&self, now: DateTime<Utc>, horizon: Duration) -> Vec<&SignalSnapshot> {
        let cutoff = now.checked_sub_signed(horizon);
        self.snapshots
            .iter()
            .filter(|s| s.timestamp <= now && cutoff.map_or(true, |c| s.timestamp >= c))
            .collect()
    }

    /// The last `n` snapshots, oldest first
    pub fn last_n(&self, n: usize) -> Vec<SignalSnapshot> {
        let skip = self.snapshots.len().saturating_sub(n);
        self.snapshots.iter().skip(skip).cloned().collect()
    }

    pub fn latest(&self) -> Option<&SignalSnapshot> {
        self.snapshots.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SignalSnapshot> {
        self.snapshots.iter()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
    }

    /// Re-bound an imported window to `capacity`, dropping the oldest overflow
    pub fn with_capacity_limit(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        while self.snapshots.len() > capacity {
            self.snapshots.pop_front();
        }
        self
    }

    /// Load a window from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Reject windows holding snapshots a collection tick could never store
    pub fn validate(&self) -> Result<(), VibeError> {
        if self.capacity == 0 {
            return Err(VibeError::InvalidFeed("window capacity must be > 0".to_string()));
        }
        self.snapshots.iter().try_for_each(SignalSnapshot::validate)
    }

    /// Serialize the window to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
