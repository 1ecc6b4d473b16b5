//! Confidence scoring
//!
//! Confidence combines three factors over the recent window:
//! - average snapshot quality
//! - consistency of per-snapshot energies (low spread = high consistency)
//! - diversity of signal kinds represented

use crate::energy::EnergyDeriver;
use crate::types::{SignalKind, SignalSnapshot};
use std::collections::BTreeSet;

/// Consistency floor for widely disagreeing windows
const MIN_CONSISTENCY: f64 = 0.1;

/// Consistency assumed when there are too few snapshots to measure spread
const DEFAULT_CONSISTENCY: f64 = 0.5;

/// Confidence factors for a window of snapshots
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceBreakdown {
    pub avg_quality: f64,
    pub consistency: f64,
    pub diversity: f64,
    pub confidence: f64,
}

/// Confidence scorer for snapshot windows
pub struct ConfidenceScorer;

impl ConfidenceScorer {
    /// Score a non-empty window
    pub fn score(snapshots: &[&SignalSnapshot]) -> ConfidenceBreakdown {
        let avg_quality = average_quality(snapshots);
        let energies: Vec<f64> = snapshots
            .iter()
            .map(|s| EnergyDeriver::snapshot_energy(s))
            .collect();
        let consistency = compute_consistency(&energies);
        let kinds: BTreeSet<SignalKind> = snapshots.iter().flat_map(|s| s.kinds()).collect();
        let diversity = compute_diversity(kinds.len());

        let confidence = (avg_quality * consistency * diversity).clamp(0.0, 1.0);

        ConfidenceBreakdown {
            avg_quality,
            consistency,
            diversity,
            confidence,
        }
    }
}

fn average_quality(snapshots: &[&SignalSnapshot]) -> f64 {
    if snapshots.is_empty() {
        return 0.0;
    }
    let sum: f64 = snapshots.iter().map(|s| s.quality).sum();
    (sum / snapshots.len() as f64).clamp(0.0, 1.0)
}

/// Formula: `max(0.1, 1 - σ)` where σ is the population standard deviation
fn compute_consistency(energies: &[f64]) -> f64 {
    if energies.len() < 2 {
        return DEFAULT_CONSISTENCY;
    }

    let n = energies.len() as f64;
    let mean: f64 = energies.iter().sum::<f64>() / n;
    let variance: f64 = energies.iter().map(|e| (e - mean).powi(2)).sum::<f64>() / n;

    (1.0 - variance.sqrt()).max(MIN_CONSISTENCY)
}

/// Formula: `min(1, 0.2 + 0.2 * kinds)`
fn compute_diversity(kind_count: usize) -> f64 {
    (0.2 + 0.2 * kind_count as f64).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MovementActivity, MovementSignal, Signal, TemporalSignal};
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn snapshot(signals: Vec<(&str, Signal)>, quality: f64) -> SignalSnapshot {
        let mut sources = BTreeMap::new();
        let mut availability = BTreeMap::new();
        for (name, signal) in signals {
            availability.insert(name.to_string(), true);
            sources.insert(name.to_string(), signal);
        }
        SignalSnapshot {
            id: "test".to_string(),
            timestamp: Utc::now(),
            sources,
            quality,
            availability,
        }
    }

    fn temporal(hour: u32) -> Signal {
        Signal::Temporal(TemporalSignal {
            hour,
            is_weekend: false,
            day_of_week: None,
        })
    }

    #[test]
    fn test_diversity_steps() {
        assert!((compute_diversity(1) - 0.4).abs() < 1e-9);
        assert!((compute_diversity(2) - 0.6).abs() < 1e-9);
        assert!((compute_diversity(3) - 0.8).abs() < 1e-9);
        assert_eq!(compute_diversity(4), 1.0);
        assert_eq!(compute_diversity(9), 1.0);
    }

    #[test]
    fn test_consistency_defaults_and_floor() {
        assert_eq!(compute_consistency(&[]), 0.5);
        assert_eq!(compute_consistency(&[0.7]), 0.5);
        assert!((compute_consistency(&[0.5, 0.5, 0.5]) - 1.0).abs() < 1e-9);
        // σ = 0.5 for {0, 1}
        assert!((compute_consistency(&[0.0, 1.0]) - 0.5).abs() < 1e-9);
        // σ = 1.5 for {-1, 2}; clamped energies never get here
        assert_eq!(compute_consistency(&[-1.0, 2.0]), 0.1);
    }

    #[test]
    fn test_steady_single_kind_window() {
        let snapshots: Vec<_> = (0..3)
            .map(|_| snapshot(vec![("temporal", temporal(20))], 1.0))
            .collect();
        let refs: Vec<_> = snapshots.iter().collect();

        let breakdown = ConfidenceScorer::score(&refs);
        assert!((breakdown.consistency - 1.0).abs() < 1e-9);
        assert!((breakdown.diversity - 0.4).abs() < 1e-9);
        assert!((breakdown.confidence - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_lower_variance_is_more_confident() {
        let steady: Vec<_> = [20, 20, 21, 20]
            .iter()
            .map(|h| snapshot(vec![("temporal", temporal(*h))], 0.8))
            .collect();
        let noisy: Vec<_> = [20, 9, 21, 3]
            .iter()
            .map(|h| snapshot(vec![("temporal", temporal(*h))], 0.8))
            .collect();

        let a = ConfidenceScorer::score(&steady.iter().collect::<Vec<_>>());
        let b = ConfidenceScorer::score(&noisy.iter().collect::<Vec<_>>());

        assert_eq!(a.avg_quality, b.avg_quality);
        assert_eq!(a.diversity, b.diversity);
        assert!(a.confidence >= b.confidence);
    }

    #[test]
    fn test_diversity_counts_kinds_not_sources() {
        let walking = Signal::Movement(MovementSignal {
            activity: MovementActivity::Walking,
            speed_mps: None,
        });
        let s = snapshot(
            vec![
                ("clock-a", temporal(20)),
                ("clock-b", temporal(20)),
                ("motion", walking),
            ],
            1.0,
        );
        let breakdown = ConfidenceScorer::score(&[&s]);
        assert!((breakdown.diversity - 0.6).abs() < 1e-9);
        assert_eq!(breakdown.consistency, 0.5);
    }
}
