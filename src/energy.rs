//! Energy derivation
//!
//! Computes a per-snapshot energy estimate by adjusting a neutral baseline with
//! each contributing signal, then blends snapshots into a window energy.

use crate::types::{
    BehavioralSignal, LocationSignal, MovementActivity, MovementSignal, PatternKind, Signal,
    SignalSnapshot, TemporalSignal, BASELINE_ENERGY,
};

/// Evening hours (inclusive) that raise energy
const EVENING_START_HOUR: u32 = 18;
const EVENING_END_HOUR: u32 = 23;

/// Energy deriver for snapshots
pub struct EnergyDeriver;

impl EnergyDeriver {
    /// Energy of one snapshot, clamped to 0-1
    pub fn snapshot_energy(snapshot: &SignalSnapshot) -> f64 {
        let adjustment: f64 = snapshot.sources.values().map(signal_adjustment).sum();
        let energy = BASELINE_ENERGY + adjustment;
        if energy.is_nan() {
            return BASELINE_ENERGY;
        }
        energy.clamp(0.0, 1.0)
    }

    /// Quality-weighted mean energy across `snapshots`
    ///
    /// Falls back to the baseline when the total weight is zero.
    pub fn window_energy(snapshots: &[&SignalSnapshot]) -> f64 {
        let mut weighted_sum = 0.0;
        let mut total_weight = 0.0;

        for snapshot in snapshots {
            let weight = snapshot.quality.max(0.0);
            weighted_sum += Self::snapshot_energy(snapshot) * weight;
            total_weight += weight;
        }

        if total_weight <= 0.0 {
            return BASELINE_ENERGY;
        }
        (weighted_sum / total_weight).clamp(0.0, 1.0)
    }
}

/// Additive energy adjustment contributed by one signal
fn signal_adjustment(signal: &Signal) -> f64 {
    match signal {
        Signal::Location(location) => location_adjustment(location),
        Signal::Movement(movement) => movement_adjustment(movement),
        Signal::Temporal(temporal) => temporal_adjustment(temporal),
        Signal::Behavioral(behavioral) => behavioral_adjustment(behavioral),
    }
}

/// Formula: `urban_density * 0.3 + venue.confidence * 0.2`
fn location_adjustment(location: &LocationSignal) -> f64 {
    let density = unit(location.urban_density) * 0.3;
    let venue = location
        .venue
        .as_ref()
        .map(|v| unit(v.confidence) * 0.2)
        .unwrap_or(0.0);
    density + venue
}

fn movement_adjustment(movement: &MovementSignal) -> f64 {
    match movement.activity {
        MovementActivity::Walking => 0.2,
        MovementActivity::Transit => 0.1,
        MovementActivity::Stationary | MovementActivity::Running | MovementActivity::Unknown => 0.0,
    }
}

/// Evenings add 0.2, weekends a further 0.1
fn temporal_adjustment(temporal: &TemporalSignal) -> f64 {
    let mut adjustment = 0.0;
    if (EVENING_START_HOUR..=EVENING_END_HOUR).contains(&temporal.hour) {
        adjustment += 0.2;
    }
    if temporal.is_weekend {
        adjustment += 0.1;
    }
    adjustment
}

/// Formula: `pattern_boost(kind) * pattern.confidence`
fn behavioral_adjustment(behavioral: &BehavioralSignal) -> f64 {
    behavioral
        .pattern
        .as_ref()
        .map(|p| pattern_boost(p.kind) * unit(p.confidence))
        .unwrap_or(0.0)
}

pub(crate) fn pattern_boost(kind: PatternKind) -> f64 {
    match kind {
        PatternKind::SocialNight => 0.3,
        PatternKind::Adventure => 0.25,
        PatternKind::Exploration => 0.2,
        PatternKind::Routine | PatternKind::Other => 0.1,
    }
}

/// Clamp a self-reported 0-1 value; NaN counts as 0
fn unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PatternMatch, VenueMatch};
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn snapshot(signals: Vec<Signal>, quality: f64) -> SignalSnapshot {
        let mut sources = BTreeMap::new();
        let mut availability = BTreeMap::new();
        for (i, signal) in signals.into_iter().enumerate() {
            let name = format!("{}-{}", signal.kind().as_str(), i);
            availability.insert(name.clone(), true);
            sources.insert(name, signal);
        }
        SignalSnapshot {
            id: "test".to_string(),
            timestamp: Utc::now(),
            sources,
            quality,
            availability,
        }
    }

    fn temporal(hour: u32, is_weekend: bool) -> Signal {
        Signal::Temporal(TemporalSignal {
            hour,
            is_weekend,
            day_of_week: None,
        })
    }

    #[test]
    fn test_evening_weekday() {
        let s = snapshot(vec![temporal(20, false)], 1.0);
        assert!((EnergyDeriver::snapshot_energy(&s) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_evening_weekend() {
        let s = snapshot(vec![temporal(23, true)], 1.0);
        assert!((EnergyDeriver::snapshot_energy(&s) - 0.6).abs() < 1e-9);

        let morning = snapshot(vec![temporal(9, true)], 1.0);
        assert!((EnergyDeriver::snapshot_energy(&morning) - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_location_with_venue() {
        let s = snapshot(
            vec![Signal::Location(LocationSignal {
                urban_density: 0.5,
                venue: Some(VenueMatch {
                    id: "v1".to_string(),
                    name: None,
                    confidence: 0.5,
                }),
                latitude: None,
                longitude: None,
                accuracy_m: None,
            })],
            1.0,
        );
        // 0.3 + 0.15 + 0.1
        assert!((EnergyDeriver::snapshot_energy(&s) - 0.55).abs() < 1e-9);
    }

    #[test]
    fn test_movement_activities() {
        let energy = |activity| {
            EnergyDeriver::snapshot_energy(&snapshot(
                vec![Signal::Movement(MovementSignal {
                    activity,
                    speed_mps: None,
                })],
                1.0,
            ))
        };
        assert!((energy(MovementActivity::Walking) - 0.5).abs() < 1e-9);
        assert!((energy(MovementActivity::Transit) - 0.4).abs() < 1e-9);
        assert!((energy(MovementActivity::Stationary) - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_pattern_boosts() {
        assert_eq!(pattern_boost(PatternKind::SocialNight), 0.3);
        assert_eq!(pattern_boost(PatternKind::Adventure), 0.25);
        assert_eq!(pattern_boost(PatternKind::Exploration), 0.2);
        assert_eq!(pattern_boost(PatternKind::Other), 0.1);

        let s = snapshot(
            vec![Signal::Behavioral(BehavioralSignal {
                pattern: Some(PatternMatch {
                    kind: PatternKind::SocialNight,
                    confidence: 0.5,
                }),
            })],
            1.0,
        );
        assert!((EnergyDeriver::snapshot_energy(&s) - 0.45).abs() < 1e-9);
    }

    #[test]
    fn test_energy_is_clamped() {
        let s = snapshot(
            vec![
                Signal::Location(LocationSignal {
                    urban_density: 1.0,
                    venue: Some(VenueMatch {
                        id: "club".to_string(),
                        name: Some("Club".to_string()),
                        confidence: 1.0,
                    }),
                    latitude: None,
                    longitude: None,
                    accuracy_m: None,
                }),
                Signal::Movement(MovementSignal {
                    activity: MovementActivity::Walking,
                    speed_mps: Some(1.4),
                }),
                temporal(21, true),
                Signal::Behavioral(BehavioralSignal {
                    pattern: Some(PatternMatch {
                        kind: PatternKind::SocialNight,
                        confidence: 1.0,
                    }),
                }),
            ],
            1.0,
        );
        assert_eq!(EnergyDeriver::snapshot_energy(&s), 1.0);

        // Out-of-range self-reports never push energy outside 0-1
        let wild = snapshot(
            vec![Signal::Location(LocationSignal {
                urban_density: -50.0,
                venue: None,
                latitude: None,
                longitude: None,
                accuracy_m: None,
            })],
            1.0,
        );
        let e = EnergyDeriver::snapshot_energy(&wild);
        assert!((0.0..=1.0).contains(&e));
    }

    #[test]
    fn test_window_energy_weighted_by_quality() {
        let high = snapshot(vec![temporal(20, false)], 1.0); // 0.5
        let low = snapshot(vec![temporal(9, false)], 0.25); // 0.3
        let energy = EnergyDeriver::window_energy(&[&high, &low]);
        // (0.5 * 1.0 + 0.3 * 0.25) / 1.25
        assert!((energy - 0.46).abs() < 1e-9);
    }

    #[test]
    fn test_window_energy_zero_weight_fallback() {
        let s = snapshot(vec![temporal(20, false)], 0.0);
        assert_eq!(EnergyDeriver::window_energy(&[&s]), BASELINE_ENERGY);
        assert_eq!(EnergyDeriver::window_energy(&[]), BASELINE_ENERGY);
    }
}
