//! Time-of-day collector
//!
//! Reads the injected clock and reports local hour and weekend status.

use crate::clock::Clock;
use crate::error::CollectorError;
use crate::types::{Signal, TemporalSignal};
use async_trait::async_trait;
use chrono::{Datelike, FixedOffset, Timelike, Weekday};
use std::sync::Arc;

use super::SignalCollector;

/// Temporal collector backed by a [`Clock`]
pub struct TemporalCollector {
    name: String,
    clock: Arc<dyn Clock>,
    offset: FixedOffset,
}

impl TemporalCollector {
    /// Collector named `temporal` reporting local time at `offset`
    pub fn new(clock: Arc<dyn Clock>, offset: FixedOffset) -> Self {
        Self::with_name("temporal", clock, offset)
    }

    pub fn with_name(name: impl Into<String>, clock: Arc<dyn Clock>, offset: FixedOffset) -> Self {
        Self {
            name: name.into(),
            clock,
            offset,
        }
    }

    /// Current reading without going through the async contract
    pub fn read(&self) -> TemporalSignal {
        let local = self.clock.now().with_timezone(&self.offset);
        let weekday = local.weekday();
        TemporalSignal {
            hour: local.hour(),
            is_weekend: matches!(weekday, Weekday::Sat | Weekday::Sun),
            day_of_week: Some(weekday.num_days_from_monday()),
        }
    }
}

#[async_trait]
impl SignalCollector for TemporalCollector {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn collect(&self) -> Result<Option<Signal>, CollectorError> {
        Ok(Some(Signal::Temporal(self.read())))
    }

    fn quality(&self) -> Result<f64, CollectorError> {
        Ok(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn test_local_hour_and_weekend() {
        // Saturday 2024-01-20 02:00 UTC is Friday 21:00 in UTC-5
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 20, 2, 0, 0).unwrap());
        let offset = FixedOffset::west_opt(5 * 3600).unwrap();
        let collector = TemporalCollector::new(Arc::new(clock.clone()), offset);

        let reading = collector.read();
        assert_eq!(reading.hour, 21);
        assert!(!reading.is_weekend);
        assert_eq!(reading.day_of_week, Some(4));

        clock.advance(chrono::Duration::hours(6));
        match collector.collect().await.unwrap() {
            Some(Signal::Temporal(t)) => {
                assert_eq!(t.hour, 3);
                assert!(t.is_weekend);
            }
            other => panic!("unexpected reading: {:?}", other),
        }
        assert_eq!(collector.quality(), Ok(1.0));
    }
}
