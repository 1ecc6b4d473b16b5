//! Signal collectors
//!
//! A collector produces point-in-time readings for one modality. Collectors are
//! supplied by the host application (geolocation, motion sensors, learned
//! patterns); this module defines the contract and a few built-in sources.

mod replay;
mod temporal;

pub use replay::{FeedReading, ReplayCollector};
pub use temporal::TemporalCollector;

use crate::error::CollectorError;
use crate::types::Signal;
use async_trait::async_trait;

/// Contract every signal source implements to take part in collection
#[async_trait]
pub trait SignalCollector: Send + Sync {
    /// Stable identifier; registering another collector under the same name replaces this one
    fn name(&self) -> &str;

    /// Whether a reading can currently be produced (permission granted, sensor present)
    fn is_available(&self) -> bool;

    /// Produce a reading
    ///
    /// # Returns
    /// * `Ok(Some(signal))` - reading for this tick
    /// * `Ok(None)` - nothing to report right now
    /// * `Err(_)` - collection failed (logged, collector skipped for the tick)
    async fn collect(&self) -> Result<Option<Signal>, CollectorError>;

    /// Self-assessed reliability (0-1) of the most recent reading
    fn quality(&self) -> Result<f64, CollectorError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BehavioralSignal, SignalKind};

    struct DummyCollector;

    #[async_trait]
    impl SignalCollector for DummyCollector {
        fn name(&self) -> &str {
            "dummy"
        }

        fn is_available(&self) -> bool {
            true
        }

        async fn collect(&self) -> Result<Option<Signal>, CollectorError> {
            Ok(Some(Signal::Behavioral(BehavioralSignal { pattern: None })))
        }

        fn quality(&self) -> Result<f64, CollectorError> {
            Ok(0.5)
        }
    }

    #[tokio::test]
    async fn test_trait_object_usage() {
        let collector: Box<dyn SignalCollector> = Box::new(DummyCollector);
        assert_eq!(collector.name(), "dummy");
        let signal = collector.collect().await.unwrap().unwrap();
        assert_eq!(signal.kind(), SignalKind::Behavioral);
        assert_eq!(collector.quality(), Ok(0.5));
    }
}
