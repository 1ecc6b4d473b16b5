//! Floq Vibe - On-device multi-signal vibe confidence engine
//!
//! The engine polls independent, intermittently available signal collectors on a
//! fixed-delay cadence and keeps a confidence-scored estimate of current energy:
//! collector polling → snapshot → rolling window → energy + confidence → listeners.
//!
//! ## Modules
//!
//! - **Orchestrator**: collection loop, snapshot window, listener fan-out
//! - **Collectors**: the collector contract plus temporal and replay sources
//! - **Energy / Confidence**: aggregation over the recent window

pub mod clock;
pub mod collectors;
pub mod confidence;
pub mod config;
pub mod encoder;
pub mod energy;
pub mod error;
pub mod orchestrator;
pub mod types;
pub mod window;

pub use clock::{Clock, ManualClock, SystemClock};
pub use collectors::{FeedReading, ReplayCollector, SignalCollector, TemporalCollector};
pub use config::{CollectionMode, OrchestratorConfig};
pub use encoder::StateEncoder;
pub use error::{CollectorError, VibeError};
pub use orchestrator::{derive_vibe_point, ListenerId, ListenerResult, SignalOrchestrator};
pub use types::{Signal, SignalKind, SignalSnapshot, VibeEngineState, VibePoint};
pub use window::SnapshotWindow;

/// Engine version embedded in encoded output
pub const VIBE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for encoded output
pub const PRODUCER_NAME: &str = "floq-vibe";
