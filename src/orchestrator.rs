//! Collection orchestration
//!
//! [`SignalOrchestrator`] owns the collector registry, the snapshot window and the
//! listener list. Each tick it polls every registered collector, folds the readings
//! into a snapshot, recomputes the vibe point and notifies listeners.
//!
//! Tick pipeline:
//! 1. Poll collectors (availability, collect, quality)
//! 2. Discard the tick if nothing contributed
//! 3. Append the snapshot (FIFO eviction past capacity)
//! 4. Derive the vibe point from the recent window and notify listeners
//!
//! The loop reschedules itself a fixed delay after each tick completes, so ticks
//! never overlap.

use crate::clock::{Clock, SystemClock};
use crate::collectors::SignalCollector;
use crate::confidence::ConfidenceScorer;
use crate::config::{CollectionMode, OrchestratorConfig};
use crate::energy::EnergyDeriver;
use crate::error::{CollectorError, VibeError};
use crate::types::{Signal, SignalSnapshot, VibeEngineState, VibePoint};
use crate::window::SnapshotWindow;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use futures::future::join_all;
use futures::FutureExt;
use std::collections::{BTreeMap, BTreeSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Outcome of a listener call
pub type ListenerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

type Listener = Arc<dyn Fn(&VibeEngineState) -> ListenerResult + Send + Sync>;

/// Handle returned by [`SignalOrchestrator::add_listener`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct LoopHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// What one collector yielded during a tick
struct CollectorPoll {
    name: String,
    available: bool,
    contribution: Option<(Signal, f64)>,
}

/// Multi-signal vibe engine
pub struct SignalOrchestrator {
    config: OrchestratorConfig,
    clock: Arc<dyn Clock>,
    collectors: Mutex<Vec<Arc<dyn SignalCollector>>>,
    window: Mutex<SnapshotWindow>,
    listeners: Mutex<Vec<(ListenerId, Listener)>>,
    next_listener_id: AtomicU64,
    last_update: Mutex<Option<DateTime<Utc>>>,
    created_at: DateTime<Utc>,
    tick_lock: tokio::sync::Mutex<()>,
    loop_handle: Mutex<Option<LoopHandle>>,
}

impl Default for SignalOrchestrator {
    fn default() -> Self {
        Self::build(OrchestratorConfig::default(), Arc::new(SystemClock))
    }
}

impl SignalOrchestrator {
    /// Create an orchestrator; the loop does not run until [`start`](Self::start)
    pub fn new(config: OrchestratorConfig, clock: Arc<dyn Clock>) -> Result<Self, VibeError> {
        config.validate()?;
        Ok(Self::build(config, clock))
    }

    fn build(config: OrchestratorConfig, clock: Arc<dyn Clock>) -> Self {
        let created_at = clock.now();
        Self {
            window: Mutex::new(SnapshotWindow::new(config.window_capacity)),
            config,
            clock,
            collectors: Mutex::new(Vec::new()),
            listeners: Mutex::new(Vec::new()),
            next_listener_id: AtomicU64::new(1),
            last_update: Mutex::new(None),
            created_at,
            tick_lock: tokio::sync::Mutex::new(()),
            loop_handle: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Registry
    // ------------------------------------------------------------------

    /// Add a collector, replacing any collector registered under the same name.
    ///
    /// A replacement keeps the original's position in the polling order.
    pub fn register_collector(&self, collector: Arc<dyn SignalCollector>) {
        let name = collector.name().to_string();
        let mut collectors = lock(&self.collectors);
        match collectors.iter_mut().find(|c| c.name() == name) {
            Some(slot) => {
                *slot = collector;
                debug!(collector = %name, "Replaced signal collector");
            }
            None => {
                collectors.push(collector);
                debug!(collector = %name, "Registered signal collector");
            }
        }
    }

    /// Remove a collector by name; returns whether one was registered
    pub fn unregister_collector(&self, name: &str) -> bool {
        let mut collectors = lock(&self.collectors);
        let before = collectors.len();
        collectors.retain(|c| c.name() != name);
        let removed = collectors.len() != before;
        if removed {
            debug!(collector = %name, "Unregistered signal collector");
        }
        removed
    }

    /// Registered collector names in polling order
    pub fn collector_names(&self) -> Vec<String> {
        lock(&self.collectors)
            .iter()
            .map(|c| c.name().to_string())
            .collect()
    }

    fn registered(&self) -> Vec<Arc<dyn SignalCollector>> {
        lock(&self.collectors).clone()
    }

    // ------------------------------------------------------------------
    // Listeners
    // ------------------------------------------------------------------

    /// Subscribe to state updates. Listener failures are logged and never
    /// affect other listeners or the loop.
    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&VibeEngineState) -> ListenerResult + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_listener_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.listeners).push((id, Arc::new(listener)));
        id
    }

    /// Unsubscribe; returns whether the listener was present
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = lock(&self.listeners);
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    fn notify(&self, state: &VibeEngineState) {
        let listeners: Vec<(ListenerId, Listener)> = lock(&self.listeners).clone();
        for (id, listener) in listeners {
            match catch_unwind(AssertUnwindSafe(|| listener(state))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(listener = id.0, error = %e, "Vibe listener failed"),
                Err(_) => error!(listener = id.0, "Vibe listener panicked"),
            }
        }
    }

    // ------------------------------------------------------------------
    // Derived views
    // ------------------------------------------------------------------

    /// Vibe point from the current window; never triggers collection
    pub fn get_vibe_point(&self) -> VibePoint {
        let now = self.clock.now();
        let window = lock(&self.window);
        derive_vibe_point(&window, now, self.config.recent_window())
    }

    /// Full engine state
    pub fn get_state(&self) -> VibeEngineState {
        let now = self.clock.now();
        let (current_vibe, recent_snapshots) = {
            let window = lock(&self.window);
            (
                derive_vibe_point(&window, now, self.config.recent_window()),
                window.last_n(self.config.recent_snapshot_count),
            )
        };
        let last_update = lock(&self.last_update).unwrap_or(self.created_at);

        VibeEngineState {
            current_vibe,
            recent_snapshots,
            signal_health: self.signal_health(),
            last_update,
        }
    }

    /// Current quality per registered collector; unavailable or failing collectors report 0
    pub fn signal_health(&self) -> BTreeMap<String, f64> {
        self.registered()
            .iter()
            .map(|collector| {
                let name = collector.name().to_string();
                let reported = catch_unwind(AssertUnwindSafe(|| {
                    if collector.is_available() {
                        collector.quality().map(sanitize_quality).unwrap_or(0.0)
                    } else {
                        0.0
                    }
                }));
                let health = reported.unwrap_or_else(|_| {
                    warn!(collector = %name, "Signal collector panicked while reporting health");
                    0.0
                });
                (name, health)
            })
            .collect()
    }

    /// Number of snapshots held in the window
    pub fn window_len(&self) -> usize {
        lock(&self.window).len()
    }

    /// Serialize the snapshot window for diagnostics or replay
    pub fn export_window(&self) -> Result<String, VibeError> {
        Ok(lock(&self.window).to_json()?)
    }

    /// Replace the snapshot window, re-bounding it to the configured capacity.
    ///
    /// Fails without touching the current window if any snapshot is malformed.
    pub fn import_window(&self, json: &str) -> Result<(), VibeError> {
        let imported = SnapshotWindow::from_json(json)?;
        imported.validate()?;
        let imported = imported.with_capacity_limit(self.config.window_capacity);
        let latest = imported.latest().map(|s| s.timestamp);
        *lock(&self.window) = imported;
        if let Some(t) = latest {
            *lock(&self.last_update) = Some(t);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Collection
    // ------------------------------------------------------------------

    /// Run one collection tick.
    ///
    /// Serialized with the background loop. Returns the new state, or `None`
    /// when no collector contributed and the tick was discarded.
    pub async fn collect_now(&self) -> Option<VibeEngineState> {
        let _tick = self.tick_lock.lock().await;

        let collectors = self.registered();
        let polls = self.poll_collectors(&collectors).await;
        let now = self.clock.now();

        let snapshot = match build_snapshot(polls, now) {
            Some(snapshot) => snapshot,
            None => {
                debug!(collectors = collectors.len(), "No signal data this tick; discarded");
                return None;
            }
        };

        debug!(
            sources = snapshot.sources.len(),
            quality = snapshot.quality,
            "Snapshot collected"
        );

        {
            let mut window = lock(&self.window);
            let evicted = window.push(snapshot);
            if evicted > 0 {
                debug!(evicted, "Evicted oldest snapshots");
            }
        }
        *lock(&self.last_update) = Some(now);

        let state = self.get_state();
        self.notify(&state);
        Some(state)
    }

    async fn poll_collectors(&self, collectors: &[Arc<dyn SignalCollector>]) -> Vec<CollectorPoll> {
        let timeout = self.config.collector_timeout();
        match self.config.collection_mode {
            CollectionMode::Sequential => {
                let mut polls = Vec::with_capacity(collectors.len());
                for collector in collectors {
                    polls.push(poll_collector(collector.as_ref(), timeout).await);
                }
                polls
            }
            CollectionMode::Concurrent => {
                join_all(
                    collectors
                        .iter()
                        .map(|collector| poll_collector(collector.as_ref(), timeout)),
                )
                .await
            }
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Start the background collection loop on the current tokio runtime.
    ///
    /// The first tick runs immediately. The loop ends on [`stop`](Self::stop) or
    /// once every other reference to the orchestrator is dropped.
    pub fn start(self: &Arc<Self>) -> Result<(), VibeError> {
        let mut handle = lock(&self.loop_handle);
        if handle.as_ref().is_some_and(|h| !h.task.is_finished()) {
            return Err(VibeError::AlreadyRunning);
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|_| VibeError::NoRuntime)?;
        let cancel = CancellationToken::new();
        let task = runtime.spawn(run_loop(
            Arc::downgrade(self),
            cancel.clone(),
            self.config.interval(),
        ));
        *handle = Some(LoopHandle { cancel, task });

        info!(
            interval_ms = self.config.interval_ms,
            window_capacity = self.config.window_capacity,
            "Vibe collection loop started"
        );
        Ok(())
    }

    /// Stop the loop, aborting an in-flight tick. Returns whether it was running.
    pub async fn stop(&self) -> bool {
        let handle = lock(&self.loop_handle).take();
        let Some(LoopHandle { cancel, task }) = handle else {
            return false;
        };

        cancel.cancel();
        if let Err(e) = task.await {
            warn!(error = %e, "Vibe collection loop ended abnormally");
        }
        info!("Vibe collection loop stopped");
        true
    }

    pub fn is_running(&self) -> bool {
        lock(&self.loop_handle)
            .as_ref()
            .is_some_and(|h| !h.task.is_finished())
    }
}

async fn run_loop(engine: Weak<SignalOrchestrator>, cancel: CancellationToken, interval: Duration) {
    loop {
        let Some(this) = engine.upgrade() else {
            debug!("Orchestrator dropped; ending collection loop");
            break;
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = this.collect_now() => {}
        }
        drop(this);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

/// Poll one collector; a panic inside it only costs that collector this tick
async fn poll_collector(collector: &dyn SignalCollector, timeout: Option<Duration>) -> CollectorPoll {
    let name = collector.name().to_string();
    match AssertUnwindSafe(poll_guarded(collector, name.clone(), timeout))
        .catch_unwind()
        .await
    {
        Ok(poll) => poll,
        Err(_) => {
            warn!(collector = %name, "Signal collector panicked; skipping collector this tick");
            CollectorPoll {
                name,
                available: false,
                contribution: None,
            }
        }
    }
}

async fn poll_guarded(
    collector: &dyn SignalCollector,
    name: String,
    timeout: Option<Duration>,
) -> CollectorPoll {
    if !collector.is_available() {
        return CollectorPoll {
            name,
            available: false,
            contribution: None,
        };
    }

    let outcome = match timeout {
        Some(limit) => match tokio::time::timeout(limit, collector.collect()).await {
            Ok(result) => result,
            Err(_) => Err(CollectorError::Timeout(limit.as_millis() as u64)),
        },
        None => collector.collect().await,
    };

    let signal = match outcome {
        Ok(Some(signal)) => signal,
        Ok(None) => {
            return CollectorPoll {
                name,
                available: true,
                contribution: None,
            }
        }
        Err(e) => {
            match &e {
                CollectorError::Unavailable(_) => {
                    debug!(collector = %name, error = %e, "Signal collector reported unavailable")
                }
                _ => {
                    warn!(collector = %name, error = %e, "Signal collection failed; skipping collector this tick")
                }
            }
            return CollectorPoll {
                name,
                available: false,
                contribution: None,
            };
        }
    };

    match collector.quality() {
        Ok(quality) => CollectorPoll {
            name,
            available: true,
            contribution: Some((signal, sanitize_quality(quality))),
        },
        Err(e) => {
            warn!(collector = %name, error = %e, "Collector quality unavailable; skipping collector this tick");
            CollectorPoll {
                name,
                available: false,
                contribution: None,
            }
        }
    }
}

/// Fold one tick's polls into a snapshot; `None` when nothing usable was collected
fn build_snapshot(polls: Vec<CollectorPoll>, now: DateTime<Utc>) -> Option<SignalSnapshot> {
    let mut availability = BTreeMap::new();
    let mut sources = BTreeMap::new();
    let mut quality_sum = 0.0;

    for poll in polls {
        availability.insert(poll.name.clone(), poll.available);
        if let Some((signal, quality)) = poll.contribution {
            quality_sum += quality;
            sources.insert(poll.name, signal);
        }
    }

    if sources.is_empty() {
        return None;
    }

    let quality = quality_sum / sources.len() as f64;
    if quality <= 0.0 {
        return None;
    }

    Some(SignalSnapshot {
        id: Uuid::new_v4().to_string(),
        timestamp: now,
        sources,
        quality,
        availability,
    })
}

/// Vibe point from the snapshots in `window` no older than `horizon`
pub fn derive_vibe_point(
    window: &SnapshotWindow,
    now: DateTime<Utc>,
    horizon: ChronoDuration,
) -> VibePoint {
    let recent = window.recent(now, horizon);
    if recent.is_empty() {
        return VibePoint::baseline(now);
    }

    let energy = EnergyDeriver::window_energy(&recent);
    let confidence = ConfidenceScorer::score(&recent).confidence;
    let sources: BTreeSet<&str> = recent
        .iter()
        .flat_map(|s| s.sources.keys().map(String::as_str))
        .collect();

    VibePoint {
        t: now,
        energy,
        confidence,
        sources: sources.into_iter().map(str::to_string).collect(),
    }
}

/// Clamp self-reported quality to 0-1; NaN counts as 0
fn sanitize_quality(quality: f64) -> f64 {
    if quality.is_nan() {
        0.0
    } else {
        quality.clamp(0.0, 1.0)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
