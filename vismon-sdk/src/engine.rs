//! The monitoring engine.

use std::collections::BTreeMap;
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use vismon_types::{
    ChangeEvent, ObjectSnapshot, PhaseStats, PhaseTimingResult, ProjectSummary, Snapshot,
    DEFAULT_PROJECT,
};

use crate::config::EngineConfig;
use crate::discovery::DiscoveryProvider;
use crate::error::{ConfigError, ExportError};
use crate::export::write_timings_csv;
use crate::history::RollingBuffer;
use crate::listener::{Dispatcher, EngineListener};
use crate::monitor::{MonitorHooks, ObjectMonitor, PollOutcome};
use crate::output::Output;
use crate::phase::PhaseTimer;
use crate::registry::Registry;
use crate::trackable::{ObjectKey, TrackOptions, Trackable};

/// Engine-assigned identifier of a monitored object. Starts at 1.
pub type ObjectId = u64;

/// Most recent change events carried in each [`Snapshot`].
pub const SNAPSHOT_RECENT_CHANGES: usize = 100;

/// The entry point for monitoring live objects.
///
/// An engine keeps a registry of tracked objects grouped into projects,
/// detects field changes on them, collects phase timings, and keeps bounded
/// histories of both. Construct one explicitly and share it (for example in
/// an `Arc`); there is no global instance.
///
/// Inside a tokio runtime each monitor polls on a background task. Outside
/// one, call [`poll_now`](Self::poll_now) and
/// [`discover_now`](Self::discover_now) to drive detection.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use parking_lot::RwLock;
/// use vismon_sdk::{Engine, FieldError, FieldValue, TrackOptions, Trackable};
///
/// struct Scheduler {
///     state: RwLock<&'static str>,
/// }
///
/// impl Trackable for Scheduler {
///     fn fields(&self) -> Vec<String> {
///         vec!["State".into()]
///     }
///     fn read_field(&self, name: &str) -> Result<FieldValue, FieldError> {
///         match name {
///             "State" => Ok((*self.state.read()).into()),
///             other => Err(FieldError::unknown(other)),
///         }
///     }
/// }
///
/// let engine = Engine::new();
/// let scheduler = Arc::new(Scheduler { state: RwLock::new("Idle") });
/// engine.register_object(&scheduler, TrackOptions::new().project("Core"));
///
/// *scheduler.state.write() = "Running";
/// assert_eq!(engine.poll_now(), 1);
///
/// let change = &engine.change_history(Some("Core"))[0];
/// assert_eq!(change.new_value, FieldValue::from("Running"));
///
/// {
///     let _timer = engine.start_phase("startup", "Scheduler", "Core");
///     // ... work ...
/// }
/// assert!(engine.average_timings(Some("Core")).contains_key("startup"));
/// ```
#[derive(Debug)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

/// A finished timing tagged with the order its timer was started in.
#[derive(Debug, Clone)]
struct RecordedTiming {
    started: u64,
    result: PhaseTimingResult,
}

struct EngineInner {
    config: EngineConfig,
    registry: Registry,
    next_id: AtomicU64,
    changes: RollingBuffer<ChangeEvent>,
    timings: RollingBuffer<RecordedTiming>,
    next_phase: AtomicU64,
    dispatcher: Dispatcher,
    providers: RwLock<Vec<Arc<dyn DiscoveryProvider>>>,
    discovery_lock: Mutex<()>,
    outputs: Arc<Vec<Output>>,
    #[cfg(feature = "tokio")]
    runtime: Option<tokio::runtime::Handle>,
    #[cfg(feature = "tokio")]
    background: Mutex<Option<tokio::sync::watch::Sender<bool>>>,
    shut_down: AtomicBool,
}

impl Engine {
    /// Create an engine with default settings and no outputs.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Create a builder for configuring the engine.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Create an engine from a validated configuration.
    pub fn from_config(config: &EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::builder().config(config.clone()).build())
    }

    /// Settings in effect.
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Track an object with default options.
    pub fn register<T: Trackable>(&self, object: &Arc<T>) -> Option<ObjectId> {
        self.register_object(object, TrackOptions::default())
    }

    /// Track an object.
    ///
    /// Registering an object that is already tracked replaces its monitor.
    /// Returns `None` once the engine has shut down.
    pub fn register_object<T: Trackable>(
        &self,
        object: &Arc<T>,
        options: TrackOptions,
    ) -> Option<ObjectId> {
        let erased: Arc<dyn Trackable> = object.clone();
        self.inner.register(&erased, options)
    }

    /// Track an already type-erased object.
    pub fn register_dyn(
        &self,
        object: &Arc<dyn Trackable>,
        options: TrackOptions,
    ) -> Option<ObjectId> {
        self.inner.register(object, options)
    }

    /// Stop tracking an object. Returns `false` if it was not tracked.
    pub fn unregister_object<T: ?Sized>(&self, object: &Arc<T>) -> bool {
        let Some(monitor) = self.inner.registry.remove(ObjectKey::of(object)) else {
            return false;
        };
        monitor.dispose();
        tracing::debug!(
            object = %monitor.name(),
            project = %monitor.project(),
            id = monitor.id(),
            "unregistered object"
        );
        true
    }

    /// Whether an object is currently tracked.
    pub fn is_registered<T: ?Sized>(&self, object: &Arc<T>) -> bool {
        self.inner.registry.contains(ObjectKey::of(object))
    }

    /// Number of tracked objects.
    pub fn len(&self) -> usize {
        self.inner.registry.len()
    }

    /// True when nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of every tracked object's observed state, ordered by id.
    pub fn monitored_objects(&self) -> Vec<ObjectSnapshot> {
        self.inner
            .registry
            .monitors()
            .iter()
            .map(|m| m.snapshot())
            .collect()
    }

    /// Every project ever used, ordered by name. Projects persist when empty.
    pub fn projects(&self) -> Vec<ProjectSummary> {
        self.inner.registry.project_summaries()
    }

    /// Start timing a phase. The result is recorded when the timer drops.
    pub fn start_phase(
        &self,
        phase: impl Into<String>,
        component: impl Into<String>,
        project: impl Into<String>,
    ) -> PhaseTimer {
        let weak = Arc::downgrade(&self.inner);
        let started = self.inner.next_phase.fetch_add(1, Ordering::Relaxed);
        PhaseTimer::new(phase, component, project, move |result| {
            if let Some(inner) = weak.upgrade() {
                inner.record_timing(started, result);
            }
        })
    }

    /// Start timing a phase in the default project.
    pub fn start_phase_default(
        &self,
        phase: impl Into<String>,
        component: impl Into<String>,
    ) -> PhaseTimer {
        self.start_phase(phase, component, DEFAULT_PROJECT)
    }

    /// Retained timings matching the filters, most recent start first.
    ///
    /// Ordered by when each timer was started rather than by `start_ms`,
    /// which is whole milliseconds: an inner timer is listed before the
    /// outer one enclosing it even when both started in the same millisecond.
    pub fn timing_history(
        &self,
        project: Option<&str>,
        phase: Option<&str>,
    ) -> Vec<PhaseTimingResult> {
        let mut timings = self.inner.recorded_timings(project, phase);
        timings.sort_by(|a, b| b.started.cmp(&a.started));
        timings.into_iter().map(|t| t.result).collect()
    }

    /// Per-phase statistics over the retained timings of a project (or of
    /// every project). An unknown project yields an empty map.
    pub fn average_timings(&self, project: Option<&str>) -> BTreeMap<String, PhaseStats> {
        self.inner.phase_stats(project)
    }

    /// Retained change events, oldest first.
    pub fn change_history(&self, project: Option<&str>) -> Vec<ChangeEvent> {
        match project {
            Some(p) => self.inner.changes.filtered(|e| e.project == p),
            None => self.inner.changes.to_vec(),
        }
    }

    /// Forget every retained change event and timing.
    pub fn clear_history(&self) {
        self.inner.changes.clear();
        self.inner.timings.clear();
    }

    /// Receive change events and timings as they happen.
    pub fn subscribe(&self, listener: Arc<dyn EngineListener>) {
        self.inner.dispatcher.subscribe(listener);
    }

    /// Run one diff pass over every monitor on the calling thread.
    ///
    /// Returns the number of change events emitted. Monitors whose object
    /// has been dropped are unregistered.
    pub fn poll_now(&self) -> usize {
        self.inner.poll_all()
    }

    /// Add a discovery provider, scanned by [`discover_now`](Self::discover_now)
    /// and by the background task.
    pub fn add_provider(&self, provider: Arc<dyn DiscoveryProvider>) {
        self.inner.providers.write().push(provider);
    }

    /// Scan every provider once and register the opted-in objects that are
    /// not tracked yet. Returns how many were registered.
    pub fn discover_now(&self) -> usize {
        self.inner.discover()
    }

    /// Collect a snapshot of everything the engine tracks.
    pub fn collect(&self) -> Snapshot {
        self.inner.collect()
    }

    /// Write retained timings as comma-separated text, oldest first.
    pub fn export_timings<W: Write>(
        &self,
        writer: W,
        project: Option<&str>,
        phase: Option<&str>,
    ) -> Result<usize, ExportError> {
        let timings = self.inner.filtered_timings(project, phase);
        write_timings_csv(writer, &timings)
    }

    /// Start the background task that runs discovery and emits snapshots
    /// to every output each `discovery_interval`.
    ///
    /// Each tick also unregisters monitors whose object has been dropped,
    /// which is how [`Detection::Notify`](crate::Detection::Notify) monitors
    /// expire.
    ///
    /// Returns `false` when there is no runtime to run on, or the engine
    /// has shut down. Starting twice is a no-op.
    #[cfg(feature = "tokio")]
    pub fn start(&self) -> bool {
        use tokio::sync::watch;

        let Some(runtime) = self.inner.runtime.as_ref() else {
            tracing::warn!("no tokio runtime available, background discovery not started");
            return false;
        };
        if self.inner.is_shut_down() {
            return false;
        }
        let mut background = self.inner.background.lock();
        if background.is_some() {
            return true;
        }

        let (stop_tx, mut stop_rx) = watch::channel(false);
        *background = Some(stop_tx);
        let weak = Arc::downgrade(&self.inner);
        let outputs = Arc::clone(&self.inner.outputs);
        let period = self.inner.config.discovery_interval;

        runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let snapshot = {
                            let Some(inner) = weak.upgrade() else { break };
                            inner.sweep_expired();
                            inner.discover();
                            inner.collect()
                        };
                        emit_all(&outputs, &snapshot).await;
                    }
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }
        });

        tracing::info!(
            interval_ms = period.as_millis() as u64,
            outputs = self.inner.outputs.len(),
            "background discovery started"
        );
        true
    }

    /// Emit a snapshot to all outputs immediately.
    #[cfg(feature = "tokio")]
    pub async fn emit_now(&self) {
        let snapshot = self.inner.collect();
        emit_all(&self.inner.outputs, &snapshot).await;
    }

    /// Stop background work, dispose every monitor and clear the registry.
    ///
    /// Idempotent. Projects and histories stay readable; later
    /// registrations are ignored.
    pub fn shutdown(&self) {
        self.inner.shutdown();
    }

    /// Whether [`shutdown`](Self::shutdown) has run.
    pub fn is_shut_down(&self) -> bool {
        self.inner.is_shut_down()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.inner.shutdown();
    }
}

#[cfg(feature = "tokio")]
async fn emit_all(outputs: &[Output], snapshot: &Snapshot) {
    for output in outputs {
        if let Err(e) = output.emit(snapshot).await {
            tracing::warn!(output = %output.describe(), error = %e, "snapshot emission failed");
        }
    }
}

impl EngineInner {
    fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    fn hooks(self: &Arc<Self>) -> MonitorHooks {
        let on_change = {
            let weak = Arc::downgrade(self);
            Arc::new(move |event: ChangeEvent| {
                if let Some(inner) = weak.upgrade() {
                    inner.record_change(event);
                }
            })
        };
        let on_expired = {
            let weak = Arc::downgrade(self);
            Arc::new(move |monitor: &ObjectMonitor| {
                if let Some(inner) = weak.upgrade() {
                    inner.expire(monitor);
                }
            })
        };
        MonitorHooks {
            on_change,
            on_expired,
        }
    }

    fn register(self: &Arc<Self>, object: &Arc<dyn Trackable>, options: TrackOptions) -> Option<ObjectId> {
        if self.is_shut_down() {
            tracing::debug!(type_name = object.type_name(), "engine shut down, registration ignored");
            return None;
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "tokio")]
        let poll_interval = options
            .poll_interval
            .filter(|d| !d.is_zero())
            .unwrap_or(self.config.poll_interval);

        let monitor = ObjectMonitor::new(id, object, options, self.hooks());
        monitor.activate(object);
        if let Some(previous) = self.registry.insert(Arc::clone(&monitor)) {
            previous.dispose();
            tracing::debug!(object = %monitor.name(), old_id = previous.id(), "replaced existing monitor");
        }
        #[cfg(feature = "tokio")]
        if let Some(runtime) = &self.runtime {
            monitor.spawn_poller(runtime, poll_interval);
        }

        // Lost a race with shutdown: undo.
        if self.is_shut_down() {
            if let Some(stale) = self.registry.remove_if_id(monitor.key(), id) {
                stale.dispose();
            }
            return None;
        }

        tracing::debug!(
            object = %monitor.name(),
            project = %monitor.project(),
            id,
            "registered object"
        );
        Some(id)
    }

    fn record_change(&self, event: ChangeEvent) {
        self.registry.touch(&event.project, event.timestamp_ms);
        self.changes.push(event.clone());
        self.dispatcher.change(&event);
    }

    fn record_timing(&self, started: u64, result: PhaseTimingResult) {
        self.timings.push(RecordedTiming {
            started,
            result: result.clone(),
        });
        self.dispatcher.timing(&result);
    }

    fn expire(&self, monitor: &ObjectMonitor) {
        if let Some(stale) = self.registry.remove_if_id(monitor.key(), monitor.id()) {
            stale.dispose();
            tracing::info!(
                object = %stale.name(),
                project = %stale.project(),
                id = stale.id(),
                "tracked object dropped, unregistered"
            );
        }
    }

    /// Unregister every monitor whose object is gone without diffing it.
    fn sweep_expired(&self) -> usize {
        let mut expired = 0;
        for monitor in self.registry.monitors() {
            if !monitor.is_target_alive() {
                self.expire(&monitor);
                expired += 1;
            }
        }
        expired
    }

    fn poll_all(&self) -> usize {
        let mut emitted = 0;
        for monitor in self.registry.monitors() {
            match monitor.poll() {
                PollOutcome::Changed(n) => emitted += n,
                PollOutcome::TargetDropped => self.expire(&monitor),
                PollOutcome::Unchanged | PollOutcome::Disposed => {}
            }
        }
        emitted
    }

    fn discover(self: &Arc<Self>) -> usize {
        if self.is_shut_down() {
            return 0;
        }
        let _scan = self.discovery_lock.lock();
        let providers: Vec<_> = self.providers.read().clone();

        let mut registered = 0;
        for provider in providers {
            let found = match provider.discover() {
                Ok(found) => found,
                Err(e) => {
                    tracing::warn!(provider = provider.name(), error = %e, "discovery failed");
                    continue;
                }
            };
            for candidate in found {
                if !candidate.marker.auto_track
                    || self.registry.contains(ObjectKey::of(&candidate.object))
                {
                    continue;
                }
                if self
                    .register(&candidate.object, candidate.marker.to_options())
                    .is_some()
                {
                    registered += 1;
                }
            }
        }
        if registered > 0 {
            tracing::debug!(registered, "discovery registered new objects");
        }
        registered
    }

    fn recorded_timings(&self, project: Option<&str>, phase: Option<&str>) -> Vec<RecordedTiming> {
        self.timings.filtered(|t| {
            project.map_or(true, |p| t.result.project == p)
                && phase.map_or(true, |ph| t.result.phase == ph)
        })
    }

    fn filtered_timings(&self, project: Option<&str>, phase: Option<&str>) -> Vec<PhaseTimingResult> {
        self.recorded_timings(project, phase)
            .into_iter()
            .map(|t| t.result)
            .collect()
    }

    fn phase_stats(&self, project: Option<&str>) -> BTreeMap<String, PhaseStats> {
        let mut by_phase: BTreeMap<String, Vec<_>> = BTreeMap::new();
        for t in self.filtered_timings(project, None) {
            by_phase.entry(t.phase).or_default().push(t.duration);
        }
        by_phase
            .into_iter()
            .filter_map(|(phase, samples)| PhaseStats::from_samples(samples).map(|s| (phase, s)))
            .collect()
    }

    fn collect(&self) -> Snapshot {
        let mut builder = Snapshot::builder();
        for monitor in self.registry.monitors() {
            builder = builder.object(monitor.snapshot());
        }
        for summary in self.registry.project_summaries() {
            builder = builder.project(summary);
        }
        let changes = self.changes.to_vec();
        let skip = changes.len().saturating_sub(SNAPSHOT_RECENT_CHANGES);
        for event in changes.into_iter().skip(skip) {
            builder = builder.change(event);
        }
        for (phase, stats) in self.phase_stats(None) {
            builder = builder.phase(phase, stats);
        }
        builder.build()
    }

    fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        #[cfg(feature = "tokio")]
        if let Some(stop_tx) = self.background.lock().take() {
            let _ = stop_tx.send(true);
        }
        let monitors = self.registry.drain();
        for monitor in &monitors {
            monitor.dispose();
        }
        tracing::info!(disposed = monitors.len(), "engine shut down");
    }
}

impl std::fmt::Debug for EngineInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineInner")
            .field("config", &self.config)
            .field("objects", &self.registry.len())
            .field("changes", &self.changes.len())
            .field("timings", &self.timings.len())
            .field("listeners", &self.dispatcher)
            .field("outputs", &self.outputs.len())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

/// Builder for configuring an [`Engine`].
#[derive(Default)]
pub struct EngineBuilder {
    config: EngineConfig,
    outputs: Vec<Output>,
    listeners: Vec<Arc<dyn EngineListener>>,
    providers: Vec<Arc<dyn DiscoveryProvider>>,
    #[cfg(feature = "tokio")]
    runtime: Option<tokio::runtime::Handle>,
}

impl EngineBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every setting at once.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Default poll interval for monitors.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Interval of background discovery and snapshot emission.
    pub fn discovery_interval(mut self, interval: Duration) -> Self {
        self.config.discovery_interval = interval;
        self
    }

    /// Capacity of the change-event history.
    pub fn change_history(mut self, capacity: usize) -> Self {
        self.config.change_history = capacity;
        self
    }

    /// Capacity of the timing history.
    pub fn timing_history(mut self, capacity: usize) -> Self {
        self.config.timing_history = capacity;
        self
    }

    /// Add an output destination.
    ///
    /// Multiple outputs can be added; snapshots will be emitted to all of them.
    pub fn output(mut self, output: Output) -> Self {
        self.outputs.push(output);
        self
    }

    /// Subscribe a listener from the start.
    pub fn listener(mut self, listener: Arc<dyn EngineListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Add a discovery provider.
    pub fn provider(mut self, provider: Arc<dyn DiscoveryProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Run background tasks on this runtime instead of the ambient one.
    #[cfg(feature = "tokio")]
    pub fn runtime(mut self, handle: tokio::runtime::Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// Build the engine.
    ///
    /// Zero intervals fall back to their defaults; zero capacities hold one
    /// entry. Use [`Engine::from_config`] to reject them instead.
    pub fn build(self) -> Engine {
        let mut config = self.config;
        let defaults = EngineConfig::default();
        if config.poll_interval.is_zero() {
            tracing::warn!("poll_interval is zero, using default");
            config.poll_interval = defaults.poll_interval;
        }
        if config.discovery_interval.is_zero() {
            tracing::warn!("discovery_interval is zero, using default");
            config.discovery_interval = defaults.discovery_interval;
        }

        let dispatcher = Dispatcher::default();
        for listener in self.listeners {
            dispatcher.subscribe(listener);
        }

        Engine {
            inner: Arc::new(EngineInner {
                registry: Registry::default(),
                next_id: AtomicU64::new(1),
                changes: RollingBuffer::new(config.change_history),
                timings: RollingBuffer::new(config.timing_history),
                next_phase: AtomicU64::new(0),
                dispatcher,
                providers: RwLock::new(self.providers),
                discovery_lock: Mutex::new(()),
                outputs: Arc::new(self.outputs),
                #[cfg(feature = "tokio")]
                runtime: self
                    .runtime
                    .or_else(|| tokio::runtime::Handle::try_current().ok()),
                #[cfg(feature = "tokio")]
                background: Mutex::new(None),
                shut_down: AtomicBool::new(false),
                config,
            }),
        }
    }
}

impl std::fmt::Debug for EngineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineBuilder")
            .field("config", &self.config)
            .field("outputs", &self.outputs)
            .field("listeners", &self.listeners.len())
            .field("providers", &self.providers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::{FnProvider, SingletonRegistry, TrackMarker};
    use crate::error::{DiscoveryError, FieldError};
    use crate::listener::CollectingListener;
    use crate::trackable::Detection;
    use std::thread;
    use vismon_types::FieldValue;

    struct Service {
        state: RwLock<String>,
    }

    impl Service {
        fn new(state: &str) -> Arc<Self> {
            Arc::new(Self {
                state: RwLock::new(state.to_string()),
            })
        }

        fn set(&self, state: &str) {
            *self.state.write() = state.to_string();
        }
    }

    impl Trackable for Service {
        fn fields(&self) -> Vec<String> {
            vec!["State".to_string()]
        }

        fn read_field(&self, name: &str) -> Result<FieldValue, FieldError> {
            match name {
                "State" => Ok(self.state.read().clone().into()),
                other => Err(FieldError::unknown(other)),
            }
        }
    }

    #[test]
    fn ids_start_at_one() {
        let engine = Engine::new();
        let a = Service::new("Idle");
        let b = Service::new("Idle");
        assert_eq!(engine.register(&a), Some(1));
        assert_eq!(engine.register(&b), Some(2));
        assert_eq!(engine.len(), 2);
    }

    #[test]
    fn display_name_defaults_to_type_name() {
        let engine = Engine::new();
        let service = Service::new("Idle");
        engine.register(&service);
        let objects = engine.monitored_objects();
        assert_eq!(objects[0].name, "Service");
        assert_eq!(objects[0].project, DEFAULT_PROJECT);
        assert!(objects[0].type_name.ends_with("Service"));
    }

    #[test]
    fn reregistration_replaces_monitor() {
        let engine = Engine::new();
        let service = Service::new("Idle");
        engine.register_object(&service, TrackOptions::new().project("A"));
        engine.register_object(&service, TrackOptions::new().project("B").name("svc"));

        let objects = engine.monitored_objects();
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].project, "B");
        assert_eq!(objects[0].name, "svc");

        let projects = engine.projects();
        assert_eq!(projects.len(), 2);
        assert_eq!((projects[0].name.as_str(), projects[0].member_count), ("A", 0));
        assert_eq!((projects[1].name.as_str(), projects[1].member_count), ("B", 1));
    }

    #[test]
    fn unregister_is_a_noop_when_absent() {
        let engine = Engine::new();
        let service = Service::new("Idle");
        assert!(!engine.unregister_object(&service));
        engine.register(&service);
        assert!(engine.unregister_object(&service));
        assert!(!engine.is_registered(&service));
        assert!(engine.is_empty());
    }

    #[test]
    fn idle_to_running_scenario() {
        let engine = Engine::new();
        let listener = Arc::new(CollectingListener::new(16));
        engine.subscribe(listener.clone());
        let service = Service::new("Idle");
        engine.register_object(&service, TrackOptions::new().project("Core"));

        service.set("Running");
        assert_eq!(engine.poll_now(), 1);
        assert_eq!(engine.poll_now(), 0);

        let history = engine.change_history(None);
        assert_eq!(history.len(), 1);
        let event = &history[0];
        assert_eq!(event.field, "State");
        assert_eq!(event.old_value, FieldValue::from("Idle"));
        assert_eq!(event.new_value, FieldValue::from("Running"));
        assert_eq!(event.project, "Core");
        assert_eq!(listener.changes(), history);
    }

    #[test]
    fn dropped_object_is_unregistered_on_poll() {
        let engine = Engine::new();
        let service = Service::new("Idle");
        engine.register(&service);
        drop(service);
        engine.poll_now();
        assert!(engine.is_empty());
    }

    #[test]
    fn sweep_expires_notify_only_monitors() {
        let engine = Engine::new();
        let kept = Service::new("Idle");
        let dropped = Service::new("Idle");
        engine.register_object(&kept, TrackOptions::new().detection(Detection::Notify));
        engine.register_object(&dropped, TrackOptions::new().detection(Detection::Notify));
        drop(dropped);

        assert_eq!(engine.inner.sweep_expired(), 1);
        assert_eq!(engine.inner.sweep_expired(), 0);
        assert_eq!(engine.len(), 1);
        assert!(engine.is_registered(&kept));
    }

    #[test]
    fn change_history_is_bounded() {
        let engine = Engine::builder().change_history(3).build();
        let service = Service::new("s0");
        engine.register_object(&service, TrackOptions::new().detection(Detection::Poll));
        for i in 1..=5 {
            service.set(&format!("s{}", i));
            engine.poll_now();
        }
        let history = engine.change_history(None);
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].new_value, FieldValue::from("s3"));
    }

    #[test]
    fn timing_queries() {
        let engine = Engine::new();
        for _ in 0..3 {
            drop(engine.start_phase("load", "importer", "Batch"));
        }
        drop(engine.start_phase("save", "writer", "Batch"));
        drop(engine.start_phase_default("boot", "main"));

        assert_eq!(engine.timing_history(Some("Batch"), None).len(), 4);
        assert_eq!(engine.timing_history(Some("Batch"), Some("load")).len(), 3);
        assert_eq!(engine.timing_history(None, None).len(), 5);

        let stats = engine.average_timings(Some("Batch"));
        assert_eq!(stats.len(), 2);
        assert_eq!(stats["load"].count, 3);
        assert!(engine.average_timings(Some("Nope")).is_empty());
    }

    #[test]
    fn timing_history_is_newest_first() {
        let engine = Engine::new();
        drop(engine.start_phase("first", "c", "p"));
        thread::sleep(Duration::from_millis(5));
        drop(engine.start_phase("second", "c", "p"));
        let history = engine.timing_history(None, None);
        assert_eq!(history[0].phase, "second");
        assert_eq!(history[1].phase, "first");
    }

    #[test]
    fn nested_timers_list_the_inner_one_first() {
        let engine = Engine::new();
        let outer = engine.start_phase("outer", "c", "p");
        let inner = engine.start_phase("inner", "c", "p");
        drop(inner);
        drop(outer);

        let history = engine.timing_history(None, None);
        assert_eq!(history[0].phase, "inner");
        assert_eq!(history[1].phase, "outer");

        // Export keeps completion order.
        let mut out = Vec::new();
        engine.export_timings(&mut out, None, None).unwrap();
        let text = String::from_utf8(out).unwrap();
        let phases: Vec<&str> = text
            .lines()
            .skip(1)
            .filter_map(|row| row.split(',').nth(3))
            .collect();
        assert_eq!(phases, ["inner", "outer"]);
    }

    #[test]
    fn clear_history_empties_both() {
        let engine = Engine::new();
        drop(engine.start_phase_default("x", "c"));
        engine.clear_history();
        assert!(engine.timing_history(None, None).is_empty());
        assert!(engine.change_history(None).is_empty());
    }

    #[test]
    fn discovery_registers_only_unseen_opted_in_objects() {
        let engine = Engine::new();
        let singletons = Arc::new(SingletonRegistry::new("app"));
        let wanted = Service::new("Idle");
        let unwanted = Service::new("Idle");
        singletons.add(wanted.clone(), TrackMarker::auto().project("Settings").name("config"));
        singletons.add(unwanted.clone(), TrackMarker::manual());
        engine.add_provider(singletons);
        engine.add_provider(Arc::new(FnProvider::new("broken", || {
            Err(DiscoveryError::Unavailable {
                provider: "broken".into(),
                reason: "offline".into(),
            })
        })));

        assert_eq!(engine.discover_now(), 1);
        assert_eq!(engine.discover_now(), 0);
        assert!(engine.is_registered(&wanted));
        assert!(!engine.is_registered(&unwanted));
        let objects = engine.monitored_objects();
        assert_eq!(objects[0].name, "config");
        assert_eq!(objects[0].project, "Settings");
    }

    #[test]
    fn collect_reflects_engine_state() {
        let engine = Engine::new();
        let service = Service::new("Idle");
        engine.register_object(&service, TrackOptions::new().project("Core").category("svc"));
        service.set("Busy");
        engine.poll_now();
        drop(engine.start_phase("tick", "svc", "Core"));

        let snapshot = engine.collect();
        assert_eq!(snapshot.objects.len(), 1);
        assert_eq!(snapshot.objects[0].category.as_deref(), Some("svc"));
        assert_eq!(snapshot.objects[0].fields["State"], FieldValue::from("Busy"));
        assert_eq!(snapshot.projects["Core"].member_count, 1);
        assert_eq!(snapshot.recent_changes.len(), 1);
        assert_eq!(snapshot.phases["tick"].count, 1);
    }

    #[test]
    fn export_writes_retained_timings() {
        let engine = Engine::new();
        drop(engine.start_phase("load", "importer", "Batch"));
        drop(engine.start_phase("load", "importer", "Other"));
        let mut out = Vec::new();
        assert_eq!(engine.export_timings(&mut out, Some("Batch"), None).unwrap(), 1);
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn shutdown_is_idempotent_and_blocks_registration() {
        let engine = Engine::new();
        let service = Service::new("Idle");
        engine.register(&service);
        engine.shutdown();
        engine.shutdown();
        assert!(engine.is_shut_down());
        assert!(engine.is_empty());
        assert_eq!(engine.register(&Service::new("x")), None);
        assert_eq!(engine.projects()[0].member_count, 0);
    }

    #[test]
    fn from_config_validates() {
        let bad = EngineConfig {
            change_history: 0,
            ..EngineConfig::default()
        };
        assert!(Engine::from_config(&bad).is_err());
        let engine = Engine::from_config(&EngineConfig::default()).unwrap();
        assert_eq!(engine.config().poll_interval, Duration::from_secs(1));
    }

    #[test]
    fn builder_replaces_zero_intervals() {
        let engine = Engine::builder().poll_interval(Duration::ZERO).build();
        assert_eq!(engine.config().poll_interval, Duration::from_secs(1));
    }

    #[test]
    fn timer_outliving_engine_is_harmless() {
        let engine = Engine::new();
        let timer = engine.start_phase_default("late", "c");
        drop(engine);
        drop(timer);
    }
}
