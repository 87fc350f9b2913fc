//! Per-object change detection.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, ReentrantMutex};
use vismon_types::{now_ms, ChangeEvent, FieldValue, ObjectSnapshot, DEFAULT_PROJECT};

use crate::differ::{canonical_value, has_changed};
use crate::trackable::{short_type_name, Detection, ObjectKey, TrackOptions, Trackable};

/// Callbacks a monitor reports to.
#[derive(Clone)]
pub(crate) struct MonitorHooks {
    /// Receives every detected change, in detection order.
    pub on_change: Arc<dyn Fn(ChangeEvent) + Send + Sync>,
    /// Called by the poll task when the tracked object has been dropped.
    pub on_expired: Arc<dyn Fn(&ObjectMonitor) + Send + Sync>,
}

impl MonitorHooks {
    #[cfg(test)]
    pub(crate) fn noop() -> Self {
        Self {
            on_change: Arc::new(|_: ChangeEvent| {}),
            on_expired: Arc::new(|_: &ObjectMonitor| {}),
        }
    }
}

/// Result of one diff pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Every field matched its record (or was recorded for the first time).
    Unchanged,
    /// This many change events were emitted.
    Changed(usize),
    /// The tracked object no longer exists.
    TargetDropped,
    /// The monitor was disposed.
    Disposed,
}

#[derive(Debug)]
struct FieldRecord {
    canonical: String,
    value: FieldValue,
}

#[derive(Debug)]
struct MonitorState {
    fields: BTreeMap<String, FieldRecord>,
    last_update_ms: u64,
}

// Released on drop so a panicking listener does not leave the outbox
// claimed forever.
struct DispatchClaim<'a>(&'a AtomicBool);

impl Drop for DispatchClaim<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Watches one tracked object for field changes.
///
/// Created by the engine on registration. The monitor holds only a weak
/// reference to its object. Diff passes, whether triggered by the poll task
/// or by the object's notifier, are serialized: a change seen by both paths
/// is reported once.
///
/// Detected changes go through an ordered outbox and reach `on_change` with
/// no monitor lock held, so a listener may register or unregister any
/// object, including this one.
pub struct ObjectMonitor {
    id: u64,
    key: ObjectKey,
    target: Weak<dyn Trackable>,
    name: String,
    project: String,
    category: Option<String>,
    type_name: String,
    detection: Detection,
    excluded: BTreeSet<String>,
    state: Mutex<MonitorState>,
    // Spans read, compare and enqueue. Never held while listeners run.
    // Reentrant so a field read that fires the notifier does not deadlock.
    diff_lock: ReentrantMutex<()>,
    outbox: Mutex<VecDeque<ChangeEvent>>,
    dispatching: AtomicBool,
    hooks: MonitorHooks,
    subscription: Mutex<Option<u64>>,
    #[cfg(feature = "tokio")]
    stop_tx: Mutex<Option<tokio::sync::watch::Sender<bool>>>,
    disposed: AtomicBool,
}

impl ObjectMonitor {
    pub(crate) fn new(
        id: u64,
        object: &Arc<dyn Trackable>,
        options: TrackOptions,
        hooks: MonitorHooks,
    ) -> Arc<Self> {
        let type_name = object.type_name();
        let name = options
            .name
            .unwrap_or_else(|| short_type_name(type_name).to_string());
        Arc::new(Self {
            id,
            key: ObjectKey::of(object),
            target: Arc::downgrade(object),
            name,
            project: options
                .project
                .unwrap_or_else(|| DEFAULT_PROJECT.to_string()),
            category: options.category,
            type_name: type_name.to_string(),
            detection: options.detection,
            excluded: options.exclude.into_iter().collect(),
            state: Mutex::new(MonitorState {
                fields: BTreeMap::new(),
                last_update_ms: now_ms(),
            }),
            diff_lock: ReentrantMutex::new(()),
            outbox: Mutex::new(VecDeque::new()),
            dispatching: AtomicBool::new(false),
            hooks,
            subscription: Mutex::new(None),
            #[cfg(feature = "tokio")]
            stop_tx: Mutex::new(None),
            disposed: AtomicBool::new(false),
        })
    }

    /// Engine-assigned id.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn key(&self) -> ObjectKey {
        self.key
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Owning project.
    pub fn project(&self) -> &str {
        &self.project
    }

    /// Whether [`dispose`](Self::dispose) has run.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Whether the tracked object still exists.
    pub fn is_target_alive(&self) -> bool {
        self.target.strong_count() > 0
    }

    /// Record the first value of every monitored field, then hook up the
    /// notifier when the detection mode asks for it.
    pub(crate) fn activate(self: &Arc<Self>, object: &Arc<dyn Trackable>) {
        self.diff(None);
        if !self.detection.notifies() {
            return;
        }
        if let Some(notifier) = object.notifier() {
            let weak = Arc::downgrade(self);
            let id = notifier.subscribe(Arc::new(move |field: Option<&str>| {
                if let Some(monitor) = weak.upgrade() {
                    monitor.diff(field);
                }
            }));
            *self.subscription.lock() = Some(id);
        } else if self.detection == Detection::Notify {
            tracing::debug!(
                object = %self.name,
                "object has no change notifier, changes will go undetected"
            );
        }
    }

    /// Run one diff pass over every monitored field.
    pub fn poll(&self) -> PollOutcome {
        self.diff(None)
    }

    /// Diff one field, or every field when `only` is `None` or names a
    /// field that is not monitored.
    fn diff(&self, only: Option<&str>) -> PollOutcome {
        if self.is_disposed() {
            return PollOutcome::Disposed;
        }
        let Some(target) = self.target.upgrade() else {
            return PollOutcome::TargetDropped;
        };

        let count = {
            let _diffing = self.diff_lock.lock();
            if self.is_disposed() {
                return PollOutcome::Disposed;
            }

            let mut names: Vec<String> = target
                .fields()
                .into_iter()
                .filter(|f| !self.excluded.contains(f))
                .collect();
            if let Some(field) = only {
                if names.iter().any(|n| n == field) {
                    names = vec![field.to_string()];
                }
            }

            let readings: Vec<(String, FieldValue, String)> = names
                .into_iter()
                .filter_map(|name| match target.read_field(&name) {
                    Ok(value) => {
                        let canonical = canonical_value(&value);
                        Some((name, value, canonical))
                    }
                    Err(e) => {
                        tracing::debug!(object = %self.name, field = %name, error = %e, "skipping field");
                        None
                    }
                })
                .collect();
            drop(target);

            let mut state = self.state.lock();
            let mut outbox = self.outbox.lock();
            let now = now_ms();
            let mut count = 0;
            for (name, value, canonical) in readings {
                let changed = has_changed(
                    state.fields.get(&name).map(|r| r.canonical.as_str()),
                    &canonical,
                );
                let record = FieldRecord {
                    canonical,
                    value: value.clone(),
                };
                let previous = state.fields.insert(name.clone(), record);
                if let (true, Some(previous)) = (changed, previous) {
                    outbox.push_back(ChangeEvent {
                        object_id: self.id,
                        field: name,
                        old_value: previous.value,
                        new_value: value,
                        timestamp_ms: now,
                        component: self.name.clone(),
                        project: self.project.clone(),
                    });
                    count += 1;
                }
            }
            if count > 0 {
                state.last_update_ms = state.last_update_ms.max(now);
            }
            count
        };

        self.dispatch();
        if count == 0 {
            PollOutcome::Unchanged
        } else {
            PollOutcome::Changed(count)
        }
    }

    /// Hand queued events to `on_change` in the order they were queued.
    ///
    /// One thread drains at a time. A thread that finds the outbox claimed
    /// leaves its events to the current drainer, which looks at the queue
    /// again after releasing its claim so nothing is stranded. A listener
    /// that triggers another diff of this monitor sees its events delivered
    /// after it returns.
    fn dispatch(&self) {
        loop {
            if self.dispatching.swap(true, Ordering::AcqRel) {
                return;
            }
            let claim = DispatchClaim(&self.dispatching);
            loop {
                let next = self.outbox.lock().pop_front();
                let Some(event) = next else { break };
                (self.hooks.on_change)(event);
            }
            drop(claim);
            if self.outbox.lock().is_empty() {
                return;
            }
        }
    }

    /// Start the background poll task on `runtime`.
    ///
    /// The first poll happens one `interval` after the call. The task holds
    /// only a weak reference and ends when the monitor is disposed, dropped,
    /// or finds its object gone.
    #[cfg(feature = "tokio")]
    pub(crate) fn spawn_poller(
        self: &Arc<Self>,
        runtime: &tokio::runtime::Handle,
        interval: std::time::Duration,
    ) {
        use tokio::sync::watch;
        use tokio::time::MissedTickBehavior;

        if !self.detection.polls() || self.is_disposed() {
            return;
        }
        let (stop_tx, mut stop_rx) = watch::channel(false);
        *self.stop_tx.lock() = Some(stop_tx);
        let weak = Arc::downgrade(self);

        runtime.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; the baseline already covers it.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let Some(monitor) = weak.upgrade() else { break };
                        match monitor.poll() {
                            PollOutcome::TargetDropped => {
                                (monitor.hooks.on_expired)(monitor.as_ref());
                                break;
                            }
                            PollOutcome::Disposed => break,
                            PollOutcome::Unchanged | PollOutcome::Changed(_) => {}
                        }
                    }
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }
        });
    }

    /// Stop polling and unsubscribe from the object's notifier.
    ///
    /// Idempotent. Waits for an in-flight diff pass on another thread to
    /// finish comparing, so nothing new is detected after it returns. It
    /// never waits for listeners: events detected before disposal may still
    /// be delivered by the thread draining them.
    pub(crate) fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        #[cfg(feature = "tokio")]
        if let Some(stop_tx) = self.stop_tx.lock().take() {
            let _ = stop_tx.send(true);
        }
        if let Some(id) = self.subscription.lock().take() {
            if let Some(target) = self.target.upgrade() {
                if let Some(notifier) = target.notifier() {
                    notifier.unsubscribe(id);
                }
            }
        }
        drop(self.diff_lock.lock());
    }

    /// Copy of the monitor's current view of its object.
    pub fn snapshot(&self) -> ObjectSnapshot {
        let state = self.state.lock();
        let mut snapshot = ObjectSnapshot::new(self.id, &self.name, &self.type_name, &self.project)
            .last_update_ms(state.last_update_ms);
        snapshot.category = self.category.clone();
        snapshot.fields = state
            .fields
            .iter()
            .map(|(name, record)| (name.clone(), record.value.clone()))
            .collect();
        snapshot
    }
}

impl Drop for ObjectMonitor {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for ObjectMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectMonitor")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("project", &self.project)
            .field("detection", &self.detection)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
