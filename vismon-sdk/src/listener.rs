//! Push delivery of change events and phase timings.
//!
//! Listeners run on the thread that produced the record, such as a poll task
//! or the thread that closed a phase timer. Change events of one object
//! arrive in detection order; when two threads detect changes on the same
//! object at once, whichever is already delivering hands over the other's
//! events too. No engine lock is held during delivery, so a listener may
//! register and unregister objects. A consumer tied to a particular thread
//! re-dispatches, for example through a [`ChannelListener`].

use std::sync::Arc;

use parking_lot::RwLock;
use vismon_types::{ChangeEvent, PhaseTimingResult};

use crate::history::RollingBuffer;

/// Receives records as the engine produces them.
pub trait EngineListener: Send + Sync {
    /// A field changed on a tracked object.
    fn on_change(&self, _event: &ChangeEvent) {}

    /// A phase timer completed.
    fn on_timing(&self, _result: &PhaseTimingResult) {}
}

/// Logs every record through `tracing`.
#[derive(Debug, Clone)]
pub struct LoggingListener {
    /// Level of the emitted log lines.
    pub level: tracing::Level,
}

impl LoggingListener {
    /// Log at `DEBUG`.
    pub fn new() -> Self {
        Self {
            level: tracing::Level::DEBUG,
        }
    }

    /// Set the log level.
    pub fn with_level(mut self, level: tracing::Level) -> Self {
        self.level = level;
        self
    }
}

impl Default for LoggingListener {
    fn default() -> Self {
        Self::new()
    }
}

// `tracing` macros need the level at compile time.
macro_rules! log_at {
    ($level:expr, $($arg:tt)+) => {{
        let level = $level;
        if level == tracing::Level::ERROR {
            tracing::error!($($arg)+)
        } else if level == tracing::Level::WARN {
            tracing::warn!($($arg)+)
        } else if level == tracing::Level::INFO {
            tracing::info!($($arg)+)
        } else if level == tracing::Level::DEBUG {
            tracing::debug!($($arg)+)
        } else {
            tracing::trace!($($arg)+)
        }
    }};
}

impl EngineListener for LoggingListener {
    fn on_change(&self, event: &ChangeEvent) {
        log_at!(
            self.level,
            event = "change",
            project = %event.project,
            object = %event.component,
            field = %event.field,
            old = %event.old_value,
            new = %event.new_value,
            "Field changed"
        );
    }

    fn on_timing(&self, result: &PhaseTimingResult) {
        log_at!(
            self.level,
            event = "timing",
            project = %result.project,
            component = %result.component,
            phase = %result.phase,
            duration_us = result.duration.as_micros(),
            "Phase completed"
        );
    }
}

/// Keeps the most recent records in memory.
#[derive(Debug)]
pub struct CollectingListener {
    changes: RollingBuffer<ChangeEvent>,
    timings: RollingBuffer<PhaseTimingResult>,
}

impl CollectingListener {
    /// Keep up to `capacity` records of each kind.
    pub fn new(capacity: usize) -> Self {
        Self {
            changes: RollingBuffer::new(capacity),
            timings: RollingBuffer::new(capacity),
        }
    }

    /// Collected change events, oldest first.
    pub fn changes(&self) -> Vec<ChangeEvent> {
        self.changes.to_vec()
    }

    /// Collected timings, oldest first.
    pub fn timings(&self) -> Vec<PhaseTimingResult> {
        self.timings.to_vec()
    }

    /// Drop everything collected.
    pub fn clear(&self) {
        self.changes.clear();
        self.timings.clear();
    }
}

impl EngineListener for CollectingListener {
    fn on_change(&self, event: &ChangeEvent) {
        self.changes.push(event.clone());
    }

    fn on_timing(&self, result: &PhaseTimingResult) {
        self.timings.push(result.clone());
    }
}

/// Forwards records into tokio channels.
///
/// Sends never block; records are dropped once a receiver is gone.
#[cfg(feature = "tokio")]
#[derive(Debug, Clone)]
pub struct ChannelListener {
    changes: tokio::sync::mpsc::UnboundedSender<ChangeEvent>,
    timings: tokio::sync::mpsc::UnboundedSender<PhaseTimingResult>,
}

/// Receiving halves paired with a [`ChannelListener`].
#[cfg(feature = "tokio")]
#[derive(Debug)]
pub struct ChannelReceivers {
    /// Change events.
    pub changes: tokio::sync::mpsc::UnboundedReceiver<ChangeEvent>,
    /// Phase timings.
    pub timings: tokio::sync::mpsc::UnboundedReceiver<PhaseTimingResult>,
}

#[cfg(feature = "tokio")]
impl ChannelListener {
    /// Create a listener and the receivers it feeds.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::sync::Arc;
    /// use vismon_sdk::{ChannelListener, Engine};
    ///
    /// let engine = Engine::new();
    /// let (listener, mut rx) = ChannelListener::new();
    /// engine.subscribe(Arc::new(listener));
    ///
    /// drop(engine.start_phase_default("warmup", "main"));
    /// assert_eq!(rx.timings.try_recv().unwrap().phase, "warmup");
    /// ```
    pub fn new() -> (Self, ChannelReceivers) {
        let (changes_tx, changes_rx) = tokio::sync::mpsc::unbounded_channel();
        let (timings_tx, timings_rx) = tokio::sync::mpsc::unbounded_channel();
        (
            Self {
                changes: changes_tx,
                timings: timings_tx,
            },
            ChannelReceivers {
                changes: changes_rx,
                timings: timings_rx,
            },
        )
    }
}

#[cfg(feature = "tokio")]
impl EngineListener for ChannelListener {
    fn on_change(&self, event: &ChangeEvent) {
        let _ = self.changes.send(event.clone());
    }

    fn on_timing(&self, result: &PhaseTimingResult) {
        let _ = self.timings.send(result.clone());
    }
}

/// Fan-out to every subscribed listener.
#[derive(Default)]
pub(crate) struct Dispatcher {
    listeners: RwLock<Vec<Arc<dyn EngineListener>>>,
}

impl Dispatcher {
    pub fn subscribe(&self, listener: Arc<dyn EngineListener>) {
        self.listeners.write().push(listener);
    }

    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    // Listeners are called with no lock held so they may subscribe others.
    fn snapshot(&self) -> Vec<Arc<dyn EngineListener>> {
        self.listeners.read().clone()
    }

    pub fn change(&self, event: &ChangeEvent) {
        for listener in self.snapshot() {
            listener.on_change(event);
        }
    }

    pub fn timing(&self, result: &PhaseTimingResult) {
        for listener in self.snapshot() {
            listener.on_timing(result);
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("listener_count", &self.len())
            .finish()
    }
}
