//! Scoped phase timing.

use std::fmt;
use std::time::{Duration, Instant};

use vismon_types::{now_ms, Microseconds, PhaseTimingResult};

type Completion = Box<dyn FnOnce(PhaseTimingResult) + Send>;

/// Times one phase of work, reporting the result when the scope ends.
///
/// The clock is monotonic. On drop, or on an explicit
/// [`finish`](Self::finish), the end time is taken from the wall clock and
/// the start time is derived as `end - duration`. The completion callback
/// runs exactly once, whichever exit path is taken.
///
/// # Example
///
/// ```rust
/// use vismon_sdk::PhaseTimer;
///
/// let timer = PhaseTimer::new("load", "importer", "Batch", |result| {
///     println!("{} took {}", result.phase, result.duration);
/// });
/// // ... work ...
/// let result = timer.finish();
/// assert_eq!(result.phase, "load");
/// ```
#[must_use = "a phase timer records when dropped; binding it to `_` drops it immediately"]
pub struct PhaseTimer {
    phase: String,
    component: String,
    project: String,
    started: Instant,
    on_complete: Option<Completion>,
}

impl PhaseTimer {
    /// Start timing a phase. `on_complete` receives the result.
    pub fn new<F>(
        phase: impl Into<String>,
        component: impl Into<String>,
        project: impl Into<String>,
        on_complete: F,
    ) -> Self
    where
        F: FnOnce(PhaseTimingResult) + Send + 'static,
    {
        Self {
            phase: phase.into(),
            component: component.into(),
            project: project.into(),
            started: Instant::now(),
            on_complete: Some(Box::new(on_complete)),
        }
    }

    /// Start timing a phase whose result only goes to the caller of
    /// [`finish`](Self::finish).
    pub fn detached(
        phase: impl Into<String>,
        component: impl Into<String>,
        project: impl Into<String>,
    ) -> Self {
        Self::new(phase, component, project, |_| {})
    }

    /// Phase name.
    pub fn phase(&self) -> &str {
        &self.phase
    }

    /// Time elapsed so far.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Stop the timer now and return what was recorded.
    pub fn finish(mut self) -> PhaseTimingResult {
        self.complete()
    }

    fn complete(&mut self) -> PhaseTimingResult {
        let duration = Microseconds::from(self.started.elapsed());
        let result = PhaseTimingResult::ending_at(
            std::mem::take(&mut self.phase),
            std::mem::take(&mut self.component),
            std::mem::take(&mut self.project),
            now_ms(),
            duration,
        );
        if let Some(callback) = self.on_complete.take() {
            callback(result.clone());
        }
        result
    }
}

impl Drop for PhaseTimer {
    fn drop(&mut self) {
        if self.on_complete.is_some() {
            self.complete();
        }
    }
}

impl fmt::Debug for PhaseTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhaseTimer")
            .field("phase", &self.phase)
            .field("component", &self.component)
            .field("project", &self.project)
            .field("elapsed", &self.elapsed())
            .finish()
    }
}
