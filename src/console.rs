//! Console presentation of live engine records.

use std::io::{self, Write};

use parking_lot::Mutex;
use vismon_sdk::{ChangeEvent, EngineListener, PhaseTimingResult};

/// One line for a field change.
pub fn format_change(event: &ChangeEvent) -> String {
    format!(
        "[{}] {}.{}: {} -> {}",
        event.project, event.component, event.field, event.old_value, event.new_value
    )
}

/// One line for a completed phase.
pub fn format_timing(result: &PhaseTimingResult) -> String {
    format!(
        "[{}] {} {} took {}",
        result.project, result.component, result.phase, result.duration
    )
}

/// Prints every change and timing as it happens.
///
/// Writes are serialized, so lines from concurrent producers never
/// interleave.
#[derive(Debug)]
pub struct ConsoleListener<W: Write + Send> {
    out: Mutex<W>,
    timings: bool,
}

impl ConsoleListener<io::Stdout> {
    /// Print to standard output.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> ConsoleListener<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
            timings: true,
        }
    }

    /// Print changes only.
    pub fn without_timings(mut self) -> Self {
        self.timings = false;
        self
    }

    /// Take back the writer.
    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }

    fn line(&self, text: &str) {
        let mut out = self.out.lock();
        // A closed stdout is not worth failing the workload over.
        let _ = writeln!(out, "{}", text);
        let _ = out.flush();
    }
}

impl<W: Write + Send> EngineListener for ConsoleListener<W> {
    fn on_change(&self, event: &ChangeEvent) {
        self.line(&format_change(event));
    }

    fn on_timing(&self, result: &PhaseTimingResult) {
        if self.timings {
            self.line(&format_timing(result));
        }
    }
}
