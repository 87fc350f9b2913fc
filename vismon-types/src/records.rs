//! Immutable event records produced by a monitoring engine.

use alloc::string::String;

use crate::{FieldValue, Microseconds};

/// A detected change of one field on one tracked object.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "minicbor", derive(minicbor::Encode, minicbor::Decode))]
pub struct ChangeEvent {
    /// Engine-assigned id of the object that changed.
    #[cfg_attr(feature = "minicbor", n(0))]
    pub object_id: u64,

    /// Name of the field that changed.
    #[cfg_attr(feature = "minicbor", n(1))]
    pub field: String,

    /// Value before the change.
    #[cfg_attr(feature = "minicbor", n(2))]
    pub old_value: FieldValue,

    /// Value after the change.
    #[cfg_attr(feature = "minicbor", n(3))]
    pub new_value: FieldValue,

    /// Unix timestamp in milliseconds when the change was detected.
    #[cfg_attr(feature = "minicbor", n(4))]
    pub timestamp_ms: u64,

    /// Display name of the tracked object.
    #[cfg_attr(feature = "minicbor", n(5))]
    pub component: String,

    /// Project the object belongs to.
    #[cfg_attr(feature = "minicbor", n(6))]
    pub project: String,
}

/// Duration of one completed phase.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "minicbor", derive(minicbor::Encode, minicbor::Decode))]
pub struct PhaseTimingResult {
    /// Phase name (e.g. "load", "render").
    #[cfg_attr(feature = "minicbor", n(0))]
    pub phase: String,

    /// Component that ran the phase.
    #[cfg_attr(feature = "minicbor", n(1))]
    pub component: String,

    /// Project the phase belongs to.
    #[cfg_attr(feature = "minicbor", n(2))]
    pub project: String,

    /// Unix timestamp in milliseconds, derived as `end_ms - duration`.
    #[cfg_attr(feature = "minicbor", n(3))]
    pub start_ms: u64,

    /// Unix timestamp in milliseconds when the phase ended.
    #[cfg_attr(feature = "minicbor", n(4))]
    pub end_ms: u64,

    /// Elapsed time measured on a monotonic clock.
    #[cfg_attr(feature = "minicbor", n(5))]
    pub duration: Microseconds,
}

impl PhaseTimingResult {
    /// Build a result from the wall-clock end time and a measured duration.
    pub fn ending_at(
        phase: impl Into<String>,
        component: impl Into<String>,
        project: impl Into<String>,
        end_ms: u64,
        duration: Microseconds,
    ) -> Self {
        Self {
            phase: phase.into(),
            component: component.into(),
            project: project.into(),
            start_ms: end_ms.saturating_sub(duration.as_millis()),
            end_ms,
            duration,
        }
    }
}

/// Aggregate over the retained samples of one phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "minicbor", derive(minicbor::Encode, minicbor::Decode))]
pub struct PhaseStats {
    /// Number of samples.
    #[cfg_attr(feature = "minicbor", n(0))]
    pub count: u64,
    /// Mean duration.
    #[cfg_attr(feature = "minicbor", n(1))]
    pub mean: Microseconds,
    /// Shortest sample.
    #[cfg_attr(feature = "minicbor", n(2))]
    pub min: Microseconds,
    /// Longest sample.
    #[cfg_attr(feature = "minicbor", n(3))]
    pub max: Microseconds,
}

impl PhaseStats {
    /// Aggregate a set of durations, `None` when there are no samples.
    pub fn from_samples<I>(samples: I) -> Option<Self>
    where
        I: IntoIterator<Item = Microseconds>,
    {
        let mut count = 0u64;
        let mut sum = 0u128;
        let mut min = Microseconds(u64::MAX);
        let mut max = Microseconds::ZERO;
        for sample in samples {
            count += 1;
            sum += sample.0 as u128;
            min = min.min(sample);
            max = max.max(sample);
        }
        if count == 0 {
            return None;
        }
        Some(Self {
            count,
            mean: Microseconds((sum / count as u128) as u64),
            min,
            max,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_is_end_minus_duration() {
        let r = PhaseTimingResult::ending_at(
            "load",
            "loader",
            "Core",
            10_000,
            Microseconds::from_millis(250),
        );
        assert_eq!(r.start_ms, 9_750);
        assert_eq!(r.end_ms - r.duration.as_millis(), r.start_ms);
    }

    #[test]
    fn start_saturates_at_epoch() {
        let r = PhaseTimingResult::ending_at("p", "c", "P", 5, Microseconds::from_millis(10));
        assert_eq!(r.start_ms, 0);
    }

    #[test]
    fn stats_from_samples() {
        let stats = PhaseStats::from_samples([10, 30, 20].map(Microseconds::from_millis)).unwrap();
        assert_eq!(stats.count, 3);
        assert_eq!(stats.mean, Microseconds::from_millis(20));
        assert_eq!(stats.min, Microseconds::from_millis(10));
        assert_eq!(stats.max, Microseconds::from_millis(30));
    }

    #[test]
    fn stats_of_no_samples() {
        assert!(PhaseStats::from_samples(core::iter::empty()).is_none());
    }
}
