//! Duration representation for serialization.
//!
//! Phase durations are carried as whole microseconds so that every
//! serialization format agrees on the unit.

use core::fmt;
use core::time::Duration;

/// Duration in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
#[cfg_attr(feature = "minicbor", derive(minicbor::Encode, minicbor::Decode))]
#[cfg_attr(feature = "minicbor", cbor(transparent))]
pub struct Microseconds(#[cfg_attr(feature = "minicbor", n(0))] pub u64);

impl Microseconds {
    /// Zero duration.
    pub const ZERO: Self = Self(0);

    /// Create from microseconds.
    pub const fn from_micros(micros: u64) -> Self {
        Self(micros)
    }

    /// Create from milliseconds.
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis * 1000)
    }

    /// Get the value in microseconds.
    pub const fn as_micros(&self) -> u64 {
        self.0
    }

    /// Get the value in milliseconds (truncated).
    pub const fn as_millis(&self) -> u64 {
        self.0 / 1000
    }

    /// Fractional milliseconds, for display and delimited exports.
    pub fn as_millis_f64(&self) -> f64 {
        self.0 as f64 / 1000.0
    }

    /// Convert to a standard Duration.
    pub const fn to_duration(&self) -> Duration {
        Duration::from_micros(self.0)
    }

    /// Arithmetic mean of a set of samples, `None` when empty.
    ///
    /// Accumulates in `u128` so long sample runs cannot overflow.
    pub fn mean<I>(samples: I) -> Option<Self>
    where
        I: IntoIterator<Item = Microseconds>,
    {
        let (sum, count) = samples
            .into_iter()
            .fold((0u128, 0u128), |(sum, n), s| (sum + s.0 as u128, n + 1));
        if count == 0 {
            None
        } else {
            Some(Self((sum / count) as u64))
        }
    }
}

impl From<Duration> for Microseconds {
    fn from(d: Duration) -> Self {
        Self(d.as_micros().min(u64::MAX as u128) as u64)
    }
}

impl From<Microseconds> for Duration {
    fn from(m: Microseconds) -> Self {
        Duration::from_micros(m.0)
    }
}

impl fmt::Display for Microseconds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let micros = self.0;
        if micros < 1_000 {
            write!(f, "{}µs", micros)
        } else if micros < 1_000_000 {
            write!(f, "{:.2}ms", micros as f64 / 1_000.0)
        } else {
            write!(f, "{:.2}s", micros as f64 / 1_000_000.0)
        }
    }
}
