//! Engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::history::DEFAULT_HISTORY_CAPACITY;

/// Tunables for an [`Engine`](crate::Engine).
///
/// Deserializes from any serde format. Durations are strings such as
/// `"1s"`, `"250ms"` or `"500us"`; missing keys take their defaults.
///
/// ```rust
/// use std::time::Duration;
/// use vismon_sdk::EngineConfig;
///
/// let config: EngineConfig = serde_json::from_str(r#"{"poll_interval": "250ms"}"#).unwrap();
/// assert_eq!(config.poll_interval, Duration::from_millis(250));
/// assert_eq!(config.change_history, 1000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Default interval between poll passes of each monitor.
    #[serde(with = "duration_text")]
    pub poll_interval: Duration,

    /// Interval of the background discovery scan and snapshot emission.
    #[serde(with = "duration_text")]
    pub discovery_interval: Duration,

    /// Capacity of the change-event history.
    pub change_history: usize,

    /// Capacity of the phase-timing history.
    pub timing_history: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            discovery_interval: Duration::from_secs(1),
            change_history: DEFAULT_HISTORY_CAPACITY,
            timing_history: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

impl EngineConfig {
    /// Reject zero intervals and empty histories.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval.is_zero() {
            return Err(ConfigError::ZeroInterval {
                setting: "poll_interval",
            });
        }
        if self.discovery_interval.is_zero() {
            return Err(ConfigError::ZeroInterval {
                setting: "discovery_interval",
            });
        }
        if self.change_history == 0 {
            return Err(ConfigError::ZeroCapacity {
                setting: "change_history",
            });
        }
        if self.timing_history == 0 {
            return Err(ConfigError::ZeroCapacity {
                setting: "timing_history",
            });
        }
        Ok(())
    }
}

/// Suffix to nanoseconds multiplier (order matters: longer suffixes first)
const UNITS: &[(&str, f64)] = &[
    ("ns", 1.0),
    ("µs", 1_000.0),
    ("us", 1_000.0),
    ("ms", 1_000_000.0),
    ("s", 1_000_000_000.0),
];

/// Parse duration strings like `"1s"`, `"250ms"`, `"16.5us"`, `"0ns"`.
pub fn parse_duration(s: &str) -> Result<Duration, ConfigError> {
    let text = s.trim();
    let invalid = || ConfigError::InvalidDuration {
        value: s.to_string(),
    };

    for (suffix, multiplier) in UNITS {
        if let Some(number) = text.strip_suffix(suffix) {
            let value: f64 = number.trim().parse().map_err(|_| invalid())?;
            if !value.is_finite() || value < 0.0 {
                return Err(invalid());
            }
            return Ok(Duration::from_nanos((value * multiplier) as u64));
        }
    }

    Err(invalid())
}

/// Format a duration the way [`parse_duration`] reads it back.
pub fn format_duration(d: Duration) -> String {
    let nanos = d.as_nanos();
    if nanos % 1_000_000_000 == 0 {
        format!("{}s", d.as_secs())
    } else if nanos % 1_000_000 == 0 {
        format!("{}ms", d.as_millis())
    } else if nanos % 1_000 == 0 {
        format!("{}us", d.as_micros())
    } else {
        format!("{}ns", nanos)
    }
}

mod duration_text {
    use std::time::Duration;

    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_duration(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let text = String::deserialize(deserializer)?;
        super::parse_duration(&text).map_err(de::Error::custom)
    }
}
