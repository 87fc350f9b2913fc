//! Layered configuration for the `vismon` binary.
//!
//! Sources, lowest precedence first: built-in defaults, an optional TOML
//! file, then `VISMON_*` environment variables. Command-line flags are
//! applied on top by the caller.
//!
//! ```toml
//! log = "vismon=debug"
//!
//! [engine]
//! poll_interval = "250ms"
//! change_history = 500
//!
//! [demo]
//! workers = 4
//! duration = "5s"
//! ```
//!
//! Nested keys use a double underscore in the environment, for example
//! `VISMON_ENGINE__POLL_INTERVAL=100ms`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Deserializer};
use vismon_sdk::{parse_duration, EngineConfig};

/// Everything the binary can be configured with.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Log filter directive, as accepted by `RUST_LOG`.
    pub log: Option<String>,

    /// Engine tunables.
    pub engine: EngineConfig,

    /// Defaults for the `demo` command.
    pub demo: DemoSettings,
}

/// Defaults for the simulated workload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DemoSettings {
    /// Number of simulated workers.
    pub workers: usize,

    /// How long the workload runs.
    #[serde(deserialize_with = "duration_from_text")]
    pub duration: Duration,

    /// Snapshot file written while the demo runs.
    pub output: Option<PathBuf>,

    /// Timing export written when the demo ends.
    pub export: Option<PathBuf>,
}

impl Default for DemoSettings {
    fn default() -> Self {
        Self {
            workers: 3,
            duration: Duration::from_secs(10),
            output: None,
            export: None,
        }
    }
}

fn duration_from_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    let text = String::deserialize(deserializer)?;
    parse_duration(&text).map_err(serde::de::Error::custom)
}

impl Settings {
    /// Load settings from `path` (if given) and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_from(path, Environment::with_prefix("VISMON"))
    }

    fn load_from(path: Option<&Path>, env: Environment) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        let config = builder
            .add_source(env.prefix_separator("_").separator("__"))
            .build()
            .context("failed to load configuration")?;

        let settings: Settings = config
            .try_deserialize()
            .context("invalid configuration")?;
        settings.engine.validate()?;
        Ok(settings)
    }
}
