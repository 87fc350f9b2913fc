//! # vismon
//!
//! Console front end for the `vismon-sdk` monitoring engine.
//!
//! ```text
//! ┌──────────────────────────── vismon ─────────────────────────────┐
//! │  settings ──▶ Engine ──▶ ConsoleListener ──▶ stdout             │
//! │                 │                                               │
//! │                 └──▶ Output::File ──▶ FileSource ──▶ report     │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`settings`]**: layered configuration (TOML file, `VISMON_*` environment)
//! - **[`logging`]**: `tracing-subscriber` setup
//! - **[`console`]**: an [`EngineListener`](vismon_sdk::EngineListener) printing live records
//! - **[`demo`]**: a simulated workload of state-machine workers
//! - **[`source`]**: reading snapshots written by a running engine
//! - **[`report`]**: plain-text rendering of a snapshot
//!
//! ## Usage
//!
//! ```bash
//! # Run the simulated workload, writing snapshots and a timing export
//! vismon demo --duration 10s --poll 250ms --output snapshot.json --export timings.csv
//!
//! # Print a snapshot file written by any engine with an Output::File
//! vismon show --file snapshot.json
//! ```

pub mod console;
pub mod demo;
pub mod logging;
pub mod report;
pub mod settings;
pub mod source;

pub use console::ConsoleListener;
pub use settings::{DemoSettings, Settings};
pub use source::{FileSource, SnapshotSource};
