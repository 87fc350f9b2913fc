//! # vismon-sdk
//!
//! Monitoring engine for live objects inside a running process.
//!
//! Register any `Arc<T>` whose type implements [`Trackable`]. The engine
//! watches its fields for changes (by polling, through the object's own
//! [`ChangeNotifier`], or both), times phases of work with scoped
//! [`PhaseTimer`]s, and keeps bounded histories of change events and
//! timings for presentation adapters to read.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use parking_lot::RwLock;
//! use vismon_sdk::{Engine, FieldError, FieldValue, LoggingListener, Output, TrackOptions, Trackable};
//!
//! struct Worker {
//!     state: RwLock<String>,
//! }
//!
//! impl Trackable for Worker {
//!     fn fields(&self) -> Vec<String> {
//!         vec!["State".into()]
//!     }
//!
//!     fn read_field(&self, name: &str) -> Result<FieldValue, FieldError> {
//!         match name {
//!             "State" => Ok(self.state.read().clone().into()),
//!             other => Err(FieldError::unknown(other)),
//!         }
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let engine = Engine::builder()
//!         .poll_interval(Duration::from_millis(250))
//!         .output(Output::file("snapshot.json"))
//!         .listener(Arc::new(LoggingListener::new()))
//!         .build();
//!
//!     let worker = Arc::new(Worker { state: RwLock::new("Idle".into()) });
//!     engine.register_object(&worker, TrackOptions::new().project("Core"));
//!     engine.start();
//!
//!     {
//!         let _timer = engine.start_phase("batch", "worker", "Core");
//!         *worker.state.write() = "Running".into();
//!         tokio::time::sleep(Duration::from_millis(500)).await;
//!     }
//!
//!     println!("{:?}", engine.average_timings(Some("Core")));
//! }
//! ```
//!
//! ## Features
//!
//! - **Explicit capability contract**: objects list and read their own fields
//! - **Poll and/or notify**: choose per object, changes reported once
//! - **Bounded histories**: oldest records evicted at capacity
//! - **Multiple outputs**: file, TCP or channel snapshots, plus CSV timing export
//! - **Thread-safe**: register, time and query from any thread or task

mod config;
pub mod differ;
mod discovery;
mod engine;
mod error;
mod export;
mod history;
mod listener;
mod monitor;
mod notify;
mod output;
mod phase;
mod registry;
mod trackable;

pub use config::{format_duration, parse_duration, EngineConfig};
pub use discovery::{Discovered, DiscoveryProvider, FnProvider, SingletonRegistry, TrackMarker};
pub use engine::{Engine, EngineBuilder, ObjectId, SNAPSHOT_RECENT_CHANGES};
pub use error::{ConfigError, DiscoveryError, ExportError, FieldError};
pub use export::{write_timings_csv, CSV_HEADER};
pub use history::{RollingBuffer, DEFAULT_HISTORY_CAPACITY};
pub use listener::{CollectingListener, EngineListener, LoggingListener};
pub use notify::ChangeNotifier;
pub use output::Output;
pub use phase::PhaseTimer;
pub use trackable::{Detection, TrackOptions, Trackable};

#[cfg(feature = "tokio")]
pub use listener::{ChannelListener, ChannelReceivers};

// Re-export types for convenience
pub use vismon_types::{
    ChangeEvent, FieldValue, Microseconds, ObjectSnapshot, PhaseStats, PhaseTimingResult,
    ProjectSummary, Snapshot, DEFAULT_PROJECT,
};
