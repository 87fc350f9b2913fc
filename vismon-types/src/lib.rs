//! # vismon-types
//!
//! Core record types for live-object monitoring. This crate defines the
//! data that flows out of a `vismon` engine: field values observed on
//! tracked objects, change events, phase timing results, and the
//! point-in-time snapshots consumed by presentation adapters.
//!
//! ## Design Goals
//!
//! - **Zero required dependencies**: Records work without any serialization framework
//! - **Optional serialization**: Enable `serde` and/or `minicbor` features as needed
//! - **Copy-out semantics**: Every record is an owned value, detached from engine state
//! - **Versioned schema**: Snapshots include version info for forward compatibility
//!
//! ## Features
//!
//! - `std` (default): Standard library support (wall-clock timestamps)
//! - `serde`: JSON/MessagePack/etc. serialization via serde
//! - `minicbor`: Compact binary serialization via CBOR
//! - `all`: Enable all serialization formats
//!
//! ## Example
//!
//! ```rust
//! use vismon_types::{FieldValue, ObjectSnapshot, Snapshot};
//!
//! let snapshot = Snapshot::builder()
//!     .timestamp_ms(1_700_000_000_000)
//!     .object(
//!         ObjectSnapshot::new(1, "scheduler", "app::Scheduler", "Core")
//!             .field("State", FieldValue::from("Idle"))
//!             .field("Queued", FieldValue::from(3u64)),
//!     )
//!     .build();
//!
//! assert_eq!(snapshot.objects.len(), 1);
//! assert_eq!(snapshot.projects["Core"].member_count, 1);
//! ```
//!
//! ## Schema Version
//!
//! The current schema version is **1**.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod duration;
mod records;
mod snapshot;
mod value;
mod version;

pub use duration::*;
pub use records::*;
pub use snapshot::*;
pub use value::*;
pub use version::*;

/// Current schema version.
///
/// Increment this when making breaking changes to the snapshot format.
pub const SCHEMA_VERSION: u32 = 1;

/// Project name used when a caller does not name one.
pub const DEFAULT_PROJECT: &str = "Default";

/// Current wall-clock time in milliseconds since the Unix epoch.
#[cfg(feature = "std")]
pub fn now_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
