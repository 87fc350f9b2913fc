//! Where the viewer gets snapshots from.

mod file;

pub use file::FileSource;

use std::fmt::Debug;

use vismon_sdk::Snapshot;

/// A non-blocking supplier of engine snapshots.
///
/// # Example
///
/// ```
/// use vismon::{FileSource, SnapshotSource};
///
/// let mut source = FileSource::new("snapshot.json");
/// if let Some(snapshot) = source.poll() {
///     println!("{} objects", snapshot.len());
/// }
/// ```
pub trait SnapshotSource: Send + Debug {
    /// The latest snapshot, or `None` when nothing new is available.
    fn poll(&mut self) -> Option<Snapshot>;

    /// Human-readable origin of the snapshots.
    fn description(&self) -> &str;

    /// Message of the error hit by the last poll, if any.
    fn error(&self) -> Option<&str>;
}
