//! Snapshots read from the file an `Output::File` writes.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use vismon_sdk::Snapshot;

use super::SnapshotSource;

/// Reads the JSON snapshot file written by a running engine.
///
/// The file is re-read only when its modification time moves forward, so
/// repeated polls of an unchanged file return `None`.
#[derive(Debug)]
pub struct FileSource {
    path: PathBuf,
    description: String,
    last_error: Option<String>,
    last_modified: Option<SystemTime>,
}

impl FileSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let description = format!("file: {}", path.display());
        Self {
            path,
            description,
            last_error: None,
            last_modified: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn modified(&self) -> Option<SystemTime> {
        fs::metadata(&self.path).ok()?.modified().ok()
    }

    fn read(&mut self) -> Option<Snapshot> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                self.last_error = Some(format!("Read error: {}", e));
                return None;
            }
        };
        match serde_json::from_str::<Snapshot>(&content) {
            Ok(snapshot) if !snapshot.version.is_compatible() => {
                self.last_error = Some(format!(
                    "Unsupported schema version {}.{}",
                    snapshot.version.major, snapshot.version.minor
                ));
                None
            }
            Ok(snapshot) => {
                self.last_error = None;
                Some(snapshot)
            }
            Err(e) => {
                self.last_error = Some(format!("Parse error: {}", e));
                None
            }
        }
    }
}

impl SnapshotSource for FileSource {
    fn poll(&mut self) -> Option<Snapshot> {
        let current = self.modified();

        let changed = match (&self.last_modified, &current) {
            (None, _) => true,
            // Deleted since the last read: keep what we had.
            (Some(_), None) => false,
            (Some(last), Some(current)) => current > last,
        };
        if !changed {
            return None;
        }

        let snapshot = self.read()?;
        self.last_modified = current;
        Some(snapshot)
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}
