//! Snapshot - a point-in-time view of a monitoring engine.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

use crate::{ChangeEvent, FieldValue, PhaseStats, SchemaVersion};

/// Summary of one project (a named group of tracked objects).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "minicbor", derive(minicbor::Encode, minicbor::Decode))]
pub struct ProjectSummary {
    /// Unique project name.
    #[cfg_attr(feature = "minicbor", n(0))]
    pub name: String,

    /// Unix timestamp in milliseconds of the last registration,
    /// unregistration or change inside the project.
    #[cfg_attr(feature = "minicbor", n(1))]
    pub last_activity_ms: u64,

    /// Number of objects currently tracked under this project.
    #[cfg_attr(feature = "minicbor", n(2))]
    pub member_count: usize,
}

impl ProjectSummary {
    /// Create an empty project summary.
    pub fn new(name: impl Into<String>, last_activity_ms: u64) -> Self {
        Self {
            name: name.into(),
            last_activity_ms,
            member_count: 0,
        }
    }
}

/// Copy of one tracked object's observed state.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "minicbor", derive(minicbor::Encode, minicbor::Decode))]
pub struct ObjectSnapshot {
    /// Engine-assigned id, unique for the lifetime of the engine.
    #[cfg_attr(feature = "minicbor", n(0))]
    pub id: u64,

    /// Display name.
    #[cfg_attr(feature = "minicbor", n(1))]
    pub name: String,

    /// Declared type name of the tracked object.
    #[cfg_attr(feature = "minicbor", n(2))]
    pub type_name: String,

    /// Owning project.
    #[cfg_attr(feature = "minicbor", n(3))]
    pub project: String,

    /// Optional free-form category supplied at registration.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    #[cfg_attr(feature = "minicbor", n(4))]
    pub category: Option<String>,

    /// Last observed value of every monitored field.
    #[cfg_attr(feature = "minicbor", n(5))]
    pub fields: BTreeMap<String, FieldValue>,

    /// Unix timestamp in milliseconds of the last detected change
    /// (or of registration when nothing has changed yet).
    #[cfg_attr(feature = "minicbor", n(6))]
    pub last_update_ms: u64,
}

impl ObjectSnapshot {
    /// Create an object snapshot with no fields.
    pub fn new(
        id: u64,
        name: impl Into<String>,
        type_name: impl Into<String>,
        project: impl Into<String>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            type_name: type_name.into(),
            project: project.into(),
            category: None,
            fields: BTreeMap::new(),
            last_update_ms: 0,
        }
    }

    /// Add a field value.
    pub fn field(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Set the category.
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Set the last-update timestamp.
    pub fn last_update_ms(mut self, ts: u64) -> Self {
        self.last_update_ms = ts;
        self
    }
}

/// A point-in-time snapshot of everything an engine tracks.
///
/// Snapshots are emitted periodically to outputs and read back by
/// presentation adapters such as the `vismon show` command.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "minicbor", derive(minicbor::Encode, minicbor::Decode))]
pub struct Snapshot {
    /// Schema version for forward compatibility.
    #[cfg_attr(feature = "minicbor", n(0))]
    pub version: SchemaVersion,

    /// Unix timestamp in milliseconds when this snapshot was taken.
    #[cfg_attr(feature = "minicbor", n(1))]
    pub timestamp_ms: u64,

    /// Projects keyed by name.
    #[cfg_attr(feature = "minicbor", n(2))]
    pub projects: BTreeMap<String, ProjectSummary>,

    /// Tracked objects ordered by id.
    #[cfg_attr(feature = "minicbor", n(3))]
    pub objects: Vec<ObjectSnapshot>,

    /// Retained change events, oldest first.
    #[cfg_attr(feature = "serde", serde(default))]
    #[cfg_attr(feature = "minicbor", n(4))]
    pub recent_changes: Vec<ChangeEvent>,

    /// Per-phase aggregates over the retained timing history.
    #[cfg_attr(feature = "serde", serde(default))]
    #[cfg_attr(feature = "minicbor", n(5))]
    pub phases: BTreeMap<String, PhaseStats>,
}

impl Snapshot {
    /// Create a builder for constructing snapshots.
    pub fn builder() -> SnapshotBuilder {
        SnapshotBuilder::new()
    }

    /// True when no objects are tracked.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Number of tracked objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Find an object by display name.
    pub fn object(&self, name: &str) -> Option<&ObjectSnapshot> {
        self.objects.iter().find(|o| o.name == name)
    }

    /// Objects belonging to one project.
    pub fn objects_in<'a>(&'a self, project: &'a str) -> impl Iterator<Item = &'a ObjectSnapshot> {
        self.objects.iter().filter(move |o| o.project == project)
    }
}

/// Builder for constructing `Snapshot` instances.
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    timestamp_ms: Option<u64>,
    projects: BTreeMap<String, ProjectSummary>,
    objects: Vec<ObjectSnapshot>,
    recent_changes: Vec<ChangeEvent>,
    phases: BTreeMap<String, PhaseStats>,
}

impl SnapshotBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a specific timestamp (milliseconds since Unix epoch).
    pub fn timestamp_ms(mut self, ts: u64) -> Self {
        self.timestamp_ms = Some(ts);
        self
    }

    /// Add or replace a project summary.
    pub fn project(mut self, summary: ProjectSummary) -> Self {
        self.projects.insert(summary.name.clone(), summary);
        self
    }

    /// Add an object.
    ///
    /// A project summary is synthesized for projects not added explicitly,
    /// counting the objects added under it.
    pub fn object(mut self, object: ObjectSnapshot) -> Self {
        let summary = self
            .projects
            .entry(object.project.clone())
            .or_insert_with(|| ProjectSummary::new(object.project.clone(), object.last_update_ms));
        summary.member_count += 1;
        summary.last_activity_ms = summary.last_activity_ms.max(object.last_update_ms);
        self.objects.push(object);
        self
    }

    /// Append a change event.
    pub fn change(mut self, event: ChangeEvent) -> Self {
        self.recent_changes.push(event);
        self
    }

    /// Set the aggregate for one phase.
    pub fn phase(mut self, name: impl Into<String>, stats: PhaseStats) -> Self {
        self.phases.insert(name.into(), stats);
        self
    }

    /// Build the snapshot.
    pub fn build(mut self) -> Snapshot {
        self.objects.sort_by_key(|o| o.id);
        Snapshot {
            version: SchemaVersion::current(),
            timestamp_ms: self.timestamp_ms.unwrap_or_else(default_timestamp),
            projects: self.projects,
            objects: self.objects,
            recent_changes: self.recent_changes,
            phases: self.phases,
        }
    }
}

#[cfg(feature = "std")]
fn default_timestamp() -> u64 {
    crate::now_ms()
}

#[cfg(not(feature = "std"))]
fn default_timestamp() -> u64 {
    0
}
