//! Registry of monitors and the projects that group them.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use vismon_types::{now_ms, ProjectSummary};

use crate::monitor::ObjectMonitor;
use crate::trackable::ObjectKey;

#[derive(Debug, Default)]
struct ProjectInner {
    members: BTreeSet<u64>,
    last_activity_ms: u64,
}

/// One named project. Membership changes lock only this project.
#[derive(Debug)]
pub(crate) struct ProjectState {
    name: String,
    inner: Mutex<ProjectInner>,
}

impl ProjectState {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            inner: Mutex::new(ProjectInner {
                members: BTreeSet::new(),
                last_activity_ms: now_ms(),
            }),
        }
    }

    fn add(&self, id: u64) {
        let mut inner = self.inner.lock();
        inner.members.insert(id);
        inner.last_activity_ms = now_ms();
    }

    fn remove(&self, id: u64) -> bool {
        let mut inner = self.inner.lock();
        let removed = inner.members.remove(&id);
        if removed {
            inner.last_activity_ms = now_ms();
        }
        removed
    }

    fn touch(&self, ts: u64) {
        let mut inner = self.inner.lock();
        inner.last_activity_ms = inner.last_activity_ms.max(ts);
    }

    fn summary(&self) -> ProjectSummary {
        let inner = self.inner.lock();
        ProjectSummary {
            name: self.name.clone(),
            last_activity_ms: inner.last_activity_ms,
            member_count: inner.members.len(),
        }
    }
}

/// Monitors keyed by object identity, plus the project table.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    monitors: DashMap<ObjectKey, Arc<ObjectMonitor>>,
    projects: RwLock<BTreeMap<String, Arc<ProjectState>>>,
}

impl Registry {
    /// Get a project, creating it on first use.
    pub fn project(&self, name: &str) -> Arc<ProjectState> {
        // Fast path
        {
            let projects = self.projects.read();
            if let Some(project) = projects.get(name) {
                return project.clone();
            }
        }

        // Slow path
        let mut projects = self.projects.write();
        projects
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(ProjectState::new(name)))
            .clone()
    }

    /// Insert a monitor and add it to its project, returning the monitor it
    /// replaced (already detached from its project).
    pub fn insert(&self, monitor: Arc<ObjectMonitor>) -> Option<Arc<ObjectMonitor>> {
        self.project(monitor.project()).add(monitor.id());
        let replaced = self.monitors.insert(monitor.key(), monitor);
        if let Some(old) = &replaced {
            self.detach(old);
        }
        replaced
    }

    /// Remove the monitor for an identity.
    pub fn remove(&self, key: ObjectKey) -> Option<Arc<ObjectMonitor>> {
        let (_, monitor) = self.monitors.remove(&key)?;
        self.detach(&monitor);
        Some(monitor)
    }

    /// Remove the monitor for an identity only if it is still `id`.
    ///
    /// Used when a stale monitor expires: a newer registration of the same
    /// identity must survive.
    pub fn remove_if_id(&self, key: ObjectKey, id: u64) -> Option<Arc<ObjectMonitor>> {
        let (_, monitor) = self.monitors.remove_if(&key, |_, m| m.id() == id)?;
        self.detach(&monitor);
        Some(monitor)
    }

    fn detach(&self, monitor: &ObjectMonitor) {
        let project = self.projects.read().get(monitor.project()).cloned();
        if let Some(project) = project {
            project.remove(monitor.id());
        }
    }

    pub fn contains(&self, key: ObjectKey) -> bool {
        self.monitors.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.monitors.len()
    }

    /// Every live monitor, ordered by id.
    pub fn monitors(&self) -> Vec<Arc<ObjectMonitor>> {
        let mut monitors: Vec<_> = self.monitors.iter().map(|e| e.value().clone()).collect();
        monitors.sort_by_key(|m| m.id());
        monitors
    }

    /// Summaries of every project, ordered by name.
    pub fn project_summaries(&self) -> Vec<ProjectSummary> {
        let projects: Vec<_> = self.projects.read().values().cloned().collect();
        projects.iter().map(|p| p.summary()).collect()
    }

    /// Record activity in a project that already exists.
    pub fn touch(&self, project: &str, ts: u64) {
        let state = self.projects.read().get(project).cloned();
        if let Some(state) = state {
            state.touch(ts);
        }
    }

    /// Remove every monitor, returning them. Projects persist.
    pub fn drain(&self) -> Vec<Arc<ObjectMonitor>> {
        let keys: Vec<ObjectKey> = self.monitors.iter().map(|e| *e.key()).collect();
        keys.into_iter().filter_map(|key| self.remove(key)).collect()
    }
}
