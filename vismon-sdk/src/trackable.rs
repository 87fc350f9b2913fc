//! The capability contract tracked objects implement, and registration options.

use std::sync::Arc;
use std::time::Duration;

use vismon_types::FieldValue;

use crate::error::FieldError;
use crate::notify::ChangeNotifier;

/// A live object whose fields can be observed.
///
/// Implementors list their observable fields and read them by name. A
/// failing read affects only that field. Objects that can announce their
/// own changes also return a [`ChangeNotifier`].
pub trait Trackable: Send + Sync + 'static {
    /// Names of the fields to observe.
    fn fields(&self) -> Vec<String>;

    /// Read the current value of one field.
    fn read_field(&self, name: &str) -> Result<FieldValue, FieldError>;

    /// Declared type name, shown in snapshots.
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Native change notifications, if the object has them.
    fn notifier(&self) -> Option<&ChangeNotifier> {
        None
    }
}

/// How a monitor detects changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Detection {
    /// Re-read every field on a fixed interval.
    Poll,
    /// Diff only when the object's notifier fires.
    ///
    /// With no poll task, a dropped object is noticed by the engine's
    /// background tick (see [`Engine::start`](crate::Engine::start)) or by
    /// [`Engine::poll_now`](crate::Engine::poll_now).
    Notify,
    /// Both: notifications for immediacy, polling as a fallback.
    #[default]
    PollAndNotify,
}

impl Detection {
    /// Whether a poll task runs.
    pub fn polls(self) -> bool {
        matches!(self, Detection::Poll | Detection::PollAndNotify)
    }

    /// Whether the object's notifier is subscribed.
    pub fn notifies(self) -> bool {
        matches!(self, Detection::Notify | Detection::PollAndNotify)
    }
}

/// Options supplied when registering an object.
#[derive(Debug, Clone, Default)]
pub struct TrackOptions {
    /// Display name; defaults to the short type name.
    pub name: Option<String>,
    /// Project; defaults to `"Default"`.
    pub project: Option<String>,
    /// Free-form category shown in snapshots.
    pub category: Option<String>,
    /// Change detection mode.
    pub detection: Detection,
    /// Fields opted out of monitoring.
    pub exclude: Vec<String>,
    /// Poll interval for this object; defaults to the engine's.
    pub poll_interval: Option<Duration>,
}

impl TrackOptions {
    /// Default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the display name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the project.
    pub fn project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    /// Set the category.
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Choose the detection mode.
    pub fn detection(mut self, detection: Detection) -> Self {
        self.detection = detection;
        self
    }

    /// Opt a field out of monitoring.
    pub fn exclude(mut self, field: impl Into<String>) -> Self {
        self.exclude.push(field.into());
        self
    }

    /// Override the poll interval.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }
}

/// Identity of a tracked allocation.
///
/// Derived from the `Arc`'s data pointer. Monitors hold a `Weak` to the
/// same allocation, which keeps the address from being reused while the
/// key is in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct ObjectKey(usize);

impl ObjectKey {
    pub(crate) fn of<T: ?Sized>(object: &Arc<T>) -> Self {
        ObjectKey(Arc::as_ptr(object) as *const () as usize)
    }
}

/// Short display name for a type: generics stripped, last path segment.
pub(crate) fn short_type_name(type_name: &str) -> &str {
    let base = type_name.split('<').next().unwrap_or(type_name);
    base.rsplit("::").next().unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Probe;

    impl Trackable for Probe {
        fn fields(&self) -> Vec<String> {
            Vec::new()
        }

        fn read_field(&self, name: &str) -> Result<FieldValue, FieldError> {
            Err(FieldError::unknown(name))
        }
    }

    #[test]
    fn default_type_name_is_rust_path() {
        assert!(Probe.type_name().ends_with("Probe"));
        assert!(Probe.notifier().is_none());
    }

    #[test]
    fn short_names() {
        assert_eq!(short_type_name("app::jobs::Scheduler"), "Scheduler");
        assert_eq!(short_type_name("app::Cache<alloc::string::String>"), "Cache");
        assert_eq!(short_type_name("Plain"), "Plain");
    }

    #[test]
    fn key_follows_allocation_not_type() {
        let concrete = Arc::new(Probe);
        let erased: Arc<dyn Trackable> = concrete.clone();
        assert_eq!(ObjectKey::of(&concrete), ObjectKey::of(&erased));
        assert_ne!(ObjectKey::of(&concrete), ObjectKey::of(&Arc::new(Probe)));
    }

    #[test]
    fn detection_modes() {
        assert!(Detection::default().polls() && Detection::default().notifies());
        assert!(!Detection::Poll.notifies());
        assert!(!Detection::Notify.polls());
    }

    #[test]
    fn options_builder() {
        let opts = TrackOptions::new()
            .name("cache")
            .project("Storage")
            .exclude("secret")
            .detection(Detection::Poll);
        assert_eq!(opts.name.as_deref(), Some("cache"));
        assert_eq!(opts.project.as_deref(), Some("Storage"));
        assert_eq!(opts.exclude, ["secret"]);
        assert_eq!(opts.detection, Detection::Poll);
    }
}
