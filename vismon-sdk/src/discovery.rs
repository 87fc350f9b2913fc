//! Discovery of objects that ask to be tracked.
//!
//! An application (or a plugin host) exposes candidate objects through a
//! [`DiscoveryProvider`]. Each candidate carries a [`TrackMarker`] that says
//! whether, and how, it wants to be monitored. The engine scans providers
//! periodically and registers every opted-in object it has not seen yet.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::DiscoveryError;
use crate::trackable::{TrackOptions, Trackable};

/// Opt-in marker attached to a discoverable object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackMarker {
    /// Display name; defaults to the short type name.
    pub name: Option<String>,
    /// Category shown in snapshots.
    pub category: Option<String>,
    /// Project; defaults to `"Default"`.
    pub project: Option<String>,
    /// Whether discovery should register the object.
    pub auto_track: bool,
}

impl TrackMarker {
    /// A marker that opts in, with every other attribute defaulted.
    pub fn auto() -> Self {
        Self {
            name: None,
            category: None,
            project: None,
            auto_track: true,
        }
    }

    /// A marker that opts out.
    pub fn manual() -> Self {
        Self {
            auto_track: false,
            ..Self::auto()
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    /// Registration options carrying this marker's attributes.
    pub fn to_options(&self) -> TrackOptions {
        TrackOptions {
            name: self.name.clone(),
            project: self.project.clone(),
            category: self.category.clone(),
            ..TrackOptions::default()
        }
    }
}

impl Default for TrackMarker {
    fn default() -> Self {
        Self::auto()
    }
}

/// A candidate produced by a provider.
#[derive(Clone)]
pub struct Discovered {
    /// The object itself.
    pub object: Arc<dyn Trackable>,
    /// Its tracking marker.
    pub marker: TrackMarker,
}

impl Discovered {
    pub fn new(object: Arc<dyn Trackable>, marker: TrackMarker) -> Self {
        Self { object, marker }
    }
}

impl fmt::Debug for Discovered {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Discovered")
            .field("type_name", &self.object.type_name())
            .field("marker", &self.marker)
            .finish()
    }
}

/// Enumerates objects that may want to be tracked.
///
/// Called from the engine's discovery task; keep it cheap. A failing
/// provider is logged and skipped for that scan.
pub trait DiscoveryProvider: Send + Sync {
    /// Provider name used in logs.
    fn name(&self) -> &str;

    /// Current candidates.
    fn discover(&self) -> Result<Vec<Discovered>, DiscoveryError>;
}

/// Singletons pushed by the application at startup.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use vismon_sdk::{Engine, FieldError, FieldValue};
/// use vismon_sdk::{SingletonRegistry, TrackMarker, Trackable};
///
/// struct Config;
///
/// impl Trackable for Config {
///     fn fields(&self) -> Vec<String> {
///         vec!["mode".into()]
///     }
///     fn read_field(&self, name: &str) -> Result<FieldValue, FieldError> {
///         match name {
///             "mode" => Ok("fast".into()),
///             other => Err(FieldError::unknown(other)),
///         }
///     }
/// }
///
/// let singletons = Arc::new(SingletonRegistry::new("services"));
/// let config = Arc::new(Config);
/// singletons.add(config.clone(), TrackMarker::auto().project("Settings"));
///
/// let engine = Engine::new();
/// engine.add_provider(singletons);
/// assert_eq!(engine.discover_now(), 1);
/// assert!(engine.is_registered(&config));
/// ```
pub struct SingletonRegistry {
    name: String,
    entries: RwLock<Vec<Discovered>>,
}

impl SingletonRegistry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Add a singleton. The registry keeps it alive.
    pub fn add<T: Trackable>(&self, object: Arc<T>, marker: TrackMarker) {
        self.entries.write().push(Discovered::new(object, marker));
    }

    /// Add an already type-erased singleton.
    pub fn add_dyn(&self, object: Arc<dyn Trackable>, marker: TrackMarker) {
        self.entries.write().push(Discovered::new(object, marker));
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl DiscoveryProvider for SingletonRegistry {
    fn name(&self) -> &str {
        &self.name
    }

    fn discover(&self) -> Result<Vec<Discovered>, DiscoveryError> {
        Ok(self.entries.read().clone())
    }
}

impl fmt::Debug for SingletonRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingletonRegistry")
            .field("name", &self.name)
            .field("entries", &self.len())
            .finish()
    }
}

/// A provider backed by a closure.
pub struct FnProvider<F> {
    name: String,
    discover: F,
}

impl<F> FnProvider<F>
where
    F: Fn() -> Result<Vec<Discovered>, DiscoveryError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, discover: F) -> Self {
        Self {
            name: name.into(),
            discover,
        }
    }
}

impl<F> DiscoveryProvider for FnProvider<F>
where
    F: Fn() -> Result<Vec<Discovered>, DiscoveryError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn discover(&self) -> Result<Vec<Discovered>, DiscoveryError> {
        (self.discover)()
    }
}

impl<F> fmt::Debug for FnProvider<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnProvider").field("name", &self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FieldError;
    use vismon_types::FieldValue;

    struct Flag;

    impl Trackable for Flag {
        fn fields(&self) -> Vec<String> {
            vec!["on".into()]
        }

        fn read_field(&self, _name: &str) -> Result<FieldValue, FieldError> {
            Ok(true.into())
        }
    }

    #[test]
    fn marker_maps_to_options() {
        let marker = TrackMarker::auto()
            .name("flags")
            .project("Settings")
            .category("config");
        let options = marker.to_options();
        assert_eq!(options.name.as_deref(), Some("flags"));
        assert_eq!(options.project.as_deref(), Some("Settings"));
        assert_eq!(options.category.as_deref(), Some("config"));
        assert!(!TrackMarker::manual().auto_track);
    }

    #[test]
    fn singleton_registry_lists_entries() {
        let registry = SingletonRegistry::new("app");
        registry.add(Arc::new(Flag), TrackMarker::auto());
        registry.add_dyn(Arc::new(Flag), TrackMarker::manual());
        let found = registry.discover().unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(registry.name(), "app");
    }

    #[test]
    fn fn_provider_propagates_errors() {
        let provider = FnProvider::new("flaky", || {
            Err(DiscoveryError::Unavailable {
                provider: "flaky".into(),
                reason: "plugin host offline".into(),
            })
        });
        assert!(provider.discover().is_err());
        assert_eq!(provider.name(), "flaky");
    }
}
