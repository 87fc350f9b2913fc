//! Native change notifications.
//!
//! A tracked object that knows when it changes can own a [`ChangeNotifier`]
//! and expose it through [`Trackable::notifier`](crate::Trackable::notifier).
//! Monitors subscribe to it and diff immediately instead of waiting for the
//! next poll.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

/// Callback invoked with the changed field, or `None` for "anything may
/// have changed".
pub(crate) type NotifyCallback = Arc<dyn Fn(Option<&str>) + Send + Sync>;

/// Broadcasts "field changed" notifications to subscribed monitors.
///
/// Call [`notify`](Self::notify) after the new value is visible through
/// `read_field` and after releasing any lock that `read_field` takes:
/// subscribers read the field synchronously on the notifying thread.
///
/// # Example
///
/// ```rust
/// use parking_lot::RwLock;
/// use vismon_sdk::{ChangeNotifier, FieldError, FieldValue, Trackable};
///
/// #[derive(Default)]
/// struct Door {
///     open: RwLock<bool>,
///     notifier: ChangeNotifier,
/// }
///
/// impl Door {
///     fn set_open(&self, open: bool) {
///         *self.open.write() = open;
///         self.notifier.notify("open");
///     }
/// }
///
/// impl Trackable for Door {
///     fn fields(&self) -> Vec<String> {
///         vec!["open".to_string()]
///     }
///
///     fn read_field(&self, name: &str) -> Result<FieldValue, FieldError> {
///         match name {
///             "open" => Ok((*self.open.read()).into()),
///             other => Err(FieldError::unknown(other)),
///         }
///     }
///
///     fn notifier(&self) -> Option<&ChangeNotifier> {
///         Some(&self.notifier)
///     }
/// }
///
/// Door::default().set_open(true);
/// ```
#[derive(Default)]
pub struct ChangeNotifier {
    next_id: AtomicU64,
    subscribers: RwLock<Vec<(u64, NotifyCallback)>>,
}

impl ChangeNotifier {
    /// Create a notifier with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Announce that one field changed.
    pub fn notify(&self, field: &str) {
        self.dispatch(Some(field));
    }

    /// Announce that any field may have changed.
    pub fn notify_all(&self) {
        self.dispatch(None);
    }

    /// Number of subscribed monitors.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    pub(crate) fn subscribe(&self, callback: NotifyCallback) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.write().push((id, callback));
        id
    }

    pub(crate) fn unsubscribe(&self, id: u64) -> bool {
        let mut subscribers = self.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() != before
    }

    fn dispatch(&self, field: Option<&str>) {
        // Callbacks run without the lock held so they may unsubscribe.
        let callbacks: Vec<NotifyCallback> = self
            .subscribers
            .read()
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        for callback in callbacks {
            callback(field);
        }
    }
}

impl fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
