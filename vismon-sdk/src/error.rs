//! Error types for the monitoring engine.
//!
//! None of these escape the public registration, polling or discovery
//! operations: those log and skip the failing item. They surface only from
//! the trait seams (tracked objects, discovery providers) and from export
//! and configuration.

use thiserror::Error;

/// A field of a tracked object could not be read.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FieldError {
    /// The object does not expose a field with this name.
    #[error("unknown field: {field}")]
    Unknown {
        /// Requested field name.
        field: String,
    },

    /// The field exists but its value is currently unavailable.
    #[error("field {field} is unreadable: {reason}")]
    Unreadable {
        /// Field name.
        field: String,
        /// Why the read failed.
        reason: String,
    },
}

impl FieldError {
    /// Shorthand for [`FieldError::Unknown`].
    pub fn unknown(field: impl Into<String>) -> Self {
        FieldError::Unknown {
            field: field.into(),
        }
    }

    /// Shorthand for [`FieldError::Unreadable`].
    pub fn unreadable(field: impl Into<String>, reason: impl Into<String>) -> Self {
        FieldError::Unreadable {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// A discovery provider failed to enumerate its objects.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DiscoveryError {
    /// The provider's source is not available right now.
    #[error("discovery provider {provider} unavailable: {reason}")]
    Unavailable {
        /// Provider name.
        provider: String,
        /// Why enumeration failed.
        reason: String,
    },
}

/// Writing timing history or snapshots failed.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The destination could not be written.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A record could not be serialized.
    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Invalid engine configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A duration string did not parse.
    #[error("invalid duration {value:?}: expected a number followed by ns, us, ms or s")]
    InvalidDuration {
        /// The offending text.
        value: String,
    },

    /// An interval was zero.
    #[error("{setting} must be greater than zero")]
    ZeroInterval {
        /// Setting name.
        setting: &'static str,
    },

    /// A history capacity was zero.
    #[error("{setting} must hold at least one entry")]
    ZeroCapacity {
        /// Setting name.
        setting: &'static str,
    },
}
