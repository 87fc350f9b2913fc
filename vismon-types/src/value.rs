//! Field values observed on tracked objects.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

/// A value read from one field of a tracked object.
///
/// Tracked types report their state as `FieldValue`s rather than being
/// inspected reflectively. The same value is kept for display and, in its
/// canonical serialized form, for change detection.
///
/// With the `serde` feature the value serializes untagged, so a
/// `Text("Idle")` becomes the JSON string `"Idle"` and a `Map` becomes a
/// JSON object with sorted keys.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
#[cfg_attr(feature = "minicbor", derive(minicbor::Encode, minicbor::Decode))]
pub enum FieldValue {
    /// Absent value.
    #[default]
    #[cfg_attr(feature = "minicbor", n(0))]
    Null,
    /// Boolean flag.
    #[cfg_attr(feature = "minicbor", n(1))]
    Bool(#[cfg_attr(feature = "minicbor", n(0))] bool),
    /// Signed integer.
    #[cfg_attr(feature = "minicbor", n(2))]
    Int(#[cfg_attr(feature = "minicbor", n(0))] i64),
    /// Unsigned integer too large for `Int`.
    #[cfg_attr(feature = "minicbor", n(3))]
    UInt(#[cfg_attr(feature = "minicbor", n(0))] u64),
    /// Floating point number.
    #[cfg_attr(feature = "minicbor", n(4))]
    Float(#[cfg_attr(feature = "minicbor", n(0))] f64),
    /// Text.
    #[cfg_attr(feature = "minicbor", n(5))]
    Text(#[cfg_attr(feature = "minicbor", n(0))] String),
    /// Ordered sequence.
    #[cfg_attr(feature = "minicbor", n(6))]
    List(#[cfg_attr(feature = "minicbor", n(0))] Vec<FieldValue>),
    /// Keyed record, sorted by key.
    #[cfg_attr(feature = "minicbor", n(7))]
    Map(#[cfg_attr(feature = "minicbor", n(0))] BTreeMap<String, FieldValue>),
}

impl FieldValue {
    /// True for [`FieldValue::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Borrow the text, if this is a `Text` value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view of `Int`, `UInt` and `Float` values.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Int(v) => Some(*v as f64),
            FieldValue::UInt(v) => Some(*v as f64),
            FieldValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Short label for the variant, used by presentation adapters.
    pub fn kind(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Bool(_) => "bool",
            FieldValue::Int(_) | FieldValue::UInt(_) => "integer",
            FieldValue::Float(_) => "float",
            FieldValue::Text(_) => "text",
            FieldValue::List(_) => "list",
            FieldValue::Map(_) => "map",
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => f.write_str("null"),
            FieldValue::Bool(v) => write!(f, "{}", v),
            FieldValue::Int(v) => write!(f, "{}", v),
            FieldValue::UInt(v) => write!(f, "{}", v),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Text(v) => f.write_str(v),
            FieldValue::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            FieldValue::Map(entries) => {
                f.write_str("{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                f.write_str("}")
            }
        }
    }
}

macro_rules! from_signed {
    ($($t:ty),*) => {
        $(impl From<$t> for FieldValue {
            fn from(v: $t) -> Self {
                FieldValue::Int(v as i64)
            }
        })*
    };
}

macro_rules! from_unsigned {
    ($($t:ty),*) => {
        $(impl From<$t> for FieldValue {
            fn from(v: $t) -> Self {
                let v = v as u64;
                if v <= i64::MAX as u64 {
                    FieldValue::Int(v as i64)
                } else {
                    FieldValue::UInt(v)
                }
            }
        })*
    };
}

from_signed!(i8, i16, i32, i64, isize);
from_unsigned!(u8, u16, u32, u64, usize);

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<f32> for FieldValue {
    fn from(v: f32) -> Self {
        FieldValue::Float(v as f64)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<char> for FieldValue {
    fn from(v: char) -> Self {
        let mut s = String::new();
        s.push(v);
        FieldValue::Text(s)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(String::from(v))
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(FieldValue::Null, Into::into)
    }
}

impl<T: Into<FieldValue>> From<Vec<T>> for FieldValue {
    fn from(v: Vec<T>) -> Self {
        FieldValue::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<FieldValue>> From<BTreeMap<String, T>> for FieldValue {
    fn from(v: BTreeMap<String, T>) -> Self {
        FieldValue::Map(v.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}
