//! Canonical snapshot forms used for change detection.
//!
//! A field's value is reduced to a string that compares equal exactly when
//! the values are equal. Compact JSON through `serde_json` is used: maps in
//! [`FieldValue`] are `BTreeMap`s, so keys come out sorted and the form is
//! stable for equal inputs.
//!
//! JSON has no spelling for NaN or the infinities and `serde_json` writes
//! them as `null`. [`canonical_value`] gives them bare tokens of their own
//! instead, which no JSON value can collide with.

use serde::Serialize;

use vismon_types::FieldValue;

use crate::error::FieldError;

/// Prefix of the placeholder produced for values that fail to serialize.
pub const UNSERIALIZABLE: &str = "<unserializable:";

/// Serialize a value into its canonical comparable form.
///
/// Never fails: a value the serializer rejects (for example a map with
/// non-string keys) is replaced by `<unserializable:TYPE>`. Every such value
/// of the same type compares equal, so changes inside it go unreported.
pub fn canonical_form<T: Serialize + ?Sized>(value: &T) -> String {
    match serde_json::to_string(value) {
        Ok(form) => form,
        Err(e) => {
            tracing::debug!(
                type_name = std::any::type_name::<T>(),
                error = %e,
                "value has no canonical form, using placeholder"
            );
            format!("{}{}>", UNSERIALIZABLE, std::any::type_name::<T>())
        }
    }
}

/// Canonical token of every NaN, whatever its payload.
pub const NAN_TOKEN: &str = "NaN";
/// Canonical token of positive infinity.
pub const INFINITY_TOKEN: &str = "Infinity";
/// Canonical token of negative infinity.
pub const NEG_INFINITY_TOKEN: &str = "-Infinity";

/// Canonical form of a field value, as used by object monitors.
///
/// Identical to [`canonical_form`] for values holding only finite numbers.
/// Non-finite floats, at any depth, become [`NAN_TOKEN`],
/// [`INFINITY_TOKEN`] or [`NEG_INFINITY_TOKEN`], so `Null`, NaN and the two
/// infinities all compare different.
pub fn canonical_value(value: &FieldValue) -> String {
    let mut out = String::new();
    write_canonical(&mut out, value);
    out
}

fn write_canonical(out: &mut String, value: &FieldValue) {
    match value {
        FieldValue::Float(f) if f.is_nan() => out.push_str(NAN_TOKEN),
        FieldValue::Float(f) if f.is_infinite() => out.push_str(if f.is_sign_positive() {
            INFINITY_TOKEN
        } else {
            NEG_INFINITY_TOKEN
        }),
        FieldValue::List(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(out, item);
            }
            out.push(']');
        }
        FieldValue::Map(entries) => {
            out.push('{');
            for (i, (key, item)) in entries.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&canonical_form(key.as_str()));
                out.push(':');
                write_canonical(out, item);
            }
            out.push('}');
        }
        scalar => out.push_str(&canonical_form(scalar)),
    }
}

/// Whether a freshly taken form differs from the one on record.
///
/// With no previous record there is nothing to compare against: the new
/// form becomes the baseline and no change is reported.
pub fn has_changed(previous: Option<&str>, current: &str) -> bool {
    previous.is_some_and(|prev| prev != current)
}

/// Convert any serializable value into a [`FieldValue`].
///
/// Convenient for [`Trackable`](crate::Trackable) implementations whose
/// fields hold structured data.
pub fn to_field_value<T: Serialize + ?Sized>(
    field: &str,
    value: &T,
) -> Result<FieldValue, FieldError> {
    let json = serde_json::to_value(value)
        .map_err(|e| FieldError::unreadable(field, e.to_string()))?;
    serde_json::from_value(json).map_err(|e| FieldError::unreadable(field, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, BTreeSet, HashMap};

    #[test]
    fn equal_values_have_equal_forms() {
        let a = FieldValue::from(vec!["x", "y"]);
        let b = FieldValue::from(vec!["x", "y"]);
        assert_eq!(canonical_form(&a), canonical_form(&b));
    }

    #[test]
    fn map_order_does_not_matter() {
        let mut first = BTreeMap::new();
        first.insert("b".to_string(), 2);
        first.insert("a".to_string(), 1);
        let mut second = BTreeMap::new();
        second.insert("a".to_string(), 1);
        second.insert("b".to_string(), 2);
        assert_eq!(
            canonical_form(&FieldValue::from(first)),
            canonical_form(&FieldValue::from(second))
        );
    }

    #[test]
    fn text_and_number_differ() {
        assert_ne!(
            canonical_form(&FieldValue::from("1")),
            canonical_form(&FieldValue::from(1))
        );
    }

    #[test]
    fn unserializable_value_gets_placeholder() {
        let mut map: HashMap<(u8, u8), u8> = HashMap::new();
        map.insert((1, 2), 3);
        let form = canonical_form(&map);
        assert!(form.starts_with(UNSERIALIZABLE), "got {form}");
    }

    #[test]
    fn first_observation_is_not_a_change() {
        assert!(!has_changed(None, "\"Idle\""));
        assert!(!has_changed(Some("\"Idle\""), "\"Idle\""));
        assert!(has_changed(Some("\"Idle\""), "\"Running\""));
    }

    #[test]
    fn null_and_non_finite_floats_are_distinct() {
        let forms: BTreeSet<String> = [
            FieldValue::Null,
            FieldValue::Float(f64::NAN),
            FieldValue::Float(f64::INFINITY),
            FieldValue::Float(f64::NEG_INFINITY),
            FieldValue::from("NaN"),
        ]
        .iter()
        .map(canonical_value)
        .collect();
        assert_eq!(forms.len(), 5);

        let null = canonical_value(&FieldValue::Null);
        let nan = canonical_value(&FieldValue::Float(f64::NAN));
        let inf = canonical_value(&FieldValue::Float(f64::INFINITY));
        assert!(has_changed(Some(&null), &nan));
        assert!(has_changed(Some(&nan), &null));
        assert!(has_changed(Some(&nan), &inf));
        assert!(!has_changed(Some(&nan), &canonical_value(&FieldValue::Float(-f64::NAN))));
    }

    #[test]
    fn nested_non_finite_floats_are_tagged() {
        let mut map = BTreeMap::new();
        map.insert("load".to_string(), FieldValue::Float(f64::INFINITY));
        let value = FieldValue::List(vec![FieldValue::Float(f64::NAN), FieldValue::Map(map)]);
        assert_eq!(canonical_value(&value), "[NaN,{\"load\":Infinity}]");
    }

    #[test]
    fn finite_values_match_the_json_form() {
        let mut map = BTreeMap::new();
        map.insert("b".to_string(), FieldValue::Float(1.5));
        map.insert("a".to_string(), FieldValue::from(vec!["x"]));
        for value in [
            FieldValue::Null,
            FieldValue::Bool(true),
            FieldValue::Int(-3),
            FieldValue::UInt(u64::MAX),
            FieldValue::from("quote \" inside"),
            FieldValue::Map(map),
        ] {
            assert_eq!(canonical_value(&value), canonical_form(&value));
        }
    }

    #[test]
    fn structured_values_convert() {
        #[derive(Serialize)]
        struct Progress {
            done: u32,
            total: u32,
        }

        let value = to_field_value("progress", &Progress { done: 3, total: 10 }).unwrap();
        assert_eq!(value.to_string(), "{done: 3, total: 10}");
    }

    #[test]
    fn conversion_failure_names_the_field() {
        let mut map: HashMap<(u8, u8), u8> = HashMap::new();
        map.insert((1, 2), 3);
        let err = to_field_value("grid", &map).unwrap_err();
        assert!(matches!(err, FieldError::Unreadable { ref field, .. } if field == "grid"));
    }
}
