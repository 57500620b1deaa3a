//! Structural equality across representations.

use std::borrow::Cow;

use serde_json::{Map, Value};

use crate::immutable::{ImmutableMap, ImmutableSequence};
use crate::mutable::{MutableMap, MutableSequence};
use crate::value::{AnyValue, AsValueRef, ImmutableValue, MutableValue, ValueRef};

/// Deep structural equality between values in any representation.
///
/// Two values are equal when their exported native forms would be deeply
/// equal, so an [`ImmutableMap`], a [`MutableMap`] and a native object
/// holding the same data all compare equal. Identical instances, and a clean
/// overlay compared with the snapshot it was derived from, are recognized
/// without walking their contents.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use json_overlay::{equal, ImmutableMap};
///
/// let base = ImmutableMap::try_from(json!({"a": [1, 2]})).unwrap();
/// let overlay = base.derive_mutable();
/// assert!(equal(&base, &overlay));
///
/// overlay.set("a", json!([1, 2]));
/// assert!(equal(&overlay, &json!({"a": [1, 2]})));
/// ```
pub fn equal<A, B>(a: &A, b: &B) -> bool
where
    A: AsValueRef + ?Sized,
    B: AsValueRef + ?Sized,
{
    equal_refs(a.as_value_ref(), b.as_value_ref())
}

enum Shape<'a> {
    Scalar(Cow<'a, Value>),
    Map(MapRef<'a>),
    Sequence(SeqRef<'a>),
}

enum MapRef<'a> {
    Native(&'a Map<String, Value>),
    Immutable(ImmutableMap),
    Mutable(MutableMap),
}

enum SeqRef<'a> {
    Native(&'a [Value]),
    Immutable(ImmutableSequence),
    Mutable(MutableSequence),
}

fn shape(value: ValueRef<'_>) -> Shape<'_> {
    match value {
        ValueRef::Native(Value::Object(map)) => Shape::Map(MapRef::Native(map)),
        ValueRef::Native(Value::Array(items)) => Shape::Sequence(SeqRef::Native(items)),
        ValueRef::Native(scalar) => Shape::Scalar(Cow::Borrowed(scalar)),
        ValueRef::Immutable(ImmutableValue::Map(map)) => Shape::Map(MapRef::Immutable(map)),
        ValueRef::Immutable(ImmutableValue::Sequence(seq)) => {
            Shape::Sequence(SeqRef::Immutable(seq))
        }
        ValueRef::Immutable(scalar) => Shape::Scalar(Cow::Owned(scalar.export())),
        ValueRef::Mutable(MutableValue::Map(map)) => Shape::Map(MapRef::Mutable(map)),
        ValueRef::Mutable(MutableValue::Sequence(seq)) => Shape::Sequence(SeqRef::Mutable(seq)),
        ValueRef::Mutable(scalar) => Shape::Scalar(Cow::Owned(scalar.export())),
    }
}

fn equal_refs(a: ValueRef<'_>, b: ValueRef<'_>) -> bool {
    match (shape(a), shape(b)) {
        (Shape::Scalar(a), Shape::Scalar(b)) => a == b,
        (Shape::Map(a), Shape::Map(b)) => equal_maps(&a, &b),
        (Shape::Sequence(a), Shape::Sequence(b)) => equal_sequences(&a, &b),
        _ => false,
    }
}

impl<'a> MapRef<'a> {
    fn len(&self) -> usize {
        match self {
            MapRef::Native(map) => map.len(),
            MapRef::Immutable(map) => map.len(),
            MapRef::Mutable(map) => map.len(),
        }
    }

    fn entries(&self) -> Vec<(String, ValueRef<'a>)> {
        match self {
            MapRef::Native(map) => map
                .iter()
                .map(|(key, value)| (key.clone(), ValueRef::Native(value)))
                .collect(),
            MapRef::Immutable(map) => map
                .iter()
                .map(|(key, value)| (key, ValueRef::Immutable(value)))
                .collect(),
            MapRef::Mutable(map) => map
                .iter()
                .map(|(key, value)| (key, ValueRef::Mutable(value)))
                .collect(),
        }
    }

    fn get(&self, key: &str) -> Option<ValueRef<'a>> {
        match self {
            MapRef::Native(map) => map.get(key).map(ValueRef::Native),
            MapRef::Immutable(map) => map.get(key).map(ValueRef::Immutable),
            MapRef::Mutable(map) => map.get(key).map(ValueRef::Mutable),
        }
    }

    /// Same data by construction: the same instance, or a clean overlay
    /// and its base.
    fn identical(&self, other: &MapRef<'_>) -> bool {
        match (self, other) {
            (MapRef::Native(a), MapRef::Native(b)) => std::ptr::eq(*a, *b),
            (MapRef::Immutable(a), MapRef::Immutable(b)) => ImmutableMap::ptr_eq(a, b),
            (MapRef::Mutable(a), MapRef::Mutable(b)) => {
                MutableMap::ptr_eq(a, b)
                    || matches!(
                        (a.clean_base(), b.clean_base()),
                        (Some(x), Some(y)) if ImmutableMap::ptr_eq(&x, &y)
                    )
            }
            (MapRef::Mutable(m), MapRef::Immutable(i)) | (MapRef::Immutable(i), MapRef::Mutable(m)) => m
                .clean_base()
                .is_some_and(|base| ImmutableMap::ptr_eq(&base, i)),
            _ => false,
        }
    }
}

impl<'a> SeqRef<'a> {
    fn len(&self) -> usize {
        match self {
            SeqRef::Native(items) => items.len(),
            SeqRef::Immutable(seq) => seq.len(),
            SeqRef::Mutable(seq) => seq.len(),
        }
    }

    fn items(&self) -> Vec<ValueRef<'a>> {
        match self {
            SeqRef::Native(items) => items.iter().map(ValueRef::Native).collect(),
            SeqRef::Immutable(seq) => seq.iter().map(ValueRef::Immutable).collect(),
            SeqRef::Mutable(seq) => seq.iter().map(ValueRef::Mutable).collect(),
        }
    }

    fn identical(&self, other: &SeqRef<'_>) -> bool {
        match (self, other) {
            (SeqRef::Native(a), SeqRef::Native(b)) => std::ptr::eq(*a, *b),
            (SeqRef::Immutable(a), SeqRef::Immutable(b)) => ImmutableSequence::ptr_eq(a, b),
            (SeqRef::Mutable(a), SeqRef::Mutable(b)) => {
                MutableSequence::ptr_eq(a, b)
                    || matches!(
                        (a.clean_base(), b.clean_base()),
                        (Some(x), Some(y)) if ImmutableSequence::ptr_eq(&x, &y)
                    )
            }
            (SeqRef::Mutable(m), SeqRef::Immutable(i)) | (SeqRef::Immutable(i), SeqRef::Mutable(m)) => m
                .clean_base()
                .is_some_and(|base| ImmutableSequence::ptr_eq(&base, i)),
            _ => false,
        }
    }
}

fn equal_maps(a: &MapRef<'_>, b: &MapRef<'_>) -> bool {
    if a.identical(b) {
        return true;
    }
    if a.len() != b.len() {
        return false;
    }
    a.entries().into_iter().all(|(key, value)| match b.get(&key) {
        Some(other) => equal_refs(value, other),
        None => false,
    })
}

fn equal_sequences(a: &SeqRef<'_>, b: &SeqRef<'_>) -> bool {
    if a.identical(b) {
        return true;
    }
    if a.len() != b.len() {
        return false;
    }
    a.items()
        .into_iter()
        .zip(b.items())
        .all(|(x, y)| equal_refs(x, y))
}

macro_rules! partial_eq_via_equal {
    ($($ty:ty),* $(,)?) => {
        $(
            impl PartialEq for $ty {
                fn eq(&self, other: &Self) -> bool {
                    equal(self, other)
                }
            }

            impl PartialEq<Value> for $ty {
                fn eq(&self, other: &Value) -> bool {
                    equal(self, other)
                }
            }
        )*
    };
}

partial_eq_via_equal!(
    ImmutableValue,
    MutableValue,
    AnyValue,
    ImmutableMap,
    ImmutableSequence,
    MutableMap,
    MutableSequence,
);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalars_compare_by_value() {
        assert!(equal(&json!(1), &ImmutableValue::from_native(json!(1))));
        assert!(!equal(&json!(1), &json!("1")));
        assert!(equal(&MutableValue::Null, &json!(null)));
    }

    #[test]
    fn shape_mismatch_is_unequal() {
        assert!(!equal(&json!({}), &json!([])));
        let map = ImmutableMap::try_from(json!({})).unwrap();
        assert!(!equal(&map, &json!(null)));
    }

    #[test]
    fn clean_overlay_matches_base_without_walking() {
        let base = ImmutableSequence::try_from(json!([[1], [2]])).unwrap();
        let overlay = base.derive_mutable();
        assert!(equal(&overlay, &base));
        assert!(!overlay.is_dirty());
    }

    #[test]
    fn dirty_overlay_compares_contents() {
        let base = ImmutableMap::try_from(json!({"a": 1})).unwrap();
        let overlay = base.derive_mutable();
        overlay.set("a", 1);
        assert!(overlay.is_dirty());
        assert!(equal(&overlay, &base));
        overlay.set("a", 2);
        assert!(!equal(&overlay, &base));
    }

    #[test]
    fn partial_eq_against_native() {
        let seq = ImmutableSequence::try_from(json!([1, {"b": true}])).unwrap();
        assert_eq!(seq, json!([1, {"b": true}]));
        assert_ne!(seq, json!([1, {"b": false}]));
    }
}
