//! Deep export to native values and `serde` serialization.

use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::immutable::{ImmutableMap, ImmutableSequence};
use crate::mutable::{MutableMap, MutableSequence};
use crate::value::{AnyValue, AsValueRef, ImmutableValue, MutableValue, ValueRef};

/// Deep copy of any value into a native [`Value`].
///
/// The result shares nothing with the input: mutating it affects neither
/// the source nor any later export.
///
/// ```
/// use serde_json::json;
/// use json_overlay::{export, MutableSequence};
///
/// let seq = MutableSequence::from_native(json!([1, 2])).unwrap();
/// seq.push(3);
/// assert_eq!(export(&seq), json!([1, 2, 3]));
/// ```
pub fn export<V: AsValueRef + ?Sized>(value: &V) -> Value {
    match value.as_value_ref() {
        ValueRef::Native(value) => value.clone(),
        ValueRef::Immutable(value) => value.export(),
        ValueRef::Mutable(value) => value.export(),
    }
}

impl Serialize for ImmutableMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

impl Serialize for ImmutableSequence {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

impl Serialize for ImmutableValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ImmutableValue::Null => serializer.serialize_unit(),
            ImmutableValue::Bool(b) => serializer.serialize_bool(*b),
            ImmutableValue::Number(n) => n.serialize(serializer),
            ImmutableValue::String(s) => serializer.serialize_str(s),
            ImmutableValue::Map(map) => map.serialize(serializer),
            ImmutableValue::Sequence(seq) => seq.serialize(serializer),
        }
    }
}

// A clean overlay has the same contents as its base, which avoids
// promoting every nested container just to write it out.

impl Serialize for MutableMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.clean_base() {
            Some(base) => base.serialize(serializer),
            None => serializer.collect_map(self.iter()),
        }
    }
}

impl Serialize for MutableSequence {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.clean_base() {
            Some(base) => base.serialize(serializer),
            None => serializer.collect_seq(self.iter()),
        }
    }
}

impl Serialize for MutableValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            MutableValue::Null => serializer.serialize_unit(),
            MutableValue::Bool(b) => serializer.serialize_bool(*b),
            MutableValue::Number(n) => n.serialize(serializer),
            MutableValue::String(s) => serializer.serialize_str(s),
            MutableValue::Map(map) => map.serialize(serializer),
            MutableValue::Sequence(seq) => seq.serialize(serializer),
        }
    }
}

impl Serialize for AnyValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            AnyValue::Native(value) => value.serialize(serializer),
            AnyValue::Immutable(value) => value.serialize(serializer),
            AnyValue::Mutable(value) => value.serialize(serializer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn export_is_independent_of_source() {
        let map = MutableMap::from_native(json!({"a": {"b": 1}})).unwrap();
        let mut out = export(&map);
        out["a"]["b"] = json!(99);
        assert_eq!(export(&map), json!({"a": {"b": 1}}));
    }

    #[test]
    fn serialize_matches_export() {
        let map = ImmutableMap::try_from(json!({"x": [1, "two", null], "y": {"z": false}})).unwrap();
        let text = serde_json::to_string(&map).unwrap();
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, export(&map));
    }

    #[test]
    fn dirty_overlay_serializes_current_contents() {
        let seq = MutableSequence::from_native(json!([1, 2, 3])).unwrap();
        seq.push_front(0);
        seq.set(1, "one").unwrap();
        assert_eq!(serde_json::to_value(&seq).unwrap(), json!([0, "one", 2, 3]));
    }
}
