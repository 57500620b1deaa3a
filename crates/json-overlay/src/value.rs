//! Value representations.
//!
//! A value lives in one of three representations:
//!
//! - native: a plain [`serde_json::Value`] handed over by a decoder,
//! - immutable: [`ImmutableValue`], whose containers are [`ImmutableMap`] and
//!   [`ImmutableSequence`] snapshots,
//! - mutable: [`MutableValue`], whose containers are [`MutableMap`] and
//!   [`MutableSequence`] copy-on-write overlays.
//!
//! [`AnyValue`] holds any of the three and is what every write accepts.

use std::fmt;

use serde_json::{Map, Number, Value};

use crate::error::{OverlayError, Result};
use crate::immutable::{ImmutableMap, ImmutableSequence};
use crate::mutable::dirty::ParentRef;
use crate::mutable::{MutableMap, MutableSequence};

// ── ValueKind ─────────────────────────────────────────────────────────────

/// Runtime shape of a value, independent of its representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Bool,
    Number,
    String,
    Map,
    Sequence,
}

impl ValueKind {
    /// Shape of a native value.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Number(_) => ValueKind::Number,
            Value::String(_) => ValueKind::String,
            Value::Object(_) => ValueKind::Map,
            Value::Array(_) => ValueKind::Sequence,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::Null => "null",
            ValueKind::Bool => "boolean",
            ValueKind::Number => "number",
            ValueKind::String => "string",
            ValueKind::Map => "map",
            ValueKind::Sequence => "sequence",
        }
    }

    /// Returns true for [`ValueKind::Map`] and [`ValueKind::Sequence`].
    pub fn is_container(&self) -> bool {
        matches!(self, ValueKind::Map | ValueKind::Sequence)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── ImmutableValue ────────────────────────────────────────────────────────

/// A value read from an immutable snapshot.
///
/// Nested containers are always [`ImmutableMap`] / [`ImmutableSequence`];
/// cloning one shares the instance.
#[derive(Debug, Clone)]
pub enum ImmutableValue {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Map(ImmutableMap),
    Sequence(ImmutableSequence),
}

impl ImmutableValue {
    /// Wraps a native value. Containers are moved into a new snapshot
    /// without copying their contents.
    pub fn from_native(value: Value) -> Self {
        match value {
            Value::Null => ImmutableValue::Null,
            Value::Bool(b) => ImmutableValue::Bool(b),
            Value::Number(n) => ImmutableValue::Number(n),
            Value::String(s) => ImmutableValue::String(s),
            Value::Object(map) => ImmutableValue::Map(ImmutableMap::new(map)),
            Value::Array(items) => ImmutableValue::Sequence(ImmutableSequence::new(items)),
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            ImmutableValue::Null => ValueKind::Null,
            ImmutableValue::Bool(_) => ValueKind::Bool,
            ImmutableValue::Number(_) => ValueKind::Number,
            ImmutableValue::String(_) => ValueKind::String,
            ImmutableValue::Map(_) => ValueKind::Map,
            ImmutableValue::Sequence(_) => ValueKind::Sequence,
        }
    }

    pub fn is_container(&self) -> bool {
        self.kind().is_container()
    }

    pub fn as_map(&self) -> Option<&ImmutableMap> {
        match self {
            ImmutableValue::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&ImmutableSequence> {
        match self {
            ImmutableValue::Sequence(seq) => Some(seq),
            _ => None,
        }
    }

    /// Deep copy into a native graph the caller may mutate freely.
    pub fn export(&self) -> Value {
        match self {
            ImmutableValue::Null => Value::Null,
            ImmutableValue::Bool(b) => Value::Bool(*b),
            ImmutableValue::Number(n) => Value::Number(n.clone()),
            ImmutableValue::String(s) => Value::String(s.clone()),
            ImmutableValue::Map(map) => Value::Object(map.export()),
            ImmutableValue::Sequence(seq) => Value::Array(seq.export()),
        }
    }

    /// Derives a mutable view. Scalars are copied, containers get an O(1)
    /// overlay whose base is the snapshot.
    pub fn derive_mutable(&self) -> MutableValue {
        match self {
            ImmutableValue::Map(map) => MutableValue::Map(map.derive_mutable()),
            ImmutableValue::Sequence(seq) => MutableValue::Sequence(seq.derive_mutable()),
            scalar => thaw_scalar(scalar),
        }
    }

    /// Native form of a scalar, `None` for containers.
    pub(crate) fn scalar_native(&self) -> Option<Value> {
        match self {
            ImmutableValue::Null => Some(Value::Null),
            ImmutableValue::Bool(b) => Some(Value::Bool(*b)),
            ImmutableValue::Number(n) => Some(Value::Number(n.clone())),
            ImmutableValue::String(s) => Some(Value::String(s.clone())),
            ImmutableValue::Map(_) | ImmutableValue::Sequence(_) => None,
        }
    }
}

// ── MutableValue ──────────────────────────────────────────────────────────

/// A value read from a mutable overlay.
///
/// Nested containers are always [`MutableMap`] / [`MutableSequence`] handles;
/// writing through one is visible to every holder of the same instance.
#[derive(Debug, Clone)]
pub enum MutableValue {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Map(MutableMap),
    Sequence(MutableSequence),
}

impl MutableValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            MutableValue::Null => ValueKind::Null,
            MutableValue::Bool(_) => ValueKind::Bool,
            MutableValue::Number(_) => ValueKind::Number,
            MutableValue::String(_) => ValueKind::String,
            MutableValue::Map(_) => ValueKind::Map,
            MutableValue::Sequence(_) => ValueKind::Sequence,
        }
    }

    pub fn is_container(&self) -> bool {
        self.kind().is_container()
    }

    pub fn as_map(&self) -> Option<&MutableMap> {
        match self {
            MutableValue::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&MutableSequence> {
        match self {
            MutableValue::Sequence(seq) => Some(seq),
            _ => None,
        }
    }

    /// Immutable snapshot of the value. See [`MutableMap::freeze`].
    pub fn freeze(&self) -> ImmutableValue {
        match self {
            MutableValue::Null => ImmutableValue::Null,
            MutableValue::Bool(b) => ImmutableValue::Bool(*b),
            MutableValue::Number(n) => ImmutableValue::Number(n.clone()),
            MutableValue::String(s) => ImmutableValue::String(s.clone()),
            MutableValue::Map(map) => ImmutableValue::Map(map.freeze()),
            MutableValue::Sequence(seq) => ImmutableValue::Sequence(seq.freeze()),
        }
    }

    /// Deep copy into a native graph the caller may mutate freely.
    pub fn export(&self) -> Value {
        match self {
            MutableValue::Null => Value::Null,
            MutableValue::Bool(b) => Value::Bool(*b),
            MutableValue::Number(n) => Value::Number(n.clone()),
            MutableValue::String(s) => Value::String(s.clone()),
            MutableValue::Map(map) => Value::Object(map.export()),
            MutableValue::Sequence(seq) => Value::Array(seq.export()),
        }
    }

    /// Sets `key` when the value is a map.
    pub fn set_key(&self, key: impl Into<String>, value: impl Into<AnyValue>) -> Result<()> {
        match self {
            MutableValue::Map(map) => {
                map.set(key, value);
                Ok(())
            }
            other => Err(invalid_receiver("set key on", other.kind())),
        }
    }

    /// Deletes `key` when the value is a map, returning whether it existed.
    pub fn delete_key(&self, key: &str) -> Result<bool> {
        match self {
            MutableValue::Map(map) => Ok(map.delete(key)),
            other => Err(invalid_receiver("delete key from", other.kind())),
        }
    }

    /// Sets position `index` when the value is a sequence.
    pub fn set_index(&self, index: usize, value: impl Into<AnyValue>) -> Result<()> {
        match self {
            MutableValue::Sequence(seq) => seq.set(index, value),
            other => Err(invalid_receiver("set index on", other.kind())),
        }
    }

    /// Appends when the value is a sequence.
    pub fn push(&self, value: impl Into<AnyValue>) -> Result<()> {
        match self {
            MutableValue::Sequence(seq) => {
                seq.push(value);
                Ok(())
            }
            other => Err(invalid_receiver("push to", other.kind())),
        }
    }

    /// Prepends when the value is a sequence.
    pub fn push_front(&self, value: impl Into<AnyValue>) -> Result<()> {
        match self {
            MutableValue::Sequence(seq) => {
                seq.push_front(value);
                Ok(())
            }
            other => Err(invalid_receiver("push-front to", other.kind())),
        }
    }

    pub(crate) fn add_parent(&self, parent: ParentRef) {
        match self {
            MutableValue::Map(map) => map.add_parent(parent),
            MutableValue::Sequence(seq) => seq.add_parent(parent),
            _ => {}
        }
    }
}

fn invalid_receiver(action: &str, kind: ValueKind) -> OverlayError {
    OverlayError::InvalidOperation(format!("{action} {kind} value"))
}

// ── AnyValue ──────────────────────────────────────────────────────────────

/// A value in any representation.
///
/// Overlays store writes as `AnyValue` and convert nested containers to
/// mutable overlays the first time they are read.
#[derive(Debug, Clone)]
pub enum AnyValue {
    Native(Value),
    Immutable(ImmutableValue),
    Mutable(MutableValue),
}

impl AnyValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            AnyValue::Native(v) => ValueKind::of(v),
            AnyValue::Immutable(v) => v.kind(),
            AnyValue::Mutable(v) => v.kind(),
        }
    }

    /// Deep copy into a native graph the caller may mutate freely.
    pub fn export(&self) -> Value {
        match self {
            AnyValue::Native(v) => v.clone(),
            AnyValue::Immutable(v) => v.export(),
            AnyValue::Mutable(v) => v.export(),
        }
    }
}

impl From<Value> for AnyValue {
    fn from(value: Value) -> Self {
        AnyValue::Native(value)
    }
}

impl From<Map<String, Value>> for AnyValue {
    fn from(map: Map<String, Value>) -> Self {
        AnyValue::Native(Value::Object(map))
    }
}

impl From<Vec<Value>> for AnyValue {
    fn from(items: Vec<Value>) -> Self {
        AnyValue::Native(Value::Array(items))
    }
}

impl From<ImmutableValue> for AnyValue {
    fn from(value: ImmutableValue) -> Self {
        AnyValue::Immutable(value)
    }
}

impl From<MutableValue> for AnyValue {
    fn from(value: MutableValue) -> Self {
        AnyValue::Mutable(value)
    }
}

impl From<ImmutableMap> for AnyValue {
    fn from(map: ImmutableMap) -> Self {
        AnyValue::Immutable(ImmutableValue::Map(map))
    }
}

impl From<ImmutableSequence> for AnyValue {
    fn from(seq: ImmutableSequence) -> Self {
        AnyValue::Immutable(ImmutableValue::Sequence(seq))
    }
}

impl From<MutableMap> for AnyValue {
    fn from(map: MutableMap) -> Self {
        AnyValue::Mutable(MutableValue::Map(map))
    }
}

impl From<MutableSequence> for AnyValue {
    fn from(seq: MutableSequence) -> Self {
        AnyValue::Mutable(MutableValue::Sequence(seq))
    }
}

macro_rules! any_value_from_scalar {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for AnyValue {
                fn from(value: $ty) -> Self {
                    AnyValue::Native(Value::from(value))
                }
            }
        )*
    };
}

any_value_from_scalar!(bool, i32, i64, u32, u64, usize, f64, String, &str);

// ── ValueRef ──────────────────────────────────────────────────────────────

/// A borrowed view over a value in any representation.
///
/// Container handles are reference counted, so views over them own a cheap
/// handle clone; native values are borrowed.
#[derive(Debug, Clone)]
pub enum ValueRef<'a> {
    Native(&'a Value),
    Immutable(ImmutableValue),
    Mutable(MutableValue),
}

impl ValueRef<'_> {
    pub fn kind(&self) -> ValueKind {
        match self {
            ValueRef::Native(v) => ValueKind::of(v),
            ValueRef::Immutable(v) => v.kind(),
            ValueRef::Mutable(v) => v.kind(),
        }
    }
}

/// Types that can be viewed as a [`ValueRef`], accepted by
/// [`equal`](crate::equal) and [`export`](crate::export).
pub trait AsValueRef {
    fn as_value_ref(&self) -> ValueRef<'_>;
}

impl AsValueRef for Value {
    fn as_value_ref(&self) -> ValueRef<'_> {
        ValueRef::Native(self)
    }
}

impl AsValueRef for ImmutableValue {
    fn as_value_ref(&self) -> ValueRef<'_> {
        ValueRef::Immutable(self.clone())
    }
}

impl AsValueRef for MutableValue {
    fn as_value_ref(&self) -> ValueRef<'_> {
        ValueRef::Mutable(self.clone())
    }
}

impl AsValueRef for AnyValue {
    fn as_value_ref(&self) -> ValueRef<'_> {
        match self {
            AnyValue::Native(v) => ValueRef::Native(v),
            AnyValue::Immutable(v) => ValueRef::Immutable(v.clone()),
            AnyValue::Mutable(v) => ValueRef::Mutable(v.clone()),
        }
    }
}

impl AsValueRef for ImmutableMap {
    fn as_value_ref(&self) -> ValueRef<'_> {
        ValueRef::Immutable(ImmutableValue::Map(self.clone()))
    }
}

impl AsValueRef for ImmutableSequence {
    fn as_value_ref(&self) -> ValueRef<'_> {
        ValueRef::Immutable(ImmutableValue::Sequence(self.clone()))
    }
}

impl AsValueRef for MutableMap {
    fn as_value_ref(&self) -> ValueRef<'_> {
        ValueRef::Mutable(MutableValue::Map(self.clone()))
    }
}

impl AsValueRef for MutableSequence {
    fn as_value_ref(&self) -> ValueRef<'_> {
        ValueRef::Mutable(MutableValue::Sequence(self.clone()))
    }
}

impl<T: AsValueRef + ?Sized> AsValueRef for &T {
    fn as_value_ref(&self) -> ValueRef<'_> {
        (**self).as_value_ref()
    }
}

// ── Slot helpers ──────────────────────────────────────────────────────────

fn thaw_scalar(value: &ImmutableValue) -> MutableValue {
    match value {
        ImmutableValue::Bool(b) => MutableValue::Bool(*b),
        ImmutableValue::Number(n) => MutableValue::Number(n.clone()),
        ImmutableValue::String(s) => MutableValue::String(s.clone()),
        _ => MutableValue::Null,
    }
}

/// Turns an immutable value into its mutable counterpart, registering
/// `parent` on a new container overlay.
pub(crate) fn thaw(value: ImmutableValue, parent: &ParentRef) -> MutableValue {
    match value {
        ImmutableValue::Map(map) => MutableValue::Map(MutableMap::with_parent(map, parent.clone())),
        ImmutableValue::Sequence(seq) => {
            MutableValue::Sequence(MutableSequence::with_parent(seq, parent.clone()))
        }
        scalar => thaw_scalar(&scalar),
    }
}

/// Reads an overlay slot as a mutable value.
///
/// Native and immutable containers are wrapped in a mutable overlay the
/// first time and the slot is replaced with it, so later reads return the
/// same instance.
pub(crate) fn touch(slot: &mut AnyValue, parent: &ParentRef) -> MutableValue {
    let frozen = match slot {
        AnyValue::Mutable(v) => return v.clone(),
        AnyValue::Immutable(v) => v.clone(),
        AnyValue::Native(v) if v.is_object() || v.is_array() => ImmutableValue::from_native(v.take()),
        AnyValue::Native(v) => ImmutableValue::from_native(v.clone()),
    };
    let value = thaw(frozen, parent);
    if value.is_container() {
        *slot = AnyValue::Mutable(value.clone());
    }
    value
}

/// Freezes an overlay slot. Native containers are wrapped once and the slot
/// keeps the wrapper so repeated freezes share it.
pub(crate) fn freeze_slot(slot: &mut AnyValue) -> ImmutableValue {
    match slot {
        AnyValue::Mutable(v) => v.freeze(),
        AnyValue::Immutable(v) => v.clone(),
        AnyValue::Native(v) if v.is_object() || v.is_array() => {
            let frozen = ImmutableValue::from_native(v.take());
            *slot = AnyValue::Immutable(frozen.clone());
            frozen
        }
        AnyValue::Native(v) => ImmutableValue::from_native(v.clone()),
    }
}
