//! Read-only snapshots over native containers.
//!
//! [`ImmutableMap`] and [`ImmutableSequence`] wrap a native collection the
//! caller promises not to touch again. Nested containers are wrapped lazily,
//! exactly once per key or position, and the wrapper is cached so repeated
//! reads return the same instance.
//!
//! The cache is guarded by one mutex per snapshot. It is an internal
//! memoization detail: nothing observable about a snapshot changes after
//! construction, which is what makes the handles safe to share across
//! threads.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use serde_json::{Map, Value};

use crate::error::{OverlayError, Result};
use crate::mutable::{MutableMap, MutableSequence};
use crate::sync::lock;
use crate::value::{ImmutableValue, ValueKind};

fn is_container(value: &Value) -> bool {
    value.is_object() || value.is_array()
}

// ── ImmutableMap ──────────────────────────────────────────────────────────

/// An immutable map of string keys to values.
///
/// Cloning the handle shares the snapshot; use [`ImmutableMap::ptr_eq`] to
/// test identity.
#[derive(Clone)]
pub struct ImmutableMap {
    inner: Arc<MapInner>,
}

struct MapInner {
    len: usize,
    slots: Mutex<MapSlots>,
}

/// Native entries plus the wrappers already handed out for nested
/// containers. A wrapped entry's native slot is left as `Null`; `wrapped` is
/// always consulted first.
struct MapSlots {
    base: Map<String, Value>,
    wrapped: HashMap<String, ImmutableValue>,
}

impl MapSlots {
    fn resolve(&mut self, key: &str) -> Option<ImmutableValue> {
        if let Some(value) = self.wrapped.get(key) {
            return Some(value.clone());
        }
        let native = self.base.get_mut(key)?;
        if !is_container(native) {
            return Some(ImmutableValue::from_native(native.clone()));
        }
        let child = ImmutableValue::from_native(native.take());
        self.wrapped.insert(key.to_owned(), child.clone());
        Some(child)
    }
}

impl ImmutableMap {
    /// Wraps a native map. O(1); the map is not copied.
    pub fn new(base: Map<String, Value>) -> Self {
        Self::from_parts(base, HashMap::new())
    }

    pub fn empty() -> Self {
        Self::new(Map::new())
    }

    fn from_parts(base: Map<String, Value>, wrapped: HashMap<String, ImmutableValue>) -> Self {
        Self {
            inner: Arc::new(MapInner {
                len: base.len(),
                slots: Mutex::new(MapSlots { base, wrapped }),
            }),
        }
    }

    /// Builds a snapshot from already-frozen entries. Container values are
    /// installed as cached wrappers so they keep their identity.
    pub(crate) fn from_entries(entries: Vec<(String, ImmutableValue)>) -> Self {
        let mut base = Map::new();
        let mut wrapped = HashMap::new();
        for (key, value) in entries {
            match value.scalar_native() {
                Some(native) => {
                    base.insert(key, native);
                }
                None => {
                    base.insert(key.clone(), Value::Null);
                    wrapped.insert(key, value);
                }
            }
        }
        Self::from_parts(base, wrapped)
    }

    /// Returns the value for `key`. Nested containers come back as
    /// immutable wrappers, the same instance on every call.
    pub fn get(&self, key: &str) -> Option<ImmutableValue> {
        lock(&self.inner.slots).resolve(key)
    }

    pub fn has(&self, key: &str) -> bool {
        lock(&self.inner.slots).base.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.len
    }

    pub fn is_empty(&self) -> bool {
        self.inner.len == 0
    }

    pub fn keys(&self) -> Vec<String> {
        lock(&self.inner.slots).base.keys().cloned().collect()
    }

    /// All entries, in key order.
    pub fn iter(&self) -> std::vec::IntoIter<(String, ImmutableValue)> {
        let mut slots = lock(&self.inner.slots);
        let keys: Vec<String> = slots.base.keys().cloned().collect();
        let entries: Vec<_> = keys
            .into_iter()
            .filter_map(|key| {
                let value = slots.resolve(&key)?;
                Some((key, value))
            })
            .collect();
        entries.into_iter()
    }

    /// Derives a copy-on-write overlay with this snapshot as its base. O(1).
    pub fn derive_mutable(&self) -> MutableMap {
        MutableMap::from_base(self.clone())
    }

    /// Deep copy into a native map the caller may mutate freely.
    pub fn export(&self) -> Map<String, Value> {
        self.iter().map(|(key, value)| (key, value.export())).collect()
    }

    /// Returns true if both handles point at the same snapshot.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }
}

impl Default for ImmutableMap {
    fn default() -> Self {
        Self::empty()
    }
}

impl TryFrom<Value> for ImmutableMap {
    type Error = OverlayError;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self::new(map)),
            other => Err(OverlayError::UnexpectedType {
                expected: ValueKind::Map,
                actual: ValueKind::of(&other),
            }),
        }
    }
}

impl From<Map<String, Value>> for ImmutableMap {
    fn from(map: Map<String, Value>) -> Self {
        Self::new(map)
    }
}

impl fmt::Debug for ImmutableMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

// ── ImmutableSequence ─────────────────────────────────────────────────────

/// An immutable sequence of values.
///
/// A sequence is a window `[start, start + len)` over a shared native
/// vector. [`ImmutableSequence::sub_sequence`] narrows the window without
/// copying and reuses every wrapper already created for positions inside it.
#[derive(Clone)]
pub struct ImmutableSequence {
    inner: Arc<SeqInner>,
    start: usize,
    len: usize,
}

struct SeqInner {
    slots: Mutex<SeqSlots>,
}

/// Same layout as [`MapSlots`], keyed by absolute position in `base`.
struct SeqSlots {
    base: Vec<Value>,
    wrapped: HashMap<usize, ImmutableValue>,
}

impl SeqSlots {
    fn resolve(&mut self, pos: usize) -> Option<ImmutableValue> {
        if let Some(value) = self.wrapped.get(&pos) {
            return Some(value.clone());
        }
        let native = self.base.get_mut(pos)?;
        if !is_container(native) {
            return Some(ImmutableValue::from_native(native.clone()));
        }
        let child = ImmutableValue::from_native(native.take());
        self.wrapped.insert(pos, child.clone());
        Some(child)
    }
}

impl ImmutableSequence {
    /// Wraps a native vector. O(1); the vector is not copied.
    pub fn new(base: Vec<Value>) -> Self {
        Self::from_parts(base, HashMap::new())
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    fn from_parts(base: Vec<Value>, wrapped: HashMap<usize, ImmutableValue>) -> Self {
        let len = base.len();
        Self {
            inner: Arc::new(SeqInner {
                slots: Mutex::new(SeqSlots { base, wrapped }),
            }),
            start: 0,
            len,
        }
    }

    pub(crate) fn from_items(items: Vec<ImmutableValue>) -> Self {
        let mut base = Vec::with_capacity(items.len());
        let mut wrapped = HashMap::new();
        for (pos, value) in items.into_iter().enumerate() {
            match value.scalar_native() {
                Some(native) => base.push(native),
                None => {
                    base.push(Value::Null);
                    wrapped.insert(pos, value);
                }
            }
        }
        Self::from_parts(base, wrapped)
    }

    /// Returns the value at `index`. Nested containers come back as
    /// immutable wrappers, the same instance on every call.
    pub fn at(&self, index: usize) -> Result<ImmutableValue> {
        if index >= self.len {
            return Err(OverlayError::IndexOutOfRange {
                index,
                len: self.len,
            });
        }
        lock(&self.inner.slots)
            .resolve(self.start + index)
            .ok_or(OverlayError::IndexOutOfRange {
                index,
                len: self.len,
            })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// All elements in index order.
    pub fn iter(&self) -> std::vec::IntoIter<ImmutableValue> {
        let mut slots = lock(&self.inner.slots);
        let items: Vec<_> = (self.start..self.start + self.len)
            .filter_map(|pos| slots.resolve(pos))
            .collect();
        items.into_iter()
    }

    /// The window `[left, right)` of this sequence. O(1).
    ///
    /// Fails with `IndexOutOfRange` if `right > len` and with
    /// `InvalidRange` if `left > right`.
    pub fn sub_sequence(&self, left: usize, right: usize) -> Result<Self> {
        if right > self.len {
            return Err(OverlayError::IndexOutOfRange {
                index: right,
                len: self.len,
            });
        }
        if left > right {
            return Err(OverlayError::InvalidRange { left, right });
        }
        if left == 0 && right == self.len {
            return Ok(self.clone());
        }
        Ok(Self {
            inner: Arc::clone(&self.inner),
            start: self.start + left,
            len: right - left,
        })
    }

    /// Derives a copy-on-write overlay with this snapshot as its base. O(1).
    pub fn derive_mutable(&self) -> MutableSequence {
        MutableSequence::from_base(self.clone())
    }

    /// Deep copy into a native vector the caller may mutate freely.
    pub fn export(&self) -> Vec<Value> {
        self.iter().map(|value| value.export()).collect()
    }

    /// Returns true if both handles are the same window over the same
    /// snapshot.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner) && a.start == b.start && a.len == b.len
    }
}

impl Default for ImmutableSequence {
    fn default() -> Self {
        Self::empty()
    }
}

impl TryFrom<Value> for ImmutableSequence {
    type Error = OverlayError;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Array(items) => Ok(Self::new(items)),
            other => Err(OverlayError::UnexpectedType {
                expected: ValueKind::Sequence,
                actual: ValueKind::of(&other),
            }),
        }
    }
}

impl From<Vec<Value>> for ImmutableSequence {
    fn from(items: Vec<Value>) -> Self {
        Self::new(items)
    }
}

impl fmt::Debug for ImmutableSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}
