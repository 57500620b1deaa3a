use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, Weak};

use indexmap::IndexMap;
use serde_json::{Map, Value};

use super::dirty::{DirtyListener, DirtyState, ParentRef};
use crate::error::{OverlayError, Result};
use crate::immutable::ImmutableMap;
use crate::sync::lock;
use crate::value::{freeze_slot, thaw, touch, AnyValue, ImmutableValue, MutableValue};

/// A copy-on-write map layered over an [`ImmutableMap`].
///
/// Reads fall through to the base unless the key was written or deleted
/// locally. Nested containers come back as mutable overlays, the same
/// instance on every read, and writing through them marks this map dirty.
///
/// Iteration yields base keys in base order, then keys added locally in
/// the order they were first written.
///
/// The handle is cheap to clone and clones share the map. A map is meant
/// to have one writer at a time; use [`MutableMap::freeze`] to hand a
/// snapshot to concurrent readers.
#[derive(Clone)]
pub struct MutableMap {
    node: Arc<MapNode>,
}

struct MapNode {
    state: Mutex<MapState>,
    dirty: DirtyState,
}

impl DirtyListener for MapNode {
    fn mark_dirty(&self) {
        self.dirty.mark();
    }
}

struct MapState {
    base: ImmutableMap,
    /// Local writes, plus base containers already promoted to overlays.
    overwrites: IndexMap<String, AnyValue>,
    /// Base keys deleted locally. Never overlaps `overwrites`.
    deletions: HashSet<String>,
    len: usize,
}

impl MapState {
    fn contains(&self, key: &str) -> bool {
        self.overwrites.contains_key(key) || (!self.deletions.contains(key) && self.base.has(key))
    }
}

impl MutableMap {
    /// An empty map with no base entries.
    pub fn new() -> Self {
        Self::from_base(ImmutableMap::empty())
    }

    /// Derives an overlay over `base`. O(1).
    pub fn from_base(base: ImmutableMap) -> Self {
        Self::build(base, DirtyState::new(false))
    }

    pub(crate) fn with_parent(base: ImmutableMap, parent: ParentRef) -> Self {
        Self::build(base, DirtyState::with_parent(parent))
    }

    fn build(base: ImmutableMap, dirty: DirtyState) -> Self {
        let len = base.len();
        Self {
            node: Arc::new(MapNode {
                state: Mutex::new(MapState {
                    base,
                    overwrites: IndexMap::new(),
                    deletions: HashSet::new(),
                    len,
                }),
                dirty,
            }),
        }
    }

    /// Wraps a native object and derives an overlay over it.
    pub fn from_native(value: Value) -> Result<Self> {
        ImmutableMap::try_from(value).map(Self::from_base)
    }

    fn as_parent(&self) -> ParentRef {
        let weak: Weak<MapNode> = Arc::downgrade(&self.node);
        weak
    }

    /// Returns the current value for `key`.
    pub fn get(&self, key: &str) -> Option<MutableValue> {
        let parent = self.as_parent();
        let mut state = lock(&self.node.state);
        if let Some(slot) = state.overwrites.get_mut(key) {
            return Some(touch(slot, &parent));
        }
        if state.deletions.contains(key) {
            return None;
        }
        let value = thaw(state.base.get(key)?, &parent);
        if value.is_container() {
            state
                .overwrites
                .insert(key.to_owned(), AnyValue::Mutable(value.clone()));
        }
        Some(value)
    }

    pub fn has(&self, key: &str) -> bool {
        lock(&self.node.state).contains(key)
    }

    /// Sets `key`. The value may be native, immutable or mutable; a mutable
    /// container starts reporting its mutations to this map.
    ///
    /// Storing a map inside itself, directly or through a descendant, is
    /// not supported: `freeze` and `export` on such a graph never return.
    pub fn set(&self, key: impl Into<String>, value: impl Into<AnyValue>) {
        let key = key.into();
        let value = value.into();
        if let AnyValue::Mutable(child) = &value {
            child.add_parent(self.as_parent());
        }
        {
            let mut state = lock(&self.node.state);
            if !state.contains(&key) {
                state.len += 1;
            }
            state.deletions.remove(&key);
            state.overwrites.insert(key, value);
        }
        self.node.dirty.mark();
    }

    /// Removes `key`, returning whether it was present. Deleting an absent
    /// key leaves the map clean.
    pub fn delete(&self, key: &str) -> bool {
        {
            let mut state = lock(&self.node.state);
            if !state.contains(key) {
                return false;
            }
            state.overwrites.shift_remove(key);
            if state.base.has(key) {
                state.deletions.insert(key.to_owned());
            }
            state.len -= 1;
        }
        self.node.dirty.mark();
        true
    }

    pub fn len(&self) -> usize {
        lock(&self.node.state).len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> Vec<String> {
        let state = lock(&self.node.state);
        let mut keys: Vec<String> = state
            .base
            .keys()
            .into_iter()
            .filter(|key| !state.deletions.contains(key))
            .collect();
        keys.extend(
            state
                .overwrites
                .keys()
                .filter(|key| !state.base.has(key))
                .cloned(),
        );
        keys
    }

    /// All current entries. Promotes every nested container to an overlay.
    pub fn iter(&self) -> std::vec::IntoIter<(String, MutableValue)> {
        let parent = self.as_parent();
        let mut guard = lock(&self.node.state);
        let state = &mut *guard;
        let mut entries = Vec::with_capacity(state.len);
        for (key, value) in state.base.iter() {
            if state.deletions.contains(&key) {
                continue;
            }
            let current = match state.overwrites.get_mut(&key) {
                Some(slot) => touch(slot, &parent),
                None => {
                    let value = thaw(value, &parent);
                    if value.is_container() {
                        state
                            .overwrites
                            .insert(key.clone(), AnyValue::Mutable(value.clone()));
                    }
                    value
                }
            };
            entries.push((key, current));
        }
        for (key, slot) in state.overwrites.iter_mut() {
            if !state.base.has(key) {
                entries.push((key.clone(), touch(slot, &parent)));
            }
        }
        entries.into_iter()
    }

    /// A new map with its own overlay structures. Nested containers are
    /// shared: writing through one is visible from both maps, and both are
    /// marked dirty.
    pub fn shallow_clone(&self) -> MutableMap {
        let children: Vec<MutableValue> = self.iter().map(|(_, value)| value).collect();
        let copy = {
            let state = lock(&self.node.state);
            Self {
                node: Arc::new(MapNode {
                    state: Mutex::new(MapState {
                        base: state.base.clone(),
                        overwrites: state.overwrites.clone(),
                        deletions: state.deletions.clone(),
                        len: state.len,
                    }),
                    dirty: DirtyState::new(self.is_dirty()),
                }),
            }
        };
        let parent = copy.as_parent();
        for child in children.iter().filter(|child| child.is_container()) {
            child.add_parent(parent.clone());
        }
        tracing::trace!(entries = children.len(), "shallow-cloned map");
        copy
    }

    /// An immutable snapshot of the current contents.
    ///
    /// A clean map returns its base. Otherwise a new snapshot is built that
    /// reuses every untouched entry of the base and the frozen form of every
    /// nested overlay, so clean subtrees keep their identity.
    pub fn freeze(&self) -> ImmutableMap {
        let mut guard = lock(&self.node.state);
        if !self.node.dirty.is_dirty() {
            return guard.base.clone();
        }
        let state = &mut *guard;
        let mut entries: Vec<(String, ImmutableValue)> = Vec::with_capacity(state.len);
        for (key, value) in state.base.iter() {
            if state.deletions.contains(&key) {
                continue;
            }
            match state.overwrites.get_mut(&key) {
                Some(slot) => {
                    let frozen = freeze_slot(slot);
                    entries.push((key, frozen));
                }
                None => entries.push((key, value)),
            }
        }
        for (key, slot) in state.overwrites.iter_mut() {
            if !state.base.has(key) {
                entries.push((key.clone(), freeze_slot(slot)));
            }
        }
        tracing::trace!(entries = entries.len(), "rebuilding map snapshot");
        ImmutableMap::from_entries(entries)
    }

    /// Deep copy into a native map the caller may mutate freely.
    pub fn export(&self) -> Map<String, Value> {
        self.iter().map(|(key, value)| (key, value.export())).collect()
    }

    /// Whether this map or anything nested under it was mutated since it
    /// was derived.
    pub fn is_dirty(&self) -> bool {
        self.node.dirty.is_dirty()
    }

    /// The base snapshot when nothing has been mutated.
    pub(crate) fn clean_base(&self) -> Option<ImmutableMap> {
        let state = lock(&self.node.state);
        (!self.node.dirty.is_dirty()).then(|| state.base.clone())
    }

    pub(crate) fn add_parent(&self, parent: ParentRef) {
        self.node.dirty.add_parent(parent);
    }

    /// Returns true if both handles point at the same map.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.node, &b.node)
    }
}

impl Default for MutableMap {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<Value> for MutableMap {
    type Error = OverlayError;

    fn try_from(value: Value) -> Result<Self> {
        Self::from_native(value)
    }
}

impl From<ImmutableMap> for MutableMap {
    fn from(base: ImmutableMap) -> Self {
        Self::from_base(base)
    }
}

impl fmt::Debug for MutableMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}
