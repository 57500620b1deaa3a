use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, Weak};

use serde_json::Value;

use super::dirty::{DirtyListener, DirtyState, ParentRef};
use crate::error::{OverlayError, Result};
use crate::immutable::ImmutableSequence;
use crate::sync::lock;
use crate::value::{freeze_slot, thaw, touch, AnyValue, ImmutableValue, MutableValue};

/// A copy-on-write sequence layered over an [`ImmutableSequence`].
///
/// The logical sequence is `prepends ++ base ++ appends`, where writes to
/// base positions are recorded as overwrites keyed by position. Pushing at
/// either end is amortized O(1) and never touches the base.
///
/// [`MutableSequence::sub_sequence`] derives a window that shares the
/// overwrites and push buffers of its source, so writes through one window
/// are visible through every overlapping window. A push through a window
/// whose buffer has been extended by a sibling goes into a private
/// segment: sibling windows never see each other's pushes but keep
/// sharing the elements they had in common.
///
/// The handle is cheap to clone and clones share the sequence, window
/// included.
#[derive(Clone)]
pub struct MutableSequence {
    node: Arc<SeqNode>,
}

struct SeqNode {
    lineage: Arc<Lineage>,
    window: Mutex<Window>,
}

/// State shared by every window derived from one sequence.
struct Lineage {
    /// Keyed by absolute position in the lineage's base index space.
    overwrites: Mutex<HashMap<usize, AnyValue>>,
    dirty: DirtyState,
}

impl DirtyListener for Lineage {
    fn mark_dirty(&self) {
        self.dirty.mark();
    }
}

struct Window {
    base: ImmutableSequence,
    /// Absolute position of `base[0]` in the overwrite index space.
    offset: usize,
    /// Stored nearest-first: logical prepend `i` lives at `len - 1 - i`.
    prepends: Buffer,
    appends: Buffer,
}

/// A run `[start, end)` of a push buffer's storage. The storage may be
/// shared with sibling windows.
#[derive(Clone)]
struct Segment {
    items: Arc<Mutex<Vec<AnyValue>>>,
    start: usize,
    end: usize,
}

impl Segment {
    fn owned(items: Vec<AnyValue>) -> Self {
        let end = items.len();
        Self {
            items: Arc::new(Mutex::new(items)),
            start: 0,
            end,
        }
    }

    fn len(&self) -> usize {
        self.end - self.start
    }
}

/// The pushed elements visible through one window, as a chain of
/// segments in storage order.
///
/// Windows derived from one another hold segments over the same storage,
/// so a slot written through one is seen by all of them. A push lands in
/// place only when this window owns the tail of its last segment's
/// storage; otherwise it opens a private segment and the elements shared
/// so far stay shared.
#[derive(Clone, Default)]
struct Buffer {
    segments: Vec<Segment>,
}

impl Buffer {
    fn new() -> Self {
        Self::default()
    }

    fn from_items(items: Vec<AnyValue>) -> Self {
        if items.is_empty() {
            return Self::new();
        }
        Self {
            segments: vec![Segment::owned(items)],
        }
    }

    fn len(&self) -> usize {
        self.segments.iter().map(Segment::len).sum()
    }

    /// The segment holding `pos` and the slot's index in its storage.
    fn locate(&self, mut pos: usize) -> Option<(&Segment, usize)> {
        for segment in &self.segments {
            if pos < segment.len() {
                return Some((segment, segment.start + pos));
            }
            pos -= segment.len();
        }
        None
    }

    fn slice(&self, lo: usize, hi: usize) -> Self {
        let mut segments = Vec::new();
        let mut at = 0;
        for segment in &self.segments {
            let from = lo.clamp(at, at + segment.len()) - at;
            let to = hi.clamp(at, at + segment.len()) - at;
            if from < to {
                segments.push(Segment {
                    items: Arc::clone(&segment.items),
                    start: segment.start + from,
                    end: segment.start + to,
                });
            }
            at += segment.len();
        }
        Self { segments }
    }

    fn touch_at(&self, pos: usize, parent: &ParentRef) -> Option<MutableValue> {
        let (segment, idx) = self.locate(pos)?;
        let mut items = lock(&segment.items);
        items.get_mut(idx).map(|slot| touch(slot, parent))
    }

    fn put(&self, pos: usize, value: AnyValue) {
        if let Some((segment, idx)) = self.locate(pos) {
            if let Some(slot) = lock(&segment.items).get_mut(idx) {
                *slot = value;
            }
        }
    }

    /// Applies `f` to every slot in range, in storage order.
    fn map_slots<T>(&self, mut f: impl FnMut(&mut AnyValue) -> T) -> Vec<T> {
        let mut out = Vec::with_capacity(self.len());
        for segment in &self.segments {
            let mut items = lock(&segment.items);
            out.extend(
                items
                    .iter_mut()
                    .skip(segment.start)
                    .take(segment.len())
                    .map(&mut f),
            );
        }
        out
    }

    /// Promotes every slot in range and returns the values in storage order.
    fn touch_all(&self, parent: &ParentRef) -> Vec<MutableValue> {
        self.map_slots(|slot| touch(slot, parent))
    }

    fn freeze_all(&self) -> Vec<ImmutableValue> {
        self.map_slots(freeze_slot)
    }

    /// A private copy of this range. Slots are promoted first so the copy
    /// shares nested overlays with the original.
    fn detached(&self, parent: &ParentRef) -> Self {
        Self::from_items(self.map_slots(|slot| {
            touch(slot, parent);
            slot.clone()
        }))
    }

    fn push(&mut self, value: AnyValue) {
        if let Some(tail) = self.segments.last_mut() {
            let mut items = lock(&tail.items);
            // Slots past `end` are unreachable once no other window holds
            // this storage.
            if items.len() > tail.end && Arc::strong_count(&tail.items) == 1 {
                items.truncate(tail.end);
            }
            if items.len() == tail.end {
                items.push(value);
                drop(items);
                tail.end += 1;
                return;
            }
        }
        tracing::trace!(shared = self.len(), "opening private push segment");
        self.segments.push(Segment::owned(vec![value]));
    }
}

impl Window {
    fn len(&self) -> usize {
        self.prepends.len() + self.base.len() + self.appends.len()
    }

    fn check(&self, index: usize) -> Result<()> {
        let len = self.len();
        if index >= len {
            return Err(OverlayError::IndexOutOfRange { index, len });
        }
        Ok(())
    }

    fn base_at(&self, index: usize, lineage: &Lineage, parent: &ParentRef) -> Result<MutableValue> {
        let pos = self.offset + index;
        let mut overwrites = lock(&lineage.overwrites);
        if let Some(slot) = overwrites.get_mut(&pos) {
            return Ok(touch(slot, parent));
        }
        let value = thaw(self.base.at(index)?, parent);
        if value.is_container() {
            overwrites.insert(pos, AnyValue::Mutable(value.clone()));
        }
        Ok(value)
    }

    /// The window `[left, right)` of this one.
    ///
    /// Prepends and appends are trimmed first; whatever falls inside the
    /// base narrows it through `ImmutableSequence::sub_sequence`, shifting
    /// `offset` so existing overwrites stay addressable.
    fn narrow(&self, left: usize, right: usize) -> Result<Window> {
        let len = self.len();
        if right > len {
            return Err(OverlayError::IndexOutOfRange { index: right, len });
        }
        if left > right {
            return Err(OverlayError::InvalidRange { left, right });
        }
        let np = self.prepends.len();
        let nb = self.base.len();

        let p_lo = left.min(np);
        let p_hi = right.min(np);
        let prepends = self.prepends.slice(np - p_hi, np - p_lo);

        let b_lo = left.clamp(np, np + nb) - np;
        let b_hi = right.clamp(np, np + nb) - np;
        let base = self.base.sub_sequence(b_lo, b_hi)?;

        let a_lo = left.saturating_sub(np + nb);
        let a_hi = right.saturating_sub(np + nb);
        let appends = self.appends.slice(a_lo, a_hi);

        Ok(Window {
            base,
            offset: self.offset + b_lo,
            prepends,
            appends,
        })
    }
}

impl MutableSequence {
    /// An empty sequence with no base elements.
    pub fn new() -> Self {
        Self::from_base(ImmutableSequence::empty())
    }

    /// Derives an overlay over `base`. O(1).
    pub fn from_base(base: ImmutableSequence) -> Self {
        Self::build(base, DirtyState::new(false))
    }

    pub(crate) fn with_parent(base: ImmutableSequence, parent: ParentRef) -> Self {
        Self::build(base, DirtyState::with_parent(parent))
    }

    fn build(base: ImmutableSequence, dirty: DirtyState) -> Self {
        let lineage = Arc::new(Lineage {
            overwrites: Mutex::new(HashMap::new()),
            dirty,
        });
        Self::with_window(
            lineage,
            Window {
                base,
                offset: 0,
                prepends: Buffer::new(),
                appends: Buffer::new(),
            },
        )
    }

    fn with_window(lineage: Arc<Lineage>, window: Window) -> Self {
        Self {
            node: Arc::new(SeqNode {
                lineage,
                window: Mutex::new(window),
            }),
        }
    }

    /// Wraps a native array and derives an overlay over it.
    pub fn from_native(value: Value) -> Result<Self> {
        ImmutableSequence::try_from(value).map(Self::from_base)
    }

    fn as_parent(&self) -> ParentRef {
        let weak: Weak<Lineage> = Arc::downgrade(&self.node.lineage);
        weak
    }

    /// Returns the value at `index`, promoting a nested container to an
    /// overlay on first read.
    pub fn at(&self, index: usize) -> Result<MutableValue> {
        let parent = self.as_parent();
        let window = lock(&self.node.window);
        window.check(index)?;
        let out_of_range = || OverlayError::IndexOutOfRange {
            index,
            len: window.len(),
        };
        let np = window.prepends.len();
        let nb = window.base.len();
        if index < np {
            return window
                .prepends
                .touch_at(np - 1 - index, &parent)
                .ok_or_else(out_of_range);
        }
        if index < np + nb {
            return window.base_at(index - np, &self.node.lineage, &parent);
        }
        window
            .appends
            .touch_at(index - np - nb, &parent)
            .ok_or_else(out_of_range)
    }

    /// Replaces the value at `index`.
    pub fn set(&self, index: usize, value: impl Into<AnyValue>) -> Result<()> {
        let value = value.into();
        {
            let window = lock(&self.node.window);
            window.check(index)?;
            if let AnyValue::Mutable(child) = &value {
                child.add_parent(self.as_parent());
            }
            let np = window.prepends.len();
            let nb = window.base.len();
            if index < np {
                window.prepends.put(np - 1 - index, value);
            } else if index < np + nb {
                lock(&self.node.lineage.overwrites).insert(window.offset + index - np, value);
            } else {
                window.appends.put(index - np - nb, value);
            }
        }
        self.node.lineage.dirty.mark();
        Ok(())
    }

    /// Appends `value`. Amortized O(1).
    ///
    /// The sequence must not end up containing itself or one of its own
    /// windows; freezing or exporting such a graph never returns.
    pub fn push(&self, value: impl Into<AnyValue>) {
        let value = value.into();
        let parent = self.as_parent();
        if let AnyValue::Mutable(child) = &value {
            child.add_parent(parent.clone());
        }
        lock(&self.node.window).appends.push(value);
        self.node.lineage.dirty.mark();
    }

    /// Prepends `value`. Amortized O(1).
    pub fn push_front(&self, value: impl Into<AnyValue>) {
        let value = value.into();
        let parent = self.as_parent();
        if let AnyValue::Mutable(child) = &value {
            child.add_parent(parent.clone());
        }
        lock(&self.node.window).prepends.push(value);
        self.node.lineage.dirty.mark();
    }

    pub fn len(&self) -> usize {
        lock(&self.node.window).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All elements in index order. Promotes every nested container to an
    /// overlay.
    pub fn iter(&self) -> std::vec::IntoIter<MutableValue> {
        let parent = self.as_parent();
        let window = lock(&self.node.window);
        let mut out = Vec::with_capacity(window.len());
        out.extend(window.prepends.touch_all(&parent).into_iter().rev());
        {
            let mut overwrites = lock(&self.node.lineage.overwrites);
            for (i, value) in window.base.iter().enumerate() {
                let pos = window.offset + i;
                let current = match overwrites.get_mut(&pos) {
                    Some(slot) => touch(slot, &parent),
                    None => {
                        let value = thaw(value, &parent);
                        if value.is_container() {
                            overwrites.insert(pos, AnyValue::Mutable(value.clone()));
                        }
                        value
                    }
                };
                out.push(current);
            }
        }
        out.extend(window.appends.touch_all(&parent));
        out.into_iter()
    }

    /// Narrows this sequence to `[left, right)` in place.
    ///
    /// Fails with `IndexOutOfRange` if `right > len` and with
    /// `InvalidRange` if `left > right`. Narrowing to the full range is a
    /// no-op; any other range marks the sequence dirty.
    pub fn reslice(&self, left: usize, right: usize) -> Result<()> {
        {
            let mut window = lock(&self.node.window);
            let len = window.len();
            let narrowed = window.narrow(left, right)?;
            if left == 0 && right == len {
                return Ok(());
            }
            *window = narrowed;
        }
        tracing::trace!(left, right, "resliced sequence");
        self.node.lineage.dirty.mark();
        Ok(())
    }

    /// A new window `[left, right)` over this sequence.
    ///
    /// The window shares overwrites, dirty state and parents with this
    /// sequence: a write through either is visible through the other where
    /// they overlap. Nothing is copied.
    pub fn sub_sequence(&self, left: usize, right: usize) -> Result<MutableSequence> {
        let window = lock(&self.node.window).narrow(left, right)?;
        tracing::trace!(left, right, "derived sequence window");
        Ok(Self::with_window(Arc::clone(&self.node.lineage), window))
    }

    /// A new sequence with its own overlay structures. Nested containers
    /// are shared: writing through one is visible from both sequences, and
    /// both are marked dirty.
    pub fn shallow_clone(&self) -> MutableSequence {
        let children: Vec<MutableValue> = self.iter().collect();
        let parent = self.as_parent();
        let window = lock(&self.node.window);
        let lo = window.offset;
        let hi = lo + window.base.len();
        let overwrites: HashMap<usize, AnyValue> = lock(&self.node.lineage.overwrites)
            .iter()
            .filter(|(pos, _)| (lo..hi).contains(*pos))
            .map(|(pos, value)| (*pos, value.clone()))
            .collect();
        let lineage = Arc::new(Lineage {
            overwrites: Mutex::new(overwrites),
            dirty: DirtyState::new(self.is_dirty()),
        });
        let copy = Self::with_window(
            lineage,
            Window {
                base: window.base.clone(),
                offset: window.offset,
                prepends: window.prepends.detached(&parent),
                appends: window.appends.detached(&parent),
            },
        );
        drop(window);
        let copy_parent = copy.as_parent();
        for child in children.iter().filter(|child| child.is_container()) {
            child.add_parent(copy_parent.clone());
        }
        tracing::trace!(len = children.len(), "shallow-cloned sequence");
        copy
    }

    /// An immutable snapshot of the current contents.
    ///
    /// A clean sequence returns its base window. Otherwise a new snapshot is
    /// built from the prepends, the base with overwrites applied and the
    /// appends; nested overlays contribute their own frozen form.
    pub fn freeze(&self) -> ImmutableSequence {
        let window = lock(&self.node.window);
        if !self.node.lineage.dirty.is_dirty() {
            return window.base.clone();
        }
        let mut items = Vec::with_capacity(window.len());
        items.extend(window.prepends.freeze_all().into_iter().rev());
        {
            let mut overwrites = lock(&self.node.lineage.overwrites);
            for (i, value) in window.base.iter().enumerate() {
                match overwrites.get_mut(&(window.offset + i)) {
                    Some(slot) => items.push(freeze_slot(slot)),
                    None => items.push(value),
                }
            }
        }
        items.extend(window.appends.freeze_all());
        tracing::trace!(len = items.len(), "rebuilding sequence snapshot");
        ImmutableSequence::from_items(items)
    }

    /// Deep copy into a native vector the caller may mutate freely.
    pub fn export(&self) -> Vec<Value> {
        self.iter().map(|value| value.export()).collect()
    }

    /// Whether this sequence, a window sharing its lineage, or anything
    /// nested under them was mutated since it was derived.
    pub fn is_dirty(&self) -> bool {
        self.node.lineage.dirty.is_dirty()
    }

    /// The base snapshot when nothing has been mutated.
    pub(crate) fn clean_base(&self) -> Option<ImmutableSequence> {
        let window = lock(&self.node.window);
        (!self.node.lineage.dirty.is_dirty()).then(|| window.base.clone())
    }

    pub(crate) fn add_parent(&self, parent: ParentRef) {
        self.node.lineage.dirty.add_parent(parent);
    }

    /// Returns true if both handles point at the same sequence.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.node, &b.node)
    }
}

impl Default for MutableSequence {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<Value> for MutableSequence {
    type Error = OverlayError;

    fn try_from(value: Value) -> Result<Self> {
        Self::from_native(value)
    }
}

impl From<ImmutableSequence> for MutableSequence {
    fn from(base: ImmutableSequence) -> Self {
        Self::from_base(base)
    }
}

impl fmt::Debug for MutableSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}
