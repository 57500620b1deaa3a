//! Dirty tracking and upward propagation.
//!
//! Every mutable container owns a [`DirtyState`]. Marking it dirty for the
//! first time notifies each registered parent, which marks itself and
//! continues upward. Parents are held weakly so a child never keeps its
//! ancestors alive.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, Weak};

use crate::sync::lock;

/// Something a child overlay can report a mutation to.
pub(crate) trait DirtyListener: Send + Sync {
    fn mark_dirty(&self);
}

/// Weak back-reference from a child overlay to one of its parents.
pub(crate) type ParentRef = Weak<dyn DirtyListener>;

pub(crate) struct DirtyState {
    dirty: AtomicBool,
    parents: Mutex<Vec<ParentRef>>,
}

impl DirtyState {
    pub(crate) fn new(dirty: bool) -> Self {
        Self {
            dirty: AtomicBool::new(dirty),
            parents: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_parent(parent: ParentRef) -> Self {
        Self {
            dirty: AtomicBool::new(false),
            parents: Mutex::new(vec![parent]),
        }
    }

    pub(crate) fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Sets the flag and, on the clean-to-dirty transition only, notifies
    /// every live parent before returning.
    pub(crate) fn mark(&self) {
        if self.dirty.swap(true, Ordering::AcqRel) {
            return;
        }
        let parents: Vec<_> = lock(&self.parents)
            .iter()
            .filter_map(Weak::upgrade)
            .collect();
        if parents.is_empty() {
            return;
        }
        tracing::trace!(parents = parents.len(), "propagating dirty mark");
        for parent in parents {
            parent.mark_dirty();
        }
    }

    /// Registers `parent`, ignoring duplicates and dropping parents that no
    /// longer exist.
    pub(crate) fn add_parent(&self, parent: ParentRef) {
        let mut parents = lock(&self.parents);
        parents.retain(|p| p.strong_count() > 0);
        if !parents.iter().any(|p| Weak::ptr_eq(p, &parent)) {
            parents.push(parent);
        }
    }

    #[cfg(test)]
    pub(crate) fn parent_count(&self) -> usize {
        lock(&self.parents)
            .iter()
            .filter(|p| p.strong_count() > 0)
            .count()
    }
}

/// A parent reference that never upgrades, for exercising children in
/// isolation.
#[cfg(test)]
pub(crate) fn detached_parent() -> ParentRef {
    Weak::<DirtyState>::new()
}

#[cfg(test)]
impl DirtyListener for DirtyState {
    fn mark_dirty(&self) {
        self.mark();
    }
}
