//! Copy-on-write overlays over immutable snapshots.
//!
//! A mutable container records writes in its own overlay structures and
//! leaves its base snapshot untouched. Nested containers are promoted to
//! mutable overlays the first time they are read, and each overlay reports
//! mutations upward so an ancestor knows whether it has to rebuild on
//! `freeze()`.

pub(crate) mod dirty;
mod map;
mod sequence;

pub use map::MutableMap;
pub use sequence::MutableSequence;
