//! json-overlay - structurally shared JSON snapshots with copy-on-write overlays.
//!
//! Decoded JSON is wrapped in immutable snapshots ([`ImmutableMap`],
//! [`ImmutableSequence`]) that can be read from many threads. Deriving a
//! mutable overlay ([`MutableMap`], [`MutableSequence`]) is O(1): writes are
//! recorded on top of the snapshot, nested containers are promoted lazily,
//! and `freeze()` produces a new snapshot that reuses every untouched
//! subtree.
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use json_overlay::{equal, ImmutableMap, ImmutableValue};
//!
//! let base = ImmutableMap::try_from(json!({"a": {"b": 1}, "c": [1, 2]})).unwrap();
//! let m = base.derive_mutable();
//!
//! let a = m.get("a").unwrap();
//! a.set_key("b", 2).unwrap();
//! assert!(m.is_dirty());
//!
//! let next = m.freeze();
//! assert_eq!(json_overlay::export(&next), json!({"a": {"b": 2}, "c": [1, 2]}));
//! assert_eq!(json_overlay::export(&base), json!({"a": {"b": 1}, "c": [1, 2]}));
//!
//! // The untouched subtree is shared between the two snapshots.
//! let (old_c, new_c) = (base.get("c").unwrap(), next.get("c").unwrap());
//! match (old_c, new_c) {
//!     (ImmutableValue::Sequence(x), ImmutableValue::Sequence(y)) => {
//!         assert!(json_overlay::ImmutableSequence::ptr_eq(&x, &y))
//!     }
//!     _ => unreachable!(),
//! }
//! assert!(!equal(&base, &next));
//! ```

pub mod equal;
pub mod error;
pub mod export;
pub mod immutable;
pub mod mutable;
pub mod payload;
pub mod value;

mod sync;

pub use equal::equal;
pub use error::{OverlayError, Result};
pub use export::export;
pub use immutable::{ImmutableMap, ImmutableSequence};
pub use mutable::{MutableMap, MutableSequence};
pub use payload::{Codec, JsonCodec, Payload};
pub use value::{AnyValue, AsValueRef, ImmutableValue, MutableValue, ValueKind, ValueRef};
