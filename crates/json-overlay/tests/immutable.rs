//! Integration tests for immutable snapshots.

use json_overlay::{export, ImmutableMap, ImmutableSequence, ImmutableValue, OverlayError, ValueKind};
use serde_json::{json, Value};

#[test]
fn map_reads() {
    let m = ImmutableMap::try_from(json!({
        "k1": "v1",
        "k2": {"nk1": "nv1"},
        "k3": ["ne1", "ne2"],
    }))
    .unwrap();

    assert_eq!(m.len(), 3);
    assert!(m.has("k1"));
    assert!(!m.has("k4"));
    assert!(m.get("k4").is_none());
    assert!(matches!(m.get("k1"), Some(ImmutableValue::String(ref s)) if s == "v1"));

    let nested = m.get("k2").unwrap();
    assert_eq!(nested.kind(), ValueKind::Map);
    let nested = nested.as_map().unwrap();
    assert!(matches!(nested.get("nk1"), Some(ImmutableValue::String(ref s)) if s == "nv1"));

    let seq = m.get("k3").unwrap();
    let seq = seq.as_sequence().unwrap();
    assert_eq!(seq.len(), 2);
    assert_eq!(export(&seq.at(1).unwrap()), json!("ne2"));
}

#[test]
fn iteration_wraps_each_container_once() {
    let m = ImmutableMap::try_from(json!({"a": {"x": 1}, "b": [1], "c": null})).unwrap();
    let first: Vec<(String, ImmutableValue)> = m.iter().collect();
    let second: Vec<(String, ImmutableValue)> = m.iter().collect();
    assert_eq!(first.len(), 3);

    for ((k1, v1), (k2, v2)) in first.iter().zip(&second) {
        assert_eq!(k1, k2);
        match (v1, v2) {
            (ImmutableValue::Map(a), ImmutableValue::Map(b)) => assert!(ImmutableMap::ptr_eq(a, b)),
            (ImmutableValue::Sequence(a), ImmutableValue::Sequence(b)) => {
                assert!(ImmutableSequence::ptr_eq(a, b))
            }
            (ImmutableValue::Null, ImmutableValue::Null) => {}
            other => panic!("unexpected pair {other:?}"),
        }
    }
}

#[test]
fn export_is_a_deep_copy() {
    let source = json!({"a": [{"b": 1}]});
    let m = ImmutableMap::try_from(source.clone()).unwrap();
    let mut out = Value::Object(m.export());
    out["a"][0]["b"] = json!(2);
    assert_eq!(export(&m), source);
}

#[test]
fn sequence_windows() {
    let s = ImmutableSequence::try_from(json!([0, [1], 2, {"three": 3}, 4])).unwrap();
    let wrapped = s.at(1).unwrap();

    let mid = s.sub_sequence(1, 4).unwrap();
    assert_eq!(mid.len(), 3);
    assert_eq!(export(&mid), json!([[1], 2, {"three": 3}]));

    let inner = mid.sub_sequence(0, 1).unwrap();
    let again = inner.at(0).unwrap();
    assert!(ImmutableSequence::ptr_eq(
        wrapped.as_sequence().unwrap(),
        again.as_sequence().unwrap()
    ));

    let empty = s.sub_sequence(5, 5).unwrap();
    assert!(empty.is_empty());
    assert_eq!(export(&empty), json!([]));
}

#[test]
fn sequence_errors() {
    let s = ImmutableSequence::try_from(json!([1, 2])).unwrap();
    assert_eq!(
        s.at(2).unwrap_err(),
        OverlayError::IndexOutOfRange { index: 2, len: 2 }
    );
    assert_eq!(
        s.sub_sequence(0, 3).unwrap_err(),
        OverlayError::IndexOutOfRange { index: 3, len: 2 }
    );
    assert_eq!(
        s.sub_sequence(2, 0).unwrap_err(),
        OverlayError::InvalidRange { left: 2, right: 0 }
    );
}

#[test]
fn snapshots_are_shareable_across_threads() {
    let s = ImmutableSequence::try_from(json!([[1, 2], {"k": "v"}, 3])).unwrap();
    let exported: Vec<Value> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4).map(|_| scope.spawn(|| export(&s))).collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    for out in exported {
        assert_eq!(out, json!([[1, 2], {"k": "v"}, 3]));
    }
}

#[test]
fn derive_mutable_is_isolated() {
    let m = ImmutableMap::try_from(json!({"a": 1})).unwrap();
    let overlay = m.derive_mutable();
    overlay.set("a", 2);
    overlay.set("b", 3);
    assert_eq!(export(&m), json!({"a": 1}));
    assert_eq!(export(&overlay), json!({"a": 2, "b": 3}));
}

#[test]
fn empty_containers() {
    assert!(ImmutableMap::default().is_empty());
    assert!(ImmutableSequence::default().is_empty());
    assert_eq!(export(&ImmutableMap::empty()), json!({}));
}
