//! Integration tests for `MutableSequence`: pushes, windows and instance
//! sharing.

use json_overlay::{
    export, ImmutableSequence, MutableMap, MutableSequence, MutableValue, OverlayError,
};
use serde_json::{json, Value};

fn seq(value: Value) -> ImmutableSequence {
    ImmutableSequence::try_from(value).unwrap()
}

fn map_at(s: &MutableSequence, index: usize) -> MutableMap {
    match s.at(index).unwrap() {
        MutableValue::Map(map) => map,
        other => panic!("expected map at {index}, got {other:?}"),
    }
}

fn seq_at(s: &MutableSequence, index: usize) -> MutableSequence {
    match s.at(index).unwrap() {
        MutableValue::Sequence(seq) => seq,
        other => panic!("expected sequence at {index}, got {other:?}"),
    }
}

fn string_at(s: &MutableSequence, index: usize) -> String {
    match s.at(index).unwrap() {
        MutableValue::String(text) => text,
        other => panic!("expected string at {index}, got {other:?}"),
    }
}

#[test]
fn push_front_then_reslice() {
    let s = seq(json!([1, 2, 3])).derive_mutable();
    s.push_front(0);
    s.push(4);
    assert_eq!(export(&s), json!([0, 1, 2, 3, 4]));
    s.reslice(1, 4).unwrap();
    assert_eq!(export(&s), json!([1, 2, 3]));
}

#[test]
fn basic_mutations_on_sequence_and_nested() {
    let original = json!([{"nk1": "nv1"}, ["ne1", "ne2"], "e3"]);
    let base = seq(original.clone());
    let mut1 = base.derive_mutable();
    let mut2 = base.derive_mutable();
    let mut1_clone = mut1.shallow_clone();

    let nested_map = map_at(&mut1, 0);
    let nested_seq = seq_at(&mut1, 1);
    nested_map.set("nk1", "nv1-modified");
    nested_seq.set(0, "ne1-modified").unwrap();
    nested_seq.push("ne3-new");
    mut1.set(2, "e3-modified").unwrap();
    mut1.push("e4-new");

    assert_eq!(
        export(&mut1),
        json!([{"nk1": "nv1-modified"}, ["ne1-modified", "ne2", "ne3-new"], "e3-modified", "e4-new"])
    );
    // The clone shares nested containers but not its own slots.
    assert_eq!(
        export(&mut1_clone),
        json!([{"nk1": "nv1-modified"}, ["ne1-modified", "ne2", "ne3-new"], "e3"])
    );
    assert_eq!(export(&mut2), original);
    assert_eq!(export(&base), original);
    assert!(mut1_clone.is_dirty());
    assert!(!mut2.is_dirty());
}

#[test]
fn at_and_set_check_bounds() {
    let s = seq(json!([1])).derive_mutable();
    assert_eq!(
        s.at(1).unwrap_err(),
        OverlayError::IndexOutOfRange { index: 1, len: 1 }
    );
    assert_eq!(
        s.set(5, 0).unwrap_err(),
        OverlayError::IndexOutOfRange { index: 5, len: 1 }
    );
    assert!(!s.is_dirty());
}

#[test]
fn window_bounds_are_checked() {
    let s = seq(json!([1, 2, 3])).derive_mutable();
    assert_eq!(
        s.reslice(0, 4).unwrap_err(),
        OverlayError::IndexOutOfRange { index: 4, len: 3 }
    );
    assert_eq!(
        s.sub_sequence(2, 1).unwrap_err(),
        OverlayError::InvalidRange { left: 2, right: 1 }
    );
    s.reslice(0, 3).unwrap();
    assert!(!s.is_dirty());
}

#[test]
fn pushes_windows_and_shared_writes() {
    let base = seq(json!(["e1", {"k2": "e2"}, "e3", ["e4"], "e5"]));
    let s = base.derive_mutable();

    s.push_front(json!({"k0": "e0"}));
    s.push_front("e-1");
    s.push_front(json!(["e-2"]));
    s.push(json!(["e6"]));
    s.push("e7");
    s.push(json!({"k8": "e8"}));

    let after_pushes = json!([
        ["e-2"], "e-1", {"k0": "e0"}, "e1", {"k2": "e2"}, "e3", ["e4"], "e5", ["e6"], "e7", {"k8": "e8"}
    ]);
    assert_eq!(export(&s), after_pushes);
    let from_iter: Vec<Value> = s.iter().map(|v| v.export()).collect();
    assert_eq!(Value::Array(from_iter), after_pushes);

    let cloned = s.shallow_clone();
    let frozen = s.freeze();

    s.push_front("start");
    s.push("end");
    assert_eq!(s.len(), 13);
    seq_at(&s, 1).set(0, "e-2-modified").unwrap();
    map_at(&s, 3).set("k0", "e0-modified");
    seq_at(&s, 9).set(0, "e6-modified").unwrap();
    map_at(&s, 11).set("k8", "e8-modified");

    let modified_core = json!([
        ["e-2-modified"], "e-1", {"k0": "e0-modified"}, "e1", {"k2": "e2"}, "e3", ["e4"], "e5",
        ["e6-modified"], "e7", {"k8": "e8-modified"}
    ]);
    let mut with_ends = vec![json!("start")];
    with_ends.extend(modified_core.as_array().unwrap().iter().cloned());
    with_ends.push(json!("end"));
    assert_eq!(export(&s), Value::Array(with_ends));
    assert_eq!(export(&cloned), modified_core);
    assert_eq!(export(&frozen), after_pushes);

    let sub = s.sub_sequence(1, 12).unwrap();
    assert_eq!(export(&sub), modified_core);
    s.reslice(1, 12).unwrap();
    assert_eq!(export(&s), modified_core);

    assert!(MutableSequence::ptr_eq(&seq_at(&sub, 0), &seq_at(&s, 0)));
    assert!(MutableMap::ptr_eq(&map_at(&sub, 10), &map_at(&s, 10)));

    sub.set(1, "e-1-modified").unwrap();
    sub.set(5, "e3-modified").unwrap();
    sub.set(9, "e7-modified").unwrap();
    let after_sub_writes = json!([
        ["e-2-modified"], "e-1-modified", {"k0": "e0-modified"}, "e1", {"k2": "e2"}, "e3-modified",
        ["e4"], "e5", ["e6-modified"], "e7-modified", {"k8": "e8-modified"}
    ]);
    assert_eq!(export(&sub), after_sub_writes);
    assert_eq!(export(&s), after_sub_writes);
}

#[test]
fn window_removing_prepends_and_appends() {
    let s = seq(json!([["e5"], ["e6"], ["e7"], ["e8"]])).derive_mutable();
    s.push_front("e4");
    s.push("e9");
    let sub = s.sub_sequence(2, 4).unwrap();
    s.reslice(2, 4).unwrap();

    let expected = json!([["e6"], ["e7"]]);
    assert_eq!(export(&sub), expected);
    assert_eq!(export(&s), expected);
    assert_eq!(export(&seq_at(&s, 0)), json!(["e6"]));
    assert_eq!(export(&seq_at(&s, 1)), json!(["e7"]));
    assert_eq!(export(&seq_at(&sub, 0)), json!(["e6"]));
    assert_eq!(export(&seq_at(&sub, 1)), json!(["e7"]));
}

#[test]
fn window_inside_appends_only() {
    let s = seq(json!([["e3"], ["e4"]])).derive_mutable();
    s.push_front("e2");
    s.push_front("e1");
    s.push("e5");
    s.push("e6");
    s.push("e7");

    let sub = s.sub_sequence(5, 6).unwrap();
    assert_eq!(sub.len(), 1);
    assert_eq!(string_at(&sub, 0), "e6");

    s.reslice(5, 6).unwrap();
    assert_eq!(s.len(), 1);
    assert_eq!(string_at(&s, 0), "e6");
}

#[test]
fn window_inside_prepends_only() {
    let s = seq(json!([["e3"], ["e4"]])).derive_mutable();
    s.push_front("e2");
    s.push_front("e1");
    s.push_front("e0");
    s.push("e5");
    s.push("e6");

    let sub = s.sub_sequence(1, 2).unwrap();
    assert_eq!(sub.len(), 1);
    assert_eq!(string_at(&sub, 0), "e1");

    s.reslice(1, 2).unwrap();
    assert_eq!(s.len(), 1);
    assert_eq!(string_at(&s, 0), "e1");
}

#[test]
fn windows_share_nested_instances() {
    let s = seq(json!([{"k3": "e3"}, ["e4"]])).derive_mutable();
    s.push_front(json!(["e2"]));
    s.push_front(json!({"k1": "e1"}));
    s.push_front("front");
    s.push(json!({"k5": "e5"}));
    s.push(json!(["e6"]));
    s.push("end");

    let sub = s.sub_sequence(1, 7).unwrap();
    let maps_in_sub: Vec<MutableMap> = [0, 2, 4].iter().map(|&i| map_at(&sub, i)).collect();
    let seqs_in_sub: Vec<MutableSequence> = [1, 3, 5].iter().map(|&i| seq_at(&sub, i)).collect();
    let maps_in_s: Vec<MutableMap> = [1, 3, 5].iter().map(|&i| map_at(&s, i)).collect();
    let seqs_in_s: Vec<MutableSequence> = [2, 4, 6].iter().map(|&i| seq_at(&s, i)).collect();

    s.reslice(1, 7).unwrap();
    let maps_resliced: Vec<MutableMap> = [0, 2, 4].iter().map(|&i| map_at(&s, i)).collect();
    let seqs_resliced: Vec<MutableSequence> = [1, 3, 5].iter().map(|&i| seq_at(&s, i)).collect();

    for i in 0..3 {
        assert!(MutableMap::ptr_eq(&maps_in_sub[i], &maps_in_s[i]));
        assert!(MutableMap::ptr_eq(&maps_in_sub[i], &maps_resliced[i]));
        assert!(MutableSequence::ptr_eq(&seqs_in_sub[i], &seqs_in_s[i]));
        assert!(MutableSequence::ptr_eq(&seqs_in_sub[i], &seqs_resliced[i]));
    }
}

#[test]
fn shallow_clone_shares_nested_instances() {
    let s = seq(json!([{"k3": "e3"}, ["e4"]])).derive_mutable();
    s.push_front(json!(["e2"]));
    s.push_front(json!({"k1": "e1"}));
    s.push(json!({"k5": "e5"}));
    s.push(json!(["e6"]));

    let copy = s.shallow_clone();
    for i in [0, 2, 4] {
        assert!(MutableMap::ptr_eq(&map_at(&copy, i), &map_at(&s, i)));
    }
    for i in [1, 3, 5] {
        assert!(MutableSequence::ptr_eq(&seq_at(&copy, i), &seq_at(&s, i)));
    }

    copy.push("only-in-copy");
    assert_eq!(copy.len(), 7);
    assert_eq!(s.len(), 6);
}

#[test]
fn nested_write_marks_both_clone_and_original() {
    let s = seq(json!([{"a": 1}])).derive_mutable();
    let copy = s.shallow_clone();
    assert!(!s.is_dirty());
    assert!(!copy.is_dirty());

    map_at(&s, 0).set("a", 2);
    assert!(s.is_dirty());
    assert!(copy.is_dirty());
    assert_eq!(export(&copy.freeze()), json!([{"a": 2}]));
}

#[test]
fn sibling_windows_do_not_see_each_others_pushes() {
    let s = seq(json!([1, 2])).derive_mutable();
    s.push(3);
    let left = s.sub_sequence(0, 3).unwrap();
    let right = s.sub_sequence(0, 3).unwrap();
    left.push("left");
    right.push("right");
    assert_eq!(export(&left), json!([1, 2, 3, "left"]));
    assert_eq!(export(&right), json!([1, 2, 3, "right"]));
    assert_eq!(export(&s), json!([1, 2, 3]));
}

#[test]
fn writes_reach_overlapping_windows_after_private_pushes() {
    let s = MutableSequence::new();
    s.push(1);
    s.push(2);
    let w = s.sub_sequence(0, 2).unwrap();
    s.push(3);
    w.push(9);

    w.set(0, "through-window").unwrap();
    assert_eq!(export(&s), json!(["through-window", 2, 3]));
    s.set(1, "through-source").unwrap();
    assert_eq!(export(&w), json!(["through-window", "through-source", 9]));

    s.push_front(0);
    w.push_front(-1);
    s.set(1, "front-shifted").unwrap();
    assert_eq!(export(&w), json!([-1, "front-shifted", "through-source", 9]));
    assert_eq!(export(&s), json!([0, "front-shifted", "through-source", 3]));
}

#[test]
fn freeze_shares_untouched_children() {
    let base = seq(json!([[1], {"x": 2}, 3]));
    let s = base.derive_mutable();
    s.set(2, 30).unwrap();
    let frozen = s.freeze();

    let (before, after) = (base.at(0).unwrap(), frozen.at(0).unwrap());
    assert!(ImmutableSequence::ptr_eq(
        before.as_sequence().unwrap(),
        after.as_sequence().unwrap()
    ));
    assert_eq!(export(&frozen), json!([[1], {"x": 2}, 30]));
}

#[test]
fn clean_freeze_returns_same_base() {
    let base = seq(json!([[1], [2]]));
    let s = base.derive_mutable();
    let _ = s.at(0).unwrap();
    assert!(ImmutableSequence::ptr_eq(&s.freeze(), &base));
}

#[test]
fn setting_a_mutable_child_wires_dirty_tracking() {
    let s = MutableSequence::new();
    let child = MutableMap::new();
    s.push(child.clone());
    let frozen = s.freeze();

    child.set("late", true);
    assert!(s.is_dirty());
    assert_eq!(export(&frozen), json!([{}]));
    assert_eq!(export(&s.freeze()), json!([{"late": true}]));
    assert!(MutableMap::ptr_eq(&map_at(&s, 0), &child));
}

#[test]
fn from_native_rejects_non_sequence() {
    let err = MutableSequence::from_native(json!({"a": 1})).unwrap_err();
    assert!(matches!(err, OverlayError::UnexpectedType { .. }));
}
