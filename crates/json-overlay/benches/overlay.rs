use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use json_overlay::{ImmutableMap, MutableValue};
use serde_json::{json, Map, Value};
use std::hint::black_box;

fn event(fields: usize) -> Value {
    let big: Map<String, Value> = (0..fields)
        .map(|i| (format!("key-{i}"), json!(format!("value-{i}"))))
        .collect();
    json!({
        "bigMap": big,
        "last_name": null,
        "arms": 2,
        "first_name": "Adam",
        "details": {"city": "cityname", "age": 30},
        "pets": ["cat", "dog", "fish"],
    })
}

/// Edit two nested fields of a snapshot and freeze the result.
fn overlay_edit(base: &ImmutableMap) -> ImmutableMap {
    let m = base.derive_mutable();
    if let Some(MutableValue::Map(details)) = m.get("details") {
        details.set("age", 31);
    }
    if let Some(MutableValue::Sequence(pets)) = m.get("pets") {
        pets.set(0, "hamster").unwrap();
    }
    m.freeze()
}

/// The same edit on a deep copy of the native value.
fn deep_copy_edit(value: &Value) -> Value {
    let mut copy = value.clone();
    copy["details"]["age"] = json!(31);
    copy["pets"][0] = json!("hamster");
    copy
}

fn bench_edit(c: &mut Criterion) {
    let mut group = c.benchmark_group("edit_and_freeze");
    for fields in [1usize, 101, 501] {
        let value = event(fields);
        let base = ImmutableMap::try_from(value.clone()).unwrap();

        group.bench_with_input(BenchmarkId::new("deep_copy", fields), &value, |b, value| {
            b.iter(|| black_box(deep_copy_edit(black_box(value))))
        });
        group.bench_with_input(BenchmarkId::new("overlay", fields), &base, |b, base| {
            b.iter(|| black_box(overlay_edit(black_box(base))))
        });
    }
    group.finish();
}

fn bench_sequence_windows(c: &mut Criterion) {
    let base = json_overlay::ImmutableSequence::new((0..1000).map(Value::from).collect());
    c.bench_function("sequence_push_and_window", |b| {
        b.iter(|| {
            let s = base.derive_mutable();
            for i in 0..64 {
                s.push(i);
                s.push_front(-i);
            }
            let w = s.sub_sequence(32, 1064).unwrap();
            black_box(w.freeze())
        })
    });
}

criterion_group!(benches, bench_edit, bench_sequence_windows);
criterion_main!(benches);
