use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use trellis_core::reactive::{ReactiveObject, Runtime, Value, Watcher};

/// One observed object with `keys` properties and one watcher per property.
fn setup(keys: usize) -> (Runtime, ReactiveObject, Vec<Watcher>) {
    let runtime = Runtime::new();
    let state = Value::object((0..keys).map(|i| (format!("k{i}"), 0)));
    runtime.observe(&state);
    let object = state.as_object().cloned().unwrap_or_default();

    let watchers = (0..keys)
        .map(|i| {
            let reader = object.clone();
            let key = format!("k{i}");
            runtime
                .watcher(move || Ok(reader.get(&key).unwrap_or_default()))
                .build()
                .unwrap()
        })
        .collect();
    (runtime, object, watchers)
}

fn bench_notify(c: &mut Criterion) {
    let (_runtime, object, _watchers) = setup(1);
    let mut n = 0i64;
    c.bench_function("notify_one_subscriber", |b| {
        b.iter(|| {
            n += 1;
            object.set("k0", black_box(n));
        })
    });
}

fn bench_flush(c: &mut Criterion) {
    let mut group = c.benchmark_group("flush");
    for size in [10usize, 100, 1000] {
        group.bench_function(format!("{size}_watchers"), |b| {
            b.iter_batched(
                || {
                    let (runtime, object, watchers) = setup(size);
                    for i in 0..size {
                        object.set(&format!("k{i}"), 1);
                    }
                    (runtime, watchers)
                },
                |(runtime, _watchers)| black_box(runtime.flush().map(|s| s.ran).unwrap_or(0)),
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

fn bench_computed_chain(c: &mut Criterion) {
    let runtime = Runtime::new();
    let state = Value::object([("base", 1)]);
    runtime.observe(&state);
    let object = state.as_object().cloned().unwrap_or_default();

    let reader = object.clone();
    let mut tail = runtime.computed(move || Ok(reader.get("base").unwrap_or_default()));
    for _ in 0..32 {
        let previous = tail.clone();
        tail = runtime.computed(move || {
            let n = previous.get()?.as_i64().unwrap_or(0);
            Ok(Value::Int(n + 1))
        });
    }

    let mut n = 0i64;
    c.bench_function("computed_chain_32", |b| {
        b.iter(|| {
            n += 1;
            object.set("base", n);
            black_box(tail.get().map(|v| v.as_i64()).ok().flatten())
        })
    });
}

criterion_group!(benches, bench_notify, bench_flush, bench_computed_chain);
criterion_main!(benches);
