use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::{json, Map, Value};
use std::hint::black_box;

use pantry::{create_memo, define_store, Registry, Signal, StoreOptions, WatchOptions};

fn signal_read_benchmark(c: &mut Criterion) {
    let signal: Signal<i32> = Signal::new(42);

    c.bench_function("signal_read", |b| {
        b.iter(|| {
            black_box(signal.get());
        });
    });
}

fn signal_write_benchmark(c: &mut Criterion) {
    let signal: Signal<i32> = Signal::new(0);

    c.bench_function("signal_write", |b| {
        let mut i = 0;
        b.iter(|| {
            signal.set(black_box(i));
            i += 1;
        });
    });
}

fn memo_computation_benchmark(c: &mut Criterion) {
    let a: Signal<i32> = Signal::new(5);
    let b: Signal<i32> = Signal::new(10);

    let sum = create_memo({
        let a = a.clone();
        let b = b.clone();
        move || a.get() + b.get()
    });

    c.bench_function("memo_computation", |b| {
        b.iter(|| {
            black_box(sum.get());
        });
    });
}

fn store_patch_benchmark(c: &mut Criterion) {
    let registry = Registry::new();
    let store = define_store(
        "bench",
        StoreOptions::new().state(|| json!({ "counter": 0, "meta": { "name": "test", "tags": [] } })),
    )
    .use_store(&registry)
    .expect("store builds");

    c.bench_function("store_patch", |b| {
        let mut i = 0;
        b.iter(|| {
            let mut partial = Map::new();
            partial.insert("counter".into(), json!(black_box(i)));
            partial.insert("meta".into(), json!({ "name": "patched" }));
            store.patch(&partial);
            i += 1;
        });
    });
}

fn store_subscribe_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_subscribe");

    for subscriber_count in [1, 10, 100].iter() {
        let registry = Registry::new();
        let store = define_store("bench", StoreOptions::new().state(|| json!({ "value": 0 })))
            .use_store(&registry)
            .expect("store builds");

        for _ in 0..*subscriber_count {
            store.subscribe(
                |_| {
                    // Empty subscriber
                },
                WatchOptions::default(),
            );
        }

        group.bench_with_input(
            BenchmarkId::from_parameter(subscriber_count),
            subscriber_count,
            |b, _| {
                let mut i = 0;
                b.iter(|| {
                    store.set("value", json!(black_box(i)));
                    i += 1;
                });
            },
        );
    }
    group.finish();
}

fn action_dispatch_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("action_dispatch");

    for hook_count in [0, 10].iter() {
        let registry = Registry::new();
        let store = define_store(
            "bench",
            StoreOptions::new().action("noop", |_, args| {
                Ok(args.first().cloned().unwrap_or(Value::Null))
            }),
        )
        .use_store(&registry)
        .expect("store builds");

        for _ in 0..*hook_count {
            store.on_action(|ctx| {
                ctx.after(|_| {});
            });
        }

        group.bench_with_input(BenchmarkId::from_parameter(hook_count), hook_count, |b, _| {
            b.iter(|| {
                black_box(store.call("noop", &[json!(1)]).expect("known action"));
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    signal_read_benchmark,
    signal_write_benchmark,
    memo_computation_benchmark,
    store_patch_benchmark,
    store_subscribe_benchmark,
    action_dispatch_benchmark,
);
criterion_main!(benches);
