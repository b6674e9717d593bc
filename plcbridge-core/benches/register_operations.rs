use plcbridge_core::{HistoryStore, RegisterAggregator, RegisterPolicy};
use plcbridge_types::{Role, SampleRecord, Value};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

/// Benchmark observe on a register that already exists (hot path)
fn bench_observe(c: &mut Criterion) {
    let registers = RegisterAggregator::new();
    let value = Value::Int(42);
    registers.observe("pressure", &value, RegisterPolicy::BOTH).ok();

    c.bench_function("observe_existing", |b| {
        b.iter(|| {
            registers
                .observe(black_box("pressure"), black_box(&value), RegisterPolicy::BOTH)
                .ok();
        });
    });
}

/// Benchmark observe across many variables
fn bench_observe_many_keys(c: &mut Criterion) {
    let mut group = c.benchmark_group("observe_many_keys");

    for key_count in [1usize, 10, 100].iter() {
        let registers = RegisterAggregator::new();
        let keys: Vec<String> = (0..*key_count).map(|i| format!("var-{}", i)).collect();

        group.bench_with_input(
            BenchmarkId::from_parameter(key_count),
            key_count,
            |b, _| {
                let mut n = 0i64;
                b.iter(|| {
                    for key in &keys {
                        n += 1;
                        registers
                            .observe(key, &Value::Int(n % 97), RegisterPolicy::BOTH)
                            .ok();
                    }
                });
            },
        );
    }
    group.finish();
}

/// Benchmark observe with text values that need parsing
fn bench_observe_text(c: &mut Criterion) {
    let registers = RegisterAggregator::new();
    let value = Value::Text(" 1234 ".to_string());

    c.bench_function("observe_text", |b| {
        b.iter(|| {
            registers
                .observe(black_box("label"), black_box(&value), RegisterPolicy::BOTH)
                .ok();
        });
    });
}

/// Benchmark history append at varying capacities (includes fsync)
fn bench_history_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("history_append");
    group.sample_size(20);

    for capacity in [10usize, 100].iter() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::open(dir.path(), *capacity).unwrap();
        let record = SampleRecord::new(Value::Float(21.5), Role::Normal);

        group.bench_with_input(BenchmarkId::from_parameter(capacity), capacity, |b, _| {
            b.iter(|| {
                store.append(black_box("temp"), black_box(&record)).unwrap();
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_observe,
    bench_observe_many_keys,
    bench_observe_text,
    bench_history_append,
);

criterion_main!(benches);
