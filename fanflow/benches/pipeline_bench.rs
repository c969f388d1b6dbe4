//! Benchmarks for pipeline runs.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fanflow::prelude::*;
use std::time::Duration;

fn predicate_match(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .unwrap();

    let mut group = c.benchmark_group("predicate_match");
    for branches in [1_usize, 2, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(branches), &branches, |b, &n| {
            b.to_async(&runtime).iter(|| async move {
                let config = PipelineConfig::new(Alphabet::latin(), |v: &Labeled<char>| {
                    v.value == 'z'
                })
                .with_branch_count(n)
                .with_overall_deadline(Duration::from_secs(5));
                black_box(run_pipeline(config).await.unwrap())
            });
        });
    }
    group.finish();
}

fn signal_fan_out(c: &mut Criterion) {
    c.bench_function("trigger_tree_of_64", |b| {
        b.iter(|| {
            let root = CancellationSignal::new();
            let children: Vec<_> = (0..64).map(|_| root.child()).collect();
            root.cancel("bench");
            black_box(children.iter().all(CancellationSignal::is_triggered))
        });
    });
}

criterion_group!(benches, predicate_match, signal_fan_out);
criterion_main!(benches);
