// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(missing_docs)]
//! Benchmark: runtime drain throughput
//!
//! Loads a wide tree with child walking enabled and drains the frontier with
//! either the identity `mark` rule (scheduler and matching overhead only) or
//! the grow/shrink pair (action and interning work included). Runtime
//! construction and load happen in the setup phase.
//!
//! Throughput "elements" are frontier entries scheduled at load.
use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use nanocode_core::{Runtime, SchedulerKind};
use nanocode_dry_tests::{balanced_tree, grow_shrink_rules, mark_rule, RuntimeTestBuilder};
use std::time::Duration;

fn loaded(builder: RuntimeTestBuilder, width: usize) -> Runtime {
    let (rt, _) = builder
        .walk_children()
        .load(&balanced_tree(1, width))
        .expect("load bench runtime");
    rt
}

fn bench_runtime_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("runtime_drain");
    group
        .warm_up_time(Duration::from_secs(2))
        .measurement_time(Duration::from_secs(8))
        .sample_size(40);
    for &width in &[10usize, 100, 1_000] {
        group.throughput(Throughput::Elements(width as u64 + 1));

        for kind in [
            SchedulerKind::Fifo,
            SchedulerKind::Lifo,
            SchedulerKind::Random { seed: 7 },
        ] {
            group.bench_function(BenchmarkId::new(format!("mark/{}", kind.name()), width), |b| {
                b.iter_batched(
                    || {
                        loaded(
                            RuntimeTestBuilder::new()
                                .with_rule(mark_rule())
                                .configure(|cfg| cfg.with_scheduler(kind)),
                            width,
                        )
                    },
                    |mut rt| {
                        let events = rt.run_until_idle(None).expect("drain");
                        criterion::black_box(events);
                    },
                    BatchSize::PerIteration,
                );
            });
        }

        group.bench_function(BenchmarkId::new("grow_shrink", width), |b| {
            b.iter_batched(
                || {
                    loaded(
                        RuntimeTestBuilder::new().with_rules(grow_shrink_rules(2)),
                        width,
                    )
                },
                |mut rt| {
                    let events = rt.run_until_idle(None).expect("drain");
                    criterion::black_box(events);
                },
                BatchSize::PerIteration,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_runtime_drain);
criterion_main!(benches);
