use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use vismon_sdk::{Engine, PhaseTimer};

/// Benchmark a full start/drop cycle recorded into the engine (hot path)
fn bench_start_and_drop(c: &mut Criterion) {
    let engine = Engine::new();

    c.bench_function("phase_start_drop", |b| {
        b.iter(|| {
            drop(engine.start_phase(black_box("load"), black_box("importer"), black_box("Batch")));
        });
    });
}

/// Benchmark a timer with no engine behind it
fn bench_detached_timer(c: &mut Criterion) {
    c.bench_function("phase_detached_finish", |b| {
        b.iter(|| {
            black_box(PhaseTimer::detached("load", "importer", "Batch").finish());
        });
    });
}

/// Benchmark average_timings() with varying retained sample counts
fn bench_average_varying_samples(c: &mut Criterion) {
    let mut group = c.benchmark_group("average_timings");

    for samples in [10usize, 100, 1000].iter() {
        let engine = Engine::builder().timing_history(*samples).build();
        for i in 0..*samples {
            let phase = format!("phase-{}", i % 8);
            drop(engine.start_phase(phase, "worker", "Core"));
        }

        group.bench_with_input(BenchmarkId::from_parameter(samples), samples, |b, _| {
            b.iter(|| {
                black_box(engine.average_timings(Some("Core")));
            });
        });
    }
    group.finish();
}

/// Benchmark filtered timing_history() over a full buffer
fn bench_timing_history_filtered(c: &mut Criterion) {
    let engine = Engine::new();
    for i in 0..1000 {
        let project = if i % 2 == 0 { "Core" } else { "Plugins" };
        drop(engine.start_phase("step", "worker", project));
    }

    c.bench_function("timing_history_filtered", |b| {
        b.iter(|| {
            black_box(engine.timing_history(Some("Core"), Some("step")));
        });
    });
}

criterion_group!(
    benches,
    bench_start_and_drop,
    bench_detached_timer,
    bench_average_varying_samples,
    bench_timing_history_filtered
);
criterion_main!(benches);
