use std::sync::Arc;
use std::thread;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use parking_lot::RwLock;
use vismon_sdk::{Engine, FieldError, FieldValue, Trackable};

struct Worker {
    state: RwLock<&'static str>,
}

impl Trackable for Worker {
    fn fields(&self) -> Vec<String> {
        vec!["State".to_string()]
    }

    fn read_field(&self, name: &str) -> Result<FieldValue, FieldError> {
        match name {
            "State" => Ok((*self.state.read()).into()),
            other => Err(FieldError::unknown(other)),
        }
    }
}

fn worker() -> Arc<Worker> {
    Arc::new(Worker {
        state: RwLock::new("Idle"),
    })
}

/// Benchmark register/unregister from varying thread counts
fn bench_register_varying_threads(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent_register");

    for thread_count in [1, 2, 4, 8].iter() {
        group.throughput(Throughput::Elements(*thread_count as u64 * 100));
        group.bench_with_input(
            BenchmarkId::new("threads", thread_count),
            thread_count,
            |b, &thread_count| {
                b.iter(|| {
                    let engine = Arc::new(Engine::new());
                    let mut handles_vec = vec![];

                    for _ in 0..thread_count {
                        let engine = Arc::clone(&engine);
                        handles_vec.push(thread::spawn(move || {
                            let workers: Vec<_> = (0..100).map(|_| worker()).collect();
                            for w in &workers {
                                black_box(engine.register(w));
                            }
                            for w in &workers {
                                engine.unregister_object(w);
                            }
                        }));
                    }

                    for join_handle in handles_vec {
                        join_handle.join().unwrap();
                    }
                });
            },
        );
    }
    group.finish();
}

/// Benchmark phase timers closing concurrently (shared timing history)
fn bench_concurrent_phase_timers(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent_phase_timers");

    for thread_count in [2, 4, 8].iter() {
        group.throughput(Throughput::Elements(*thread_count as u64 * 1000));
        group.bench_with_input(
            BenchmarkId::from_parameter(thread_count),
            thread_count,
            |b, &thread_count| {
                b.iter(|| {
                    let engine = Arc::new(Engine::new());
                    let mut handles_vec = vec![];

                    for t in 0..thread_count {
                        let engine = Arc::clone(&engine);
                        handles_vec.push(thread::spawn(move || {
                            let component = format!("worker-{}", t);
                            for _ in 0..1000 {
                                drop(engine.start_phase("step", component.as_str(), "Core"));
                            }
                        }));
                    }

                    for join_handle in handles_vec {
                        join_handle.join().unwrap();
                    }
                });
            },
        );
    }
    group.finish();
}

/// Benchmark collect() while other threads register
fn bench_collect_during_registration(c: &mut Criterion) {
    c.bench_function("collect_during_registration", |b| {
        b.iter(|| {
            let engine = Arc::new(Engine::new());
            let writer = {
                let engine = Arc::clone(&engine);
                thread::spawn(move || {
                    let workers: Vec<_> = (0..200).map(|_| worker()).collect();
                    for w in &workers {
                        engine.register(w);
                    }
                    workers
                })
            };

            for _ in 0..10 {
                black_box(engine.collect());
            }
            black_box(writer.join().unwrap());
        });
    });
}

criterion_group!(
    benches,
    bench_register_varying_threads,
    bench_concurrent_phase_timers,
    bench_collect_during_registration
);
criterion_main!(benches);
