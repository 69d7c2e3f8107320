/*!
 * Synchronization Primitives Benchmarks
 *
 * Compare spin tuning profiles under contention, plus handle-clone cost
 */

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use keepsync::{Mutex, RwLock, SharedHandle, SyncConfig};
use std::sync::Arc;
use std::thread;

fn bench_mutex_uncontended(c: &mut Criterion) {
    let mutex = Mutex::new(0u64);

    c.bench_function("mutex_uncontended_increment", |b| {
        b.iter(|| {
            *mutex.lock() += 1;
        });
    });
}

fn bench_mutex_contended(c: &mut Criterion) {
    let mut group = c.benchmark_group("mutex_contended");

    for (name, config) in [
        ("default", SyncConfig::DEFAULT),
        ("low_latency", SyncConfig::low_latency()),
        ("no_spin", SyncConfig::no_spin()),
    ] {
        group.bench_with_input(BenchmarkId::from_parameter(name), &config, |b, config| {
            b.iter(|| {
                let counter = Arc::new(Mutex::with_config(0u64, *config));

                let workers: Vec<_> = (0..4)
                    .map(|_| {
                        let counter = Arc::clone(&counter);
                        thread::spawn(move || {
                            for _ in 0..500 {
                                *counter.lock() += 1;
                            }
                        })
                    })
                    .collect();
                for worker in workers {
                    worker.join().unwrap();
                }

                assert_eq!(*counter.lock(), 2_000);
            });
        });
    }

    group.finish();
}

fn bench_rwlock_read_heavy(c: &mut Criterion) {
    let lock = RwLock::new(vec![1u64; 64]);

    c.bench_function("rwlock_read_acquire", |b| {
        b.iter(|| {
            let guard = lock.read();
            black_box(guard[0]);
        });
    });
}

fn bench_shared_handle_clone(c: &mut Criterion) {
    let handle = SharedHandle::new([0u8; 32]);

    c.bench_function("shared_handle_clone_drop", |b| {
        b.iter(|| {
            black_box(handle.clone());
        });
    });
}

criterion_group!(
    benches,
    bench_mutex_uncontended,
    bench_mutex_contended,
    bench_rwlock_read_heavy,
    bench_shared_handle_clone,
);
criterion_main!(benches);
