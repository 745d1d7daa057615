//! Buffer hot-path microbenchmarks.
//!
//! Covers:
//! - put + take cycle with no contention (lock + signal-no-waiter path)
//! - occupancy probe (lock-only path)
//! - cross-thread ping-pong roundtrip on a capacity-1 buffer (the wake path
//!   the inversion scenarios stress)

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use picv_core::CircularBuffer;

fn bench_put_take_uncontended(c: &mut Criterion) {
    let buf = CircularBuffer::with_capacity(8).unwrap();
    let mut group = c.benchmark_group("buffer_hotpath");
    group.throughput(Throughput::Elements(1));
    group.bench_function("put_take_uncontended", |b| {
        b.iter(|| {
            buf.put(black_box(1u32)).unwrap();
            black_box(buf.take());
        });
    });
    group.finish();
}

fn bench_occupancy_probe(c: &mut Criterion) {
    let buf = CircularBuffer::with_capacity(8).unwrap();
    buf.put(1u32).unwrap();
    let mut group = c.benchmark_group("buffer_hotpath");
    group.throughput(Throughput::Elements(1));
    group.bench_function("occupancy_probe", |b| {
        b.iter(|| black_box(buf.occupancy()));
    });
    group.finish();
}

/// Capacity-1 ping-pong: every put wakes a blocked taker and vice versa.
/// Thread-heavy, so driven manually via iter_custom like the condvar
/// roundtrip benches rather than through criterion's default loop.
fn bench_ping_pong_roundtrip(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffer_hotpath");
    group.throughput(Throughput::Elements(1));
    group.bench_function("ping_pong_roundtrip", |b| {
        b.iter_custom(|iters| {
            let buf = Arc::new(CircularBuffer::with_capacity(1).unwrap());
            let taker = {
                let buf = Arc::clone(&buf);
                thread::spawn(move || {
                    let mut taken = 0u64;
                    while buf.take().is_some() {
                        taken += 1;
                    }
                    taken
                })
            };

            let start = Instant::now();
            for i in 0..iters {
                buf.put(i as u32).unwrap();
            }
            let dur = start.elapsed().max(Duration::from_nanos(1));

            buf.close();
            let taken = taker.join().expect("taker thread panicked");
            assert_eq!(taken, iters);
            dur
        });
    });
    group.finish();
}

criterion_group!(
    name = benches;
    config = Criterion::default()
        .warm_up_time(Duration::from_millis(500))
        .measurement_time(Duration::from_secs(3))
        .sample_size(50);
    targets =
        bench_put_take_uncontended,
        bench_occupancy_probe,
        bench_ping_pong_roundtrip
);
criterion_main!(benches);
