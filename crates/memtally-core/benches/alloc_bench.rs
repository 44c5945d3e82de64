//! Accounting overhead benchmarks.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use memtally_core::TrackedHeap;

fn bench_alloc_free_cycle(c: &mut Criterion) {
    let heap = TrackedHeap::default();
    let sizes: &[usize] = &[16, 64, 256, 1024, 4096, 32768];
    let mut group = c.benchmark_group("alloc_free_cycle");

    for &size in sizes {
        group.bench_with_input(BenchmarkId::new("tracked", size), &size, |b, &sz| {
            b.iter(|| {
                let ptr = heap.allocate(sz);
                // SAFETY: ptr is live and freed exactly once per iteration.
                unsafe { heap.deallocate(criterion::black_box(ptr).as_ptr()) };
            });
        });
    }
    group.finish();
}

fn bench_resize_cycle(c: &mut Criterion) {
    let heap = TrackedHeap::default();
    let mut group = c.benchmark_group("resize_cycle");

    group.bench_function("64B_grow_shrink", |b| {
        b.iter(|| {
            let mut ptr = heap.allocate(64).as_ptr();
            // SAFETY: ptr tracks the single live block throughout.
            unsafe {
                ptr = heap.resize(ptr, 1024);
                ptr = heap.resize(ptr, 64);
                heap.deallocate(criterion::black_box(ptr));
            }
        });
    });

    group.finish();
}

fn bench_counter_snapshot(c: &mut Criterion) {
    let heap = TrackedHeap::default();
    let ptr = heap.allocate(4096);

    c.bench_function("current_dram_usage", |b| {
        b.iter(|| criterion::black_box(heap.current_dram_usage()));
    });

    // SAFETY: ptr is live and freed exactly once.
    unsafe { heap.deallocate(ptr.as_ptr()) };
}

criterion_group!(
    benches,
    bench_alloc_free_cycle,
    bench_resize_cycle,
    bench_counter_snapshot
);
criterion_main!(benches);
