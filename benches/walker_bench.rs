//! Benchmarks for fanout-walker
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fanout_walker::config::Scheduling;
use fanout_walker::source::MemoryTree;
use fanout_walker::walker::WalkCoordinator;

fn benchmark_queue_operations(c: &mut Criterion) {
    use fanout_walker::walker::queue::{BlockingQueue, Message};

    c.bench_function("queue_send_receive", |b| {
        let queue = BlockingQueue::new();

        b.iter(|| {
            queue.send_work("/test/path".to_string());
            let received = queue.receive();
            black_box(matches!(received, Message::Work(_)));
        })
    });
}

fn benchmark_schedulers(c: &mut Criterion) {
    let tree = MemoryTree::uniform(4, 6, 8);
    let mut group = c.benchmark_group("walk_uniform_4x6");

    for workers in [1, 4, 16] {
        group.bench_with_input(BenchmarkId::new("batch", workers), &workers, |b, &k| {
            b.iter(|| {
                let scheduling = Scheduling::batch(k).unwrap();
                let report = WalkCoordinator::new(scheduling)
                    .walk(&tree, "r".to_string())
                    .unwrap();
                black_box(report.leaves.len());
            })
        });

        group.bench_with_input(BenchmarkId::new("pool", workers), &workers, |b, &n| {
            b.iter(|| {
                let scheduling = Scheduling::pool(n).unwrap();
                let report = WalkCoordinator::new(scheduling)
                    .walk(&tree, "r".to_string())
                    .unwrap();
                black_box(report.leaves.len());
            })
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_queue_operations, benchmark_schedulers);
criterion_main!(benches);
