//! Benchmarks for posting overhead per execution mode

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use crossbeam_channel::bounded;
use methodpost::prelude::*;
use std::sync::Arc;

const BATCH: usize = 1_000;

fn setup() -> (MainLoop, Dispatcher) {
    let pool = Arc::new(ThreadPool::new(&PoolConfig::default()).unwrap());
    let main_loop = MainLoop::new();
    let dispatcher =
        Dispatcher::new(pool, Arc::new(main_loop.handle()), ExecutionMode::Background).unwrap();
    (main_loop, dispatcher)
}

fn post_batch(dispatcher: &Dispatcher, mode: ExecutionMode) {
    for i in 0..BATCH {
        dispatcher
            .post(mode, move || {
                black_box(i * i);
            })
            .unwrap();
    }
    let (tx, rx) = bounded(1);
    dispatcher.post(mode, move || tx.send(()).unwrap()).unwrap();
    rx.recv().unwrap();
}

fn bench_immediate(c: &mut Criterion) {
    let (_main_loop, dispatcher) = setup();

    c.bench_function("immediate_post", |b| {
        b.iter(|| {
            dispatcher
                .post(ExecutionMode::Immediate, || {
                    black_box(1 + 1);
                })
                .unwrap()
        });
    });
}

fn bench_background_batch(c: &mut Criterion) {
    let (_main_loop, dispatcher) = setup();

    c.bench_function("background_batch", |b| {
        b.iter(|| post_batch(&dispatcher, ExecutionMode::Background));
    });
}

fn bench_background_and_async(c: &mut Criterion) {
    let (_main_loop, dispatcher) = setup();
    let dispatcher = Arc::new(dispatcher);

    c.bench_function("background_and_async_batch", |b| {
        b.iter(|| {
            let other = dispatcher.clone();
            let handle = std::thread::spawn(move || post_batch(&other, ExecutionMode::Async));
            post_batch(&dispatcher, ExecutionMode::Background);
            handle.join().unwrap();
        });
    });
}

fn bench_main_loop(c: &mut Criterion) {
    let (main_loop, dispatcher) = setup();

    c.bench_function("main_batch", |b| {
        b.iter(|| {
            for i in 0..BATCH {
                dispatcher
                    .post(ExecutionMode::Main, move || {
                        black_box(i);
                    })
                    .unwrap();
            }
            main_loop.run_pending()
        });
    });
}

criterion_group!(
    benches,
    bench_immediate,
    bench_background_batch,
    bench_background_and_async,
    bench_main_loop
);
criterion_main!(benches);
