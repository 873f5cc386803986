/********************************************************************************
 * Copyright (c) 2024 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! Channel benchmarks.
//!
//! Measures the costs the response path pays per message:
//! - Uncontended write/read on one thread
//! - Batch drain with `read_all`
//! - Producer/consumer hand-off across threads at several buffer depths
//!
//! Run with: `cargo bench --bench channel_criterion`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use p4rt_arbiter::channel::{select, Channel, INFINITE};
use std::sync::Arc;
use std::thread;

const BATCH: usize = 1_000;

fn bench_single_thread(c: &mut Criterion) {
    let channel = Channel::<u64>::create(1);

    let mut group = c.benchmark_group("channel_single_thread");
    group.throughput(Throughput::Elements(1));

    group.bench_function("write_read", |b| {
        b.iter(|| {
            channel.write(black_box(7), INFINITE).unwrap();
            black_box(channel.read(INFINITE).unwrap())
        })
    });

    group.bench_function("try_write_try_read", |b| {
        b.iter(|| {
            channel.try_write(black_box(7)).unwrap();
            black_box(channel.try_read().unwrap())
        })
    });

    group.finish();
}

/// Fill a channel and drain it in one call.
fn bench_read_all(c: &mut Criterion) {
    let channel = Channel::<u64>::create(BATCH);

    let mut group = c.benchmark_group("channel_read_all");
    group.throughput(Throughput::Elements(BATCH as u64));

    group.bench_function("drain", |b| {
        b.iter(|| {
            for value in 0..BATCH as u64 {
                channel.try_write(value).unwrap();
            }
            black_box(channel.read_all().unwrap())
        })
    });

    group.finish();
}

/// Cross-thread hand-off. Small depths force the producer to park on a full
/// queue, which is the common case for a slow controller.
fn bench_cross_thread(c: &mut Criterion) {
    let mut group = c.benchmark_group("channel_cross_thread");
    group.throughput(Throughput::Elements(BATCH as u64));

    for depth in [1usize, 16, 256] {
        group.bench_with_input(BenchmarkId::new("depth", depth), &depth, |b, &depth| {
            b.iter(|| {
                let channel = Channel::<u64>::create(depth);
                let producer = {
                    let channel = Arc::clone(&channel);
                    thread::spawn(move || {
                        for value in 0..BATCH as u64 {
                            channel.write(value, INFINITE).unwrap();
                        }
                    })
                };
                for _ in 0..BATCH {
                    black_box(channel.read(INFINITE).unwrap());
                }
                producer.join().unwrap();
            })
        });
    }

    group.finish();
}

/// Consumer multiplexing two channels, one producer each.
fn bench_select(c: &mut Criterion) {
    let mut group = c.benchmark_group("channel_select");
    group.throughput(Throughput::Elements(2 * BATCH as u64));

    group.bench_function("two_producers", |b| {
        b.iter(|| {
            let left = Channel::<u64>::create(64);
            let right = Channel::<u64>::create(64);
            let producers: Vec<_> = [&left, &right]
                .into_iter()
                .map(|channel| {
                    let channel = Arc::clone(channel);
                    thread::spawn(move || {
                        for value in 0..BATCH as u64 {
                            channel.write(value, INFINITE).unwrap();
                        }
                    })
                })
                .collect();

            let mut received = 0;
            while received < 2 * BATCH {
                let ready = select(&[&*left, &*right], INFINITE).unwrap();
                if ready.is_ready(0) {
                    received += left.read_all().unwrap().len();
                }
                if ready.is_ready(1) {
                    received += right.read_all().unwrap().len();
                }
            }
            for producer in producers {
                producer.join().unwrap();
            }
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_single_thread,
    bench_read_all,
    bench_cross_thread,
    bench_select
);
criterion_main!(benches);
