// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors

use std::sync::Arc;
use std::thread;

use criterion::{criterion_group, criterion_main, Criterion};
use threadchan::make_channel;

fn bench_buffered_single_pair(c: &mut Criterion) {
    c.bench_function("buffered_1x1_roundtrip", |b| {
        b.iter(|| {
            let chan = Arc::new(make_channel::<u64>(64));
            let consumer = Arc::clone(&chan);
            let handle = thread::spawn(move || {
                let mut sum = 0u64;
                while let Some(v) = consumer.receive() {
                    sum += v;
                }
                sum
            });
            for i in 0..1000u64 {
                chan.send(i);
            }
            chan.close();
            handle.join().unwrap()
        });
    });
}

fn bench_unbuffered_single_pair(c: &mut Criterion) {
    c.bench_function("unbuffered_1x1_roundtrip", |b| {
        b.iter(|| {
            let chan = Arc::new(make_channel::<u64>(0));
            let consumer = Arc::clone(&chan);
            let handle = thread::spawn(move || {
                let mut sum = 0u64;
                while let Some(v) = consumer.receive() {
                    sum += v;
                }
                sum
            });
            for i in 0..200u64 {
                chan.send(i);
            }
            chan.close();
            handle.join().unwrap()
        });
    });
}

fn bench_fan_in_out(c: &mut Criterion) {
    c.bench_function("buffered_8x8_fan_in_out", |b| {
        b.iter(|| {
            let chan = Arc::new(make_channel::<u64>(64));
            let producers: Vec<_> = (0..8)
                .map(|p| {
                    let chan = Arc::clone(&chan);
                    thread::spawn(move || {
                        for i in 0..200u64 {
                            chan.send(p * 200 + i);
                        }
                    })
                })
                .collect();
            let consumers: Vec<_> = (0..8)
                .map(|_| {
                    let chan = Arc::clone(&chan);
                    thread::spawn(move || {
                        let mut count = 0u64;
                        while chan.receive().is_some() {
                            count += 1;
                        }
                        count
                    })
                })
                .collect();
            for p in producers {
                p.join().unwrap();
            }
            chan.close();
            for c in consumers {
                c.join().unwrap();
            }
        });
    });
}

criterion_group!(
    benches,
    bench_buffered_single_pair,
    bench_unbuffered_single_pair,
    bench_fan_in_out
);
criterion_main!(benches);
