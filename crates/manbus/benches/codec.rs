// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2026 manbus contributors

//! Wire-format hot paths: Manchester expansion and CRC-8.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use manbus::wire::frame::{MAX_ENCODED, MAX_FRAME};
use manbus::wire::{crc8, manchester};

fn bench_manchester_encode(c: &mut Criterion) {
    let frame: Vec<u8> = (0..MAX_FRAME).map(|i| i as u8).collect();
    let mut out = vec![0u8; MAX_ENCODED];
    c.bench_function("manchester_encode_max_frame", |b| {
        b.iter(|| manchester::encode(black_box(&frame), black_box(&mut out)));
    });
}

fn bench_manchester_decode(c: &mut Criterion) {
    let frame: Vec<u8> = (0..MAX_FRAME).map(|i| i as u8).collect();
    let mut symbols = vec![0u8; MAX_ENCODED];
    manchester::encode(&frame, &mut symbols);
    let mut back = vec![0u8; MAX_FRAME];
    c.bench_function("manchester_decode_max_frame", |b| {
        b.iter(|| {
            manchester::decode(black_box(&symbols), MAX_FRAME, black_box(&mut back))
                .expect("valid symbols")
        });
    });
}

fn bench_crc8(c: &mut Criterion) {
    let body: Vec<u8> = (0..MAX_FRAME - 1).map(|i| (i * 7) as u8).collect();
    c.bench_function("crc8_max_body", |b| {
        b.iter(|| crc8(black_box(&body)));
    });
}

criterion_group!(
    benches,
    bench_manchester_encode,
    bench_manchester_decode,
    bench_crc8
);
criterion_main!(benches);
