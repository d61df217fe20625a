// Copyright (c) 2025 Felix Kahle.
//
// Permission is hereby granted, free of charge, to any person obtaining
// a copy of this software and associated documentation files (the
// "Software"), to deal in the Software without restriction, including
// without limitation the rights to use, copy, modify, merge, publish,
// distribute, sublicense, and/or sell copies of the Software, and to
// permit persons to whom the Software is furnished to do so, subject to
// the following conditions:
//
// The above copyright notice and this permission notice shall be
// included in all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND,
// EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF
// MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
// NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE
// LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION
// OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN CONNECTION
// WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

use bytesparse::BlockList;
use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use rand::{Rng, SeedableRng, rngs::StdRng};
use std::hint::black_box;

type A = u64;

// Sparse layout: `count` blocks of 16 bytes, one every 64 addresses.
fn build_sparse(count: usize) -> BlockList<A> {
    let mut list = BlockList::with_capacity(count);
    let payload = [0xAAu8; 16];
    for i in 0..count as A {
        let _ = list.insert_block(i * 64, &payload);
    }
    list
}

fn gen_writes(space: A, count: usize, seed: u64) -> Vec<(A, Vec<u8>)> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        let start = rng.random_range(0..space);
        let len = rng.random_range(1..=48usize);
        out.push((start, vec![rng.random::<u8>(); len]));
    }
    out
}

fn gen_ranges(space: A, count: usize, seed: u64) -> Vec<(A, A)> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let start = rng.random_range(0..space);
            (start, start + rng.random_range(1..=256))
        })
        .collect()
}

fn bench_insert_block(c: &mut Criterion) {
    let base = build_sparse(4096);
    let writes = gen_writes(4096 * 64, 1000, 7);

    let mut group = c.benchmark_group("blocklist_insert");
    group.bench_function("insert_block_random", |b| {
        b.iter_batched(
            || base.clone(),
            |mut list| {
                for (start, data) in &writes {
                    let _ = list.insert_block(*start, data);
                }
                black_box(list.len())
            },
            BatchSize::LargeInput,
        )
    });
    group.bench_function("append_sequential", |b| {
        b.iter(|| {
            let mut list = BlockList::<A>::new();
            for i in 0..4096 {
                let _ = list.insert_block(i * 8, &[1, 2, 3, 4, 5, 6, 7, 8]);
            }
            black_box(list.len())
        })
    });
    group.finish();
}

fn bench_remove_range(c: &mut Criterion) {
    let base = build_sparse(4096);
    let ranges = gen_ranges(4096 * 64, 1000, 11);

    let mut group = c.benchmark_group("blocklist_remove");
    group.bench_function("remove_range_random", |b| {
        b.iter_batched(
            || base.clone(),
            |mut list| {
                for (start, endex) in &ranges {
                    let _ = list.remove_range(*start, *endex);
                }
                black_box(list.content_size())
            },
            BatchSize::LargeInput,
        )
    });
    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    let base = build_sparse(16_384);
    let mut rng = StdRng::seed_from_u64(42);
    let lookups: Vec<A> = (0..1000).map(|_| rng.random_range(0..16_384 * 64)).collect();
    let ranges = gen_ranges(16_384 * 64, 1000, 43);

    let mut group = c.benchmark_group("blocklist_lookup");
    group.bench_function("find_block_at", |b| {
        b.iter(|| {
            let mut hits = 0usize;
            for p in &lookups {
                if base.find_block_at(*p).is_some() {
                    hits += 1;
                }
            }
            black_box(hits)
        })
    });
    group.bench_function("find_blocks_overlapping", |b| {
        b.iter(|| {
            let mut total = 0usize;
            for (start, endex) in &ranges {
                total += base.find_blocks_overlapping(*start, *endex).len();
            }
            black_box(total)
        })
    });
    group.finish();
}

criterion_group!(benches, bench_insert_block, bench_remove_range, bench_lookup);
criterion_main!(benches);
