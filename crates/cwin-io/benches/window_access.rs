#![forbid(unsafe_code)]

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use cwin_io::{CacheWindow, Descriptor, MemDescriptor};
use cwin_types::{ByteOffset, WindowSize};
use std::hint::black_box;

const FILE_LEN: usize = 64 * 1024;

fn source() -> MemDescriptor {
    MemDescriptor::from_bytes((0..FILE_LEN).map(|i| (i % 251) as u8).collect())
}

fn bench_sequential_bytes(c: &mut Criterion) {
    let mut group = c.benchmark_group("sequential_read_byte");

    group.bench_function("direct_descriptor", |b| {
        b.iter(|| {
            let mut desc = source();
            desc.seek_to(ByteOffset::ZERO).expect("seek");
            let mut byte = [0_u8; 1];
            let mut sum = 0_u64;
            while desc.read(&mut byte).expect("read") == 1 {
                sum += u64::from(byte[0]);
            }
            black_box(sum)
        });
    });

    for window in [8_usize, 64, 4096] {
        group.bench_with_input(BenchmarkId::new("cache_window", window), &window, |b, &w| {
            b.iter(|| {
                let size = WindowSize::new(w).expect("size");
                let mut cw = CacheWindow::with_descriptor(source(), "bench", size).expect("open");
                let mut sum = 0_u64;
                while let Some(byte) = cw.read_byte().expect("read") {
                    sum += u64::from(byte);
                }
                black_box(sum)
            });
        });
    }
    group.finish();
}

fn bench_mixed_writes(c: &mut Criterion) {
    c.bench_function("write_byte_then_block", |b| {
        b.iter(|| {
            let mut cw =
                CacheWindow::with_descriptor(MemDescriptor::new(), "bench", WindowSize::default())
                    .expect("open");
            let block = [0xAB_u8; 32];
            for i in 0..1024_u32 {
                cw.write_byte(i.to_le_bytes()[0]).expect("write_byte");
                cw.write(&block).expect("write");
            }
            black_box(cw.close().expect("close"))
        });
    });
}

criterion_group!(benches, bench_sequential_bytes, bench_mixed_writes);
criterion_main!(benches);
