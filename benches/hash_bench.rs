//! Benchmarks for hashing throughput.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use manifest_uploader::utils::hash::{hash_file, HashingTee};
use std::fs;
use tempfile::TempDir;
use tokio::runtime::Runtime;

const SIZES: [(usize, &str); 4] = [
    (1024, "1KB"),
    (100 * 1024, "100KB"),
    (1024 * 1024, "1MB"),
    (10 * 1024 * 1024, "10MB"),
];

/// Blocking file hash for different file sizes
fn bench_hash_file(c: &mut Criterion) {
    let mut group = c.benchmark_group("hash_file");
    let temp_dir = TempDir::new().unwrap();

    for (size, name) in SIZES {
        let file_path = temp_dir.path().join(format!("test_{}.bin", name));
        fs::write(&file_path, vec![0xA5u8; size]).unwrap();

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("sha256", name), &file_path, |b, path| {
            b.iter(|| hash_file(black_box(path)).unwrap());
        });
    }

    group.finish();
}

/// Hashing tee from a local file into a discarding sink
fn bench_hashing_tee(c: &mut Criterion) {
    let mut group = c.benchmark_group("hashing_tee");
    let temp_dir = TempDir::new().unwrap();
    let runtime = Runtime::new().unwrap();

    for (size, name) in SIZES {
        let file_path = temp_dir.path().join(format!("tee_{}.bin", name));
        fs::write(&file_path, vec![0x5Au8; size]).unwrap();

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("file_to_sink", name), &file_path, |b, path| {
            b.iter(|| {
                runtime.block_on(async {
                    let source = tokio::fs::File::open(path).await.unwrap();
                    let mut tee = HashingTee::new(source, tokio::io::sink());
                    tee.copy_to_end().await.unwrap();
                    black_box(tee.finalize().0)
                })
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_hash_file, bench_hashing_tee);
criterion_main!(benches);
