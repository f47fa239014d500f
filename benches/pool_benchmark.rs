//! Performance benchmarks for s3csecmd
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use s3csecmd::config::TransferConfig;
use s3csecmd::core::run_pipeline;
use s3csecmd::crypto::{EnvelopeCipher, LocalKeyWrapper};
use s3csecmd::storage::{MemoryStore, S3Location};
use s3csecmd::transfer::TransferClient;
use std::io::Read;
use std::sync::Arc;
use tempfile::TempDir;

fn bench_pool_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool_noop_tasks");
    let tasks = 10_000u64;
    group.throughput(Throughput::Elements(tasks));

    for workers in [1usize, 4, 8, 32] {
        group.bench_with_input(BenchmarkId::from_parameter(workers), &workers, |b, &workers| {
            b.iter(|| {
                let summary = run_pipeline(workers, None, |pool| {
                    for i in 0..tasks {
                        pool.submit_fn("noop", move || {
                            black_box(i);
                            Ok(())
                        })?;
                    }
                    Ok(())
                })
                .unwrap();
                black_box(summary.tasks_completed)
            });
        });
    }

    group.finish();
}

fn bench_envelope(c: &mut Criterion) {
    let mut group = c.benchmark_group("envelope_encrypt");
    let cipher = EnvelopeCipher::new(Arc::new(LocalKeyWrapper::generate("bench")));

    for size in [64 * 1024usize, 1024 * 1024, 8 * 1024 * 1024] {
        let data: Vec<u8> = (0..size).map(|i| (i % 256) as u8).collect();
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(humansize::format_size(size as u64, humansize::BINARY)),
            &data,
            |b, data| {
                b.iter(|| {
                    let (mut reader, _) = cipher.encrypt(&data[..], data.len() as u64).unwrap();
                    let mut sealed = Vec::with_capacity(data.len() + 4096);
                    reader.read_to_end(&mut sealed).unwrap();
                    black_box(sealed.len())
                });
            },
        );
    }

    group.finish();
}

fn bench_upload_folder(c: &mut Criterion) {
    let src_dir = TempDir::new().unwrap();
    for i in 0..200 {
        std::fs::write(src_dir.path().join(format!("file_{}.bin", i)), vec![7u8; 4096]).unwrap();
    }

    c.bench_function("upload_200_small_files", |b| {
        b.iter(|| {
            let store = Arc::new(MemoryStore::new());
            let cipher = EnvelopeCipher::new(Arc::new(LocalKeyWrapper::generate("bench")));
            let config = TransferConfig {
                workers: 8,
                ..TransferConfig::default()
            };
            let client = TransferClient::new(store, cipher, config);
            let dest = S3Location::new("bench", "up");
            black_box(client.upload_folder(src_dir.path(), &dest).unwrap())
        });
    });
}

criterion_group!(benches, bench_pool_throughput, bench_envelope, bench_upload_folder);
criterion_main!(benches);
