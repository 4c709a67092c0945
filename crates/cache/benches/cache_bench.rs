use cache::Cache;
use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use tempfile::tempdir;

const FILES: u32 = 1_000;
const SMALL: usize = 400;
const LARGE: usize = 8_192;

fn write_small_files(c: &mut Criterion) {
    c.bench_function("write_small_1k", |b| {
        b.iter_batched(
            || {
                let dir = tempdir().unwrap();
                let cache = Cache::create(dir.path(), 1).unwrap();
                (dir, cache)
            },
            |(_dir, cache)| {
                let index = cache.get_index(0).unwrap();
                for file_id in 0..FILES {
                    index.write(file_id, &[b'x'; SMALL]).unwrap();
                }
            },
            BatchSize::SmallInput,
        );
    });
}

fn write_large_files(c: &mut Criterion) {
    c.bench_function("write_8k_1k", |b| {
        b.iter_batched(
            || {
                let dir = tempdir().unwrap();
                let cache = Cache::create(dir.path(), 1).unwrap();
                (dir, cache)
            },
            |(_dir, cache)| {
                let index = cache.get_index(0).unwrap();
                let data = vec![b'y'; LARGE];
                for file_id in 0..FILES {
                    index.write(file_id, &data).unwrap();
                }
            },
            BatchSize::SmallInput,
        );
    });
}

fn overwrite_in_place(c: &mut Criterion) {
    c.bench_function("overwrite_small_1k", |b| {
        b.iter_batched(
            || {
                let dir = tempdir().unwrap();
                let cache = Cache::create(dir.path(), 1).unwrap();
                let index = cache.get_index(0).unwrap();
                for file_id in 0..FILES {
                    index.write(file_id, &[b'a'; SMALL]).unwrap();
                }
                (dir, cache)
            },
            |(_dir, cache)| {
                let index = cache.get_index(0).unwrap();
                for file_id in 0..FILES {
                    index.write(file_id, &[b'b'; SMALL]).unwrap();
                }
            },
            BatchSize::SmallInput,
        );
    });
}

fn read_large_files(c: &mut Criterion) {
    c.bench_function("read_8k_1k", |b| {
        b.iter_batched(
            || {
                let dir = tempdir().unwrap();
                let cache = Cache::create(dir.path(), 1).unwrap();
                let index = cache.get_index(0).unwrap();
                let data = vec![b'z'; LARGE];
                for file_id in 0..FILES {
                    index.write(file_id, &data).unwrap();
                }
                (dir, cache)
            },
            |(_dir, cache)| {
                let index = cache.get_index(0).unwrap();
                let mut total = 0usize;
                for file_id in 0..FILES {
                    total += index.read(file_id).unwrap().len();
                }
                assert_eq!(total, FILES as usize * LARGE);
            },
            BatchSize::LargeInput,
        );
    });
}

criterion_group!(
    benches,
    write_small_files,
    write_large_files,
    overwrite_in_place,
    read_large_files,
);

criterion_main!(benches);
