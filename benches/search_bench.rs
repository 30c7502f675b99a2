use criterion::{criterion_group, criterion_main, Criterion};
use pvsearch::board::Position;
use pvsearch::options::EngineOptions;
use pvsearch::search::{Limits, ThreadPool};

fn bench_search(c: &mut Criterion) {
    let pos = Position::startpos();
    let mut group = c.benchmark_group("search_startpos");
    group.sample_size(10);
    for threads in [1usize, 4] {
        let options = EngineOptions { threads, hash_mb: 16, ..EngineOptions::default() };
        let mut pool = ThreadPool::silent(options).unwrap();
        group.bench_function(format!("depth8_t{threads}"), |b| {
            b.iter(|| {
                pool.clear().unwrap();
                pool.search(&pos, Limits::depth(8)).unwrap()
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_search);
criterion_main!(benches);
