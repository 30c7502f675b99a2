use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pvsearch::board::Position;
use pvsearch::options::EngineOptions;
use pvsearch::search::tt::TranspositionTable;
use pvsearch::search::worker::{SearchSignals, Worker};
use std::sync::Arc;

fn bench_qsearch(c: &mut Criterion) {
    let pos = Position::from_fen("r1b1k2r/ppppqppp/2n2n2/2b1p3/2BPP3/2N2N2/PPP2PPP/R1BQK2R w KQkq - 0 1").unwrap();
    let tt = Arc::new(TranspositionTable::new(16));
    let mut w = Worker::new(0, 1, tt, Arc::new(SearchSignals::default()), &EngineOptions::default());
    c.bench_function("qsearch_italian", |b| b.iter(|| black_box(w.qsearch_value(black_box(&pos)))));
}

criterion_group!(benches, bench_qsearch);
criterion_main!(benches);
