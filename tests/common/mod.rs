#![allow(dead_code)]

use pvsearch::options::EngineOptions;
use pvsearch::search::{IterationInfo, SearchListener, ThreadPool};
use std::sync::{Arc, Mutex};

pub fn options(threads: usize) -> EngineOptions {
    EngineOptions { threads, hash_mb: 8, ..EngineOptions::default() }
}

pub fn pool(threads: usize) -> ThreadPool {
    ThreadPool::silent(options(threads)).expect("spawn pool")
}

/// Records everything the lead thread reports.
#[derive(Default)]
pub struct Recorder {
    pub infos: Mutex<Vec<IterationInfo>>,
    pub best: Mutex<Vec<(Option<String>, Option<String>)>>,
    pub perft: Mutex<Option<(Vec<(String, u64)>, u64)>>,
}

impl SearchListener for Recorder {
    fn on_iteration(&self, info: &IterationInfo) {
        self.infos.lock().unwrap().push(info.clone());
    }
    fn on_best_move(&self, best: Option<&str>, ponder: Option<&str>) {
        self.best.lock().unwrap().push((best.map(str::to_string), ponder.map(str::to_string)));
    }
    fn on_perft(&self, divide: &[(String, u64)], total: u64) {
        *self.perft.lock().unwrap() = Some((divide.to_vec(), total));
    }
}

pub fn recording_pool(threads: usize) -> (ThreadPool, Arc<Recorder>) {
    let rec = Arc::new(Recorder::default());
    let pool = ThreadPool::new(options(threads), rec.clone()).expect("spawn pool");
    (pool, rec)
}
