use crate::error::{EngineError, Result};
use crate::search::params::SearchParams;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const MAX_THREADS: usize = 512;
pub const MAX_HASH_MB: usize = 33_554_432;

/// Engine-wide settings consulted when the pool is (re)built and when a
/// search starts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    pub threads: usize,
    pub hash_mb: usize,
    pub multi_pv: usize,
    pub ponder: bool,
    pub move_overhead_ms: u64,
    pub search: SearchParams,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self { threads: 1, hash_mb: 16, multi_pv: 1, ponder: false, move_overhead_ms: 10, search: SearchParams::default() }
    }
}

impl EngineOptions {
    pub fn from_json_str(s: &str) -> Result<Self> {
        let opts: EngineOptions = serde_json::from_str(s)?;
        Ok(opts.sanitized())
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn sanitized(mut self) -> Self {
        self.threads = self.threads.clamp(1, MAX_THREADS);
        self.hash_mb = self.hash_mb.clamp(1, MAX_HASH_MB);
        self.multi_pv = self.multi_pv.clamp(1, 500);
        self.move_overhead_ms = self.move_overhead_ms.min(5000);
        self.search = self.search.sanitized();
        self
    }

    /// Applies a UCI `setoption` pair. Returns true when the thread pool has
    /// to be rebuilt or resized for the change to take effect.
    pub fn set(&mut self, name: &str, value: &str) -> Result<bool> {
        let bad = || EngineError::InvalidOption { name: name.to_string(), value: value.to_string() };
        match name.to_ascii_lowercase().as_str() {
            "threads" => {
                let n: usize = value.parse().map_err(|_| bad())?;
                if n == 0 || n > MAX_THREADS { return Err(bad()); }
                self.threads = n;
                Ok(true)
            }
            "hash" => {
                let mb: usize = value.parse().map_err(|_| bad())?;
                if mb == 0 || mb > MAX_HASH_MB { return Err(bad()); }
                self.hash_mb = mb;
                Ok(true)
            }
            "multipv" => {
                let n: usize = value.parse().map_err(|_| bad())?;
                if n == 0 || n > 500 { return Err(bad()); }
                self.multi_pv = n;
                Ok(false)
            }
            "ponder" => {
                self.ponder = value.parse().map_err(|_| bad())?;
                Ok(false)
            }
            "move overhead" => {
                let ms: u64 = value.parse().map_err(|_| bad())?;
                if ms > 5000 { return Err(bad()); }
                self.move_overhead_ms = ms;
                Ok(false)
            }
            _ => Err(bad()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Position;
    use crate::search::{Limits, ThreadPool};
    use pretty_assertions::assert_eq;

    #[test]
    fn partial_json_keeps_defaults() {
        let o = EngineOptions::from_json_str(r#"{ "threads": 4, "search": { "lmr_scale": 21.5 } }"#).unwrap();
        assert_eq!(o.threads, 4);
        assert_eq!(o.hash_mb, EngineOptions::default().hash_mb);
        assert_eq!(o.search.lmr_scale, 21.5);
        assert_eq!(o.search.razor_base, SearchParams::default().razor_base);
    }

    #[test]
    fn setoption_validation() {
        let mut o = EngineOptions::default();
        assert!(o.set("Threads", "8").unwrap());
        assert_eq!(o.threads, 8);
        assert!(!o.set("MultiPV", "3").unwrap());
        assert!(o.set("Threads", "0").is_err());
        assert!(o.set("Bogus", "1").is_err());
    }

    #[test]
    fn zero_divisors_in_tuning_file_are_clamped() {
        let o = EngineOptions::from_json_str(r#"{ "search": { "asp_delta_div": 0, "nmp_eval_div": 0, "lmr_stat_div": -3855 } }"#)
            .unwrap();
        assert_eq!(o.search.asp_delta_div, 1);
        assert_eq!(o.search.nmp_eval_div, 1);
        assert_eq!(o.search.lmr_stat_div, 1);

        let pool = ThreadPool::silent(EngineOptions { hash_mb: 8, ..o }).unwrap();
        let out = pool.search(&Position::startpos(), Limits::depth(6)).unwrap();
        assert!(out.best_move.is_some());
        assert_eq!(out.depth, 6);
    }
}
