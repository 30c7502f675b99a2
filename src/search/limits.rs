use cozy_chess::{Color, Move};
use std::time::{Duration, Instant};

/// What the protocol asked for: clocks, hard caps and an optional restricted
/// set of root moves. Workers receive their own clone when a search starts
/// and never modify it.
#[derive(Clone, Debug)]
pub struct Limits {
    pub time: [Duration; 2],
    pub inc: [Duration; 2],
    pub movetime: Option<Duration>,
    pub movestogo: u32,
    pub depth: i32,
    pub mate: i32,
    pub perft: u32,
    pub infinite: bool,
    pub nodes: u64,
    pub start_time: Instant,
    pub searchmoves: Vec<Move>,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            time: [Duration::ZERO; 2],
            inc: [Duration::ZERO; 2],
            movetime: None,
            movestogo: 0,
            depth: 0,
            mate: 0,
            perft: 0,
            infinite: false,
            nodes: 0,
            start_time: Instant::now(),
            searchmoves: Vec::new(),
        }
    }
}

impl Limits {
    pub fn depth(depth: i32) -> Self { Self { depth, ..Self::default() } }
    pub fn nodes(nodes: u64) -> Self { Self { nodes, ..Self::default() } }
    pub fn movetime(d: Duration) -> Self { Self { movetime: Some(d), ..Self::default() } }
    pub fn infinite() -> Self { Self { infinite: true, ..Self::default() } }

    pub fn use_time_management(&self) -> bool {
        !self.time[Color::White as usize].is_zero() || !self.time[Color::Black as usize].is_zero()
    }

    pub fn time_for(&self, c: Color) -> Duration { self.time[c as usize] }
    pub fn inc_for(&self, c: Color) -> Duration { self.inc[c as usize] }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_detection() {
        let mut l = Limits::depth(5);
        assert!(!l.use_time_management());
        l.time[Color::Black as usize] = Duration::from_millis(1);
        assert!(l.use_time_management());
        assert!(!Limits::movetime(Duration::from_millis(50)).use_time_management());
    }
}
