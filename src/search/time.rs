use crate::search::limits::Limits;
use cozy_chess::Color;
use std::time::{Duration, Instant};

/// Soft (optimum) and hard (maximum) time budgets for one move, derived
/// from the clock state at search start.
#[derive(Clone, Debug)]
pub struct TimeManagement {
    start_time: Instant,
    optimum: Duration,
    maximum: Duration,
}

impl Default for TimeManagement {
    fn default() -> Self { Self { start_time: Instant::now(), optimum: Duration::ZERO, maximum: Duration::ZERO } }
}

impl TimeManagement {
    pub fn init(limits: &Limits, us: Color, game_ply: i32, move_overhead: Duration, ponder: bool) -> Self {
        let mut tm = Self { start_time: limits.start_time, ..Self::default() };
        if !limits.use_time_management() { return tm; }

        let time = limits.time_for(us).as_millis() as f64;
        let inc = limits.inc_for(us).as_millis() as f64;
        let overhead = move_overhead.as_millis() as f64;
        let mtg = if limits.movestogo > 0 { limits.movestogo.min(50) } else { 50 } as f64;
        let ply = game_ply as f64;

        let time_left = (time + inc * (mtg - 1.0) - overhead * (2.0 + mtg)).max(1.0);

        let (opt_scale, max_scale) = if limits.movestogo == 0 {
            ((0.0120 + (ply + 3.0).powf(0.45) * 0.0039).min(0.2 * time / time_left), (4.0 + ply / 12.0).min(7.0))
        } else {
            (((0.88 + ply / 116.4) / mtg).min(0.88 * time / time_left), (1.5 + 0.11 * mtg).min(6.3))
        };

        let mut optimum = opt_scale * time_left;
        let maximum = ((0.84 * time - overhead).min(max_scale * optimum) - 10.0).max(1.0);
        if ponder { optimum += optimum / 4.0; }

        tm.optimum = Duration::from_millis(optimum.max(1.0) as u64);
        tm.maximum = Duration::from_millis(maximum as u64);
        tm
    }

    pub fn optimum(&self) -> Duration { self.optimum }
    pub fn maximum(&self) -> Duration { self.maximum }
    pub fn elapsed(&self) -> Duration { self.start_time.elapsed() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budgets_are_ordered_and_within_clock() {
        let mut l = Limits::default();
        l.time = [Duration::from_secs(60), Duration::from_secs(60)];
        l.inc = [Duration::from_secs(1), Duration::from_secs(1)];
        let tm = TimeManagement::init(&l, Color::White, 20, Duration::from_millis(10), false);
        assert!(tm.optimum() > Duration::ZERO);
        assert!(tm.optimum() <= tm.maximum());
        assert!(tm.maximum() < Duration::from_secs(60));
    }

    #[test]
    fn movestogo_spends_more_per_move_when_few_moves_left() {
        let mut l = Limits::default();
        l.time = [Duration::from_secs(30), Duration::from_secs(30)];
        l.movestogo = 2;
        let few = TimeManagement::init(&l, Color::Black, 60, Duration::ZERO, false);
        l.movestogo = 40;
        let many = TimeManagement::init(&l, Color::Black, 60, Duration::ZERO, false);
        assert!(few.optimum() > many.optimum());
    }
}
