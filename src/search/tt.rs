use crate::search::value::{Depth, Value, DEPTH_OFFSET};
use cozy_chess::{Move, Piece, Square};
use rayon::prelude::*;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bound {
    None = 0,
    Upper = 1,
    Lower = 2,
    Exact = 3,
}

impl Bound {
    fn from_bits(b: u8) -> Self {
        match b & 3 {
            1 => Bound::Upper,
            2 => Bound::Lower,
            3 => Bound::Exact,
            _ => Bound::None,
        }
    }

    /// Whether a stored value with this bound can be trusted relative to
    /// `beta`: lower bounds above it, upper bounds below it.
    #[inline]
    pub fn includes(self, value_ge_beta: bool) -> bool {
        let side = if value_ge_beta { Bound::Lower } else { Bound::Upper };
        (self as u8) & (side as u8) != 0
    }
}

/// Decoded view of a table slot.
#[derive(Clone, Copy, Debug)]
pub struct Entry {
    pub mv: Option<Move>,
    pub value: Value,
    pub eval: Value,
    pub depth: Depth,
    pub bound: Bound,
    pub is_pv: bool,
}

const WAYS: usize = 4;
const GENERATION_BITS: u32 = 3;
const GENERATION_DELTA: u8 = 1 << GENERATION_BITS;
const GENERATION_CYCLE: u16 = 255 + GENERATION_DELTA as u16;
const GENERATION_MASK: u16 = (0xFF << GENERATION_BITS) & 0xFF;

// Data layout (low to high): move 16 | value 16 | eval 16 | depth 8 | gen+pv+bound 8
#[derive(Clone, Copy)]
struct Packed(u64);

impl Packed {
    fn new(mv: Option<Move>, value: Value, eval: Value, depth8: u8, gen_bound8: u8) -> Self {
        Packed(
            encode_move(mv) as u64
                | ((value as i16 as u16 as u64) << 16)
                | ((eval as i16 as u16 as u64) << 32)
                | ((depth8 as u64) << 48)
                | ((gen_bound8 as u64) << 56),
        )
    }
    fn move16(self) -> u16 { self.0 as u16 }
    fn value(self) -> Value { (self.0 >> 16) as u16 as i16 as Value }
    fn eval(self) -> Value { (self.0 >> 32) as u16 as i16 as Value }
    fn depth8(self) -> u8 { (self.0 >> 48) as u8 }
    fn gen_bound8(self) -> u8 { (self.0 >> 56) as u8 }

    fn relative_age(self, generation8: u8) -> i32 {
        ((GENERATION_CYCLE + generation8 as u16 - self.gen_bound8() as u16) & GENERATION_MASK) as i32
    }

    fn entry(self) -> Entry {
        Entry {
            mv: decode_move(self.move16()),
            value: self.value(),
            eval: self.eval(),
            depth: self.depth8() as Depth + DEPTH_OFFSET,
            bound: Bound::from_bits(self.gen_bound8()),
            is_pv: self.gen_bound8() & 0x4 != 0,
        }
    }
}

fn encode_move(mv: Option<Move>) -> u16 {
    let Some(m) = mv else { return 0 };
    let promo = match m.promotion {
        Some(Piece::Knight) => 1,
        Some(Piece::Bishop) => 2,
        Some(Piece::Rook) => 3,
        Some(Piece::Queen) => 4,
        _ => 0,
    };
    m.from as u16 | (m.to as u16) << 6 | promo << 12
}

fn decode_move(bits: u16) -> Option<Move> {
    if bits == 0 { return None; }
    let promotion = match bits >> 12 {
        1 => Some(Piece::Knight),
        2 => Some(Piece::Bishop),
        3 => Some(Piece::Rook),
        4 => Some(Piece::Queen),
        _ => None,
    };
    Some(Move { from: Square::index((bits & 63) as usize), to: Square::index(((bits >> 6) & 63) as usize), promotion })
}

// A slot stores `key ^ data` next to `data`, so a torn write from another
// thread fails the key check and reads as a miss.
#[derive(Default)]
struct Slot {
    check: AtomicU64,
    data: AtomicU64,
}

impl Slot {
    fn load(&self) -> (u64, Packed) {
        let data = self.data.load(Ordering::Relaxed);
        let check = self.check.load(Ordering::Relaxed);
        (check ^ data, Packed(data))
    }

    fn write(&self, key: u64, p: Packed) {
        self.check.store(key ^ p.0, Ordering::Relaxed);
        self.data.store(p.0, Ordering::Relaxed);
    }

    fn clear(&self) {
        self.check.store(0, Ordering::Relaxed);
        self.data.store(0, Ordering::Relaxed);
    }
}

#[derive(Default)]
struct Bucket {
    slots: [Slot; WAYS],
}

/// Shared, lock-free transposition table. Every search thread probes and
/// stores concurrently; races are tolerated and never corrupt a read.
pub struct TranspositionTable {
    buckets: Vec<Bucket>,
    generation8: AtomicU8,
}

impl TranspositionTable {
    pub fn new(mb: usize) -> Self {
        let mut tt = Self { buckets: Vec::new(), generation8: AtomicU8::new(0) };
        tt.resize(mb);
        tt
    }

    pub fn resize(&mut self, mb: usize) {
        let bytes = mb.max(1).saturating_mul(1024 * 1024);
        let count = (bytes / std::mem::size_of::<Bucket>()).max(1);
        self.buckets = Vec::new();
        self.buckets.resize_with(count, Bucket::default);
        self.generation8.store(0, Ordering::Relaxed);
    }

    pub fn capacity(&self) -> usize { self.buckets.len() * WAYS }

    pub fn clear(&self) {
        self.buckets.par_iter().for_each(|b| b.slots.iter().for_each(Slot::clear));
        self.generation8.store(0, Ordering::Relaxed);
    }

    /// Ages all entries. Called once at the start of each search.
    pub fn new_search(&self) {
        self.generation8.fetch_add(GENERATION_DELTA, Ordering::Relaxed);
    }

    pub fn generation(&self) -> u8 { self.generation8.load(Ordering::Relaxed) }

    fn bucket(&self, key: u64) -> &Bucket {
        let idx = ((key as u128 * self.buckets.len() as u128) >> 64) as usize;
        &self.buckets[idx]
    }

    pub fn probe(&self, key: u64) -> Option<Entry> {
        let gen = self.generation();
        for slot in &self.bucket(key).slots {
            let (k, p) = slot.load();
            if k == key && p.depth8() != 0 {
                if p.gen_bound8() & !(GENERATION_DELTA - 1) != gen {
                    // Refresh the age so a hit survives replacement
                    let refreshed = Packed::new(decode_move(p.move16()), p.value(), p.eval(), p.depth8(), gen | (p.gen_bound8() & (GENERATION_DELTA - 1)));
                    slot.write(key, refreshed);
                }
                return Some(p.entry());
            }
        }
        None
    }

    #[allow(clippy::too_many_arguments)]
    pub fn store(&self, key: u64, value: Value, is_pv: bool, bound: Bound, depth: Depth, mv: Option<Move>, eval: Value) {
        let gen = self.generation();
        let bucket = self.bucket(key);

        let mut target = &bucket.slots[0];
        let mut target_data = None;
        let mut worst = i32::MAX;
        for slot in &bucket.slots {
            let (k, p) = slot.load();
            if k == key || p.depth8() == 0 {
                target = slot;
                target_data = (k == key).then_some(p);
                break;
            }
            let score = p.depth8() as i32 - 2 * p.relative_age(gen);
            if score < worst {
                worst = score;
                target = slot;
            }
        }

        let depth8 = (depth - DEPTH_OFFSET).clamp(1, u8::MAX as i32) as u8;
        let mut mv = mv;
        if let Some(old) = target_data {
            // Keep the old move when we have none to offer
            if mv.is_none() { mv = decode_move(old.move16()); }
            let overwrite = bound == Bound::Exact
                || (depth8 as i32 + 2 * is_pv as i32) > old.depth8() as i32 - 4
                || old.relative_age(gen) != 0;
            if !overwrite { return; }
        }
        let gb = gen | ((is_pv as u8) << 2) | bound as u8;
        target.write(key, Packed::new(mv, value, eval, depth8, gb));
    }

    /// Permille of sampled entries written during the current search.
    pub fn hashfull(&self) -> usize {
        let gen = self.generation();
        let sample = self.buckets.len().min(1000);
        if sample == 0 { return 0; }
        let used: usize = self.buckets[..sample]
            .iter()
            .map(|b| {
                b.slots
                    .iter()
                    .filter(|s| {
                        let (_, p) = s.load();
                        p.depth8() != 0 && p.gen_bound8() & !(GENERATION_DELTA - 1) == gen
                    })
                    .count()
            })
            .sum();
        used * 1000 / (sample * WAYS)
    }

    /// Number of occupied slots, any generation.
    pub fn len(&self) -> usize {
        self.buckets.par_iter().map(|b| b.slots.iter().filter(|s| s.load().1.depth8() != 0).count()).sum()
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn packed_fields_survive() {
        let mv = Move::from_str("e7e8q").ok();
        let p = Packed::new(mv, -1234, 567, 20, 0x8 | 0x4 | Bound::Lower as u8);
        let e = p.entry();
        assert_eq!(e.mv, mv);
        assert_eq!((e.value, e.eval, e.depth), (-1234, 567, 20 + DEPTH_OFFSET));
        assert_eq!(e.bound, Bound::Lower);
        assert!(e.is_pv);
    }

    #[test]
    fn torn_slot_reads_as_miss() {
        let tt = TranspositionTable::new(1);
        tt.store(42, 10, false, Bound::Exact, 5, None, 0);
        assert!(tt.probe(42).is_some());
        // Simulate a concurrent writer replacing only the data word
        let slot = &tt.bucket(42).slots[0];
        slot.data.store(Packed::new(None, 99, 0, 9, 3).0, Ordering::Relaxed);
        assert!(tt.probe(42).is_none());
    }

    #[test]
    fn bound_includes() {
        assert!(Bound::Lower.includes(true) && !Bound::Lower.includes(false));
        assert!(Bound::Exact.includes(true) && Bound::Exact.includes(false));
        assert!(Bound::Upper.includes(false) && !Bound::Upper.includes(true));
    }
}
