//! GraniteChess - Transposition Table Module
//!
//! Fixed-capacity cache of search results keyed by position hash. The
//! slot count is a power of two so indexing is a mask; every store
//! overwrites its slot unconditionally, and probes verify the full key so
//! an index collision reads as a miss, never as another position's data.

use crate::board::Move;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Bound {
    /// True value <= score: no move exceeded alpha
    Upper,
    /// True value >= score: a beta cutoff occurred
    Lower,
    /// Score is the exact minimax value
    Exact,
}

#[derive(Clone, Copy)]
pub struct TtEntry {
    pub key: u64,
    pub mv: Move,
    pub depth: i32,
    pub score: i32,
    pub bound: Bound,
}

impl TtEntry {
    /// Miss sentinel; the depth is low enough that it never satisfies a
    /// probe-usability check.
    pub const EMPTY: TtEntry = TtEntry {
        key: 0,
        mv: Move::NULL,
        depth: i32::MIN,
        score: 0,
        bound: Bound::Upper,
    };
}

pub struct TranspositionTable {
    entries: Vec<TtEntry>,
    mask: u64,
    pub hits: u64,
    pub stores: u64,
}

impl TranspositionTable {
    pub fn new(size_mb: usize) -> Self {
        let bytes = size_mb * 1024 * 1024;
        let mut count = 1usize;
        while count * 2 * std::mem::size_of::<TtEntry>() <= bytes {
            count *= 2;
        }
        TranspositionTable {
            entries: vec![TtEntry::EMPTY; count],
            mask: (count - 1) as u64,
            hits: 0,
            stores: 0,
        }
    }

    /// Look up the entry for a key. Returns the empty sentinel when the
    /// slot holds a different position.
    pub fn probe(&mut self, key: u64) -> TtEntry {
        let entry = self.entries[(key & self.mask) as usize];
        if entry.key == key {
            self.hits += 1;
            entry
        } else {
            TtEntry::EMPTY
        }
    }

    /// Write an entry, unconditionally replacing the slot's occupant. A
    /// null best move keeps the move already cached for the same key, so a
    /// known-good move is never erased by a store that found none.
    pub fn store(&mut self, key: u64, mv: Move, depth: i32, score: i32, bound: Bound) {
        let idx = (key & self.mask) as usize;
        let prev = self.entries[idx];
        let mv = if mv.is_null() && prev.key == key {
            prev.mv
        } else {
            mv
        };
        self.entries[idx] = TtEntry {
            key,
            mv,
            depth,
            score,
            bound,
        };
        self.stores += 1;
    }

    pub fn clear(&mut self) {
        self.entries.fill(TtEntry::EMPTY);
        self.hits = 0;
        self.stores = 0;
    }

    /// Approximate table saturation in permille
    pub fn hashfull(&self) -> usize {
        ((self.stores as usize * 1000) / self.entries.len()).min(1000)
    }
}
