//! Bit-packed, sparse-locked vertex state table (C5).
//!
//! Each vertex's state is a small, fixed-width cell (see
//! [`AUTOMATON_CELL_BITS`]) in a dense `u64`-backed bit vector. A
//! `SparseLock` collection of spin-locks guards fixed-size shards of that
//! vector so many worker threads can update disjoint vertices with very
//! little lock contention, while still protecting the two-adjacent-word
//! read-modify-write every cell update requires.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Cell width shared by both vertex automata: two independent 3-bit
/// `{E,A,C,G,T,N}` side encodings packed side by side (front/enter in the
/// high 3 bits, back/exit in the low 3), matching the edge-encoding
/// alphabet of C6/C7 exactly. See [`crate::automaton`] and
/// [`crate::ref_classifier`].
pub const AUTOMATON_CELL_BITS: u32 = 6;

/// A striped collection of spin-locks covering a contiguous index range.
/// Lock `i` guards indices `[i*range_per_lock, (i+1)*range_per_lock)`.
/// `range_per_lock` is always a power of two so the owning lock for an
/// index is a shift, not a division.
pub struct SparseLock {
    locks: Vec<AtomicBool>,
    shift: u32,
}

impl SparseLock {
    /// Builds a sparse-lock collection sized so that roughly `target_locks`
    /// locks cover `entry_count` entries: `range_per_lock =
    /// 2^floor(log2(ceil(entry_count/target_locks)))`.
    pub fn new(entry_count: u64, target_locks: u64) -> Self {
        let target_locks = target_locks.max(1);
        let ideal_range = entry_count.div_ceil(target_locks).max(1);
        let shift = 63 - ideal_range.leading_zeros();
        let range_per_lock = 1u64 << shift;
        let num_locks = entry_count.div_ceil(range_per_lock).max(1) as usize;
        SparseLock {
            locks: (0..num_locks).map(|_| AtomicBool::new(false)).collect(),
            shift,
        }
    }

    fn lock_index(&self, idx: u64) -> usize {
        (idx >> self.shift) as usize
    }

    /// Acquires the lock guarding `idx`, spinning until successful.
    pub fn lock(&self, idx: u64) {
        let lock_idx = self.lock_index(idx);
        while self.locks[lock_idx]
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            std::hint::spin_loop();
        }
    }

    /// Releases the lock guarding `idx`.
    pub fn unlock(&self, idx: u64) {
        self.locks[self.lock_index(idx)].store(false, Ordering::Release);
    }

    /// Acquires the lock for `idx` only if it differs from the lock
    /// currently held for `prev_idx` (or if `prev_idx` is `None`). Avoids
    /// redundant re-locking when a walk visits consecutive indices that
    /// commonly share a shard.
    pub fn lock_if_different(&self, idx: u64, prev_idx: Option<u64>) {
        if prev_idx.map(|p| self.lock_index(p)) != Some(self.lock_index(idx)) {
            self.lock(idx);
        }
    }

    /// Releases the lock for `prev_idx` only if `idx` maps to a different
    /// shard (the mirror image of [`Self::lock_if_different`]).
    pub fn unlock_if_different(&self, prev_idx: u64, idx: Option<u64>) {
        if idx.map(|i| self.lock_index(i)) != Some(self.lock_index(prev_idx)) {
            self.unlock(prev_idx);
        }
    }
}

/// Default number of lock stripes when the caller doesn't have a reason to
/// pick a different value.
pub const DEFAULT_LOCK_COUNT: u64 = 65_536;

/// Dense, bit-packed array of fixed-width vertex-state cells, guarded by a
/// [`SparseLock`] collection.
pub struct StateTable {
    words: Mutex<Vec<u64>>,
    locks: SparseLock,
    len: u64,
    cell_bits: u32,
    cell_mask: u64,
}

impl StateTable {
    /// Allocates a table of `len` cells of `cell_bits` width each, all
    /// initialized to `0` (the caller's "empty/unvisited" encoding —
    /// `(E,E)` for the read-cdBG automaton per I2, `unseen` for ref-cdBG).
    pub fn new(len: u64, cell_bits: u32) -> Self {
        debug_assert!((1..=8).contains(&cell_bits), "cell width must fit a byte");
        let total_bits = len * u64::from(cell_bits);
        let word_count = (total_bits as usize).div_ceil(64).max(1);
        StateTable {
            words: Mutex::new(vec![0u64; word_count]),
            locks: SparseLock::new(len.max(1), DEFAULT_LOCK_COUNT),
            len,
            cell_bits,
            cell_mask: (1u64 << cell_bits) - 1,
        }
    }

    /// Number of cells in the table.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Width, in bits, of each cell.
    pub fn cell_bits(&self) -> u32 {
        self.cell_bits
    }

    fn bit_offset(&self, idx: u64) -> (usize, u32) {
        let bit = idx * u64::from(self.cell_bits);
        ((bit / 64) as usize, (bit % 64) as u32)
    }

    fn read_locked(&self, idx: u64, words: &[u64]) -> u8 {
        let (word_idx, bit_idx) = self.bit_offset(idx);
        let lo = words[word_idx] >> bit_idx;
        if bit_idx + self.cell_bits <= 64 {
            (lo & self.cell_mask) as u8
        } else {
            let hi_bits = bit_idx + self.cell_bits - 64;
            let hi = words[word_idx + 1] << (self.cell_bits - hi_bits);
            ((lo | hi) & self.cell_mask) as u8
        }
    }

    fn write_locked(&self, idx: u64, value: u8, words: &mut [u64]) {
        let (word_idx, bit_idx) = self.bit_offset(idx);
        let value = u64::from(value) & self.cell_mask;
        words[word_idx] &= !(self.cell_mask << bit_idx);
        words[word_idx] |= value << bit_idx;
        if bit_idx + self.cell_bits > 64 {
            let hi_bits = bit_idx + self.cell_bits - 64;
            let hi_mask = (1u64 << hi_bits) - 1;
            words[word_idx + 1] &= !hi_mask;
            words[word_idx + 1] |= value >> (self.cell_bits - hi_bits);
        }
    }

    /// Reads the cell at `idx` under its shard lock.
    pub fn read(&self, idx: u64) -> u8 {
        debug_assert!(idx < self.len);
        self.locks.lock(idx);
        let words = self.words.lock().expect("state table mutex poisoned");
        let value = self.read_locked(idx, &words);
        drop(words);
        self.locks.unlock(idx);
        value
    }

    /// Optimistic-CAS update: if the cell currently holds `expected`, it is
    /// replaced with `new_state` and `true` is returned; otherwise the
    /// cell is left untouched and `false` is returned so the caller can
    /// re-read and recompute the target state (safe by the automaton's
    /// monotonic, commutative transitions — see I3/I4).
    pub fn update(&self, idx: u64, expected: u8, new_state: u8) -> bool {
        debug_assert!(idx < self.len);
        self.locks.lock(idx);
        let mut words = self.words.lock().expect("state table mutex poisoned");
        let current = self.read_locked(idx, &words);
        let success = current == expected;
        if success {
            self.write_locked(idx, new_state, &mut words);
        }
        drop(words);
        self.locks.unlock(idx);
        success
    }

    /// Serializes the table as `len` (8 bytes), `cell_bits` (1 byte), then
    /// the raw word array (big-endian `u64`s).
    pub fn to_bytes(&self) -> Vec<u8> {
        let words = self.words.lock().expect("state table mutex poisoned");
        let mut out = Vec::with_capacity(9 + words.len() * 8);
        out.extend_from_slice(&self.len.to_be_bytes());
        out.push(self.cell_bits as u8);
        for word in words.iter() {
            out.extend_from_slice(&word.to_be_bytes());
        }
        out
    }

    /// Reconstructs a table from bytes produced by [`Self::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 9 {
            return None;
        }
        let len = u64::from_be_bytes(bytes[0..8].try_into().ok()?);
        let cell_bits = u32::from(bytes[8]);
        let word_bytes = &bytes[9..];
        if word_bytes.len() % 8 != 0 {
            return None;
        }
        let words: Vec<u64> = word_bytes
            .chunks_exact(8)
            .map(|chunk| u64::from_be_bytes(chunk.try_into().expect("8-byte chunk")))
            .collect();
        Some(StateTable {
            words: Mutex::new(words),
            locks: SparseLock::new(len.max(1), DEFAULT_LOCK_COUNT),
            len,
            cell_bits,
            cell_mask: (1u64 << cell_bits) - 1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_table_is_all_zero() {
        let table = StateTable::new(100, AUTOMATON_CELL_BITS);
        for i in 0..100 {
            assert_eq!(table.read(i), 0);
        }
    }

    #[test]
    fn update_succeeds_with_matching_expected_and_fails_otherwise() {
        let table = StateTable::new(10, AUTOMATON_CELL_BITS);
        assert!(table.update(3, 0, 17));
        assert_eq!(table.read(3), 17);
        assert!(!table.update(3, 0, 5));
        assert_eq!(table.read(3), 17);
        assert!(table.update(3, 17, 5));
        assert_eq!(table.read(3), 5);
    }

    #[test]
    fn cells_crossing_word_boundary_round_trip() {
        let table = StateTable::new(1000, AUTOMATON_CELL_BITS);
        for i in 0..1000u64 {
            let value = (i % 64) as u8;
            assert!(table.update(i, 0, value));
        }
        for i in 0..1000u64 {
            assert_eq!(table.read(i), (i % 64) as u8);
        }
    }

    #[test]
    fn serialization_round_trips() {
        let table = StateTable::new(50, AUTOMATON_CELL_BITS);
        for i in 0..50u64 {
            table.update(i, 0, (i % 31) as u8 + 1);
        }
        let bytes = table.to_bytes();
        let restored = StateTable::from_bytes(&bytes).unwrap();
        assert_eq!(restored.len(), 50);
        for i in 0..50u64 {
            assert_eq!(restored.read(i), table.read(i));
        }
    }

    #[test]
    fn sparse_lock_range_formula() {
        let locks = SparseLock::new(1_000_000, 65_536);
        // range_per_lock should be the largest power of two not exceeding
        // ceil(1_000_000 / 65_536) = 16.
        assert_eq!(locks.lock_index(0), 0);
        assert_eq!(locks.lock_index(15), 0);
        assert_eq!(locks.lock_index(16), 1);
    }

    #[test]
    fn concurrent_updates_from_many_threads_are_serialized() {
        use std::sync::Arc;
        use std::thread;

        let table = Arc::new(StateTable::new(8, AUTOMATON_CELL_BITS));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let table = Arc::clone(&table);
            handles.push(thread::spawn(move || loop {
                let current = table.read(0);
                if current >= 20 {
                    break;
                }
                table.update(0, current, current + 1);
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(table.read(0), 20);
    }
}
