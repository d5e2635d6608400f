//! Minimal perfect hash over a canonical k-mer set (C4).
//!
//! A from-scratch cascade-of-filters construction (the BBHash/boomphf
//! family the spec names as acceptable): at each level, every not-yet-
//! placed key is hashed into an oversized bit array; a key claims its slot
//! only if no other not-yet-placed key collides there in this level's
//! pass. Claimed keys get a level-local rank (prefix popcount) offset by
//! the cumulative size of earlier levels, so `lookup` never needs to see
//! the training set again. Keys still colliding after the last level fall
//! back to an exact table — vanishingly rare once level sizing is tuned,
//! but the crate's correctness never depends on that being the case.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use rustc_hash::FxHashMap;

use crate::error::CdbgError;
use crate::kmer::Kmer;

/// Oversizing factor applied to each level's bit array relative to the
/// number of keys still unplaced entering that level. Larger values place
/// more keys per level (fewer levels, more memory); the spec's ~3-5
/// bits/key target is met around `gamma ≈ 1.5-2.5`.
const DEFAULT_GAMMA: f64 = 2.0;

/// Number of cascade levels attempted before giving up and falling back to
/// an exact map for whatever keys remain. Geometric shrinkage (each level
/// only needs to catch the fraction that collided) means this is reached
/// only under pathological hash behavior.
const MAX_LEVELS: usize = 24;

struct Level {
    occupied: Vec<u64>,
    rank_prefix: Vec<u32>,
    size: u64,
    seed: u64,
    offset: u64,
}

impl Level {
    fn rank_before(&self, pos: u64) -> u64 {
        let word_idx = (pos / 64) as usize;
        let bit_idx = pos % 64;
        let mask = if bit_idx == 0 {
            0
        } else {
            (1u64 << bit_idx) - 1
        };
        u64::from(self.rank_prefix[word_idx]) + (self.occupied[word_idx] & mask).count_ones() as u64
    }

    fn is_set(&self, pos: u64) -> bool {
        let word_idx = (pos / 64) as usize;
        let bit_idx = pos % 64;
        (self.occupied[word_idx] >> bit_idx) & 1 == 1
    }
}

/// A minimal perfect hash function over a fixed set of k-mers, injective
/// onto `[0, key_count)`.
pub struct Mphf {
    levels: Vec<Level>,
    fallback: FxHashMap<u128, u64>,
    fallback_offset: u64,
    key_count: u64,
}

fn bitmap_words(bits: u64) -> usize {
    ((bits + 63) / 64) as usize
}

fn hash_with_seed(key: u128, seed: u64) -> u64 {
    // splitmix64-style finalizer over the two 64-bit halves of the key,
    // mixed with the level seed; good-enough avalanche for hashing into a
    // bit array, not a cryptographic property.
    let mix = |mut x: u64| -> u64 {
        x ^= x >> 30;
        x = x.wrapping_mul(0xbf58_476d_1ce4_e5b9);
        x ^= x >> 27;
        x = x.wrapping_mul(0x94d0_49bb_1331_11eb);
        x ^= x >> 31;
        x
    };
    let hi = (key >> 64) as u64;
    let lo = key as u64;
    mix(hi.wrapping_add(seed))
        ^ mix(lo.wrapping_add(seed.wrapping_mul(0x9E37_79B9_7F4A_7C15)))
}

impl Mphf {
    /// Builds an MPHF from a streaming iterator over the training set. Two
    /// passes are made over whatever keys remain unplaced at each cascade
    /// level; `gamma` controls level oversizing (see [`DEFAULT_GAMMA`]).
    /// `n_threads` is accepted for interface symmetry with the spec but the
    /// reference cascade build here runs single-threaded; callers wanting
    /// parallel construction should pre-partition the input and merge, left
    /// as future work.
    pub fn build(iter: impl Iterator<Item = Kmer>, _n_threads: usize, gamma: f64) -> Self {
        let gamma = if gamma > 1.0 { gamma } else { DEFAULT_GAMMA };
        let mut remaining: Vec<u128> = iter.map(|k| k.packed()).collect();
        let key_count = remaining.len() as u64;
        let mut levels = Vec::new();
        let mut offset = 0u64;

        for level_idx in 0..MAX_LEVELS {
            if remaining.is_empty() {
                break;
            }
            let size = (((remaining.len() as f64) * gamma).ceil() as u64).max(1);
            let seed = 0x5bd1_e995u64.wrapping_add((level_idx as u64).wrapping_mul(0x9E37_79B9));

            let mut hit_once = vec![0u64; bitmap_words(size)];
            let mut hit_twice = vec![0u64; bitmap_words(size)];
            let positions: Vec<u64> = remaining
                .iter()
                .map(|&key| hash_with_seed(key, seed) % size)
                .collect();
            for &pos in &positions {
                let word = (pos / 64) as usize;
                let bit = pos % 64;
                if (hit_once[word] >> bit) & 1 == 1 {
                    hit_twice[word] |= 1 << bit;
                } else {
                    hit_once[word] |= 1 << bit;
                }
            }

            let mut occupied = vec![0u64; bitmap_words(size)];
            let mut placed = 0u64;
            let mut next_remaining = Vec::new();
            for (&key, &pos) in remaining.iter().zip(positions.iter()) {
                let word = (pos / 64) as usize;
                let bit = pos % 64;
                let collided = (hit_twice[word] >> bit) & 1 == 1;
                if collided {
                    next_remaining.push(key);
                } else {
                    occupied[word] |= 1 << bit;
                    placed += 1;
                }
            }

            let mut rank_prefix = vec![0u32; occupied.len() + 1];
            for (i, word) in occupied.iter().enumerate() {
                rank_prefix[i + 1] = rank_prefix[i] + word.count_ones();
            }
            rank_prefix.truncate(occupied.len());

            levels.push(Level {
                occupied,
                rank_prefix,
                size,
                seed,
                offset,
            });
            offset += placed;
            remaining = next_remaining;
        }

        let fallback_offset = offset;
        let fallback: FxHashMap<u128, u64> = remaining
            .into_iter()
            .enumerate()
            .map(|(i, key)| (key, fallback_offset + i as u64))
            .collect();

        Mphf {
            levels,
            fallback,
            fallback_offset,
            key_count,
        }
    }

    /// The size of the key set this MPHF was built over.
    pub fn key_count(&self) -> u64 {
        self.key_count
    }

    /// Looks up `kmer`'s hash, guaranteed to be unique and in
    /// `[0, key_count())` for any key in the training set. Looking up a key
    /// outside the training set returns an arbitrary in-range value (there
    /// is no way to detect this without storing the key set itself); the
    /// caller is responsible for the I1/I3 contract that only trained keys
    /// are ever queried.
    pub fn lookup(&self, kmer: &Kmer) -> Result<u64, CdbgError> {
        let key = kmer.packed();
        for level in &self.levels {
            let pos = hash_with_seed(key, level.seed) % level.size;
            if level.is_set(pos) {
                let hash = level.offset + level.rank_before(pos);
                return self.bounds_check(hash);
            }
        }
        match self.fallback.get(&key) {
            Some(&hash) => self.bounds_check(hash),
            None => Err(CdbgError::MphOutOfRange {
                hash: u64::MAX,
                vertex_count: self.key_count,
            }),
        }
    }

    fn bounds_check(&self, hash: u64) -> Result<u64, CdbgError> {
        if hash < self.key_count {
            Ok(hash)
        } else {
            Err(CdbgError::MphOutOfRange {
                hash,
                vertex_count: self.key_count,
            })
        }
    }

    /// Serializes the MPHF to `path`: level count, then per level
    /// (size, seed, offset, bitmap words), then the fallback table.
    pub fn save(&self, path: &Path) -> Result<(), CdbgError> {
        let file = File::create(path).map_err(|source| CdbgError::StateWrite {
            source,
            path: path.to_path_buf(),
        })?;
        let mut w = BufWriter::new(file);
        let write_u64 = |w: &mut BufWriter<File>, v: u64| w.write_all(&v.to_be_bytes());
        (|| -> std::io::Result<()> {
            write_u64(&mut w, self.key_count)?;
            write_u64(&mut w, self.levels.len() as u64)?;
            for level in &self.levels {
                write_u64(&mut w, level.size)?;
                write_u64(&mut w, level.seed)?;
                write_u64(&mut w, level.offset)?;
                write_u64(&mut w, level.occupied.len() as u64)?;
                for word in &level.occupied {
                    write_u64(&mut w, *word)?;
                }
            }
            write_u64(&mut w, self.fallback_offset)?;
            write_u64(&mut w, self.fallback.len() as u64)?;
            for (key, hash) in &self.fallback {
                w.write_all(&key.to_be_bytes())?;
                write_u64(&mut w, *hash)?;
            }
            Ok(())
        })()
        .map_err(|source| CdbgError::StateWrite {
            source,
            path: path.to_path_buf(),
        })
    }

    /// Deserializes an MPHF previously written by [`Self::save`].
    pub fn load(path: &Path) -> Result<Self, CdbgError> {
        let file = File::open(path).map_err(|source| CdbgError::StateRead {
            source,
            path: path.to_path_buf(),
        })?;
        let mut r = BufReader::new(file);
        let read_u64 = |r: &mut BufReader<File>| -> std::io::Result<u64> {
            let mut buf = [0u8; 8];
            r.read_exact(&mut buf)?;
            Ok(u64::from_be_bytes(buf))
        };
        (|| -> std::io::Result<Mphf> {
            let key_count = read_u64(&mut r)?;
            let level_count = read_u64(&mut r)? as usize;
            let mut levels = Vec::with_capacity(level_count);
            for _ in 0..level_count {
                let size = read_u64(&mut r)?;
                let seed = read_u64(&mut r)?;
                let offset = read_u64(&mut r)?;
                let word_count = read_u64(&mut r)? as usize;
                let mut occupied = Vec::with_capacity(word_count);
                for _ in 0..word_count {
                    occupied.push(read_u64(&mut r)?);
                }
                let mut rank_prefix = vec![0u32; word_count];
                for (i, word) in occupied.iter().enumerate().take(word_count.saturating_sub(1)) {
                    rank_prefix[i + 1] = rank_prefix[i] + word.count_ones();
                }
                levels.push(Level {
                    occupied,
                    rank_prefix,
                    size,
                    seed,
                    offset,
                });
            }
            let fallback_offset = read_u64(&mut r)?;
            let fallback_len = read_u64(&mut r)? as usize;
            let mut fallback = FxHashMap::with_capacity_and_hasher(fallback_len, Default::default());
            for _ in 0..fallback_len {
                let mut key_buf = [0u8; 16];
                r.read_exact(&mut key_buf)?;
                let key = u128::from_be_bytes(key_buf);
                let hash = read_u64(&mut r)?;
                fallback.insert(key, hash);
            }
            Ok(Mphf {
                levels,
                fallback,
                fallback_offset,
                key_count,
            })
        })()
        .map_err(|source| CdbgError::StateRead {
            source,
            path: path.to_path_buf(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kmer(seq: &str) -> Kmer {
        Kmer::from_bytes(seq.as_bytes(), 0, seq.len()).unwrap()
    }

    #[test]
    fn lookup_is_injective_on_training_set() {
        let keys: Vec<Kmer> = ["AAA", "AAC", "AAG", "AAT", "ACA", "ACC", "ACG", "ACT", "AGA", "AGC"]
            .iter()
            .map(|s| kmer(s))
            .collect();
        let mphf = Mphf::build(keys.iter().copied(), 1, 2.0);
        let mut hashes: Vec<u64> = keys.iter().map(|k| mphf.lookup(k).unwrap()).collect();
        hashes.sort_unstable();
        hashes.dedup();
        assert_eq!(hashes.len(), keys.len());
        assert!(hashes.iter().all(|&h| h < keys.len() as u64));
    }

    #[test]
    fn save_and_load_preserve_lookups() {
        let keys: Vec<Kmer> = ["AAA", "AAC", "AAG", "AAT", "ACA"].iter().map(|s| kmer(s)).collect();
        let mphf = Mphf::build(keys.iter().copied(), 1, 2.0);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mphf.bin");
        mphf.save(&path).unwrap();
        let loaded = Mphf::load(&path).unwrap();
        for key in &keys {
            assert_eq!(mphf.lookup(key).unwrap(), loaded.lookup(key).unwrap());
        }
    }

    #[test]
    fn handles_larger_key_set_across_multiple_levels() {
        // All 4^7 = 16384 distinct 7-mers: large enough to force several
        // cascade levels at gamma = 1.5, and guaranteed duplicate-free.
        let keys: Vec<Kmer> = (0u32..4u32.pow(7))
            .map(|i| {
                let bytes: Vec<u8> = (0..7).map(|shift| b"ACGT"[((i >> (2 * shift)) & 3) as usize]).collect();
                Kmer::from_bytes(&bytes, 0, 7).unwrap()
            })
            .collect();
        let mphf = Mphf::build(keys.iter().copied(), 1, 1.5);
        let mut seen = vec![false; keys.len()];
        for key in &keys {
            let h = mphf.lookup(key).unwrap() as usize;
            assert!(!seen[h], "collision at {h}");
            seen[h] = true;
        }
    }
}
