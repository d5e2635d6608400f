//! Fuzz target for canonical k-mer computation.
//!
//! Checks that canonicalization is idempotent, that a k-mer and its
//! reverse complement canonicalize to the same value, and that the
//! canonical form is lexicographically no greater than either.

#![no_main]

use cdbgr::kmer::Kmer;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.is_empty() || data.len() > 32 {
        return;
    }
    for &byte in data {
        if !matches!(byte, b'A' | b'C' | b'G' | b'T') {
            return;
        }
    }

    let kmer = Kmer::from_bytes(data, 0, data.len()).unwrap();
    let (canon, _) = kmer.canonical();

    let reparsed = Kmer::from_bytes(canon.label().as_bytes(), 0, canon.label().len()).unwrap();
    let (canon2, _) = reparsed.canonical();
    assert_eq!(canon.label(), canon2.label(), "canonical is not idempotent");

    let rc = kmer.reverse_complement();
    let (rc_canon, _) = rc.canonical();
    assert_eq!(
        canon.label(),
        rc_canon.label(),
        "k-mer and its reverse complement canonicalize differently"
    );

    assert!(canon.label() <= kmer.label());
    assert!(canon.label() <= rc.label());
});
