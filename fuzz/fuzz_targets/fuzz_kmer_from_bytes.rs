//! Fuzz target for `Kmer::from_bytes`.
//!
//! Arbitrary byte input should either be accepted as a valid k-mer or
//! rejected with a position inside the input — never panic.

#![no_main]

use cdbgr::kmer::Kmer;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.is_empty() || data.len() > 32 {
        return;
    }

    match Kmer::from_bytes(data, 0, data.len()) {
        Ok(kmer) => {
            assert_eq!(kmer.label().len(), data.len());
            for byte in kmer.label().bytes() {
                assert!(matches!(byte, b'A' | b'C' | b'G' | b'T'));
            }
        }
        Err(position) => {
            assert!(position < data.len());
        }
    }
});
