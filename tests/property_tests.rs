//! Property-based tests over the core k-mer representation and the
//! end-to-end read-cdBG build, checking invariants that should hold across
//! all valid inputs rather than a fixed set of examples.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashSet;
use std::fs;
use std::io::Write;

use proptest::prelude::*;
use tempfile::{tempdir, NamedTempFile};

use cdbgr::builder::CdbgBuilder;
use cdbgr::config::Mode;
use cdbgr::kmer::Kmer;

fn dna_sequence(min_len: usize, max_len: usize) -> impl Strategy<Value = String> {
    proptest::collection::vec(prop_oneof![Just('A'), Just('C'), Just('G'), Just('T')], min_len..=max_len)
        .prop_map(|chars| chars.into_iter().collect())
}

fn odd_kmer_length(max: usize) -> impl Strategy<Value = usize> {
    (0..=(max / 2)).prop_map(|n| 2 * n + 1)
}

fn windows(sequence: &str, k: usize) -> Vec<Kmer> {
    if sequence.len() < k {
        return Vec::new();
    }
    (0..=sequence.len() - k).map(|start| Kmer::from_bytes(sequence.as_bytes(), start, k).unwrap()).collect()
}

proptest! {
    /// Canonicalization is idempotent: canonical(canonical(x)) == canonical(x).
    #[test]
    fn canonical_is_idempotent(seq in dna_sequence(1, 31)) {
        let kmer = Kmer::from_bytes(seq.as_bytes(), 0, seq.len()).unwrap();
        let (canon1, _) = kmer.canonical();
        let (canon2, _) = canon1.canonical();
        prop_assert_eq!(canon1.label(), canon2.label());
    }

    /// A k-mer and its reverse complement canonicalize to the same value.
    #[test]
    fn kmer_and_reverse_complement_share_a_canonical_form(seq in dna_sequence(1, 31)) {
        let kmer = Kmer::from_bytes(seq.as_bytes(), 0, seq.len()).unwrap();
        let rc = kmer.reverse_complement();
        let (canon, _) = kmer.canonical();
        let (rc_canon, _) = rc.canonical();
        prop_assert_eq!(canon.label(), rc_canon.label());
    }

    /// The canonical form is never lexicographically greater than either
    /// the k-mer itself or its reverse complement.
    #[test]
    fn canonical_is_lexicographically_minimal(seq in dna_sequence(1, 31)) {
        let kmer = Kmer::from_bytes(seq.as_bytes(), 0, seq.len()).unwrap();
        let rc = kmer.reverse_complement();
        let (canon, _) = kmer.canonical();
        prop_assert!(canon.label() <= kmer.label());
        prop_assert!(canon.label() <= rc.label());
    }

    /// Reverse-complementing twice is the identity.
    #[test]
    fn reverse_complement_is_an_involution(seq in dna_sequence(1, 31)) {
        let kmer = Kmer::from_bytes(seq.as_bytes(), 0, seq.len()).unwrap();
        let twice = kmer.reverse_complement().reverse_complement();
        prop_assert_eq!(kmer.label(), twice.label());
    }

    /// Rolling a k-mer forward by one base matches re-parsing the shifted
    /// window directly.
    #[test]
    fn roll_forward_matches_reslicing(seq in dna_sequence(2, 31), extra in prop_oneof![Just('A'), Just('C'), Just('G'), Just('T')]) {
        let k = seq.len() - 1;
        let mut rolling = Kmer::from_bytes(seq.as_bytes(), 0, k).unwrap();
        let mut rc = rolling.reverse_complement();
        let base = cdbgr::kmer::Base::from_ascii(extra as u8).unwrap();
        rolling.roll_forward(base, &mut rc);

        let mut shifted = seq[1..k].to_string();
        shifted.push(extra);
        let expected = Kmer::from_bytes(shifted.as_bytes(), 0, k).unwrap();
        prop_assert_eq!(rolling.label(), expected.label());
    }

    /// P1/P2: every window k-mer of a random acyclic linear sequence is
    /// covered by exactly one emitted unitig once the read-cdBG is built.
    #[test]
    fn read_mode_build_covers_every_input_kmer_exactly_once(
        seq in dna_sequence(8, 48),
        k in odd_kmer_length(7),
    ) {
        if seq.len() <= k {
            return Ok(());
        }

        let mut input = NamedTempFile::new().unwrap();
        writeln!(input, ">seq").unwrap();
        writeln!(input, "{seq}").unwrap();

        let dir = tempdir().unwrap();
        let output_path = dir.path().join("out.fa");

        let metadata = CdbgBuilder::new()
            .k(k)
            .unwrap()
            .mode(Mode::Read)
            .from_fasta(input.path().to_path_buf())
            .threads(2)
            .output(output_path.clone())
            .build()
            .unwrap();
        prop_assert!(metadata.contigs_info.unitig_count >= 1);

        let expected: HashSet<u128> =
            windows(&seq, k).into_iter().map(|kmer| kmer.canonical().0.packed()).collect();

        let contents = fs::read_to_string(&output_path).unwrap();
        let mut covered: Vec<u128> = Vec::new();
        for line in contents.lines().filter(|l| !l.starts_with('>')) {
            for kmer in windows(line, k) {
                covered.push(kmer.canonical().0.packed());
            }
        }

        let covered_set: HashSet<u128> = covered.iter().copied().collect();
        prop_assert_eq!(covered.len(), covered_set.len(), "a vertex k-mer was emitted more than once");
        prop_assert_eq!(covered_set, expected, "emitted unitigs do not cover exactly the input k-mer set");
    }
}
