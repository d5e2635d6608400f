//! Reference-cdBG classifier (C7): walks reference sequences and classifies
//! each vertex by its in/out degree rather than by streaming an edge
//! database. Reduces to the exact same per-side `{E,A,C,G,T,N}` lattice as
//! [`crate::automaton`] — "single-in" is just "enter" never having seen a
//! second distinct base, "multi-out" is "exit" having seen two, or none.
//!
//! Reuses [`crate::automaton::Encoding`]/[`VertexState`] directly: a
//! single-in/single-out vertex is `(Unique(enter), Unique(exit))`,
//! multi-in/single-out is `(Multi, Unique(exit))`, and so on. Self-loops
//! (a k-mer immediately followed by itself in the reference) force both
//! sides to `Multi` in one update, the reference-graph analogue of C6's
//! crossing loop.

use crate::automaton::{apply_update, Encoding, Side, VertexState};
use crate::kmer::{Base, Kmer};
use crate::mphf::Mphf;
use crate::state_table::StateTable;

/// Observes one vertex occurrence: `directed_kmer` is the k-mer as it
/// literally appears in the reference (not necessarily canonical);
/// `left_base`/`right_base` are the reference bases immediately
/// surrounding it, or `None` at a run boundary.
pub fn observe(
    mph: &Mphf,
    table: &StateTable,
    directed_kmer: &Kmer,
    left_base: Option<Base>,
    right_base: Option<Base>,
) {
    let (canon, is_rc) = directed_kmer.canonical();
    let hash = mph
        .lookup(&canon)
        .expect("reference vertex missing from vertex MPH");

    if let Some(base) = right_base {
        let mut rolled = *directed_kmer;
        let mut rc = rolled.reverse_complement();
        rolled.roll_forward(base, &mut rc);
        if rolled.packed() == directed_kmer.packed() {
            apply_update(table, hash, |_| VertexState {
                front: Encoding::Multi,
                back: Encoding::Multi,
            });
            return;
        }
    }

    // Reverse complement flips which physical neighbor is "entering" vs
    // "exiting" in canonical orientation, and the observed base must be
    // complemented to describe the edge from the canonical vertex's side.
    let (enter_base, exit_base) = if is_rc {
        (right_base.map(Base::complement), left_base.map(Base::complement))
    } else {
        (left_base, right_base)
    };

    if let Some(base) = enter_base {
        apply_update(table, hash, |state| {
            state.with_side(Side::Front, state.at(Side::Front).transition(base))
        });
    }
    if let Some(base) = exit_base {
        apply_update(table, hash, |state| {
            state.with_side(Side::Back, state.at(Side::Back).transition(base))
        });
    }
}

/// Scans one reference sequence (an ASCII byte slice, case-insensitive)
/// for maximal contiguous runs of valid `{A,C,G,T}` bases of length `>= k`,
/// and observes every vertex in every such run. Placeholder bytes (`N` or
/// anything else outside the DNA alphabet) break a run, so the k-mers on
/// either side of one never treat each other as neighbors.
pub fn classify_sequence(mph: &Mphf, table: &StateTable, seq: &[u8], k: usize) {
    let mut run_start = 0usize;
    let mut i = 0usize;
    while i <= seq.len() {
        let valid = i < seq.len() && Base::from_ascii(seq[i]).is_some();
        if !valid {
            classify_run(mph, table, &seq[run_start..i], k);
            run_start = i + 1;
        }
        i += 1;
    }
}

fn classify_run(mph: &Mphf, table: &StateTable, run: &[u8], k: usize) {
    if run.len() < k {
        return;
    }
    let window_count = run.len() - k + 1;
    let mut kmer = Kmer::from_bytes(run, 0, k).expect("run pre-validated as all-ACGT");
    let mut rc = kmer.reverse_complement();
    for start in 0..window_count {
        let left_base = if start > 0 {
            Base::from_ascii(run[start - 1])
        } else {
            None
        };
        let right_base = if start + k < run.len() {
            Base::from_ascii(run[start + k])
        } else {
            None
        };
        observe(mph, table, &kmer, left_base, right_base);
        if start + 1 < window_count {
            let next_base = Base::from_ascii(run[start + k]).expect("already validated by the run scan");
            kmer.roll_forward(next_base, &mut rc);
        }
    }
}
