//! Read-cdBG automaton (C6): streams edges from the edge database and
//! updates each endpoint's `(front, back)` edge-encoding pair in the
//! [`StateTable`] it shares with the unitig extractor.
//!
//! Each side's cell holds one of six `Extended_Base` symbols — `E` (empty),
//! `A`/`C`/`G`/`T` (a single observed edge, tagged by outgoing base), or `N`
//! (two or more distinct edges, discarded). The combined cell packs front
//! (high 3 bits) and back (low 3 bits) into a byte, matching
//! [`crate::state_table::AUTOMATON_CELL_BITS`]. The outputted marker (I6)
//! used by [`crate::extractor`] to claim a vertex is a dedicated per-side
//! code (6) that no automaton transition ever produces, kept deliberately
//! distinct from genuine `(N, N)` (5, 5) — an ordinary vertex that branches
//! on both sides reaches `(N, N)` through normal edge updates and must
//! still be emitted as its own length-k unitig.

use crate::kmer::{Base, Kmer};
use crate::mphf::Mphf;
use crate::state_table::StateTable;

const SIDE_BITS: u32 = 3;
const SIDE_MASK: u8 = 0b111;

const CODE_E: u8 = 0;
const CODE_N: u8 = 5;

/// Per-side code reserved for the outputted claim marker. `Encoding`'s
/// transition table only ever produces codes 0 (`E`) through 5 (`N`), so
/// this code can never arise from an edge update and is safe for
/// [`crate::extractor`] to CAS in as a sentinel.
const CODE_OUTPUTTED: u8 = 6;

/// The full-cell value [`crate::extractor`] CASes in to mark a vertex as
/// already emitted. Packs to `0b110_110`, distinct from genuine `(N, N)`
/// (`0b101_101`), so an ordinary vertex with two distinct edges on each
/// side is never mistaken for one another worker already claimed.
pub(crate) const OUTPUTTED_CELL: u8 = (CODE_OUTPUTTED << SIDE_BITS) | CODE_OUTPUTTED;

/// `true` if `cell` is the raw [`OUTPUTTED_CELL`] sentinel. Must be checked
/// before decoding a raw cell through [`VertexState::from_cell`], since
/// `CODE_OUTPUTTED` has no corresponding `Encoding` variant.
pub(crate) fn is_outputted_cell(cell: u8) -> bool {
    cell == OUTPUTTED_CELL
}

/// One `Extended_Base` value: the edge-encoding alphabet for a single side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Empty,
    Unique(Base),
    Multi,
}

impl Encoding {
    fn to_code(self) -> u8 {
        match self {
            Encoding::Empty => CODE_E,
            Encoding::Unique(base) => base.code() + 1,
            Encoding::Multi => CODE_N,
        }
    }

    fn from_code(code: u8) -> Self {
        match code {
            CODE_E => Encoding::Empty,
            CODE_N => Encoding::Multi,
            base_code @ 1..=4 => Encoding::Unique(Base::from_code(base_code - 1)),
            other => unreachable!("invalid edge-encoding code {other}"),
        }
    }

    /// Is this side a flank (no unique outward edge to walk through)?
    pub fn is_flank(self) -> bool {
        matches!(self, Encoding::Empty | Encoding::Multi)
    }

    /// Applies the single-side transition table from a newly observed
    /// `base`: `E -> base`, `base -> base` (no-op), `y -> N` if `y != base`,
    /// `N -> N` (no-op). Shared verbatim by [`crate::ref_classifier`], whose
    /// vertex-class table reduces to this same per-side lattice.
    pub(crate) fn transition(self, base: Base) -> Encoding {
        match self {
            Encoding::Empty => Encoding::Unique(base),
            Encoding::Unique(existing) if existing == base => Encoding::Unique(existing),
            Encoding::Unique(_) => Encoding::Multi,
            Encoding::Multi => Encoding::Multi,
        }
    }
}

/// Which side of a vertex an edge is incident to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Front,
    Back,
}

/// The decoded `(front, back)` pair for one vertex cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexState {
    pub front: Encoding,
    pub back: Encoding,
}

impl VertexState {
    pub(crate) fn from_cell(cell: u8) -> Self {
        VertexState {
            front: Encoding::from_code((cell >> SIDE_BITS) & SIDE_MASK),
            back: Encoding::from_code(cell & SIDE_MASK),
        }
    }

    pub(crate) fn to_cell(self) -> u8 {
        (self.front.to_code() << SIDE_BITS) | self.back.to_code()
    }

    pub(crate) fn at(self, side: Side) -> Encoding {
        match side {
            Side::Front => self.front,
            Side::Back => self.back,
        }
    }

    pub(crate) fn with_side(self, side: Side, encoding: Encoding) -> Self {
        match side {
            Side::Front => VertexState { front: encoding, ..self },
            Side::Back => VertexState { back: encoding, ..self },
        }
    }
}

/// Applies a single `(k+1)`-mer edge to the shared [`StateTable`], retrying
/// on optimistic-CAS contention until the update is observed to succeed.
///
/// `k` is the vertex k-mer length; `edge` must have length `k+1`.
pub fn apply_edge(mph: &Mphf, table: &StateTable, edge: &Kmer) {
    let prefix = edge.prefix();
    let suffix = edge.suffix();
    let (canon_u, u_is_rc) = prefix.canonical();
    let (canon_v, v_is_rc) = suffix.canonical();

    let side_u = if u_is_rc { Side::Front } else { Side::Back };
    let side_v = if v_is_rc { Side::Back } else { Side::Front };

    let edge_base_u = if u_is_rc {
        edge.last_base().complement()
    } else {
        edge.last_base()
    };
    let edge_base_v = if v_is_rc {
        edge.first_base().complement()
    } else {
        edge.first_base()
    };

    let hash_u = mph.lookup(&canon_u).expect("edge endpoint missing from vertex MPH");

    if canon_u.packed() == canon_v.packed() {
        // Loop: both endpoints canonicalize to the same vertex.
        if side_u == side_v {
            apply_update(table, hash_u, |state| {
                state.with_side(side_u, Encoding::Multi)
            });
        } else {
            apply_update(table, hash_u, |_| VertexState {
                front: Encoding::Multi,
                back: Encoding::Multi,
            });
        }
        return;
    }

    let hash_v = mph.lookup(&canon_v).expect("edge endpoint missing from vertex MPH");
    apply_update(table, hash_u, |state| {
        state.with_side(side_u, state.at(side_u).transition(edge_base_u))
    });
    apply_update(table, hash_v, |state| {
        state.with_side(side_v, state.at(side_v).transition(edge_base_v))
    });
}

/// Reads the current cell at `idx`, computes the next state via `next`, and
/// CASes it in; on failure (a concurrent writer raced us), re-reads and
/// retries. Safe because the automaton's transitions are monotonic (I3) and
/// commutative (I4): the eventual state never depends on retry order.
pub(crate) fn apply_update(table: &StateTable, idx: u64, next: impl Fn(VertexState) -> VertexState) {
    loop {
        let current_code = table.read(idx);
        let current = VertexState::from_cell(current_code);
        let updated = next(current);
        if updated == current {
            return;
        }
        if table.update(idx, current_code, updated.to_cell()) {
            return;
        }
    }
}

/// Reads the decoded vertex state at `idx` without mutating it.
pub fn read_state(table: &StateTable, idx: u64) -> VertexState {
    VertexState::from_cell(table.read(idx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_table::AUTOMATON_CELL_BITS;

    fn kmer(seq: &str) -> Kmer {
        Kmer::from_bytes(seq.as_bytes(), 0, seq.len()).unwrap()
    }

    fn build_mph(vertices: &[&str]) -> Mphf {
        let kmers: Vec<Kmer> = vertices.iter().map(|s| kmer(s).canonical().0).collect();
        Mphf::build(kmers.into_iter(), 1, 2.0)
    }

    #[test]
    fn single_edge_sets_one_side_on_each_endpoint() {
        // k=3 vertices, k+1=4 edge: AAAC joins AAA (back side, since AAA is
        // canonical as prefix) to AAC (front side, since AAC is canonical
        // as suffix, edge enters from its front).
        let vertices = ["AAA", "AAC"];
        let mph = build_mph(&vertices);
        let table = StateTable::new(mph.key_count(), AUTOMATON_CELL_BITS);

        let edge = kmer("AAAC");
        apply_edge(&mph, &table, &edge);

        let aaa_idx = mph.lookup(&kmer("AAA").canonical().0).unwrap();
        let aac_idx = mph.lookup(&kmer("AAC").canonical().0).unwrap();

        let aaa_state = read_state(&table, aaa_idx);
        assert_eq!(aaa_state.back, Encoding::Unique(Base::from_ascii(b'C').unwrap()));
        assert_eq!(aaa_state.front, Encoding::Empty);

        let aac_state = read_state(&table, aac_idx);
        assert_eq!(aac_state.front, Encoding::Unique(Base::from_ascii(b'A').unwrap()));
    }

    #[test]
    fn second_distinct_edge_forces_multi() {
        let vertices = ["AAA", "AAC", "AAG"];
        let mph = build_mph(&vertices);
        let table = StateTable::new(mph.key_count(), AUTOMATON_CELL_BITS);

        apply_edge(&mph, &table, &kmer("AAAC"));
        apply_edge(&mph, &table, &kmer("AAAG"));

        let aaa_idx = mph.lookup(&kmer("AAA").canonical().0).unwrap();
        let state = read_state(&table, aaa_idx);
        assert_eq!(state.back, Encoding::Multi);
    }

    #[test]
    fn repeated_identical_edge_is_a_no_op() {
        let vertices = ["AAA", "AAC"];
        let mph = build_mph(&vertices);
        let table = StateTable::new(mph.key_count(), AUTOMATON_CELL_BITS);

        apply_edge(&mph, &table, &kmer("AAAC"));
        apply_edge(&mph, &table, &kmer("AAAC"));

        let aaa_idx = mph.lookup(&kmer("AAA").canonical().0).unwrap();
        let state = read_state(&table, aaa_idx);
        assert_eq!(state.back, Encoding::Unique(Base::from_ascii(b'C').unwrap()));
    }

    #[test]
    fn encoding_flank_classification() {
        assert!(Encoding::Empty.is_flank());
        assert!(Encoding::Multi.is_flank());
        assert!(!Encoding::Unique(Base::from_ascii(b'A').unwrap()).is_flank());
    }
}
