//! Unitig extractor (C8): walks the vertex state table built by
//! [`crate::automaton`]/[`crate::ref_classifier`] and emits maximal unitigs
//! as FASTA records, plus a second pass over detached chordless cycles
//! (DCCs) for any vertex the primary pass never reaches.
//!
//! The primary walk is deliberately symmetric: given any vertex `v` with at
//! least one flanking side, it extends through *both* sides at once (§4.8).
//! Whichever side is itself a flank contributes a zero-length half; this
//! way a single code path handles the common one-flank case and the
//! degenerate both-flank (single-vertex unitig) case without a special
//! branch, and two threads starting from opposite ends of the same unitig
//! independently reconstruct the identical sequence and race for the same
//! sign-vertex CAS (I6).

use crate::automaton::{is_outputted_cell, Encoding, Side, VertexState, OUTPUTTED_CELL};
use crate::kmer::{Base, Kmer};
use crate::mphf::Mphf;
use crate::sink::WorkerBuffer;
use crate::state_table::StateTable;

struct HalfWalk {
    /// Bases appended while walking, in the order the walk encountered
    /// them (i.e. in the *directed* vertex's own reading frame, not
    /// necessarily the final unitig's frame).
    bases: Vec<Base>,
    /// Canonical form of the vertex the walk stopped at.
    end_vertex: Kmer,
    /// Raw cell value observed at `end_vertex` when the walk stopped,
    /// used as the CAS `expected` value for the outputted-claim attempt.
    end_cell: u8,
    /// `true` if the walk hit an already-outputted vertex instead of a
    /// genuine flank; the caller must abandon the whole unitig.
    abandoned: bool,
}

fn walk_half(mph: &Mphf, table: &StateTable, start_canonical: Kmer, exit_side: Side) -> HalfWalk {
    let mut d = if exit_side == Side::Back {
        start_canonical
    } else {
        start_canonical.reverse_complement()
    };
    let mut rc = d.reverse_complement();
    let mut bases = Vec::new();

    loop {
        let (canon_d, is_rc) = d.canonical();
        let idx = mph.lookup(&canon_d).expect("walked vertex missing from vertex MPH");
        let cell = table.read(idx);
        if is_outputted_cell(cell) {
            return HalfWalk {
                bases,
                end_vertex: canon_d,
                end_cell: cell,
                abandoned: true,
            };
        }
        let state = VertexState::from_cell(cell);

        let side = if is_rc { Side::Front } else { Side::Back };
        let encoding = state.at(side);
        if encoding.is_flank() {
            return HalfWalk {
                bases,
                end_vertex: canon_d,
                end_cell: cell,
                abandoned: false,
            };
        }

        let stored_base = match encoding {
            Encoding::Unique(base) => base,
            _ => unreachable!("non-flank encoding is always Unique"),
        };
        let actual_base = if is_rc { stored_base.complement() } else { stored_base };
        d.roll_forward(actual_base, &mut rc);
        bases.push(actual_base);
    }
}

fn revcomp_str(s: &str) -> String {
    s.bytes()
        .rev()
        .map(|b| Base::from_ascii(b).expect("unitig bytes are always ACGT").complement().to_ascii() as char)
        .collect()
}

/// Attempts to extract and emit the maximal unitig anchored at vertex
/// `start_canonical`, which the caller has already confirmed is not yet
/// outputted and has at least one flanking side. No-ops if `start_canonical`
/// is a pure interior vertex of some other worker's unitig, or loses a race
/// for the sign-vertex claim.
fn extract_from(
    mph: &Mphf,
    table: &StateTable,
    start_canonical: Kmer,
    start_state: VertexState,
    buffer: &mut WorkerBuffer<'_>,
) -> Result<(), crate::error::CdbgError> {
    let front_flank = start_state.front.is_flank();
    let back_flank = start_state.back.is_flank();
    if !front_flank && !back_flank {
        return Ok(());
    }

    let back_half = walk_half(mph, table, start_canonical, Side::Back);
    let front_half = walk_half(mph, table, start_canonical, Side::Front);
    if back_half.abandoned || front_half.abandoned {
        return Ok(());
    }

    let front_prefix: String = front_half
        .bases
        .iter()
        .rev()
        .map(|b| b.complement().to_ascii() as char)
        .collect();
    let back_suffix: String = back_half.bases.iter().map(|b| b.to_ascii() as char).collect();
    let mut sequence = format!("{front_prefix}{}{back_suffix}", start_canonical.label());

    let (sign_vertex, sign_cell, reverse_needed) = if front_half.end_vertex <= back_half.end_vertex {
        (front_half.end_vertex, front_half.end_cell, false)
    } else {
        (back_half.end_vertex, back_half.end_cell, true)
    };
    if reverse_needed {
        sequence = revcomp_str(&sequence);
    }

    let sign_idx = mph.lookup(&sign_vertex).expect("sign vertex missing from vertex MPH");
    if !table.update(sign_idx, sign_cell, OUTPUTTED_CELL) {
        // Another worker reached this unitig from its other end first.
        return Ok(());
    }

    buffer.push_record(sign_idx, &sequence)
}

/// Runs the primary extraction pass: scans every vertex in `vertices` (the
/// full canonical vertex set, as streamed from the sorted on-disk database)
/// and, for each one not already outputted, attempts [`extract_from`]. Pure
/// interior vertices (neither side a flank) are cheap no-ops; vertices
/// belonging to a detached chordless cycle (no side ever a flank) are left
/// for [`extract_cycles`]. Callers running this across a worker pool split
/// `vertices` into disjoint chunks and share one `table`/`sink`.
pub fn extract_unitigs(
    mph: &Mphf,
    table: &StateTable,
    vertices: impl Iterator<Item = Kmer>,
    sink: &dyn crate::sink::Sink,
) -> Result<(), crate::error::CdbgError> {
    let mut buffer = WorkerBuffer::new(sink);
    for v in vertices {
        let idx = mph.lookup(&v).expect("vertex missing from vertex MPH");
        let cell = table.read(idx);
        if is_outputted_cell(cell) {
            continue;
        }
        let state = VertexState::from_cell(cell);
        extract_from(mph, table, v, state, &mut buffer)?;
    }
    buffer.finish()
}

/// Runs the detached-chordless-cycle pass: for every vertex still not
/// outputted after [`extract_unitigs`] (every side of every such vertex is
/// non-flank, by construction), walks until the directed vertex returns to
/// its own canonical form, tracking the lexicographically smallest
/// canonical k-mer visited as the rotation pivot, then emits the cycle
/// rotated to start at that pivot.
pub fn extract_cycles(
    mph: &Mphf,
    table: &StateTable,
    remaining: impl Iterator<Item = Kmer>,
    sink: &dyn crate::sink::Sink,
) -> Result<(), crate::error::CdbgError> {
    let mut buffer = WorkerBuffer::new(sink);
    for start in remaining {
        let idx = mph.lookup(&start).expect("cycle vertex missing from vertex MPH");
        let cell = table.read(idx);
        if is_outputted_cell(cell) {
            continue;
        }
        if let Some(record) = walk_cycle(mph, table, start) {
            let (pivot_idx, sequence) = record;
            if table.update(pivot_idx, table.read(pivot_idx), OUTPUTTED_CELL) {
                buffer.push_record(pivot_idx, &sequence)?;
            }
        }
    }
    buffer.finish()
}

/// Advances `d` one step along the cycle automaton, returning the actual
/// base rolled in (already un-complemented into `d`'s own orientation), or
/// `None` if `d` turns out not to be a pure-cycle vertex after all (every
/// side must be `Unique`, never a flank).
fn cycle_step(mph: &Mphf, table: &StateTable, d: &mut Kmer, rc: &mut Kmer) -> Option<Base> {
    let (canon_d, is_rc) = d.canonical();
    let idx = mph.lookup(&canon_d).ok()?;
    let cell = table.read(idx);
    if is_outputted_cell(cell) {
        return None;
    }
    let state = VertexState::from_cell(cell);
    let side = if is_rc { Side::Front } else { Side::Back };
    let stored_base = match state.at(side) {
        Encoding::Unique(base) => base,
        _ => return None,
    };
    let actual_base = if is_rc { stored_base.complement() } else { stored_base };
    d.roll_forward(actual_base, rc);
    Some(actual_base)
}

/// Finds the lexicographically smallest canonical vertex reachable by
/// repeatedly stepping forward from `start` around its cycle.
fn find_cycle_pivot(mph: &Mphf, table: &StateTable, start: Kmer) -> Option<Kmer> {
    let start_canon = start.canonical().0;
    let mut d = start;
    let mut rc = d.reverse_complement();
    let mut pivot = start_canon;
    loop {
        cycle_step(mph, table, &mut d, &mut rc)?;
        let canon_d = d.canonical().0;
        if canon_d.packed() == start_canon.packed() {
            return Some(pivot);
        }
        if canon_d < pivot {
            pivot = canon_d;
        }
    }
}

/// Walks one full traversal of the cycle starting (and ending) at `pivot`,
/// assembling the linear FASTA representation (the last `k-1` bases equal
/// the first `k-1`, so the cyclic structure is recoverable from the
/// output).
fn trace_cycle_sequence(mph: &Mphf, table: &StateTable, pivot: Kmer) -> Option<String> {
    let k = pivot.k();
    let mut d = pivot;
    let mut rc = d.reverse_complement();
    let mut bases: Vec<Base> = (0..k).map(|i| pivot.base_at(i)).collect();
    loop {
        let actual_base = cycle_step(mph, table, &mut d, &mut rc)?;
        if d.canonical().0.packed() == pivot.packed() {
            break;
        }
        bases.push(actual_base);
    }
    Some(bases.iter().map(|b| b.to_ascii() as char).collect())
}

fn walk_cycle(mph: &Mphf, table: &StateTable, start: Kmer) -> Option<(u64, String)> {
    let pivot = find_cycle_pivot(mph, table, start)?;
    let sequence = trace_cycle_sequence(mph, table, pivot)?;
    let pivot_idx = mph.lookup(&pivot).ok()?;
    Some((pivot_idx, sequence))
}
