//! Fluent build API (C15): the one entry point that wires every component —
//! database loading, MPHF construction, automaton/classifier population,
//! extraction, and metadata — into a single call, in the same chainable,
//! `#[must_use]`-setter style the teacher's k-mer-counting builder used.
//!
//! # Example
//!
//! ```rust,no_run
//! use cdbgr::builder::CdbgBuilder;
//! use cdbgr::config::Mode;
//!
//! let metadata = CdbgBuilder::new()
//!     .k(31)?
//!     .mode(Mode::Read)
//!     .from_fasta("reads.fa".into())
//!     .threads(8)
//!     .output("unitigs.fa".into())
//!     .build()?;
//!
//! println!("{} unitigs", metadata.contigs_info.unitig_count);
//! # Ok::<(), cdbgr::error::BuilderError>(())
//! ```

use std::path::PathBuf;
use std::sync::Mutex;

use crate::automaton::apply_edge;
use crate::config::{BuildConfig, InputSource, Mode};
use crate::error::{BuilderError, CdbgError};
use crate::kmer::Kmer;
use crate::kmer_db::{FlatKmerDb, KmerDb};
use crate::logging;
use crate::metadata::GraphMetadata;
use crate::mphf::Mphf;
use crate::pool;
use crate::ref_classifier::classify_sequence;
use crate::sequence_source::{self, Sequence};
use crate::sink::{FileSink, Sink};
use crate::spmc::SpmcIter;
use crate::state_table::{StateTable, AUTOMATON_CELL_BITS};

/// Construction gamma passed to [`Mphf::build`]: extra bits per key traded
/// for fewer cascade levels, matching the value used throughout the test
/// suite.
const MPH_GAMMA: f64 = 2.0;

/// A fluent builder for one cdBG construction run.
#[derive(Debug, Default)]
pub struct CdbgBuilder {
    k: Option<usize>,
    mode: Mode,
    input: Option<InputSource>,
    threads: Option<usize>,
    memory_cap_bytes: Option<u64>,
    output: Option<PathBuf>,
    min_abundance: u64,
    dcc: bool,
    metadata_path: Option<PathBuf>,
    save_state_path: Option<PathBuf>,
    load_state_path: Option<PathBuf>,
}

impl CdbgBuilder {
    #[must_use]
    pub fn new() -> Self {
        CdbgBuilder::default()
    }

    /// Sets the vertex k-mer length. Must be odd and within `1..=MAX_K`;
    /// checked eagerly so a typo surfaces at the call site rather than deep
    /// inside `build()`.
    pub fn k(mut self, k: usize) -> Result<Self, BuilderError> {
        if k == 0 || k % 2 == 0 || k > crate::kmer::MAX_K {
            return Err(BuilderError::Config(crate::error::ConfigError::InvalidKmerLength {
                k,
                min: 1,
                max: crate::kmer::MAX_K as u8,
            }));
        }
        self.k = Some(k);
        Ok(self)
    }

    #[must_use]
    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    #[must_use]
    pub fn memory_cap(mut self, bytes: u64) -> Self {
        self.memory_cap_bytes = Some(bytes);
        self
    }

    /// Reads vertex (and, in read mode, edge) k-mers from pre-built sorted
    /// on-disk databases rather than deriving them in-process.
    #[must_use]
    pub fn databases(mut self, vertex_db: PathBuf, edge_db: Option<PathBuf>) -> Self {
        self.input = Some(InputSource::Databases { vertex_db, edge_db });
        self
    }

    /// Derives vertex (and edge, for read mode) k-mer sets in-process from
    /// a FASTA/FASTQ file.
    #[must_use]
    pub fn from_fasta(mut self, path: PathBuf) -> Self {
        self.input = Some(InputSource::Fasta(path));
        self
    }

    #[must_use]
    pub fn output(mut self, path: PathBuf) -> Self {
        self.output = Some(path);
        self
    }

    #[must_use]
    pub fn min_abundance(mut self, min_abundance: u64) -> Self {
        self.min_abundance = min_abundance;
        self
    }

    #[must_use]
    pub fn dcc(mut self, enabled: bool) -> Self {
        self.dcc = enabled;
        self
    }

    /// Writes a [`GraphMetadata`] JSON summary to `path` once the build
    /// completes.
    #[must_use]
    pub fn metadata(mut self, path: PathBuf) -> Self {
        self.metadata_path = Some(path);
        self
    }

    /// Persists the built MPHF and state table to `path.mph`/`path.tbl`
    /// after a successful build, so a later run can resume via
    /// [`Self::load_state`].
    #[must_use]
    pub fn save_state(mut self, path: PathBuf) -> Self {
        self.save_state_path = Some(path);
        self
    }

    /// Loads a previously-saved MPHF and state table instead of rebuilding
    /// them; the vertex database is still read (for `scan()` order) but
    /// automaton/classifier population is skipped.
    #[must_use]
    pub fn load_state(mut self, path: PathBuf) -> Self {
        self.load_state_path = Some(path);
        self
    }

    /// Runs the full build: validates configuration, loads or derives the
    /// vertex/edge k-mer sets, builds the MPHF and state table, populates
    /// vertex states, extracts unitigs and detached chordless cycles, and
    /// writes the FASTA output (plus optional JSON metadata).
    pub fn build(self) -> Result<GraphMetadata, BuilderError> {
        let k = self.k.ok_or(BuilderError::KmerLengthNotSet)?;
        let input = self
            .input
            .ok_or_else(|| BuilderError::Process("no input configured; call .databases() or .from_fasta()".into()))?;
        let output = self
            .output
            .ok_or_else(|| BuilderError::Process("no output path configured; call .output()".into()))?;
        let threads = self.threads.unwrap_or_else(pool::default_worker_count);

        let config = BuildConfig::new(
            k,
            self.mode,
            input,
            threads,
            self.memory_cap_bytes,
            output,
            self.min_abundance,
            self.dcc,
            self.metadata_path,
            self.save_state_path,
            self.load_state_path,
        )?;

        let (vertex_db, edge_db, sequences) = derive_inputs(&config)?;
        let edge_count = edge_db.as_ref().map_or(0, FlatKmerDb::kmer_count);
        logging::phase("load_databases", k, vertex_db.kmer_count(), edge_count, config.threads);

        let mut vertices: Vec<Kmer> = Vec::with_capacity(vertex_db.kmer_count() as usize);
        vertex_db.scan(&mut |kmer| vertices.push(kmer))?;

        let mph = Mphf::build(vertices.iter().copied(), config.threads, MPH_GAMMA);
        let table = StateTable::new(mph.key_count(), AUTOMATON_CELL_BITS);
        logging::phase("build_mphf", k, mph.key_count(), edge_count, config.threads);

        match config.mode {
            Mode::Read => {
                let edge_db = edge_db.expect("read mode configuration guarantees an edge database");
                populate_from_edges(&mph, &table, edge_db, config.threads)?;
            }
            Mode::Reference => {
                let sequences = sequences.expect("reference mode configuration guarantees reference sequences");
                populate_from_reference(&mph, &table, &sequences, k, config.threads);
            }
        }
        logging::phase("populate_states", k, mph.key_count(), edge_count, config.threads);

        if let Some(path) = &config.save_state_path {
            mph.save(&path.with_extension("mph"))?;
            std::fs::write(path.with_extension("tbl"), table.to_bytes())
                .map_err(|source| CdbgError::StateWrite { source, path: path.clone() })?;
        }

        let sink = FileSink::create(&config.output)?;
        let metadata = Mutex::new(GraphMetadata::default());

        run_extraction(&mph, &table, &vertices, config.threads, &sink, &metadata, k, config.dcc)?;
        logging::phase("extraction", k, mph.key_count(), edge_count, config.threads);

        sink.flush()?;

        let mut metadata = metadata.into_inner().expect("metadata mutex poisoned");
        metadata.basic_info.vertex_count = mph.key_count();
        metadata.basic_info.edge_count = match config.mode {
            Mode::Read => edge_count,
            Mode::Reference => 0,
        };
        metadata.parameters_info.k = k;
        metadata.parameters_info.thread_count = config.threads;
        metadata.parameters_info.mode = match config.mode {
            Mode::Read => "read".to_string(),
            Mode::Reference => "reference".to_string(),
        };

        if let Some(path) = &config.metadata_path {
            metadata.write_to(path)?;
        }

        Ok(metadata)
    }
}

/// Loads or derives the vertex database, the edge database (read mode),
/// and the raw reference sequences (reference mode), per the configured
/// [`InputSource`].
fn derive_inputs(
    config: &BuildConfig,
) -> Result<(FlatKmerDb, Option<FlatKmerDb>, Option<Vec<Sequence>>), BuilderError> {
    match &config.input {
        InputSource::Databases { vertex_db, edge_db } => {
            let vertex_db = FlatKmerDb::load(vertex_db)?;
            let edge_db = match edge_db {
                Some(path) => Some(FlatKmerDb::load(path)?),
                None => None,
            };
            Ok((vertex_db, edge_db, None))
        }
        InputSource::Fasta(path) => {
            let sequences = sequence_source::read_any(path)?;
            let k = config.k;
            let vertex_kmers = windows_of(&sequences, k);
            let vertex_db = FlatKmerDb::build(k, vertex_kmers, true);
            match config.mode {
                Mode::Read => {
                    let edge_kmers = windows_of(&sequences, k + 1);
                    let edge_db = FlatKmerDb::build(k + 1, edge_kmers, true);
                    Ok((vertex_db, Some(edge_db), None))
                }
                Mode::Reference => Ok((vertex_db, None, Some(sequences))),
            }
        }
    }
}

/// Every valid length-`window_len` window across every sequence, skipping
/// windows that contain a non-ACGT byte.
fn windows_of(sequences: &[Sequence], window_len: usize) -> Vec<Kmer> {
    let mut kmers = Vec::new();
    for sequence in sequences {
        if sequence.bytes.len() < window_len {
            continue;
        }
        for start in 0..=(sequence.bytes.len() - window_len) {
            if let Ok(kmer) = Kmer::from_bytes(&sequence.bytes, start, window_len) {
                kmers.push(kmer);
            }
        }
    }
    kmers
}

/// Streams the edge database across `thread_count` consumers via
/// [`SpmcIter`], applying each edge to the shared state table (C6, §5).
fn populate_from_edges(
    mph: &Mphf,
    table: &StateTable,
    edge_db: FlatKmerDb,
    thread_count: usize,
) -> Result<(), BuilderError> {
    let spmc = SpmcIter::new(std::sync::Arc::new(edge_db), thread_count, crate::spmc::DEFAULT_BLOCK_RECORDS);
    spmc.launch_production();
    pool::scoped_run(thread_count, |id| {
        while let Some(edge) = spmc.value_at(id) {
            apply_edge(mph, table, &edge);
        }
    });
    spmc.seize_production();
    Ok(())
}

/// Classifies every reference sequence, one worker per roughly-equal slice
/// of the sequence list (each sequence's runs are independent of every
/// other sequence's, so this splits cleanly across threads).
fn populate_from_reference(mph: &Mphf, table: &StateTable, sequences: &[Sequence], k: usize, thread_count: usize) {
    pool::scoped_run(thread_count, |id| {
        let mut i = id;
        while i < sequences.len() {
            classify_sequence(mph, table, &sequences[i].bytes, k);
            i += thread_count;
        }
    });
}

/// Runs the primary unitig-extraction pass over `thread_count` disjoint
/// slices of `vertices`, then, if `dcc` is set, a single detached-chordless-
/// cycle pass over the full vertex set, recording both into `metadata` as
/// records are emitted.
fn run_extraction(
    mph: &Mphf,
    table: &StateTable,
    vertices: &[Kmer],
    thread_count: usize,
    sink: &dyn Sink,
    metadata: &Mutex<GraphMetadata>,
    k: usize,
    dcc: bool,
) -> Result<(), BuilderError> {
    let chunk_size = vertices.len().div_ceil(thread_count.max(1)).max(1);
    let worker_error: Mutex<Option<CdbgError>> = Mutex::new(None);

    pool::scoped_run(thread_count, |id| {
        let start = id * chunk_size;
        if start >= vertices.len() {
            return;
        }
        let end = (start + chunk_size).min(vertices.len());
        let chunk = &vertices[start..end];
        let counting_sink = CountingSink {
            inner: sink,
            kind: RecordKind::Unitig { k },
            metadata,
        };
        if let Err(error) = crate::extractor::extract_unitigs(mph, table, chunk.iter().copied(), &counting_sink) {
            *worker_error.lock().expect("worker-error mutex poisoned") = Some(error);
        }
    });

    if let Some(error) = worker_error.into_inner().expect("worker-error mutex poisoned") {
        return Err(error.into());
    }

    if dcc {
        let cycle_sink = CountingSink {
            inner: sink,
            kind: RecordKind::Cycle,
            metadata,
        };
        crate::extractor::extract_cycles(mph, table, vertices.iter().copied(), &cycle_sink)?;
    }

    Ok(())
}

#[derive(Clone, Copy)]
enum RecordKind {
    Unitig { k: usize },
    Cycle,
}

/// A [`Sink`] wrapper that tallies each FASTA record's sequence length into
/// the shared [`GraphMetadata`] as it passes through, then forwards the
/// bytes unchanged to the real sink.
struct CountingSink<'a> {
    inner: &'a dyn Sink,
    kind: RecordKind,
    metadata: &'a Mutex<GraphMetadata>,
}

impl<'a> Sink for CountingSink<'a> {
    fn write_bytes(&self, bytes: &[u8]) -> Result<(), CdbgError> {
        for length in sequence_lengths(bytes) {
            let mut metadata = self.metadata.lock().expect("metadata mutex poisoned");
            match self.kind {
                RecordKind::Unitig { k } => metadata.record_unitig(length, k),
                RecordKind::Cycle => metadata.record_cycle(length),
            }
        }
        self.inner.write_bytes(bytes)
    }

    fn flush(&self) -> Result<(), CdbgError> {
        self.inner.flush()
    }
}

/// Extracts each FASTA record's sequence-line length from a batch of bytes
/// written by [`crate::sink::WorkerBuffer`] (one header line, one sequence
/// line, per record — never wrapped).
fn sequence_lengths(bytes: &[u8]) -> Vec<u64> {
    let text = std::str::from_utf8(bytes).unwrap_or("");
    text.lines()
        .filter(|line| !line.starts_with('>') && !line.is_empty())
        .map(|line| line.len() as u64)
        .collect()
}
