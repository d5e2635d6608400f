//! Build configuration (C12): validates CLI arguments (or direct
//! [`crate::builder::CdbgBuilder`] calls) into a [`BuildConfig`] before any
//! core component — MPHF, state table, worker threads — is constructed,
//! per I8 ("reject before work starts").

use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::kmer::MAX_K;

/// Which graph variant to build: streamed edges (read-cdBG) or scanned
/// reference sequences (ref-cdBG).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Read,
    Reference,
}

/// Where the vertex (and, for read mode, edge) k-mer sets come from.
#[derive(Debug, Clone)]
pub enum InputSource {
    /// Pre-built, already-sorted on-disk databases.
    Databases { vertex_db: PathBuf, edge_db: Option<PathBuf> },
    /// Build a [`crate::kmer_db::FlatKmerDb`] in-process from a FASTA/FASTQ
    /// file, for small inputs and the test/demo path.
    Fasta(PathBuf),
}

/// Validated configuration for one build, per §12.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub k: usize,
    pub mode: Mode,
    pub input: InputSource,
    pub threads: usize,
    pub memory_cap_bytes: Option<u64>,
    pub output: PathBuf,
    pub min_abundance: u64,
    pub dcc: bool,
    pub metadata_path: Option<PathBuf>,
    pub save_state_path: Option<PathBuf>,
    pub load_state_path: Option<PathBuf>,
}

impl BuildConfig {
    /// Validates every field, returning the first violated invariant as a
    /// [`ConfigError`]. Mirrors I8: odd k in range, a non-empty thread
    /// count, mode-appropriate inputs present, and a memory cap (if any)
    /// large enough to hold the state table it would back.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        k: usize,
        mode: Mode,
        input: InputSource,
        threads: usize,
        memory_cap_bytes: Option<u64>,
        output: PathBuf,
        min_abundance: u64,
        dcc: bool,
        metadata_path: Option<PathBuf>,
        save_state_path: Option<PathBuf>,
        load_state_path: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        if k == 0 || k > MAX_K || k % 2 == 0 {
            return Err(ConfigError::InvalidKmerLength {
                k,
                min: 1,
                max: MAX_K as u8,
            });
        }
        if threads == 0 {
            return Err(ConfigError::ZeroThreads);
        }
        match (&mode, &input) {
            // Reference classification walks raw reference sequence, which a
            // vertex/edge database pair cannot supply — only `--from-fasta`
            // can feed this mode.
            (Mode::Reference, InputSource::Databases { .. }) => {
                return Err(ConfigError::MissingReferenceInput);
            }
            (Mode::Reference, InputSource::Fasta(_)) => {}
            (Mode::Read, InputSource::Databases { edge_db: None, .. }) => {
                return Err(ConfigError::MissingEdgeDatabase);
            }
            (Mode::Read, InputSource::Databases { .. }) => {}
            (Mode::Read, InputSource::Fasta(_)) => {
                // `--from-fasta` derives both vertex and edge sets in-process;
                // edge derivation happens in `CdbgBuilder`, not here.
            }
        }
        if let InputSource::Databases { vertex_db, edge_db } = &input {
            check_readable(vertex_db)?;
            if let Some(edge_db) = edge_db {
                check_readable(edge_db)?;
            }
        }
        if let Some(cap) = memory_cap_bytes {
            // A single vertex cell never exceeds a byte; this is a coarse
            // pre-flight sanity check, not a precise accounting model.
            let minimum = 16u64;
            if cap < minimum {
                return Err(ConfigError::MemoryCapTooSmall {
                    requested_bytes: cap,
                    vertex_count: 0,
                });
            }
        }
        Ok(BuildConfig {
            k,
            mode,
            input,
            threads,
            memory_cap_bytes,
            output,
            min_abundance,
            dcc,
            metadata_path,
            save_state_path,
            load_state_path,
        })
    }
}

fn check_readable(path: &Path) -> Result<(), ConfigError> {
    std::fs::metadata(path)
        .map(|_| ())
        .map_err(|source| ConfigError::UnreadablePath {
            source,
            path: path.to_path_buf(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db_input() -> InputSource {
        InputSource::Fasta(PathBuf::from("/dev/null"))
    }

    #[test]
    fn rejects_even_k() {
        let err = BuildConfig::new(20, Mode::Read, db_input(), 1, None, "out.fa".into(), 0, false, None, None, None)
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidKmerLength { .. }));
    }

    #[test]
    fn rejects_k_above_max() {
        let err = BuildConfig::new(MAX_K + 2, Mode::Read, db_input(), 1, None, "out.fa".into(), 0, false, None, None, None)
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidKmerLength { .. }));
    }

    #[test]
    fn rejects_zero_threads() {
        let err = BuildConfig::new(21, Mode::Read, db_input(), 0, None, "out.fa".into(), 0, false, None, None, None)
            .unwrap_err();
        assert!(matches!(err, ConfigError::ZeroThreads));
    }

    #[test]
    fn rejects_read_mode_database_input_without_edge_db() {
        let input = InputSource::Databases {
            vertex_db: "/dev/null".into(),
            edge_db: None,
        };
        let err = BuildConfig::new(21, Mode::Read, input, 1, None, "out.fa".into(), 0, false, None, None, None)
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingEdgeDatabase));
    }

    #[test]
    fn accepts_valid_odd_k_with_fasta_input() {
        let config = BuildConfig::new(21, Mode::Read, db_input(), 4, None, "out.fa".into(), 0, false, None, None, None)
            .unwrap();
        assert_eq!(config.k, 21);
        assert_eq!(config.threads, 4);
    }

    #[test]
    fn rejects_unreadable_database_path() {
        let input = InputSource::Databases {
            vertex_db: "/nonexistent/path.cdb".into(),
            edge_db: Some("/nonexistent/path.cdb".into()),
        };
        let err = BuildConfig::new(21, Mode::Read, input, 1, None, "out.fa".into(), 0, false, None, None, None)
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnreadablePath { .. }));
    }
}
