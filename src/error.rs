//! Error types for cdbgr.
//!
//! Two enums separate the two error lifetimes the crate cares about:
//! `ConfigError` can only occur before any worker thread exists, and
//! `CdbgError` covers everything that can go wrong once a build is running.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while validating a [`crate::config::BuildConfig`] or CLI
/// arguments, before any core component is constructed.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// k-mer length is outside the valid range, or is even.
    #[error("invalid k-mer length {k}: must be odd and between {min} and {max}")]
    InvalidKmerLength { k: usize, min: u8, max: u8 },

    /// Thread count of zero was requested.
    #[error("thread count must be at least 1")]
    ZeroThreads,

    /// An input path does not exist or is not readable.
    #[error("input path '{path}' is not readable: {source}")]
    UnreadablePath {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Reference mode was requested without a sequence source.
    #[error("reference mode requires a reference sequence input")]
    MissingReferenceInput,

    /// Read mode was requested without an edge database.
    #[error("read mode requires both a vertex database and an edge database")]
    MissingEdgeDatabase,

    /// A memory cap was requested that cannot hold even the state table.
    #[error("memory cap {requested_bytes} bytes is too small for {vertex_count} vertices")]
    MemoryCapTooSmall {
        requested_bytes: u64,
        vertex_count: u64,
    },
}

/// Errors produced while running a build: I/O, corrupted on-disk state, or
/// an MPH invariant violation.
#[derive(Debug, Error)]
pub enum CdbgError {
    /// Failed to read a k-mer or edge database.
    #[error("failed to read database '{path}': {source}")]
    DatabaseRead {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Failed to write a k-mer or edge database.
    #[error("failed to write database '{path}': {source}")]
    DatabaseWrite {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// The on-disk database header is corrupt (bad magic, version, or checksum).
    #[error("corrupt database '{path}': {details}")]
    CorruptDatabase { details: String, path: PathBuf },

    /// Failed to read a persisted MPHF or state table.
    #[error("failed to read persisted state '{path}': {source}")]
    StateRead {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Failed to write a persisted MPHF or state table.
    #[error("failed to write persisted state '{path}': {source}")]
    StateWrite {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// A canonical k-mer hashed outside `[0, vertex_count)`: the MPHF was
    /// built from a different key set than the one being queried, or the
    /// persisted MPHF file is corrupt.
    #[error("MPH lookup out of range: hash {hash} not in [0, {vertex_count})")]
    MphOutOfRange { hash: u64, vertex_count: u64 },

    /// Failed to write the FASTA output sink.
    #[error("failed to write output: {source}")]
    SinkWrite {
        #[source]
        source: std::io::Error,
    },

    /// Failed to serialize JSON metadata.
    #[error("failed to write metadata: {source}")]
    MetadataWrite {
        #[source]
        source: serde_json::Error,
    },

    /// An invalid DNA base was encountered where the caller required a
    /// fully-valid k-mer (e.g. parsing a raw on-disk database record).
    #[error("invalid base '{base}' at position {position} in k-mer record")]
    InvalidBase { base: u8, position: usize },

    /// A worker thread panicked or could not be joined.
    #[error("worker thread failed: {0}")]
    WorkerJoin(String),
}

impl From<std::io::Error> for CdbgError {
    fn from(source: std::io::Error) -> Self {
        CdbgError::SinkWrite { source }
    }
}

impl From<serde_json::Error> for CdbgError {
    fn from(source: serde_json::Error) -> Self {
        CdbgError::MetadataWrite { source }
    }
}

/// Errors surfaced by the fluent [`crate::builder::CdbgBuilder`] API, which
/// spans both configuration and run-time failures.
#[derive(Debug, Error)]
pub enum BuilderError {
    /// k-mer length was not set before calling a build method.
    #[error("k-mer length not set; call .k() first")]
    KmerLengthNotSet,

    /// Configuration was invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A run-time error occurred during the build.
    #[error(transparent)]
    Cdbg(#[from] CdbgError),

    /// I/O error outside the core (e.g. opening the `--from-fasta` input).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Catch-all for errors that cannot carry a `'static` source across a
    /// thread boundary (e.g. a joined worker's panic payload).
    #[error("{0}")]
    Process(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_kmer_length_display() {
        let err = ConfigError::InvalidKmerLength {
            k: 50,
            min: 1,
            max: 63,
        };
        assert_eq!(
            err.to_string(),
            "invalid k-mer length 50: must be odd and between 1 and 63"
        );
    }

    #[test]
    fn mph_out_of_range_display() {
        let err = CdbgError::MphOutOfRange {
            hash: 42,
            vertex_count: 10,
        };
        assert_eq!(
            err.to_string(),
            "MPH lookup out of range: hash 42 not in [0, 10)"
        );
    }

    #[test]
    fn builder_error_from_config_error() {
        let err: BuilderError = ConfigError::ZeroThreads.into();
        assert!(matches!(
            err,
            BuilderError::Config(ConfigError::ZeroThreads)
        ));
    }

    #[test]
    fn builder_error_from_cdbg_error() {
        let err: BuilderError = CdbgError::MphOutOfRange {
            hash: 1,
            vertex_count: 1,
        }
        .into();
        assert!(matches!(err, BuilderError::Cdbg(CdbgError::MphOutOfRange { .. })));
    }
}
