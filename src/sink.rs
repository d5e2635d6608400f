//! Thread-safe FASTA byte sink (C14): the one piece of shared mutable state
//! every extraction worker touches, and the only one guarded by a plain
//! mutex rather than the sparse-lock scheme — writes are comparatively rare
//! once workers batch records into their own local buffer (§4.8 step 6).

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

use crate::error::CdbgError;

/// Per-worker output is accumulated locally and flushed to the sink once it
/// crosses this size, so the sink lock is held only for large, infrequent
/// writes rather than once per unitig.
pub const SOFT_CAP_BYTES: usize = 100 * 1024;

/// A shared, lock-guarded destination for FASTA bytes.
pub trait Sink: Send + Sync {
    fn write_bytes(&self, bytes: &[u8]) -> Result<(), CdbgError>;
    fn flush(&self) -> Result<(), CdbgError>;
}

/// A `Sink` backed by a single file, open for the duration of the build.
pub struct FileSink {
    writer: Mutex<BufWriter<File>>,
}

impl FileSink {
    pub fn create(path: &Path) -> Result<Self, CdbgError> {
        let file = File::create(path).map_err(|source| CdbgError::SinkWrite { source })?;
        Ok(FileSink {
            writer: Mutex::new(BufWriter::new(file)),
        })
    }
}

impl Sink for FileSink {
    fn write_bytes(&self, bytes: &[u8]) -> Result<(), CdbgError> {
        let mut writer = self.writer.lock().expect("sink mutex poisoned");
        writer.write_all(bytes).map_err(|source| CdbgError::SinkWrite { source })
    }

    fn flush(&self) -> Result<(), CdbgError> {
        let mut writer = self.writer.lock().expect("sink mutex poisoned");
        writer.flush().map_err(|source| CdbgError::SinkWrite { source })
    }
}

/// A `Sink` that accumulates everything in memory, used by tests and by the
/// `validate` CLI subcommand's in-process harness.
#[derive(Default)]
pub struct MemorySink {
    buffer: Mutex<Vec<u8>>,
}

impl MemorySink {
    pub fn new() -> Self {
        MemorySink::default()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer.into_inner().expect("sink mutex poisoned")
    }

    pub fn snapshot(&self) -> Vec<u8> {
        self.buffer.lock().expect("sink mutex poisoned").clone()
    }
}

impl Sink for MemorySink {
    fn write_bytes(&self, bytes: &[u8]) -> Result<(), CdbgError> {
        self.buffer.lock().expect("sink mutex poisoned").extend_from_slice(bytes);
        Ok(())
    }

    fn flush(&self) -> Result<(), CdbgError> {
        Ok(())
    }
}

/// Accumulates FASTA record bytes locally and flushes to `sink` once the
/// local buffer crosses [`SOFT_CAP_BYTES`]. Call [`Self::finish`] to flush
/// any remainder.
pub struct WorkerBuffer<'a> {
    sink: &'a dyn Sink,
    local: Vec<u8>,
}

impl<'a> WorkerBuffer<'a> {
    pub fn new(sink: &'a dyn Sink) -> Self {
        WorkerBuffer {
            sink,
            local: Vec::with_capacity(SOFT_CAP_BYTES),
        }
    }

    pub fn push_record(&mut self, id: u64, sequence: &str) -> Result<(), CdbgError> {
        use std::fmt::Write as _;
        let mut header = String::with_capacity(sequence.len() + 16);
        let _ = writeln!(header, ">{id}");
        self.local.extend_from_slice(header.as_bytes());
        self.local.extend_from_slice(sequence.as_bytes());
        self.local.push(b'\n');
        if self.local.len() > SOFT_CAP_BYTES {
            self.flush_local()?;
        }
        Ok(())
    }

    fn flush_local(&mut self) -> Result<(), CdbgError> {
        if self.local.is_empty() {
            return Ok(());
        }
        self.sink.write_bytes(&self.local)?;
        self.local.clear();
        Ok(())
    }

    pub fn finish(mut self) -> Result<(), CdbgError> {
        self.flush_local()
    }
}
