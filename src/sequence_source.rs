//! Reference/read sequence input (C11): reads FASTA or FASTQ records with
//! `bio`, the same crate the teacher uses for its own sequence reading, for
//! the `--from-fasta` path and the in-process reference classifier.

use std::path::Path;

use bio::io::{fasta, fastq};

use crate::error::BuilderError;

/// One input sequence, as raw ASCII bytes (uppercase/lowercase and
/// ambiguity codes preserved; [`crate::kmer::Base::from_ascii`] is the
/// single place that decides what counts as a valid DNA base).
pub struct Sequence {
    pub bytes: Vec<u8>,
}

/// Reads every record from a FASTA file, case preserved.
pub fn read_fasta(path: &Path) -> Result<Vec<Sequence>, BuilderError> {
    let reader =
        fasta::Reader::from_file(path).map_err(|source| BuilderError::Process(source.to_string()))?;
    reader
        .records()
        .map(|record| {
            let record = record.map_err(|source| BuilderError::Process(source.to_string()))?;
            Ok(Sequence {
                bytes: record.seq().to_vec(),
            })
        })
        .collect()
}

/// Reads every record from a FASTQ file, discarding quality scores: the
/// graph is built from bases alone (§0 Non-goals: no quality-aware logic).
pub fn read_fastq(path: &Path) -> Result<Vec<Sequence>, BuilderError> {
    let reader =
        fastq::Reader::from_file(path).map_err(|source| BuilderError::Process(source.to_string()))?;
    reader
        .records()
        .map(|record| {
            let record = record.map_err(|source| BuilderError::Process(source.to_string()))?;
            Ok(Sequence {
                bytes: record.seq().to_vec(),
            })
        })
        .collect()
}

/// Reads `path` as FASTA if it parses as one, else falls back to FASTQ;
/// `--from-fasta` accepts either per §12.
pub fn read_any(path: &Path) -> Result<Vec<Sequence>, BuilderError> {
    match read_fasta(path) {
        Ok(sequences) if !sequences.is_empty() => Ok(sequences),
        _ => read_fastq(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_fasta_records_in_order() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, ">seq1\nGATTACA\n>seq2\nTTAGGG").unwrap();
        let sequences = read_fasta(file.path()).unwrap();
        assert_eq!(sequences.len(), 2);
        assert_eq!(sequences[0].bytes, b"GATTACA");
        assert_eq!(sequences[1].bytes, b"TTAGGG");
    }

    #[test]
    fn reads_fastq_records_discarding_quality() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "@seq1\nGATTACA\n+\nIIIIIII").unwrap();
        let sequences = read_fastq(file.path()).unwrap();
        assert_eq!(sequences.len(), 1);
        assert_eq!(sequences[0].bytes, b"GATTACA");
    }
}
