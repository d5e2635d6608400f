//! Optional JSON metadata writer (C13): a summary of one build, written in
//! the schema external tooling expects (§6) — four top-level sections
//! rather than a flat record, so downstream consumers can evolve each
//! independently.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CdbgError;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BasicInfo {
    pub vertex_count: u64,
    pub edge_count: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ContigsInfo {
    pub unitig_count: u64,
    pub kmers_in_unitigs: u64,
    pub max_length: u64,
    pub min_length: u64,
    pub sum_length: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DccInfo {
    pub cycle_count: u64,
    pub kmers_in_cycles: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ParametersInfo {
    pub k: usize,
    pub thread_count: usize,
    pub mode: String,
}

/// The full metadata document written alongside the FASTA output.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GraphMetadata {
    #[serde(rename = "basic info")]
    pub basic_info: BasicInfo,
    #[serde(rename = "contigs info")]
    pub contigs_info: ContigsInfo,
    #[serde(rename = "detached chordless cycles (DCC) info")]
    pub dcc_info: DccInfo,
    #[serde(rename = "parameters info")]
    pub parameters_info: ParametersInfo,
}

impl GraphMetadata {
    /// Folds in one emitted unitig's length (in bases) into the running
    /// contig statistics.
    pub fn record_unitig(&mut self, length_in_bases: u64, k: usize) {
        self.contigs_info.unitig_count += 1;
        self.contigs_info.sum_length += length_in_bases;
        self.contigs_info.max_length = self.contigs_info.max_length.max(length_in_bases);
        self.contigs_info.min_length = if self.contigs_info.unitig_count == 1 {
            length_in_bases
        } else {
            self.contigs_info.min_length.min(length_in_bases)
        };
        if length_in_bases >= k as u64 {
            self.contigs_info.kmers_in_unitigs += length_in_bases - k as u64 + 1;
        }
    }

    /// Folds in one emitted detached chordless cycle's length.
    pub fn record_cycle(&mut self, length_in_bases: u64) {
        self.dcc_info.cycle_count += 1;
        self.dcc_info.kmers_in_cycles += length_in_bases;
    }

    pub fn write_to(&self, path: &Path) -> Result<(), CdbgError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|source| CdbgError::DatabaseWrite {
            source,
            path: path.to_path_buf(),
        })
    }

    pub fn read_from(path: &Path) -> Result<Self, CdbgError> {
        let contents = std::fs::read_to_string(path).map_err(|source| CdbgError::DatabaseRead {
            source,
            path: path.to_path_buf(),
        })?;
        Ok(serde_json::from_str(&contents)?)
    }
}
