//! # cdbgr
//!
//! A parallel compacted de Bruijn graph (cdBG) builder: given sorted
//! on-disk k-mer and (k+1)-mer databases (or a FASTA/FASTQ file to derive
//! them from), constructs the cdBG and writes its maximal unitigs — and,
//! for read input, detached chordless cycles — as FASTA.
//!
//! The pipeline, end to end:
//!
//! 1. [`kmer_db`] reads the sorted vertex/edge databases ([`kmer_db::KmerDb`]).
//! 2. [`mphf`] builds a minimal perfect hash over the vertex set.
//! 3. [`spmc`] streams edge records to worker threads; [`automaton`] (read
//!    mode) or [`ref_classifier`] (reference mode) folds each observation
//!    into a [`state_table::StateTable`] cell per vertex.
//! 4. [`extractor`] walks the populated table to emit maximal unitigs, then
//!    detached chordless cycles, through a [`sink::Sink`].
//! 5. [`metadata`] summarizes the run as JSON; [`pool`] supplies the worker
//!    threads and progress tracking throughout.
//!
//! [`builder::CdbgBuilder`] wires all of the above into one fluent call;
//! [`cli`]/`main.rs` expose it as the `cdbgr` binary.

pub mod automaton;
pub mod builder;
pub mod cli;
pub mod config;
pub mod error;
pub mod extractor;
pub mod kmer;
pub mod kmer_db;
pub mod logging;
pub mod metadata;
pub mod mphf;
pub mod pool;
pub mod ref_classifier;
pub mod sequence_source;
pub mod sink;
pub mod spmc;
pub mod state_table;
