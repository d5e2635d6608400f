//! Command-line surface (§12): a `clap`-derive CLI with `build` and
//! `validate` subcommands, `version`/`help` delegated to `clap`'s own
//! derived output, in the same derive style the teacher's own `Args`/`Cli`
//! used.

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

use crate::config::Mode;

#[derive(Debug, Parser)]
#[command(name = "cdbgr", version, about = "Compacted de Bruijn graph builder", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Builds a compacted de Bruijn graph and writes maximal unitigs (and,
    /// for read input, detached chordless cycles) as FASTA.
    Build(BuildArgs),
    /// Re-reads a produced FASTA output against its source k-mer database(s)
    /// and checks the coverage/non-overlap/exactly-once properties.
    Validate(ValidateArgs),
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum ModeArg {
    Read,
    Reference,
}

impl From<ModeArg> for Mode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Read => Mode::Read,
            ModeArg::Reference => Mode::Reference,
        }
    }
}

#[derive(Debug, ClapArgs)]
pub struct BuildArgs {
    /// Vertex k-mer length; must be odd.
    #[arg(short = 'k', long = "kmer-length", value_parser = parse_k)]
    pub k: usize,

    /// Path to a sorted, de-duplicated vertex k-mer database.
    #[arg(long, requires = "edge_db", conflicts_with = "from_fasta")]
    pub vertex_db: Option<PathBuf>,

    /// Path to a sorted, de-duplicated (k+1)-mer edge database (read mode).
    #[arg(long, requires = "vertex_db", conflicts_with = "from_fasta")]
    pub edge_db: Option<PathBuf>,

    /// Derive the vertex (and edge, for read mode) sets in-process from a
    /// FASTA/FASTQ file instead of pre-built databases.
    #[arg(long, conflicts_with_all = ["vertex_db", "edge_db"])]
    pub from_fasta: Option<PathBuf>,

    /// Worker thread count; defaults to hardware concurrency.
    #[arg(short = 't', long)]
    pub threads: Option<usize>,

    /// Soft cap, in bytes, on state-table memory use.
    #[arg(long)]
    pub memory_cap: Option<u64>,

    /// Output FASTA path.
    #[arg(short = 'o', long)]
    pub output: PathBuf,

    /// Which graph variant to build.
    #[arg(long, value_enum, default_value = "read")]
    pub mode: ModeArg,

    /// Minimum per-k-mer abundance to include (requires an abundance-
    /// annotated database; 0 disables filtering).
    #[arg(long, default_value_t = 0)]
    pub min_abundance: u64,

    /// Emit detached chordless cycles (read mode only).
    #[arg(long)]
    pub dcc: bool,

    /// Write a JSON metadata summary alongside the FASTA output.
    #[arg(long)]
    pub metadata: Option<PathBuf>,

    /// Persist the built MPHF and state table for a later `--load-state`.
    #[arg(long)]
    pub save_state: Option<PathBuf>,

    /// Resume from a previously `--save-state`d MPHF and state table.
    #[arg(long)]
    pub load_state: Option<PathBuf>,
}

#[derive(Debug, ClapArgs)]
pub struct ValidateArgs {
    /// The FASTA output produced by `build`.
    pub fasta: PathBuf,

    /// The vertex database that FASTA was built from.
    #[arg(long)]
    pub vertex_db: PathBuf,

    /// The edge database that FASTA was built from (read mode).
    #[arg(long)]
    pub edge_db: Option<PathBuf>,
}

/// Validates `-k`/`--kmer-length` at parse time so a bad value is rejected
/// before any file is touched.
fn parse_k(raw: &str) -> Result<usize, String> {
    let k: usize = raw.parse().map_err(|_| format!("'{raw}' is not a valid k-mer length"))?;
    if k == 0 || k % 2 == 0 || k > crate::kmer::MAX_K {
        return Err(format!(
            "k-mer length must be odd and between 1 and {}, got {k}",
            crate::kmer::MAX_K
        ));
    }
    Ok(k)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_k_rejects_even() {
        assert!(parse_k("20").is_err());
    }

    #[test]
    fn parse_k_rejects_non_numeric() {
        assert!(parse_k("abc").is_err());
    }

    #[test]
    fn parse_k_accepts_valid_odd_value() {
        assert_eq!(parse_k("21").unwrap(), 21);
    }

    #[test]
    fn build_args_parse_from_fasta_invocation() {
        let cli = Cli::parse_from([
            "cdbgr",
            "build",
            "-k",
            "21",
            "--from-fasta",
            "reads.fa",
            "-o",
            "out.fa",
        ]);
        match cli.command {
            Command::Build(args) => {
                assert_eq!(args.k, 21);
                assert_eq!(args.from_fasta, Some(PathBuf::from("reads.fa")));
            }
            Command::Validate(_) => panic!("expected Build command"),
        }
    }

    #[test]
    fn build_args_reject_vertex_db_without_edge_db() {
        let result = Cli::try_parse_from([
            "cdbgr",
            "build",
            "-k",
            "21",
            "--vertex-db",
            "v.cdb",
            "-o",
            "out.fa",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn validate_args_parse() {
        let cli = Cli::parse_from(["cdbgr", "validate", "out.fa", "--vertex-db", "v.cdb"]);
        match cli.command {
            Command::Validate(args) => {
                assert_eq!(args.fasta, PathBuf::from("out.fa"));
                assert_eq!(args.vertex_db, PathBuf::from("v.cdb"));
            }
            Command::Build(_) => panic!("expected Validate command"),
        }
    }
}
