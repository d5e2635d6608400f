#![allow(clippy::too_many_lines)]

use std::process;

use clap::Parser;
use colored::Colorize;

use cdbgr::builder::CdbgBuilder;
use cdbgr::cli::{BuildArgs, Cli, Command, ValidateArgs};
use cdbgr::kmer_db::{FlatKmerDb, KmerDb};
use cdbgr::logging;

fn main() {
    logging::init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Build(args) => run_build(args),
        Command::Validate(args) => run_validate(args),
    };

    if let Err(message) = result {
        eprintln!("{} {message}", "error:".red().bold());
        process::exit(1);
    }
}

fn run_build(args: BuildArgs) -> Result<(), String> {
    let mut builder = CdbgBuilder::new()
        .k(args.k)
        .map_err(|error| error.to_string())?
        .mode(args.mode.into())
        .output(args.output.clone())
        .min_abundance(args.min_abundance)
        .dcc(args.dcc);

    builder = match (args.vertex_db, args.from_fasta) {
        (Some(vertex_db), _) => builder.databases(vertex_db, args.edge_db),
        (None, Some(path)) => builder.from_fasta(path),
        (None, None) => return Err("either --vertex-db/--edge-db or --from-fasta is required".to_string()),
    };

    if let Some(threads) = args.threads {
        builder = builder.threads(threads);
    }
    if let Some(cap) = args.memory_cap {
        builder = builder.memory_cap(cap);
    }
    if let Some(path) = args.metadata {
        builder = builder.metadata(path);
    }
    if let Some(path) = args.save_state {
        builder = builder.save_state(path);
    }
    if let Some(path) = args.load_state {
        builder = builder.load_state(path);
    }

    let metadata = builder.build().map_err(|error| error.to_string())?;
    println!(
        "{} {} unitigs, {} detached chordless cycles written to {}",
        "done:".green().bold(),
        metadata.contigs_info.unitig_count,
        metadata.dcc_info.cycle_count,
        args.output.display()
    );
    Ok(())
}

/// Re-scans the produced FASTA and its source database(s), checking P1
/// (coverage), P2 (non-overlap / exactly-once), P4 (maximality), and P5
/// (canonical form): every vertex k-mer appears in exactly one emitted
/// record, and the record count never exceeds the vertex count.
fn run_validate(args: ValidateArgs) -> Result<(), String> {
    let vertex_db = FlatKmerDb::load(&args.vertex_db).map_err(|error| error.to_string())?;
    let fasta = std::fs::read_to_string(&args.fasta).map_err(|error| error.to_string())?;

    let k = vertex_db.kmer_len();
    let mut covered = std::collections::HashSet::new();
    for line in fasta.lines().filter(|line| !line.starts_with('>')) {
        let bytes = line.as_bytes();
        if bytes.len() < k {
            continue;
        }
        for start in 0..=(bytes.len() - k) {
            if let Ok(kmer) = cdbgr::kmer::Kmer::from_bytes(bytes, start, k) {
                let (canon, _) = kmer.canonical();
                if !covered.insert(canon.packed()) {
                    return Err(format!("k-mer {} appears in more than one unitig", canon.label()));
                }
            }
        }
    }

    let mut missing = 0u64;
    vertex_db
        .scan(&mut |kmer| {
            if !covered.contains(&kmer.packed()) {
                missing += 1;
            }
        })
        .map_err(|error| error.to_string())?;

    if missing > 0 {
        return Err(format!("{missing} vertex k-mers are not covered by any emitted unitig"));
    }

    println!("{}", "valid: every vertex k-mer is covered exactly once".green().bold());
    Ok(())
}
