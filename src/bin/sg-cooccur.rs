use clap::Parser;
use log::info;
use std::path::PathBuf;
use stylegraph::checkpoint;
use stylegraph::cooccur::Aggregator;
use stylegraph::errors::Result;
use stylegraph::xml;

/// Scan a compressed catalog dump once and accumulate style statistics
///
/// Reads `<data-dir>/discogs_<version>_<record-type>.xml.gz` in a single
/// streaming pass and checkpoints three counters (per-style frequency,
/// per-pair cooccurrence, per-style genre affinity) every `--every` records
/// and once more at end of stream. A crash loses only the records since the
/// last checkpoint; restarting rescans from the beginning.
#[derive(Parser)]
#[command(about)]
struct Cli {
    /// Dump version tag, e.g. 20260101
    #[arg(long)]
    version: String,

    /// Record type to scan (masters or releases)
    #[arg(long, default_value = "masters")]
    record_type: String,

    /// Directory holding the raw compressed dumps
    #[arg(long, default_value = "raw_data")]
    data_dir: PathBuf,

    /// Directory the counter checkpoints are written to
    #[arg(long, default_value = "embedding_data")]
    out_dir: PathBuf,

    /// Checkpoint cadence, in records (0 checkpoints only at end of stream)
    #[arg(long, default_value_t = 1_000_000)]
    every: u64,
}

fn main() {
    // Main can't return a Result.
    inner_main().expect("Could not recover. Exiting.");
}

fn inner_main() -> Result<()> {
    env_logger::init();
    let args = Cli::parse();

    // A "masters" dump tags its records <master>, "releases" <release>
    let element = args.record_type.strip_suffix('s').unwrap_or(&args.record_type);
    let dump = args
        .data_dir
        .join(format!("discogs_{}_{}.xml.gz", args.version, args.record_type));

    info!("Scanning {}", dump.display());
    let mut aggregator = Aggregator::new();
    let mut count: u64 = 0;
    for record in xml::open_dump(&dump, element)? {
        aggregator.update(&record?);
        count += 1;
        if args.every > 0 && count % args.every == 0 {
            checkpoint::flush(&aggregator, &args.out_dir, &args.record_type)?;
            info!("Checkpointed after {} records", count);
        }
    }
    checkpoint::flush(&aggregator, &args.out_dir, &args.record_type)?;
    info!(
        "Done: {} records, {} styles, {} style pairs",
        count,
        aggregator.singles.len(),
        aggregator.pairs.len()
    );
    Ok(())
}
