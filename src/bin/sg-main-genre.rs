use clap::Parser;
use log::info;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use stylegraph::checkpoint;
use stylegraph::cooccur;
use stylegraph::errors::Result;

/// Derive each style's dominant genre from a genre affinity checkpoint
///
/// Writes a JSON object mapping style token to main genre token, the table
/// the embedding plot uses to color styles. Ties fall to the
/// lexicographically smaller genre so the table is stable across runs.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Record type the checkpoint was scanned from
    #[arg(long, default_value = "masters")]
    record_type: String,

    /// Directory the counter checkpoints live in
    #[arg(long, default_value = "embedding_data")]
    out_dir: PathBuf,

    /// Where to write the style -> main genre table
    #[arg(long)]
    output: PathBuf,
}

fn main() {
    // Main can't return a Result.
    inner_main().expect("Could not recover. Exiting.");
}

fn inner_main() -> Result<()> {
    env_logger::init();
    let args = Cli::parse();

    let genre_counter = checkpoint::load_genre_counter(&args.out_dir, &args.record_type)?;
    let table = cooccur::main_genres(&genre_counter);

    let mut writer = BufWriter::new(File::create(&args.output)?);
    serde_json::to_writer_pretty(&mut writer, &table)?;
    writer.flush()?;
    info!(
        "Wrote main genres for {} styles to {}",
        table.len(),
        args.output.display()
    );
    Ok(())
}
