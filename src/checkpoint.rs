//! Durable counter snapshots
//!
//! A checkpoint is three independent artifacts per record type, one per
//! counter. Every flush fully replaces the previous snapshot: each artifact
//! is written to a temp file in the destination directory and persisted over
//! the old one, so a crash mid-write never leaves a torn artifact behind.

use crate::cooccur::{Aggregator, GenreCounter, PairCounter, SingleCounter};
use crate::errors::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Where one counter artifact lives for a given record type
pub fn artifact_path(dir: &Path, counter: &str, record_type: &str) -> PathBuf {
    dir.join(format!("{}_{}.bin", counter, record_type))
}

fn write_artifact<T: Serialize>(dir: &Path, path: &Path, value: &T) -> Result<()> {
    let tmp = NamedTempFile::new_in(dir)?;
    let mut writer = BufWriter::new(&tmp);
    bincode::serialize_into(&mut writer, value)?;
    writer.flush()?;
    drop(writer);
    tmp.persist(path).map_err(|err| Error::Io(err.error))?;
    Ok(())
}

fn read_artifact<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file =
        File::open(path).map_err(|err| Error::MissingFile("counter checkpoint", Some(err)))?;
    Ok(bincode::deserialize_from(BufReader::new(file))?)
}

/// Serialize all three counters, replacing any prior snapshot in `dir`.
///
/// Only reads the aggregator; a partial-write failure surfaces as an error
/// and the scan is expected to abort on it.
pub fn flush(aggregator: &Aggregator, dir: &Path, record_type: &str) -> Result<()> {
    fs::create_dir_all(dir)?;
    write_artifact(
        dir,
        &artifact_path(dir, "single_counter", record_type),
        &aggregator.singles,
    )?;
    write_artifact(
        dir,
        &artifact_path(dir, "pair_counter", record_type),
        &aggregator.pairs,
    )?;
    write_artifact(
        dir,
        &artifact_path(dir, "genre_counter", record_type),
        &aggregator.genres,
    )?;
    Ok(())
}

pub fn load_single_counter(dir: &Path, record_type: &str) -> Result<SingleCounter> {
    read_artifact(&artifact_path(dir, "single_counter", record_type))
}

pub fn load_pair_counter(dir: &Path, record_type: &str) -> Result<PairCounter> {
    read_artifact(&artifact_path(dir, "pair_counter", record_type))
}

pub fn load_genre_counter(dir: &Path, record_type: &str) -> Result<GenreCounter> {
    read_artifact(&artifact_path(dir, "genre_counter", record_type))
}
