//! Style counters fed by the record stream
//!
//! The aggregator owns all three counters for the duration of a scan; the
//! checkpoint writer only reads them. Counter cardinality tracks the number
//! of distinct tags (hundreds to low thousands), not the corpus size.

use std::collections::{BTreeMap, HashMap};

/// One catalog entry, reduced to its normalized style and genre tokens
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Record {
    pub styles: Vec<String>,
    pub genres: Vec<String>,
}

/// Records seen per style token
pub type SingleCounter = HashMap<String, u64>;
/// Records seen per unordered style pair, keyed smaller-token-first
pub type PairCounter = HashMap<(String, String), u64>;
/// Per style, how often each genre appeared on the same record
pub type GenreCounter = HashMap<String, HashMap<String, u64>>;

#[derive(Debug, Default)]
pub struct Aggregator {
    pub singles: SingleCounter,
    pub pairs: PairCounter,
    pub genres: GenreCounter,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one record into the three counters.
    ///
    /// The style list is sorted before pair enumeration so the pair key is
    /// always in ascending order; a record carrying k style entries
    /// contributes C(k,2) pair increments, one per position pair.
    pub fn update(&mut self, record: &Record) {
        if record.styles.len() >= 2 {
            let mut sorted = record.styles.clone();
            sorted.sort_unstable();
            for i in 0..sorted.len() {
                for j in (i + 1)..sorted.len() {
                    *self
                        .pairs
                        .entry((sorted[i].clone(), sorted[j].clone()))
                        .or_insert(0) += 1;
                }
            }
        }

        for style in &record.styles {
            *self.singles.entry(style.clone()).or_insert(0) += 1;
            // A genre-less record must leave the affinity counter untouched,
            // not deposit an empty inner map per style
            if !record.genres.is_empty() {
                let per_genre = self.genres.entry(style.clone()).or_default();
                for genre in &record.genres {
                    *per_genre.entry(genre.clone()).or_insert(0) += 1;
                }
            }
        }
    }
}

/// The dominant genre for every style with at least one genre count.
///
/// Highest count wins; ties fall to the lexicographically smaller genre name
/// so the table is deterministic across runs.
pub fn main_genres(counter: &GenreCounter) -> BTreeMap<String, String> {
    counter
        .iter()
        .filter_map(|(style, per_genre)| {
            per_genre
                .iter()
                .max_by(|(ga, ca), (gb, cb)| ca.cmp(cb).then_with(|| gb.cmp(ga)))
                .map(|(genre, _)| (style.clone(), genre.clone()))
        })
        .collect()
}
