//! Manifest produced by the upstream preprocessing stage.
//!
//! The manifest is the pipeline's sole description of the input corpus: one
//! row per preprocessed entry with its object-store key and content hash.
//! It is read once at `start` and never mutated here.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Manifest is not valid JSON: {0}")]
    Malformed(String),

    #[error("Manifest entry {index} is out of date order ({date})")]
    OutOfOrder { index: usize, date: NaiveDate },

    #[error("Manifest entry {index} duplicates date {date}")]
    DuplicateDate { index: usize, date: NaiveDate },

    #[error("Manifest totalEntries is {declared} but {actual} entries are listed")]
    CountMismatch { declared: u32, actual: usize },

    #[error("Manifest lists no entries")]
    Empty,
}

/// One preprocessed journal entry, identified by date and content hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub date: NaiveDate,
    pub original_path: String,
    pub r2_key: String,
    pub word_count: u32,
    /// SHA-256 hex of the preprocessed entry bytes.
    pub content_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub generated_at: String,
    pub total_entries: u32,
    pub date_range: DateRange,
    pub entries: Vec<ManifestEntry>,
}

impl Manifest {
    /// Parse and validate manifest bytes.
    ///
    /// Entries must be non-empty, strictly ascending by date (which also
    /// rules out duplicates), and consistent with `totalEntries`.
    pub fn parse(bytes: &[u8]) -> Result<Self, ManifestError> {
        let manifest: Manifest =
            serde_json::from_slice(bytes).map_err(|e| ManifestError::Malformed(e.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    fn validate(&self) -> Result<(), ManifestError> {
        if self.entries.is_empty() {
            return Err(ManifestError::Empty);
        }
        if self.total_entries as usize != self.entries.len() {
            return Err(ManifestError::CountMismatch {
                declared: self.total_entries,
                actual: self.entries.len(),
            });
        }
        for (index, pair) in self.entries.windows(2).enumerate() {
            let index = index + 1;
            if pair[1].date == pair[0].date {
                return Err(ManifestError::DuplicateDate {
                    index,
                    date: pair[1].date,
                });
            }
            if pair[1].date < pair[0].date {
                return Err(ManifestError::OutOfOrder {
                    index,
                    date: pair[1].date,
                });
            }
        }
        Ok(())
    }

    pub fn first_date(&self) -> NaiveDate {
        self.entries[0].date
    }

    pub fn last_date(&self) -> NaiveDate {
        self.entries[self.entries.len() - 1].date
    }
}
