//! Loading of interaction CSV exports.
//!
//! The expected format is the one produced by the platform's training
//! data export: a header line followed by
//! `user_id,item_id,rating[,timestamp]` records.

use std::path::Path;

use anyhow::{Context, Error};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use recommender::Interaction;

#[derive(Debug, Deserialize)]
struct InteractionRecord {
    user_id: i64,
    item_id: i64,
    rating: f32,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
}

/// Reads all interactions from the CSV file at the given path.
///
/// # Errors
///
/// Fails if the file cannot be read, a record cannot be parsed or a
/// rating lies outside of the valid range.
pub(crate) fn load_interactions(path: impl AsRef<Path>) -> Result<Vec<Interaction>, Error> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open interactions file {}.", path.display()))?;

    reader
        .deserialize::<InteractionRecord>()
        .enumerate()
        .map(|(index, record)| {
            let record =
                record.with_context(|| format!("Malformed interaction record #{}.", index + 1))?;
            Interaction::new(
                record.user_id,
                record.item_id,
                record.rating,
                record.timestamp,
            )
            .with_context(|| format!("Invalid interaction record #{}.", index + 1,))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn test_loads_records_with_and_without_timestamp() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "user_id,item_id,rating,timestamp").unwrap();
        writeln!(file, "1,10,4.5,2024-03-01T12:00:00Z").unwrap();
        writeln!(file, "2,20,3.0,").unwrap();
        file.flush().unwrap();

        let interactions = load_interactions(file.path()).unwrap();
        assert_eq!(interactions.len(), 2);
        assert_eq!(i64::from(interactions[0].user_id), 1);
        assert_eq!(i64::from(interactions[0].course_id), 10);
        assert!(interactions[0].timestamp.is_some());
        assert!(interactions[1].timestamp.is_none());
    }

    #[test]
    fn test_rejects_out_of_range_rating() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "user_id,item_id,rating").unwrap();
        writeln!(file, "1,10,9.5").unwrap();
        file.flush().unwrap();

        assert!(load_interactions(file.path()).is_err());
    }

    #[test]
    fn test_rejects_malformed_record() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "user_id,item_id,rating").unwrap();
        writeln!(file, "1,not-an-id,4.0").unwrap();
        file.flush().unwrap();

        assert!(load_interactions(file.path()).is_err());
    }
}
