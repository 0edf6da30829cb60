//! Tour journal – newline-delimited JSON persistence.
//!
//! Every record is one JSON object on its own line, tagged by `kind`:
//!
//! | kind        | contents                                               |
//! |-------------|--------------------------------------------------------|
//! | `attention` | session id, timestamp, valence, attention              |
//! | `summary`   | session id, visited exhibit ids, outcome, sample count |
//!
//! The file is opened in append mode for every write, so journals from
//! several sessions accumulate in one file.

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use docent_types::{AttentionSample, TourError, TourSummary};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

// ─────────────────────────────────────────────────────────────────────────────
// Error type
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum JournalError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<JournalError> for TourError {
    fn from(e: JournalError) -> Self {
        TourError::Persistence(e.to_string())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Records
// ─────────────────────────────────────────────────────────────────────────────

/// One line of the journal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JournalRecord {
    Attention {
        session_id: Uuid,
        timestamp: DateTime<Utc>,
        valence: f32,
        attention: f32,
    },
    Summary(TourSummary),
}

impl JournalRecord {
    pub fn attention(session_id: Uuid, sample: &AttentionSample) -> Self {
        JournalRecord::Attention {
            session_id,
            timestamp: sample.timestamp,
            valence: sample.valence,
            attention: sample.attention,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// TourJournal
// ─────────────────────────────────────────────────────────────────────────────

/// Append-only NDJSON journal file.
#[derive(Debug, Clone)]
pub struct TourJournal {
    path: PathBuf,
}

impl TourJournal {
    /// Point the journal at `path`, creating parent directories if needed.
    /// The file itself is created on first write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, JournalError> {
        let path = path.into();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a batch of records in a single write.
    pub fn append(&self, records: &[JournalRecord]) -> Result<(), JournalError> {
        if records.is_empty() {
            return Ok(());
        }
        let mut buf = Vec::new();
        for record in records {
            serde_json::to_writer(&mut buf, record)?;
            buf.push(b'\n');
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(&buf)?;
        debug!(path = %self.path.display(), records = records.len(), "journal appended");
        Ok(())
    }

    pub fn append_attention(
        &self,
        session_id: Uuid,
        samples: &[AttentionSample],
    ) -> Result<(), JournalError> {
        let records: Vec<JournalRecord> = samples
            .iter()
            .map(|s| JournalRecord::attention(session_id, s))
            .collect();
        self.append(&records)
    }

    pub fn append_summary(&self, summary: &TourSummary) -> Result<(), JournalError> {
        self.append(&[JournalRecord::Summary(summary.clone())])
    }

    /// Read every record back, oldest first.  Blank lines are skipped.
    pub fn read_all(&self) -> Result<Vec<JournalRecord>, JournalError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let reader = BufReader::new(fs::File::open(&self.path)?);
        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str(&line)?);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docent_types::TourOutcome;

    fn summary(session_id: Uuid) -> TourSummary {
        TourSummary {
            session_id,
            visited: vec![84, 80],
            outcome: TourOutcome::Completed,
            attention_samples: 2,
            finished_at: Utc::now(),
        }
    }

    #[test]
    fn missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let journal = TourJournal::open(dir.path().join("tour.ndjson")).unwrap();
        assert!(journal.read_all().unwrap().is_empty());
    }

    #[test]
    fn open_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("logs").join("tour.ndjson");
        let journal = TourJournal::open(&path).unwrap();
        journal.append_summary(&summary(Uuid::new_v4())).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn one_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let journal = TourJournal::open(dir.path().join("tour.ndjson")).unwrap();
        let id = Uuid::new_v4();
        journal
            .append_attention(
                id,
                &[AttentionSample::now(0.1, 0.8), AttentionSample::now(-0.2, 0.3)],
            )
            .unwrap();
        journal.append_summary(&summary(id)).unwrap();

        let raw = fs::read_to_string(journal.path()).unwrap();
        assert_eq!(raw.lines().count(), 3);
        assert!(raw.lines().next().unwrap().contains("\"kind\":\"attention\""));
        assert!(raw.lines().last().unwrap().contains("\"kind\":\"summary\""));

        let records = journal.read_all().unwrap();
        assert_eq!(records.len(), 3);
        match &records[2] {
            JournalRecord::Summary(s) => assert_eq!(s.visited, vec![84, 80]),
            other => panic!("unexpected record {other:?}"),
        }
    }

    #[test]
    fn sessions_accumulate() {
        let dir = tempfile::tempdir().unwrap();
        let journal = TourJournal::open(dir.path().join("tour.ndjson")).unwrap();
        journal.append_summary(&summary(Uuid::new_v4())).unwrap();
        journal.append_summary(&summary(Uuid::new_v4())).unwrap();
        assert_eq!(journal.read_all().unwrap().len(), 2);
    }

    #[test]
    fn journal_error_converts_to_persistence() {
        let err: TourError = JournalError::Io(std::io::Error::other("disk full")).into();
        assert!(matches!(err, TourError::Persistence(_)));
    }
}
