//! Append-only JSON-lines log of received classification results.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::classification::ClassificationResult;

/// One line of the log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultRecord {
    pub session_id: String,
    /// Sequence number of the frame the result was paired with, if any.
    pub seq: Option<u64>,
    pub received_at: DateTime<Utc>,
    pub result: ClassificationResult,
}

pub struct ResultLog {
    writer: BufWriter<File>,
}

impl ResultLog {
    /// Opens `path` for appending, creating it if needed.
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open result log {path:?}"))?;
        log::info!("Appending classification results to {path:?}");
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    pub fn append(&mut self, record: &ResultRecord) -> Result<()> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        // flushed per record; the log is tailed while the client runs
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::{Classification, Detection};

    #[test]
    fn test_records_are_appended_as_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.jsonl");

        let mut log = ResultLog::open(&path).unwrap();
        let ok =
            Classification::from_detections(vec![Detection::new("can", 0.5, [1.0, 2.0, 3.0, 4.0])]);
        for (seq, result) in [
            (Some(1), ClassificationResult::from(ok)),
            (None, ClassificationResult::failure("Could not decode image")),
        ] {
            log.append(&ResultRecord {
                session_id: "abc".into(),
                seq,
                received_at: Utc::now(),
                result,
            })
            .unwrap();
        }
        drop(log);

        // Reopening appends rather than truncating.
        let mut log = ResultLog::open(&path).unwrap();
        log.append(&ResultRecord {
            session_id: "abc".into(),
            seq: Some(2),
            received_at: Utc::now(),
            result: ClassificationResult::failure("late"),
        })
        .unwrap();
        drop(log);

        let contents = std::fs::read_to_string(&path).unwrap();
        let records: Vec<ResultRecord> = contents
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].result.detections().len(), 1);
        assert_eq!(records[1].result.error(), Some("Could not decode image"));
        assert_eq!(records[2].seq, Some(2));
    }
}
