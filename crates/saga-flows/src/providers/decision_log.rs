use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use saga_core::{DecisionLog, DecisionRecord, ReportError};

/// Append-only decision log writing one JSON object per line.
#[derive(Debug)]
pub struct JsonlDecisionLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlDecisionLog {
    /// Opens `path` for appending, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ReportError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| ReportError::Io {
                sink: path.display().to_string(),
                source,
            })?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DecisionLog for JsonlDecisionLog {
    fn append(&self, record: DecisionRecord) -> Result<(), ReportError> {
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');

        let mut file = self
            .file
            .lock()
            .map_err(|_| ReportError::Unavailable(self.path.display().to_string()))?;
        file.write_all(&line)
            .and_then(|()| file.flush())
            .map_err(|source| ReportError::Io {
                sink: self.path.display().to_string(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use saga_core::SagaId;
    use serde_json::json;

    use super::*;

    fn record(decision: &str) -> DecisionRecord {
        DecisionRecord {
            saga_id: SagaId::new(),
            saga: "trading_execution".to_string(),
            decision: decision.to_string(),
            reasoning: json!({"step": "execute_order"}),
            confidence: 1.0,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn appends_one_line_per_record() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("decisions.jsonl");

        let log = JsonlDecisionLog::open(&path).expect("open");
        log.append(record("trade_executed")).expect("append");
        log.append(record("saga_failed")).expect("append");

        let contents = std::fs::read_to_string(&path).expect("read");
        let lines: Vec<serde_json::Value> = contents
            .lines()
            .map(|l| serde_json::from_str(l).expect("json line"))
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["decision"], "trade_executed");
        assert_eq!(lines[1]["decision"], "saga_failed");
    }

    #[test]
    fn reopening_keeps_existing_records() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("decisions.jsonl");

        JsonlDecisionLog::open(&path)
            .expect("open")
            .append(record("first"))
            .expect("append");
        JsonlDecisionLog::open(&path)
            .expect("reopen")
            .append(record("second"))
            .expect("append");

        let contents = std::fs::read_to_string(&path).expect("read");
        assert_eq!(contents.lines().count(), 2);
    }

    #[test]
    fn open_in_missing_directory_is_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("missing").join("decisions.jsonl");

        let err = JsonlDecisionLog::open(&path).expect_err("missing dir");

        assert!(matches!(err, ReportError::Io { .. }));
    }
}
