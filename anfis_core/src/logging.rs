//! JSON-lines run logs.
//!
//! Progress goes through `tracing`; these files keep a machine-readable
//! record of every epoch and active-learning iteration under a caller-chosen
//! directory.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::active::IterationRecord;
use crate::training::TrainingHistory;

const EPOCH_LOG: &str = "epochs.jsonl";
const ITERATION_LOG: &str = "active_learning.jsonl";

fn append_json_line<P: AsRef<Path>, T: Serialize>(path: P, value: &T) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    serde_json::to_writer(&mut file, value)
        .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
    file.write_all(b"\n")
}

fn timestamp_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}

#[derive(Debug, Serialize)]
pub struct EpochLogEntry<'a> {
    pub model: &'a str,
    pub epoch: usize,
    pub train_loss: f64,
    pub val_loss: f64,
    pub train_accuracy: f64,
    pub val_accuracy: f64,
    pub best: bool,
    pub timestamp_ms: u128,
}

#[derive(Debug, Serialize)]
pub struct IterationLogEntry<'a> {
    #[serde(flatten)]
    pub record: &'a IterationRecord,
    pub timestamp_ms: u128,
}

/// Appends run records below one directory.
#[derive(Debug, Clone)]
pub struct RunLogger {
    dir: PathBuf,
}

impl RunLogger {
    pub fn new<P: AsRef<Path>>(dir: P) -> io::Result<Self> {
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir: dir.as_ref().to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// One line per epoch, tagged with `model`.
    pub fn log_history(&self, model: &str, history: &TrainingHistory) -> io::Result<()> {
        let path = self.dir.join(EPOCH_LOG);
        for record in &history.epochs {
            let entry = EpochLogEntry {
                model,
                epoch: record.epoch,
                train_loss: record.train_loss,
                val_loss: record.val_loss,
                train_accuracy: record.train_accuracy,
                val_accuracy: record.val_accuracy,
                best: history.best_epoch == Some(record.epoch),
                timestamp_ms: timestamp_ms(),
            };
            append_json_line(&path, &entry)?;
        }
        Ok(())
    }

    pub fn log_iteration(&self, record: &IterationRecord) -> io::Result<()> {
        let entry = IterationLogEntry {
            record,
            timestamp_ms: timestamp_ms(),
        };
        append_json_line(self.dir.join(ITERATION_LOG), &entry)
    }

    /// Pretty-printed JSON document, overwriting `name` if present.
    pub fn write_report<T: Serialize>(&self, name: &str, report: &T) -> io::Result<PathBuf> {
        let path = self.dir.join(name);
        let json = serde_json::to_string_pretty(report)
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
        fs::write(&path, json)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::EpochRecord;
    use uuid::Uuid;

    #[test]
    fn history_lines_are_json() {
        let dir = std::env::temp_dir().join(format!("anfis_logs_{}", Uuid::new_v4()));
        let logger = RunLogger::new(&dir).unwrap();

        let mut history = TrainingHistory::new();
        for epoch in 0..3 {
            history.push(EpochRecord {
                epoch,
                train_loss: 0.5,
                val_loss: 0.4 - epoch as f64 * 0.1,
                train_accuracy: 0.8,
                val_accuracy: 0.7,
            });
        }
        history.best_epoch = Some(2);
        logger.log_history("healthy", &history).unwrap();

        let contents = fs::read_to_string(dir.join(EPOCH_LOG)).unwrap();
        let lines: Vec<serde_json::Value> = contents
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["model"], "healthy");
        assert_eq!(lines[2]["best"], true);

        fs::remove_dir_all(&dir).ok();
    }
}
