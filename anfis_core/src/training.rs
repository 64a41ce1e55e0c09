//! Per-epoch training records shared by the trainer, the model artifact and
//! the run logs.

use serde::{Deserialize, Serialize};

/// Metrics recorded at the end of one training epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochRecord {
    pub epoch: usize,
    pub train_loss: f64,
    pub val_loss: f64,
    pub train_accuracy: f64,
    pub val_accuracy: f64,
}

/// Append-only sequence of epoch records, finalized when the trainer stops.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub epochs: Vec<EpochRecord>,
    /// Epoch whose parameters were restored after training.
    pub best_epoch: Option<usize>,
    /// Whether the patience budget ran out before `max_epochs`.
    pub stopped_early: bool,
}

impl TrainingHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: EpochRecord) {
        self.epochs.push(record);
    }

    pub fn len(&self) -> usize {
        self.epochs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.epochs.is_empty()
    }

    pub fn last(&self) -> Option<&EpochRecord> {
        self.epochs.last()
    }

    /// Record of the epoch that was restored, if training ran at all.
    pub fn best(&self) -> Option<&EpochRecord> {
        self.best_epoch.and_then(|epoch| self.epochs.get(epoch))
    }

    pub fn train_losses(&self) -> Vec<f64> {
        self.epochs.iter().map(|record| record.train_loss).collect()
    }

    pub fn val_losses(&self) -> Vec<f64> {
        self.epochs.iter().map(|record| record.val_loss).collect()
    }
}
