//! Mini-batch gradient descent with early stopping.
//!
//! Each epoch shuffles the training indices with a seeded RNG, walks them in
//! fixed-size batches and applies one update per batch. After the epoch the
//! full training and validation sets are scored. The parameters with the
//! lowest validation loss are snapshotted and restored when the run ends, so
//! later drift is discarded.

use ndarray::{ArrayView1, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::error::TrainingError;
use super::gradient::Gradients;
use super::loss::{binary_accuracy, binary_cross_entropy};
use crate::fuzzy::{FuzzyModel, ModelConfig};
use crate::training::{EpochRecord, TrainingHistory};

/// Epoch interval between progress log lines.
const LOG_EVERY: usize = 50;

/// Training configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub max_epochs: usize,
    pub learning_rate: f64,
    /// Epochs without validation improvement before stopping.
    pub patience: usize,
    pub batch_size: usize,
    /// Seed for the per-epoch shuffle.
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            max_epochs: 500,
            learning_rate: 0.01,
            patience: 20,
            batch_size: 32,
            seed: 42,
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<(), TrainingError> {
        if self.max_epochs == 0 {
            return Err(TrainingError::InvalidConfig(
                "max_epochs must be at least 1".into(),
            ));
        }
        if self.batch_size == 0 {
            return Err(TrainingError::InvalidConfig(
                "batch_size must be at least 1".into(),
            ));
        }
        if self.patience == 0 {
            return Err(TrainingError::InvalidConfig(
                "patience must be at least 1".into(),
            ));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(TrainingError::InvalidConfig(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        Ok(())
    }
}

/// Drives training runs for binary fuzzy models.
#[derive(Debug, Clone, Default)]
pub struct Trainer {
    config: TrainingConfig,
}

impl Trainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Build a fresh model from `model_config` and train it.
    pub fn fit(
        &self,
        model_config: &ModelConfig,
        x_train: ArrayView2<f64>,
        y_train: ArrayView1<u8>,
        x_val: ArrayView2<f64>,
        y_val: ArrayView1<u8>,
    ) -> Result<FuzzyModel, TrainingError> {
        let mut model = FuzzyModel::new(model_config)?;
        self.train(&mut model, x_train, y_train, x_val, y_val)?;
        Ok(model)
    }

    /// Train `model` in place; on return it holds the best-validation parameters
    /// and the run's history.
    pub fn train(
        &self,
        model: &mut FuzzyModel,
        x_train: ArrayView2<f64>,
        y_train: ArrayView1<u8>,
        x_val: ArrayView2<f64>,
        y_val: ArrayView1<u8>,
    ) -> Result<TrainingHistory, TrainingError> {
        self.config.validate()?;
        check_inputs(model, x_train, y_train, x_val, y_val)?;

        let train_targets = y_train.mapv(f64::from);
        let val_targets = y_val.mapv(f64::from);
        let n_samples = x_train.nrows();

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut indices: Vec<usize> = (0..n_samples).collect();
        let mut history = TrainingHistory::new();
        let mut best_loss = f64::INFINITY;
        let mut best_parameters = model.parameters();
        let mut epochs_without_improvement = 0;

        for epoch in 0..self.config.max_epochs {
            indices.shuffle(&mut rng);

            let mut loss_sum = 0.0;
            let mut batches = 0usize;
            for batch in indices.chunks(self.config.batch_size) {
                let xb = x_train.select(Axis(0), batch);
                let tb = train_targets.select(Axis(0), batch);

                let pass = model.forward(xb.view())?;
                loss_sum += binary_cross_entropy(pass.output.view(), tb.view());
                batches += 1;

                let gradients = Gradients::compute(model, &pass, xb.view(), tb.view());
                model.update_parameters(&gradients, self.config.learning_rate);
            }

            let train_proba = model.predict_proba(x_train)?;
            let val_proba = model.predict_proba(x_val)?;
            let record = EpochRecord {
                epoch,
                train_loss: loss_sum / batches.max(1) as f64,
                val_loss: binary_cross_entropy(val_proba.view(), val_targets.view()),
                train_accuracy: binary_accuracy(train_proba.view(), train_targets.view()),
                val_accuracy: binary_accuracy(val_proba.view(), val_targets.view()),
            };
            history.push(record);

            if epoch % LOG_EVERY == 0 {
                info!(
                    epoch,
                    train_loss = record.train_loss,
                    val_loss = record.val_loss,
                    val_accuracy = record.val_accuracy,
                    "training progress"
                );
            }

            if record.val_loss < best_loss {
                best_loss = record.val_loss;
                best_parameters = model.parameters();
                history.best_epoch = Some(epoch);
                epochs_without_improvement = 0;
            } else {
                epochs_without_improvement += 1;
                if epochs_without_improvement >= self.config.patience {
                    history.stopped_early = true;
                    info!(epoch, best_val_loss = best_loss, "early stopping");
                    break;
                }
            }
        }

        model.restore(best_parameters);
        debug!(
            epochs = history.len(),
            best_epoch = ?history.best_epoch,
            "restored best parameters"
        );
        model.set_history(history.clone());
        Ok(history)
    }
}

fn check_inputs(
    model: &FuzzyModel,
    x_train: ArrayView2<f64>,
    y_train: ArrayView1<u8>,
    x_val: ArrayView2<f64>,
    y_val: ArrayView1<u8>,
) -> Result<(), TrainingError> {
    if x_train.nrows() == 0 {
        return Err(TrainingError::EmptyTrainingSet);
    }
    if x_val.nrows() == 0 {
        return Err(TrainingError::EmptyValidationSet);
    }
    check_pair(model, x_train, y_train)?;
    check_pair(model, x_val, y_val)?;

    let first = y_train[0];
    if y_train.iter().all(|&label| label == first) {
        return Err(TrainingError::DegenerateTargets { label: first });
    }
    Ok(())
}

fn check_pair(
    model: &FuzzyModel,
    x: ArrayView2<f64>,
    y: ArrayView1<u8>,
) -> Result<(), TrainingError> {
    if x.nrows() != y.len() {
        return Err(TrainingError::LabelCountMismatch {
            samples: x.nrows(),
            labels: y.len(),
        });
    }
    if x.ncols() != model.n_inputs() {
        return Err(crate::fuzzy::FuzzyError::DimensionMismatch {
            expected: model.n_inputs(),
            got: x.ncols(),
        }
        .into());
    }
    Ok(())
}
