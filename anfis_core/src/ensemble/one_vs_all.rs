use std::collections::BTreeMap;
use std::path::Path;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::normalization::{normalize_rows, NormalizationPolicy};
use super::EnsembleError;
use crate::checkpoint::{CheckpointError, Checkpointable};
use crate::data::{LabelMapping, LabeledSet};
use crate::fuzzy::{FuzzyModel, ModelArtifact, ModelConfig};
use crate::learner::{MulticlassMetrics, Trainer, TrainingConfig, TrainingError};

pub const ENSEMBLE_ARTIFACT_VERSION: u32 = 1;

/// Per-class learning-rate scaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ClassWeighting {
    #[default]
    Uniform,
    /// `lr * n_samples / (n_classes * count_c)`, boosting rare classes.
    Balanced,
}

impl ClassWeighting {
    /// Learning-rate multiplier for a class with `count` of `n_samples`
    /// training rows. Absent classes keep the base rate.
    pub fn scale(self, count: usize, n_samples: usize, n_classes: usize) -> f64 {
        match self {
            ClassWeighting::Uniform => 1.0,
            ClassWeighting::Balanced if count > 0 => {
                n_samples as f64 / (n_classes as f64 * count as f64)
            }
            ClassWeighting::Balanced => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EnsembleConfig {
    pub model: ModelConfig,
    pub training: TrainingConfig,
    pub normalization: NormalizationPolicy,
    pub class_weighting: ClassWeighting,
}

impl EnsembleConfig {
    /// Model and training configs for one class. Seeds are offset by the
    /// class index so each model is reproducible on its own.
    fn for_class(&self, class: usize, learning_rate_scale: f64) -> (ModelConfig, TrainingConfig) {
        let offset = class as u64;
        let model = self.model.with_seed(self.model.seed.wrapping_add(offset));
        let training = TrainingConfig {
            seed: self.training.seed.wrapping_add(offset),
            learning_rate: self.training.learning_rate * learning_rate_scale,
            ..self.training
        };
        (model, training)
    }
}

/// N independent binary models, one per class of the label mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct OneVsAllEnsemble {
    models: Vec<FuzzyModel>,
    labels: LabelMapping,
    normalization: NormalizationPolicy,
}

fn check_labels(set: &LabeledSet, n_classes: usize) -> Result<(), EnsembleError> {
    if let Some(&label) = set.labels.iter().find(|&&label| label >= n_classes) {
        return Err(EnsembleError::LabelOutOfRange { label, n_classes });
    }
    Ok(())
}

fn binary_targets(labels: ArrayView1<usize>, class: usize) -> Array1<u8> {
    labels.mapv(|label| u8::from(label == class))
}

impl OneVsAllEnsemble {
    /// Train one model per class in parallel.
    ///
    /// Results are collected in class order, so the first failing class is
    /// reported regardless of which thread finished first.
    pub fn train(
        config: &EnsembleConfig,
        labels: &LabelMapping,
        train: &LabeledSet,
        validation: &LabeledSet,
    ) -> Result<Self, EnsembleError> {
        let n_classes = labels.len();
        if n_classes == 0 {
            return Err(EnsembleError::NoClasses);
        }
        check_labels(train, n_classes)?;
        check_labels(validation, n_classes)?;

        let counts = train.class_counts();

        let results: Vec<Result<FuzzyModel, TrainingError>> = (0..n_classes)
            .into_par_iter()
            .map(|class| {
                let count = counts.get(&class).copied().unwrap_or(0);
                let scale = config.class_weighting.scale(count, train.len(), n_classes);
                let (model_config, training_config) = config.for_class(class, scale);
                let y_train = binary_targets(train.labels.view(), class);
                let y_val = binary_targets(validation.labels.view(), class);

                Trainer::new(training_config).fit(
                    &model_config,
                    train.features.view(),
                    y_train.view(),
                    validation.features.view(),
                    y_val.view(),
                )
            })
            .collect();

        let mut models = Vec::with_capacity(n_classes);
        for (class, result) in results.into_iter().enumerate() {
            let name = labels.name_of(class).unwrap_or_default().to_string();
            let model = result.map_err(|source| EnsembleError::ClassTraining {
                class,
                name: name.clone(),
                source,
            })?;
            info!(
                class = %name,
                epochs = model.history().len(),
                best_val_loss = ?model.history().best().map(|r| r.val_loss),
                "class model trained"
            );
            models.push(model);
        }

        Ok(Self {
            models,
            labels: labels.clone(),
            normalization: config.normalization,
        })
    }

    /// Assemble from already trained models, one per class.
    pub fn from_models(
        models: Vec<FuzzyModel>,
        labels: LabelMapping,
        normalization: NormalizationPolicy,
    ) -> Result<Self, EnsembleError> {
        if models.is_empty() {
            return Err(EnsembleError::NoClasses);
        }
        if models.len() != labels.len() {
            return Err(EnsembleError::LabelCountMismatch {
                samples: models.len(),
                labels: labels.len(),
            });
        }
        Ok(Self {
            models,
            labels,
            normalization,
        })
    }

    pub fn n_classes(&self) -> usize {
        self.models.len()
    }

    pub fn n_inputs(&self) -> usize {
        self.models.first().map(FuzzyModel::n_inputs).unwrap_or(0)
    }

    pub fn models(&self) -> &[FuzzyModel] {
        &self.models
    }

    pub fn labels(&self) -> &LabelMapping {
        &self.labels
    }

    pub fn normalization(&self) -> NormalizationPolicy {
        self.normalization
    }

    /// Raw per-class probabilities `[samples, n_classes]`, not normalized.
    pub fn raw_scores(&self, x: ArrayView2<f64>) -> Result<Array2<f64>, EnsembleError> {
        let mut scores = Array2::zeros((x.nrows(), self.n_classes()));
        for (class, model) in self.models.iter().enumerate() {
            scores.column_mut(class).assign(&model.predict_proba(x)?);
        }
        Ok(scores)
    }

    /// Normalized class distribution per sample.
    pub fn predict_proba(&self, x: ArrayView2<f64>) -> Result<Array2<f64>, EnsembleError> {
        let raw = self.raw_scores(x)?;
        Ok(normalize_rows(&raw, self.normalization))
    }

    pub fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<usize>, EnsembleError> {
        let probs = self.predict_proba(x)?;
        Ok(argmax_rows(&probs))
    }

    pub fn predict_labels(&self, x: ArrayView2<f64>) -> Result<Vec<String>, EnsembleError> {
        let predictions = self.predict(x)?;
        Ok(predictions
            .iter()
            .map(|&class| self.labels.name_of(class).unwrap_or_default().to_string())
            .collect())
    }

    pub fn predict_named_proba(
        &self,
        x: ArrayView2<f64>,
    ) -> Result<Vec<BTreeMap<String, f64>>, EnsembleError> {
        let probs = self.predict_proba(x)?;
        Ok(probs
            .rows()
            .into_iter()
            .map(|row| {
                self.labels
                    .classes()
                    .iter()
                    .cloned()
                    .zip(row.iter().copied())
                    .collect()
            })
            .collect())
    }

    pub fn evaluate(
        &self,
        x: ArrayView2<f64>,
        y: ArrayView1<usize>,
    ) -> Result<MulticlassMetrics, EnsembleError> {
        if x.nrows() != y.len() {
            return Err(EnsembleError::LabelCountMismatch {
                samples: x.nrows(),
                labels: y.len(),
            });
        }
        if let Some(&label) = y.iter().find(|&&label| label >= self.n_classes()) {
            return Err(EnsembleError::LabelOutOfRange {
                label,
                n_classes: self.n_classes(),
            });
        }
        let predictions = self.predict(x)?;
        let metrics = MulticlassMetrics::compute(y, predictions.view(), self.n_classes());
        debug!(
            accuracy = metrics.accuracy,
            macro_f1 = metrics.macro_f1(),
            "ensemble evaluated"
        );
        Ok(metrics)
    }

    pub fn to_artifact(&self) -> EnsembleArtifact {
        EnsembleArtifact {
            version: ENSEMBLE_ARTIFACT_VERSION,
            normalization: self.normalization,
            labels: self.labels.clone(),
            models: self.models.iter().map(FuzzyModel::to_artifact).collect(),
        }
    }
}

/// Index of the largest value per row; ties go to the lowest index.
pub(crate) fn argmax_rows(probs: &Array2<f64>) -> Array1<usize> {
    probs
        .axis_iter(Axis(0))
        .map(|row| {
            row.iter()
                .enumerate()
                .fold((0usize, f64::NEG_INFINITY), |(best, best_value), (i, &v)| {
                    if v > best_value {
                        (i, v)
                    } else {
                        (best, best_value)
                    }
                })
                .0
        })
        .collect()
}

/// Persisted form of an ensemble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleArtifact {
    pub version: u32,
    pub normalization: NormalizationPolicy,
    pub labels: LabelMapping,
    pub models: Vec<ModelArtifact>,
}

impl Checkpointable for OneVsAllEnsemble {
    fn save_checkpoint<P: AsRef<Path>>(&self, path: P) -> Result<(), CheckpointError> {
        Self::write_snapshot(&self.to_artifact(), path)
    }

    fn load_checkpoint<P: AsRef<Path>>(path: P) -> Result<Self, CheckpointError> {
        let artifact: EnsembleArtifact = Self::read_snapshot(path, ENSEMBLE_ARTIFACT_VERSION)?;
        let mut models = Vec::with_capacity(artifact.models.len());
        for model in artifact.models {
            if model.version != crate::fuzzy::MODEL_ARTIFACT_VERSION {
                return Err(CheckpointError::VersionMismatch {
                    expected: crate::fuzzy::MODEL_ARTIFACT_VERSION,
                    found: model.version,
                });
            }
            let model = FuzzyModel::from_artifact(model)
                .map_err(|err| CheckpointError::InvalidFormat(err.to_string()))?;
            models.push(model);
        }

        let n_inputs = models.first().map(FuzzyModel::n_inputs).unwrap_or(0);
        if models.iter().any(|m| m.n_inputs() != n_inputs) {
            return Err(CheckpointError::InvalidFormat(
                "class models disagree on input width".into(),
            ));
        }

        OneVsAllEnsemble::from_models(models, artifact.labels, artifact.normalization)
            .map_err(|err| CheckpointError::InvalidFormat(err.to_string()))
    }
}
