//! One-vs-all multi-class wrapper around binary fuzzy models.
//!
//! One model is trained per class on "this class vs rest" targets. At
//! inference the per-class probabilities are stacked and normalized row-wise
//! according to a [`NormalizationPolicy`]; the arg-max is the prediction.

pub mod normalization;
pub mod one_vs_all;

use std::fmt;

use crate::fuzzy::FuzzyError;
use crate::learner::TrainingError;

pub use normalization::{normalize_rows, NormalizationPolicy};
pub use one_vs_all::{
    ClassWeighting, EnsembleArtifact, EnsembleConfig, OneVsAllEnsemble, ENSEMBLE_ARTIFACT_VERSION,
};

#[derive(Debug, Clone, PartialEq)]
pub enum EnsembleError {
    NoClasses,
    /// A label index is not covered by the label mapping.
    LabelOutOfRange { label: usize, n_classes: usize },
    LabelCountMismatch { samples: usize, labels: usize },
    /// Training the model for `class` failed; the ensemble is not built.
    ClassTraining {
        class: usize,
        name: String,
        source: TrainingError,
    },
    Model(FuzzyError),
}

impl fmt::Display for EnsembleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnsembleError::NoClasses => write!(f, "Ensemble needs at least one class"),
            EnsembleError::LabelOutOfRange { label, n_classes } => write!(
                f,
                "Label {} is outside the {} known classes",
                label, n_classes
            ),
            EnsembleError::LabelCountMismatch { samples, labels } => write!(
                f,
                "Label count mismatch: {} samples but {} labels",
                samples, labels
            ),
            EnsembleError::ClassTraining {
                class,
                name,
                source,
            } => write!(
                f,
                "Training the model for class {} ('{}') failed: {}",
                class, name, source
            ),
            EnsembleError::Model(err) => write!(f, "Model error: {}", err),
        }
    }
}

impl std::error::Error for EnsembleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EnsembleError::ClassTraining { source, .. } => Some(source),
            EnsembleError::Model(err) => Some(err),
            _ => None,
        }
    }
}

impl From<FuzzyError> for EnsembleError {
    fn from(err: FuzzyError) -> Self {
        EnsembleError::Model(err)
    }
}
