//! Uncertainty-driven active learning around the one-vs-all ensemble.
//!
//! Each iteration trains an ensemble on the current pool, scores the fixed
//! validation split, and asks a [`SyntheticGenerator`] for samples of the
//! classes behind the least confident predictions. The best ensemble by
//! validation macro-F1 is returned, not necessarily the last one.

pub mod controller;
pub mod generator;
pub mod robustness;
pub mod uncertainty;

use std::fmt;

use crate::data::DataError;
use crate::ensemble::EnsembleError;

pub use controller::{
    ActiveLearner, ActiveLearningConfig, ActiveLearningOutcome, ActiveLearningPhase,
    ActiveLearningReport, ActiveLearningSummary, IterationRecord, StopReason,
};
pub use generator::{ClusterGenerator, GeneratorError, SyntheticGenerator, SyntheticSample};
pub use robustness::{evaluate_robustness, Perturbation, PerturbationResult, RobustnessConfig, RobustnessReport};
pub use uncertainty::{allocate, confidence, plan_targets, select_uncertain, TargetPolicy, UncertainSample};

#[derive(Debug, Clone, PartialEq)]
pub enum ActiveLearningError {
    InvalidConfig(String),
    /// A configured class name is not in the label mapping.
    UnknownClass(String),
    EmptyPool,
    EmptyValidationSet,
    Ensemble(EnsembleError),
    Data(DataError),
}

impl fmt::Display for ActiveLearningError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActiveLearningError::InvalidConfig(msg) => {
                write!(f, "Invalid active learning config: {}", msg)
            }
            ActiveLearningError::UnknownClass(name) => {
                write!(f, "Class '{}' is not in the label mapping", name)
            }
            ActiveLearningError::EmptyPool => write!(f, "Training pool is empty"),
            ActiveLearningError::EmptyValidationSet => write!(f, "Validation set is empty"),
            ActiveLearningError::Ensemble(err) => write!(f, "Ensemble error: {}", err),
            ActiveLearningError::Data(err) => write!(f, "Data error: {}", err),
        }
    }
}

impl std::error::Error for ActiveLearningError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ActiveLearningError::Ensemble(err) => Some(err),
            ActiveLearningError::Data(err) => Some(err),
            _ => None,
        }
    }
}

impl From<EnsembleError> for ActiveLearningError {
    fn from(err: EnsembleError) -> Self {
        ActiveLearningError::Ensemble(err)
    }
}

impl From<DataError> for ActiveLearningError {
    fn from(err: DataError) -> Self {
        ActiveLearningError::Data(err)
    }
}
