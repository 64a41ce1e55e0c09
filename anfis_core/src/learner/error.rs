use std::fmt;

use crate::fuzzy::FuzzyError;

/// Errors raised before or during a training run.
#[derive(Debug, Clone, PartialEq)]
pub enum TrainingError {
    EmptyTrainingSet,
    EmptyValidationSet,
    /// Feature rows and labels differ in length.
    LabelCountMismatch { samples: usize, labels: usize },
    /// Training targets contain a single class, so there is nothing to separate.
    DegenerateTargets { label: u8 },
    InvalidConfig(String),
    Model(FuzzyError),
}

impl fmt::Display for TrainingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrainingError::EmptyTrainingSet => write!(f, "Training set is empty"),
            TrainingError::EmptyValidationSet => write!(f, "Validation set is empty"),
            TrainingError::LabelCountMismatch { samples, labels } => write!(
                f,
                "Label count mismatch: {} samples but {} labels",
                samples, labels
            ),
            TrainingError::DegenerateTargets { label } => write!(
                f,
                "Training targets are all {}; both classes must be present",
                label
            ),
            TrainingError::InvalidConfig(msg) => write!(f, "Invalid training config: {}", msg),
            TrainingError::Model(err) => write!(f, "Model error: {}", err),
        }
    }
}

impl std::error::Error for TrainingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TrainingError::Model(err) => Some(err),
            _ => None,
        }
    }
}

impl From<FuzzyError> for TrainingError {
    fn from(err: FuzzyError) -> Self {
        TrainingError::Model(err)
    }
}
