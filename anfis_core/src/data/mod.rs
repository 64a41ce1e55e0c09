//! Data preparation: named features, normalization, label encoding,
//! splitting and synthetic cluster datasets.

pub mod features;
pub mod labels;
pub mod normalizer;
pub mod preprocessing;
pub mod split;
pub mod synthetic;

use std::fmt;

pub use features::{FeatureError, FeatureMap, FeatureSchema, ProduceFeatures, FEATURE_NAMES};
pub use labels::LabelMapping;
pub use normalizer::{Normalizer, NormalizerKind};
pub use preprocessing::{Preprocessing, PREPROCESSING_ARTIFACT_VERSION};
pub use split::{mix_hybrid, stratified_split, train_val_test_split, DatasetSplit, LabeledSet};
pub use synthetic::{ClusterConfig, ClusterDataset};

/// Errors raised while preparing datasets.
#[derive(Debug, Clone, PartialEq)]
pub enum DataError {
    Feature(FeatureError),
    EmptyDataset,
    UnknownLabel(String),
    UnknownClassIndex(usize),
    /// Feature rows and labels differ in length.
    LengthMismatch { rows: usize, labels: usize },
    InvalidRatio { name: &'static str, value: f64 },
}

impl fmt::Display for DataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataError::Feature(err) => write!(f, "{}", err),
            DataError::EmptyDataset => write!(f, "Dataset is empty"),
            DataError::UnknownLabel(label) => write!(f, "Unknown class label '{}'", label),
            DataError::UnknownClassIndex(index) => write!(f, "Unknown class index {}", index),
            DataError::LengthMismatch { rows, labels } => write!(
                f,
                "Dataset has {} feature rows but {} labels",
                rows, labels
            ),
            DataError::InvalidRatio { name, value } => {
                write!(f, "{} must lie in (0, 1), got {}", name, value)
            }
        }
    }
}

impl std::error::Error for DataError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DataError::Feature(err) => Some(err),
            _ => None,
        }
    }
}

impl From<FeatureError> for DataError {
    fn from(err: FeatureError) -> Self {
        DataError::Feature(err)
    }
}
